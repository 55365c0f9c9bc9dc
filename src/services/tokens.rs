use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use validator::Validate;

use super::backend::BackendClient;
use crate::error::{AppError, AppResult};
use crate::models::{CredentialsUpdate, NewTokenForm, OAuthTokenRecord, Publisher};

/// Last-known list of backend token records, as shown on the token screen.
#[derive(Debug, Default)]
pub struct TokenBoard {
    records: Vec<OAuthTokenRecord>,
}

impl TokenBoard {
    pub fn records(&self) -> &[OAuthTokenRecord] {
        &self.records
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&OAuthTokenRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn replace_all(&mut self, records: Vec<OAuthTokenRecord>) {
        self.records = records;
    }

    /// Swaps the record with the same id, or appends it when unknown.
    pub fn upsert(&mut self, record: OAuthTokenRecord) {
        match self.records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Swaps the one slot holding `token_id`. The backend's answer must be
    /// that same token; anything else leaves the board as it was.
    pub fn replace(&mut self, token_id: &str, record: OAuthTokenRecord) -> AppResult<()> {
        if record.id != token_id {
            return Err(AppError::ExternalServiceError(format!(
                "Backend answered with token {} for token {}",
                record.id, token_id
            )));
        }
        match self.records.iter_mut().find(|existing| existing.id == token_id) {
            Some(existing) => *existing = record,
            // Board not loaded yet in this process.
            None => self.records.push(record),
        }
        Ok(())
    }
}

/// A mutated record together with the board it now sits in.
#[derive(Debug, Clone, Serialize)]
pub struct TokenChange {
    pub token: OAuthTokenRecord,
    pub tokens: Vec<OAuthTokenRecord>,
}

/// Token management operations. Every mutation is a single backend call;
/// the board only changes once the backend has answered with success.
pub struct TokenService<'a> {
    backend: &'a BackendClient,
    board: &'a RwLock<TokenBoard>,
}

impl<'a> TokenService<'a> {
    pub fn new(backend: &'a BackendClient, board: &'a RwLock<TokenBoard>) -> Self {
        Self { backend, board }
    }

    /// Reloads the board from the backend and returns it.
    pub async fn list(&self, access_token: &str) -> AppResult<Vec<OAuthTokenRecord>> {
        let records = self.backend.list_tokens(access_token).await?;
        let mut board = self.board.write().await;
        board.replace_all(records);
        Ok(board.records().to_vec())
    }

    pub async fn add_new(&self, access_token: &str, form: &NewTokenForm) -> AppResult<TokenChange> {
        form.validate()?;

        let record = self.backend.add_token(access_token, form).await?;
        info!("Token added for {}", record.email);

        let mut board = self.board.write().await;
        board.upsert(record.clone());
        Ok(TokenChange {
            token: record,
            tokens: board.records().to_vec(),
        })
    }

    pub async fn update_credentials(
        &self,
        access_token: &str,
        token_id: &str,
        update: &CredentialsUpdate,
    ) -> AppResult<TokenChange> {
        update.validate()?;

        let record = match self.backend.update_token(access_token, token_id, update).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Credential update failed for token {}: {}", token_id, e);
                return Err(e);
            }
        };
        let change = self.swap(token_id, record).await?;
        info!("Credentials updated for token {}", token_id);
        Ok(change)
    }

    pub async fn relogin(&self, access_token: &str, token_id: &str) -> AppResult<TokenChange> {
        let record = match self.backend.relogin_token(access_token, token_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Relogin failed for token {}: {}", token_id, e);
                return Err(e);
            }
        };
        let change = self.swap(token_id, record).await?;
        info!("Token {} refreshed", token_id);
        Ok(change)
    }

    async fn swap(&self, token_id: &str, record: OAuthTokenRecord) -> AppResult<TokenChange> {
        let mut board = self.board.write().await;
        if let Err(e) = board.replace(token_id, record.clone()) {
            warn!("{}", e);
            return Err(e);
        }
        Ok(TokenChange {
            token: record,
            tokens: board.records().to_vec(),
        })
    }

    pub async fn publishers(&self, access_token: &str) -> AppResult<Vec<Publisher>> {
        self.backend.list_publishers(access_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(id: &str, access_token: &str) -> OAuthTokenRecord {
        serde_json::from_value(json!({
            "id": id,
            "email": format!("{}@example.com", id),
            "access_token": access_token,
            "refresh_token": "rt",
        }))
        .unwrap()
    }

    fn board_with(records: Vec<OAuthTokenRecord>) -> RwLock<TokenBoard> {
        let mut board = TokenBoard::default();
        board.replace_all(records);
        RwLock::new(board)
    }

    fn credentials(redirect_uri: &str) -> CredentialsUpdate {
        CredentialsUpdate {
            client_id: "new-client".to_string(),
            client_secret: "new-secret".to_string(),
            redirect_uri: redirect_uri.to_string(),
        }
    }

    #[test]
    fn upsert_replaces_by_id_or_appends() {
        let mut board = TokenBoard::default();
        board.replace_all(vec![record("t1", "a"), record("t2", "b")]);

        board.upsert(record("t2", "b2"));
        board.upsert(record("t3", "c"));

        let ids: Vec<&str> = board.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
        assert_eq!(board.get("t2").unwrap().access_token, "b2");
        assert_eq!(board.get("t1").unwrap().access_token, "a");
    }

    #[tokio::test]
    async fn list_replaces_the_board() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens"))
            .and(header("authorization", "Bearer session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "t9", "email": "x@example.com" }]
            })))
            .mount(&server)
            .await;

        let backend = BackendClient::new(server.uri(), reqwest::Client::new());
        let board = board_with(vec![record("t1", "a")]);
        let records = TokenService::new(&backend, &board).list("session").await.unwrap();

        assert_eq!(records.len(), 1);
        let board = board.read().await;
        assert_eq!(board.records().len(), 1);
        assert!(board.get("t1").is_none());
        assert!(board.get("t9").is_some());
    }

    #[tokio::test]
    async fn invalid_email_never_reaches_the_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/add-new"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let backend = BackendClient::new(server.uri(), reqwest::Client::new());
        let board = board_with(Vec::new());
        let form = NewTokenForm {
            email: "not-an-email".to_string(),
            google_client_id: "c".to_string(),
            google_client_secret: "s".to_string(),
            google_redirect_uri: "https://console.example.com/cb".to_string(),
        };

        let result = TokenService::new(&backend, &board).add_new("session", &form).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(board.read().await.records().is_empty());
    }

    #[tokio::test]
    async fn credential_update_replaces_only_the_matching_record() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/tokens/t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t2",
                "email": "t2@example.com",
                "access_token": "b",
                "google_client_id": "new-client",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = BackendClient::new(server.uri(), reqwest::Client::new());
        let board = board_with(vec![record("t1", "a"), record("t2", "b")]);
        TokenService::new(&backend, &board)
            .update_credentials("session", "t2", &credentials("https://console.example.com/cb"))
            .await
            .unwrap();

        let board = board.read().await;
        assert_eq!(board.get("t2").unwrap().google_client_id, "new-client");
        assert_eq!(board.get("t1").unwrap(), &record("t1", "a"));
    }

    #[tokio::test]
    async fn failed_relogin_leaves_the_record_alone() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/t1/relogin"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({ "message": "refresh token revoked" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = BackendClient::new(server.uri(), reqwest::Client::new());
        let board = board_with(vec![record("t1", "old-access")]);
        let err = TokenService::new(&backend, &board)
            .relogin("session", "t1")
            .await
            .unwrap_err();

        match err {
            AppError::Backend { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "refresh token revoked");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(board.read().await.get("t1").unwrap().access_token, "old-access");
    }

    #[tokio::test]
    async fn successful_relogin_swaps_in_fresh_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/t1/relogin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "id": "t1", "email": "t1@example.com", "access_token": "fresh" }
            })))
            .mount(&server)
            .await;

        let backend = BackendClient::new(server.uri(), reqwest::Client::new());
        let board = board_with(vec![record("t1", "old-access"), record("t2", "b")]);
        TokenService::new(&backend, &board)
            .relogin("session", "t1")
            .await
            .unwrap();

        let board = board.read().await;
        assert_eq!(board.get("t1").unwrap().access_token, "fresh");
        assert_eq!(board.get("t2").unwrap().access_token, "b");
    }

    #[tokio::test]
    async fn invalid_redirect_uri_skips_the_patch() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let backend = BackendClient::new(server.uri(), reqwest::Client::new());
        let board = board_with(vec![record("t1", "a")]);
        let result = TokenService::new(&backend, &board)
            .update_credentials("session", "t1", &credentials("not a url"))
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(board.read().await.get("t1").unwrap(), &record("t1", "a"));
    }

    #[test]
    fn replace_refuses_a_record_for_another_id() {
        let mut board = TokenBoard::default();
        board.replace_all(vec![record("t1", "old"), record("t2", "b")]);

        let result = board.replace("t1", record("T1-new", "fresh"));
        assert!(matches!(result, Err(AppError::ExternalServiceError(_))));
        assert_eq!(board.records(), &[record("t1", "old"), record("t2", "b")]);

        board.replace("t2", record("t2", "b2")).unwrap();
        assert_eq!(board.records().len(), 2);
        assert_eq!(board.get("t2").unwrap().access_token, "b2");
    }

    #[tokio::test]
    async fn relogin_answer_for_another_token_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/t1/relogin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": { "id": "T1-new", "email": "t1@example.com", "access_token": "fresh" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = BackendClient::new(server.uri(), reqwest::Client::new());
        let board = board_with(vec![record("t1", "old"), record("t2", "b")]);
        let result = TokenService::new(&backend, &board).relogin("session", "t1").await;

        assert!(matches!(result, Err(AppError::ExternalServiceError(_))));
        let board = board.read().await;
        assert_eq!(board.records(), &[record("t1", "old"), record("t2", "b")]);
    }

    #[tokio::test]
    async fn rejected_credentials_keep_the_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/tokens/t1"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "message": "Redirect URI mismatch" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = BackendClient::new(server.uri(), reqwest::Client::new());
        let board = board_with(vec![record("t1", "a"), record("t2", "b")]);
        let err = TokenService::new(&backend, &board)
            .update_credentials("session", "t1", &credentials("https://console.example.com/cb"))
            .await
            .unwrap_err();

        match err {
            AppError::Backend { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Redirect URI mismatch");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(board.read().await.records(), &[record("t1", "a"), record("t2", "b")]);
    }

    #[tokio::test]
    async fn successful_update_returns_the_whole_board() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/tokens/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "id": "t1", "email": "t1@example.com", "access_token": "a", "google_client_id": "new-client" }
            })))
            .mount(&server)
            .await;

        let backend = BackendClient::new(server.uri(), reqwest::Client::new());
        let board = board_with(vec![record("t1", "a"), record("t2", "b")]);
        let change = TokenService::new(&backend, &board)
            .update_credentials("session", "t1", &credentials("https://console.example.com/cb"))
            .await
            .unwrap();

        assert_eq!(change.token.google_client_id, "new-client");
        assert_eq!(change.tokens.len(), 2);
        assert_eq!(change.tokens[0], change.token);
        assert_eq!(change.tokens[1], record("t2", "b"));
    }
}
