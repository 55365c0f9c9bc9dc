/// OAuth Callback Coordinator
/// Runs the Google sign-in flow, forwards the minted tokens to the backend
/// and produces the session the browser will carry.
use super::backend::BackendClient;
use super::oauth_provider::{OAuthProvider, OAuthTokenResponse, OAuthUserInfo, PKCEData};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{AdmobToken, Role, SaveTokenRequest, Session, UserInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const STATE_TTL_SECS: i64 = 600;
const MAX_NONCE_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowMode {
    /// Operator sign-in; ends with session cookies.
    #[default]
    Signin,
    /// Account-linking popup; ends with a message to the opener window.
    Link,
}

/// OAuth state data stored temporarily during OAuth flow
#[derive(Debug, Clone)]
pub struct OAuthState {
    pub mode: FlowMode,
    pub pkce: PKCEData,
    pub nonce: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub mode: FlowMode,
    pub nonce: Option<String>,
    pub session: Session,
    pub admob_token: AdmobToken,
    pub save_request: SaveTokenRequest,
}

impl CallbackOutcome {
    pub fn user_info(&self) -> Option<&UserInfo> {
        self.session.user_info.as_ref()
    }
}

/// A token save the backend did not accept. Kept until an operator
/// reconciles it.
#[derive(Debug, Clone)]
pub struct PendingPersist {
    pub request: SaveTokenRequest,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize)]
pub struct ReconcileReport {
    pub submitted: usize,
    pub persisted: Vec<String>,
    pub failed: Vec<String>,
}

pub struct OAuthManager {
    provider: Arc<dyn OAuthProvider>,
    backend: BackendClient,
    states: Arc<RwLock<HashMap<String, OAuthState>>>,
    pending: Arc<RwLock<HashMap<String, PendingPersist>>>,
    config: Config,
}

impl OAuthManager {
    pub fn new(config: &Config, provider: Arc<dyn OAuthProvider>, backend: BackendClient) -> Self {
        Self {
            provider,
            backend,
            states: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(RwLock::new(HashMap::new())),
            config: config.clone(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn current_timestamp() -> i64 {
        Utc::now().timestamp()
    }

    /// Generate state parameter
    fn generate_state() -> String {
        use base64::Engine;
        use rand::Rng;
        let mut rng = rand::rng();
        let random_bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
    }

    /// Store OAuth state, dropping any older than the TTL
    async fn store_state(&self, state_id: String, state_data: OAuthState) {
        let mut states = self.states.write().await;
        let current_time = Self::current_timestamp();
        states.retain(|_, state| current_time - state.created_at < STATE_TTL_SECS);
        states.insert(state_id, state_data);
    }

    /// Retrieve and remove OAuth state; expired entries count as missing
    async fn retrieve_state(&self, state_id: &str) -> Option<OAuthState> {
        let mut states = self.states.write().await;
        states
            .remove(state_id)
            .filter(|state| Self::current_timestamp() - state.created_at < STATE_TTL_SECS)
    }

    /// Initiate OAuth login flow; returns the provider URL to redirect to.
    pub async fn initiate_login(&self, mode: FlowMode, nonce: Option<String>) -> AppResult<String> {
        let nonce = match nonce {
            Some(nonce) => Some(validate_nonce(nonce)?),
            None => None,
        };

        let state_id = Self::generate_state();
        let pkce = PKCEData::generate();
        let auth_url = self.provider.authorization_url(&state_id, &pkce)?;

        self.store_state(
            state_id,
            OAuthState {
                mode,
                pkce,
                nonce,
                created_at: Self::current_timestamp(),
            },
        )
        .await;

        debug!("Generated {:?} auth URL for {}", mode, self.provider.name());
        Ok(auth_url)
    }

    /// Handle OAuth callback: exchange the code, read the profile and build
    /// the session. Nothing is persisted here; see [`Self::persist`].
    pub async fn handle_callback(&self, code: &str, state_id: &str) -> AppResult<CallbackOutcome> {
        let state = self
            .retrieve_state(state_id)
            .await
            .ok_or_else(|| AppError::Auth("Invalid or expired OAuth state".to_string()))?;

        let token = self
            .provider
            .exchange_code(code, &state.pkce.code_verifier)
            .await?;
        let profile = self.provider.get_user_info(&token.access_token).await?;

        let email = profile
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Auth("Email not provided by OAuth provider".to_string()))?;

        info!(
            "OAuth callback successful for {} (user: {}, mode: {:?})",
            self.provider.name(),
            profile.sub,
            state.mode
        );

        Ok(self.build_outcome(state, token, &profile, email))
    }

    fn build_outcome(
        &self,
        state: OAuthState,
        token: OAuthTokenResponse,
        profile: &OAuthUserInfo,
        email: String,
    ) -> CallbackOutcome {
        let role = if self.config.is_admin_email(&email) {
            Role::Admin
        } else {
            Role::User
        };

        let issued_at_ms = Utc::now().timestamp_millis();
        let admob_token = AdmobToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            token_type: Some(token.token_type.clone()),
            scope: token.scope.clone(),
            expiry_date: token.expires_in.map(|secs| issued_at_ms + secs * 1000),
        };

        let save_request = SaveTokenRequest {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            email: email.clone(),
        };

        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user_info: Some(UserInfo {
                id: profile.sub.clone(),
                name: profile.display_name(&email),
                email,
                role,
            }),
        };

        CallbackOutcome {
            mode: state.mode,
            nonce: state.nonce,
            session,
            admob_token,
            save_request,
        }
    }

    /// Forwards tokens to `POST /tokens/save-token`.
    ///
    /// Detached by default: the save runs in the background, the caller
    /// proceeds immediately and a failure is only logged and queued for
    /// reconciliation. With `require_confirmed_persist` the caller waits
    /// and gets the error.
    pub async fn persist(&self, request: SaveTokenRequest) -> AppResult<()> {
        if self.config.require_confirmed_persist {
            return match self.backend.save_token(&request).await {
                Ok(()) => {
                    self.pending.write().await.remove(&request.email);
                    info!("Persisted tokens for {}", request.email);
                    Ok(())
                }
                Err(e) => {
                    record_pending(&self.pending, request, &e).await;
                    Err(e)
                }
            };
        }

        let backend = self.backend.clone();
        let pending = self.pending.clone();
        tokio::spawn(async move {
            match backend.save_token(&request).await {
                Ok(()) => {
                    pending.write().await.remove(&request.email);
                    debug!("Persisted tokens for {}", request.email);
                }
                Err(e) => record_pending(&pending, request, &e).await,
            }
        });
        Ok(())
    }

    pub async fn pending_persists(&self) -> Vec<PendingPersist> {
        let pending = self.pending.read().await;
        let mut entries: Vec<PendingPersist> = pending.values().cloned().collect();
        entries.sort_by(|a, b| a.failed_at.cmp(&b.failed_at));
        entries
    }

    /// Re-submits each queued save once. Entries are dropped only after the
    /// backend accepts them; a newer failure for the same email that lands
    /// meanwhile is kept.
    pub async fn reconcile(&self) -> ReconcileReport {
        let snapshot = self.pending_persists().await;
        let mut report = ReconcileReport {
            submitted: snapshot.len(),
            ..Default::default()
        };

        for entry in snapshot {
            let email = entry.request.email.clone();
            match self.backend.save_token(&entry.request).await {
                Ok(()) => {
                    let mut pending = self.pending.write().await;
                    if pending
                        .get(&email)
                        .is_some_and(|current| current.request == entry.request)
                    {
                        pending.remove(&email);
                    }
                    info!("Reconciled tokens for {}", email);
                    report.persisted.push(email);
                }
                Err(e) => {
                    record_pending(&self.pending, entry.request, &e).await;
                    report.failed.push(email);
                }
            }
        }

        report
    }
}

async fn record_pending(
    pending: &RwLock<HashMap<String, PendingPersist>>,
    request: SaveTokenRequest,
    error: &AppError,
) {
    warn!("Token persist failed for {}: {}", request.email, error);
    pending.write().await.insert(
        request.email.clone(),
        PendingPersist {
            request,
            error: error.to_string(),
            failed_at: Utc::now(),
        },
    );
}

fn validate_nonce(nonce: String) -> AppResult<String> {
    let valid = !nonce.is_empty()
        && nonce.len() <= MAX_NONCE_LEN
        && nonce
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(nonce)
    } else {
        Err(AppError::BadRequest("Invalid nonce".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_config, StubProvider};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(server: &MockServer, confirmed: bool) -> OAuthManager {
        let mut config = test_config(&server.uri());
        config.admin_emails = vec!["Boss@Example.com".to_string()];
        config.require_confirmed_persist = confirmed;
        OAuthManager::new(
            &config,
            Arc::new(StubProvider::new("ops@example.com")),
            BackendClient::new(server.uri(), reqwest::Client::new()),
        )
    }

    fn state_from(url: &str) -> String {
        let url = url::Url::parse(url).unwrap();
        url.query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    async fn wait_for_pending(manager: &OAuthManager, count: usize) -> Vec<PendingPersist> {
        for _ in 0..100 {
            let pending = manager.pending_persists().await;
            if pending.len() == count {
                return pending;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        manager.pending_persists().await
    }

    #[tokio::test]
    async fn callback_builds_session_from_profile() {
        let server = MockServer::start().await;
        let manager = manager(&server, false);

        let url = manager.initiate_login(FlowMode::Signin, None).await.unwrap();
        let outcome = manager.handle_callback("code", &state_from(&url)).await.unwrap();

        assert_eq!(outcome.mode, FlowMode::Signin);
        assert_eq!(outcome.session.access_token, "ya29.stub");
        assert_eq!(outcome.session.refresh_token.as_deref(), Some("1//stub"));
        let info = outcome.user_info().unwrap();
        assert_eq!(info.email, "ops@example.com");
        assert_eq!(info.role, Role::User);
        assert_eq!(outcome.save_request.email, "ops@example.com");
        assert!(outcome.admob_token.expiry_date.is_some());
    }

    #[tokio::test]
    async fn state_is_single_use() {
        let server = MockServer::start().await;
        let manager = manager(&server, false);

        let state = state_from(&manager.initiate_login(FlowMode::Signin, None).await.unwrap());
        assert!(manager.handle_callback("code", &state).await.is_ok());
        assert!(matches!(
            manager.handle_callback("code", &state).await,
            Err(AppError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn admin_role_comes_from_configured_emails() {
        let server = MockServer::start().await;
        let mut config = test_config(&server.uri());
        config.admin_emails = vec!["boss@example.com".to_string()];
        let manager = OAuthManager::new(
            &config,
            Arc::new(StubProvider::new("BOSS@example.com")),
            BackendClient::new(server.uri(), reqwest::Client::new()),
        );

        let state = state_from(&manager.initiate_login(FlowMode::Signin, None).await.unwrap());
        let outcome = manager.handle_callback("code", &state).await.unwrap();
        assert_eq!(outcome.user_info().unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn link_mode_carries_nonce_and_rejects_bad_ones() {
        let server = MockServer::start().await;
        let manager = manager(&server, false);

        let url = manager
            .initiate_login(FlowMode::Link, Some("n-123_ok".to_string()))
            .await
            .unwrap();
        let outcome = manager.handle_callback("code", &state_from(&url)).await.unwrap();
        assert_eq!(outcome.mode, FlowMode::Link);
        assert_eq!(outcome.nonce.as_deref(), Some("n-123_ok"));

        assert!(matches!(
            manager
                .initiate_login(FlowMode::Link, Some("<script>".to_string()))
                .await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn detached_persist_failure_is_queued_not_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/save-token"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "message": "db down" })))
            .mount(&server)
            .await;
        let manager = manager(&server, false);

        let request = SaveTokenRequest {
            access_token: "at".to_string(),
            refresh_token: None,
            email: "ops@example.com".to_string(),
        };
        assert!(manager.persist(request.clone()).await.is_ok());

        let pending = wait_for_pending(&manager, 1).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].request, request);
        assert_eq!(pending[0].error, "db down");
    }

    #[tokio::test]
    async fn confirmed_persist_returns_the_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/save-token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let manager = manager(&server, true);

        let result = manager
            .persist(SaveTokenRequest {
                access_token: "at".to_string(),
                refresh_token: Some("rt".to_string()),
                email: "ops@example.com".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Backend { status: 500, .. })));
        assert_eq!(manager.pending_persists().await.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_drains_only_accepted_entries() {
        let failing = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens/save-token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&failing)
            .await;
        let manager = manager(&failing, true);

        for email in ["a@example.com", "b@example.com"] {
            let _ = manager
                .persist(SaveTokenRequest {
                    access_token: "at".to_string(),
                    refresh_token: None,
                    email: email.to_string(),
                })
                .await;
        }
        assert_eq!(manager.pending_persists().await.len(), 2);

        let report = manager.reconcile().await;
        assert_eq!(report.submitted, 2);
        assert!(report.persisted.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert_eq!(manager.pending_persists().await.len(), 2);

        failing.reset().await;
        Mock::given(method("POST"))
            .and(path("/tokens/save-token"))
            .respond_with(ResponseTemplate::new(201))
            .expect(2)
            .mount(&failing)
            .await;

        let report = manager.reconcile().await;
        assert_eq!(report.persisted.len(), 2);
        assert!(report.failed.is_empty());
        assert!(manager.pending_persists().await.is_empty());
    }
}
