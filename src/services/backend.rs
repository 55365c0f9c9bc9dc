/// AdMob backend client
/// Every console operation that reads or mutates data goes through here.
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::{
    AppInfo, CredentialsUpdate, Envelope, NewTokenForm, NewUser, OAuthTokenRecord, Publisher,
    SaveTokenRequest, User, UserUpdate,
};

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    http: Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builds a bearer-authorized request, refusing before any I/O when the
    /// session has no access token.
    fn authorized(&self, method: Method, path: &str, access_token: &str) -> AppResult<RequestBuilder> {
        if access_token.trim().is_empty() {
            return Err(AppError::MissingIdentifier("access token"));
        }
        Ok(self
            .http
            .request(method, self.url(path))
            .bearer_auth(access_token))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> AppResult<T> {
        let response = request.send().await.map_err(|e| {
            warn!("Backend {} failed: {}", operation, e);
            AppError::Http(e)
        })?;
        let response = Self::ensure_success(response, operation).await?;

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            warn!("Failed to parse backend {} response: {}", operation, e);
            AppError::ExternalServiceError(format!("Unexpected {} response from backend", operation))
        })?;
        debug!("Backend {} succeeded", operation);
        Ok(envelope.into_inner())
    }

    async fn send_empty(&self, request: RequestBuilder, operation: &'static str) -> AppResult<()> {
        let response = request.send().await.map_err(|e| {
            warn!("Backend {} failed: {}", operation, e);
            AppError::Http(e)
        })?;
        Self::ensure_success(response, operation).await?;
        debug!("Backend {} succeeded", operation);
        Ok(())
    }

    /// Returns the response on 2xx, otherwise the backend's own error text.
    async fn ensure_success(response: Response, operation: &'static str) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = backend_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Backend request failed")
                .to_string()
        });
        warn!("Backend {} failed: {} - {}", operation, status, message);
        Err(AppError::Backend {
            status: status.as_u16(),
            message,
        })
    }

    // Tokens

    /// Unauthenticated on purpose: it is called with the freshly minted
    /// Google token before any console session exists.
    pub async fn save_token(&self, request: &SaveTokenRequest) -> AppResult<()> {
        let builder = self.http.post(self.url("/tokens/save-token")).json(request);
        self.send_empty(builder, "save token").await
    }

    pub async fn list_tokens(&self, access_token: &str) -> AppResult<Vec<OAuthTokenRecord>> {
        let builder = self.authorized(Method::GET, "/tokens", access_token)?;
        self.send(builder, "list tokens").await
    }

    pub async fn add_token(
        &self,
        access_token: &str,
        form: &NewTokenForm,
    ) -> AppResult<OAuthTokenRecord> {
        let builder = self
            .authorized(Method::POST, "/tokens/add-new", access_token)?
            .json(form);
        self.send(builder, "add token").await
    }

    pub async fn update_token(
        &self,
        access_token: &str,
        token_id: &str,
        update: &CredentialsUpdate,
    ) -> AppResult<OAuthTokenRecord> {
        let path = format!("/tokens/{}", segment(token_id)?);
        let builder = self
            .authorized(Method::PATCH, &path, access_token)?
            .json(update);
        self.send(builder, "update token").await
    }

    pub async fn relogin_token(
        &self,
        access_token: &str,
        token_id: &str,
    ) -> AppResult<OAuthTokenRecord> {
        let path = format!("/tokens/{}/relogin", segment(token_id)?);
        let builder = self.authorized(Method::POST, &path, access_token)?;
        self.send(builder, "relogin token").await
    }

    pub async fn list_publishers(&self, access_token: &str) -> AppResult<Vec<Publisher>> {
        let builder = self.authorized(Method::GET, "/tokens/publishers", access_token)?;
        self.send(builder, "list publishers").await
    }

    // Users

    pub async fn list_users(&self, access_token: &str) -> AppResult<Vec<User>> {
        let builder = self.authorized(Method::GET, "/users", access_token)?;
        self.send(builder, "list users").await
    }

    /// Mutation answers are not decoded; callers refetch the list.
    pub async fn create_user(&self, access_token: &str, user: &NewUser) -> AppResult<()> {
        let builder = self
            .authorized(Method::POST, "/users", access_token)?
            .json(user);
        self.send_empty(builder, "create user").await
    }

    pub async fn update_user(
        &self,
        access_token: &str,
        user_id: &str,
        update: &UserUpdate,
    ) -> AppResult<()> {
        let path = format!("/users/{}", segment(user_id)?);
        let builder = self
            .authorized(Method::PATCH, &path, access_token)?
            .json(update);
        self.send_empty(builder, "update user").await
    }

    pub async fn delete_user(&self, access_token: &str, user_id: &str) -> AppResult<()> {
        let path = format!("/users/{}", segment(user_id)?);
        let builder = self.authorized(Method::DELETE, &path, access_token)?;
        self.send_empty(builder, "delete user").await
    }

    // Apps

    pub async fn apps_for_user(&self, access_token: &str, user_id: &str) -> AppResult<Vec<AppInfo>> {
        let path = format!("/app-info/user/{}", segment(user_id)?);
        let builder = self.authorized(Method::GET, &path, access_token)?;
        self.send(builder, "list user apps").await
    }

    pub async fn update_app(
        &self,
        access_token: &str,
        app_id: &str,
        patch: &impl Serialize,
    ) -> AppResult<AppInfo> {
        let path = format!("/app-info/{}", segment(app_id)?);
        let builder = self
            .authorized(Method::PATCH, &path, access_token)?
            .json(patch);
        self.send(builder, "update app").await
    }

    pub async fn get_app(&self, access_token: &str, app_id: &str) -> AppResult<Value> {
        let path = format!("/apps/{}", segment(app_id)?);
        let builder = self.authorized(Method::GET, &path, access_token)?;
        self.send(builder, "get app").await
    }

    pub async fn apps_for_publisher(
        &self,
        access_token: &str,
        publisher_id: &str,
    ) -> AppResult<Vec<AppInfo>> {
        let path = format!("/app-info/publisher/{}", segment(publisher_id)?);
        let builder = self.authorized(Method::GET, &path, access_token)?;
        self.send(builder, "list publisher apps").await
    }

    pub async fn sync_from_admob(&self, access_token: &str, publisher_id: &str) -> AppResult<Value> {
        if publisher_id.trim().is_empty() {
            return Err(AppError::BadRequest("publisher_id is required".to_string()));
        }
        let builder = self
            .authorized(Method::GET, "/app-info/sync-from-admob", access_token)?
            .query(&[("publisher_id", publisher_id)]);
        self.send(builder, "sync from AdMob").await
    }
}

/// Percent-encodes one path segment; empty identifiers never reach the wire.
fn segment(id: &str) -> AppResult<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::BadRequest("Identifier is required".to_string()));
    }
    Ok(urlencoding::encode(id).into_owned())
}

/// Pulls the human-readable message out of a backend error body.
/// Accepts `message`, `error` or `detail`, and string arrays (validation
/// errors); plain-text bodies are used as-is.
fn backend_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => return Some(trimmed.to_string()),
    };

    ["message", "error", "detail"]
        .iter()
        .filter_map(|key| value.get(key))
        .find_map(|field| match field {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) => {
                let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                (!parts.is_empty()).then(|| parts.join("; "))
            }
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
}
