/// OAuth Provider
/// Google authorization-code flow with PKCE, behind a trait so the callback
/// logic can run against any provider.
use crate::config::Config;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, error, info};

/// OAuth provider configuration
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
    /// Extra authorize parameters; Google needs `access_type=offline` and
    /// `prompt=consent` to hand out a refresh token every time.
    pub extra_auth_params: Vec<(String, String)>,
}

/// OAuth token response from provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// User information from OAuth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthUserInfo {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl OAuthUserInfo {
    /// Display name: `name`, then `given_name`, then the email's local part.
    pub fn display_name(&self, email: &str) -> String {
        if let Some(name) = self.name.as_ref().filter(|n| !n.is_empty()) {
            return name.clone();
        }
        if let Some(given_name) = self.given_name.as_ref().filter(|n| !n.is_empty()) {
            return given_name.clone();
        }
        email.split('@').next().unwrap_or(email).to_string()
    }
}

/// PKCE (Proof Key for Code Exchange) data
#[derive(Debug, Clone)]
pub struct PKCEData {
    pub code_verifier: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
}

impl PKCEData {
    /// Generate PKCE challenge data
    pub fn generate() -> Self {
        let code_verifier = Self::generate_code_verifier();
        let code_challenge = Self::generate_code_challenge(&code_verifier);

        Self {
            code_verifier,
            code_challenge,
            code_challenge_method: "S256".to_string(),
        }
    }

    fn generate_code_verifier() -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    fn generate_code_challenge(verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let result = hasher.finalize();
        URL_SAFE_NO_PAD.encode(result)
    }
}

/// OAuth provider trait
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Generate authorization URL
    fn authorization_url(&self, state: &str, pkce: &PKCEData) -> AppResult<String>;

    /// Exchange authorization code for tokens
    async fn exchange_code(&self, code: &str, pkce_verifier: &str)
        -> AppResult<OAuthTokenResponse>;

    /// Get user information
    async fn get_user_info(&self, access_token: &str) -> AppResult<OAuthUserInfo>;
}

/// Base OAuth provider implementation
pub struct BaseOAuthProvider {
    config: OAuthProviderConfig,
    client: Client,
}

impl BaseOAuthProvider {
    pub fn new(config: OAuthProviderConfig, client: Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl OAuthProvider for BaseOAuthProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn authorization_url(&self, state: &str, pkce: &PKCEData) -> AppResult<String> {
        let scope_str = self.config.scopes.join(" ");
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("state", state),
            ("scope", scope_str.as_str()),
            ("code_challenge", pkce.code_challenge.as_str()),
            ("code_challenge_method", pkce.code_challenge_method.as_str()),
        ];
        for (key, value) in &self.config.extra_auth_params {
            params.push((key.as_str(), value.as_str()));
        }

        let url = reqwest::Url::parse_with_params(&self.config.authorize_url, &params)
            .map_err(|e| AppError::Internal(format!("Failed to build auth URL: {}", e)))?;

        Ok(url.to_string())
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> AppResult<OAuthTokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code_verifier", pkce_verifier),
        ];

        debug!("Exchanging code for token with {}", self.config.name);

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!("Token exchange failed: {}", e);
                AppError::ExternalServiceError(format!("Token exchange failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Token exchange failed: {} - {}", status, error_text);
            return Err(AppError::ExternalServiceError(format!(
                "Token exchange failed: {} - {}",
                status, error_text
            )));
        }

        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            error!("Failed to parse token response: {}", e);
            AppError::ExternalServiceError(format!("Failed to parse token response: {}", e))
        })?;

        debug!("Token exchange successful for {}", self.config.name);
        Ok(token_response)
    }

    async fn get_user_info(&self, access_token: &str) -> AppResult<OAuthUserInfo> {
        debug!("Fetching user info from {}", self.config.userinfo_url);

        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch user info: {}", e);
                AppError::ExternalServiceError(format!("Failed to fetch user info: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("User info fetch failed: {} - {}", status, error_text);
            return Err(AppError::ExternalServiceError(format!(
                "User info fetch failed: {} - {}",
                status, error_text
            )));
        }

        let user_info: OAuthUserInfo = response.json().await.map_err(|e| {
            error!("Failed to parse user info: {}", e);
            AppError::ExternalServiceError(format!("Failed to parse user info: {}", e))
        })?;

        debug!("User info fetched successfully for sub: {}", user_info.sub);
        Ok(user_info)
    }
}

/// Create Google OAuth provider
pub fn create_google_provider(config: &Config, client: Client) -> AppResult<BaseOAuthProvider> {
    if config.google_client_id.is_empty() || config.google_client_secret.is_empty() {
        return Err(AppError::Config(
            "GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET are required".to_string(),
        ));
    }

    let provider_config = OAuthProviderConfig {
        name: "google".to_string(),
        client_id: config.google_client_id.clone(),
        client_secret: config.google_client_secret.clone(),
        authorize_url: config.google_auth_url.clone(),
        token_url: config.google_token_url.clone(),
        userinfo_url: config.google_userinfo_url.clone(),
        scopes: config
            .google_oauth_scope
            .split_whitespace()
            .map(|s| s.to_string())
            .collect(),
        redirect_uri: config.google_redirect_uri.clone(),
        extra_auth_params: vec![
            ("access_type".to_string(), "offline".to_string()),
            ("prompt".to_string(), "consent".to_string()),
        ],
    };

    info!("Google OAuth provider configured");
    Ok(BaseOAuthProvider::new(provider_config, client))
}
