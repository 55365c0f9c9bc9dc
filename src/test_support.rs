//! Shared fixtures for handler and service tests.
use async_trait::async_trait;
use axum::http::{header, HeaderValue, Response};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppResult;
use crate::services::oauth_provider::{OAuthProvider, OAuthTokenResponse, OAuthUserInfo, PKCEData};
use crate::AppState;

/// Google stand-in: every code exchanges to the same tokens and profile.
pub struct StubProvider {
    email: String,
}

impl StubProvider {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
        }
    }
}

#[async_trait]
impl OAuthProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn authorization_url(&self, state: &str, pkce: &PKCEData) -> AppResult<String> {
        Ok(format!(
            "https://accounts.example.com/auth?state={}&code_challenge={}",
            state, pkce.code_challenge
        ))
    }

    async fn exchange_code(&self, _code: &str, _pkce_verifier: &str) -> AppResult<OAuthTokenResponse> {
        Ok(OAuthTokenResponse {
            access_token: "ya29.stub".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: Some(3599),
            refresh_token: Some("1//stub".to_string()),
            id_token: None,
            scope: Some("openid email".to_string()),
        })
    }

    async fn get_user_info(&self, _access_token: &str) -> AppResult<OAuthUserInfo> {
        Ok(OAuthUserInfo {
            sub: "google-sub-1".to_string(),
            email: Some(self.email.clone()),
            email_verified: Some(true),
            name: Some("Ops Person".to_string()),
            given_name: None,
            picture: None,
            extra: HashMap::new(),
        })
    }
}

pub fn test_config(backend_url: &str) -> Config {
    let mut config = Config::new(backend_url);
    config.secure_cookies = false;
    config
}

pub fn test_state(config: Config) -> Arc<AppState> {
    Arc::new(AppState::new(
        config,
        reqwest::Client::new(),
        Arc::new(StubProvider::new("ops@example.com")),
    ))
}

/// `Cookie` header for a signed-in browser with the given role.
pub fn session_cookie(role: &str) -> HeaderValue {
    let user_info = format!(
        r#"{{"id":"u1","name":"Ops","email":"ops@example.com","role":"{}"}}"#,
        role
    );
    let value = format!(
        "accessToken=session-token; userInfo={}",
        urlencoding::encode(&user_info)
    );
    HeaderValue::from_str(&value).unwrap()
}

pub fn location<B>(response: &Response<B>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

pub fn set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}
