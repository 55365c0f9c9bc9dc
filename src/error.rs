use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// An authorized action was attempted without the identifier it needs.
    /// Raised before any request leaves the console.
    #[error("Missing {0} in session")]
    MissingIdentifier(&'static str),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Non-2xx answer from the AdMob backend. `message` is the backend's own text.
    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Toast {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub toast: Toast,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<String>>,
}

/// Flattens validator output into `field -> messages`, falling back to the
/// rule code when a rule carries no message.
pub fn field_errors(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut fields = BTreeMap::new();
        let (status, error_message) = match &self {
            AppError::Config(ref e) => {
                tracing::error!("Configuration error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error".to_string(),
                )
            }
            AppError::Auth(ref e) => (StatusCode::UNAUTHORIZED, e.clone()),
            AppError::MissingIdentifier(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Validation(ref e) => {
                fields = field_errors(e);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Please correct the highlighted fields".to_string(),
                )
            }
            AppError::BadRequest(ref e) => (StatusCode::BAD_REQUEST, e.clone()),
            AppError::Backend { status, message } => {
                let code = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
                let code = if code.is_server_error() {
                    StatusCode::BAD_GATEWAY
                } else {
                    code
                };
                (code, message.clone())
            }
            AppError::ExternalServiceError(ref e) => {
                tracing::error!("External service error: {:?}", e);
                (StatusCode::BAD_GATEWAY, e.clone())
            }
            AppError::Http(ref e) => {
                tracing::error!("HTTP error: {:?}", e);
                (StatusCode::BAD_GATEWAY, "HTTP request failed".to_string())
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.clone())
            }
        };

        let body = ErrorResponse {
            toast: Toast {
                kind: "error".to_string(),
                message: error_message.clone(),
            },
            detail: error_message,
            fields,
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn backend_server_errors_become_bad_gateway_with_verbatim_message() {
        let (status, body) = body_of(AppError::Backend {
            status: 500,
            message: "Google refused the refresh token".to_string(),
        })
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.detail, "Google refused the refresh token");
        assert_eq!(body.toast.kind, "error");
        assert_eq!(body.toast.message, "Google refused the refresh token");
    }

    #[tokio::test]
    async fn backend_client_errors_keep_their_status() {
        let (status, _) = body_of(AppError::Backend {
            status: 404,
            message: "Token not found".to_string(),
        })
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_identifier_is_unauthorized() {
        let (status, body) = body_of(AppError::MissingIdentifier("access token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.detail, "Missing access token in session");
    }
}
