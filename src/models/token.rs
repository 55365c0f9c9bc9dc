use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Backend-owned Google credential set for one AdMob account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthTokenRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub google_client_id: String,
    #[serde(default)]
    pub google_client_secret: String,
    #[serde(default)]
    pub google_redirect_uri: String,
    #[serde(default)]
    pub publisher_ids: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// Body of `POST /tokens/save-token`, sent after a Google sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveTokenRequest {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub email: String,
}

/// The "add token" form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTokenForm {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Client ID is required"))]
    pub google_client_id: String,
    #[validate(length(min = 1, message = "Client secret is required"))]
    pub google_client_secret: String,
    #[validate(url(message = "Redirect URI must be a valid URL"))]
    pub google_redirect_uri: String,
}

/// Credential edit. Accepts the short field names from the form and sends
/// the backend's `google_*` names.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CredentialsUpdate {
    #[serde(rename = "google_client_id", alias = "client_id")]
    #[validate(length(min = 1, message = "Client ID is required"))]
    pub client_id: String,
    #[serde(rename = "google_client_secret", alias = "client_secret")]
    #[validate(length(min = 1, message = "Client secret is required"))]
    pub client_secret: String,
    #[serde(rename = "google_redirect_uri", alias = "redirect_uri")]
    #[validate(url(message = "Redirect URI must be a valid URL"))]
    pub redirect_uri: String,
}
