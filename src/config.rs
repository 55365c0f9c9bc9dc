use crate::error::{AppError, AppResult};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const GOOGLE_OAUTH_SCOPE: &str =
    "openid email profile https://www.googleapis.com/auth/admob.readonly";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Base URL of the AdMob REST backend; every backend path is joined onto it.
    pub backend_url: String,
    /// Origin the console is served from. The linking popup posts only to it.
    pub public_origin: String,

    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub google_oauth_scope: String,
    pub google_auth_url: String,
    pub google_token_url: String,
    pub google_userinfo_url: String,

    /// Where authenticated visitors of `/` and `/login` are sent.
    pub dashboard_landing: String,
    pub admin_emails: Vec<String>,
    pub secure_cookies: bool,
    pub session_ttl_days: i64,
    pub require_confirmed_persist: bool,
    pub popup_close_delay_ms: u64,
    pub backend_timeout_secs: u64,
}

impl Config {
    /// Defaults for everything except the backend location.
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            backend_url: backend_url.into(),
            public_origin: "http://localhost:3000".to_string(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_redirect_uri: "http://localhost:3000/auth/google/callback".to_string(),
            google_oauth_scope: GOOGLE_OAUTH_SCOPE.to_string(),
            google_auth_url: GOOGLE_AUTH_URL.to_string(),
            google_token_url: GOOGLE_TOKEN_URL.to_string(),
            google_userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            dashboard_landing: "/dashboard/apps".to_string(),
            admin_emails: Vec::new(),
            secure_cookies: true,
            session_ttl_days: 30,
            require_confirmed_persist: false,
            popup_close_delay_ms: 1500,
            backend_timeout_secs: 30,
        }
    }

    pub fn from_env() -> AppResult<Self> {
        let backend_url = std::env::var("BACKEND_URL")
            .map_err(|_| AppError::Config("BACKEND_URL is required".to_string()))?;
        url::Url::parse(&backend_url)
            .map_err(|e| AppError::Config(format!("BACKEND_URL: {}", e)))?;

        let mut config = Self::new(backend_url.trim_end_matches('/'));

        if let Ok(host) = std::env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.port = port
                .parse()
                .map_err(|e| AppError::Config(format!("PORT: {}", e)))?;
        }
        if let Ok(origin) = std::env::var("PUBLIC_ORIGIN") {
            let parsed = url::Url::parse(&origin)
                .map_err(|e| AppError::Config(format!("PUBLIC_ORIGIN: {}", e)))?;
            config.public_origin = parsed.origin().ascii_serialization();
        }

        config.google_client_id = std::env::var("GOOGLE_CLIENT_ID").unwrap_or_default();
        config.google_client_secret = std::env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default();
        if let Ok(uri) = std::env::var("GOOGLE_REDIRECT_URI") {
            config.google_redirect_uri = uri;
        }
        if let Ok(scope) = std::env::var("GOOGLE_OAUTH_SCOPE") {
            config.google_oauth_scope = scope;
        }

        if let Ok(landing) = std::env::var("DASHBOARD_LANDING") {
            if !landing.starts_with('/') {
                return Err(AppError::Config(
                    "DASHBOARD_LANDING must be an absolute path".to_string(),
                ));
            }
            config.dashboard_landing = landing;
        }
        if let Ok(emails) = std::env::var("ADMIN_EMAILS") {
            config.admin_emails = parse_list(&emails);
        }

        config.secure_cookies = env_flag("SECURE_COOKIES", config.secure_cookies);
        config.require_confirmed_persist =
            env_flag("REQUIRE_CONFIRMED_PERSIST", config.require_confirmed_persist);

        if let Ok(days) = std::env::var("SESSION_TTL_DAYS") {
            config.session_ttl_days = days
                .parse()
                .map_err(|e| AppError::Config(format!("SESSION_TTL_DAYS: {}", e)))?;
        }
        if let Ok(delay) = std::env::var("POPUP_CLOSE_DELAY_MS") {
            config.popup_close_delay_ms = delay
                .parse()
                .map_err(|e| AppError::Config(format!("POPUP_CLOSE_DELAY_MS: {}", e)))?;
        }
        if let Ok(secs) = std::env::var("BACKEND_TIMEOUT_SECS") {
            config.backend_timeout_secs = secs
                .parse()
                .map_err(|e| AppError::Config(format!("BACKEND_TIMEOUT_SECS: {}", e)))?;
        }

        Ok(config)
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email.trim()))
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
