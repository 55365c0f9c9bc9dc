mod config;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::services::{create_google_provider, BackendClient, OAuthManager, OAuthProvider, TokenBoard};

pub struct AppState {
    pub config: Arc<Config>,
    pub backend: BackendClient,
    pub oauth_manager: Arc<OAuthManager>,
    pub tokens: RwLock<TokenBoard>,
}

impl AppState {
    pub fn new(config: Config, http_client: reqwest::Client, provider: Arc<dyn OAuthProvider>) -> Self {
        let backend = BackendClient::new(config.backend_url.clone(), http_client);
        let oauth_manager = Arc::new(OAuthManager::new(&config, provider, backend.clone()));

        Self {
            config: Arc::new(config),
            backend,
            oauth_manager,
            tokens: RwLock::new(TokenBoard::default()),
        }
    }
}

/// `RUST_LOG` directives (e.g. `info,admob_console=debug`); unset or
/// unparsable falls back to `info`.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok()))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting AdMob console");

    let config = Config::from_env()?;
    info!("Configuration loaded (backend: {})", config.backend_url);

    // Shared HTTP client for the backend and Google
    let http_client = reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .tcp_nodelay(true)
        .timeout(std::time::Duration::from_secs(config.backend_timeout_secs))
        .build()?;

    let provider = create_google_provider(&config, http_client.clone())?;

    if config.require_confirmed_persist {
        info!("Token persist: confirmed before sign-in completes");
    } else {
        info!("Token persist: detached; failures queue for /api/auth/reconcile");
    }

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    let state = Arc::new(AppState::new(config, http_client, Arc::new(provider)));
    let app = routes::build_router(state);

    info!("Console listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
