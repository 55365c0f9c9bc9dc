pub mod apps;
pub mod auth;
pub mod public;
pub mod tokens;
pub mod users;


use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::Config;
use crate::middleware::auth_gate;
use crate::AppState;

/// Full console router. The gate wraps every route; handlers behind it
/// still check the session themselves through the guard extractors.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(public::create_routes())
        .merge(auth::create_routes())
        .merge(apps::create_routes())
        .nest("/dashboard/tokens", tokens::create_routes())
        .nest("/dashboard/users", users::create_routes())
        .layer(from_fn_with_state(state.clone(), auth_gate))
        .with_state(state.clone())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer(&state.config)),
        )
}

/// Credentialed CORS for the configured console origin only.
fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600));

    match HeaderValue::from_str(&config.public_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!("PUBLIC_ORIGIN is not a valid header value: {}", e);
            layer
        }
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": true }))
}
