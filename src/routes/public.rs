use axum::{extract::Query, response::Json, routing::get, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(landing))
}

#[derive(Debug, Deserialize)]
struct LandingQuery {
    error: Option<String>,
}

/// Signed-out landing. Signed-in visitors never get here; the gate sends
/// them to the dashboard first.
async fn landing(Query(query): Query<LandingQuery>) -> Json<serde_json::Value> {
    Json(json!({
        "page": "login",
        "login_url": "/auth/google/login?mode=signin",
        "error": query.error,
    }))
}
