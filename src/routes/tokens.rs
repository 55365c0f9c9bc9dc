use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::AppResult;
use crate::middleware::AuthGuard;
use crate::models::{CredentialsUpdate, NewTokenForm, OAuthTokenRecord, Publisher};
use crate::services::{TokenChange, TokenService};
use crate::AppState;

pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tokens).post(add_token))
        .route("/publishers", get(list_publishers))
        .route("/:id", patch(update_credentials))
        .route("/:id/relogin", post(relogin))
}

fn service(state: &AppState) -> TokenService<'_> {
    TokenService::new(&state.backend, &state.tokens)
}

/// Changed record, the board it landed in, and the toast to show.
fn changed(change: TokenChange, message: &str) -> Json<serde_json::Value> {
    Json(json!({
        "token": change.token,
        "tokens": change.tokens,
        "toast": { "kind": "success", "message": message },
    }))
}

async fn list_tokens(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
) -> AppResult<Json<Vec<OAuthTokenRecord>>> {
    let records = service(&state).list(&session.access_token).await?;
    Ok(Json(records))
}

async fn add_token(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
    Json(form): Json<NewTokenForm>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let change = service(&state).add_new(&session.access_token, &form).await?;
    Ok((StatusCode::CREATED, changed(change, "Token added")))
}

async fn update_credentials(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
    Path(id): Path<String>,
    Json(update): Json<CredentialsUpdate>,
) -> AppResult<Json<serde_json::Value>> {
    let change = service(&state)
        .update_credentials(&session.access_token, &id, &update)
        .await?;
    Ok(changed(change, "Credentials updated"))
}

async fn relogin(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let change = service(&state).relogin(&session.access_token, &id).await?;
    Ok(changed(change, "Token refreshed"))
}

async fn list_publishers(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
) -> AppResult<Json<Vec<Publisher>>> {
    let publishers = service(&state).publishers(&session.access_token).await?;
    Ok(Json(publishers))
}
