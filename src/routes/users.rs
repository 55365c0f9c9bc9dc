use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, patch},
    Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::AppResult;
use crate::middleware::AdminGuard;
use crate::models::{NewUser, User, UserUpdate};
use crate::services::UserService;
use crate::AppState;

/// Admin-only. Every mutation answers with the refetched list.
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", patch(update_user).delete(delete_user))
}

fn users_body(users: Vec<User>) -> Json<serde_json::Value> {
    Json(json!({ "users": users }))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminGuard(session): AdminGuard,
) -> AppResult<Json<serde_json::Value>> {
    let users = UserService::new(&state.backend)
        .list_users(&session.access_token)
        .await?;
    Ok(users_body(users))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    AdminGuard(session): AdminGuard,
    Json(payload): Json<NewUser>,
) -> AppResult<Json<serde_json::Value>> {
    let users = UserService::new(&state.backend)
        .create_user(&session.access_token, &payload)
        .await?;
    Ok(users_body(users))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    AdminGuard(session): AdminGuard,
    Path(id): Path<String>,
    Json(payload): Json<UserUpdate>,
) -> AppResult<Json<serde_json::Value>> {
    let users = UserService::new(&state.backend)
        .update_user(&session.access_token, &id, &payload)
        .await?;
    Ok(users_body(users))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminGuard(session): AdminGuard,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let users = UserService::new(&state.backend)
        .delete_user(&session.access_token, &id)
        .await?;
    Ok(users_body(users))
}
