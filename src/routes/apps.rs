use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthGuard;
use crate::models::AppInfo;
use crate::AppState;

pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard/apps", get(my_apps))
        .route("/dashboard/apps/:id", get(get_app).patch(update_app))
        .route("/dashboard/publishers/:id/apps", get(publisher_apps))
        .route("/dashboard/publishers/:id/sync", post(sync_publisher))
}

/// Apps owned by the signed-in user; needs the id from `userInfo`.
async fn my_apps(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
) -> AppResult<Json<Vec<AppInfo>>> {
    let user_id = session
        .user_id()
        .ok_or(AppError::MissingIdentifier("user id"))?;
    let apps = state
        .backend
        .apps_for_user(&session.access_token, user_id)
        .await?;
    Ok(Json(apps))
}

async fn get_app(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let app = state.backend.get_app(&session.access_token, &id).await?;
    Ok(Json(app))
}

async fn update_app(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> AppResult<Json<AppInfo>> {
    if !patch.is_object() {
        return Err(AppError::BadRequest(
            "App update must be a JSON object".to_string(),
        ));
    }
    let app = state
        .backend
        .update_app(&session.access_token, &id, &patch)
        .await?;
    Ok(Json(app))
}

async fn publisher_apps(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
    Path(publisher_id): Path<String>,
) -> AppResult<Json<Vec<AppInfo>>> {
    let apps = state
        .backend
        .apps_for_publisher(&session.access_token, &publisher_id)
        .await?;
    Ok(Json(apps))
}

async fn sync_publisher(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
    Path(publisher_id): Path<String>,
) -> AppResult<Json<Value>> {
    let result = state
        .backend
        .sync_from_admob(&session.access_token, &publisher_id)
        .await?;
    tracing::info!("AdMob sync requested for publisher {}", publisher_id);
    Ok(Json(result))
}
