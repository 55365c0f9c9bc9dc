/// Auth Routes
/// Google login, callback, sign-out and the persist reconciliation endpoint.
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::middleware::AuthGuard;
use crate::services::{FlowMode, ReconcileReport, SessionStore, SessionWriter};
use crate::utils::popup::{render_link_page, LinkMessage};
use crate::AppState;

pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google/login", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/logout", get(logout).post(logout))
        .route("/api/auth/session", get(current_session))
        .route("/api/auth/pending", get(pending_persists))
        .route("/api/auth/reconcile", post(reconcile))
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    #[serde(default)]
    mode: FlowMode,
    nonce: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn login_error(reason: &str) -> Response {
    Redirect::to(&format!("/login?error={}", urlencoding::encode(reason))).into_response()
}

fn session_writer(state: &AppState) -> SessionWriter {
    SessionWriter::new(state.config.secure_cookies, state.config.session_ttl_days)
}

/// Starts the Google flow
async fn google_login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> AppResult<Redirect> {
    let authorization_url = state
        .oauth_manager
        .initiate_login(query.mode, query.nonce)
        .await?;

    info!(
        "OAuth login initiated for provider: {} ({:?})",
        state.oauth_manager.provider_name(),
        query.mode
    );
    Ok(Redirect::to(&authorization_url))
}

/// Google redirect target. Sign-in ends with session cookies and the
/// dashboard; linking ends with the popup page and leaves cookies alone.
async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(reason) = query.error {
        warn!("Google returned an error: {}", reason);
        return login_error(&reason);
    }
    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return login_error("missing_code");
    };

    let outcome = match state.oauth_manager.handle_callback(&code, &oauth_state).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("OAuth callback failed: {}", e);
            return login_error("oauth_failed");
        }
    };

    if let Err(e) = state.oauth_manager.persist(outcome.save_request.clone()).await {
        debug!("Confirmed persist failed: {}", e);
        return match outcome.mode {
            FlowMode::Signin => login_error("persist_failed"),
            FlowMode::Link => e.into_response(),
        };
    }

    match outcome.mode {
        FlowMode::Signin => {
            let jar = session_writer(&state).establish(
                jar,
                &outcome.session,
                Some(&outcome.admob_token),
            );
            info!("Operator signed in: {}", outcome.save_request.email);
            (jar, Redirect::to(&state.config.dashboard_landing)).into_response()
        }
        FlowMode::Link => {
            let (name, email) = outcome
                .user_info()
                .map(|info| (info.name.clone(), info.email.clone()))
                .unwrap_or_default();
            info!("Google account linked: {}", email);
            let message = LinkMessage::new(name, email, outcome.nonce.clone());
            Html(render_link_page(&message, state.config.popup_close_delay_ms)).into_response()
        }
    }
}

async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    debug!("Clearing session cookies");
    (session_writer(&state).clear(jar), Redirect::to("/"))
}

/// Who is signed in, plus the AdMob token expiry the browser holds.
async fn current_session(
    jar: CookieJar,
    AuthGuard(session): AuthGuard,
) -> Json<serde_json::Value> {
    let admob_expiry = SessionStore::new(&jar)
        .admob_token()
        .and_then(|token| token.expiry_date);
    Json(json!({
        "user": session.user_info,
        "role": session.role(),
        "admob_token_expires_at": admob_expiry,
    }))
}

async fn pending_persists(
    State(state): State<Arc<AppState>>,
    AuthGuard(_session): AuthGuard,
) -> Json<serde_json::Value> {
    // Tokens stay server-side; only the account and failure are listed.
    let pending: Vec<serde_json::Value> = state
        .oauth_manager
        .pending_persists()
        .await
        .into_iter()
        .map(|entry| {
            json!({
                "email": entry.request.email,
                "error": entry.error,
                "failed_at": entry.failed_at,
            })
        })
        .collect();
    Json(json!({ "pending": pending }))
}

async fn reconcile(
    State(state): State<Arc<AppState>>,
    AuthGuard(session): AuthGuard,
) -> Json<ReconcileReport> {
    let report = state.oauth_manager.reconcile().await;
    info!(
        "Reconcile by {}: {} submitted, {} persisted, {} failed",
        session
            .user_info
            .as_ref()
            .map(|info| info.email.as_str())
            .unwrap_or("unknown"),
        report.submitted,
        report.persisted.len(),
        report.failed.len()
    );
    Json(report)
}
