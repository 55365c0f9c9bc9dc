/// Edge filter: runs before any handler and redirects on session presence alone.
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::services::session::SessionStore;
use crate::AppState;

const PUBLIC_PATHS: [&str; 2] = ["/", "/login"];

const BYPASS_PREFIXES: [&str; 6] = ["/api/", "/auth/", "/_next/", "/static/", "/assets/", "/health"];

const BYPASS_EXACT: [&str; 3] = ["/api", "/favicon.ico", "/robots.txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// API routes, auth plumbing and static internals; never gated.
    Bypass,
    Public,
    Protected,
}

pub fn classify(path: &str) -> RouteClass {
    if BYPASS_EXACT.contains(&path) || BYPASS_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RouteClass::Bypass;
    }
    if PUBLIC_PATHS.contains(&path) {
        RouteClass::Public
    } else {
        RouteClass::Protected
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Redirect(String),
}

pub fn decide(path: &str, authenticated: bool, landing: &str) -> GateDecision {
    match (classify(path), authenticated) {
        (RouteClass::Protected, false) => GateDecision::Redirect("/".to_string()),
        (RouteClass::Public, true) => GateDecision::Redirect(landing.to_string()),
        _ => GateDecision::Pass,
    }
}

pub async fn auth_gate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let authenticated = SessionStore::new(&jar).is_authenticated();

    match decide(&path, authenticated, &state.config.dashboard_landing) {
        GateDecision::Pass => next.run(request).await,
        GateDecision::Redirect(to) => {
            debug!("Gate redirect {} -> {} (authenticated: {})", path, to, authenticated);
            Redirect::temporary(&to).into_response()
        }
    }
}
