/// Handler-level session guard.
///
/// The edge filter only sees cookies at routing time; these extractors
/// re-check inside the handler so a protected handler can never run
/// without a session, whatever route it is mounted under.
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::models::Session;
use crate::services::session::SessionStore;

pub const NOT_AUTHORIZED_MESSAGE: &str = "You are not authorized to view this page";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// The session could not be read at all (unreadable cookie header).
    Unknown,
    Authenticated(Session),
    Unauthenticated,
}

impl GuardState {
    pub fn resolve(headers: &HeaderMap) -> Self {
        let unreadable = headers
            .get_all(COOKIE)
            .iter()
            .any(|value| value.to_str().is_err());
        let jar = CookieJar::from_headers(headers);

        match SessionStore::new(&jar).session() {
            Some(session) => GuardState::Authenticated(session),
            None if unreadable => GuardState::Unknown,
            None => GuardState::Unauthenticated,
        }
    }
}

#[derive(Debug)]
pub enum GuardRejection {
    /// Placeholder while the browser is sent back to `/`.
    Loading,
    Unauthenticated,
    NotAuthorized,
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            GuardRejection::Loading => (
                StatusCode::OK,
                [("refresh", "0; url=/")],
                Json(json!({ "status": "loading" })),
            )
                .into_response(),
            GuardRejection::Unauthenticated => Redirect::temporary("/").into_response(),
            GuardRejection::NotAuthorized => (
                StatusCode::FORBIDDEN,
                Json(json!({ "message": NOT_AUTHORIZED_MESSAGE })),
            )
                .into_response(),
        }
    }
}

/// Any signed-in operator.
#[derive(Debug, Clone)]
pub struct AuthGuard(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for AuthGuard
where
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match GuardState::resolve(&parts.headers) {
            GuardState::Authenticated(session) => Ok(AuthGuard(session)),
            GuardState::Unknown => Err(GuardRejection::Loading),
            GuardState::Unauthenticated => Err(GuardRejection::Unauthenticated),
        }
    }
}

/// A signed-in operator whose `userInfo` role is admin.
#[derive(Debug, Clone)]
pub struct AdminGuard(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for AdminGuard
where
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthGuard(session) = AuthGuard::from_request_parts(parts, state).await?;
        if session.is_admin() {
            Ok(AdminGuard(session))
        } else {
            tracing::debug!("Non-admin session refused for {}", parts.uri.path());
            Err(GuardRejection::NotAuthorized)
        }
    }
}
