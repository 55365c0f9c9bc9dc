/// Cookie-backed session store.
/// Reads never fail: anything absent, empty or malformed reads as "not there".
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::de::DeserializeOwned;
use time::Duration;
use tracing::debug;

use crate::models::{AdmobToken, Session, UserInfo};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const AUTH_TOKEN_COOKIE: &str = "authToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub const USER_INFO_COOKIE: &str = "userInfo";
pub const ADMOB_TOKEN_COOKIE: &str = "admob_token";

const SESSION_COOKIES: [&str; 5] = [
    ACCESS_TOKEN_COOKIE,
    AUTH_TOKEN_COOKIE,
    REFRESH_TOKEN_COOKIE,
    USER_INFO_COOKIE,
    ADMOB_TOKEN_COOKIE,
];

pub struct SessionStore<'a> {
    jar: &'a CookieJar,
}

impl<'a> SessionStore<'a> {
    pub fn new(jar: &'a CookieJar) -> Self {
        SessionStore { jar }
    }

    fn value(&self, name: &str) -> Option<String> {
        self.jar
            .get(name)
            .map(|c| c.value().trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn access_token(&self) -> Option<String> {
        self.value(ACCESS_TOKEN_COOKIE)
            .or_else(|| self.value(AUTH_TOKEN_COOKIE))
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.value(REFRESH_TOKEN_COOKIE)
    }

    pub fn user_info(&self) -> Option<UserInfo> {
        self.json(USER_INFO_COOKIE)
    }

    pub fn admob_token(&self) -> Option<AdmobToken> {
        self.json(ADMOB_TOKEN_COOKIE)
    }

    /// The one "is this browser signed in" predicate. Both the edge filter
    /// and the handler guard go through here.
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn session(&self) -> Option<Session> {
        let access_token = self.access_token()?;
        Some(Session {
            access_token,
            refresh_token: self.refresh_token(),
            user_info: self.user_info(),
        })
    }

    /// Cookie values arrive percent-decoded from the jar. Values written by
    /// browser code may be encoded twice, so a second decode is tried.
    fn json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let raw = self.value(name)?;
        if let Ok(parsed) = serde_json::from_str(&raw) {
            return Some(parsed);
        }
        let decoded = urlencoding::decode(&raw).ok()?;
        match serde_json::from_str(&decoded) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Ignoring malformed {} cookie: {}", name, e);
                None
            }
        }
    }
}

/// Writes and clears the session cookies. Used only by the OAuth callback
/// and sign-out.
pub struct SessionWriter {
    secure: bool,
    ttl_days: i64,
}

impl SessionWriter {
    pub fn new(secure: bool, ttl_days: i64) -> Self {
        SessionWriter { secure, ttl_days }
    }

    fn cookie(&self, name: &'static str, value: String, http_only: bool) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(http_only)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::days(self.ttl_days))
            .build()
    }

    pub fn establish(
        &self,
        jar: CookieJar,
        session: &Session,
        admob: Option<&AdmobToken>,
    ) -> CookieJar {
        let mut jar = jar.add(self.cookie(
            ACCESS_TOKEN_COOKIE,
            session.access_token.clone(),
            true,
        ));

        if let Some(refresh_token) = &session.refresh_token {
            jar = jar.add(self.cookie(REFRESH_TOKEN_COOKIE, refresh_token.clone(), true));
        }

        // The jar percent-encodes values on the way out, so the JSON here
        // reaches the browser URL-encoded.
        if let Some(info) = &session.user_info {
            match serde_json::to_string(info) {
                Ok(json) => jar = jar.add(self.cookie(USER_INFO_COOKIE, json, false)),
                Err(e) => debug!("Skipping userInfo cookie: {}", e),
            }
        }

        if let Some(admob) = admob {
            match serde_json::to_string(admob) {
                Ok(json) => jar = jar.add(self.cookie(ADMOB_TOKEN_COOKIE, json, false)),
                Err(e) => debug!("Skipping admob_token cookie: {}", e),
            }
        }

        jar
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        SESSION_COOKIES.iter().fold(jar, |jar, name| {
            jar.add(
                Cookie::build((*name, ""))
                    .path("/")
                    .max_age(Duration::ZERO)
                    .build(),
            )
        })
    }
}
