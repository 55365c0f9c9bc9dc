pub mod app_info;
pub mod session;
pub mod token;
pub mod user;

pub use app_info::{AppInfo, Publisher};
pub use session::{AdmobToken, Role, Session, UserInfo};
pub use token::{CredentialsUpdate, NewTokenForm, OAuthTokenRecord, SaveTokenRequest};
pub use user::{NewUser, User, UserUpdate};

use serde::Deserialize;

/// Backend answers come either bare or wrapped as `{ "data": ... }`
/// (relogin and credential updates use `{ "token": ... }`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped {
        #[serde(alias = "token")]
        data: T,
    },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_accepts_wrapped_and_bare_lists() {
        let wrapped: Envelope<Vec<String>> =
            serde_json::from_str(r#"{"success":true,"data":["a","b"]}"#).unwrap();
        assert_eq!(wrapped.into_inner(), vec!["a", "b"]);

        let bare: Envelope<Vec<String>> = serde_json::from_str(r#"["c"]"#).unwrap();
        assert_eq!(bare.into_inner(), vec!["c"]);
    }
}
