pub mod backend;
pub mod oauth_callback;
pub mod oauth_provider;
pub mod session;
pub mod tokens;
pub mod user;

pub use backend::BackendClient;
pub use oauth_callback::{FlowMode, OAuthManager, ReconcileReport};
pub use oauth_provider::{create_google_provider, OAuthProvider};
pub use session::{SessionStore, SessionWriter};
pub use tokens::{TokenBoard, TokenChange, TokenService};
pub use user::UserService;
