pub mod auth_gate;
pub mod guard;

pub use auth_gate::auth_gate;
pub use guard::{AdminGuard, AuthGuard};
