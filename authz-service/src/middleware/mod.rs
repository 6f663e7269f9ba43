pub mod auth;

pub use auth::{auth_gate, AuthClaims, CurrentUser};
