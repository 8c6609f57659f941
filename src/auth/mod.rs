mod credential;
mod manager;
mod store;

pub use manager::{DEFAULT_TOKEN_SIZE, MIN_TOKEN_SIZE, TokenManager};
pub use store::CredentialStore;

/// The administrator identity. It is verified against the token manager's admin
/// secret and never stored as an ordinary user.
pub const ADMIN: &str = "admin";
