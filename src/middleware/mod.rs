mod auth;
mod trace;

pub use auth::{ADMIN_TOKEN_HEADER, AdminLayer, USER_TOKEN_HEADER};
pub use trace::TraceLayer;
