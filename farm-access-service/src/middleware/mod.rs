pub mod admin;
pub mod bearer;

pub use admin::admin_auth_middleware;
pub use bearer::{invalid_token, BearerSecret, INVALID_TOKEN_MESSAGE};
