pub mod auth;

pub use auth::{ApiToken, token_auth};
