pub mod auth;
pub mod auth_session;
pub mod password_policy;
pub mod reset_token;
pub mod session;
pub mod user;
