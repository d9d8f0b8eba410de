pub mod account_service;
pub mod auth_service;
pub mod health_service;
pub mod mailer;
pub mod password_service;
pub mod rate_limit_service;
pub mod store;
