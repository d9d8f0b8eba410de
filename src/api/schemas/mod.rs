pub mod auth;
pub mod health;
pub mod me;

use serde::Serialize;

/// Body of endpoints that only report success.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

impl MessageResponse {
    #[must_use]
    pub const fn ok(message: &'static str) -> Self {
        Self { success: true, message }
    }
}
