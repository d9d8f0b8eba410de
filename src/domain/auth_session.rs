use time::OffsetDateTime;
use uuid::Uuid;

/// The credentials handed to a client after login, registration or a successful refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub(crate) session_id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
    pub(crate) expires_in: u64,
    pub(crate) refresh_token_expires_at: OffsetDateTime,
}
