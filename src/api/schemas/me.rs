use crate::api::schemas::auth::UserProfile;
use crate::domain::session::Session;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdatedResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: UserProfile,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeEmail {
    #[serde(alias = "newEmail")]
    pub email: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub rotated_at: Option<OffsetDateTime>,
    pub current: bool,
}

impl SessionSummary {
    #[must_use]
    pub fn new(session: &Session, current_session_id: Uuid) -> Self {
        Self {
            session_id: session.id,
            issued_at: session.issued_at,
            expires_at: session.expires_at,
            rotated_at: session.rotated_at,
            current: session.id == current_session_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub success: bool,
    pub sessions: Vec<SessionSummary>,
}
