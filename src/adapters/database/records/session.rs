use crate::domain::session::Session;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub(crate) struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub rotated_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub revoked_reason: Option<String>,
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            rotated_at: record.rotated_at,
            revoked_at: record.revoked_at,
            revoked_reason: record.revoked_reason.and_then(|r| r.parse().ok()),
        }
    }
}
