use crate::adapters::database::DbPool;
use crate::adapters::database::records::SessionRecord;
use crate::domain::session::{RevocationReason, RotationOutcome, Session};
use crate::error::Result;
use crate::services::store::SessionStore;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, user_id, issued_at, expires_at, rotated_at, revoked_at, revoked_reason";

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    /// Creates a new session record.
    /// Note: We store the HASH, not the raw token.
    #[tracing::instrument(level = "debug", skip(self, token_hash), err)]
    async fn create(&self, user_id: Uuid, token_hash: &str, expires_at: OffsetDateTime) -> Result<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO sessions (user_id, current_token_hash, expires_at) VALUES ($1, $2, $3) RETURNING {SESSION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    /// Atomically rotates a refresh token.
    ///
    /// The swap is a conditional UPDATE on the current hash; the superseded hash is recorded
    /// in the same transaction. A concurrent caller holding the same hash blocks on the row
    /// lock, re-evaluates the predicate after commit, misses, and then finds the retired hash.
    #[tracing::instrument(level = "debug", skip(self, old_hash, new_hash), err)]
    async fn rotate(&self, old_hash: &str, new_hash: &str, expires_at: OffsetDateTime) -> Result<RotationOutcome> {
        let mut tx = self.pool.begin().await?;

        let rotated = sqlx::query_as::<_, SessionRecord>(&format!(
            r"
            UPDATE sessions
            SET current_token_hash = $2, expires_at = $3, rotated_at = NOW()
            WHERE current_token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()
            RETURNING {SESSION_COLUMNS}
            "
        ))
        .bind(old_hash)
        .bind(new_hash)
        .bind(expires_at)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(record) = rotated {
            sqlx::query("INSERT INTO retired_refresh_tokens (token_hash, session_id, user_id) VALUES ($1, $2, $3)")
                .bind(old_hash)
                .bind(record.id)
                .bind(record.user_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(RotationOutcome::Rotated(record.into()));
        }

        let current = sqlx::query_as::<_, (bool, bool)>(
            "SELECT revoked_at IS NOT NULL, expires_at <= NOW() FROM sessions WHERE current_token_hash = $1",
        )
        .bind(old_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match current {
            Some((true, _)) => RotationOutcome::Revoked,
            Some((false, _)) => RotationOutcome::Expired,
            None => {
                let reused_by = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM retired_refresh_tokens WHERE token_hash = $1")
                    .bind(old_hash)
                    .fetch_optional(&mut *tx)
                    .await?;

                match reused_by {
                    Some(user_id) => {
                        let result = sqlx::query(
                            r"
                            UPDATE sessions SET revoked_at = NOW(), revoked_reason = $2
                            WHERE user_id = $1 AND revoked_at IS NULL
                            ",
                        )
                        .bind(user_id)
                        .bind(RevocationReason::TokenReuse.as_str())
                        .execute(&mut *tx)
                        .await?;
                        RotationOutcome::Reused { user_id, revoked_sessions: result.rows_affected() }
                    }
                    None => RotationOutcome::Unknown,
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn revoke(&self, session_id: Uuid, user_id: Uuid, reason: RevocationReason) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE sessions SET revoked_at = NOW(), revoked_reason = $3
            WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL
            ",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn revoke_all_for_user(&self, user_id: Uuid, reason: RevocationReason) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW(), revoked_reason = $2 WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            r"
            SELECT {SESSION_COLUMNS} FROM sessions
            WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > NOW()
            ORDER BY issued_at ASC
            "
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Retired hashes go with their session via ON DELETE CASCADE.
    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn purge_stale(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1 OR revoked_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
