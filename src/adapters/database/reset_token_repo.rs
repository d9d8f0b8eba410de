use crate::adapters::database::DbPool;
use crate::domain::reset_token::ResetTokenOutcome;
use crate::error::Result;
use crate::services::store::ResetTokenStore;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct PgResetTokenStore {
    pool: DbPool,
}

impl PgResetTokenStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResetTokenStore for PgResetTokenStore {
    #[tracing::instrument(level = "debug", skip(self, token_hash), err)]
    async fn replace(&self, user_id: Uuid, token_hash: &str, expires_at: OffsetDateTime) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1 AND used_at IS NULL")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO password_reset_tokens (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token_hash)
            .bind(user_id)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// The row lock serialises concurrent claims; the loser reads `used_at` set by the winner.
    #[tracing::instrument(level = "debug", skip(self, token_hash), err)]
    async fn consume(&self, token_hash: &str, user_id: Uuid) -> Result<ResetTokenOutcome> {
        let mut tx = self.pool.begin().await?;

        let state = sqlx::query_as::<_, (bool, bool)>(
            r"
            SELECT used_at IS NOT NULL, expires_at <= NOW()
            FROM password_reset_tokens
            WHERE token_hash = $1 AND user_id = $2
            FOR UPDATE
            ",
        )
        .bind(token_hash)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match state {
            None => ResetTokenOutcome::Invalid,
            Some((true, _)) => ResetTokenOutcome::AlreadyUsed,
            Some((false, true)) => ResetTokenOutcome::Expired,
            Some((false, false)) => {
                sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE token_hash = $1")
                    .bind(token_hash)
                    .execute(&mut *tx)
                    .await?;
                ResetTokenOutcome::Consumed { user_id }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn purge_expired(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
