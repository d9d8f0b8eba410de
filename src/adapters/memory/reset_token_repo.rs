use crate::domain::reset_token::ResetTokenOutcome;
use crate::error::Result;
use crate::services::store::ResetTokenStore;
use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct ResetToken {
    user_id: Uuid,
    expires_at: OffsetDateTime,
    used_at: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
pub struct MemoryResetTokenStore {
    tokens: DashMap<String, ResetToken>,
}

impl MemoryResetTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetTokenStore {
    #[tracing::instrument(level = "debug", skip(self, token_hash), err)]
    async fn replace(&self, user_id: Uuid, token_hash: &str, expires_at: OffsetDateTime) -> Result<()> {
        self.tokens.retain(|_, t| t.user_id != user_id || t.used_at.is_some());
        self.tokens.insert(token_hash.to_string(), ResetToken { user_id, expires_at, used_at: None });
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, token_hash), err)]
    async fn consume(&self, token_hash: &str, user_id: Uuid) -> Result<ResetTokenOutcome> {
        // The entry's shard lock is held until `token` drops, so only one caller can mark it used.
        let Some(mut token) = self.tokens.get_mut(token_hash) else {
            return Ok(ResetTokenOutcome::Invalid);
        };

        if token.user_id != user_id {
            return Ok(ResetTokenOutcome::Invalid);
        }
        if token.used_at.is_some() {
            return Ok(ResetTokenOutcome::AlreadyUsed);
        }
        let now = OffsetDateTime::now_utc();
        if token.expires_at <= now {
            return Ok(ResetTokenOutcome::Expired);
        }

        token.used_at = Some(now);
        Ok(ResetTokenOutcome::Consumed { user_id })
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn purge_expired(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.expires_at >= cutoff);
        Ok((before - self.tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn in_minutes(minutes: i64) -> OffsetDateTime {
        OffsetDateTime::now_utc() + Duration::minutes(minutes)
    }

    #[tokio::test]
    async fn test_token_can_be_consumed_once() {
        let store = MemoryResetTokenStore::new();
        let user_id = Uuid::new_v4();
        store.replace(user_id, "r1", in_minutes(60)).await.unwrap();

        assert_eq!(store.consume("r1", user_id).await.unwrap(), ResetTokenOutcome::Consumed { user_id });
        assert_eq!(store.consume("r1", user_id).await.unwrap(), ResetTokenOutcome::AlreadyUsed);
    }

    #[tokio::test]
    async fn test_token_of_another_user_is_invalid_and_left_intact() {
        let store = MemoryResetTokenStore::new();
        let owner = Uuid::new_v4();
        store.replace(owner, "r1", in_minutes(60)).await.unwrap();

        assert_eq!(store.consume("r1", Uuid::new_v4()).await.unwrap(), ResetTokenOutcome::Invalid);
        assert_eq!(store.consume("r1", owner).await.unwrap(), ResetTokenOutcome::Consumed { user_id: owner });
    }

    #[tokio::test]
    async fn test_expired_and_replaced_tokens() {
        let store = MemoryResetTokenStore::new();
        let user_id = Uuid::new_v4();
        store.replace(user_id, "stale", in_minutes(-1)).await.unwrap();
        assert_eq!(store.consume("stale", user_id).await.unwrap(), ResetTokenOutcome::Expired);

        store.replace(user_id, "first", in_minutes(60)).await.unwrap();
        store.replace(user_id, "second", in_minutes(60)).await.unwrap();
        assert_eq!(store.consume("first", user_id).await.unwrap(), ResetTokenOutcome::Invalid);
        assert!(matches!(store.consume("second", user_id).await.unwrap(), ResetTokenOutcome::Consumed { .. }));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryResetTokenStore::new();
        store.replace(Uuid::new_v4(), "old", in_minutes(-10)).await.unwrap();
        store.replace(Uuid::new_v4(), "fresh", in_minutes(10)).await.unwrap();

        assert_eq!(store.purge_expired(OffsetDateTime::now_utc()).await.unwrap(), 1);
    }
}
