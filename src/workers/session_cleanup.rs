use crate::error::AppError;
use crate::services::store::{ResetTokenStore, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::Instrument;

#[derive(Debug)]
pub struct SessionCleanupWorker {
    sessions: Arc<dyn SessionStore>,
    reset_tokens: Arc<dyn ResetTokenStore>,
    cleanup_interval_secs: u64,
    retention: time::Duration,
}

impl SessionCleanupWorker {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        reset_tokens: Arc<dyn ResetTokenStore>,
        cleanup_interval_secs: u64,
        session_retention_days: i64,
    ) -> Self {
        Self { sessions, reset_tokens, cleanup_interval_secs, retention: time::Duration::days(session_retention_days) }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.cleanup_interval_secs == 0 {
            tracing::info!("Session cleanup is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.cleanup_interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.perform_cleanup()
                        .instrument(tracing::info_span!("run_session_cleanup"))
                        .await
                    {
                        tracing::error!(error = ?e, "Session cleanup iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Session cleanup loop shutting down...");
    }

    /// Purges sessions dead for longer than the retention window (their retired token hashes go with them)
    /// and reset tokens that have expired.
    ///
    /// Retired hashes are kept for the retention window so a replay after rotation is still recognised.
    ///
    /// # Errors
    /// Returns an error if either store fails.
    #[tracing::instrument(
        skip(self),
        err,
        fields(sessions_deleted = tracing::field::Empty, reset_tokens_deleted = tracing::field::Empty)
    )]
    pub async fn perform_cleanup(&self) -> Result<(), AppError> {
        tracing::debug!("Running session cleanup...");
        let now = OffsetDateTime::now_utc();

        let sessions = self.sessions.purge_stale(now - self.retention).await?;
        if sessions > 0 {
            tracing::info!(count = %sessions, "Deleted stale sessions");
            tracing::Span::current().record("sessions_deleted", sessions);
        }

        let tokens = self.reset_tokens.purge_expired(now).await?;
        if tokens > 0 {
            tracing::info!(count = %tokens, "Deleted expired reset tokens");
            tracing::Span::current().record("reset_tokens_deleted", tokens);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryResetTokenStore, MemorySessionStore};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_cleanup_keeps_live_sessions_and_drops_expired_reset_tokens() {
        let sessions = Arc::new(MemorySessionStore::new());
        let reset_tokens = Arc::new(MemoryResetTokenStore::new());
        let user_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        sessions.create(user_id, "live", now + time::Duration::days(30)).await.unwrap();
        reset_tokens.replace(user_id, "expired", now - time::Duration::minutes(5)).await.unwrap();

        let worker = SessionCleanupWorker::new(sessions.clone(), reset_tokens.clone(), 60, 30);
        worker.perform_cleanup().await.unwrap();

        assert_eq!(sessions.list_active(user_id).await.unwrap().len(), 1);
        assert_eq!(reset_tokens.purge_expired(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disabled_worker_returns_immediately() {
        let (_tx, rx) = tokio::sync::watch::channel(false);
        let worker =
            SessionCleanupWorker::new(Arc::new(MemorySessionStore::new()), Arc::new(MemoryResetTokenStore::new()), 0, 30);

        tokio::time::timeout(Duration::from_secs(1), worker.run(rx)).await.unwrap();
    }
}
