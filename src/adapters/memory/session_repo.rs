use crate::domain::session::{RevocationReason, RotationOutcome, Session};
use crate::error::{AppError, Result};
use crate::services::store::SessionStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug)]
struct RetiredToken {
    session_id: Uuid,
    user_id: Uuid,
}

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<Uuid, Session>,
    /// current refresh token hash -> session
    current: HashMap<String, Uuid>,
    /// the inverse of `current`, needed to drop index entries when purging
    current_by_session: HashMap<Uuid, String>,
    retired: HashMap<String, RetiredToken>,
    by_user: HashMap<Uuid, HashSet<Uuid>>,
}

impl State {
    fn revoke_all(&mut self, user_id: Uuid, reason: RevocationReason, now: OffsetDateTime) -> u64 {
        let Some(ids) = self.by_user.get(&user_id) else {
            return 0;
        };

        let mut revoked = 0;
        for id in ids {
            if let Some(session) = self.sessions.get_mut(id)
                && session.revoked_at.is_none()
            {
                session.revoked_at = Some(now);
                session.revoked_reason = Some(reason);
                revoked += 1;
            }
        }
        revoked
    }

    fn remove_session(&mut self, id: Uuid) {
        let Some(session) = self.sessions.remove(&id) else {
            return;
        };
        if let Some(hash) = self.current_by_session.remove(&id) {
            self.current.remove(&hash);
        }
        if let Some(ids) = self.by_user.get_mut(&session.user_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_user.remove(&session.user_id);
            }
        }
    }
}

/// Process-local session store. A single lock covers every index, so classification,
/// rotation and cascade revocation happen in one critical section.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<State>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| {
            tracing::error!("Session store lock poisoned");
            AppError::Internal
        })
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    #[tracing::instrument(level = "debug", skip(self, token_hash), err)]
    async fn create(&self, user_id: Uuid, token_hash: &str, expires_at: OffsetDateTime) -> Result<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            issued_at: OffsetDateTime::now_utc(),
            expires_at,
            rotated_at: None,
            revoked_at: None,
            revoked_reason: None,
        };

        let mut state = self.lock()?;
        state.current.insert(token_hash.to_string(), session.id);
        state.current_by_session.insert(session.id, token_hash.to_string());
        state.by_user.entry(user_id).or_default().insert(session.id);
        state.sessions.insert(session.id, session.clone());

        Ok(session)
    }

    #[tracing::instrument(level = "debug", skip(self, old_hash, new_hash), err)]
    async fn rotate(&self, old_hash: &str, new_hash: &str, expires_at: OffsetDateTime) -> Result<RotationOutcome> {
        let now = OffsetDateTime::now_utc();
        let mut state = self.lock()?;

        if let Some(&session_id) = state.current.get(old_hash) {
            let Some(session) = state.sessions.get_mut(&session_id) else {
                return Ok(RotationOutcome::Unknown);
            };
            if session.is_revoked() {
                return Ok(RotationOutcome::Revoked);
            }
            if session.is_expired_at(now) {
                return Ok(RotationOutcome::Expired);
            }

            session.expires_at = expires_at;
            session.rotated_at = Some(now);
            let rotated = session.clone();

            state.current.remove(old_hash);
            state.current.insert(new_hash.to_string(), session_id);
            state.current_by_session.insert(session_id, new_hash.to_string());
            state
                .retired
                .insert(old_hash.to_string(), RetiredToken { session_id, user_id: rotated.user_id });

            return Ok(RotationOutcome::Rotated(rotated));
        }

        if let Some(user_id) = state.retired.get(old_hash).map(|t| t.user_id) {
            let revoked_sessions = state.revoke_all(user_id, RevocationReason::TokenReuse, now);
            return Ok(RotationOutcome::Reused { user_id, revoked_sessions });
        }

        Ok(RotationOutcome::Unknown)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn revoke(&self, session_id: Uuid, user_id: Uuid, reason: RevocationReason) -> Result<bool> {
        let mut state = self.lock()?;
        match state.sessions.get_mut(&session_id) {
            Some(session) if session.user_id == user_id && session.revoked_at.is_none() => {
                session.revoked_at = Some(OffsetDateTime::now_utc());
                session.revoked_reason = Some(reason);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn revoke_all_for_user(&self, user_id: Uuid, reason: RevocationReason) -> Result<u64> {
        let mut state = self.lock()?;
        Ok(state.revoke_all(user_id, reason, OffsetDateTime::now_utc()))
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let now = OffsetDateTime::now_utc();
        let state = self.lock()?;

        let mut sessions: Vec<Session> = state
            .by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.sessions.get(id))
            .filter(|s| s.is_active_at(now))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.issued_at);

        Ok(sessions)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn purge_stale(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let mut state = self.lock()?;

        let stale: Vec<Uuid> = state.sessions.values().filter(|s| s.is_stale(cutoff)).map(|s| s.id).collect();
        for id in &stale {
            state.remove_session(*id);
        }
        let stale_set: HashSet<Uuid> = stale.iter().copied().collect();
        state.retired.retain(|_, t| !stale_set.contains(&t.session_id));

        Ok(stale.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}
