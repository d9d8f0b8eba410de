use crate::config::AuthConfig;
use crate::domain::auth::{Claims, MAX_OPAQUE_TOKEN_LEN, OpaqueToken, Password};
use crate::domain::auth_session::AuthSession;
use crate::domain::session::{RevocationReason, RotationOutcome, Session};
use crate::error::{AppError, Result};
use crate::services::store::SessionStore;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    login_total: Counter<u64>,
    refresh_total: Counter<u64>,
    refresh_reuse_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("authgate-server");
        Self {
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of sessions opened by login or registration")
                .build(),
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Total number of refresh attempts by outcome")
                .build(),
            refresh_reuse_total: meter
                .u64_counter("auth_refresh_reuse_total")
                .with_description("Total number of refresh token reuse detections")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Total number of successful sign-outs")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthService {
    config: AuthConfig,
    sessions: Arc<dyn SessionStore>,
    metrics: Metrics,
}

impl AuthService {
    #[must_use]
    pub fn new(config: AuthConfig, sessions: Arc<dyn SessionStore>) -> Self {
        Self { config, sessions, metrics: Metrics::new() }
    }

    #[tracing::instrument(err, skip(self, password))]
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || Password::hash(&password)).await.map_err(|_| AppError::Internal)?
    }

    #[tracing::instrument(err, skip(self, password, password_hash))]
    pub async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || Password::verify(&password, &password_hash))
            .await
            .map_err(|_| AppError::Internal)?
    }

    /// Opens a new session for the user and returns its first token pair.
    #[tracing::instrument(err, skip(self), fields(user_id = %user_id, session_id = tracing::field::Empty))]
    pub async fn create_session(&self, user_id: Uuid) -> Result<AuthSession> {
        let refresh_token = OpaqueToken::generate();
        let session =
            self.sessions.create(user_id, &OpaqueToken::hash(&refresh_token), self.refresh_token_expiry()).await?;

        tracing::Span::current().record("session_id", tracing::field::display(session.id));
        self.metrics.login_total.add(1, &[]);

        self.issue(&session, refresh_token)
    }

    /// Exchanges a refresh token for a new pair.
    ///
    /// # Errors
    /// - `AppError::Forbidden` if the token was already rotated (every session of the user is revoked
    ///   as part of the same store operation) or its session was revoked.
    /// - `AppError::Unauthorized` if the token is expired, unknown or cannot be one of ours.
    #[tracing::instrument(err(level = "warn"), skip(self, refresh_token), fields(user_id = tracing::field::Empty))]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        if refresh_token.len() > MAX_OPAQUE_TOKEN_LEN {
            self.record_refresh("invalid");
            return Err(AppError::unauthorized("Expired refresh token"));
        }

        let new_refresh_token = OpaqueToken::generate();
        let outcome = self
            .sessions
            .rotate(&OpaqueToken::hash(refresh_token), &OpaqueToken::hash(&new_refresh_token), self.refresh_token_expiry())
            .await?;

        match outcome {
            RotationOutcome::Rotated(session) => {
                tracing::Span::current().record("user_id", tracing::field::display(session.user_id));
                tracing::info!(session_id = %session.id, "Tokens rotated successfully");
                self.record_refresh("rotated");
                self.issue(&session, new_refresh_token)
            }
            RotationOutcome::Reused { user_id, revoked_sessions } => {
                tracing::Span::current().record("user_id", tracing::field::display(user_id));
                tracing::warn!(revoked_sessions, "Refresh token reuse detected; all sessions revoked");
                self.metrics.refresh_reuse_total.add(1, &[]);
                self.record_refresh("reused");
                Err(AppError::refresh_token_reused())
            }
            RotationOutcome::Revoked => {
                self.record_refresh("revoked");
                Err(AppError::session_revoked())
            }
            RotationOutcome::Expired => {
                self.record_refresh("expired");
                Err(AppError::unauthorized("Expired refresh token"))
            }
            RotationOutcome::Unknown => {
                self.record_refresh("invalid");
                Err(AppError::unauthorized("Expired refresh token"))
            }
        }
    }

    /// Revokes the session the caller's access token was issued for. Signing out twice is not an error.
    #[tracing::instrument(err, skip(self), fields(user_id = %user_id, session_id = %session_id))]
    pub async fn sign_out(&self, user_id: Uuid, session_id: Uuid) -> Result<()> {
        if self.sessions.revoke(session_id, user_id, RevocationReason::SignOut).await? {
            self.metrics.logout_total.add(1, &[]);
        } else {
            tracing::debug!("Session was already closed");
        }
        Ok(())
    }

    #[tracing::instrument(err, skip(self), fields(user_id = %user_id))]
    pub async fn revoke_all_sessions(&self, user_id: Uuid, reason: RevocationReason) -> Result<u64> {
        let revoked = self.sessions.revoke_all_for_user(user_id, reason).await?;
        tracing::info!(revoked, reason = %reason, "Revoked all sessions");
        Ok(revoked)
    }

    #[tracing::instrument(err, skip(self), fields(user_id = %user_id))]
    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        self.sessions.list_active(user_id).await
    }

    /// Verifies a JWT access token and returns its claims.
    ///
    /// # Errors
    /// Returns `AppError::Unauthorized` if the token is invalid or expired.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        Claims::decode(token, &self.config.jwt_secret)
    }

    fn issue(&self, session: &Session, refresh_token: String) -> Result<AuthSession> {
        let claims = Claims::new(session.user_id, session.id, self.config.access_token_ttl_secs);
        let access_token = claims.encode(&self.config.jwt_secret)?;

        Ok(AuthSession {
            session_id: session.id,
            user_id: session.user_id,
            access_token,
            refresh_token,
            expires_in: self.config.access_token_ttl_secs,
            refresh_token_expires_at: session.expires_at,
        })
    }

    fn refresh_token_expiry(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + Duration::days(self.config.refresh_token_ttl_days)
    }

    fn record_refresh(&self, outcome: &'static str) {
        self.metrics.refresh_total.add(1, &[KeyValue::new("outcome", outcome)]);
    }
}
