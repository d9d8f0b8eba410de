use crate::domain::auth::{MAX_OPAQUE_TOKEN_LEN, OpaqueToken};
use crate::domain::reset_token::ResetTokenOutcome;
use crate::domain::session::RevocationReason;
use crate::domain::user::Email;
use crate::error::{AppError, Result};
use crate::services::account_service::ensure_password_policy;
use crate::services::auth_service::AuthService;
use crate::services::mailer::Mailer;
use crate::services::store::{ResetTokenStore, UserStore};
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

#[derive(Clone, Debug)]
struct Metrics {
    password_resets_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("authgate-server");
        Self {
            password_resets_total: meter
                .u64_counter("password_resets_total")
                .with_description("Total number of completed password resets")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PasswordService {
    users: Arc<dyn UserStore>,
    reset_tokens: Arc<dyn ResetTokenStore>,
    mailer: Arc<dyn Mailer>,
    auth_service: AuthService,
    reset_token_ttl: Duration,
    metrics: Metrics,
}

impl PasswordService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        reset_tokens: Arc<dyn ResetTokenStore>,
        mailer: Arc<dyn Mailer>,
        auth_service: AuthService,
        reset_token_ttl_secs: i64,
    ) -> Self {
        Self {
            users,
            reset_tokens,
            mailer,
            auth_service,
            reset_token_ttl: Duration::seconds(reset_token_ttl_secs),
            metrics: Metrics::new(),
        }
    }

    /// Issues a reset token for the account and hands it to the mailer. Any earlier unused token stops working.
    #[tracing::instrument(err(level = "warn"), skip(self, email), fields(user_id = tracing::field::Empty))]
    pub async fn forgot_password(&self, email: &Email) -> Result<()> {
        let Some(user) = self.users.find_by_email(email.as_str()).await? else {
            return Err(AppError::NotFound("User account not found".into()));
        };
        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        let token = OpaqueToken::generate();
        let expires_at = OffsetDateTime::now_utc() + self.reset_token_ttl;
        self.reset_tokens.replace(user.id, &OpaqueToken::hash(&token), expires_at).await?;

        self.mailer.send_password_reset(&user.email, &token).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to hand off password reset e-mail");
            AppError::Internal
        })?;

        Ok(())
    }

    /// Sets a new password using a reset token, then revokes every session of the account.
    ///
    /// # Errors
    /// - `AppError::Validation` if the new password breaks the policy.
    /// - `AppError::Unauthorized` if the token is unknown, belongs to someone else or was already used.
    /// - `AppError::Gone` if the token expired.
    #[tracing::instrument(err(level = "warn"), skip(self, email, token, new_password), fields(user_id = tracing::field::Empty))]
    pub async fn reset_password(&self, email: &Email, token: &str, new_password: &str) -> Result<()> {
        ensure_password_policy(new_password)?;

        let invalid = || AppError::unauthorized("Reset token is invalid");

        if token.len() > MAX_OPAQUE_TOKEN_LEN {
            return Err(invalid());
        }
        let Some(user) = self.users.find_by_email(email.as_str()).await? else {
            return Err(invalid());
        };
        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        match self.reset_tokens.consume(&OpaqueToken::hash(token), user.id).await? {
            ResetTokenOutcome::Consumed { .. } => {}
            ResetTokenOutcome::Expired => return Err(AppError::Gone("Reset token has expired".into())),
            ResetTokenOutcome::AlreadyUsed | ResetTokenOutcome::Invalid => return Err(invalid()),
        }

        let password_hash = self.auth_service.hash_password(new_password).await?;
        self.users.update_password(user.id, &password_hash).await?;
        self.auth_service.revoke_all_sessions(user.id, RevocationReason::PasswordReset).await?;

        self.metrics.password_resets_total.add(1, &[]);
        tracing::info!("Password reset completed");
        Ok(())
    }
}
