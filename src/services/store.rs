use crate::domain::reset_token::ResetTokenOutcome;
use crate::domain::session::{RevocationReason, RotationOutcome, Session};
use crate::domain::user::{AccountStatus, Email, NewUser, ProfileUpdate, User};
use crate::error::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `AppError::Conflict` if the e-mail address is already registered.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// # Errors
    /// Returns `AppError::NotFound` if the user does not exist.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()>;

    /// # Errors
    /// Returns `AppError::NotFound` if the user does not exist.
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<User>;

    /// Moves the account to a new address. Keeping the current address is a no-op.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if another account owns the address,
    /// `AppError::NotFound` if the user does not exist.
    async fn update_email(&self, id: Uuid, email: &Email) -> Result<User>;

    /// # Errors
    /// Returns `AppError::NotFound` if the user does not exist.
    async fn set_status(&self, id: Uuid, status: AccountStatus) -> Result<()>;
}

/// Session persistence with an atomic refresh-token rotation primitive.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Opens a new session whose current refresh token has the given hash.
    async fn create(&self, user_id: Uuid, token_hash: &str, expires_at: OffsetDateTime) -> Result<Session>;

    /// Swaps `old_hash` for `new_hash` if and only if `old_hash` is the current token of a live session.
    ///
    /// Presenting a retired hash revokes every session of its owner within the same atomic step.
    async fn rotate(&self, old_hash: &str, new_hash: &str, expires_at: OffsetDateTime) -> Result<RotationOutcome>;

    /// Revokes one session owned by `user_id`. Returns whether a live session was revoked.
    async fn revoke(&self, session_id: Uuid, user_id: Uuid, reason: RevocationReason) -> Result<bool>;

    /// Revokes every live session of the user. Returns how many were revoked.
    async fn revoke_all_for_user(&self, user_id: Uuid, reason: RevocationReason) -> Result<u64>;

    async fn list_active(&self, user_id: Uuid) -> Result<Vec<Session>>;

    /// Deletes sessions that expired or were revoked before `cutoff`, along with their retired hashes.
    async fn purge_stale(&self, cutoff: OffsetDateTime) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait ResetTokenStore: Send + Sync + std::fmt::Debug {
    /// Stores a new reset token for the user, discarding any earlier unused one.
    async fn replace(&self, user_id: Uuid, token_hash: &str, expires_at: OffsetDateTime) -> Result<()>;

    /// Marks the token used if it belongs to `user_id`, is unused and unexpired. Exactly one caller can win.
    async fn consume(&self, token_hash: &str, user_id: Uuid) -> Result<ResetTokenOutcome>;

    /// Deletes tokens that expired before `cutoff`.
    async fn purge_expired(&self, cutoff: OffsetDateTime) -> Result<u64>;
}
