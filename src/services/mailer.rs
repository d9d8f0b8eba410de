use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("External service error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Outbound delivery of account e-mails.
#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    /// Delivers a password reset token to the account's address.
    ///
    /// # Errors
    /// Returns `MailError` if delivery could not be handed off.
    async fn send_password_reset(&self, email: &str, token: &str) -> Result<(), MailError>;
}
