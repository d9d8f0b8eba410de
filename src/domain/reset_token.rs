use uuid::Uuid;

/// Result of trying to redeem a password reset token for a given user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTokenOutcome {
    Consumed { user_id: Uuid },
    AlreadyUsed,
    Expired,
    /// No such token, or it was issued to a different user.
    Invalid,
}
