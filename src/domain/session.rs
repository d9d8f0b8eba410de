use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Why a session stopped being usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    SignOut,
    TokenReuse,
    PasswordReset,
    AccountSuspended,
}

impl RevocationReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SignOut => "sign_out",
            Self::TokenReuse => "token_reuse",
            Self::PasswordReset => "password_reset",
            Self::AccountSuspended => "account_suspended",
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevocationReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign_out" => Ok(Self::SignOut),
            "token_reuse" => Ok(Self::TokenReuse),
            "password_reset" => Ok(Self::PasswordReset),
            "account_suspended" => Ok(Self::AccountSuspended),
            other => Err(format!("unknown revocation reason: {other}")),
        }
    }
}

/// A login session. The refresh token currently valid for it is only known by its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub rotated_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub revoked_reason: Option<RevocationReason>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    #[must_use]
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }

    /// Whether the session can be purged: dead (expired or revoked) since before `cutoff`.
    #[must_use]
    pub fn is_stale(&self, cutoff: OffsetDateTime) -> bool {
        self.expires_at < cutoff || self.revoked_at.is_some_and(|at| at < cutoff)
    }
}

/// Result of presenting a refresh token hash to the session store.
///
/// Rotation is a compare-and-swap on the session's current token hash. A hash that was
/// once current but has been swapped out is a reuse signal; the store revokes every
/// session of the owning user in the same atomic step and reports `Reused`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    Rotated(Session),
    Reused { user_id: Uuid, revoked_sessions: u64 },
    Revoked,
    Expired,
    Unknown,
}
