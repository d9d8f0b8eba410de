use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Role assigned to self-registered solo accounts: administrator of their own workspace.
pub const SOLO_ACCOUNT_ROLE: i16 = 1;

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 100;

/// Characters besides alphanumerics allowed in the local part of an address.
const LOCAL_PART_SYMBOLS: &str = ".!#$%&*+-/=?^_{|}~";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl AccountStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            other => Err(format!("unknown account status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    Solo,
    Team,
}

impl AccountType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Team => "team",
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solo" => Ok(Self::Solo),
            "team" => Ok(Self::Team),
            other => Err(format!("unknown account type: {other}")),
        }
    }
}

/// A normalized (trimmed, lower-cased) e-mail address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    /// Parses and normalizes an address. The check is structural only.
    ///
    /// # Errors
    /// Returns a human-readable reason when the input is not an address.
    pub fn parse(raw: &str) -> Result<Self, &'static str> {
        let email = raw.trim().to_lowercase();
        if email.is_empty() || email.len() > MAX_EMAIL_LEN {
            return Err("Invalid email address");
        }
        if email.chars().any(char::is_whitespace) {
            return Err("Invalid email address");
        }

        let Some((local, domain)) = email.split_once('@') else {
            return Err("Invalid email address");
        };
        if local.is_empty() || domain.contains('@') {
            return Err("Invalid email address");
        }
        if !local.chars().all(|c| c.is_alphanumeric() || LOCAL_PART_SYMBOLS.contains(c)) {
            return Err("Invalid email address");
        }
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
            return Err("Invalid email address");
        }
        if !labels.iter().all(|l| l.chars().all(|c| c.is_alphanumeric() || c == '-')) {
            return Err("Invalid email address");
        }

        Ok(Self(email))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trims a first or last name and rejects blank, overlong or markup-bearing input.
///
/// # Errors
/// Returns a human-readable reason when the name is unusable.
pub fn normalize_name(raw: &str) -> Result<String, &'static str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("Must not be blank");
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err("Must be at most 100 characters");
    }
    if name.chars().any(|c| c.is_control() || c == '<' || c == '>') {
        return Err("Contains characters that are not allowed");
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub password_hash: String,
    pub account_status: AccountStatus,
    pub account_type: AccountType,
    pub role: i16,
    pub mobile_country_code: Option<String>,
    pub mobile_number: Option<String>,
    pub currency: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Everything needed to insert a user; the store assigns the id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub firstname: String,
    pub lastname: String,
    pub password_hash: String,
    pub account_type: AccountType,
    pub role: i16,
    pub mobile_country_code: Option<String>,
    pub mobile_number: Option<String>,
    pub currency: Option<String>,
}

/// Self-service profile changes. `None` leaves a field alone; for the optional
/// contact fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub mobile_country_code: Option<Option<String>>,
    pub mobile_number: Option<Option<String>>,
    pub currency: Option<Option<String>>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.firstname.is_none()
            && self.lastname.is_none()
            && self.mobile_country_code.is_none()
            && self.mobile_number.is_none()
            && self.currency.is_none()
    }

    pub fn apply_to(self, user: &mut User) {
        if let Some(firstname) = self.firstname {
            user.firstname = firstname;
        }
        if let Some(lastname) = self.lastname {
            user.lastname = lastname;
        }
        if let Some(code) = self.mobile_country_code {
            user.mobile_country_code = code;
        }
        if let Some(number) = self.mobile_number {
            user.mobile_number = number;
        }
        if let Some(currency) = self.currency {
            user.currency = currency;
        }
    }
}
