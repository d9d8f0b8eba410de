use std::fmt;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "password123!",
    "password@123",
    "qwerty123",
    "qwerty@123",
    "12345678",
    "123456789",
    "letmein1!",
    "welcome1!",
    "admin123!",
    "iloveyou1!",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    TooShort,
    TooLong,
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecial,
    SurroundingWhitespace,
    TooCommon,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::TooShort => "Password must be at least 8 characters long",
            Self::TooLong => "Password must be at most 128 characters long",
            Self::MissingUppercase => "Password must contain an uppercase letter",
            Self::MissingLowercase => "Password must contain a lowercase letter",
            Self::MissingDigit => "Password must contain a number",
            Self::MissingSpecial => "Password must contain a special character",
            Self::SurroundingWhitespace => "Password must not start or end with whitespace",
            Self::TooCommon => "Password is too common",
        };
        f.write_str(msg)
    }
}

/// Returns every rule the password breaks; an empty list means it is acceptable.
#[must_use]
pub fn check(password: &str) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();
    let len = password.chars().count();

    if len < MIN_PASSWORD_LEN {
        violations.push(PolicyViolation::TooShort);
    }
    if len > MAX_PASSWORD_LEN {
        violations.push(PolicyViolation::TooLong);
    }
    if !password.chars().any(char::is_uppercase) {
        violations.push(PolicyViolation::MissingUppercase);
    }
    if !password.chars().any(char::is_lowercase) {
        violations.push(PolicyViolation::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PolicyViolation::MissingDigit);
    }
    if !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        violations.push(PolicyViolation::MissingSpecial);
    }
    if password.trim() != password {
        violations.push(PolicyViolation::SurroundingWhitespace);
    }
    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        violations.push(PolicyViolation::TooCommon);
    }

    violations
}
