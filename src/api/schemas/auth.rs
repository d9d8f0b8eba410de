use crate::domain::auth_session::AuthSession;
use crate::domain::user::User;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

// Request fields stay untyped so that a missing, null or mistyped value is reported
// as a field issue rather than a deserialization failure.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub account_type: Option<Value>,
    pub sign_up_method: Option<Value>,
    pub email: Option<Value>,
    pub firstname: Option<Value>,
    pub lastname: Option<Value>,
    pub password: Option<Value>,
    pub mobile_country_code: Option<Value>,
    pub mobile_number: Option<Value>,
    pub currency: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub login_type: Option<Value>,
    pub email: Option<Value>,
    pub password: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refresh {
    pub refresh_token: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPassword {
    pub email: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPassword {
    pub email: Option<Value>,
    pub reset_password_token: Option<Value>,
    pub password: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_token_expires_at: OffsetDateTime,
}

impl From<AuthSession> for AuthTokens {
    fn from(session: AuthSession) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            token_type: "Bearer",
            expires_in: session.expires_in,
            refresh_token_expires_at: session.refresh_token_expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub account_status: &'static str,
    pub account_type: &'static str,
    pub role: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            firstname: user.firstname,
            lastname: user.lastname,
            email: user.email,
            account_status: user.account_status.as_str(),
            account_type: user.account_type.as_str(),
            role: user.role,
            mobile_country_code: user.mobile_country_code,
            mobile_number: user.mobile_number,
            currency: user.currency,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthenticatedUser {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub auth: AuthTokens,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn new(user: User, session: AuthSession) -> Self {
        Self { profile: user.into(), auth: session.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: AuthenticatedUser,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: &'static str,
    pub auth: AuthTokens,
}
