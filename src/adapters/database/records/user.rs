use crate::domain::user::{AccountStatus, AccountType, User};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub(crate) struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub password_hash: String,
    pub account_status: String,
    pub account_type: String,
    pub role: i16,
    pub mobile_country_code: Option<String>,
    pub mobile_number: Option<String>,
    pub currency: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        // Unrecognized states fail closed.
        let account_status = record.account_status.parse().unwrap_or(AccountStatus::Suspended);
        let account_type = record.account_type.parse().unwrap_or(AccountType::Solo);

        Self {
            id: record.id,
            email: record.email,
            firstname: record.firstname,
            lastname: record.lastname,
            password_hash: record.password_hash,
            account_status,
            account_type,
            role: record.role,
            mobile_country_code: record.mobile_country_code,
            mobile_number: record.mobile_number,
            currency: record.currency,
            created_at: record.created_at,
        }
    }
}
