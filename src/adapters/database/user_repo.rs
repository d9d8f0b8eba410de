use crate::adapters::database::DbPool;
use crate::adapters::database::records::UserRecord;
use crate::domain::user::{AccountStatus, Email, NewUser, ProfileUpdate, User};
use crate::error::{AppError, Result};
use crate::services::store::UserStore;
use async_trait::async_trait;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, firstname, lastname, password_hash, account_status, account_type, role, \
                            mobile_country_code, mobile_number, currency, created_at";

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[tracing::instrument(level = "debug", skip(self, user), fields(email = %user.email), err)]
    async fn create(&self, user: NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, UserRecord>(&format!(
            r"
            INSERT INTO users (email, firstname, lastname, password_hash, account_status, account_type, role,
                               mobile_country_code, mobile_number, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.email.as_str())
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.password_hash)
        .bind(AccountStatus::Active.as_str())
        .bind(user.account_type.as_str())
        .bind(user.role)
        .bind(&user.mobile_country_code)
        .bind(&user.mobile_number)
        .bind(&user.currency)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::Conflict("Email already registered".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, email), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self, password_hash), err)]
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User account not found".into()));
        }
        Ok(())
    }

    /// Contact fields carry a "present" flag so that an explicit clear can be told apart from no change.
    #[tracing::instrument(level = "debug", skip(self, update), err)]
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            r"
            UPDATE users SET
                firstname = COALESCE($2, firstname),
                lastname = COALESCE($3, lastname),
                mobile_country_code = CASE WHEN $4 THEN $5 ELSE mobile_country_code END,
                mobile_number = CASE WHEN $6 THEN $7 ELSE mobile_number END,
                currency = CASE WHEN $8 THEN $9 ELSE currency END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&update.firstname)
        .bind(&update.lastname)
        .bind(update.mobile_country_code.is_some())
        .bind(update.mobile_country_code.flatten())
        .bind(update.mobile_number.is_some())
        .bind(update.mobile_number.flatten())
        .bind(update.currency.is_some())
        .bind(update.currency.flatten())
        .fetch_optional(&self.pool)
        .await?;

        record.map(Into::into).ok_or_else(|| AppError::NotFound("User account not found".into()))
    }

    #[tracing::instrument(level = "debug", skip(self, email), err)]
    async fn update_email(&self, id: Uuid, email: &Email) -> Result<User> {
        let result = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET email = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(record)) => Ok(record.into()),
            Ok(None) => Err(AppError::NotFound("User account not found".into())),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::Conflict("Email already registered".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn set_status(&self, id: Uuid, status: AccountStatus) -> Result<()> {
        let result = sqlx::query("UPDATE users SET account_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User account not found".into()));
        }
        Ok(())
    }
}
