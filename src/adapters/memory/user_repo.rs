use crate::domain::user::{AccountStatus, Email, NewUser, ProfileUpdate, User};
use crate::error::{AppError, Result};
use crate::services::store::UserStore;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    /// normalized e-mail -> user id
    emails: DashMap<String, Uuid>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    #[tracing::instrument(level = "debug", skip(self, user), err)]
    async fn create(&self, user: NewUser) -> Result<User> {
        let id = Uuid::new_v4();

        // Reserving the address first makes duplicate registrations race-free.
        match self.emails.entry(user.email.as_str().to_string()) {
            Entry::Occupied(_) => return Err(AppError::Conflict("Email already registered".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let created = User {
            id,
            email: user.email.as_str().to_string(),
            firstname: user.firstname,
            lastname: user.lastname,
            password_hash: user.password_hash,
            account_status: AccountStatus::Active,
            account_type: user.account_type,
            role: user.role,
            mobile_country_code: user.mobile_country_code,
            mobile_number: user.mobile_number,
            currency: user.currency,
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.insert(id, created.clone());

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let Some(id) = self.emails.get(email).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    #[tracing::instrument(level = "debug", skip(self, password_hash), err)]
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let mut user = self.users.get_mut(&id).ok_or_else(|| AppError::NotFound("User account not found".to_string()))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, update), err)]
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<User> {
        let mut user = self.users.get_mut(&id).ok_or_else(|| AppError::NotFound("User account not found".to_string()))?;
        update.apply_to(&mut user);
        Ok(user.clone())
    }

    #[tracing::instrument(level = "debug", skip(self, email), err)]
    async fn update_email(&self, id: Uuid, email: &Email) -> Result<User> {
        // Claim the new address before touching the user so a concurrent sign-up cannot take it.
        match self.emails.entry(email.as_str().to_string()) {
            Entry::Occupied(owner) if *owner.get() == id => {}
            Entry::Occupied(_) => return Err(AppError::Conflict("Email already registered".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let Some(mut user) = self.users.get_mut(&id) else {
            self.emails.remove_if(email.as_str(), |_, owner| *owner == id);
            return Err(AppError::NotFound("User account not found".to_string()));
        };
        let previous = std::mem::replace(&mut user.email, email.as_str().to_string());
        let updated = user.clone();
        drop(user);

        if previous != email.as_str() {
            self.emails.remove_if(&previous, |_, owner| *owner == id);
        }
        Ok(updated)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn set_status(&self, id: Uuid, status: AccountStatus) -> Result<()> {
        let mut user = self.users.get_mut(&id).ok_or_else(|| AppError::NotFound("User account not found".to_string()))?;
        user.account_status = status;
        Ok(())
    }
}
