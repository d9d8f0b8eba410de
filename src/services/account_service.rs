use crate::domain::auth_session::AuthSession;
use crate::domain::password_policy;
use crate::domain::session::RevocationReason;
use crate::domain::user::{AccountStatus, AccountType, Email, NewUser, ProfileUpdate, SOLO_ACCOUNT_ROLE, User};
use crate::error::{AppError, FieldIssue, Result};
use crate::services::auth_service::AuthService;
use crate::services::store::UserStore;
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct AccountMetrics {
    users_registered_total: Counter<u64>,
}

impl AccountMetrics {
    fn new() -> Self {
        let meter = global::meter("authgate-server");
        Self {
            users_registered_total: meter
                .u64_counter("users_registered_total")
                .with_description("Total number of successful user registrations")
                .build(),
        }
    }
}

/// A validated sign-up request.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: Email,
    pub firstname: String,
    pub lastname: String,
    pub password: String,
    pub account_type: AccountType,
    pub mobile_country_code: Option<String>,
    pub mobile_number: Option<String>,
    pub currency: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    auth_service: AuthService,
    metrics: AccountMetrics,
}

impl AccountService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, auth_service: AuthService) -> Self {
        Self { users, auth_service, metrics: AccountMetrics::new() }
    }

    #[tracing::instrument(
        skip(self, registration),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn register(&self, registration: Registration) -> Result<(User, AuthSession)> {
        if registration.account_type == AccountType::Team {
            return Err(AppError::bad_request(
                "Team accounts can only be created through an invitation",
                vec![FieldIssue::new("accountType", "Only solo accounts can sign up directly")],
            ));
        }

        ensure_password_policy(&registration.password)?;

        let password_hash = self.auth_service.hash_password(&registration.password).await?;
        let user = self
            .users
            .create(NewUser {
                email: registration.email,
                firstname: registration.firstname,
                lastname: registration.lastname,
                password_hash,
                account_type: registration.account_type,
                role: SOLO_ACCOUNT_ROLE,
                mobile_country_code: registration.mobile_country_code,
                mobile_number: registration.mobile_number,
                currency: registration.currency,
            })
            .await?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        let auth = self.auth_service.create_session(user.id).await?;
        self.metrics.users_registered_total.add(1, &[]);
        tracing::info!(session_id = %auth.session_id, "User registered");

        Ok((user, auth))
    }

    #[tracing::instrument(
        skip(self, email, password),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn login(&self, email: &Email, password: &str) -> Result<(User, AuthSession)> {
        let Some(user) = self.users.find_by_email(email.as_str()).await? else {
            tracing::warn!("Login failed: user not found");
            return Err(AppError::NotFound("User account not found".into()));
        };

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        if !self.auth_service.verify_password(password, &user.password_hash).await? {
            tracing::warn!("Login failed: invalid password");
            return Err(AppError::unauthorized("Invalid password"));
        }

        if user.account_status == AccountStatus::Suspended {
            return Err(account_suspended());
        }

        let auth = self.auth_service.create_session(user.id).await?;
        Ok((user, auth))
    }

    /// Rotates a refresh token, then makes sure the account may still hold sessions.
    ///
    /// A suspended or deleted account loses every session and the freshly rotated pair is discarded.
    #[tracing::instrument(skip(self, refresh_token), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let auth = self.auth_service.refresh_session(refresh_token).await?;
        tracing::Span::current().record("user_id", tracing::field::display(auth.user_id));

        let active = self.users.find_by_id(auth.user_id).await?.is_some_and(|u| u.account_status == AccountStatus::Active);
        if !active {
            self.auth_service.revoke_all_sessions(auth.user_id, RevocationReason::AccountSuspended).await?;
            return Err(account_suspended());
        }

        Ok(auth)
    }

    #[tracing::instrument(err, skip(self), fields(user_id = %user_id))]
    pub async fn profile(&self, user_id: Uuid) -> Result<User> {
        self.users.find_by_id(user_id).await?.ok_or_else(|| AppError::NotFound("User account not found".into()))
    }

    #[tracing::instrument(err, skip(self, update), fields(user_id = %user_id))]
    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> Result<User> {
        let user = self.users.update_profile(user_id, update).await?;
        tracing::info!("Profile updated");
        Ok(user)
    }

    #[tracing::instrument(err(level = "warn"), skip(self, email), fields(user_id = %user_id))]
    pub async fn change_email(&self, user_id: Uuid, email: &Email) -> Result<User> {
        let user = self.users.update_email(user_id, email).await?;
        tracing::info!("Email address changed");
        Ok(user)
    }
}

fn account_suspended() -> AppError {
    AppError::Forbidden { message: "Account is suspended".into(), details: None }
}

/// Rejects passwords that break the policy with a 422 listing every violated rule.
pub(crate) fn ensure_password_policy(password: &str) -> Result<()> {
    let violations = password_policy::check(password);
    if violations.is_empty() {
        return Ok(());
    }

    Err(AppError::Validation {
        message: "Password does not meet the security requirements".into(),
        details: violations.iter().map(|v| FieldIssue::new("password", v.to_string())).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemorySessionStore, MemoryUserStore};
    use crate::config::AuthConfig;

    fn setup_service() -> AccountService {
        setup_service_with_users(Arc::new(MemoryUserStore::new()))
    }

    fn setup_service_with_users(users: Arc<MemoryUserStore>) -> AccountService {
        let config = AuthConfig {
            jwt_secret: "test_secret".to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 30,
            reset_token_ttl_secs: 3600,
        };
        let auth = AuthService::new(config, Arc::new(MemorySessionStore::new()));
        AccountService::new(users, auth)
    }

    fn registration(email: &str, password: &str) -> Registration {
        Registration {
            email: Email::parse(email).unwrap(),
            firstname: "Social".into(),
            lastname: "Sloth".into(),
            password: password.into(),
            account_type: AccountType::Solo,
            mobile_country_code: None,
            mobile_number: None,
            currency: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = setup_service();
        let (user, auth) = service.register(registration("sloth@example.com", "Password123!")).await.unwrap();

        assert_eq!(auth.user_id, user.id);
        assert_eq!(user.role, SOLO_ACCOUNT_ROLE);

        let email = Email::parse("SLOTH@example.com").unwrap();
        let (logged_in, _) = service.login(&email, "Password123!").await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let service = setup_service();
        service.register(registration("dup@example.com", "Password123!")).await.unwrap();

        let err = service.register(registration("dup@example.com", "Password123!")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let service = setup_service();

        let err = service.register(registration("weak@example.com", "weak")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref details, .. } if details.len() > 1));
    }

    #[tokio::test]
    async fn test_register_rejects_team_accounts() {
        let service = setup_service();
        let mut team = registration("team@example.com", "Password123!");
        team.account_type = AccountType::Team;

        assert!(matches!(service.register(team).await, Err(AppError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_login_failures() {
        let service = setup_service();
        service.register(registration("known@example.com", "Password123!")).await.unwrap();

        let unknown = Email::parse("unknown@example.com").unwrap();
        assert!(matches!(service.login(&unknown, "Password123!").await, Err(AppError::NotFound(_))));

        let known = Email::parse("known@example.com").unwrap();
        assert!(matches!(service.login(&known, "WrongPass1!").await, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_suspended_account_cannot_refresh() {
        let users = Arc::new(MemoryUserStore::new());
        let service = setup_service_with_users(Arc::clone(&users));
        let (user, first) = service.register(registration("suspend@example.com", "Password123!")).await.unwrap();
        let email = Email::parse("suspend@example.com").unwrap();
        let (_, second) = service.login(&email, "Password123!").await.unwrap();

        let rotated = service.refresh_session(&first.refresh_token).await.unwrap();

        users.set_status(user.id, AccountStatus::Suspended).await.unwrap();
        let err = service.refresh_session(&rotated.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { ref message, .. } if message == "Account is suspended"));

        // every other session went down with it
        users.set_status(user.id, AccountStatus::Active).await.unwrap();
        assert!(matches!(service.refresh_session(&second.refresh_token).await, Err(AppError::Forbidden { .. })));
        assert!(service.login(&email, "Password123!").await.is_ok());
    }

    #[tokio::test]
    async fn test_profile_and_email_updates() {
        let service = setup_service();
        let (user, _) = service.register(registration("before@example.com", "Password123!")).await.unwrap();
        service.register(registration("other@example.com", "Password123!")).await.unwrap();

        let update = ProfileUpdate { firstname: Some("Speedy".into()), ..ProfileUpdate::default() };
        let updated = service.update_profile(user.id, update).await.unwrap();
        assert_eq!(updated.firstname, "Speedy");
        assert_eq!(updated.lastname, "Sloth");

        let after = Email::parse("after@example.com").unwrap();
        assert_eq!(service.change_email(user.id, &after).await.unwrap().email, "after@example.com");
        assert!(service.login(&after, "Password123!").await.is_ok());

        let taken = Email::parse("OTHER@example.com").unwrap();
        assert!(matches!(service.change_email(user.id, &taken).await, Err(AppError::Conflict(_))));
    }
}
