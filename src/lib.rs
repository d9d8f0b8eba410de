#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::database::{DbPool, PgResetTokenStore, PgSessionStore, PgUserStore};
use crate::adapters::mail::LogMailer;
use crate::adapters::memory::{MemoryResetTokenStore, MemorySessionStore, MemoryUserStore};
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::account_service::AccountService;
use crate::services::auth_service::AuthService;
use crate::services::health_service::HealthService;
use crate::services::mailer::Mailer;
use crate::services::password_service::PasswordService;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::store::{ResetTokenStore, SessionStore, UserStore};
use crate::workers::SessionCleanupWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The storage ports every service is wired against.
#[derive(Debug, Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub reset_tokens: Arc<dyn ResetTokenStore>,
}

impl Stores {
    #[must_use]
    pub fn postgres(pool: &DbPool) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            sessions: Arc::new(PgSessionStore::new(pool.clone())),
            reset_tokens: Arc::new(PgResetTokenStore::new(pool.clone())),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryUserStore::new()),
            sessions: Arc::new(MemorySessionStore::new()),
            reset_tokens: Arc::new(MemoryResetTokenStore::new()),
        }
    }
}

#[derive(Debug)]
pub struct Workers {
    session_cleanup: SessionCleanupWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.session_cleanup.run(shutdown_rx))]
    }
}

#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub workers: Workers,
}

#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    stores: Option<Stores>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, stores: None, mailer: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: &DbPool) -> Self {
        self.stores = Some(Stores::postgres(pool));
        self
    }

    #[must_use]
    pub fn with_stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Wires services and workers. Without a database the stores live in process memory.
    #[must_use]
    pub fn build(self) -> App {
        let config = self.config;
        let stores = self.stores.unwrap_or_else(|| {
            tracing::warn!("No database configured; accounts and sessions are kept in memory");
            Stores::in_memory()
        });
        let mailer = self.mailer.unwrap_or_else(|| Arc::new(LogMailer));

        let auth_service = AuthService::new(config.auth.clone(), Arc::clone(&stores.sessions));
        let account_service = AccountService::new(Arc::clone(&stores.users), auth_service.clone());
        let password_service = PasswordService::new(
            Arc::clone(&stores.users),
            Arc::clone(&stores.reset_tokens),
            mailer,
            auth_service.clone(),
            config.auth.reset_token_ttl_secs,
        );
        let health_service = HealthService::new(Arc::clone(&stores.sessions), config.health.clone());
        let rate_limit_service = RateLimitService::new(config.server.trusted_proxies.clone());

        let session_cleanup = SessionCleanupWorker::new(
            Arc::clone(&stores.sessions),
            Arc::clone(&stores.reset_tokens),
            config.cleanup.cleanup_interval_secs,
            config.cleanup.session_retention_days,
        );

        App {
            services: ServiceContainer {
                account_service,
                auth_service,
                password_service,
                health_service,
                rate_limit_service,
            },
            workers: Workers { session_cleanup },
        }
    }
}

/// Applies the embedded SQL migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!().run(pool).await?;
    Ok(())
}

/// Flips the shutdown channel on Ctrl-C or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }

        tracing::info!("Shutdown signal received, draining...");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing before the default hook runs.
pub fn setup_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();

        tracing::error!(panic.location = %location, panic.message = %message, "Panic occurred");
        default_hook(info);
    }));
}
