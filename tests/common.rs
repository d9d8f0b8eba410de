#![allow(dead_code)]

use async_trait::async_trait;
use authgate_server::api::MgmtState;
use authgate_server::config::{
    AuthConfig, CleanupConfig, Config, DatabaseConfig, HealthConfig, LogFormat, RateLimitConfig, ServerConfig,
    TelemetryConfig,
};
use authgate_server::services::mailer::{MailError, Mailer};
use authgate_server::adapters::database::{self, DbPool};
use authgate_server::{AppBuilder, Stores};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

pub const PASSWORD: &str = "Password123!";

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn,authgate_server=debug,tower=warn,hyper=warn,reqwest=warn".into());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// Connects to `DATABASE_URL` and applies migrations; `None` when no database is configured.
pub async fn get_test_pool() -> Option<DbPool> {
    setup_tracing();
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let config = get_test_config();
    let pool = database::init_pool(&config.database, &database_url)
        .await
        .expect("Failed to connect to DB. Is Postgres running?");

    // Run migrations automatically
    sqlx::migrate!().run(&pool).await.expect("Failed to run migrations");

    Some(pool)
}

/// Postgres-backed stores when `DATABASE_URL` is set, in-memory ones otherwise.
pub async fn test_stores() -> Stores {
    match get_test_pool().await {
        Some(pool) => Stores::postgres(&pool),
        None => Stores::in_memory(),
    }
}

pub fn get_test_config() -> Config {
    Config {
        database: DatabaseConfig {
            url: None,
            max_connections: 5,
            min_connections: 0,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            mgmt_port: 0,
            shutdown_timeout_secs: 5,
            trusted_proxies: vec!["127.0.0.1/32".parse().unwrap(), "::1/128".parse().unwrap()],
        },
        auth: AuthConfig {
            jwt_secret: "test_secret".to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 30,
            reset_token_ttl_secs: 3600,
        },
        rate_limit: RateLimitConfig { per_second: 10000, burst: 10000, auth_per_second: 10000, auth_burst: 10000 },
        cleanup: CleanupConfig { cleanup_interval_secs: 0, session_retention_days: 30 },
        health: HealthConfig { storage_timeout_ms: 2000 },
        telemetry: TelemetryConfig { otlp_endpoint: None, log_format: LogFormat::Text },
    }
}

/// Keeps every reset token handed to it so tests can complete the reset flow.
#[derive(Debug, Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingMailer {
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        self.sent.lock().unwrap().iter().rev().find(|(to, _)| to == email).map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send_password_reset(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.sent.lock().unwrap().push((email.to_string(), token.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: Client,
    pub config: Config,
    pub stores: Stores,
    pub mailer: Arc<CapturingMailer>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        Self::spawn_with_stores(config, test_stores().await).await
    }

    pub async fn spawn_with_stores(config: Config, stores: Stores) -> Self {
        setup_tracing();

        let mailer = Arc::new(CapturingMailer::default());
        let app = AppBuilder::new(config.clone()).with_stores(stores.clone()).with_mailer(mailer.clone()).build();

        let app_router = authgate_server::api::app_router(&config.rate_limit, &app.services).unwrap();
        let mgmt_router = authgate_server::api::mgmt_router(MgmtState { health_service: app.services.health_service });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app_router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        let mgmt_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        Self { server_url, mgmt_url, client: Client::new(), config, stores, mailer }
    }

    pub fn unique_email(prefix: &str) -> String {
        format!("{prefix}_{}@example.com", &Uuid::new_v4().simple().to_string()[..12])
    }

    /// Registers a solo account and returns the `user` object of the response.
    pub async fn register_user(&self, email: &str) -> Value {
        let resp = self
            .client
            .post(format!("{}/auth/register", self.server_url))
            .json(&json!({
                "accountType": "solo",
                "signUpMethod": "email",
                "email": email,
                "firstname": "Social",
                "lastname": "Sloth",
                "password": PASSWORD,
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        body["user"].clone()
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/auth/login", self.server_url))
            .json(&json!({ "loginType": "standard", "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Registers a fresh account and logs in; returns `(email, login user object)`.
    pub async fn signed_in_user(&self, prefix: &str) -> (String, Value) {
        let email = Self::unique_email(prefix);
        self.register_user(&email).await;

        let resp = self.login(&email, PASSWORD).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        (email, body["user"].clone())
    }

    pub async fn refresh(&self, refresh_token: &str) -> Response {
        self.refresh_with(&json!({ "refreshToken": refresh_token })).await
    }

    pub async fn refresh_with(&self, payload: &Value) -> Response {
        self.client.post(format!("{}/auth/refresh", self.server_url)).json(payload).send().await.unwrap()
    }

    pub async fn sign_out(&self, access_token: &str) -> Response {
        self.client
            .post(format!("{}/auth/sign-out", self.server_url))
            .bearer_auth(access_token)
            .send()
            .await
            .unwrap()
    }
}

pub fn tokens(user_or_body: &Value) -> (String, String) {
    let auth = &user_or_body["auth"];
    (auth["accessToken"].as_str().unwrap().to_string(), auth["refreshToken"].as_str().unwrap().to_string())
}
