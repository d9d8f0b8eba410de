use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub cleanup: CleanupConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Postgres connection URL. Without it the server keeps all state in memory.
    #[arg(long = "database-url", env = "AUTHGATE_DATABASE_URL")]
    pub url: Option<String>,

    /// Maximum number of pooled connections
    #[arg(long, env = "AUTHGATE_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    #[arg(long, env = "AUTHGATE_DB_MIN_CONNECTIONS", default_value_t = 2)]
    pub min_connections: u32,

    /// Seconds to wait for a free connection
    #[arg(long, env = "AUTHGATE_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Seconds before an idle connection is closed
    #[arg(long, env = "AUTHGATE_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Maximum lifetime of a pooled connection in seconds
    #[arg(long, env = "AUTHGATE_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "AUTHGATE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port for the public API
    #[arg(long, env = "AUTHGATE_PORT", default_value_t = 5050)]
    pub port: u16,

    /// Port for liveness and readiness checks
    #[arg(long, env = "AUTHGATE_MGMT_PORT", default_value_t = 5051)]
    pub mgmt_port: u16,

    /// Seconds to wait for background tasks during shutdown
    #[arg(long, env = "AUTHGATE_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "AUTHGATE_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for JWT signing
    #[arg(long, env = "AUTHGATE_JWT_SECRET")]
    pub jwt_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long, env = "AUTHGATE_ACCESS_TOKEN_TTL_SECS", default_value_t = 3600)]
    pub access_token_ttl_secs: u64,

    /// Refresh token time-to-live in days, renewed on every rotation
    #[arg(
        long,
        env = "AUTHGATE_REFRESH_TOKEN_TTL_DAYS",
        default_value_t = 30,
        value_parser = clap::value_parser!(i64).range(1..=3650)
    )]
    pub refresh_token_ttl_days: i64,

    /// Password reset token time-to-live in seconds
    #[arg(
        long,
        env = "AUTHGATE_RESET_TOKEN_TTL_SECS",
        default_value_t = 3600,
        value_parser = clap::value_parser!(i64).range(60..=604_800)
    )]
    pub reset_token_ttl_secs: i64,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed for standard endpoints
    #[arg(long, env = "AUTHGATE_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance for standard endpoints
    #[arg(long, env = "AUTHGATE_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,

    /// Stricter rate limit for the /auth endpoints
    #[arg(long, env = "AUTHGATE_AUTH_RATE_LIMIT_PER_SECOND", default_value_t = 5)]
    pub auth_per_second: u32,

    /// Burst allowance for the /auth endpoints
    #[arg(long, env = "AUTHGATE_AUTH_RATE_LIMIT_BURST", default_value_t = 20)]
    pub auth_burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct CleanupConfig {
    /// How often to purge stale sessions and reset tokens (0 disables the worker)
    #[arg(long, env = "AUTHGATE_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub cleanup_interval_secs: u64,

    /// Days to keep expired or revoked sessions (and their retired token hashes) around
    #[arg(
        long,
        env = "AUTHGATE_SESSION_RETENTION_DAYS",
        default_value_t = 30,
        value_parser = clap::value_parser!(i64).range(0..=3650)
    )]
    pub session_retention_days: i64,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the storage readiness check in milliseconds
    #[arg(long, env = "AUTHGATE_HEALTH_STORAGE_TIMEOUT_MS", default_value_t = 2000)]
    pub storage_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint (gRPC). Export is disabled when unset.
    #[arg(long, env = "AUTHGATE_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "AUTHGATE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
