use crate::config::HealthConfig;
use crate::services::store::SessionStore;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("authgate-server");
        Self {
            status: meter
                .i64_gauge("authgate_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    sessions: Arc<dyn SessionStore>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, config: HealthConfig) -> Self {
        Self { sessions, config, metrics: Metrics::new() }
    }

    /// Checks that the session store answers within the configured timeout.
    ///
    /// # Errors
    /// Returns a string describing the failure if the store is unreachable.
    pub async fn check_storage(&self) -> Result<(), String> {
        let storage_timeout = Duration::from_millis(self.config.storage_timeout_ms);
        let component = [KeyValue::new("component", "session_store")];

        match timeout(storage_timeout, self.sessions.ping()).await {
            Ok(Ok(())) => {
                self.metrics.status.record(1, &component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.metrics.status.record(0, &component);
                Err(format!("Session store check failed: {e}"))
            }
            Err(_) => {
                self.metrics.status.record(0, &component);
                Err("Session store check timed out".to_string())
            }
        }
    }
}
