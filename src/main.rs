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

use authgate_server::api::MgmtState;
use authgate_server::config::Config;
use authgate_server::{AppBuilder, Workers, adapters, telemetry};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::Instrument;

/// Everything `boot` prepares before the servers start accepting connections.
struct Booted {
    api_listener: TcpListener,
    mgmt_listener: TcpListener,
    app_router: axum::Router,
    mgmt_router: axum::Router,
    workers: Workers,
}

async fn boot(config: &Config) -> anyhow::Result<Booted> {
    let mut builder = AppBuilder::new(config.clone());
    if let Some(url) = &config.database.url {
        let pool = adapters::database::init_pool(&config.database, url).await?;
        authgate_server::run_migrations(&pool).await?;
        builder = builder.with_database(&pool);
    }
    let app = builder.build();

    let app_router = authgate_server::api::app_router(&config.rate_limit, &app.services)?;
    let mgmt_router = authgate_server::api::mgmt_router(MgmtState { health_service: app.services.health_service });

    let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;
    let api_listener = TcpListener::bind(api_addr).await?;
    let mgmt_listener = TcpListener::bind(mgmt_addr).await?;

    tracing::info!(address = %api_addr, "listening");
    tracing::info!(address = %mgmt_addr, "management server listening");

    Ok(Booted { api_listener, mgmt_listener, app_router, mgmt_router, workers: app.workers })
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|&s| s).await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    authgate_server::setup_panic_hook();

    let booted = boot(&config).instrument(tracing::info_span!("boot_server")).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    authgate_server::spawn_signal_handler(shutdown_tx.clone());

    let worker_tasks = booted.workers.spawn_all(shutdown_rx.clone());

    let api_server =
        axum::serve(booted.api_listener, booted.app_router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let mgmt_server =
        axum::serve(booted.mgmt_listener, booted.mgmt_router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    // A server error also stops the cleanup worker.
    let _ = shutdown_tx.send(true);
    let drain = futures::future::join_all(worker_tasks);
    if tokio::time::timeout(Duration::from_secs(config.server.shutdown_timeout_secs), drain).await.is_err() {
        tracing::warn!("Timeout waiting for background tasks to finish.");
    } else {
        tracing::info!("Background tasks finished.");
    }

    telemetry_guard.shutdown();
    Ok(())
}
