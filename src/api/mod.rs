use crate::api::rate_limit::log_rate_limit_events;
use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::services::account_service::AccountService;
use crate::services::auth_service::AuthService;
use crate::services::health_service::HealthService;
use crate::services::password_service::PasswordService;
use crate::services::rate_limit_service::RateLimitService;
use anyhow::Context;
use axum::body::Body;
use axum::http::Request;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod extract;
pub mod health;
pub mod me;
pub mod middleware;
pub mod rate_limit;
pub mod schemas;
pub(crate) mod validation;

#[derive(Clone, Debug)]
pub struct AppState {
    pub account_service: AccountService,
    pub auth_service: AuthService,
    pub password_service: PasswordService,
    pub rate_limit_service: RateLimitService,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub account_service: AccountService,
    pub auth_service: AuthService,
    pub password_service: PasswordService,
    pub health_service: HealthService,
    pub rate_limit_service: RateLimitService,
}

async fn not_found() -> AppError {
    AppError::NotFound("Resource not found".into())
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Configures and returns the primary application router.
///
/// # Errors
/// Returns an error if a rate limiter configuration cannot be constructed.
pub fn app_router(rate_limit: &RateLimitConfig, services: &ServiceContainer) -> anyhow::Result<Router> {
    let std_interval_ns = 1_000_000_000 / rate_limit.per_second.max(1);
    let standard_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(std_interval_ns))
            .burst_size(rate_limit.burst)
            .key_extractor(services.rate_limit_service.extractor.clone())
            .finish()
            .context("Failed to build standard rate limiter config")?,
    );

    // Auth Tier: Stricter limits for credential and token endpoints
    let auth_interval_ns = 1_000_000_000 / rate_limit.auth_per_second.max(1);
    let auth_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(auth_interval_ns))
            .burst_size(rate_limit.auth_burst)
            .key_extractor(services.rate_limit_service.extractor.clone())
            .finish()
            .context("Failed to build auth rate limiter config")?,
    );

    let state = AppState {
        account_service: services.account_service.clone(),
        auth_service: services.auth_service.clone(),
        password_service: services.password_service.clone(),
        rate_limit_service: services.rate_limit_service.clone(),
    };

    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/sign-out", post(auth::sign_out))
        .route("/auth/password/forgot", post(auth::forgot_password))
        .route("/auth/password/reset", post(auth::reset_password))
        .method_not_allowed_fallback(method_not_allowed)
        .layer(GovernorLayer::new(auth_conf));

    let api_routes = Router::new()
        .route("/me/profile", get(me::profile).patch(me::update_profile))
        .route("/me/email", post(me::change_email).patch(me::change_email))
        .route("/me/sessions", get(me::sessions))
        .method_not_allowed_fallback(method_not_allowed)
        .layer(GovernorLayer::new(standard_conf));

    let router = Router::new()
        .merge(auth_routes)
        .merge(api_routes)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), log_rate_limit_events))
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static("x-request-id")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            middleware::MakeRequestUuidOrHeader,
        ))
        .with_state(state);

    Ok(router)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
