use crate::api::AppState;
use crate::error::AppError;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Records every limiter decision and renders throttled responses in the API's error envelope.
pub async fn log_rate_limit_events(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let tier = if req.uri().path().starts_with("/auth/") { "auth" } else { "standard" };
    let response = next.run(req).await;
    let status = response.status();

    let retry_after = response.headers().get("retry-after").and_then(|v| v.to_str().ok()).map(str::to_owned);
    state.rate_limit_service.log_decision(tier, status, retry_after.as_deref());

    if status != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let mut rewritten = AppError::RateLimited.into_response();
    for name in ["retry-after", "x-ratelimit-after", "x-ratelimit-limit", "x-ratelimit-remaining"] {
        if let Some(value) = response.headers().get(name) {
            rewritten.headers_mut().insert(name, value.clone());
        }
    }
    rewritten
}
