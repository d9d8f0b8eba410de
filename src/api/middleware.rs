use crate::api::AppState;
use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, Request, header, request::Parts},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// The caller identified by a valid bearer access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let missing = || AppError::unauthorized("Missing or invalid authorization header");

        let auth_str = parts.headers.get(header::AUTHORIZATION).ok_or_else(missing)?.to_str().map_err(|_| missing())?;
        let token = auth_str.strip_prefix("Bearer ").ok_or_else(missing)?;

        let claims = state.auth_service.verify_token(token.trim())?;
        tracing::Span::current().record("user_id", tracing::field::display(claims.sub));

        Ok(Self { user_id: claims.sub, session_id: claims.sid })
    }
}

/// Keeps a caller-supplied `x-request-id` (if it is sane) and mints a v4 UUID otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidOrHeader;

const MAX_REQUEST_ID_LEN: usize = 128;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &Request<B>) -> Option<RequestId> {
        if let Some(existing) = request.headers().get("x-request-id")
            && !existing.is_empty()
            && existing.len() <= MAX_REQUEST_ID_LEN
        {
            return Some(RequestId::new(existing.clone()));
        }

        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok().map(RequestId::new)
    }
}
