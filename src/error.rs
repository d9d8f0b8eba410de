use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// A single field-level problem reported in the `details` array of an error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub issue: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, issue: impl Into<String>) -> Self {
        Self { field: field.into(), issue: issue.into() }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid request: {message}")]
    BadRequest { message: String, details: Vec<FieldIssue> },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {message}")]
    Forbidden { message: String, details: Option<Value> },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Gone: {0}")]
    Gone(String),
    #[error("Validation failed: {message}")]
    Validation { message: String, details: Vec<FieldIssue> },
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

pub(crate) const REUSE_DETECTED_MESSAGE: &str = "Refresh token reuse detected — sessions revoked";

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Vec<FieldIssue>) -> Self {
        Self::BadRequest { message: message.into(), details }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    #[must_use]
    pub fn refresh_token_reused() -> Self {
        Self::Forbidden {
            message: REUSE_DETECTED_MESSAGE.to_string(),
            details: Some(json!({ "action": "revoke_all_sessions" })),
        }
    }

    #[must_use]
    pub fn session_revoked() -> Self {
        Self::Forbidden {
            message: "Session has been revoked".to_string(),
            details: Some(json!({ "action": "login_required" })),
        }
    }

    /// The machine-readable `error` kind carried in the response envelope.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Internal => "server_error",
            Self::BadRequest { .. } => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Gone(_) => "gone",
            Self::Validation { .. } => "validation_failed",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::RateLimited => "rate_limit",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, message, details) = match self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred".to_string(), None)
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred".to_string(), None)
            }
            Self::BadRequest { message, details } => {
                tracing::debug!(message = %message, "Bad request");
                (StatusCode::BAD_REQUEST, message, Some(json!(details)))
            }
            Self::Unauthorized(message) => {
                tracing::debug!(message = %message, "Authentication failed");
                (StatusCode::UNAUTHORIZED, message, Some(json!([])))
            }
            Self::Forbidden { message, details } => {
                tracing::debug!(message = %message, "Forbidden");
                (StatusCode::FORBIDDEN, message, details)
            }
            Self::NotFound(message) => {
                tracing::debug!(message = %message, "Resource not found");
                (StatusCode::NOT_FOUND, message, None)
            }
            Self::Conflict(message) => {
                tracing::debug!(message = %message, "Conflict");
                (StatusCode::CONFLICT, message, None)
            }
            Self::Gone(message) => {
                tracing::debug!(message = %message, "Gone");
                (StatusCode::GONE, message, None)
            }
            Self::Validation { message, details } => {
                tracing::debug!(message = %message, "Validation failed");
                (StatusCode::UNPROCESSABLE_ENTITY, message, Some(json!(details)))
            }
            Self::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string(), None)
            }
            Self::RateLimited => {
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests, please try again later".to_string(), None)
            }
        };

        let mut body = json!({
            "success": false,
            "error": kind,
            "message": message,
        });
        if let (Some(details), Some(obj)) = (details, body.as_object_mut()) {
            obj.insert("details".to_string(), details);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_bad_request_carries_field_details() {
        let (status, body) = body_of(AppError::bad_request(
            "Missing or invalid parameters",
            vec![FieldIssue::new("refreshToken", "refreshToken is required")],
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "bad_request");
        assert_eq!(body["details"][0]["field"], "refreshToken");
        assert_eq!(body["details"][0]["issue"], "refreshToken is required");
    }

    #[tokio::test]
    async fn test_reuse_detection_body() {
        let (status, body) = body_of(AppError::refresh_token_reused()).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
        assert_eq!(body["message"], REUSE_DETECTED_MESSAGE);
        assert_eq!(body["details"]["action"], "revoke_all_sessions");
    }

    #[tokio::test]
    async fn test_unauthorized_has_empty_details_array() {
        let (status, body) = body_of(AppError::unauthorized("Expired refresh token")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Expired refresh token");
        assert_eq!(body["details"], json!([]));
    }

    #[tokio::test]
    async fn test_server_errors_hide_internals() {
        let (status, body) = body_of(AppError::Database(sqlx::Error::PoolTimedOut)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "server_error");
        assert_eq!(body["message"], "An unexpected error occurred");
        assert!(body.get("details").is_none());
    }
}
