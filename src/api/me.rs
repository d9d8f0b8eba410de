use crate::api::AppState;
use crate::api::extract::ApiJson;
use crate::api::middleware::AuthUser;
use crate::api::schemas::me::{ChangeEmail, ProfileResponse, ProfileUpdatedResponse, SessionSummary, SessionsResponse};
use crate::api::validation::FieldCheck;
use crate::domain::user::{Email, ProfileUpdate};
use crate::error::{AppError, FieldIssue, Result};
use axum::{Json, extract::State, response::IntoResponse};
use serde_json::{Map, Value};

pub async fn profile(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let user = state.account_service.profile(auth_user.user_id).await?;
    Ok(Json(ProfileResponse { success: true, user: user.into() }))
}

/// Partial update. Fields that are not self-service (id, email, role, status) are ignored.
pub async fn update_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> Result<impl IntoResponse> {
    let mut check = FieldCheck::new();
    let update = ProfileUpdate {
        firstname: check.name("firstname", body.get("firstname")),
        lastname: check.name("lastname", body.get("lastname")),
        mobile_country_code: check.clearable("mobileCountryCode", body.get("mobileCountryCode")),
        mobile_number: check.clearable("mobileNumber", body.get("mobileNumber")),
        currency: check.clearable("currency", body.get("currency")),
    };
    check.finish("Missing or invalid parameters")?;

    if update.is_empty() {
        return Err(AppError::bad_request(
            "No updatable fields provided",
            vec![FieldIssue::new("body", "Provide at least one of firstname, lastname, mobileCountryCode, mobileNumber, currency")],
        ));
    }

    let user = state.account_service.update_profile(auth_user.user_id, update).await?;
    Ok(Json(ProfileUpdatedResponse { success: true, message: "Profile updated successfully", user: user.into() }))
}

pub async fn change_email(
    auth_user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ChangeEmail>,
) -> Result<impl IntoResponse> {
    let mut check = FieldCheck::new();
    let email = check.required("email", payload.email.as_ref(), "This field is required");
    check.finish("Missing required fields")?;

    let email = email.ok_or_else(|| AppError::bad_request("Missing required fields", Vec::new()))?;
    let email = Email::parse(&email)
        .map_err(|reason| AppError::bad_request("Missing or invalid parameters", vec![FieldIssue::new("email", reason)]))?;

    let user = state.account_service.change_email(auth_user.user_id, &email).await?;
    Ok(Json(ProfileUpdatedResponse { success: true, message: "Email updated successfully", user: user.into() }))
}

pub async fn sessions(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let sessions = state.auth_service.list_sessions(auth_user.user_id).await?;
    let sessions = sessions.iter().map(|s| SessionSummary::new(s, auth_user.session_id)).collect();
    Ok(Json(SessionsResponse { success: true, sessions }))
}
