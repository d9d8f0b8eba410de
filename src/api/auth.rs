use crate::api::AppState;
use crate::api::extract::ApiJson;
use crate::api::middleware::AuthUser;
use crate::api::schemas::MessageResponse;
use crate::api::schemas::auth::{
    AuthenticatedUser, ForgotPassword, Login, Refresh, RefreshResponse, Registration, ResetPassword, UserResponse,
};
use crate::api::validation::{FieldCheck, non_empty_string};
use crate::domain::user::{AccountType, Email};
use crate::error::{AppError, FieldIssue, Result};
use crate::services::account_service::Registration as NewRegistration;
use axum::extract::rejection::JsonRejection;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::Value;

const REQUIRED: &str = "This field is required";
const MISSING_FIELDS: &str = "Missing required fields";
const INVALID_PARAMETERS: &str = "Missing or invalid parameters";

pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<Registration>,
) -> Result<impl IntoResponse> {
    let mut check = FieldCheck::new();
    let account_type = check.required("accountType", payload.account_type.as_ref(), REQUIRED);
    let sign_up_method = check.required("signUpMethod", payload.sign_up_method.as_ref(), REQUIRED);
    let email = check.required("email", payload.email.as_ref(), REQUIRED);
    let firstname = check.required("firstname", payload.firstname.as_ref(), REQUIRED);
    let lastname = check.required("lastname", payload.lastname.as_ref(), REQUIRED);
    let password = check.required("password", payload.password.as_ref(), REQUIRED);
    check.finish(MISSING_FIELDS)?;

    let (Some(account_type), Some(sign_up_method), Some(email), Some(firstname), Some(lastname), Some(password)) =
        (account_type, sign_up_method, email, firstname, lastname, password)
    else {
        return Err(AppError::bad_request(MISSING_FIELDS, Vec::new()));
    };

    let mut check = FieldCheck::new();
    let account_type = match account_type.parse::<AccountType>() {
        Ok(account_type) => Some(account_type),
        Err(_) => {
            check.invalid("accountType", "Must be solo or team");
            None
        }
    };
    if sign_up_method != "email" {
        check.invalid("signUpMethod", "Only email sign-up is supported");
    }
    let email = match Email::parse(&email) {
        Ok(email) => Some(email),
        Err(reason) => {
            check.invalid("email", reason);
            None
        }
    };
    let firstname = check.name("firstname", Some(&Value::String(firstname)));
    let lastname = check.name("lastname", Some(&Value::String(lastname)));
    check.finish(INVALID_PARAMETERS)?;

    let (Some(account_type), Some(email), Some(firstname), Some(lastname)) = (account_type, email, firstname, lastname)
    else {
        return Err(AppError::bad_request(INVALID_PARAMETERS, Vec::new()));
    };

    let (user, session) = state
        .account_service
        .register(NewRegistration {
            email,
            firstname,
            lastname,
            password,
            account_type,
            mobile_country_code: non_empty_string(payload.mobile_country_code.as_ref()),
            mobile_number: non_empty_string(payload.mobile_number.as_ref()),
            currency: non_empty_string(payload.currency.as_ref()),
        })
        .await?;

    let response = UserResponse {
        success: true,
        message: "User registered successfully",
        user: AuthenticatedUser::new(user, session),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(State(state): State<AppState>, ApiJson(payload): ApiJson<Login>) -> Result<impl IntoResponse> {
    let mut check = FieldCheck::new();
    let login_type = check.required("loginType", payload.login_type.as_ref(), REQUIRED);
    let email = check.required("email", payload.email.as_ref(), REQUIRED);
    let password = check.required("password", payload.password.as_ref(), "This field is required for standard login");
    check.finish(MISSING_FIELDS)?;

    let (Some(login_type), Some(email), Some(password)) = (login_type, email, password) else {
        return Err(AppError::bad_request(MISSING_FIELDS, Vec::new()));
    };

    if login_type != "standard" {
        return Err(AppError::bad_request(
            INVALID_PARAMETERS,
            vec![FieldIssue::new("loginType", "Only standard login is supported")],
        ));
    }
    let email = Email::parse(&email)
        .map_err(|reason| AppError::bad_request(INVALID_PARAMETERS, vec![FieldIssue::new("email", reason)]))?;

    let (user, session) = state.account_service.login(&email, &password).await?;
    tracing::Span::current().record("user_id", tracing::field::display(session.user_id));

    let response = UserResponse { success: true, message: "Login successful", user: AuthenticatedUser::new(user, session) };
    Ok(Json(response))
}

/// An unreadable body is treated like one without a token.
pub async fn refresh(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Refresh>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let payload = payload.map(|Json(p)| p).unwrap_or_else(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Unreadable refresh body");
        Refresh::default()
    });

    let Some(refresh_token) = non_empty_string(payload.refresh_token.as_ref()) else {
        return Err(AppError::bad_request(
            INVALID_PARAMETERS,
            vec![FieldIssue::new("refreshToken", "refreshToken is required")],
        ));
    };

    let session = state.account_service.refresh_session(&refresh_token).await?;

    let response = RefreshResponse { success: true, message: "Token refreshed successfully", auth: session.into() };
    Ok(Json(response))
}

pub async fn sign_out(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    state.auth_service.sign_out(auth_user.user_id, auth_user.session_id).await?;
    Ok(Json(MessageResponse::ok("Successfully logged out")))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPassword>,
) -> Result<impl IntoResponse> {
    let mut check = FieldCheck::new();
    let email = check.required("email", payload.email.as_ref(), REQUIRED);
    check.finish(MISSING_FIELDS)?;

    let email = email.ok_or_else(|| AppError::bad_request(MISSING_FIELDS, Vec::new()))?;
    let email = Email::parse(&email)
        .map_err(|reason| AppError::bad_request(INVALID_PARAMETERS, vec![FieldIssue::new("email", reason)]))?;

    state.password_service.forgot_password(&email).await?;
    Ok(Json(MessageResponse::ok("Password reset email sent")))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPassword>,
) -> Result<impl IntoResponse> {
    let mut check = FieldCheck::new();
    let email = check.required("email", payload.email.as_ref(), REQUIRED);
    let token = check.required("resetPasswordToken", payload.reset_password_token.as_ref(), REQUIRED);
    let password = check.required("password", payload.password.as_ref(), REQUIRED);
    check.finish(MISSING_FIELDS)?;

    let (Some(email), Some(token), Some(password)) = (email, token, password) else {
        return Err(AppError::bad_request(MISSING_FIELDS, Vec::new()));
    };
    let email = Email::parse(&email)
        .map_err(|reason| AppError::bad_request(INVALID_PARAMETERS, vec![FieldIssue::new("email", reason)]))?;

    state.password_service.reset_password(&email, &token, &password).await?;
    Ok(Json(MessageResponse::ok("Password has been reset successfully")))
}
