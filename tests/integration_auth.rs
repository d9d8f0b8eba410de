#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::todo,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    missing_debug_implementations,
    clippy::cast_precision_loss,
    clippy::clone_on_ref_ptr,
    clippy::match_same_arms,
    clippy::items_after_statements,
    unreachable_pub,
    clippy::print_stdout,
    clippy::similar_names
)]
mod common;

use common::{PASSWORD, TestApp, tokens};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn registration(email: &str) -> Value {
    json!({
        "accountType": "solo",
        "signUpMethod": "email",
        "email": email,
        "firstname": "Social",
        "lastname": "Sloth",
        "password": PASSWORD,
        "currency": "USD",
    })
}

#[tokio::test]
async fn test_register_returns_profile_and_tokens() {
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email("register");

    let resp = app.client.post(format!("{}/auth/register", app.server_url)).json(&registration(&email)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], email);
    assert_eq!(body["user"]["accountType"], "solo");
    assert_eq!(body["user"]["accountStatus"], "active");
    assert_eq!(body["user"]["currency"], "USD");
    assert!(body["user"]["id"].is_string());
    assert!(body["user"].get("passwordHash").is_none());
    assert_eq!(body["user"]["auth"]["tokenType"], "Bearer");
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email("duplicate");
    app.register_user(&email).await;

    let resp = app
        .client
        .post(format!("{}/auth/register", app.server_url))
        .json(&registration(&email.to_uppercase()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_register_reports_missing_fields() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/auth/register", app.server_url))
        .json(&json!({ "accountType": "solo", "email": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Missing required fields");
    let fields: Vec<&str> = body["details"].as_array().unwrap().iter().map(|d| d["field"].as_str().unwrap()).collect();
    assert_eq!(fields, vec!["signUpMethod", "email", "firstname", "lastname", "password"]);
}

#[tokio::test]
async fn test_register_rejects_invalid_values() {
    let app = TestApp::spawn().await;
    let url = format!("{}/auth/register", app.server_url);

    let mut bad_email = registration("invalid-email");
    bad_email["email"] = json!("invalid-email");
    let resp = app.client.post(&url).json(&bad_email).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["details"][0]["field"], "email");

    let mut team = registration(&TestApp::unique_email("team"));
    team["accountType"] = json!("team");
    let resp = app.client.post(&url).json(&team).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_enforces_password_policy() {
    let app = TestApp::spawn().await;
    let mut payload = registration(&TestApp::unique_email("weak"));
    payload["password"] = json!("password");

    let resp = app.client.post(format!("{}/auth/register", app.server_url)).json(&payload).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "validation_failed");
    assert!(body["details"].as_array().unwrap().iter().all(|d| d["field"] == "password"));
}

#[tokio::test]
async fn test_login_is_case_insensitive_on_email() {
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email("casing");
    app.register_user(&email).await;

    let resp = app.login(&email.to_uppercase(), PASSWORD).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], email);
    assert_eq!(body["user"]["firstname"], "Social");
    assert_eq!(body["user"]["role"], 1);
}

#[tokio::test]
async fn test_login_failures() {
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email("login_fail");
    app.register_user(&email).await;

    let resp = app.login(&TestApp::unique_email("nobody"), PASSWORD).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "User account not found");

    let resp = app.login(&email, "WrongPassword1!").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid password");
}

#[tokio::test]
async fn test_login_requires_fields() {
    let app = TestApp::spawn().await;

    let resp = app.client.post(format!("{}/auth/login", app.server_url)).json(&json!({})).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Missing required fields");
    let details = body["details"].as_array().unwrap();
    assert_eq!(details.len(), 3);
    assert_eq!(details[0]["field"], "loginType");
    assert_eq!(details[0]["issue"], "This field is required");
    assert_eq!(details[2]["field"], "password");
    assert_eq!(details[2]["issue"], "This field is required for standard login");
}

#[tokio::test]
async fn test_login_rejects_unsupported_login_type() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/auth/login", app.server_url))
        .json(&json!({ "loginType": "google", "email": "a@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_each_login_opens_its_own_session() {
    let app = TestApp::spawn().await;
    let (email, first) = app.signed_in_user("multi").await;
    let second: Value = app.login(&email, PASSWORD).await.json().await.unwrap();

    let (_, first_refresh) = tokens(&first);
    let (_, second_refresh) = tokens(&second["user"]);
    assert_ne!(first_refresh, second_refresh);

    assert_eq!(app.refresh(&first_refresh).await.status(), StatusCode::OK);
    assert_eq!(app.refresh(&second_refresh).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_sign_out_revokes_only_that_session() {
    let app = TestApp::spawn().await;
    let (email, first) = app.signed_in_user("sign_out").await;
    let second: Value = app.login(&email, PASSWORD).await.json().await.unwrap();
    let (first_access, first_refresh) = tokens(&first);
    let (_, second_refresh) = tokens(&second["user"]);

    let resp = app.sign_out(&first_access).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().to_lowercase().contains("logged out"));

    let resp = app.refresh(&first_refresh).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Session has been revoked");

    assert_eq!(app.refresh(&second_refresh).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_sign_out_is_idempotent() {
    let app = TestApp::spawn().await;
    let (_, user) = app.signed_in_user("sign_out_twice").await;
    let (access_token, _) = tokens(&user);

    assert_eq!(app.sign_out(&access_token).await.status(), StatusCode::OK);
    assert_eq!(app.sign_out(&access_token).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_sign_out_requires_bearer() {
    let app = TestApp::spawn().await;

    let resp = app.client.post(format!("{}/auth/sign-out", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app.sign_out("not-a-jwt").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}
