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
use axum::http::StatusCode;
use futures::future::join_all;
use reqwest::Client;
use serde_json::{Value, json};

mod common;

fn limited_config(per_second: u32, burst: u32) -> authgate_server::config::Config {
    let mut config = common::get_test_config();
    config.rate_limit.per_second = per_second;
    config.rate_limit.burst = burst;
    config
}

#[tokio::test]
async fn test_rate_limit_isolation() {
    let app = common::TestApp::spawn_with_config(limited_config(1, 2)).await;

    let user_a = "1.1.1.1";
    let user_b = "2.2.2.2";

    println!("Exhausting User A's bucket...");
    for i in 1..=2 {
        let resp = app
            .client
            .get(format!("{}/me/profile", app.server_url))
            .header("X-Forwarded-For", user_a)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "Request {i} for User A should pass the limiter");
    }

    let resp_a = app
        .client
        .get(format!("{}/me/profile", app.server_url))
        .header("X-Forwarded-For", user_a)
        .send()
        .await
        .unwrap();
    assert_eq!(resp_a.status(), StatusCode::TOO_MANY_REQUESTS, "User A should now be blocked");

    let body: Value = resp_a.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "rate_limit");

    println!("Verifying User B is unaffected...");
    let resp_b = app
        .client
        .get(format!("{}/me/profile", app.server_url))
        .header("X-Forwarded-For", user_b)
        .send()
        .await
        .unwrap();
    assert_eq!(resp_b.status(), StatusCode::UNAUTHORIZED, "User B should be perfectly fine");
}

#[tokio::test]
async fn test_rate_limit_spoofing_protection() {
    let app = common::TestApp::spawn_with_config(limited_config(1, 1)).await;

    let spoofed_ip = "1.2.3.4";
    let real_attacker_ip = "5.6.7.8";

    let _ = app
        .client
        .get(format!("{}/me/profile", app.server_url))
        .header("X-Forwarded-For", format!("{spoofed_ip}, {real_attacker_ip}"))
        .send()
        .await
        .unwrap();

    let resp = app
        .client
        .get(format!("{}/me/profile", app.server_url))
        .header("X-Forwarded-For", format!("9.9.9.9, {real_attacker_ip}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS, "Should block based on the rightmost untrusted IP");

    let resp_ok = app
        .client
        .get(format!("{}/me/profile", app.server_url))
        .header("X-Forwarded-For", spoofed_ip)
        .send()
        .await
        .unwrap();
    assert_eq!(resp_ok.status(), StatusCode::UNAUTHORIZED, "The spoofed IP itself should not be affected");
}

#[tokio::test]
async fn test_rate_limit_concurrency_across_ips() {
    let app = common::TestApp::spawn_with_config(limited_config(1, 2)).await;

    let client = Client::new();
    let tasks = (0..20).map(|i| {
        let url = format!("{}/me/profile", app.server_url);
        let c = client.clone();
        tokio::spawn(async move { c.get(url).header("X-Forwarded-For", format!("10.10.10.{i}")).send().await.unwrap() })
    });

    for res in join_all(tasks).await {
        assert_eq!(res.unwrap().status(), StatusCode::UNAUTHORIZED, "All concurrent unique IPs should pass");
    }
}

#[tokio::test]
async fn test_auth_tier_is_stricter() {
    let mut config = limited_config(100, 100);
    config.rate_limit.auth_per_second = 1;
    config.rate_limit.auth_burst = 1;
    let app = common::TestApp::spawn_with_config(config).await;
    let ip = "3.3.3.3";

    let refresh = || {
        app.client
            .post(format!("{}/auth/refresh", app.server_url))
            .header("X-Forwarded-For", ip)
            .json(&json!({ "refreshToken": "unknown" }))
            .send()
    };

    assert_eq!(refresh().await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(refresh().await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);

    let resp = app
        .client
        .get(format!("{}/me/profile", app.server_url))
        .header("X-Forwarded-For", ip)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "Standard tier keeps its own budget");
}
