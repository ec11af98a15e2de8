//! Integration tests for the HTTP surface: health checks, metrics and the RPC envelope.

mod common;

use common::spawn_app;
use serde_json::Value;

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn readiness_checks_the_store() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn incoming_request_id_is_echoed() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn metrics_expose_rpc_counters() {
    let app = spawn_app().await;
    app.ok("testConnection", Value::Null).await;

    let body = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("backoffice_rpc_requests_total"));
    assert!(body.contains("http_requests_total"));
}

#[tokio::test]
async fn exec_accepts_plain_text_bodies() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/exec", app.address))
        .header("content-type", "text/plain;charset=utf-8")
        .body(r#"{"action":"testConnection"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["message"], "Connection successful!");
    assert_eq!(body["data"]["backend"], "memory");
}

#[tokio::test]
async fn errors_use_the_envelope_with_http_200() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api", app.address))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["data"].is_null());

    let message = app.err("launchRockets", serde_json::json!({})).await;
    assert_eq!(message, "Bad request: Unknown action: launchRockets");
}

#[tokio::test]
async fn rpc_is_rate_limited_per_client() {
    let mut config = backoffice_service::config::BackofficeConfig::for_tests();
    config.rate_limit.attempts = 2;
    let app = common::spawn_app_with(config).await;

    app.ok("testConnection", Value::Null).await;
    app.ok("testConnection", Value::Null).await;

    let response = app
        .client
        .post(format!("{}/api", app.address))
        .body(r#"{"action":"testConnection"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 429);
    assert!(response.headers().contains_key("retry-after"));

    // Health checks are not limited.
    let health = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert!(health.status().is_success());
}
