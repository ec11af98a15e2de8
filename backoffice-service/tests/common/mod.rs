//! Common test utilities for backoffice-service integration tests.

use backoffice_service::config::BackofficeConfig;
use backoffice_service::startup::Application;
use serde_json::{json, Value};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("warn,backoffice_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Seeded user ids.
#[allow(dead_code)]
pub mod users {
    pub const ADMIN: &str = "1";
    pub const MANAGER: &str = "2";
    pub const AGENT: &str = "3";
    pub const ACCOUNTANT: &str = "4";
    pub const HR: &str = "5";
    pub const SUPERVISOR: &str = "6";
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
}

#[allow(dead_code)]
impl TestApp {
    /// POSTs one action to `/api` and returns the decoded envelope.
    pub async fn rpc(&self, action: &str, payload: Value) -> Value {
        self.client
            .post(format!("{}/api", self.address))
            .json(&json!({ "action": action, "payload": payload }))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .expect("Response is not JSON")
    }

    /// Like [`TestApp::rpc`] but panics unless the envelope reports success.
    pub async fn ok(&self, action: &str, payload: Value) -> Value {
        let body = self.rpc(action, payload).await;
        assert_eq!(body["status"], "success", "{action} failed: {body}");
        body["data"].clone()
    }

    /// Like [`TestApp::rpc`] but panics unless the envelope reports an error; returns the message.
    pub async fn err(&self, action: &str, payload: Value) -> String {
        let body = self.rpc(action, payload).await;
        assert_eq!(body["status"], "error", "{action} unexpectedly succeeded: {body}");
        body["message"].as_str().unwrap_or_default().to_string()
    }
}

/// Spawn the application on a random port with the in-memory store and demo data.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(BackofficeConfig::for_tests()).await
}

pub async fn spawn_app_with(config: BackofficeConfig) -> TestApp {
    init_tracing();

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();

    // Wait for server to be ready with retry
    let mut attempts = 0;
    loop {
        match client.get(format!("{}/health", address)).send().await {
            Ok(res) if res.status().is_success() => break,
            _ if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }
            _ => panic!("Server did not become healthy after 20 attempts"),
        }
    }

    TestApp {
        address,
        port,
        client,
    }
}

/// Reads a JSON number, whether it was encoded as an integer or a float.
#[allow(dead_code)]
pub fn num(value: &Value) -> f64 {
    value.as_f64().unwrap_or_else(|| panic!("{value} is not a number"))
}
