use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config using the poll backend
fn minimal_config(port: u16, db_path: &Path) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[processor]
backend = "poll"
poll_interval_ms = 50
"#,
        port,
        db_path.display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_contentgate"))
        .env("CONTENTGATE_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Run the binary to completion with the given config file
async fn run_to_exit(config_path: &Path) -> std::process::Output {
    timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_contentgate"))
            .env("CONTENTGATE_CONFIG", config_path)
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command")
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let data_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &data_dir.path().join("test.db")));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let json: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_poll_backend_processes_submissions() {
    let port = get_available_port();
    let data_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &data_dir.path().join("test.db")));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let created: Value = client
        .post(format!("http://127.0.0.1:{}/api/submissions", port))
        .json(&json!({ "content": "abcdefgh1i" }))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    let id = created["id"].as_str().unwrap().to_string();

    let mut status = Value::Null;
    for _ in 0..100 {
        let body: Value = client
            .get(format!("http://127.0.0.1:{}/api/submissions/{}", port, id))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        status = body["status"].clone();
        if status == "PASSED" {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(status, "PASSED");

    let json: Value = client
        .get(format!("http://127.0.0.1:{}/api/status", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["backend"], "poll");
    assert_eq!(json["consumer_running"], true);
    assert_eq!(json["passed"], 1);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let port = get_available_port();
    let data_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &data_dir.path().join("test.db")));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let json: Value = Client::new()
        .get(format!("http://127.0.0.1:{}/api/config", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");

    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["processor"]["backend"], "poll");
    // Broker settings are only shown when the broker backend is active
    assert!(json.get("broker").is_none());

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = run_to_exit(Path::new("/nonexistent/config.toml")).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 0
"#,
    );

    let result = run_to_exit(config.path()).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_pattern_exits_with_error() {
    let data_dir = TempDir::new().unwrap();
    let content = format!(
        "{}\n[validator]\nrequired_pattern = \"[0-9\"\n",
        minimal_config(get_available_port(), &data_dir.path().join("test.db"))
    );
    let config = write_config(&content);

    let result = run_to_exit(config.path()).await;
    assert!(!result.status.success());
}
