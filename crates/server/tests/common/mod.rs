//! Common test utilities for in-process API testing.
//!
//! This module provides a test fixture that builds the router over an on-disk
//! store and an in-memory broker, enabling end-to-end tests without external
//! infrastructure.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use contentgate_core::{
    testing::InMemoryBroker, Config, ConsumerLifecycle, ContentRules, SqliteSubmissionStore,
    SubmissionProcessor, SubmissionService, SubmissionStore, TransportBackend,
};
use contentgate_server::{api::create_router, state::AppState};

/// Test fixture wiring the real router to the broker transport.
///
/// The broker is an [`InMemoryBroker`], so tests can inspect what intake
/// published and inject publish failures.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submission_creation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture
///         .post("/api/submissions", json!({ "content": "abcdefgh1i" }))
///         .await;
///     assert_eq!(response.status, StatusCode::CREATED);
///     assert_eq!(fixture.broker.messages().len(), 1);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<SqliteSubmissionStore>,
    pub broker: InMemoryBroker,
    pub lifecycle: Arc<ConsumerLifecycle>,
    pub temp_dir: TempDir,
}

/// Response from a test request.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Start the broker consumer so submissions get processed
    pub start_consumer: bool,
}

impl TestConfig {
    /// Create config with the consumer running.
    pub fn with_consumer() -> Self {
        Self {
            start_consumer: true,
        }
    }
}

impl TestFixture {
    /// Create a fixture whose consumer is not running.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.database.path = temp_dir.path().join("test.db");
        config.processor.backend = TransportBackend::Broker;
        config.processor.shutdown_grace_ms = 1000;
        config.broker.bootstrap_servers = vec!["user:secret@kafka-1:9092".to_string()];
        config.broker.publish_retries = 0;
        config.broker.poll_timeout_ms = 20;
        config.broker.retry_backoff_ms = 10;

        let store = Arc::new(
            SqliteSubmissionStore::new(&config.database.path).expect("Failed to create store"),
        );

        let broker = InMemoryBroker::new();
        let processor = Arc::new(SubmissionProcessor::new(
            Arc::clone(&store) as Arc<dyn SubmissionStore>,
            Arc::new(ContentRules::default()),
        ));
        let lifecycle = Arc::new(ConsumerLifecycle::broker(
            &config,
            processor,
            Arc::new(broker.clone()),
            broker.connector(),
        ));

        if test_config.start_consumer {
            lifecycle.start().await.expect("Failed to start consumer");
        }

        let submissions = SubmissionService::new(Arc::clone(&store) as Arc<dyn SubmissionStore>)
            .with_producer(lifecycle.producer());

        let state = Arc::new(AppState::new(config, submissions, Arc::clone(&lifecycle)));
        let router = create_router(state);

        Self {
            router,
            store,
            broker,
            lifecycle,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Create a submission and return its id.
    pub async fn create_submission(&self, content: &str) -> String {
        let response = self
            .post("/api/submissions", serde_json::json!({ "content": content }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"]
            .as_str()
            .expect("Response has no id")
            .to_string()
    }

    /// Poll the API until the submission reaches `status`.
    pub async fn wait_for_status(&self, id: &str, status: &str) -> Value {
        let path = format!("/api/submissions/{}", id);
        for _ in 0..300 {
            let response = self.get(&path).await;
            if response.body["status"] == status {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Submission {} never reached {}", id, status);
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
        };

        TestResponse { status, body }
    }
}
