use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::{Arc, Mutex};
use tower::ServiceExt; // for Router::oneshot

use deployhook::commands::dispatch::{DeployRunner, DeploymentRequest, DispatchError};
use deployhook::comms::webhook_api::{create_router, AppState};
use deployhook::config::Config;
use deployhook::security::secret::SecretStore;

const TEST_SECRET: &str = "mock_secret";

struct StaticSecretStore;

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn fetch(&self) -> anyhow::Result<Value> {
        Ok(json!({"webhook_secret": TEST_SECRET}))
    }
}

struct FailingSecretStore;

#[async_trait]
impl SecretStore for FailingSecretStore {
    async fn fetch(&self) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("vault unreachable"))
    }
}

/// Fake execution agent: records every dispatched request, optionally fails.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<DeploymentRequest>>,
    fail: bool,
}

impl RecordingRunner {
    fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DeployRunner for RecordingRunner {
    async fn execute(&self, request: &DeploymentRequest) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push(request.clone());
        if self.fail {
            Err(DispatchError::Failed(Some(1)))
        } else {
            Ok(())
        }
    }
}

fn test_config() -> Config {
    Config {
        deploy_script: "/opt/mgt/deployrepo.sh".to_string(),
        tolerance_secs: 45,
        replay_capacity: 100,
    }
}

fn test_router(runner: Arc<RecordingRunner>) -> Router {
    let state = Arc::new(AppState::new(
        &test_config(),
        Arc::new(StaticSecretStore),
        runner,
    ));
    create_router(state)
}

type HmacSha256 = Hmac<Sha256>;

fn sign_hex(key: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn payload_with_timestamp(ts: String) -> Vec<u8> {
    json!({
        "debug_mode": "false",
        "repo_url": "git@github.com:example/aqua.git",
        "repo_mgt_dir": "mgt",
        "phase": "deploy",
        "phase_script": "deploy.sh",
        "container_name": "aqua-app",
        "timestamp": ts
    })
    .to_string()
    .into_bytes()
}

fn fresh_payload() -> Vec<u8> {
    payload_with_timestamp(Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

async fn post_webhook(app: &Router, body: &[u8], signature: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mgtapi")
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("X-Hub-Signature-256", sig);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_vec())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_router(Arc::new(RecordingRunner::default()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_valid_signature_triggers_deployment() {
    let runner = Arc::new(RecordingRunner::default());
    let app = test_router(runner.clone());

    let body = fresh_payload();
    let sig = sign_hex(TEST_SECRET, &body);
    let (status, json_body) = post_webhook(&app, &body, Some(&sig)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body, json!({"message": "Deployment triggered"}));

    let calls = runner.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].container_name, "aqua-app");
    assert_eq!(calls[0].repo_url, "git@github.com:example/aqua.git");
    assert_eq!(calls[0].repo_mgt_dir, "mgt");
    assert_eq!(calls[0].phase, "deploy");
    assert_eq!(calls[0].phase_script, "deploy.sh");
    assert_eq!(calls[0].debug_mode, "false");
}

#[tokio::test]
async fn test_invalid_signature_rejected() {
    let runner = Arc::new(RecordingRunner::default());
    let app = test_router(runner.clone());

    let body = fresh_payload();
    let sig = sign_hex("invalid_secret", &body);
    let (status, json_body) = post_webhook(&app, &body, Some(&sig)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json_body, json!({"detail": "Invalid signature"}));
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_missing_signature_header_rejected() {
    let runner = Arc::new(RecordingRunner::default());
    let app = test_router(runner.clone());

    let body = json!({"na": "na"}).to_string().into_bytes();
    let (status, json_body) = post_webhook(&app, &body, None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json_body, json!({"detail": "Invalid signature"}));
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_reused_signature_rejected() {
    let runner = Arc::new(RecordingRunner::default());
    let app = test_router(runner.clone());

    let body = fresh_payload();
    let sig = sign_hex(TEST_SECRET, &body);

    let (first, _) = post_webhook(&app, &body, Some(&sig)).await;
    assert_eq!(first, StatusCode::OK);

    let (second, json_body) = post_webhook(&app, &body, Some(&sig)).await;
    assert_eq!(second, StatusCode::FORBIDDEN);
    assert_eq!(json_body, json!({"detail": "Signature has already been used"}));
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_invalid_json_with_valid_signature() {
    let runner = Arc::new(RecordingRunner::default());
    let app = test_router(runner.clone());

    let body = b"invalid json";
    let sig = sign_hex(TEST_SECRET, body);
    let (status, json_body) = post_webhook(&app, body, Some(&sig)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body, json!({"detail": "Invalid JSON payload"}));
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_timestamp_format() {
    let app = test_router(Arc::new(RecordingRunner::default()));

    let body = payload_with_timestamp("invalid-timestamp".to_string());
    let sig = sign_hex(TEST_SECRET, &body);
    let (status, json_body) = post_webhook(&app, &body, Some(&sig)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body, json!({"detail": "Invalid timestamp format"}));
}

#[tokio::test]
async fn test_timestamp_outside_allowed_range() {
    let app = test_router(Arc::new(RecordingRunner::default()));

    let stale = (Utc::now() - Duration::seconds(100))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();
    let body = payload_with_timestamp(stale);
    let sig = sign_hex(TEST_SECRET, &body);
    let (status, json_body) = post_webhook(&app, &body, Some(&sig)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json_body, json!({"detail": "Invalid timestamp"}));
}

#[tokio::test]
async fn test_timestamp_at_boundary_accepted() {
    let app = test_router(Arc::new(RecordingRunner::default()));

    let edge = (Utc::now() - Duration::seconds(44))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();
    let body = payload_with_timestamp(edge);
    let sig = sign_hex(TEST_SECRET, &body);
    let (status, _) = post_webhook(&app, &body, Some(&sig)).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_timestamp_just_past_boundary_rejected() {
    let app = test_router(Arc::new(RecordingRunner::default()));

    let past = (Utc::now() - Duration::seconds(47))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();
    let body = payload_with_timestamp(past);
    let sig = sign_hex(TEST_SECRET, &body);
    let (status, json_body) = post_webhook(&app, &body, Some(&sig)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json_body, json!({"detail": "Invalid timestamp"}));
}

#[tokio::test]
async fn test_secret_store_failure_returns_500() {
    let state = Arc::new(AppState::new(
        &test_config(),
        Arc::new(FailingSecretStore),
        Arc::new(RecordingRunner::default()),
    ));
    let app = create_router(state);

    let body = fresh_payload();
    let sig = sign_hex(TEST_SECRET, &body);
    let (status, json_body) = post_webhook(&app, &body, Some(&sig)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body, json!({"detail": "Error retrieving secret"}));
}

#[tokio::test]
async fn test_deployment_script_failure_returns_500() {
    let runner = Arc::new(RecordingRunner::failing());
    let app = test_router(runner.clone());

    let body = fresh_payload();
    let sig = sign_hex(TEST_SECRET, &body);
    let (status, json_body) = post_webhook(&app, &body, Some(&sig)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body, json!({"detail": "Error running deployment script"}));
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_payload_missing_fields_is_invalid_json() {
    let app = test_router(Arc::new(RecordingRunner::default()));

    let body = json!({"phase": "deploy"}).to_string().into_bytes();
    let sig = sign_hex(TEST_SECRET, &body);
    let (status, json_body) = post_webhook(&app, &body, Some(&sig)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body, json!({"detail": "Invalid JSON payload"}));
}
