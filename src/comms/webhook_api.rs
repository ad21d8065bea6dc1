use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use crate::commands::dispatch::{DeployRunner, DeploymentRequest, ScriptRunner};
use crate::config::Config;
use crate::security::audit_log::AuditLogger;
use crate::security::authenticator::{AuthVerdict, RequestAuthenticator};
use crate::security::replay::ReplayLedger;
use crate::security::secret::{SecretProvider, SecretStore, VaultSecretStore};

/// Header carrying the HMAC signature, as sent by GitHub-style callers.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

type SharedState = Arc<AppState>;

pub struct AppState {
    pub authenticator: RequestAuthenticator,
    pub runner: Arc<dyn DeployRunner>,
    pub audit: AuditLogger,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn SecretStore>,
        runner: Arc<dyn DeployRunner>,
    ) -> Self {
        let secrets = SecretProvider::new(store);
        let ledger = ReplayLedger::new(config.replay_capacity);
        Self {
            authenticator: RequestAuthenticator::new(secrets, ledger, config.tolerance_secs),
            runner,
            audit: AuditLogger::new(),
        }
    }
}

// Health check
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"detail": message}))).into_response()
}

/// Handle the pipeline trigger request.
///
/// The request must carry an `X-Hub-Signature-256: sha256=<hex>` header and
/// a JSON payload with the fields of [`DeploymentRequest`]; `timestamp` is
/// the output of `date -u +"%Y-%m-%dT%H:%M:%SZ"` on the sender.
async fn trigger_deployment(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // A missing or non-ASCII header is treated as an empty token: it is
    // recorded in the ledger and then fails signature verification.
    let token = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    // Decode up front so the timestamp is available to the authenticator;
    // a payload error is only reported once replay and signature pass.
    let payload: Option<DeploymentRequest> = serde_json::from_slice(&body).ok();
    let timestamp = payload.as_ref().map(|p| p.timestamp.as_str());

    let verdict = state
        .authenticator
        .authenticate(&body, token, timestamp, Utc::now())
        .await;

    match verdict {
        AuthVerdict::ReplayedSignature => {
            state.audit.replay_detected();
            detail(StatusCode::FORBIDDEN, "Signature has already been used")
        }
        AuthVerdict::SecretUnavailable => {
            state.audit.secret_unavailable();
            detail(StatusCode::INTERNAL_SERVER_ERROR, "Error retrieving secret")
        }
        AuthVerdict::InvalidSignature => {
            state.audit.signature_invalid();
            detail(StatusCode::FORBIDDEN, "Invalid signature")
        }
        AuthVerdict::MalformedPayload => {
            state.audit.malformed_payload();
            detail(StatusCode::BAD_REQUEST, "Invalid JSON payload")
        }
        AuthVerdict::MalformedTimestamp => {
            detail(StatusCode::BAD_REQUEST, "Invalid timestamp format")
        }
        AuthVerdict::StaleTimestamp => {
            state.audit.stale_timestamp();
            detail(StatusCode::FORBIDDEN, "Invalid timestamp")
        }
        AuthVerdict::Accepted => {
            // Accepted implies the payload decoded (the timestamp came from it)
            let Some(request) = payload else {
                return detail(StatusCode::BAD_REQUEST, "Invalid JSON payload");
            };
            match state.runner.execute(&request).await {
                Ok(()) => {
                    state
                        .audit
                        .deployment_triggered(&request.container_name, &request.phase);
                    (
                        StatusCode::OK,
                        Json(json!({"message": "Deployment triggered"})),
                    )
                        .into_response()
                }
                Err(e) => {
                    error!("Error running deployment script: {}", e);
                    state.audit.dispatch_failed(&e.to_string());
                    detail(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Error running deployment script",
                    )
                }
            }
        }
    }
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/mgtapi", post(trigger_deployment))
        .with_state(state)
}

pub async fn serve(config: Config, port: u16) -> Result<()> {
    let store = Arc::new(VaultSecretStore::from_env()?);
    let runner = Arc::new(ScriptRunner::new(config.deploy_script.clone()));
    let state = Arc::new(AppState::new(&config, store, runner));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).into_future().await?;
    Ok(())
}
