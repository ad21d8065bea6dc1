use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

/// Decoded webhook payload. Every field is an opaque string to this
/// service; the phase scripts give them meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub debug_mode: String,
    pub repo_url: String,
    pub repo_mgt_dir: String,
    pub phase: String,
    pub phase_script: String,
    pub container_name: String,
    pub timestamp: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn deployment script: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("deployment script exited with status {0:?}")]
    Failed(Option<i32>),
}

/// Capability boundary for the external execution agent; substituted with
/// a fake in tests.
#[async_trait]
pub trait DeployRunner: Send + Sync {
    async fn execute(&self, request: &DeploymentRequest) -> Result<(), DispatchError>;
}

/// Runs the deployment script as a child process and waits for it to
/// finish. The request is held open for the duration.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    shell: String,
    script: String,
}

impl ScriptRunner {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            shell: "/bin/bash".to_string(),
            script: script.into(),
        }
    }
}

#[async_trait]
impl DeployRunner for ScriptRunner {
    async fn execute(&self, request: &DeploymentRequest) -> Result<(), DispatchError> {
        info!(
            "Running {} for container {} (phase {})",
            self.script, request.container_name, request.phase
        );

        // Positional contract shared with the phase scripts; order matters
        let status = Command::new(&self.shell)
            .arg(&self.script)
            .arg(&request.container_name)
            .arg(&request.repo_url)
            .arg(&request.repo_mgt_dir)
            .arg(&request.phase)
            .arg(&request.phase_script)
            .arg(&request.debug_mode)
            .status()
            .await?;

        if !status.success() {
            error!("deployment script failed with status {:?}", status.code());
            return Err(DispatchError::Failed(status.code()));
        }
        Ok(())
    }
}
