use tracing::{error, info, warn};

/// Structured security events under `target: "audit"`. Never includes the
/// secret, the computed digest, or the received token.
#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn replay_detected(&self) {
        warn!(target: "audit", event = "replay_detected");
    }

    pub fn signature_invalid(&self) {
        warn!(target: "audit", event = "signature_invalid");
    }

    pub fn malformed_payload(&self) {
        warn!(target: "audit", event = "malformed_payload");
    }

    pub fn stale_timestamp(&self) {
        warn!(target: "audit", event = "stale_timestamp");
    }

    pub fn secret_unavailable(&self) {
        error!(target: "audit", event = "secret_unavailable");
    }

    pub fn deployment_triggered(&self, container: &str, phase: &str) {
        info!(target: "audit", event = "deployment_triggered", container, phase);
    }

    pub fn dispatch_failed(&self, error_msg: &str) {
        error!(target: "audit", event = "dispatch_failed", error = error_msg);
    }
}
