use chrono::{DateTime, Utc};
use tracing::error;

use crate::security::freshness::{self, TimestampError};
use crate::security::replay::ReplayLedger;
use crate::security::secret::SecretProvider;
use crate::security::signature;

/// Outcome of the authentication pipeline for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVerdict {
    Accepted,
    ReplayedSignature,
    InvalidSignature,
    MalformedPayload,
    MalformedTimestamp,
    StaleTimestamp,
    SecretUnavailable,
}

/// Runs the checks in a fixed order: replay, signature, payload shape,
/// timestamp freshness.
///
/// The ledger records the token before the HMAC is validated. A token
/// that repeats is therefore reported as a replay even when it was never
/// cryptographically valid, and an invalid-but-well-formed signature
/// consumes a ledger slot. Both are deliberate: the duplicate path stays
/// cheap, and the ledger is bounded so the slot cannot be exhausted.
#[derive(Clone)]
pub struct RequestAuthenticator {
    secrets: SecretProvider,
    ledger: ReplayLedger,
    tolerance_secs: i64,
}

impl RequestAuthenticator {
    pub fn new(secrets: SecretProvider, ledger: ReplayLedger, tolerance_secs: i64) -> Self {
        Self {
            secrets,
            ledger,
            tolerance_secs,
        }
    }

    /// `timestamp_field` is `None` when the request payload failed to
    /// decode; the payload error is still reported only after the replay
    /// and signature checks pass, so an unauthenticated caller learns
    /// nothing about how we parse bodies.
    pub async fn authenticate(
        &self,
        raw_body: &[u8],
        signature_header: &str,
        timestamp_field: Option<&str>,
        now: DateTime<Utc>,
    ) -> AuthVerdict {
        if !self.ledger.check_and_record(signature_header).await {
            return AuthVerdict::ReplayedSignature;
        }

        let secret = match self.secrets.get_secret().await {
            Ok(secret) => secret,
            Err(e) => {
                error!("Error retrieving secret: {}", e);
                return AuthVerdict::SecretUnavailable;
            }
        };

        if !signature::verify(&secret, raw_body, signature_header) {
            return AuthVerdict::InvalidSignature;
        }

        let Some(timestamp) = timestamp_field else {
            return AuthVerdict::MalformedPayload;
        };

        match freshness::check(timestamp, now, self.tolerance_secs) {
            Ok(()) => AuthVerdict::Accepted,
            Err(TimestampError::Malformed) => AuthVerdict::MalformedTimestamp,
            Err(TimestampError::OutOfWindow) => AuthVerdict::StaleTimestamp,
        }
    }
}
