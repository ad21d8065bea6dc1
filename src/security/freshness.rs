use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Wire format produced by `date -u +"%Y-%m-%dT%H:%M:%SZ"`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp does not match %Y-%m-%dT%H:%M:%SZ")]
    Malformed,
    #[error("timestamp outside the freshness window")]
    OutOfWindow,
}

/// Check that a payload timestamp is within `tolerance_secs` of `now`,
/// in either direction (the sender's clock may run ahead of ours).
/// The boundary value itself passes: with a 45 s tolerance, a timestamp
/// 45 s old is accepted and one 46 s old is rejected.
pub fn check(
    timestamp: &str,
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> Result<(), TimestampError> {
    let parsed = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .map_err(|_| TimestampError::Malformed)?
        .and_utc();

    if (now - parsed).num_seconds().abs() > tolerance_secs {
        return Err(TimestampError::OutOfWindow);
    }
    Ok(())
}
