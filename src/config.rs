use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

fn default_tolerance_secs() -> i64 {
    45
}

fn default_replay_capacity() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Deployment script invoked with the validated payload fields.
    pub deploy_script: String,
    /// Freshness window for the payload timestamp, seconds either way.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: i64,
    /// How many accepted signatures the replay ledger keeps.
    #[serde(default = "default_replay_capacity")]
    pub replay_capacity: usize,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        serde_json::from_str(&raw).context("parsing config JSON")
    }
}
