//! Scheduler configuration, loadable from environment or file.
//!
//! A flat `serde`-derived struct with a `default_*` function per field so
//! partial JSON/env input fills in the rest.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// IANA zone name triggers are authored and reported in.
    #[serde(default = "default_zone")]
    pub zone: String,
    /// Worker pool width for live-mode dispatch. `None` resolves to
    /// `max(1, cores - 2)` at `Scheduler` construction time.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Default `RetryPolicy::tries` for jobs that don't set their own.
    #[serde(default = "default_retry_tries")]
    pub default_retry_tries: u32,
    /// Default `RetryPolicy::delay_secs`.
    #[serde(default = "default_retry_delay_secs")]
    pub default_retry_delay_secs: u64,
    /// Ceiling on any single retry wait, regardless of backoff growth.
    #[serde(default = "default_retry_max_delay_secs")]
    pub default_retry_max_delay_secs: u64,
}

fn default_zone() -> String {
    "UTC".to_string()
}

fn default_retry_tries() -> u32 {
    0
}

fn default_retry_delay_secs() -> u64 {
    1
}

fn default_retry_max_delay_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            zone: default_zone(),
            workers: None,
            default_retry_tries: default_retry_tries(),
            default_retry_delay_secs: default_retry_delay_secs(),
            default_retry_max_delay_secs: default_retry_max_delay_secs(),
        }
    }
}

impl SchedulerConfig {
    /// Parses a config from a JSON string, filling unspecified fields with
    /// their defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
