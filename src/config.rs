//! Process configuration read from `RUN_ROSTER_*` environment variables.
//!
//! Unset or unparseable values fall back to their defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::engine::{DEFAULT_ACTIVITY, EngineSettings, RetryConfig};

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `RUN_ROSTER_BIND_ADDR`.
    pub bind_addr: SocketAddr,

    /// `RUN_ROSTER_STATE_DIR`. Without it the store lives in memory only.
    pub state_dir: Option<PathBuf>,

    /// `RUN_ROSTER_ACTIVITY`. Label given to newly created runs.
    pub activity: String,

    /// `RUN_ROSTER_MAX_ATTEMPTS`. Attempts per conflicting join, leave, or delete.
    pub max_attempts: u32,

    /// `RUN_ROSTER_SEED_ITEMS`. Adds the starter items on startup when set to
    /// `1` or `true`.
    pub seed_items: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            state_dir: None,
            activity: DEFAULT_ACTIVITY.to_string(),
            max_attempts: RetryConfig::DEFAULT.max_attempts,
            seed_items: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Config {
            bind_addr: var("RUN_ROSTER_BIND_ADDR")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bind_addr),
            state_dir: var("RUN_ROSTER_STATE_DIR").map(PathBuf::from),
            activity: var("RUN_ROSTER_ACTIVITY").unwrap_or(defaults.activity),
            max_attempts: var("RUN_ROSTER_MAX_ATTEMPTS")
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
            seed_items: var("RUN_ROSTER_SEED_ITEMS")
                .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.seed_items),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            activity: self.activity.clone(),
            retry: RetryConfig::with_attempts(self.max_attempts),
        }
    }
}
