//! Watcher tuning knobs

use crate::error::{Result, WatchError};
use crate::ignore::IgnoreConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default write-stability window
pub const DEFAULT_STABILITY_THRESHOLD_MS: u64 = 1000;
/// Default size re-poll interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 150;

/// Configuration for every normalizer spawned by a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// A file is reported once its size has not changed for this long
    #[serde(default = "default_stability_threshold_ms")]
    pub stability_threshold_ms: u64,

    /// How often pending writes are re-polled (also the poll-watcher interval)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Use the polling backend instead of native notifications
    #[serde(default)]
    pub use_polling: bool,

    #[serde(default)]
    pub ignore: IgnoreConfig,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stability_threshold_ms: DEFAULT_STABILITY_THRESHOLD_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            use_polling: false,
            ignore: IgnoreConfig::default(),
        }
    }
}

impl WatcherConfig {
    pub fn stability_threshold(&self) -> Duration {
        Duration::from_millis(self.stability_threshold_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Default lifetime of a suppression entry: one stability window plus
    /// two poll rounds
    pub fn suppression_window(&self) -> Duration {
        self.stability_threshold() + self.poll_interval() * 2
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(50..=60_000).contains(&self.stability_threshold_ms) {
            return Err(WatchError::Config(format!(
                "stability_threshold_ms must be between 50 and 60000 (got {})",
                self.stability_threshold_ms
            )));
        }
        if !(10..=10_000).contains(&self.poll_interval_ms) {
            return Err(WatchError::Config(format!(
                "poll_interval_ms must be between 10 and 10000 (got {})",
                self.poll_interval_ms
            )));
        }
        if self.poll_interval_ms >= self.stability_threshold_ms {
            return Err(WatchError::Config(format!(
                "poll_interval_ms ({}) must be smaller than stability_threshold_ms ({})",
                self.poll_interval_ms, self.stability_threshold_ms
            )));
        }
        Ok(())
    }
}

fn default_stability_threshold_ms() -> u64 {
    DEFAULT_STABILITY_THRESHOLD_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
