//! Expiry sweeper tuning.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often the expiry sweeper reconciles missions and subscriptions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between sweep passes.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}
