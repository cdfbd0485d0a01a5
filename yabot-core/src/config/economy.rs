//! Economy tuning knobs.

use serde::{Deserialize, Serialize};

/// Amounts paid out by the compound flows. Held behind a [`ConfigStore`]
/// in the server so a SIGHUP reload takes effect without a restart.
///
/// [`ConfigStore`]: super::ConfigStore
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Besitos granted by a daily-gift claim.
    #[serde(default = "default_daily_gift_amount")]
    pub daily_gift_amount: i64,
    /// Besitos granted per detected reaction.
    #[serde(default = "default_reaction_bonus")]
    pub reaction_bonus: i64,
    /// Completed daily missions required before the story mission unlocks.
    #[serde(default = "default_story_mission_threshold")]
    pub story_mission_threshold: i64,
}

fn default_daily_gift_amount() -> i64 {
    10
}

fn default_reaction_bonus() -> i64 {
    5
}

fn default_story_mission_threshold() -> i64 {
    3
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            daily_gift_amount: default_daily_gift_amount(),
            reaction_bonus: default_reaction_bonus(),
            story_mission_threshold: default_story_mission_threshold(),
        }
    }
}
