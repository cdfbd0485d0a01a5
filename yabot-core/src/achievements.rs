//! Achievement tracking and one-shot unlocks.
//!
//! Progress accumulates per `(user, achievement)`; the unlock fires exactly
//! once, guarded by the `completed` flag checked under a row lock before
//! any mutation. The unlock reward is credited in the same transaction
//! that flips the flag.

use crate::entities::TransactionKind;
use crate::entities::achievement::{GetUserAchievements, UserAchievement};
use crate::entities::ledger::BesitosTransaction;
use crate::events::EventBus;
use crate::framework::DatabaseProcessor;
use crate::wallet::{BesitosWallet, WalletError};
use kanau::processor::Processor;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use yabot_sdk::events::{EventEnvelope, EventPayload};

/// A built-in achievement definition.
#[derive(Debug, Clone, Copy)]
pub struct AchievementDef {
    pub achievement_id: &'static str,
    pub title: &'static str,
    pub target_value: i64,
    pub reward_besitos: i64,
}

/// The achievement catalog.
pub const ACHIEVEMENTS: &[AchievementDef] = &[
    AchievementDef {
        achievement_id: "first_besitos",
        title: "Primer besito",
        target_value: 1,
        reward_besitos: 5,
    },
    AchievementDef {
        achievement_id: "besitos_500",
        title: "Coleccionista de besitos",
        target_value: 500,
        reward_besitos: 50,
    },
    AchievementDef {
        achievement_id: "missions_10",
        title: "Cumplidora incansable",
        target_value: 10,
        reward_besitos: 100,
    },
];

/// Look up a catalog entry.
pub fn achievement_def(achievement_id: &str) -> Option<&'static AchievementDef> {
    ACHIEVEMENTS
        .iter()
        .find(|def| def.achievement_id == achievement_id)
}

#[derive(Debug, Error)]
pub enum AchievementError {
    #[error("unknown achievement {0}")]
    Unknown(String),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub struct AchievementSystem {
    pool: PgPool,
    bus: EventBus,
}

impl AchievementSystem {
    pub fn new(pool: PgPool, bus: EventBus) -> Self {
        Self { pool, bus }
    }

    /// Advance progress toward an achievement. Returns the progress row
    /// when this call unlocked it, `None` otherwise (including when it
    /// was already unlocked; completed rows are immutable).
    pub async fn track_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
        increment: i64,
    ) -> Result<Option<UserAchievement>, AchievementError> {
        let Some(def) = achievement_def(achievement_id) else {
            return Err(AchievementError::Unknown(achievement_id.to_owned()));
        };

        let mut tx = self.pool.begin().await?;
        let mut row =
            UserAchievement::lock_or_insert_tx(&mut tx, user_id, achievement_id, def.target_value)
                .await?;
        if row.completed {
            return Ok(None);
        }

        row.current_value += increment.max(0);
        let unlocked = row.current_value >= row.target_value;
        let reward = if unlocked {
            row.completed = true;
            row.unlocked_at = Some(time::OffsetDateTime::now_utc());
            if def.reward_besitos > 0 {
                Some(
                    BesitosWallet::credit_in_tx(
                        &mut tx,
                        user_id,
                        TransactionKind::Bonus,
                        def.reward_besitos,
                        def.title,
                        "achievement",
                        Some(achievement_id.to_owned()),
                    )
                    .await?,
                )
            } else {
                None
            }
        } else {
            None
        };
        row.save_progress_tx(&mut tx).await?;
        tx.commit().await?;

        if !unlocked {
            return Ok(None);
        }

        info!(user_id, achievement_id, "Achievement unlocked");
        self.publish_unlock(user_id, def, reward).await;
        Ok(Some(row))
    }

    /// Default-handler hook: a completed mission advances the mission
    /// counter achievement.
    pub async fn on_mission_completed(&self, user_id: &str) -> Result<(), AchievementError> {
        self.track_progress(user_id, "missions_10", 1).await?;
        Ok(())
    }

    /// Default-handler hook: credited besitos advance the collector
    /// achievements.
    pub async fn on_besitos_collected(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<(), AchievementError> {
        self.track_progress(user_id, "first_besitos", amount).await?;
        self.track_progress(user_id, "besitos_500", amount).await?;
        Ok(())
    }

    /// All progress rows for one user.
    pub async fn get_achievements(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserAchievement>, AchievementError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        Ok(db
            .process(GetUserAchievements {
                user_id: user_id.to_owned(),
            })
            .await?)
    }

    async fn publish_unlock(
        &self,
        user_id: &str,
        def: &AchievementDef,
        reward: Option<BesitosTransaction>,
    ) {
        if let Some(entry) = reward {
            self.bus
                .publish(EventEnvelope::new(EventPayload::BesitosAwarded {
                    user_id: entry.user_id.clone(),
                    amount: entry.amount,
                    balance_after: entry.balance_after,
                    kind: entry.kind.into(),
                    reason: entry.reason.clone(),
                    source: entry.source.clone(),
                }))
                .await;
        }
        self.bus
            .publish(EventEnvelope::new(EventPayload::BadgeUnlocked {
                user_id: user_id.to_owned(),
                achievement_id: def.achievement_id.to_owned(),
                reward_besitos: def.reward_besitos,
            }))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique() {
        for (index, def) in ACHIEVEMENTS.iter().enumerate() {
            assert!(
                ACHIEVEMENTS
                    .iter()
                    .skip(index + 1)
                    .all(|other| other.achievement_id != def.achievement_id)
            );
        }
    }

    #[test]
    fn lookup_finds_known_achievements() {
        assert!(achievement_def("besitos_500").is_some());
        assert!(achievement_def("nope").is_none());
    }
}
