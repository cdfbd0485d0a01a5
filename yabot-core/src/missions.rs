//! Template-driven mission lifecycle.
//!
//! Missions are instantiated per user from a built-in template table keyed
//! by kind. Progress flows in through two paths: explicit
//! [`MissionManager::update_progress`] calls and the event-driven
//! [`MissionManager::handle_interaction`] path driven by the processor's
//! default handlers (reactions, decisions, interactions, gift claims).
//!
//! Reward distribution happens inside the same database transaction that
//! flips the mission to `completed`, so a mission can never pay twice.

use crate::config::{ConfigStore, EconomyConfig};
use crate::entities::mission::{
    CountCompletedMissions, FindActiveMission, ListActiveMissions, Mission, Objective,
    ObjectiveTrigger, ProgressOutcome,
};
use crate::entities::inventory::InventoryItem;
use crate::entities::ledger::BesitosTransaction;
use crate::entities::{MissionKind, MissionStatus, TransactionKind};
use crate::events::EventBus;
use crate::framework::DatabaseProcessor;
use crate::wallet::{BesitosWallet, WalletError};
use kanau::processor::Processor;
use sqlx::PgPool;
use sqlx::types::Json;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use yabot_sdk::events::{EventEnvelope, EventPayload};

/// Errors surfaced by mission operations.
#[derive(Debug, Error)]
pub enum MissionError {
    #[error("mission {0} not found")]
    NotFound(Uuid),

    #[error("mission {0} is already completed")]
    AlreadyCompleted(Uuid),

    #[error("objective {objective_id} not found on mission {mission_id}")]
    ObjectiveNotFound {
        mission_id: Uuid,
        objective_id: String,
    },

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Blueprint a mission is instantiated from.
#[derive(Debug, Clone)]
pub struct MissionTemplate {
    pub title: String,
    pub objectives: Vec<ObjectiveTemplate>,
    pub reward_besitos: i64,
    pub reward_items: Vec<String>,
    /// How long the instantiated mission lives; `None` never expires.
    pub lifetime: Option<time::Duration>,
}

#[derive(Debug, Clone)]
pub struct ObjectiveTemplate {
    pub objective_id: String,
    pub description: String,
    pub trigger: ObjectiveTrigger,
    pub target_value: i64,
}

impl MissionTemplate {
    fn objective(id: &str, description: &str, trigger: ObjectiveTrigger, target: i64) -> ObjectiveTemplate {
        ObjectiveTemplate {
            objective_id: id.to_owned(),
            description: description.to_owned(),
            trigger,
            target_value: target,
        }
    }

    /// The built-in template for a mission kind.
    pub fn builtin(kind: MissionKind) -> MissionTemplate {
        match kind {
            MissionKind::Daily => MissionTemplate {
                title: "Check-in diario".to_owned(),
                objectives: vec![
                    Self::objective("claim_gift", "Reclama tu regalo diario", ObjectiveTrigger::DailyClaim, 1),
                    Self::objective("react_3", "Reacciona a 3 mensajes", ObjectiveTrigger::Reaction, 3),
                ],
                reward_besitos: 25,
                reward_items: vec![],
                lifetime: Some(time::Duration::days(1)),
            },
            MissionKind::Weekly => MissionTemplate {
                title: "Semana activa".to_owned(),
                objectives: vec![
                    Self::objective("react_10", "Reacciona a 10 mensajes", ObjectiveTrigger::Reaction, 10),
                    Self::objective("decide_3", "Toma 3 decisiones en la historia", ObjectiveTrigger::Decision, 3),
                ],
                reward_besitos: 100,
                reward_items: vec!["sticker_semanal".to_owned()],
                lifetime: Some(time::Duration::days(7)),
            },
            MissionKind::Story => MissionTemplate {
                title: "El siguiente capítulo".to_owned(),
                objectives: vec![Self::objective(
                    "decide_5",
                    "Avanza la historia con 5 decisiones",
                    ObjectiveTrigger::Decision,
                    5,
                )],
                reward_besitos: 150,
                reward_items: vec!["llave_capitulo".to_owned()],
                lifetime: None,
            },
            MissionKind::Special => MissionTemplate {
                title: "Evento especial".to_owned(),
                objectives: vec![Self::objective(
                    "interact_10",
                    "Participa 10 veces en el canal",
                    ObjectiveTrigger::Interaction,
                    10,
                )],
                reward_besitos: 75,
                reward_items: vec![],
                lifetime: Some(time::Duration::days(3)),
            },
            MissionKind::Achievement => MissionTemplate {
                title: "Camino a la insignia".to_owned(),
                objectives: vec![Self::objective(
                    "interact_25",
                    "Acumula 25 interacciones",
                    ObjectiveTrigger::Interaction,
                    25,
                )],
                reward_besitos: 200,
                reward_items: vec![],
                lifetime: None,
            },
        }
    }

    /// Instantiate a mission for a user.
    pub fn instantiate(&self, user_id: &str, kind: MissionKind) -> Mission {
        let now = time::OffsetDateTime::now_utc();
        Mission {
            mission_id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            kind,
            status: MissionStatus::Available,
            title: self.title.clone(),
            objectives: Json(
                self.objectives
                    .iter()
                    .map(|template| Objective {
                        objective_id: template.objective_id.clone(),
                        description: template.description.clone(),
                        trigger: template.trigger,
                        target_value: template.target_value,
                        current_value: 0,
                        completed: false,
                    })
                    .collect(),
            ),
            reward_besitos: self.reward_besitos,
            reward_items: Json(self.reward_items.clone()),
            expires_at: self.lifetime.map(|lifetime| now + lifetime),
            created_at: now,
            updated_at: now,
        }
    }
}

/// The mission manager service.
pub struct MissionManager {
    pool: PgPool,
    bus: EventBus,
    economy: ConfigStore<EconomyConfig>,
}

impl MissionManager {
    pub fn new(pool: PgPool, bus: EventBus, economy: ConfigStore<EconomyConfig>) -> Self {
        Self { pool, bus, economy }
    }

    /// Return the user's existing active mission of `kind`, or instantiate
    /// one from the template table. At most one active mission per
    /// (user, kind) exists at any time.
    pub async fn assign_mission(
        &self,
        user_id: &str,
        kind: MissionKind,
        template: Option<MissionTemplate>,
    ) -> Result<Mission, MissionError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        if let Some(existing) = db
            .process(FindActiveMission {
                user_id: user_id.to_owned(),
                kind,
            })
            .await?
        {
            return Ok(existing);
        }

        let template = template.unwrap_or_else(|| MissionTemplate::builtin(kind));
        let mission = template.instantiate(user_id, kind);
        mission.insert(&self.pool).await?;
        info!(user_id, mission_id = %mission.mission_id, ?kind, "Mission assigned");

        self.bus
            .publish(EventEnvelope::new(EventPayload::MissionAssigned {
                user_id: user_id.to_owned(),
                mission_id: mission.mission_id,
                kind: kind.into(),
            }))
            .await;
        Ok(mission)
    }

    /// Increment one named objective. Completing the last objective
    /// transitions the mission, distributes rewards and publishes
    /// `mission_completed`.
    pub async fn update_progress(
        &self,
        user_id: &str,
        mission_id: Uuid,
        objective_id: &str,
        increment: i64,
    ) -> Result<ProgressOutcome, MissionError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut mission) = Mission::lock_tx(&mut tx, user_id, mission_id).await? else {
            return Err(MissionError::NotFound(mission_id));
        };
        if matches!(mission.status, MissionStatus::Completed | MissionStatus::Expired) {
            return Err(MissionError::NotFound(mission_id));
        }

        let outcome = mission.apply_increment(objective_id, increment);
        if outcome == ProgressOutcome::ObjectiveNotFound {
            return Err(MissionError::ObjectiveNotFound {
                mission_id,
                objective_id: objective_id.to_owned(),
            });
        }

        mission.save_progress_tx(&mut tx).await?;
        let reward = if outcome == ProgressOutcome::MissionCompleted {
            Some(Self::distribute_rewards_tx(&mut tx, &mission).await?)
        } else {
            None
        };
        tx.commit().await?;

        if let Some(reward) = reward {
            self.publish_completion(&mission, reward).await;
        }
        Ok(outcome)
    }

    /// Force-complete every objective and distribute rewards.
    pub async fn complete_mission(
        &self,
        user_id: &str,
        mission_id: Uuid,
    ) -> Result<Mission, MissionError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut mission) = Mission::lock_tx(&mut tx, user_id, mission_id).await? else {
            return Err(MissionError::NotFound(mission_id));
        };
        if mission.status == MissionStatus::Completed {
            return Err(MissionError::AlreadyCompleted(mission_id));
        }

        mission.force_complete();
        mission.save_progress_tx(&mut tx).await?;
        let reward = Self::distribute_rewards_tx(&mut tx, &mission).await?;
        tx.commit().await?;

        self.publish_completion(&mission, reward).await;
        Ok(mission)
    }

    /// Bulk-expire overdue missions. Returns the count affected.
    pub async fn expire_missions(&self) -> Result<u64, MissionError> {
        Ok(Mission::expire_due(&self.pool).await?)
    }

    /// Event-driven progress: advance every active mission objective
    /// matching `trigger`, assigning a daily mission first when the user
    /// has none, and the follow-on story mission after enough completed
    /// dailies.
    pub async fn handle_interaction(
        &self,
        user_id: &str,
        trigger: ObjectiveTrigger,
    ) -> Result<(), MissionError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        let mut active = db
            .process(ListActiveMissions {
                user_id: user_id.to_owned(),
            })
            .await?;
        if active.is_empty() {
            let assigned = self.assign_mission(user_id, MissionKind::Daily, None).await?;
            active = vec![assigned];
        }

        let mut completed_any = false;
        for mission in active {
            let mut tx = self.pool.begin().await?;
            // Re-fetch under the row lock; the listing read was unlocked.
            let Some(mut locked) = Mission::lock_tx(&mut tx, user_id, mission.mission_id).await?
            else {
                continue;
            };
            if matches!(locked.status, MissionStatus::Completed | MissionStatus::Expired) {
                continue;
            }
            let (advanced, completed) = locked.apply_trigger(trigger);
            if !advanced {
                continue;
            }
            locked.save_progress_tx(&mut tx).await?;
            let reward = if completed {
                Some(Self::distribute_rewards_tx(&mut tx, &locked).await?)
            } else {
                None
            };
            tx.commit().await?;
            if let Some(reward) = reward {
                completed_any = true;
                self.publish_completion(&locked, reward).await;
            }
        }

        if completed_any {
            self.maybe_assign_story_mission(user_id).await?;
        }
        Ok(())
    }

    /// Assign the story mission once enough daily missions are done.
    async fn maybe_assign_story_mission(&self, user_id: &str) -> Result<(), MissionError> {
        let threshold = self.economy.snapshot().await.story_mission_threshold;
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        let completed_dailies = db
            .process(CountCompletedMissions {
                user_id: user_id.to_owned(),
                kind: MissionKind::Daily,
            })
            .await?;
        if completed_dailies >= threshold {
            self.assign_mission(user_id, MissionKind::Story, None).await?;
        }
        Ok(())
    }

    /// Pay the besitos reward and grant reward items inside the completion
    /// transaction.
    async fn distribute_rewards_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        mission: &Mission,
    ) -> Result<Option<BesitosTransaction>, MissionError> {
        for item_id in &mission.reward_items.0 {
            InventoryItem::grant_tx(tx, &mission.user_id, item_id, 1).await?;
        }
        if mission.reward_besitos <= 0 {
            return Ok(None);
        }
        let entry = BesitosWallet::credit_in_tx(
            tx,
            &mission.user_id,
            TransactionKind::Awarded,
            mission.reward_besitos,
            "mission_reward",
            "mission",
            Some(mission.mission_id.to_string()),
        )
        .await?;
        Ok(Some(entry))
    }

    async fn publish_completion(&self, mission: &Mission, reward: Option<BesitosTransaction>) {
        info!(
            user_id = %mission.user_id,
            mission_id = %mission.mission_id,
            reward_besitos = mission.reward_besitos,
            "Mission completed"
        );
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
        for item_id in &mission.reward_items.0 {
            self.bus
                .publish(EventEnvelope::new(EventPayload::ItemAwarded {
                    user_id: mission.user_id.clone(),
                    item_id: item_id.clone(),
                    quantity: 1,
                }))
                .await;
        }
        self.bus
            .publish(EventEnvelope::new(EventPayload::MissionCompleted {
                user_id: mission.user_id.clone(),
                mission_id: mission.mission_id,
                kind: mission.kind.into(),
                reward_besitos: mission.reward_besitos,
            }))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_builtin_template() {
        for kind in [
            MissionKind::Daily,
            MissionKind::Weekly,
            MissionKind::Story,
            MissionKind::Special,
            MissionKind::Achievement,
        ] {
            let template = MissionTemplate::builtin(kind);
            assert!(!template.objectives.is_empty());
            assert!(template.reward_besitos > 0);
            assert!(
                template
                    .objectives
                    .iter()
                    .all(|objective| objective.target_value > 0)
            );
        }
    }

    #[test]
    fn instantiated_mission_starts_available_with_zero_progress() {
        let template = MissionTemplate::builtin(MissionKind::Daily);
        let mission = template.instantiate("u-1", MissionKind::Daily);
        assert_eq!(mission.status, MissionStatus::Available);
        assert!(mission.objectives.0.iter().all(|o| o.current_value == 0));
        assert!(mission.expires_at.is_some());
    }

    #[test]
    fn story_template_never_expires() {
        let template = MissionTemplate::builtin(MissionKind::Story);
        let mission = template.instantiate("u-1", MissionKind::Story);
        assert!(mission.expires_at.is_none());
    }
}
