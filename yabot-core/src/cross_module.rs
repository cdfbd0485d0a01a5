//! Cross-module façade for compound flows.
//!
//! Sequences the wallet, missions and events for operations that span
//! modules: the daily gift, reaction processing, narrative choices. Every
//! collaborator is an explicit constructor parameter, so a missing
//! dependency is a construction-time error, not a runtime check.
//!
//! The synchronous part of each flow is the wallet mutation; the
//! gamification follow-ups (mission progress, achievements, narrative
//! unlocks) ride on the published trigger event and run asynchronously in
//! the event processor. A failure there is invisible to the original
//! caller and lands in the dead-letter queue.

use crate::config::{ConfigStore, EconomyConfig};
use crate::entities::ledger::BesitosTransaction;
use crate::entities::user_profile::UserProfile;
use crate::events::EventBus;
use crate::missions::MissionManager;
use crate::wallet::{BesitosWallet, WalletError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use yabot_sdk::events::{EventEnvelope, EventPayload};

/// Minimum time between daily-gift claims.
pub const DAILY_GIFT_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CrossModuleError {
    #[error("daily gift already claimed within the cooldown window")]
    CooldownActive,

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub struct CrossModuleService {
    pool: PgPool,
    bus: EventBus,
    wallet: Arc<BesitosWallet>,
    missions: Arc<MissionManager>,
    economy: ConfigStore<EconomyConfig>,
}

impl CrossModuleService {
    pub fn new(
        pool: PgPool,
        bus: EventBus,
        wallet: Arc<BesitosWallet>,
        missions: Arc<MissionManager>,
        economy: ConfigStore<EconomyConfig>,
    ) -> Self {
        Self {
            pool,
            bus,
            wallet,
            missions,
            economy,
        }
    }

    /// Claim the daily gift. The cooldown slot is taken with a conditional
    /// update before any money moves, so concurrent claims cannot
    /// double-pay.
    pub async fn claim_daily_gift(
        &self,
        user_id: &str,
    ) -> Result<BesitosTransaction, CrossModuleError> {
        let claimed =
            UserProfile::try_claim_daily_gift(&self.pool, user_id, DAILY_GIFT_COOLDOWN).await?;
        if !claimed {
            return Err(CrossModuleError::CooldownActive);
        }

        let amount = self.economy.snapshot().await.daily_gift_amount;
        let entry = self
            .wallet
            .add_besitos(user_id, amount, "daily_gift", "daily_gift", None)
            .await?;

        info!(user_id, amount, "Daily gift claimed");
        self.bus
            .publish(EventEnvelope::new(EventPayload::DailyGiftClaimed {
                user_id: user_id.to_owned(),
                amount,
            }))
            .await;
        Ok(entry)
    }

    /// The reaction workflow entry point: award the reaction bonus, then
    /// let the trigger event drive mission and achievement progress.
    pub async fn process_reaction(
        &self,
        user_id: &str,
        message_id: &str,
    ) -> Result<BesitosTransaction, CrossModuleError> {
        let bonus = self.economy.snapshot().await.reaction_bonus;
        let entry = self
            .wallet
            .add_besitos(user_id, bonus, "reaction", "reaction", Some(message_id.to_owned()))
            .await?;

        self.bus
            .publish(EventEnvelope::new(EventPayload::ReactionDetected {
                user_id: user_id.to_owned(),
                message_id: message_id.to_owned(),
            }))
            .await;
        Ok(entry)
    }

    /// Record a narrative choice. The decision event advances decision
    /// objectives asynchronously; this call returns as soon as the event
    /// is published.
    pub async fn process_narrative_choice(
        &self,
        user_id: &str,
        choice_id: &str,
    ) -> Result<(), CrossModuleError> {
        info!(user_id, choice_id, "Narrative choice recorded");
        self.bus
            .publish(EventEnvelope::new(EventPayload::DecisionMade {
                user_id: user_id.to_owned(),
                choice_id: choice_id.to_owned(),
            }))
            .await;
        Ok(())
    }

    /// Direct access to the mission manager for callers that need the
    /// synchronous result of an assignment.
    pub fn missions(&self) -> &MissionManager {
        &self.missions
    }
}
