//! Subscription lifecycle and VIP checks.
//!
//! Expiry has two paths that must agree: the lazy check performed on
//! access, and the bulk sweep the expiry sweeper runs on a schedule. Both
//! flip `active -> expired` at most once per row and publish one
//! `subscription_updated` event per transition.

use crate::entities::subscription::{GetSubscription, Subscription};
use crate::entities::{SubscriptionPlan, SubscriptionStatus};
use crate::events::EventBus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use yabot_sdk::events::{EventEnvelope, EventPayload};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub struct SubscriptionManager {
    pool: PgPool,
    bus: EventBus,
}

impl SubscriptionManager {
    pub fn new(pool: PgPool, bus: EventBus) -> Self {
        Self { pool, bus }
    }

    /// Upsert the user's subscription as active.
    pub async fn grant_subscription(
        &self,
        user_id: &str,
        plan: SubscriptionPlan,
        duration: Option<time::Duration>,
    ) -> Result<Subscription, SubscriptionError> {
        let end_date = duration.map(|d| time::OffsetDateTime::now_utc() + d);
        let subscription = Subscription::upsert_active(&self.pool, user_id, plan, end_date).await?;
        info!(user_id, ?plan, "Subscription granted");
        self.publish_update(&subscription).await;
        Ok(subscription)
    }

    /// Whether the user currently has VIP access, lazily expiring a
    /// past-due subscription on the way (no refund, no backdating).
    pub async fn check_vip_status(&self, user_id: &str) -> Result<bool, SubscriptionError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        let Some(subscription) = db
            .process(GetSubscription {
                user_id: user_id.to_owned(),
            })
            .await?
        else {
            return Ok(false);
        };

        let now = time::OffsetDateTime::now_utc();
        if subscription.is_past_due(now) {
            let flipped = Subscription::expire(&self.pool, subscription.subscription_id).await?;
            if flipped {
                info!(user_id, "Subscription lazily expired");
                let expired = Subscription {
                    status: SubscriptionStatus::Expired,
                    ..subscription
                };
                self.publish_update(&expired).await;
            }
            return Ok(false);
        }
        Ok(subscription.grants_vip(now))
    }

    /// Bulk sweep across all active subscriptions (the cron entry point).
    /// Publishes one update event per transition and returns the count.
    pub async fn process_expiration(&self) -> Result<u64, SubscriptionError> {
        let expired = Subscription::expire_due_bulk(&self.pool).await?;
        for subscription in &expired {
            self.publish_update(subscription).await;
        }
        Ok(expired.len() as u64)
    }

    async fn publish_update(&self, subscription: &Subscription) {
        self.bus
            .publish(EventEnvelope::new(EventPayload::SubscriptionUpdated {
                user_id: subscription.user_id.clone(),
                plan: subscription.plan.into(),
                status: subscription.status.into(),
            }))
            .await;
    }
}
