//! The besitos store: catalog purchases and inventory reads.
//!
//! A purchase is one transaction: the wallet debit and the inventory grant
//! commit together, so a paid-but-ungranted (or granted-but-unpaid) state
//! cannot exist. Mission rewards and auction settlement grant items the
//! same way, through `InventoryItem::grant_tx` inside their own
//! transactions.

use crate::entities::inventory::{GetInventory, GetStoreItem, InventoryItem, StoreItem};
use crate::events::EventBus;
use crate::framework::DatabaseProcessor;
use crate::wallet::{BesitosWallet, WalletError};
use kanau::processor::Processor;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use yabot_sdk::events::{EventEnvelope, EventPayload};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store item {0} not found")]
    ItemNotFound(String),

    #[error("store item {0} is disabled")]
    ItemDisabled(String),

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub struct StoreService {
    pool: PgPool,
    bus: EventBus,
}

impl StoreService {
    pub fn new(pool: PgPool, bus: EventBus) -> Self {
        Self { pool, bus }
    }

    /// Buy `quantity` of a catalog item. Insufficient funds surface the
    /// wallet error untouched; nothing is granted in that case.
    pub async fn purchase(
        &self,
        user_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> Result<StoreItem, StoreError> {
        if quantity <= 0 {
            return Err(StoreError::InvalidQuantity(quantity));
        }
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        let Some(item) = db
            .process(GetStoreItem {
                item_id: item_id.to_owned(),
            })
            .await?
        else {
            return Err(StoreError::ItemNotFound(item_id.to_owned()));
        };
        if !item.enabled {
            return Err(StoreError::ItemDisabled(item_id.to_owned()));
        }

        let price = item.price_besitos * quantity;
        let mut tx = self.pool.begin().await?;
        let entry = BesitosWallet::spend_in_tx(
            &mut tx,
            user_id,
            price,
            "store_purchase",
            "store",
            Some(item_id.to_owned()),
        )
        .await?;
        InventoryItem::grant_tx(&mut tx, user_id, item_id, quantity).await?;
        tx.commit().await?;

        info!(user_id, item_id, quantity, price, "Store purchase completed");
        self.bus
            .publish(EventEnvelope::new(EventPayload::BesitosSpent {
                user_id: user_id.to_owned(),
                amount: price,
                balance_after: entry.balance_after,
                reason: "store_purchase".to_owned(),
                item_id: Some(item_id.to_owned()),
            }))
            .await;
        self.bus
            .publish(EventEnvelope::new(EventPayload::ItemAwarded {
                user_id: user_id.to_owned(),
                item_id: item_id.to_owned(),
                quantity,
            }))
            .await;
        Ok(item)
    }

    /// A user's inventory, newest acquisitions first.
    pub async fn get_inventory(&self, user_id: &str) -> Result<Vec<InventoryItem>, StoreError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        Ok(db
            .process(GetInventory {
                user_id: user_id.to_owned(),
            })
            .await?)
    }
}
