//! The besitos wallet: sole authority for balance changes.
//!
//! Every mutation is one database transaction spanning the row-locked
//! balance read, the ledger insert and the balance write, so the ledger can
//! never show a partial state. Event publication happens after commit and
//! is best-effort: a delivery problem is logged and swallowed, never rolled
//! back into an already-committed financial mutation.
//!
//! The `*_in_tx` associated functions expose the same discipline inside a
//! caller-owned transaction, so compound operations (an auction debiting
//! the new bidder and refunding the outbid leader) commit atomically.

use crate::entities::TransactionKind;
use crate::entities::ledger::{BesitosTransaction, GetTransactionHistory, LedgerInsert};
use crate::entities::user_profile::{GetBalance, GetProfile, UserProfile};
use crate::events::EventBus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use yabot_sdk::events::{EventEnvelope, EventPayload};

/// Errors surfaced by wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The amount must be strictly positive.
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    /// The spend would drive the balance negative. No mutation occurred.
    #[error("insufficient besitos: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },

    /// The storage transaction failed and was rolled back entirely.
    #[error("wallet transaction failed: {0}")]
    Storage(#[from] sqlx::Error),
}

/// The wallet service. Cheap to clone; shared across managers.
#[derive(Clone)]
pub struct BesitosWallet {
    pool: PgPool,
    bus: EventBus,
}

impl BesitosWallet {
    pub fn new(pool: PgPool, bus: EventBus) -> Self {
        Self { pool, bus }
    }

    /// Credit `amount` besitos, creating the profile at balance 0 when
    /// absent. Returns the committed ledger entry.
    pub async fn add_besitos(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
        source: &str,
        reference_id: Option<String>,
    ) -> Result<BesitosTransaction, WalletError> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let mut tx = self.pool.begin().await?;
        let entry = Self::credit_in_tx(
            &mut tx,
            user_id,
            TransactionKind::Awarded,
            amount,
            reason,
            source,
            reference_id,
        )
        .await?;
        tx.commit().await?;

        info!(
            user_id,
            amount,
            balance_after = entry.balance_after,
            reason,
            "Besitos awarded"
        );
        self.publish_credit(&entry).await;
        Ok(entry)
    }

    /// Debit `amount` besitos. Fails with [`WalletError::InsufficientFunds`]
    /// before any mutation when the balance cannot cover it.
    pub async fn spend_besitos(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
        item_id: Option<String>,
        reference_id: Option<String>,
    ) -> Result<BesitosTransaction, WalletError> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let mut tx = self.pool.begin().await?;
        let entry =
            Self::spend_in_tx(&mut tx, user_id, amount, reason, "wallet", reference_id).await?;
        tx.commit().await?;

        info!(
            user_id,
            amount,
            balance_after = entry.balance_after,
            reason,
            "Besitos spent"
        );
        self.publish_spend(&entry, item_id).await;
        Ok(entry)
    }

    /// Current balance. Unknown users read as 0, never as an error.
    pub async fn get_balance(&self, user_id: &str) -> Result<i64, WalletError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        Ok(db
            .process(GetBalance {
                user_id: user_id.to_owned(),
            })
            .await?)
    }

    /// Full profile row (balance, daily-gift timestamp). `None` for users
    /// the wallet has never seen.
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, WalletError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        Ok(db
            .process(GetProfile {
                user_id: user_id.to_owned(),
            })
            .await?)
    }

    /// Ledger history, newest first.
    pub async fn get_transaction_history(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<BesitosTransaction>, WalletError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        Ok(db
            .process(GetTransactionHistory {
                user_id: user_id.to_owned(),
                limit,
            })
            .await?)
    }

    // -- Transaction-scoped composition --------------------------------

    /// Credit inside a caller-owned transaction. The caller commits and
    /// publishes the corresponding event afterwards.
    pub async fn credit_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: &str,
        kind: TransactionKind,
        amount: i64,
        reason: &str,
        source: &str,
        reference_id: Option<String>,
    ) -> Result<BesitosTransaction, WalletError> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let balance_before = UserProfile::lock_balance_tx(tx, user_id).await?;
        let entry = BesitosTransaction::insert_tx(
            tx,
            &LedgerInsert {
                user_id: user_id.to_owned(),
                kind,
                amount,
                balance_before,
                reason: reason.to_owned(),
                source: source.to_owned(),
                reference_id,
            },
        )
        .await?;
        UserProfile::set_balance_tx(tx, user_id, entry.balance_after).await?;
        Ok(entry)
    }

    /// Debit inside a caller-owned transaction. An absent profile counts
    /// as a zero balance and therefore as insufficient funds.
    pub async fn spend_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: &str,
        amount: i64,
        reason: &str,
        source: &str,
        reference_id: Option<String>,
    ) -> Result<BesitosTransaction, WalletError> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let balance_before = UserProfile::lock_balance_existing_tx(tx, user_id)
            .await?
            .unwrap_or(0);
        if balance_before < amount {
            return Err(WalletError::InsufficientFunds {
                balance: balance_before,
                requested: amount,
            });
        }
        let entry = BesitosTransaction::insert_tx(
            tx,
            &LedgerInsert {
                user_id: user_id.to_owned(),
                kind: TransactionKind::Spent,
                amount: -amount,
                balance_before,
                reason: reason.to_owned(),
                source: source.to_owned(),
                reference_id,
            },
        )
        .await?;
        UserProfile::set_balance_tx(tx, user_id, entry.balance_after).await?;
        Ok(entry)
    }

    /// Publish the event for a committed credit (award or refund).
    pub(crate) async fn publish_credit(&self, entry: &BesitosTransaction) {
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

    /// Publish the event for a committed debit.
    pub(crate) async fn publish_spend(&self, entry: &BesitosTransaction, item_id: Option<String>) {
        self.bus
            .publish(EventEnvelope::new(EventPayload::BesitosSpent {
                user_id: entry.user_id.clone(),
                amount: -entry.amount,
                balance_after: entry.balance_after,
                reason: entry.reason.clone(),
                item_id,
            }))
            .await;
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::events::InProcessBroker;
    use std::sync::Arc;

    fn lazy_wallet() -> BesitosWallet {
        // connect_lazy performs no I/O; validation paths reject before
        // any query runs.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/yabot_test");
        let Ok(pool) = pool else {
            panic!("lazy pool construction failed");
        };
        BesitosWallet::new(pool, EventBus::new(Arc::new(InProcessBroker::new())))
    }

    #[tokio::test]
    async fn non_positive_award_is_rejected_before_storage() {
        let wallet = lazy_wallet();
        for amount in [0, -10] {
            match wallet.add_besitos("u-1", amount, "test", "test", None).await {
                Err(WalletError::InvalidAmount(a)) => assert_eq!(a, amount),
                other => panic!("expected InvalidAmount, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn non_positive_spend_is_rejected_before_storage() {
        let wallet = lazy_wallet();
        match wallet.spend_besitos("u-1", 0, "test", None, None).await {
            Err(WalletError::InvalidAmount(0)) => {}
            other => panic!("expected InvalidAmount, got {other:?}"),
        }
    }
}
