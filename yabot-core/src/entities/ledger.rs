use crate::entities::{TransactionKind, TransactionStatus};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

/// One append-only ledger entry. Rows are inserted in the same database
/// transaction that mutates the owning user's balance and are never
/// updated or deleted afterwards.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BesitosTransaction {
    pub transaction_id: Uuid,
    pub user_id: String,
    pub kind: TransactionKind,
    /// Signed amount: positive for credits, negative for debits.
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub status: TransactionStatus,
    pub reason: String,
    pub source: String,
    pub reference_id: Option<String>,
    pub created_at: time::OffsetDateTime,
}

impl BesitosTransaction {
    /// Ledger self-consistency: the recorded balances bracket the amount.
    pub fn is_balanced(&self) -> bool {
        self.balance_after == self.balance_before + self.amount
    }
}

/// Data for inserting a new ledger entry.
#[derive(Debug, Clone)]
pub struct LedgerInsert {
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_before: i64,
    pub reason: String,
    pub source: String,
    pub reference_id: Option<String>,
}

impl LedgerInsert {
    pub fn balance_after(&self) -> i64 {
        self.balance_before + self.amount
    }
}

impl BesitosTransaction {
    /// Insert a completed ledger entry inside a caller-owned transaction.
    ///
    /// The caller is responsible for updating the user's balance in the
    /// same transaction so the two writes commit or roll back together.
    pub async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        insert: &LedgerInsert,
    ) -> Result<BesitosTransaction, sqlx::Error> {
        sqlx::query_as::<_, BesitosTransaction>(
            r#"
            INSERT INTO besitos_transactions
                (transaction_id, user_id, kind, amount, balance_before,
                 balance_after, status, reason, source, reference_id)
            VALUES ($1, $2, $3, $4, $5, $6, 'completed', $7, $8, $9)
            RETURNING
                transaction_id, user_id, kind, amount, balance_before,
                balance_after, status, reason, source, reference_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&insert.user_id)
        .bind(insert.kind)
        .bind(insert.amount)
        .bind(insert.balance_before)
        .bind(insert.balance_after())
        .bind(&insert.reason)
        .bind(&insert.source)
        .bind(&insert.reference_id)
        .fetch_one(&mut **tx)
        .await
    }
}

#[derive(Debug, Clone)]
/// Get a user's ledger history, newest first.
pub struct GetTransactionHistory {
    pub user_id: String,
    pub limit: i64,
}

impl Processor<GetTransactionHistory> for DatabaseProcessor {
    type Output = Vec<BesitosTransaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTransactionHistory")]
    async fn process(
        &self,
        query: GetTransactionHistory,
    ) -> Result<Vec<BesitosTransaction>, sqlx::Error> {
        sqlx::query_as::<_, BesitosTransaction>(
            r#"
            SELECT
                transaction_id, user_id, kind, amount, balance_before,
                balance_after, status, reason, source, reference_id, created_at
            FROM besitos_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(&query.user_id)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_insert_balance_after() {
        let insert = LedgerInsert {
            user_id: "u-1".into(),
            kind: TransactionKind::Spent,
            amount: -30,
            balance_before: 50,
            reason: "purchase".into(),
            source: "store".into(),
            reference_id: None,
        };
        assert_eq!(insert.balance_after(), 20);
    }

    #[test]
    fn balanced_entry_detection() {
        let entry = BesitosTransaction {
            transaction_id: Uuid::new_v4(),
            user_id: "u-1".into(),
            kind: TransactionKind::Awarded,
            amount: 50,
            balance_before: 0,
            balance_after: 50,
            status: TransactionStatus::Completed,
            reason: "reaction".into(),
            source: "reaction_handler".into(),
            reference_id: None,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        assert!(entry.is_balanced());

        let skewed = BesitosTransaction {
            balance_after: 49,
            ..entry
        };
        assert!(!skewed.is_balanced());
    }
}
