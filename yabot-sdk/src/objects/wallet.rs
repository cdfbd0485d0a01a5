//! Wallet API types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger entry kind for API responses and event payloads.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `yabot-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Awarded,
    Spent,
    Refund,
    Bonus,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Awarded => write!(f, "awarded"),
            TransactionKind::Spent => write!(f, "spent"),
            TransactionKind::Refund => write!(f, "refund"),
            TransactionKind::Bonus => write!(f, "bonus"),
        }
    }
}

/// Ledger entry status for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// Current balance of one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub besitos_balance: i64,
}

/// One ledger entry, newest-first in history responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_id: Uuid,
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub status: TransactionStatus,
    pub reason: String,
    pub source: String,
    pub reference_id: Option<String>,
    pub created_at: i64,
}
