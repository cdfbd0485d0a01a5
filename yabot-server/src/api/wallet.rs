//! Wallet read endpoints.

use super::{AdminAuth, ApiError};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use yabot_core::entities::ledger::BesitosTransaction;
use yabot_sdk::objects::wallet::{BalanceResponse, TransactionResponse};

/// Convert a ledger row into its wire shape.
pub fn transaction_response(entry: &BesitosTransaction) -> TransactionResponse {
    TransactionResponse {
        transaction_id: entry.transaction_id,
        user_id: entry.user_id.clone(),
        kind: entry.kind.into(),
        amount: entry.amount,
        balance_before: entry.balance_before,
        balance_after: entry.balance_after,
        status: entry.status.into(),
        reason: entry.reason.clone(),
        source: entry.source.clone(),
        reference_id: entry.reference_id.clone(),
        created_at: entry.created_at.unix_timestamp(),
    }
}

/// `GET /wallet/{user_id}/balance`
pub async fn get_balance(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let besitos_balance = state.wallet.get_balance(&user_id).await?;
    Ok(Json(BalanceResponse {
        user_id,
        besitos_balance,
    }))
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub besitos_balance: i64,
    pub last_daily_gift_at: Option<i64>,
    pub created_at: i64,
}

/// `GET /wallet/{user_id}/profile`
pub async fn get_profile(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let Some(profile) = state.wallet.get_profile(&user_id).await? else {
        return Err(ApiError::not_found("profile not found"));
    };
    Ok(Json(ProfileResponse {
        user_id: profile.user_id,
        besitos_balance: profile.besitos_balance,
        last_daily_gift_at: profile.last_daily_gift_at.map(|t| t.unix_timestamp()),
        created_at: profile.created_at.unix_timestamp(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    50
}

/// `GET /wallet/{user_id}/transactions`, newest first.
pub async fn get_transactions(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    let history = state
        .wallet
        .get_transaction_history(&user_id, query.limit.clamp(1, 500))
        .await?;
    Ok(Json(history.iter().map(transaction_response).collect()))
}
