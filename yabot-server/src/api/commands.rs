//! Compound command endpoints: the bot gateway's entry points into the
//! reaction → currency → mission workflow.

use super::wallet::transaction_response;
use super::{AdminAuth, ApiError};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use yabot_sdk::objects::wallet::TransactionResponse;

#[derive(Debug, Deserialize)]
pub struct DailyGiftRequest {
    pub user_id: String,
}

/// `POST /commands/daily-gift`
pub async fn claim_daily_gift(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(request): Json<DailyGiftRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let entry = state.cross.claim_daily_gift(&request.user_id).await?;
    Ok(Json(transaction_response(&entry)))
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub user_id: String,
    pub message_id: String,
}

/// `POST /commands/reaction`
pub async fn process_reaction(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(request): Json<ReactionRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let entry = state
        .cross
        .process_reaction(&request.user_id, &request.message_id)
        .await?;
    Ok(Json(transaction_response(&entry)))
}

#[derive(Debug, Deserialize)]
pub struct ChoiceRequest {
    pub user_id: String,
    pub choice_id: String,
}

/// `POST /commands/choice`
pub async fn process_choice(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(request): Json<ChoiceRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .cross
        .process_narrative_choice(&request.user_id, &request.choice_id)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: String,
    pub item_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// `POST /commands/purchase`
pub async fn purchase(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(request): Json<PurchaseRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .purchase(&request.user_id, &request.item_id, request.quantity)
        .await?;
    Ok(StatusCode::OK)
}
