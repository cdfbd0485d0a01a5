//! Inventory read endpoints.

use super::{AdminAuth, ApiError};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct InventoryItemResponse {
    pub item_id: String,
    pub quantity: i64,
    pub acquired_at: i64,
}

/// `GET /store/{user_id}/inventory`, newest acquisitions first.
pub async fn get_inventory(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<InventoryItemResponse>>, ApiError> {
    let inventory = state.store.get_inventory(&user_id).await?;
    Ok(Json(
        inventory
            .into_iter()
            .map(|item| InventoryItemResponse {
                item_id: item.item_id,
                quantity: item.quantity,
                acquired_at: item.acquired_at.unix_timestamp(),
            })
            .collect(),
    ))
}
