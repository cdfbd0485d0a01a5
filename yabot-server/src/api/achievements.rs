//! Achievement read endpoints.

use super::{AdminAuth, ApiError};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use yabot_core::achievements::achievement_def;

#[derive(Debug, Serialize)]
pub struct AchievementResponse {
    pub achievement_id: String,
    pub title: Option<String>,
    pub current_value: i64,
    pub target_value: i64,
    pub progress_percentage: f64,
    pub completed: bool,
    pub unlocked_at: Option<i64>,
}

/// `GET /achievements/{user_id}`
pub async fn get_achievements(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<AchievementResponse>>, ApiError> {
    let rows = state.achievements.get_achievements(&user_id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| AchievementResponse {
                title: achievement_def(&row.achievement_id).map(|def| def.title.to_owned()),
                progress_percentage: row.progress_percentage(),
                achievement_id: row.achievement_id,
                current_value: row.current_value,
                target_value: row.target_value,
                completed: row.completed,
                unlocked_at: row.unlocked_at.map(|t| t.unix_timestamp()),
            })
            .collect(),
    ))
}
