//! Subscription endpoints.

use super::{AdminAuth, ApiError};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use yabot_core::entities::SubscriptionPlan;
use yabot_sdk::objects::gamification::SubscriptionPlan as SdkSubscriptionPlan;

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: String,
    pub plan: SdkSubscriptionPlan,
    #[serde(default)]
    pub duration_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct VipStatusResponse {
    pub user_id: String,
    pub vip: bool,
}

fn plan_from_sdk(plan: SdkSubscriptionPlan) -> SubscriptionPlan {
    match plan {
        SdkSubscriptionPlan::Free => SubscriptionPlan::Free,
        SdkSubscriptionPlan::Vip => SubscriptionPlan::Vip,
        SdkSubscriptionPlan::Premium => SubscriptionPlan::Premium,
    }
}

/// `POST /subscriptions`
pub async fn grant_subscription(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(request): Json<GrantRequest>,
) -> Result<Json<VipStatusResponse>, ApiError> {
    let duration = request.duration_days.map(time::Duration::days);
    let subscription = state
        .subscriptions
        .grant_subscription(&request.user_id, plan_from_sdk(request.plan), duration)
        .await?;
    Ok(Json(VipStatusResponse {
        vip: subscription.grants_vip(time::OffsetDateTime::now_utc()),
        user_id: subscription.user_id,
    }))
}

/// `GET /subscriptions/{user_id}/vip`
pub async fn check_vip(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<VipStatusResponse>, ApiError> {
    let vip = state.subscriptions.check_vip_status(&user_id).await?;
    Ok(Json(VipStatusResponse { user_id, vip }))
}
