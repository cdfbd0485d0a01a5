//! Gamification API types.

use serde::{Deserialize, Serialize};

/// Mission kind for API responses and event payloads.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `yabot-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionKind {
    Daily,
    Weekly,
    Story,
    Special,
    Achievement,
}

impl std::fmt::Display for MissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissionKind::Daily => write!(f, "daily"),
            MissionKind::Weekly => write!(f, "weekly"),
            MissionKind::Story => write!(f, "story"),
            MissionKind::Special => write!(f, "special"),
            MissionKind::Achievement => write!(f, "achievement"),
        }
    }
}

/// Terminal and non-terminal auction states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuctionStatus::Active => write!(f, "active"),
            AuctionStatus::Completed => write!(f, "completed"),
            AuctionStatus::Cancelled => write!(f, "cancelled"),
            AuctionStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Free,
    Vip,
    Premium,
}

impl SubscriptionPlan {
    /// Whether this tier grants VIP access.
    pub fn is_vip(&self) -> bool {
        matches!(self, SubscriptionPlan::Vip | SubscriptionPlan::Premium)
    }
}

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}
