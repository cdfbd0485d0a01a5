pub mod achievement;
pub mod auction;
pub mod inventory;
pub mod ledger;
pub mod mission;
pub mod subscription;
pub mod trivia;
pub mod user_profile;

use yabot_sdk::objects::gamification::{
    AuctionStatus as SdkAuctionStatus, MissionKind as SdkMissionKind,
    SubscriptionPlan as SdkSubscriptionPlan, SubscriptionStatus as SdkSubscriptionStatus,
};
use yabot_sdk::objects::wallet::{
    TransactionKind as SdkTransactionKind, TransactionStatus as SdkTransactionStatus,
};

/// Ledger entry kind for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see
/// `yabot_sdk::objects::wallet::TransactionKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "transaction_kind")]
pub enum TransactionKind {
    Awarded,
    Spent,
    Refund,
    Bonus,
}

impl From<TransactionKind> for SdkTransactionKind {
    fn from(value: TransactionKind) -> Self {
        match value {
            TransactionKind::Awarded => SdkTransactionKind::Awarded,
            TransactionKind::Spent => SdkTransactionKind::Spent,
            TransactionKind::Refund => SdkTransactionKind::Refund,
            TransactionKind::Bonus => SdkTransactionKind::Bonus,
        }
    }
}

/// Ledger entry status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "transaction_status")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl From<TransactionStatus> for SdkTransactionStatus {
    fn from(value: TransactionStatus) -> Self {
        match value {
            TransactionStatus::Pending => SdkTransactionStatus::Pending,
            TransactionStatus::Completed => SdkTransactionStatus::Completed,
            TransactionStatus::Failed => SdkTransactionStatus::Failed,
            TransactionStatus::Cancelled => SdkTransactionStatus::Cancelled,
        }
    }
}

/// Mission kind for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "mission_kind")]
pub enum MissionKind {
    Daily,
    Weekly,
    Story,
    Special,
    Achievement,
}

impl From<MissionKind> for SdkMissionKind {
    fn from(value: MissionKind) -> Self {
        match value {
            MissionKind::Daily => SdkMissionKind::Daily,
            MissionKind::Weekly => SdkMissionKind::Weekly,
            MissionKind::Story => SdkMissionKind::Story,
            MissionKind::Special => SdkMissionKind::Special,
            MissionKind::Achievement => SdkMissionKind::Achievement,
        }
    }
}

/// Mission lifecycle status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "mission_status")]
pub enum MissionStatus {
    Available,
    InProgress,
    Completed,
    Expired,
    Locked,
}

/// Auction lifecycle status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "auction_status")]
pub enum AuctionStatus {
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl AuctionStatus {
    /// Whether the state machine has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuctionStatus::Active)
    }
}

impl From<AuctionStatus> for SdkAuctionStatus {
    fn from(value: AuctionStatus) -> Self {
        match value {
            AuctionStatus::Active => SdkAuctionStatus::Active,
            AuctionStatus::Completed => SdkAuctionStatus::Completed,
            AuctionStatus::Cancelled => SdkAuctionStatus::Cancelled,
            AuctionStatus::Expired => SdkAuctionStatus::Expired,
        }
    }
}

/// Trivia session status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "trivia_status")]
pub enum TriviaStatus {
    Open,
    Closed,
}

/// Subscription plan tier for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "subscription_plan")]
pub enum SubscriptionPlan {
    Free,
    Vip,
    Premium,
}

impl From<SubscriptionPlan> for SdkSubscriptionPlan {
    fn from(value: SubscriptionPlan) -> Self {
        match value {
            SubscriptionPlan::Free => SdkSubscriptionPlan::Free,
            SubscriptionPlan::Vip => SdkSubscriptionPlan::Vip,
            SubscriptionPlan::Premium => SdkSubscriptionPlan::Premium,
        }
    }
}

/// Subscription status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "subscription_status")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

impl From<SubscriptionStatus> for SdkSubscriptionStatus {
    fn from(value: SubscriptionStatus) -> Self {
        match value {
            SubscriptionStatus::Active => SdkSubscriptionStatus::Active,
            SubscriptionStatus::Expired => SdkSubscriptionStatus::Expired,
        }
    }
}
