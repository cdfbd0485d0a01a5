//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use sqlx::PgPool;
use std::sync::Arc;
use yabot_core::achievements::AchievementSystem;
use yabot_core::auctions::AuctionSystem;
use yabot_core::cross_module::CrossModuleService;
use yabot_core::processors::EventProcessor;
use yabot_core::store::StoreService;
use yabot_core::subscriptions::SubscriptionManager;
use yabot_core::trivia::TriviaEngine;
use yabot_core::wallet::BesitosWallet;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Reloadable configuration (SIGHUP).
    pub config: SharedConfig,
    /// The event processor, for health reporting.
    pub processor: Arc<EventProcessor>,
    pub wallet: Arc<BesitosWallet>,
    pub cross: Arc<CrossModuleService>,
    pub store: Arc<StoreService>,
    pub auctions: Arc<AuctionSystem>,
    pub trivia: Arc<TriviaEngine>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub achievements: Arc<AchievementSystem>,
}
