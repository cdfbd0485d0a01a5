//! Axum server setup and router configuration.

use crate::api;
use crate::api::AdminAuth;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use yabot_sdk::objects::health::EventsHealthReport;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_check))
        .route("/health/events", get(events_health))
        // Compound commands (bot gateway)
        .route("/commands/daily-gift", post(api::commands::claim_daily_gift))
        .route("/commands/reaction", post(api::commands::process_reaction))
        .route("/commands/choice", post(api::commands::process_choice))
        .route("/commands/purchase", post(api::commands::purchase))
        // Wallet reads
        .route("/wallet/{user_id}/balance", get(api::wallet::get_balance))
        .route("/wallet/{user_id}/profile", get(api::wallet::get_profile))
        .route(
            "/wallet/{user_id}/transactions",
            get(api::wallet::get_transactions),
        )
        // Inventory and achievement reads
        .route("/store/{user_id}/inventory", get(api::store::get_inventory))
        .route(
            "/achievements/{user_id}",
            get(api::achievements::get_achievements),
        )
        // Auctions
        .route("/auctions", post(api::auctions::create_auction))
        .route("/auctions/{auction_id}/bids", post(api::auctions::place_bid))
        .route(
            "/auctions/{auction_id}/close",
            post(api::auctions::close_auction),
        )
        .route(
            "/auctions/{auction_id}/cancel",
            post(api::auctions::cancel_auction),
        )
        // Trivia
        .route("/trivia", post(api::trivia::open_session))
        .route(
            "/trivia/{session_id}/answers",
            post(api::trivia::submit_answer),
        )
        // Subscriptions
        .route(
            "/subscriptions",
            post(api::subscriptions::grant_subscription),
        )
        .route(
            "/subscriptions/{user_id}/vip",
            get(api::subscriptions::check_vip),
        )
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    broker_connected: bool,
}

/// Simple health check - returns OK if the server is running.
async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        broker_connected: state.wallet.bus().is_connected(),
    })
}

/// Event processor health report (admin-gated).
async fn events_health(
    _: AdminAuth,
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<EventsHealthReport> {
    Json(state.processor.health_check().await)
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
