//! Auction endpoints.

use super::{AdminAuth, ApiError};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use yabot_core::entities::auction::Auction;
use yabot_sdk::objects::gamification::AuctionStatus;

#[derive(Debug, Serialize)]
pub struct AuctionResponse {
    pub auction_id: Uuid,
    pub seller_id: String,
    pub item_id: String,
    pub starting_price: i64,
    pub current_price: i64,
    pub status: AuctionStatus,
    pub current_winner_id: Option<String>,
    pub bid_count: usize,
    pub end_time: i64,
}

fn auction_response(auction: &Auction) -> AuctionResponse {
    AuctionResponse {
        auction_id: auction.auction_id,
        seller_id: auction.seller_id.clone(),
        item_id: auction.item_id.clone(),
        starting_price: auction.starting_price,
        current_price: auction.current_price,
        status: auction.status.into(),
        current_winner_id: auction.current_winner_id.clone(),
        bid_count: auction.bids.0.len(),
        end_time: auction.end_time.unix_timestamp(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAuctionRequest {
    pub seller_id: String,
    pub item_id: String,
    pub starting_price: i64,
    pub duration_secs: i64,
}

/// `POST /auctions`
pub async fn create_auction(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(request): Json<CreateAuctionRequest>,
) -> Result<Json<AuctionResponse>, ApiError> {
    let auction = state
        .auctions
        .create_auction(
            &request.seller_id,
            &request.item_id,
            request.starting_price,
            time::Duration::seconds(request.duration_secs.max(1)),
        )
        .await?;
    Ok(Json(auction_response(&auction)))
}

#[derive(Debug, Deserialize)]
pub struct BidRequest {
    pub bidder_id: String,
    pub amount: i64,
}

/// `POST /auctions/{auction_id}/bids`
pub async fn place_bid(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(auction_id): Path<Uuid>,
    Json(request): Json<BidRequest>,
) -> Result<Json<AuctionResponse>, ApiError> {
    let auction = state
        .auctions
        .place_bid(auction_id, &request.bidder_id, request.amount)
        .await?;
    Ok(Json(auction_response(&auction)))
}

/// `POST /auctions/{auction_id}/close`
pub async fn close_auction(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(auction_id): Path<Uuid>,
) -> Result<Json<AuctionResponse>, ApiError> {
    let auction = state.auctions.close_auction(auction_id).await?;
    Ok(Json(auction_response(&auction)))
}

/// `POST /auctions/{auction_id}/cancel`
pub async fn cancel_auction(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(auction_id): Path<Uuid>,
) -> Result<Json<AuctionResponse>, ApiError> {
    let auction = state.auctions.cancel_auction(auction_id).await?;
    Ok(Json(auction_response(&auction)))
}
