//! The auction system.
//!
//! State machine: `active -> {completed | expired | cancelled}`, terminal.
//!
//! Bid acceptance is one database transaction: the new bidder's debit, the
//! outbid leader's refund and the price/winner update commit together, so
//! a failed refund rolls the debit back too; the ledger can never show a
//! debit without the matching refund. Events for both wallet legs publish
//! after commit.
//!
//! Every active auction has a deadline scheduled; deadlines are restored
//! from the persisted `end_time` at startup.

use crate::entities::auction::{Auction, Bid, BidRejection, ListActiveAuctions};
use crate::entities::inventory::InventoryItem;
use crate::entities::ledger::BesitosTransaction;
use crate::entities::{AuctionStatus, TransactionKind};
use crate::events::EventBus;
use crate::framework::DatabaseProcessor;
use crate::processors::{DeadlineHandle, DeadlineKind};
use crate::wallet::{BesitosWallet, WalletError};
use kanau::processor::Processor;
use sqlx::PgPool;
use sqlx::types::Json;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use yabot_sdk::events::{EventEnvelope, EventPayload};

#[derive(Debug, Error)]
pub enum AuctionError {
    #[error("auction {0} not found")]
    NotFound(Uuid),

    #[error("auction {0} has expired")]
    Expired(Uuid),

    #[error("auction {0} is not active")]
    NotActive(Uuid),

    #[error("bid too low, minimum is {minimum}")]
    BidTooLow { minimum: i64 },

    #[error("the seller cannot bid on their own auction")]
    OwnAuction,

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub struct AuctionSystem {
    pool: PgPool,
    bus: EventBus,
    deadlines: DeadlineHandle,
}

impl AuctionSystem {
    pub fn new(pool: PgPool, bus: EventBus, deadlines: DeadlineHandle) -> Self {
        Self {
            pool,
            bus,
            deadlines,
        }
    }

    /// Open a new auction and schedule its closing deadline.
    pub async fn create_auction(
        &self,
        seller_id: &str,
        item_id: &str,
        starting_price: i64,
        duration: time::Duration,
    ) -> Result<Auction, AuctionError> {
        let now = time::OffsetDateTime::now_utc();
        let auction = Auction {
            auction_id: Uuid::new_v4(),
            seller_id: seller_id.to_owned(),
            item_id: item_id.to_owned(),
            starting_price,
            current_price: starting_price,
            status: AuctionStatus::Active,
            bids: Json(Vec::<Bid>::new()),
            current_winner_id: None,
            end_time: now + duration,
            created_at: now,
        };
        auction.insert(&self.pool).await?;
        self.deadlines
            .schedule(DeadlineKind::Auction, auction.auction_id, auction.end_time)
            .await;
        info!(
            auction_id = %auction.auction_id,
            seller_id,
            item_id,
            starting_price,
            "Auction created"
        );
        Ok(auction)
    }

    /// Place a bid. On acceptance the debit, the previous leader's refund
    /// and the auction update commit as one unit.
    pub async fn place_bid(
        &self,
        auction_id: Uuid,
        bidder_id: &str,
        amount: i64,
    ) -> Result<Auction, AuctionError> {
        let now = time::OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;
        let Some(mut auction) = Auction::lock_tx(&mut tx, auction_id).await? else {
            return Err(AuctionError::NotFound(auction_id));
        };

        if let Err(rejection) = auction.validate_bid(bidder_id, amount, now) {
            drop(tx);
            return Err(match rejection {
                BidRejection::PastEndTime => {
                    // The deadline has passed but the timer has not fired
                    // (or was lost): close now, then report expiry.
                    self.close_auction(auction_id).await?;
                    AuctionError::Expired(auction_id)
                }
                BidRejection::NotActive => AuctionError::NotActive(auction_id),
                BidRejection::TooLow { minimum } => AuctionError::BidTooLow { minimum },
                BidRejection::OwnAuction => AuctionError::OwnAuction,
            });
        }

        let debit = BesitosWallet::spend_in_tx(
            &mut tx,
            bidder_id,
            amount,
            "auction_bid",
            "auction",
            Some(auction_id.to_string()),
        )
        .await?;

        let outbid = auction.accept_bid(bidder_id, amount, now);
        let refund = match &outbid {
            Some((previous_winner, previous_bid)) => Some(
                BesitosWallet::credit_in_tx(
                    &mut tx,
                    previous_winner,
                    TransactionKind::Refund,
                    *previous_bid,
                    "auction_outbid_refund",
                    "auction",
                    Some(auction_id.to_string()),
                )
                .await?,
            ),
            None => None,
        };

        auction.save_bid_state_tx(&mut tx).await?;
        tx.commit().await?;

        info!(
            %auction_id,
            bidder_id,
            amount,
            previous_winner = outbid.as_ref().map(|(w, _)| w.as_str()),
            "Bid accepted"
        );
        self.publish_spend(&debit, &auction.item_id).await;
        if let Some(entry) = refund {
            self.publish_credit(&entry).await;
        }
        self.bus
            .publish(EventEnvelope::new(EventPayload::BidPlaced {
                auction_id,
                bidder_id: bidder_id.to_owned(),
                amount,
                previous_winner_id: outbid.map(|(winner, _)| winner),
            }))
            .await;
        Ok(auction)
    }

    /// Finalize an auction: pay the seller and grant the item when a
    /// winner exists, mark it expired otherwise. Idempotent: closing an
    /// already-terminal auction is a no-op.
    pub async fn close_auction(&self, auction_id: Uuid) -> Result<Auction, AuctionError> {
        let mut tx = self.pool.begin().await?;
        let Some(auction) = Auction::lock_tx(&mut tx, auction_id).await? else {
            return Err(AuctionError::NotFound(auction_id));
        };
        if auction.status.is_terminal() {
            return Ok(auction);
        }

        let status = auction.closing_status();
        let payment = match (&auction.current_winner_id, status) {
            (Some(winner), AuctionStatus::Completed) => {
                let entry = BesitosWallet::credit_in_tx(
                    &mut tx,
                    &auction.seller_id,
                    TransactionKind::Awarded,
                    auction.current_price,
                    "auction_sale",
                    "auction",
                    Some(auction_id.to_string()),
                )
                .await?;
                InventoryItem::grant_tx(&mut tx, winner, &auction.item_id, 1).await?;
                Some(entry)
            }
            _ => None,
        };
        Auction::close_tx(&mut tx, auction_id, status).await?;
        tx.commit().await?;

        self.deadlines.cancel(auction_id).await;
        info!(%auction_id, ?status, "Auction closed");

        if let Some(entry) = &payment {
            self.publish_credit(entry).await;
        }
        if let (Some(winner), AuctionStatus::Completed) = (&auction.current_winner_id, status) {
            self.bus
                .publish(EventEnvelope::new(EventPayload::ItemAwarded {
                    user_id: winner.clone(),
                    item_id: auction.item_id.clone(),
                    quantity: 1,
                }))
                .await;
        }
        self.publish_closed(&auction, status).await;
        Ok(Auction { status, ..auction })
    }

    /// Cancel an active auction, refunding the current leader.
    pub async fn cancel_auction(&self, auction_id: Uuid) -> Result<Auction, AuctionError> {
        let mut tx = self.pool.begin().await?;
        let Some(auction) = Auction::lock_tx(&mut tx, auction_id).await? else {
            return Err(AuctionError::NotFound(auction_id));
        };
        if auction.status.is_terminal() {
            return Err(AuctionError::NotActive(auction_id));
        }

        let refund = match &auction.current_winner_id {
            Some(winner) => Some(
                BesitosWallet::credit_in_tx(
                    &mut tx,
                    winner,
                    TransactionKind::Refund,
                    auction.current_price,
                    "auction_cancelled_refund",
                    "auction",
                    Some(auction_id.to_string()),
                )
                .await?,
            ),
            None => None,
        };
        Auction::close_tx(&mut tx, auction_id, AuctionStatus::Cancelled).await?;
        tx.commit().await?;

        self.deadlines.cancel(auction_id).await;
        info!(%auction_id, "Auction cancelled");

        if let Some(entry) = refund {
            self.publish_credit(&entry).await;
        }
        self.publish_closed(&auction, AuctionStatus::Cancelled).await;
        Ok(Auction {
            status: AuctionStatus::Cancelled,
            ..auction
        })
    }

    /// Re-schedule deadlines for every active auction after a restart.
    /// Auctions already past their end time are closed immediately.
    pub async fn restore_deadlines(&self) -> Result<usize, AuctionError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        let active = db.process(ListActiveAuctions).await?;
        let now = time::OffsetDateTime::now_utc();
        let mut restored = 0;
        for auction in active {
            if auction.end_time <= now {
                self.close_auction(auction.auction_id).await?;
            } else {
                self.deadlines
                    .schedule(DeadlineKind::Auction, auction.auction_id, auction.end_time)
                    .await;
                restored += 1;
            }
        }
        info!(restored, "Auction deadlines restored");
        Ok(restored)
    }

    async fn publish_spend(&self, entry: &BesitosTransaction, item_id: &str) {
        self.bus
            .publish(EventEnvelope::new(EventPayload::BesitosSpent {
                user_id: entry.user_id.clone(),
                amount: -entry.amount,
                balance_after: entry.balance_after,
                reason: entry.reason.clone(),
                item_id: Some(item_id.to_owned()),
            }))
            .await;
    }

    async fn publish_credit(&self, entry: &BesitosTransaction) {
        self.bus
            .publish(EventEnvelope::new(EventPayload::BesitosAwarded {
                user_id: entry.user_id.clone(),
                amount: entry.amount,
                balance_after: entry.balance_after,
                kind: entry.kind.into(),
                reason: entry.reason.clone(),
                source: entry.source.clone(),
            }))
            .await;
    }

    async fn publish_closed(&self, auction: &Auction, status: AuctionStatus) {
        self.bus
            .publish(EventEnvelope::new(EventPayload::AuctionClosed {
                auction_id: auction.auction_id,
                status: status.into(),
                winner_id: auction.current_winner_id.clone(),
                final_price: auction
                    .current_winner_id
                    .is_some()
                    .then_some(auction.current_price),
            }))
            .await;
    }
}
