use crate::entities::AuctionStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// One accepted bid. Stored in placement order as JSONB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder_id: String,
    pub amount: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub placed_at: time::OffsetDateTime,
}

/// Reasons a bid is rejected before any balance is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidRejection {
    /// The auction has already reached a terminal state.
    NotActive,
    /// `end_time` has passed; the caller should close the auction.
    PastEndTime,
    /// The bid does not beat the current price by at least 1.
    TooLow { minimum: i64 },
    /// The seller cannot bid on their own auction.
    OwnAuction,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Auction {
    pub auction_id: Uuid,
    pub seller_id: String,
    pub item_id: String,
    pub starting_price: i64,
    /// Only ever increases while the auction is active.
    pub current_price: i64,
    pub status: AuctionStatus,
    pub bids: Json<Vec<Bid>>,
    pub current_winner_id: Option<String>,
    pub end_time: time::OffsetDateTime,
    pub created_at: time::OffsetDateTime,
}

impl Auction {
    /// Validate a bid against the state machine. Pure; the wallet check
    /// happens separately inside the acceptance transaction.
    pub fn validate_bid(
        &self,
        bidder_id: &str,
        amount: i64,
        now: time::OffsetDateTime,
    ) -> Result<(), BidRejection> {
        if self.status.is_terminal() {
            return Err(BidRejection::NotActive);
        }
        if now >= self.end_time {
            return Err(BidRejection::PastEndTime);
        }
        if bidder_id == self.seller_id {
            return Err(BidRejection::OwnAuction);
        }
        let minimum = self.minimum_bid();
        if amount < minimum {
            return Err(BidRejection::TooLow { minimum });
        }
        Ok(())
    }

    /// The lowest acceptable next bid: current price plus one.
    pub fn minimum_bid(&self) -> i64 {
        self.current_price + 1
    }

    /// Record an accepted bid and return the outbid leader to refund, if
    /// any: `(previous_winner_id, previous_leading_bid)`.
    pub fn accept_bid(
        &mut self,
        bidder_id: &str,
        amount: i64,
        now: time::OffsetDateTime,
    ) -> Option<(String, i64)> {
        let outbid = self
            .current_winner_id
            .take()
            .map(|previous| (previous, self.current_price));
        self.current_price = amount;
        self.current_winner_id = Some(bidder_id.to_owned());
        self.bids.0.push(Bid {
            bidder_id: bidder_id.to_owned(),
            amount,
            placed_at: now,
        });
        outbid
    }

    /// The terminal status a close should produce right now.
    pub fn closing_status(&self) -> AuctionStatus {
        if self.current_winner_id.is_some() {
            AuctionStatus::Completed
        } else {
            AuctionStatus::Expired
        }
    }
}

const AUCTION_COLUMNS: &str = "auction_id, seller_id, item_id, starting_price, current_price, \
     status, bids, current_winner_id, end_time, created_at";

impl Auction {
    pub async fn insert(&self, pool: &sqlx::PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO auctions
                (auction_id, seller_id, item_id, starting_price, current_price,
                 status, bids, current_winner_id, end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(self.auction_id)
        .bind(&self.seller_id)
        .bind(&self.item_id)
        .bind(self.starting_price)
        .bind(self.current_price)
        .bind(self.status)
        .bind(&self.bids)
        .bind(&self.current_winner_id)
        .bind(self.end_time)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Row-locked fetch for bid placement and closing.
    pub async fn lock_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        auction_id: Uuid,
    ) -> Result<Option<Auction>, sqlx::Error> {
        sqlx::query_as::<_, Auction>(&format!(
            "SELECT {AUCTION_COLUMNS} FROM auctions WHERE auction_id = $1 FOR UPDATE",
        ))
        .bind(auction_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Write back price, winner and bid list after an accepted bid.
    pub async fn save_bid_state_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE auctions \
             SET current_price = $2, current_winner_id = $3, bids = $4 \
             WHERE auction_id = $1",
        )
        .bind(self.auction_id)
        .bind(self.current_price)
        .bind(&self.current_winner_id)
        .bind(&self.bids)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Transition to a terminal status inside the caller's transaction.
    pub async fn close_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        auction_id: Uuid,
        status: AuctionStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE auctions SET status = $2 WHERE auction_id = $1")
            .bind(auction_id)
            .bind(status)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
/// All auctions still active, for deadline restoration at startup.
pub struct ListActiveAuctions;

impl Processor<ListActiveAuctions> for DatabaseProcessor {
    type Output = Vec<Auction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListActiveAuctions")]
    async fn process(&self, _query: ListActiveAuctions) -> Result<Vec<Auction>, sqlx::Error> {
        sqlx::query_as::<_, Auction>(&format!(
            "SELECT {AUCTION_COLUMNS} FROM auctions WHERE status = 'active' ORDER BY end_time ASC",
        ))
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_auction() -> Auction {
        Auction {
            auction_id: Uuid::new_v4(),
            seller_id: "seller".into(),
            item_id: "mochila".into(),
            starting_price: 10,
            current_price: 10,
            status: AuctionStatus::Active,
            bids: Json(vec![]),
            current_winner_id: None,
            end_time: time::OffsetDateTime::UNIX_EPOCH + time::Duration::hours(1),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn bid_must_beat_current_price_by_one() {
        let auction = active_auction();
        let now = time::OffsetDateTime::UNIX_EPOCH;
        assert_eq!(
            auction.validate_bid("u-1", 10, now),
            Err(BidRejection::TooLow { minimum: 11 })
        );
        assert_eq!(auction.validate_bid("u-1", 11, now), Ok(()));
    }

    #[test]
    fn bid_after_end_time_is_rejected() {
        let auction = active_auction();
        let late = auction.end_time + time::Duration::seconds(1);
        assert_eq!(
            auction.validate_bid("u-1", 50, late),
            Err(BidRejection::PastEndTime)
        );
    }

    #[test]
    fn seller_cannot_bid() {
        let auction = active_auction();
        let now = time::OffsetDateTime::UNIX_EPOCH;
        assert_eq!(
            auction.validate_bid("seller", 50, now),
            Err(BidRejection::OwnAuction)
        );
    }

    #[test]
    fn accepted_bids_keep_price_monotone_and_refund_previous_leader() {
        let mut auction = active_auction();
        let now = time::OffsetDateTime::UNIX_EPOCH;

        assert_eq!(auction.accept_bid("u-1", 11, now), None);
        assert_eq!(auction.current_price, 11);

        let outbid = auction.accept_bid("u-2", 20, now);
        assert_eq!(outbid, Some(("u-1".into(), 11)));
        assert_eq!(auction.current_price, 20);
        assert_eq!(auction.current_winner_id.as_deref(), Some("u-2"));
        assert!(auction.bids.0.windows(2).all(|w| w[0].amount < w[1].amount));
    }

    #[test]
    fn closing_status_depends_on_winner() {
        let mut auction = active_auction();
        assert_eq!(auction.closing_status(), AuctionStatus::Expired);
        auction.accept_bid("u-1", 11, time::OffsetDateTime::UNIX_EPOCH);
        assert_eq!(auction.closing_status(), AuctionStatus::Completed);
    }

    #[test]
    fn terminal_auction_rejects_bids() {
        let mut auction = active_auction();
        auction.status = AuctionStatus::Cancelled;
        assert_eq!(
            auction.validate_bid("u-1", 50, time::OffsetDateTime::UNIX_EPOCH),
            Err(BidRejection::NotActive)
        );
    }
}
