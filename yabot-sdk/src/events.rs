//! Event envelope and payload definitions.
//!
//! Every event in the system travels inside an [`EventEnvelope`]: a stable
//! wrapper carrying the event id, timestamp and correlation id. The payload
//! is a closed, adjacently-tagged enum (one variant per event type,
//! validated at construction) rather than a free-form map, so consumers
//! decode exactly the fields each event kind carries.
//!
//! Envelopes are immutable once published. Consumers must treat delivery as
//! at-least-once and deduplicate on `event_id`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::objects::gamification::{AuctionStatus, MissionKind, SubscriptionPlan, SubscriptionStatus};
use crate::objects::wallet::TransactionKind;

/// The set of event types known to the system.
///
/// The string form (used for broker topics and metrics keys) is the
/// snake_case name, matching the `event_type` tag on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BesitosAwarded,
    BesitosSpent,
    MissionAssigned,
    MissionCompleted,
    BadgeUnlocked,
    ItemAwarded,
    BidPlaced,
    AuctionClosed,
    TriviaAnswered,
    SubscriptionUpdated,
    EventProcessingFailed,
    ReactionDetected,
    DecisionMade,
    UserInteraction,
    DailyGiftClaimed,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [EventKind; 15] = [
        EventKind::BesitosAwarded,
        EventKind::BesitosSpent,
        EventKind::MissionAssigned,
        EventKind::MissionCompleted,
        EventKind::BadgeUnlocked,
        EventKind::ItemAwarded,
        EventKind::BidPlaced,
        EventKind::AuctionClosed,
        EventKind::TriviaAnswered,
        EventKind::SubscriptionUpdated,
        EventKind::EventProcessingFailed,
        EventKind::ReactionDetected,
        EventKind::DecisionMade,
        EventKind::UserInteraction,
        EventKind::DailyGiftClaimed,
    ];

    /// The wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BesitosAwarded => "besitos_awarded",
            EventKind::BesitosSpent => "besitos_spent",
            EventKind::MissionAssigned => "mission_assigned",
            EventKind::MissionCompleted => "mission_completed",
            EventKind::BadgeUnlocked => "badge_unlocked",
            EventKind::ItemAwarded => "item_awarded",
            EventKind::BidPlaced => "bid_placed",
            EventKind::AuctionClosed => "auction_closed",
            EventKind::TriviaAnswered => "trivia_answered",
            EventKind::SubscriptionUpdated => "subscription_updated",
            EventKind::EventProcessingFailed => "event_processing_failed",
            EventKind::ReactionDetected => "reaction_detected",
            EventKind::DecisionMade => "decision_made",
            EventKind::UserInteraction => "user_interaction",
            EventKind::DailyGiftClaimed => "daily_gift_claimed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed event payloads, adjacently tagged on the wire:
///
/// ```json
/// { "event_type": "besitos_awarded", "payload": { "user_id": "...", ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    /// Besitos were credited to a user's wallet.
    BesitosAwarded {
        user_id: String,
        amount: i64,
        balance_after: i64,
        kind: TransactionKind,
        reason: String,
        source: String,
    },
    /// Besitos were debited from a user's wallet.
    BesitosSpent {
        user_id: String,
        amount: i64,
        balance_after: i64,
        reason: String,
        item_id: Option<String>,
    },
    /// A mission was instantiated for a user.
    MissionAssigned {
        user_id: String,
        mission_id: Uuid,
        kind: MissionKind,
    },
    /// All objectives of a mission were completed and rewards distributed.
    MissionCompleted {
        user_id: String,
        mission_id: Uuid,
        kind: MissionKind,
        reward_besitos: i64,
    },
    /// An achievement crossed its target and unlocked.
    BadgeUnlocked {
        user_id: String,
        achievement_id: String,
        reward_besitos: i64,
    },
    /// An item was granted to a user's inventory.
    ItemAwarded {
        user_id: String,
        item_id: String,
        quantity: i64,
    },
    /// A bid was accepted on an auction.
    BidPlaced {
        auction_id: Uuid,
        bidder_id: String,
        amount: i64,
        previous_winner_id: Option<String>,
    },
    /// An auction reached a terminal state.
    AuctionClosed {
        auction_id: Uuid,
        status: AuctionStatus,
        winner_id: Option<String>,
        final_price: Option<i64>,
    },
    /// A participant answered a trivia question.
    TriviaAnswered {
        session_id: Uuid,
        user_id: String,
        correct: bool,
        points_awarded: i64,
    },
    /// A subscription transitioned between states.
    SubscriptionUpdated {
        user_id: String,
        plan: SubscriptionPlan,
        status: SubscriptionStatus,
    },
    /// A subscribed handler failed while processing an event.
    EventProcessingFailed {
        failed_event_id: Uuid,
        failed_event_type: String,
        error: String,
    },
    /// Inbound trigger: the user reacted to a channel message.
    ReactionDetected { user_id: String, message_id: String },
    /// Inbound trigger: the user made a narrative choice.
    DecisionMade { user_id: String, choice_id: String },
    /// Inbound trigger: any other tracked interaction.
    UserInteraction { user_id: String, interaction: String },
    /// The user claimed the daily gift.
    DailyGiftClaimed { user_id: String, amount: i64 },
}

impl EventPayload {
    /// The kind tag of this payload.
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::BesitosAwarded { .. } => EventKind::BesitosAwarded,
            EventPayload::BesitosSpent { .. } => EventKind::BesitosSpent,
            EventPayload::MissionAssigned { .. } => EventKind::MissionAssigned,
            EventPayload::MissionCompleted { .. } => EventKind::MissionCompleted,
            EventPayload::BadgeUnlocked { .. } => EventKind::BadgeUnlocked,
            EventPayload::ItemAwarded { .. } => EventKind::ItemAwarded,
            EventPayload::BidPlaced { .. } => EventKind::BidPlaced,
            EventPayload::AuctionClosed { .. } => EventKind::AuctionClosed,
            EventPayload::TriviaAnswered { .. } => EventKind::TriviaAnswered,
            EventPayload::SubscriptionUpdated { .. } => EventKind::SubscriptionUpdated,
            EventPayload::EventProcessingFailed { .. } => EventKind::EventProcessingFailed,
            EventPayload::ReactionDetected { .. } => EventKind::ReactionDetected,
            EventPayload::DecisionMade { .. } => EventKind::DecisionMade,
            EventPayload::UserInteraction { .. } => EventKind::UserInteraction,
            EventPayload::DailyGiftClaimed { .. } => EventKind::DailyGiftClaimed,
        }
    }

    /// The user this payload concerns, when it concerns one.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            EventPayload::BesitosAwarded { user_id, .. }
            | EventPayload::BesitosSpent { user_id, .. }
            | EventPayload::MissionAssigned { user_id, .. }
            | EventPayload::MissionCompleted { user_id, .. }
            | EventPayload::BadgeUnlocked { user_id, .. }
            | EventPayload::ItemAwarded { user_id, .. }
            | EventPayload::TriviaAnswered { user_id, .. }
            | EventPayload::SubscriptionUpdated { user_id, .. }
            | EventPayload::ReactionDetected { user_id, .. }
            | EventPayload::DecisionMade { user_id, .. }
            | EventPayload::UserInteraction { user_id, .. }
            | EventPayload::DailyGiftClaimed { user_id, .. } => Some(user_id),
            EventPayload::BidPlaced { bidder_id, .. } => Some(bidder_id),
            EventPayload::AuctionClosed { .. } | EventPayload::EventProcessingFailed { .. } => None,
        }
    }
}

/// The stable wrapper every published event travels in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique id; consumers deduplicate on it.
    pub event_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: time::OffsetDateTime,
    /// Correlates an event with the operation (or upstream event) that
    /// caused it.
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl EventEnvelope {
    /// Wrap a payload in a fresh envelope with its own correlation id.
    pub fn new(payload: EventPayload) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        Self::with_correlation(payload, correlation_id)
    }

    /// Wrap a payload, correlating it with an existing operation.
    pub fn with_correlation(payload: EventPayload, correlation_id: String) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: time::OffsetDateTime::now_utc(),
            correlation_id,
            user_id: payload.user_id().map(str::to_owned),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_with_tagged_payload() {
        let envelope = EventEnvelope::new(EventPayload::BesitosAwarded {
            user_id: "u-1".into(),
            amount: 50,
            balance_after: 50,
            kind: TransactionKind::Awarded,
            reason: "reaction".into(),
            source: "reaction_handler".into(),
        });

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event_type"], "besitos_awarded");
        assert_eq!(json["payload"]["amount"], 50);
        assert_eq!(json["user_id"], "u-1");

        let back: EventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
        assert_eq!(back.kind(), EventKind::BesitosAwarded);
    }

    #[test]
    fn envelope_user_id_follows_payload() {
        let closed = EventEnvelope::new(EventPayload::AuctionClosed {
            auction_id: Uuid::new_v4(),
            status: AuctionStatus::Expired,
            winner_id: None,
            final_price: None,
        });
        assert!(closed.user_id.is_none());

        let bid = EventEnvelope::new(EventPayload::BidPlaced {
            auction_id: Uuid::new_v4(),
            bidder_id: "u-2".into(),
            amount: 10,
            previous_winner_id: None,
        });
        assert_eq!(bid.user_id.as_deref(), Some("u-2"));
    }

    #[test]
    fn kind_wire_names_match_serde_tags() {
        for kind in EventKind::ALL {
            let tag = serde_json::to_value(kind).unwrap();
            assert_eq!(tag, kind.as_str());
        }
    }
}
