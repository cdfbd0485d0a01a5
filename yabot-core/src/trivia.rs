//! The trivia engine.
//!
//! Sessions accept one answer per user; correct answers pay out the
//! session's points through the wallet in the same transaction that
//! records the answer. Sessions close at their deadline (restored on
//! restart like auctions), when the participant cap fills, or manually.

use crate::entities::TransactionKind;
use crate::entities::ledger::BesitosTransaction;
use crate::entities::trivia::{AnswerOutcome, AnswerRejection, ListOpenSessions, TriviaSession};
use crate::entities::TriviaStatus;
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
pub enum TriviaError {
    #[error("trivia session {0} not found")]
    NotFound(Uuid),

    #[error("trivia session {0} is closed")]
    Closed(Uuid),

    #[error("user already answered session {0}")]
    AlreadyAnswered(Uuid),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub struct TriviaEngine {
    pool: PgPool,
    bus: EventBus,
    deadlines: DeadlineHandle,
}

impl TriviaEngine {
    pub fn new(pool: PgPool, bus: EventBus, deadlines: DeadlineHandle) -> Self {
        Self {
            pool,
            bus,
            deadlines,
        }
    }

    /// Open a session and schedule its closing deadline.
    pub async fn open_session(
        &self,
        question: &str,
        correct_answer: &str,
        points: i64,
        max_participants: Option<i32>,
        duration: time::Duration,
    ) -> Result<TriviaSession, TriviaError> {
        let now = time::OffsetDateTime::now_utc();
        let session = TriviaSession {
            session_id: Uuid::new_v4(),
            question: question.to_owned(),
            correct_answer: correct_answer.to_owned(),
            points,
            status: TriviaStatus::Open,
            participants: Json(Vec::new()),
            max_participants,
            end_time: now + duration,
            created_at: now,
        };
        session.insert(&self.pool).await?;
        self.deadlines
            .schedule(DeadlineKind::Trivia, session.session_id, session.end_time)
            .await;
        info!(session_id = %session.session_id, points, "Trivia session opened");
        Ok(session)
    }

    /// Score one answer. Correct answers pay out atomically with the
    /// participant record; a second answer from the same user is rejected
    /// without touching anything.
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        user_id: &str,
        answer: &str,
    ) -> Result<AnswerOutcome, TriviaError> {
        let now = time::OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;
        let Some(mut session) = TriviaSession::lock_tx(&mut tx, session_id).await? else {
            return Err(TriviaError::NotFound(session_id));
        };

        let was_open = session.status == TriviaStatus::Open;
        let outcome = match session.record_answer(user_id, answer, now) {
            Ok(outcome) => outcome,
            Err(AnswerRejection::AlreadyAnswered) => {
                return Err(TriviaError::AlreadyAnswered(session_id));
            }
            Err(AnswerRejection::Closed) => {
                drop(tx);
                // Deadline passed but the timer never fired: close now.
                if was_open && now >= session.end_time {
                    self.close_session(session_id).await?;
                }
                return Err(TriviaError::Closed(session_id));
            }
        };

        let payout = if outcome.correct && session.points > 0 {
            Some(
                BesitosWallet::credit_in_tx(
                    &mut tx,
                    user_id,
                    TransactionKind::Awarded,
                    session.points,
                    "trivia_correct",
                    "trivia",
                    Some(session_id.to_string()),
                )
                .await?,
            )
        } else {
            None
        };
        session.save_answer_state_tx(&mut tx).await?;
        tx.commit().await?;

        if outcome.session_full {
            self.deadlines.cancel(session_id).await;
            info!(%session_id, "Trivia session filled and closed");
        }

        if let Some(entry) = &payout {
            self.publish_payout(entry).await;
        }
        self.bus
            .publish(EventEnvelope::new(EventPayload::TriviaAnswered {
                session_id,
                user_id: user_id.to_owned(),
                correct: outcome.correct,
                points_awarded: payout.map_or(0, |entry| entry.amount),
            }))
            .await;
        Ok(outcome)
    }

    /// Close a session (deadline, manual). Idempotent.
    pub async fn close_session(&self, session_id: Uuid) -> Result<bool, TriviaError> {
        let closed = TriviaSession::close(&self.pool, session_id).await?;
        if closed {
            self.deadlines.cancel(session_id).await;
            info!(%session_id, "Trivia session closed");
        }
        Ok(closed)
    }

    /// Re-schedule deadlines for every open session after a restart.
    pub async fn restore_deadlines(&self) -> Result<usize, TriviaError> {
        let db = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        let open = db.process(ListOpenSessions).await?;
        let now = time::OffsetDateTime::now_utc();
        let mut restored = 0;
        for session in open {
            if session.end_time <= now {
                self.close_session(session.session_id).await?;
            } else {
                self.deadlines
                    .schedule(DeadlineKind::Trivia, session.session_id, session.end_time)
                    .await;
                restored += 1;
            }
        }
        info!(restored, "Trivia deadlines restored");
        Ok(restored)
    }

    async fn publish_payout(&self, entry: &BesitosTransaction) {
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
}
