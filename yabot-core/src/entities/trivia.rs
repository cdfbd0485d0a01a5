use crate::entities::TriviaStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// One participant's answer record. The `completed` flag is what makes
/// answering idempotent: a second submission from the same user is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub answer: String,
    pub correct: bool,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub answered_at: time::OffsetDateTime,
}

/// Reasons an answer is not scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRejection {
    /// The session is closed (manually, by deadline, or by capacity).
    Closed,
    /// This user already answered.
    AlreadyAnswered,
}

/// Result of a scored answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// The session reached `max_participants` with this answer.
    pub session_full: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TriviaSession {
    pub session_id: Uuid,
    pub question: String,
    pub correct_answer: String,
    /// Besitos paid out per correct answer.
    pub points: i64,
    pub status: TriviaStatus,
    pub participants: Json<Vec<Participant>>,
    pub max_participants: Option<i32>,
    pub end_time: time::OffsetDateTime,
    pub created_at: time::OffsetDateTime,
}

impl TriviaSession {
    /// Score one answer. Pure; the caller persists the participant list,
    /// pays out through the wallet, and closes the session when full.
    pub fn record_answer(
        &mut self,
        user_id: &str,
        answer: &str,
        now: time::OffsetDateTime,
    ) -> Result<AnswerOutcome, AnswerRejection> {
        if self.status == TriviaStatus::Closed || now >= self.end_time {
            return Err(AnswerRejection::Closed);
        }
        if self
            .participants
            .0
            .iter()
            .any(|p| p.user_id == user_id && p.completed)
        {
            return Err(AnswerRejection::AlreadyAnswered);
        }

        let correct = answer.trim() == self.correct_answer;
        self.participants.0.push(Participant {
            user_id: user_id.to_owned(),
            answer: answer.to_owned(),
            correct,
            completed: true,
            answered_at: now,
        });

        let completed_count = self.participants.0.iter().filter(|p| p.completed).count();
        let session_full = self
            .max_participants
            .is_some_and(|max| completed_count >= max as usize);
        if session_full {
            self.status = TriviaStatus::Closed;
        }

        Ok(AnswerOutcome {
            correct,
            session_full,
        })
    }
}

const TRIVIA_COLUMNS: &str = "session_id, question, correct_answer, points, status, \
     participants, max_participants, end_time, created_at";

impl TriviaSession {
    pub async fn insert(&self, pool: &sqlx::PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO trivia_sessions
                (session_id, question, correct_answer, points, status,
                 participants, max_participants, end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(self.session_id)
        .bind(&self.question)
        .bind(&self.correct_answer)
        .bind(self.points)
        .bind(self.status)
        .bind(&self.participants)
        .bind(self.max_participants)
        .bind(self.end_time)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Row-locked fetch for answer submission and closing.
    pub async fn lock_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: Uuid,
    ) -> Result<Option<TriviaSession>, sqlx::Error> {
        sqlx::query_as::<_, TriviaSession>(&format!(
            "SELECT {TRIVIA_COLUMNS} FROM trivia_sessions WHERE session_id = $1 FOR UPDATE",
        ))
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Write back participants and status after a scored answer.
    pub async fn save_answer_state_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE trivia_sessions SET participants = $2, status = $3 WHERE session_id = $1",
        )
        .bind(self.session_id)
        .bind(&self.participants)
        .bind(self.status)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Close the session; the sweep and deadline paths both land here.
    pub async fn close(pool: &sqlx::PgPool, session_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE trivia_sessions SET status = 'closed' \
             WHERE session_id = $1 AND status = 'open'",
        )
        .bind(session_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, Copy)]
/// All open sessions, for deadline restoration at startup.
pub struct ListOpenSessions;

impl Processor<ListOpenSessions> for DatabaseProcessor {
    type Output = Vec<TriviaSession>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOpenSessions")]
    async fn process(&self, _query: ListOpenSessions) -> Result<Vec<TriviaSession>, sqlx::Error> {
        sqlx::query_as::<_, TriviaSession>(&format!(
            "SELECT {TRIVIA_COLUMNS} FROM trivia_sessions \
             WHERE status = 'open' ORDER BY end_time ASC",
        ))
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn open_session(max_participants: Option<i32>) -> TriviaSession {
        TriviaSession {
            session_id: Uuid::new_v4(),
            question: "capital of peru?".into(),
            correct_answer: "Lima".into(),
            points: 15,
            status: TriviaStatus::Open,
            participants: Json(vec![]),
            max_participants,
            end_time: time::OffsetDateTime::UNIX_EPOCH + time::Duration::minutes(10),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn exact_match_scores_correct() {
        let mut session = open_session(None);
        let now = time::OffsetDateTime::UNIX_EPOCH;
        let Ok(outcome) = session.record_answer("u-1", "Lima", now) else {
            panic!("answer rejected");
        };
        assert!(outcome.correct);

        let Ok(outcome) = session.record_answer("u-2", "lima", now) else {
            panic!("answer rejected");
        };
        assert!(!outcome.correct);
    }

    #[test]
    fn second_answer_from_same_user_is_rejected() {
        let mut session = open_session(None);
        let now = time::OffsetDateTime::UNIX_EPOCH;
        assert!(session.record_answer("u-1", "Lima", now).is_ok());
        assert_eq!(
            session.record_answer("u-1", "Lima", now),
            Err(AnswerRejection::AlreadyAnswered)
        );
        assert_eq!(session.participants.0.len(), 1);
    }

    #[test]
    fn session_closes_at_capacity() {
        let mut session = open_session(Some(2));
        let now = time::OffsetDateTime::UNIX_EPOCH;
        let Ok(first) = session.record_answer("u-1", "Cusco", now) else {
            panic!("answer rejected");
        };
        assert!(!first.session_full);

        let Ok(second) = session.record_answer("u-2", "Lima", now) else {
            panic!("answer rejected");
        };
        assert!(second.session_full);
        assert_eq!(session.status, TriviaStatus::Closed);
        assert_eq!(
            session.record_answer("u-3", "Lima", now),
            Err(AnswerRejection::Closed)
        );
    }

    #[test]
    fn answers_past_end_time_are_rejected() {
        let mut session = open_session(None);
        let late = session.end_time + time::Duration::seconds(1);
        assert_eq!(
            session.record_answer("u-1", "Lima", late),
            Err(AnswerRejection::Closed)
        );
    }
}
