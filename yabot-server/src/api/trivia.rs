//! Trivia endpoints.

use super::{AdminAuth, ApiError};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub question: String,
    pub correct_answer: String,
    pub points: i64,
    #[serde(default)]
    pub max_participants: Option<i32>,
    pub duration_secs: i64,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub question: String,
    pub points: i64,
    pub end_time: i64,
}

/// `POST /trivia`
pub async fn open_session(
    _: AdminAuth,
    State(state): State<AppState>,
    Json(request): Json<OpenSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .trivia
        .open_session(
            &request.question,
            &request.correct_answer,
            request.points,
            request.max_participants,
            time::Duration::seconds(request.duration_secs.max(1)),
        )
        .await?;
    Ok(Json(SessionResponse {
        session_id: session.session_id,
        question: session.question,
        points: session.points,
        end_time: session.end_time.unix_timestamp(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub user_id: String,
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub correct: bool,
    pub session_full: bool,
}

/// `POST /trivia/{session_id}/answers`
pub async fn submit_answer(
    _: AdminAuth,
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let outcome = state
        .trivia
        .submit_answer(session_id, &request.user_id, &request.answer)
        .await?;
    Ok(Json(AnswerResponse {
        correct: outcome.correct,
        session_full: outcome.session_full,
    }))
}
