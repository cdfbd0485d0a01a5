//! HTTP API: admin-gated command endpoints for the bot gateway.
//!
//! The bot frontend is the only intended caller; every non-health route
//! requires the admin secret in the `X-Yabot-Admin-Secret` header,
//! verified against the argon2 hash from the config file.

pub mod achievements;
pub mod auctions;
pub mod commands;
pub mod store;
pub mod subscriptions;
pub mod trivia;
pub mod wallet;

use crate::state::AppState;
use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use yabot_core::achievements::AchievementError;
use yabot_core::auctions::AuctionError;
use yabot_core::cross_module::CrossModuleError;
use yabot_core::store::StoreError;
use yabot_core::subscriptions::SubscriptionError;
use yabot_core::trivia::TriviaError;
use yabot_core::wallet::WalletError;

/// Header carrying the admin secret.
pub const ADMIN_SECRET_HEADER: &str = "X-Yabot-Admin-Secret";

/// Extractor that authenticates the caller as the bot gateway.
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(presented) = parts
            .headers
            .get(ADMIN_SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
        else {
            return Err(ApiError::unauthorized("missing admin secret"));
        };

        let admin = state.config.admin.read().await;
        if admin.verify_secret(presented) {
            Ok(AdminAuth)
        } else {
            Err(ApiError::unauthorized("invalid admin secret"))
        }
    }
}

/// Uniform JSON error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.to_owned(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.to_owned(),
        }
    }

    fn new(status: StatusCode, message: String) -> Self {
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<WalletError> for ApiError {
    fn from(error: WalletError) -> Self {
        let status = match &error {
            WalletError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            WalletError::InsufficientFunds { .. } => StatusCode::CONFLICT,
            WalletError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<CrossModuleError> for ApiError {
    fn from(error: CrossModuleError) -> Self {
        match error {
            CrossModuleError::CooldownActive => {
                Self::new(StatusCode::CONFLICT, error.to_string())
            }
            CrossModuleError::Wallet(e) => e.into(),
            CrossModuleError::Storage(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ItemNotFound(_) => Self::new(StatusCode::NOT_FOUND, error.to_string()),
            StoreError::ItemDisabled(_) | StoreError::InvalidQuantity(_) => {
                Self::new(StatusCode::BAD_REQUEST, error.to_string())
            }
            StoreError::Wallet(e) => e.into(),
            StoreError::Storage(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        }
    }
}

impl From<AuctionError> for ApiError {
    fn from(error: AuctionError) -> Self {
        let status = match &error {
            AuctionError::NotFound(_) => StatusCode::NOT_FOUND,
            AuctionError::Expired(_) | AuctionError::NotActive(_) => StatusCode::GONE,
            AuctionError::BidTooLow { .. } | AuctionError::OwnAuction => StatusCode::BAD_REQUEST,
            AuctionError::Wallet(WalletError::InsufficientFunds { .. }) => StatusCode::CONFLICT,
            AuctionError::Wallet(_) | AuctionError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}

impl From<TriviaError> for ApiError {
    fn from(error: TriviaError) -> Self {
        let status = match &error {
            TriviaError::NotFound(_) => StatusCode::NOT_FOUND,
            TriviaError::Closed(_) => StatusCode::GONE,
            TriviaError::AlreadyAnswered(_) => StatusCode::CONFLICT,
            TriviaError::Wallet(_) | TriviaError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(error: SubscriptionError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl From<AchievementError> for ApiError {
    fn from(error: AchievementError) -> Self {
        let status = match &error {
            AchievementError::Unknown(_) => StatusCode::NOT_FOUND,
            AchievementError::Wallet(_) | AchievementError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}
