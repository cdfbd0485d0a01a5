#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod achievements;
pub mod auctions;
pub mod config;
pub mod cross_module;
pub mod entities;
pub mod events;
pub mod framework;
pub mod missions;
pub mod processors;
pub mod store;
pub mod subscriptions;
pub mod trivia;
pub mod utils;
pub mod wallet;
