#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Wire-level objects for YABOT.
//!
//! This crate defines the event envelope and the closed set of typed event
//! payloads exchanged between the backend and external consumers (the bot
//! frontend, notification gateways, future broker transports), plus the
//! API/DTO mirror types used by the HTTP surface.
//!
//! It deliberately has no knowledge of the database or the runtime: only
//! serde-serializable data.

pub mod events;
pub mod objects;
