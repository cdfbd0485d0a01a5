//! API and DTO object definitions.
//!
//! These are the serde-only mirrors of the database-facing enums in
//! `yabot-core::entities`, plus the response bodies served by the HTTP
//! surface. Core converts between the two families with `From` impls so
//! wire compatibility never depends on `sqlx` attributes.

pub mod gamification;
pub mod health;
pub mod wallet;
