//! Background processors.
//!
//! Each processor is a long-running task with a `run()` select loop and a
//! `watch`-based shutdown signal:
//!
//! - [`EventProcessor`]: at-least-once event dispatch with idempotency,
//!   dead letters and retry.
//! - [`DeadlineScheduler`]: per-entity sleep-until tasks for auction and
//!   trivia deadlines, restorable from persisted end times.
//! - [`ExpirySweeper`]: periodic reconciliation of mission and
//!   subscription expiry.
//! - [`Notifier`]: posts envelopes to the bot gateway with backoff.

pub mod deadline_scheduler;
pub mod event_processor;
pub mod expiry_sweeper;
pub mod notifier;

pub use deadline_scheduler::{DeadlineElapsed, DeadlineHandle, DeadlineKind, DeadlineScheduler};
pub use event_processor::{
    DefaultHandlers, EventHandler, EventProcessor, HandlerError, IdempotencyCache,
};
pub use expiry_sweeper::ExpirySweeper;
pub use notifier::Notifier;
