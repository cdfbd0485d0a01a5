//! Event system for the event-driven architecture.
//!
//! Every domain mutation that other modules care about is announced as an
//! [`EventEnvelope`] published on the [`EventBus`]. The bus fans envelopes
//! out to in-process subscribers (the event processor, the notifier) and to
//! an external broker transport when one is connected; with the broker down
//! it buffers into a bounded local queue instead of failing the publisher.
//!
//! Envelope and payload types live in `yabot-sdk` so external consumers
//! share the exact wire shapes.

pub mod bus;
pub mod channels;

pub use bus::{BrokerError, BrokerTransport, EventBus, InProcessBroker};
pub use channels::{envelope_channel, EnvelopeReceiver, EnvelopeSender, DEFAULT_CHANNEL_BUFFER};

pub use yabot_sdk::events::{EventEnvelope, EventKind, EventPayload};
