//! Event channel factories and handles.
//!
//! Provides the envelope channel used for in-process event delivery, with a
//! buffer size that absorbs bursts while keeping memory bounded.

use tokio::sync::mpsc;
use yabot_sdk::events::EventEnvelope;

/// Default buffer size for event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for event envelopes.
pub type EnvelopeSender = mpsc::Sender<EventEnvelope>;
/// Receiver handle for event envelopes.
pub type EnvelopeReceiver = mpsc::Receiver<EventEnvelope>;

/// Create a new envelope channel.
///
/// Returns a (sender, receiver) pair. Multiple senders can be cloned from
/// the returned sender; each subscriber owns its own receiver.
pub fn envelope_channel() -> (EnvelopeSender, EnvelopeReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
