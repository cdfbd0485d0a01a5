//! The event bus: topic-keyed publish/subscribe with broker fallback.
//!
//! Publishers never fail because of delivery problems. A publish always
//! reaches the in-process subscribers; the broker leg is attempted when the
//! transport reports itself connected, and buffered into a bounded local
//! queue otherwise. The queue is drained on the next publish after the
//! broker comes back (or explicitly via [`EventBus::flush_fallback`]).

use crate::events::channels::{envelope_channel, EnvelopeReceiver, EnvelopeSender};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};
use yabot_sdk::events::{EventEnvelope, EventKind};

/// Maximum envelopes buffered while the broker is unreachable.
/// Oldest entries are dropped on overflow.
pub const FALLBACK_QUEUE_CAPACITY: usize = 1024;

/// Errors surfaced by a broker transport.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The transport is not currently connected.
    #[error("broker disconnected")]
    Disconnected,
    /// The transport failed to hand off the message.
    #[error("broker transport error: {0}")]
    Transport(String),
}

/// The external pub/sub collaborator.
///
/// Implementations must signal failure promptly rather than blocking
/// indefinitely; the bus treats any error as "buffer locally and move on".
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;
    fn is_connected(&self) -> bool;
}

/// In-process broker: a broadcast relay standing in for an external broker
/// in tests and single-node deployments.
pub struct InProcessBroker {
    relay: broadcast::Sender<(String, Vec<u8>)>,
    connected: AtomicBool,
}

impl InProcessBroker {
    pub fn new() -> Self {
        let (relay, _) = broadcast::channel(crate::events::DEFAULT_CHANNEL_BUFFER);
        Self {
            relay,
            connected: AtomicBool::new(true),
        }
    }

    /// Raw subscription to everything relayed through this broker.
    pub fn subscribe_raw(&self) -> broadcast::Receiver<(String, Vec<u8>)> {
        self.relay.subscribe()
    }

    /// Simulate losing or regaining the broker connection.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }
}

impl Default for InProcessBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerTransport for InProcessBroker {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::Disconnected);
        }
        // A send error only means nobody is subscribed, which is fine.
        let _ = self.relay.send((topic.to_owned(), payload.to_vec()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

struct BusInner {
    broker: Arc<dyn BrokerTransport>,
    subscribers: RwLock<HashMap<EventKind, Vec<EnvelopeSender>>>,
    all_subscribers: RwLock<Vec<EnvelopeSender>>,
    fallback: Mutex<VecDeque<EventEnvelope>>,
    dropped: AtomicU64,
}

/// Cloneable handle to the bus. Cheap to pass around; everything is
/// behind one `Arc`.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(broker: Arc<dyn BrokerTransport>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                broker,
                subscribers: RwLock::new(HashMap::new()),
                all_subscribers: RwLock::new(Vec::new()),
                fallback: Mutex::new(VecDeque::new()),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Whether the broker transport is reachable. Local delivery works
    /// either way.
    pub fn is_connected(&self) -> bool {
        self.inner.broker.is_connected()
    }

    /// Envelopes dropped from full or closed subscriber channels.
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Subscribe to one event kind. Every subscriber receives every
    /// envelope of that kind.
    pub async fn subscribe(&self, kind: EventKind) -> EnvelopeReceiver {
        let (tx, rx) = envelope_channel();
        self.inner
            .subscribers
            .write()
            .await
            .entry(kind)
            .or_default()
            .push(tx);
        rx
    }

    /// Subscribe to every event kind on one channel.
    pub async fn subscribe_all(&self) -> EnvelopeReceiver {
        let (tx, rx) = envelope_channel();
        self.inner.all_subscribers.write().await.push(tx);
        rx
    }

    /// Publish an envelope. Never fails: broker problems buffer into the
    /// fallback queue, slow or dead local subscribers are skipped and
    /// counted.
    pub async fn publish(&self, envelope: EventEnvelope) {
        self.publish_to_broker(&envelope).await;
        self.deliver_local(envelope).await;
    }

    /// Drain the fallback queue to the broker. Returns how many envelopes
    /// were flushed; stops early if the broker drops again mid-drain.
    pub async fn flush_fallback(&self) -> usize {
        let mut flushed = 0;
        loop {
            if !self.inner.broker.is_connected() {
                return flushed;
            }
            let Some(envelope) = self.inner.fallback.lock().await.pop_front() else {
                return flushed;
            };
            let topic = envelope.kind().as_str();
            match serde_json::to_vec(&envelope) {
                Ok(bytes) => {
                    if let Err(e) = self.inner.broker.publish(topic, &bytes).await {
                        warn!(error = %e, "Broker dropped during fallback flush, re-buffering");
                        self.buffer_fallback(envelope).await;
                        return flushed;
                    }
                    flushed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to serialize buffered envelope, discarding");
                }
            }
        }
    }

    async fn publish_to_broker(&self, envelope: &EventEnvelope) {
        if !self.inner.broker.is_connected() {
            debug!(
                event_id = %envelope.event_id,
                kind = %envelope.kind(),
                "Broker unreachable, buffering envelope locally"
            );
            self.buffer_fallback(envelope.clone()).await;
            return;
        }

        // Opportunistically drain anything buffered while we were offline.
        let flushed = self.flush_fallback().await;
        if flushed > 0 {
            debug!(flushed, "Flushed fallback queue after broker reconnect");
        }

        let bytes = match serde_json::to_vec(envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to serialize envelope for broker");
                return;
            }
        };
        if let Err(e) = self
            .inner
            .broker
            .publish(envelope.kind().as_str(), &bytes)
            .await
        {
            warn!(
                event_id = %envelope.event_id,
                error = %e,
                "Broker publish failed, buffering envelope locally"
            );
            self.buffer_fallback(envelope.clone()).await;
        }
    }

    async fn buffer_fallback(&self, envelope: EventEnvelope) {
        let mut fallback = self.inner.fallback.lock().await;
        if fallback.len() >= FALLBACK_QUEUE_CAPACITY {
            fallback.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        fallback.push_back(envelope);
    }

    async fn deliver_local(&self, envelope: EventEnvelope) {
        let kind = envelope.kind();

        {
            let mut subscribers = self.inner.subscribers.write().await;
            if let Some(senders) = subscribers.get_mut(&kind) {
                Self::fan_out(senders, &envelope, &self.inner.dropped);
            }
        }
        {
            let mut all = self.inner.all_subscribers.write().await;
            Self::fan_out(&mut all, &envelope, &self.inner.dropped);
        }
    }

    fn fan_out(senders: &mut Vec<EnvelopeSender>, envelope: &EventEnvelope, dropped: &AtomicU64) {
        senders.retain(|sender| match sender.try_send(envelope.clone()) {
            Ok(()) => true,
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    event_id = %envelope.event_id,
                    kind = %envelope.kind(),
                    "Subscriber channel full, dropping envelope for that subscriber"
                );
                true
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                debug!(kind = %envelope.kind(), "Pruning closed subscriber channel");
                false
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use yabot_sdk::events::EventPayload;

    fn gift_envelope(user: &str) -> EventEnvelope {
        EventEnvelope::new(EventPayload::DailyGiftClaimed {
            user_id: user.into(),
            amount: 10,
        })
    }

    #[tokio::test]
    async fn subscribers_of_a_kind_all_receive_the_envelope() {
        let bus = EventBus::new(Arc::new(InProcessBroker::new()));
        let mut first = bus.subscribe(EventKind::DailyGiftClaimed).await;
        let mut second = bus.subscribe(EventKind::DailyGiftClaimed).await;

        let envelope = gift_envelope("u-1");
        bus.publish(envelope.clone()).await;

        assert_eq!(first.recv().await.as_ref(), Some(&envelope));
        assert_eq!(second.recv().await.as_ref(), Some(&envelope));
    }

    #[tokio::test]
    async fn unrelated_kind_subscribers_see_nothing() {
        let bus = EventBus::new(Arc::new(InProcessBroker::new()));
        let mut other = bus.subscribe(EventKind::BidPlaced).await;

        bus.publish(gift_envelope("u-1")).await;

        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn broker_outage_buffers_and_reconnect_flushes() {
        let broker = Arc::new(InProcessBroker::new());
        let bus = EventBus::new(broker.clone());
        let mut raw = broker.subscribe_raw();

        broker.set_connected(false);
        assert!(!bus.is_connected());
        bus.publish(gift_envelope("u-1")).await;
        bus.publish(gift_envelope("u-2")).await;
        assert!(raw.try_recv().is_err());

        broker.set_connected(true);
        assert_eq!(bus.flush_fallback().await, 2);
        let Ok((topic, _)) = raw.try_recv() else {
            panic!("expected flushed envelope on broker relay");
        };
        assert_eq!(topic, "daily_gift_claimed");
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let bus = EventBus::new(Arc::new(InProcessBroker::new()));
        let rx = bus.subscribe_all().await;
        drop(rx);

        // First publish notices the closed channel and prunes it.
        bus.publish(gift_envelope("u-1")).await;
        bus.publish(gift_envelope("u-2")).await;
        assert_eq!(bus.inner.all_subscribers.read().await.len(), 0);
    }
}
