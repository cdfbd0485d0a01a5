//! Notifier processor.
//!
//! The Notifier is responsible for:
//! - Receiving event envelopes from its bus subscription
//! - Sending them as JSON POST requests to the configured bot gateway
//! - Retrying failed deliveries with exponential backoff
//!
//! Delivery is strictly best-effort: after the retry budget is exhausted
//! the envelope is dropped with an error log. Failures here never reach
//! the publisher of the event; the gateway is expected to reconcile from
//! its own state when it was unreachable.

use crate::events::EnvelopeReceiver;
use crate::utils::backoff::{retry_delay, with_jitter};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use yabot_sdk::events::EventEnvelope;

/// Delivery attempts per envelope before dropping it.
const MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// Errors that can occur during gateway delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("gateway delivery failed with status {status}")]
    DeliveryFailed { status: u16 },
}

/// Notifier handles pushing event envelopes to the bot gateway.
pub struct Notifier {
    gateway_url: String,
    events_rx: EnvelopeReceiver,
    shutdown_rx: watch::Receiver<bool>,
    http_client: reqwest::Client,
}

impl Notifier {
    pub fn new(
        gateway_url: String,
        events_rx: EnvelopeReceiver,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            gateway_url,
            events_rx,
            shutdown_rx,
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Run the Notifier.
    pub async fn run(mut self) {
        info!(gateway = %self.gateway_url, "Notifier started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Notifier received shutdown signal");
                        break;
                    }
                }

                Some(envelope) = self.events_rx.recv() => {
                    debug!(event_id = %envelope.event_id, "Received envelope for delivery");
                    self.deliver_with_retries(&envelope).await;
                }

                else => {
                    info!("Notifier envelope channel closed");
                    break;
                }
            }
        }

        info!("Notifier shutdown complete");
    }

    async fn deliver_with_retries(&self, envelope: &EventEnvelope) {
        for attempt in 0..MAX_DELIVERY_ATTEMPTS {
            match self.send(envelope).await {
                Ok(()) => {
                    debug!(
                        event_id = %envelope.event_id,
                        attempt,
                        "Envelope delivered to gateway"
                    );
                    return;
                }
                Err(e) => {
                    warn!(
                        event_id = %envelope.event_id,
                        attempt,
                        error = %e,
                        "Gateway delivery failed"
                    );
                    let delay = with_jitter(retry_delay(attempt), rand::random::<u64>());
                    tokio::time::sleep(delay).await;
                }
            }
        }
        error!(
            event_id = %envelope.event_id,
            kind = %envelope.kind(),
            attempts = MAX_DELIVERY_ATTEMPTS,
            "Dropping envelope after exhausting delivery attempts"
        );
    }

    async fn send(&self, envelope: &EventEnvelope) -> Result<(), NotifyError> {
        let response = self
            .http_client
            .post(&self.gateway_url)
            .header("Content-Type", "application/json")
            .json(envelope)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::DeliveryFailed {
                status: status.as_u16(),
            })
        }
    }
}
