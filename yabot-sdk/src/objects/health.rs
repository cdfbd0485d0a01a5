//! Health and metrics report types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of the event processor, served by the admin health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsHealthReport {
    /// Whether the processor is accepting events.
    pub active: bool,
    /// Number of event kinds with at least one registered handler.
    pub registered_kinds: usize,
    /// Current dead-letter queue depth.
    pub dead_letter_len: usize,
    /// Dead letters past the retry limit, retained for inspection.
    pub persistently_failed: usize,
    /// Current idempotency cache population.
    pub idempotency_cache_len: usize,
    /// Events fully processed since startup.
    pub processed_total: u64,
    /// Duplicate deliveries skipped by the idempotency cache.
    pub duplicates_skipped: u64,
    /// Handler failures routed to the dead-letter queue.
    pub failures_total: u64,
    /// Per-kind processed/failed counters, keyed by wire name.
    pub per_kind: BTreeMap<String, KindCounters>,
    /// Mean handler latency over the rolling window, in milliseconds.
    pub avg_processing_ms: f64,
    /// 95th percentile handler latency over the rolling window.
    pub p95_processing_ms: f64,
    /// 99th percentile handler latency over the rolling window.
    pub p99_processing_ms: f64,
}

/// Processed/failed counters for one event kind.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KindCounters {
    pub processed: u64,
    pub failed: u64,
}
