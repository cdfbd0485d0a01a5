//! The event processor: reliable at-least-once event handling.
//!
//! The processor consumes the bus's envelope stream and dispatches each
//! envelope to the handlers registered for its kind. Reliability mechanics:
//!
//! - **Idempotency**: a bounded, TTL'd cache of processed event ids skips
//!   duplicate deliveries without re-running side effects.
//! - **Dead letters**: a failing handler routes the envelope plus the error
//!   into a bounded dead-letter queue; retries use exponential backoff and
//!   entries past the attempt budget are retained for inspection, never
//!   silently dropped.
//! - **Metrics**: per-kind counters and a rolling window of processing
//!   durations back the health report.
//!
//! All mutable state lives in one owned [`ProcessorState`] behind a mutex,
//! so the processor is safe under real parallelism, not just cooperative
//! scheduling.

use crate::achievements::AchievementSystem;
use crate::entities::mission::ObjectiveTrigger;
use crate::events::{EnvelopeReceiver, EventBus};
use crate::missions::MissionManager;
use crate::utils::backoff::{retry_delay, with_jitter};
use futures_util::future::BoxFuture;
use itertools::Itertools;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use yabot_sdk::events::{EventEnvelope, EventKind, EventPayload};
use yabot_sdk::objects::health::{EventsHealthReport, KindCounters};

/// Maximum event ids remembered for duplicate suppression.
pub const IDEMPOTENCY_CACHE_CAPACITY: usize = 10_000;
/// How long a processed event id stays in the cache.
pub const IDEMPOTENCY_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
/// Maximum dead letters retained; oldest are dropped on overflow.
pub const DEAD_LETTER_CAPACITY: usize = 1_000;
/// Rolling window of processing durations for the health report.
pub const PROCESSING_WINDOW: usize = 1_000;
/// Retry budget before a dead letter is flagged persistently failed.
pub const MAX_DEAD_LETTER_ATTEMPTS: u32 = 5;
/// Bounded wait for in-flight handlers during shutdown.
pub const STOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type handlers report back to the processor.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A registered event handler: an async callable owning its captures.
pub type EventHandler =
    Arc<dyn Fn(EventEnvelope) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Bounded, TTL'd set of already-processed event ids.
///
/// Insertion order doubles as eviction order: entries expire by TTL and,
/// when the cache is full, the oldest entry is evicted first.
pub struct IdempotencyCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<Uuid, Instant>,
    order: VecDeque<(Uuid, Instant)>,
}

impl IdempotencyCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Record `id` at `now`. Returns `false` when the id was already
    /// present and unexpired (a duplicate delivery).
    pub fn check_and_insert(&mut self, id: Uuid, now: Instant) -> bool {
        self.prune(now);
        if self.entries.contains_key(&id) {
            return false;
        }
        if self.entries.len() >= self.capacity {
            if let Some((oldest, _)) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(id, now);
        self.order.push_back((id, now));
        true
    }

    fn prune(&mut self, now: Instant) {
        while let Some((id, inserted)) = self.order.front().copied() {
            if now.duration_since(inserted) < self.ttl {
                break;
            }
            self.order.pop_front();
            self.entries.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One failed event awaiting retry (or inspection, once past the budget).
pub struct DeadLetter {
    pub envelope: EventEnvelope,
    pub error: String,
    pub retry_count: u32,
    pub first_failed_at: time::OffsetDateTime,
    pub persistently_failed: bool,
    last_attempt: Instant,
}

impl DeadLetter {
    /// Whether the backoff delay for the current attempt has elapsed.
    /// The ±10% jitter is derived from the event id so the due time is
    /// stable across queue scans.
    fn is_due(&self, now: Instant) -> bool {
        if self.persistently_failed {
            return false;
        }
        let salt = self.envelope.event_id.as_u128() as u64;
        let delay = with_jitter(retry_delay(self.retry_count), salt);
        now.duration_since(self.last_attempt) >= delay
    }
}

/// All mutable processor state, owned and mutex-guarded.
struct ProcessorState {
    active: bool,
    cache: IdempotencyCache,
    dead_letters: VecDeque<DeadLetter>,
    in_flight: HashSet<Uuid>,
    durations: VecDeque<Duration>,
    per_kind: HashMap<EventKind, KindCounters>,
    processed_total: u64,
    duplicates_skipped: u64,
    failures_total: u64,
}

impl ProcessorState {
    fn new() -> Self {
        Self {
            active: false,
            cache: IdempotencyCache::new(IDEMPOTENCY_CACHE_CAPACITY, IDEMPOTENCY_CACHE_TTL),
            dead_letters: VecDeque::new(),
            in_flight: HashSet::new(),
            durations: VecDeque::new(),
            per_kind: HashMap::new(),
            processed_total: 0,
            duplicates_skipped: 0,
            failures_total: 0,
        }
    }

    fn push_dead_letter(&mut self, envelope: EventEnvelope, error: String) {
        if self.dead_letters.len() >= DEAD_LETTER_CAPACITY {
            if let Some(dropped) = self.dead_letters.pop_front() {
                warn!(
                    event_id = %dropped.envelope.event_id,
                    "Dead-letter queue full, dropping oldest entry"
                );
            }
        }
        self.dead_letters.push_back(DeadLetter {
            envelope,
            error,
            retry_count: 0,
            first_failed_at: time::OffsetDateTime::now_utc(),
            persistently_failed: false,
            last_attempt: Instant::now(),
        });
    }

    fn record_duration(&mut self, elapsed: Duration) {
        if self.durations.len() >= PROCESSING_WINDOW {
            self.durations.pop_front();
        }
        self.durations.push_back(elapsed);
    }
}

/// Collaborators wired into the default handler set.
pub struct DefaultHandlers {
    pub missions: Arc<MissionManager>,
    pub achievements: Arc<AchievementSystem>,
}

/// The at-least-once event consumer.
pub struct EventProcessor {
    bus: EventBus,
    handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
    state: Mutex<ProcessorState>,
}

impl EventProcessor {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            handlers: RwLock::new(HashMap::new()),
            state: Mutex::new(ProcessorState::new()),
        }
    }

    /// Append a handler for `kind`. Registration never replaces existing
    /// handlers; all of them run for each envelope.
    pub async fn register_handler(&self, kind: EventKind, handler: EventHandler) {
        self.handlers
            .write()
            .await
            .entry(kind)
            .or_default()
            .push(handler);
    }

    /// Install the default domain handlers and mark the processor active.
    pub async fn start_processing(&self, defaults: DefaultHandlers) {
        let triggers = [
            (EventKind::ReactionDetected, ObjectiveTrigger::Reaction),
            (EventKind::DecisionMade, ObjectiveTrigger::Decision),
            (EventKind::UserInteraction, ObjectiveTrigger::Interaction),
            (EventKind::DailyGiftClaimed, ObjectiveTrigger::DailyClaim),
        ];
        for (kind, trigger) in triggers {
            let missions = Arc::clone(&defaults.missions);
            self.register_handler(
                kind,
                Arc::new(move |envelope| {
                    let missions = Arc::clone(&missions);
                    Box::pin(async move {
                        if let Some(user_id) = envelope.user_id.as_deref() {
                            missions.handle_interaction(user_id, trigger).await?;
                        }
                        Ok(())
                    })
                }),
            )
            .await;
        }

        let achievements = Arc::clone(&defaults.achievements);
        self.register_handler(
            EventKind::MissionCompleted,
            Arc::new(move |envelope| {
                let achievements = Arc::clone(&achievements);
                Box::pin(async move {
                    if let EventPayload::MissionCompleted { user_id, .. } = &envelope.payload {
                        achievements.on_mission_completed(user_id).await?;
                    }
                    Ok(())
                })
            }),
        )
        .await;

        let achievements = Arc::clone(&defaults.achievements);
        self.register_handler(
            EventKind::BesitosAwarded,
            Arc::new(move |envelope| {
                let achievements = Arc::clone(&achievements);
                Box::pin(async move {
                    if let EventPayload::BesitosAwarded {
                        user_id, amount, ..
                    } = &envelope.payload
                    {
                        achievements.on_besitos_collected(user_id, *amount).await?;
                    }
                    Ok(())
                })
            }),
        )
        .await;

        self.state.lock().await.active = true;
        info!("EventProcessor default handlers installed, processing active");
    }

    /// Mark the processor active without installing defaults (tests,
    /// custom wiring).
    pub async fn activate(&self) {
        self.state.lock().await.active = true;
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.active
    }

    /// Consume envelopes until shutdown. Dead-letter retries piggyback on
    /// a ten-second tick.
    pub async fn run(
        self: Arc<Self>,
        mut rx: EnvelopeReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("EventProcessor started");
        let mut retry_tick = tokio::time::interval(Duration::from_secs(10));
        retry_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("EventProcessor received shutdown signal");
                        break;
                    }
                }

                Some(envelope) = rx.recv() => {
                    self.process_event(envelope).await;
                }

                _ = retry_tick.tick() => {
                    let recovered = self.retry_dead_letter_queue().await;
                    if recovered > 0 {
                        info!(recovered, "Dead-letter retries succeeded");
                    }
                }

                else => {
                    info!("Envelope channel closed");
                    break;
                }
            }
        }

        self.stop_processing().await;
        info!("EventProcessor shutdown complete");
    }

    /// Dispatch one envelope through the registered handlers.
    pub async fn process_event(&self, envelope: EventEnvelope) {
        let kind = envelope.kind();
        {
            let mut state = self.state.lock().await;
            if !state.active {
                debug!(event_id = %envelope.event_id, "Processor inactive, skipping envelope");
                return;
            }
            if !state.cache.check_and_insert(envelope.event_id, Instant::now()) {
                state.duplicates_skipped += 1;
                debug!(
                    event_id = %envelope.event_id,
                    kind = %kind,
                    "Duplicate delivery skipped"
                );
                return;
            }
            state.in_flight.insert(envelope.event_id);
        }

        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let started = Instant::now();
        let mut failure: Option<String> = None;
        for handler in &handlers {
            if let Err(e) = handler(envelope.clone()).await {
                error!(
                    event_id = %envelope.event_id,
                    kind = %kind,
                    error = %e,
                    "Event handler failed"
                );
                failure.get_or_insert(e.to_string());
            }
        }
        let elapsed = started.elapsed();

        let failed = {
            let mut state = self.state.lock().await;
            state.in_flight.remove(&envelope.event_id);
            state.record_duration(elapsed);
            match failure {
                Some(error) => {
                    state.per_kind.entry(kind).or_default().failed += 1;
                    state.failures_total += 1;
                    state.push_dead_letter(envelope.clone(), error.clone());
                    Some(error)
                }
                None => {
                    state.per_kind.entry(kind).or_default().processed += 1;
                    state.processed_total += 1;
                    None
                }
            }
        };

        // Secondary failure event, best-effort. Never emitted for a failed
        // processing-failed envelope, which would loop.
        if let Some(error) = failed {
            if kind != EventKind::EventProcessingFailed {
                self.bus
                    .publish(EventEnvelope::with_correlation(
                        EventPayload::EventProcessingFailed {
                            failed_event_id: envelope.event_id,
                            failed_event_type: kind.as_str().to_owned(),
                            error,
                        },
                        envelope.correlation_id.clone(),
                    ))
                    .await;
            }
        }
    }

    /// Scan the dead-letter queue and re-invoke the first registered
    /// handler for each due entry. Returns how many entries recovered.
    pub async fn retry_dead_letter_queue(&self) -> usize {
        let now = Instant::now();
        let due: Vec<EventEnvelope> = {
            let state = self.state.lock().await;
            state
                .dead_letters
                .iter()
                .filter(|entry| entry.is_due(now))
                .map(|entry| entry.envelope.clone())
                .collect()
        };

        let mut recovered = 0;
        for envelope in due {
            let handler = self
                .handlers
                .read()
                .await
                .get(&envelope.kind())
                .and_then(|handlers| handlers.first().cloned());

            let result = match handler {
                Some(handler) => handler(envelope.clone()).await,
                None => Err(HandlerError::from("no handler registered")),
            };

            let mut state = self.state.lock().await;
            let Some(position) = state
                .dead_letters
                .iter()
                .position(|entry| entry.envelope.event_id == envelope.event_id)
            else {
                continue;
            };
            match result {
                Ok(()) => {
                    state.dead_letters.remove(position);
                    recovered += 1;
                    info!(
                        event_id = %envelope.event_id,
                        kind = %envelope.kind(),
                        "Dead-letter retry succeeded"
                    );
                }
                Err(e) => {
                    let entry = &mut state.dead_letters[position];
                    entry.retry_count += 1;
                    entry.last_attempt = Instant::now();
                    entry.error = e.to_string();
                    if entry.retry_count > MAX_DEAD_LETTER_ATTEMPTS {
                        entry.persistently_failed = true;
                        warn!(
                            event_id = %envelope.event_id,
                            retry_count = entry.retry_count,
                            "Dead letter exceeded retry budget, retained for inspection"
                        );
                    }
                }
            }
        }
        recovered
    }

    /// Mark the processor inactive and wait (bounded) for in-flight
    /// handlers to finish.
    pub async fn stop_processing(&self) {
        {
            let mut state = self.state.lock().await;
            if !state.active {
                return;
            }
            state.active = false;
        }

        let drained = tokio::time::timeout(STOP_DRAIN_TIMEOUT, async {
            loop {
                if self.state.lock().await.in_flight.is_empty() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => info!("EventProcessor stopped, no handlers in flight"),
            Err(_) => warn!(
                timeout_secs = STOP_DRAIN_TIMEOUT.as_secs(),
                "Timed out waiting for in-flight event handlers"
            ),
        }
    }

    /// Snapshot of processing state and latency percentiles.
    pub async fn health_check(&self) -> EventsHealthReport {
        let registered_kinds = self.handlers.read().await.len();
        let state = self.state.lock().await;

        let sorted: Vec<Duration> = state.durations.iter().copied().sorted().collect();
        let per_kind: BTreeMap<String, KindCounters> = state
            .per_kind
            .iter()
            .map(|(kind, counters)| (kind.as_str().to_owned(), *counters))
            .collect();

        EventsHealthReport {
            active: state.active,
            registered_kinds,
            dead_letter_len: state.dead_letters.len(),
            persistently_failed: state
                .dead_letters
                .iter()
                .filter(|entry| entry.persistently_failed)
                .count(),
            idempotency_cache_len: state.cache.len(),
            processed_total: state.processed_total,
            duplicates_skipped: state.duplicates_skipped,
            failures_total: state.failures_total,
            per_kind,
            avg_processing_ms: average_ms(&sorted),
            p95_processing_ms: percentile_ms(&sorted, 0.95),
            p99_processing_ms: percentile_ms(&sorted, 0.99),
        }
    }

    /// Dead-letter retry counts, oldest first (observability/tests).
    pub async fn dead_letter_retry_counts(&self) -> Vec<(Uuid, u32, bool)> {
        self.state
            .lock()
            .await
            .dead_letters
            .iter()
            .map(|entry| {
                (
                    entry.envelope.event_id,
                    entry.retry_count,
                    entry.persistently_failed,
                )
            })
            .collect()
    }
}

fn average_ms(sorted: &[Duration]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let total: Duration = sorted.iter().sum();
    total.as_secs_f64() * 1000.0 / sorted.len() as f64
}

fn percentile_ms(sorted: &[Duration], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() - 1) as f64 * quantile).round() as usize;
    sorted[index].as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, InProcessBroker};
    use std::sync::atomic::{AtomicU64, Ordering};

    fn test_processor() -> Arc<EventProcessor> {
        let bus = EventBus::new(Arc::new(InProcessBroker::new()));
        Arc::new(EventProcessor::new(bus))
    }

    fn reaction_envelope() -> EventEnvelope {
        EventEnvelope::new(EventPayload::ReactionDetected {
            user_id: "u-1".into(),
            message_id: "m-1".into(),
        })
    }

    #[tokio::test]
    async fn duplicate_delivery_runs_side_effects_once() {
        let processor = test_processor();
        processor.activate().await;

        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        processor
            .register_handler(
                EventKind::ReactionDetected,
                Arc::new(move |_| {
                    let counter = Arc::clone(&counter);
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            )
            .await;

        let envelope = reaction_envelope();
        processor.process_event(envelope.clone()).await;
        processor.process_event(envelope).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let report = processor.health_check().await;
        assert_eq!(report.processed_total, 1);
        assert_eq!(report.duplicates_skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_handler_accumulates_in_dead_letter_queue() {
        let processor = test_processor();
        processor.activate().await;
        processor
            .register_handler(
                EventKind::ReactionDetected,
                Arc::new(|_| Box::pin(async { Err(HandlerError::from("boom")) })),
            )
            .await;

        let envelope = reaction_envelope();
        processor.process_event(envelope.clone()).await;

        let report = processor.health_check().await;
        assert_eq!(report.dead_letter_len, 1);
        assert_eq!(report.failures_total, 1);

        // Retry counts only go up; the entry is never silently removed.
        let mut last_count = 0;
        for _ in 0..(MAX_DEAD_LETTER_ATTEMPTS + 2) {
            tokio::time::advance(Duration::from_secs(70)).await;
            processor.retry_dead_letter_queue().await;
            let counts = processor.dead_letter_retry_counts().await;
            assert_eq!(counts.len(), 1);
            assert!(counts[0].1 >= last_count);
            last_count = counts[0].1;
        }

        let counts = processor.dead_letter_retry_counts().await;
        assert_eq!(counts[0].0, envelope.event_id);
        assert!(counts[0].1 > MAX_DEAD_LETTER_ATTEMPTS);
        assert!(counts[0].2, "entry should be flagged persistently failed");

        // Once flagged, further scans leave it alone.
        tokio::time::advance(Duration::from_secs(700)).await;
        assert_eq!(processor.retry_dead_letter_queue().await, 0);
        assert_eq!(processor.dead_letter_retry_counts().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovered_dead_letter_is_removed() {
        let processor = test_processor();
        processor.activate().await;

        let should_fail = Arc::new(AtomicU64::new(1));
        let flag = Arc::clone(&should_fail);
        processor
            .register_handler(
                EventKind::ReactionDetected,
                Arc::new(move |_| {
                    let flag = Arc::clone(&flag);
                    Box::pin(async move {
                        if flag.load(Ordering::SeqCst) == 1 {
                            Err(HandlerError::from("transient"))
                        } else {
                            Ok(())
                        }
                    })
                }),
            )
            .await;

        processor.process_event(reaction_envelope()).await;
        assert_eq!(processor.health_check().await.dead_letter_len, 1);

        should_fail.store(0, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(processor.retry_dead_letter_queue().await, 1);
        assert_eq!(processor.health_check().await.dead_letter_len, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idempotency_cache_evicts_by_capacity_and_ttl() {
        let mut cache = IdempotencyCache::new(2, Duration::from_secs(10));
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = Instant::now();

        assert!(cache.check_and_insert(a, now));
        assert!(!cache.check_and_insert(a, now));
        assert!(cache.check_and_insert(b, now));
        // Capacity eviction drops the oldest id.
        assert!(cache.check_and_insert(c, now));
        assert_eq!(cache.len(), 2);
        assert!(cache.check_and_insert(a, now));

        // TTL expiry makes every id fresh again.
        let later = now + Duration::from_secs(11);
        assert!(cache.check_and_insert(c, later));
        assert!(cache.check_and_insert(a, later));
    }

    #[tokio::test]
    async fn inactive_processor_skips_envelopes() {
        let processor = test_processor();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        processor
            .register_handler(
                EventKind::ReactionDetected,
                Arc::new(move |_| {
                    let counter = Arc::clone(&counter);
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            )
            .await;

        processor.process_event(reaction_envelope()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        processor.activate().await;
        processor.stop_processing().await;
        processor.process_event(reaction_envelope()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn percentiles_over_sorted_window() {
        let sorted: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        assert_eq!(percentile_ms(&sorted, 0.95), 95.0);
        assert_eq!(percentile_ms(&sorted, 0.99), 99.0);
        assert_eq!(average_ms(&sorted), 50.5);
        assert_eq!(percentile_ms(&[], 0.95), 0.0);
    }
}
