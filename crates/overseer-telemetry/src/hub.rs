//! The telemetry hub: bounded event log, rolling counters, anomaly
//! detection.
//!
//! Every pipeline run reports here. The hub keeps the most recent events
//! up to a configured cap, maintains rolling counters that a periodic
//! maintenance call resets, samples spawn timestamps into a one-second
//! window, and tracks per-entity activity for stuck detection. Reading
//! counters is pure; [`TelemetryHub::run_maintenance`] owns the reset.
//!
//! Anomaly detection returns the report to the caller instead of pushing
//! it anywhere: the pipeline relays reports to the autofix engine, so the
//! hub and the engine stay testable in isolation.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, warn};

use overseer_config::{AnomalyThresholds, GovernorConfig, TelemetrySettings};
use overseer_types::{
    elapsed_ms, AnomalyId, AnomalyKind, AnomalyReport, AnomalySeverity, EntityId, SharedClock,
    TelemetryEvent, TelemetryEventId, TelemetryKind, TraceId,
};

use crate::sink::{NoopSink, TelemetrySink};

/// Length of the spawn sampling window in milliseconds.
const SPAWN_WINDOW_MS: f64 = 1_000.0;

/// Listener notified for events of one subscribed kind. Failures are
/// logged and swallowed.
pub type EventListener = Box<dyn FnMut(&TelemetryEvent) -> Result<(), String>>;

/// A pure, point-in-time view of the hub's counters.
///
/// Every field is non-negative by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterSnapshot {
    /// Decisions concluded per second within the current rolling window.
    pub decisions_per_second: f64,
    /// Average latency of concluded decisions within the window.
    pub average_latency_ms: f64,
    /// Rough estimate of memory held by the hub's buffers, in MiB.
    pub estimated_memory_mb: f64,
    /// Number of entities with tracked activity.
    pub active_entities: usize,
    /// Decisions concluded since the hub was created or cleared.
    pub total_decisions: u64,
    /// Decisions rejected since the hub was created or cleared.
    pub total_rejections: u64,
    /// Autofix triggers since the hub was created or cleared.
    pub total_autofixes: u64,
}

/// Rolling counters reset by maintenance, plus lifetime totals.
#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    decision_count: u64,
    total_latency_ms: f64,
    rejection_count: u64,
    autofix_count: u64,
    total_decisions: u64,
    total_rejections: u64,
    total_autofixes: u64,
}

/// Central telemetry collector and anomaly detector.
pub struct TelemetryHub {
    settings: TelemetrySettings,
    thresholds: AnomalyThresholds,
    events: VecDeque<TelemetryEvent>,
    counters: Counters,
    window_started_at: DateTime<Utc>,
    spawn_window: VecDeque<DateTime<Utc>>,
    // Insertion-ordered: stuck detection reports the first offender in
    // tracking order, so a map will not do.
    entity_activity: Vec<(EntityId, DateTime<Utc>)>,
    reasoning: BTreeMap<EntityId, VecDeque<String>>,
    listeners: BTreeMap<TelemetryKind, Vec<EventListener>>,
    sink: Box<dyn TelemetrySink>,
    clock: SharedClock,
}

impl core::fmt::Debug for TelemetryHub {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TelemetryHub")
            .field("settings", &self.settings)
            .field("events", &self.events.len())
            .field("counters", &self.counters)
            .field("active_entities", &self.entity_activity.len())
            .finish_non_exhaustive()
    }
}

impl TelemetryHub {
    /// Create a hub seeded from the governance configuration, with a
    /// no-op sink.
    pub fn from_config(config: &GovernorConfig, clock: SharedClock) -> Self {
        let window_started_at = clock.now();
        Self {
            settings: config.telemetry,
            thresholds: config.anomaly,
            events: VecDeque::new(),
            counters: Counters::default(),
            window_started_at,
            spawn_window: VecDeque::new(),
            entity_activity: Vec::new(),
            reasoning: BTreeMap::new(),
            listeners: BTreeMap::new(),
            sink: Box::new(NoopSink),
            clock,
        }
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Record an event with no latency or trace attribution.
    pub fn emit(&mut self, kind: TelemetryKind, data: serde_json::Value) -> TelemetryEventId {
        self.emit_with(kind, data, None, None)
    }

    /// Record an event, updating rolling counters and notifying the sink
    /// and any subscribed listeners.
    pub fn emit_with(
        &mut self,
        kind: TelemetryKind,
        data: serde_json::Value,
        latency_ms: Option<f64>,
        trace_id: Option<TraceId>,
    ) -> TelemetryEventId {
        let now = self.clock.now();
        let event = TelemetryEvent {
            event_id: TelemetryEventId::new(),
            kind,
            recorded_at: now,
            data,
            latency_ms,
            trace_id,
        };

        match kind {
            TelemetryKind::DecisionExecuted => {
                self.counters.decision_count = self.counters.decision_count.saturating_add(1);
                self.counters.total_decisions = self.counters.total_decisions.saturating_add(1);
                self.counters.total_latency_ms += latency_ms.unwrap_or(0.0);
                if event.data.get("decision_kind").and_then(|v| v.as_str()) == Some("spawn") {
                    self.sample_spawn(now);
                }
            }
            TelemetryKind::DecisionRejected => {
                self.counters.decision_count = self.counters.decision_count.saturating_add(1);
                self.counters.total_decisions = self.counters.total_decisions.saturating_add(1);
                self.counters.total_latency_ms += latency_ms.unwrap_or(0.0);
                self.counters.rejection_count = self.counters.rejection_count.saturating_add(1);
                self.counters.total_rejections = self.counters.total_rejections.saturating_add(1);
            }
            TelemetryKind::AutofixTriggered => {
                self.counters.autofix_count = self.counters.autofix_count.saturating_add(1);
                self.counters.total_autofixes = self.counters.total_autofixes.saturating_add(1);
            }
            _ => {}
        }

        if let Err(message) = self.sink.log_event(&event) {
            warn!(%kind, message, "telemetry sink rejected event");
        }
        if let Some(listeners) = self.listeners.get_mut(&kind) {
            for listener in listeners.iter_mut() {
                if let Err(message) = listener(&event) {
                    warn!(%kind, message, "telemetry listener failed");
                }
            }
        }

        let event_id = event.event_id;
        self.events.push_back(event);
        while self.events.len() > self.settings.max_events {
            self.events.pop_front();
        }
        event_id
    }

    /// Record that an entity changed state, for stuck detection.
    ///
    /// A known entity keeps its tracking-insertion position; only its
    /// timestamp moves.
    pub fn record_state_change(&mut self, entity_id: EntityId) {
        let now = self.clock.now();
        if let Some(entry) = self
            .entity_activity
            .iter_mut()
            .find(|(id, _)| *id == entity_id)
        {
            entry.1 = now;
        } else {
            self.entity_activity.push((entity_id, now));
        }
    }

    /// Sample the spawn window directly, outside event recording.
    pub fn record_spawn(&mut self) {
        let now = self.clock.now();
        self.sample_spawn(now);
    }

    /// Store a per-entity reasoning entry. No-op unless debug mode is on;
    /// bounded per entity.
    pub fn record_reasoning(&mut self, entity_id: EntityId, text: impl Into<String>) {
        if !self.settings.debug_mode {
            return;
        }
        let entries = self.reasoning.entry(entity_id).or_default();
        entries.push_back(text.into());
        while entries.len() > self.settings.max_reasoning_entries {
            entries.pop_front();
        }
    }

    /// The stored reasoning entries for an entity, oldest first.
    pub fn reasoning_for(&self, entity_id: EntityId) -> Vec<String> {
        self.reasoning
            .get(&entity_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn sample_spawn(&mut self, now: DateTime<Utc>) {
        self.spawn_window.push_back(now);
        self.prune_spawn_window(now);
    }

    fn prune_spawn_window(&mut self, now: DateTime<Utc>) {
        while let Some(oldest) = self.spawn_window.front() {
            if elapsed_ms(*oldest, now) > SPAWN_WINDOW_MS {
                self.spawn_window.pop_front();
            } else {
                break;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Derive a counter snapshot. Pure: never mutates rolling state.
    pub fn counters(&self) -> CounterSnapshot {
        let now = self.clock.now();
        let elapsed_s = elapsed_ms(self.window_started_at, now) / 1_000.0;

        #[allow(clippy::cast_precision_loss)]
        let decision_count = self.counters.decision_count as f64;
        let decisions_per_second = if elapsed_s > 0.0 {
            decision_count / elapsed_s
        } else {
            0.0
        };
        let average_latency_ms = if self.counters.decision_count > 0 {
            (self.counters.total_latency_ms / decision_count).max(0.0)
        } else {
            0.0
        };

        CounterSnapshot {
            decisions_per_second,
            average_latency_ms,
            estimated_memory_mb: self.estimated_memory_mb(),
            active_entities: self.entity_activity.len(),
            total_decisions: self.counters.total_decisions,
            total_rejections: self.counters.total_rejections,
            total_autofixes: self.counters.total_autofixes,
        }
    }

    /// Rough per-entry accounting of the hub's buffers.
    fn estimated_memory_mb(&self) -> f64 {
        let reasoning_entries: usize = self.reasoning.values().map(VecDeque::len).sum();
        let bytes = self
            .events
            .len()
            .saturating_mul(512)
            .saturating_add(self.entity_activity.len().saturating_mul(64))
            .saturating_add(reasoning_entries.saturating_mul(256))
            .saturating_add(self.spawn_window.len().saturating_mul(16));
        #[allow(clippy::cast_precision_loss)]
        {
            bytes as f64 / (1024.0 * 1024.0)
        }
    }

    /// The retained events, oldest first.
    pub fn events(&self) -> &VecDeque<TelemetryEvent> {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Maintenance and detection
    // -----------------------------------------------------------------------

    /// Periodic upkeep: reset rolling counters once the configured
    /// interval has elapsed, and prune the spawn window.
    pub fn run_maintenance(&mut self) {
        let now = self.clock.now();
        #[allow(clippy::cast_precision_loss)]
        let interval_ms = self.settings.counter_reset_interval_ms as f64;
        if elapsed_ms(self.window_started_at, now) >= interval_ms {
            debug!("resetting rolling telemetry counters");
            self.counters.decision_count = 0;
            self.counters.total_latency_ms = 0.0;
            self.counters.rejection_count = 0;
            self.counters.autofix_count = 0;
            self.window_started_at = now;
        }
        self.prune_spawn_window(now);
    }

    /// Check anomaly conditions in fixed priority order and return the
    /// first match, if any.
    ///
    /// A match emits an `AnomalyDetected` event and notifies the sink's
    /// incident channel. The caller owns any further relay.
    pub fn detect_anomaly(&mut self) -> Option<AnomalyReport> {
        let now = self.clock.now();
        self.prune_spawn_window(now);

        let report = self
            .check_excessive_spawning(now)
            .or_else(|| self.check_stuck_entity(now))
            .or_else(|| self.check_performance(now))?;

        let data = serde_json::to_value(&report).unwrap_or_else(|_| json!(null));
        self.emit(TelemetryKind::AnomalyDetected, data);
        if let Err(message) = self.sink.log_incident(&report) {
            warn!(kind = %report.kind, message, "telemetry sink rejected incident");
        }
        Some(report)
    }

    fn check_excessive_spawning(&self, now: DateTime<Utc>) -> Option<AnomalyReport> {
        let spawn_count = u64::try_from(self.spawn_window.len()).unwrap_or(u64::MAX);
        if spawn_count <= u64::from(self.thresholds.spawn_rate_per_second) {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let spawn_count_metric = spawn_count as f64;
        let mut metrics = BTreeMap::new();
        metrics.insert("spawn_count".to_owned(), spawn_count_metric);
        metrics.insert(
            "threshold".to_owned(),
            f64::from(self.thresholds.spawn_rate_per_second),
        );
        Some(AnomalyReport {
            id: AnomalyId::new(),
            kind: AnomalyKind::ExcessiveSpawning,
            severity: AnomalySeverity::High,
            affected_entities: Vec::new(),
            detected_at: now,
            metrics,
            description: format!(
                "{spawn_count} spawns within the last second exceed the limit of {}",
                self.thresholds.spawn_rate_per_second
            ),
        })
    }

    fn check_stuck_entity(&self, now: DateTime<Utc>) -> Option<AnomalyReport> {
        #[allow(clippy::cast_precision_loss)]
        let stuck_ms = (self.thresholds.stuck_ai_seconds.saturating_mul(1_000)) as f64;
        let (entity_id, last_change) = self
            .entity_activity
            .iter()
            .find(|(_, last)| elapsed_ms(*last, now) > stuck_ms)
            .copied()?;
        let age_s = elapsed_ms(last_change, now) / 1_000.0;
        #[allow(clippy::cast_precision_loss)]
        let threshold_metric = self.thresholds.stuck_ai_seconds as f64;
        let mut metrics = BTreeMap::new();
        metrics.insert("stuck_seconds".to_owned(), age_s);
        metrics.insert("threshold".to_owned(), threshold_metric);
        Some(AnomalyReport {
            id: AnomalyId::new(),
            kind: AnomalyKind::StuckAi,
            severity: AnomalySeverity::Medium,
            affected_entities: vec![entity_id],
            detected_at: now,
            metrics,
            description: format!(
                "entity {entity_id} has not changed state for {age_s:.1}s"
            ),
        })
    }

    fn check_performance(&self, now: DateTime<Utc>) -> Option<AnomalyReport> {
        if self.counters.decision_count == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let average = self.counters.total_latency_ms / self.counters.decision_count as f64;
        if average <= self.thresholds.performance_degradation_ms {
            return None;
        }
        let mut metrics = BTreeMap::new();
        metrics.insert("average_latency_ms".to_owned(), average);
        metrics.insert(
            "threshold".to_owned(),
            self.thresholds.performance_degradation_ms,
        );
        Some(AnomalyReport {
            id: AnomalyId::new(),
            kind: AnomalyKind::PerformanceDegradation,
            severity: AnomalySeverity::Medium,
            affected_entities: Vec::new(),
            detected_at: now,
            metrics,
            description: format!(
                "average decision latency {average:.1}ms exceeds {:.1}ms",
                self.thresholds.performance_degradation_ms
            ),
        })
    }

    // -----------------------------------------------------------------------
    // Wiring and lifecycle
    // -----------------------------------------------------------------------

    /// Replace the outbound sink.
    pub fn set_sink(&mut self, sink: Box<dyn TelemetrySink>) {
        self.sink = sink;
    }

    /// Subscribe a listener to one event kind.
    pub fn subscribe(&mut self, kind: TelemetryKind, listener: EventListener) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    /// Apply new retention and sampling settings, trimming buffers to the
    /// new bounds.
    pub fn apply_settings(&mut self, settings: TelemetrySettings) {
        self.settings = settings;
        while self.events.len() > self.settings.max_events {
            self.events.pop_front();
        }
        for entries in self.reasoning.values_mut() {
            while entries.len() > self.settings.max_reasoning_entries {
                entries.pop_front();
            }
        }
    }

    /// Apply new anomaly thresholds.
    pub fn apply_thresholds(&mut self, thresholds: AnomalyThresholds) {
        self.thresholds = thresholds;
    }

    /// Drop all buffered state and counters, flush the sink, and restart
    /// the rolling window. Settings, listeners, and the sink survive.
    pub fn clear(&mut self) {
        self.events.clear();
        self.spawn_window.clear();
        self.entity_activity.clear();
        self.reasoning.clear();
        self.counters = Counters::default();
        self.window_started_at = self.clock.now();
        if let Err(message) = self.sink.flush() {
            warn!(message, "telemetry sink flush failed");
        }
    }
}
