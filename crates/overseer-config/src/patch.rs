//! Partial configuration updates: validation and deep merge.
//!
//! A [`GovernorPatch`] carries only the fields a caller wants to change.
//! Scalar fields are `Option`s; nested maps are merged key-by-key instead
//! of being replaced wholesale. Applying a patch reports exactly which key
//! paths actually changed, which feeds both the change log and the
//! registry's hot-reload diff.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use overseer_types::{AffectedSystem, DecisionKind};

use crate::settings::{GovernorConfig, RateLimit};

/// One key path that a patch application actually changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    /// Dot-separated key path, e.g. `risk_weights.spawn`.
    pub key: String,
    /// The value before the change, as JSON.
    pub old: serde_json::Value,
    /// The value after the change, as JSON.
    pub new: serde_json::Value,
}

/// Partial update to the anomaly thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyPatch {
    /// New spawn-rate threshold, when set.
    #[serde(default)]
    pub spawn_rate_per_second: Option<u32>,
    /// New stuck-entity age threshold, when set.
    #[serde(default)]
    pub stuck_ai_seconds: Option<u64>,
    /// New latency threshold, when set.
    #[serde(default)]
    pub performance_degradation_ms: Option<f64>,
    /// New memory ceiling, when set.
    #[serde(default)]
    pub memory_threshold_mb: Option<f64>,
}

/// Partial update to the telemetry settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryPatch {
    /// New event retention bound, when set.
    #[serde(default)]
    pub max_events: Option<usize>,
    /// New per-entity reasoning bound, when set.
    #[serde(default)]
    pub max_reasoning_entries: Option<usize>,
    /// New counter reset interval, when set.
    #[serde(default)]
    pub counter_reset_interval_ms: Option<u64>,
    /// New debug-mode flag, when set.
    #[serde(default)]
    pub debug_mode: Option<bool>,
}

/// A partial configuration update.
///
/// Empty maps and `None` fields leave the corresponding configuration
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernorPatch {
    /// New risk threshold, when set.
    #[serde(default)]
    pub risk_threshold: Option<f64>,
    /// Risk weights to merge in, keyed by decision kind.
    #[serde(default)]
    pub risk_weights: BTreeMap<DecisionKind, f64>,
    /// Cascade multipliers to merge in, keyed by system.
    #[serde(default)]
    pub cascade_multipliers: BTreeMap<AffectedSystem, f64>,
    /// Rate limits to merge in, keyed by decision kind.
    #[serde(default)]
    pub rate_limits: BTreeMap<DecisionKind, RateLimit>,
    /// Anomaly threshold updates.
    #[serde(default)]
    pub anomaly: AnomalyPatch,
    /// Telemetry setting updates.
    #[serde(default)]
    pub telemetry: TelemetryPatch,
}

impl GovernorPatch {
    /// Build a patch that sets every field to the values in `config`.
    ///
    /// Used by the store to implement full replacement (`load`) and
    /// default restoration (`reset`) through the ordinary update path.
    pub fn replacing(config: &GovernorConfig) -> Self {
        Self {
            risk_threshold: Some(config.risk_threshold),
            risk_weights: config.risk_weights.clone(),
            cascade_multipliers: config.cascade_multipliers.clone(),
            rate_limits: config.rate_limits.clone(),
            anomaly: AnomalyPatch {
                spawn_rate_per_second: Some(config.anomaly.spawn_rate_per_second),
                stuck_ai_seconds: Some(config.anomaly.stuck_ai_seconds),
                performance_degradation_ms: Some(config.anomaly.performance_degradation_ms),
                memory_threshold_mb: Some(config.anomaly.memory_threshold_mb),
            },
            telemetry: TelemetryPatch {
                max_events: Some(config.telemetry.max_events),
                max_reasoning_entries: Some(config.telemetry.max_reasoning_entries),
                counter_reset_interval_ms: Some(config.telemetry.counter_reset_interval_ms),
                debug_mode: Some(config.telemetry.debug_mode),
            },
        }
    }

    /// Field-by-field validation. Returns one message per failed check;
    /// an empty list means the patch is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(threshold) = self.risk_threshold
            && !(0.0..=100.0).contains(&threshold)
        {
            errors.push(format!(
                "risk_threshold must be in [0, 100], got {threshold}"
            ));
        }

        for (kind, weight) in &self.risk_weights {
            if !(0.0..=100.0).contains(weight) {
                errors.push(format!(
                    "risk_weights.{kind} must be in [0, 100], got {weight}"
                ));
            }
        }

        for (system, multiplier) in &self.cascade_multipliers {
            if !multiplier.is_finite() || *multiplier < 0.0 {
                errors.push(format!(
                    "cascade_multipliers.{system} must be >= 0, got {multiplier}"
                ));
            }
        }

        for (kind, limit) in &self.rate_limits {
            if limit.window_ms == 0 {
                errors.push(format!(
                    "rate_limits.{kind}.window_ms must be > 0, got 0"
                ));
            }
        }

        if self.anomaly.spawn_rate_per_second == Some(0) {
            errors.push("anomaly.spawn_rate_per_second must be > 0, got 0".to_owned());
        }
        if self.anomaly.stuck_ai_seconds == Some(0) {
            errors.push("anomaly.stuck_ai_seconds must be > 0, got 0".to_owned());
        }
        if let Some(ms) = self.anomaly.performance_degradation_ms
            && ms <= 0.0
        {
            errors.push(format!(
                "anomaly.performance_degradation_ms must be > 0, got {ms}"
            ));
        }
        if let Some(mb) = self.anomaly.memory_threshold_mb
            && mb <= 0.0
        {
            errors.push(format!(
                "anomaly.memory_threshold_mb must be > 0, got {mb}"
            ));
        }

        if self.telemetry.max_events == Some(0) {
            errors.push("telemetry.max_events must be > 0, got 0".to_owned());
        }
        if self.telemetry.max_reasoning_entries == Some(0) {
            errors.push("telemetry.max_reasoning_entries must be > 0, got 0".to_owned());
        }
        if self.telemetry.counter_reset_interval_ms == Some(0) {
            errors.push("telemetry.counter_reset_interval_ms must be > 0, got 0".to_owned());
        }

        errors
    }

    /// Deep-merge this patch into `config`, returning one [`KeyChange`]
    /// per key path whose value actually changed.
    ///
    /// Nested maps are merged key-by-key; keys absent from the patch are
    /// left untouched.
    #[allow(clippy::too_many_lines)]
    pub fn apply(&self, config: &mut GovernorConfig) -> Vec<KeyChange> {
        let mut changes = Vec::new();

        if let Some(threshold) = self.risk_threshold
            && float_differs(config.risk_threshold, threshold)
        {
            changes.push(KeyChange {
                key: "risk_threshold".to_owned(),
                old: json!(config.risk_threshold),
                new: json!(threshold),
            });
            config.risk_threshold = threshold;
        }

        for (kind, weight) in &self.risk_weights {
            let existing = config.risk_weights.get(kind).copied();
            if existing.is_none_or(|old| float_differs(old, *weight)) {
                changes.push(KeyChange {
                    key: format!("risk_weights.{kind}"),
                    old: existing.map_or(serde_json::Value::Null, |old| json!(old)),
                    new: json!(weight),
                });
                config.risk_weights.insert(*kind, *weight);
            }
        }

        for (system, multiplier) in &self.cascade_multipliers {
            let existing = config.cascade_multipliers.get(system).copied();
            if existing.is_none_or(|old| float_differs(old, *multiplier)) {
                changes.push(KeyChange {
                    key: format!("cascade_multipliers.{system}"),
                    old: existing.map_or(serde_json::Value::Null, |old| json!(old)),
                    new: json!(multiplier),
                });
                config.cascade_multipliers.insert(*system, *multiplier);
            }
        }

        for (kind, limit) in &self.rate_limits {
            let existing = config.rate_limits.get(kind).copied();
            if existing != Some(*limit) {
                changes.push(KeyChange {
                    key: format!("rate_limits.{kind}"),
                    old: existing
                        .and_then(|old| serde_json::to_value(old).ok())
                        .unwrap_or(serde_json::Value::Null),
                    new: serde_json::to_value(limit).unwrap_or(serde_json::Value::Null),
                });
                config.rate_limits.insert(*kind, *limit);
            }
        }

        if let Some(value) = self.anomaly.spawn_rate_per_second
            && config.anomaly.spawn_rate_per_second != value
        {
            changes.push(KeyChange {
                key: "anomaly.spawn_rate_per_second".to_owned(),
                old: json!(config.anomaly.spawn_rate_per_second),
                new: json!(value),
            });
            config.anomaly.spawn_rate_per_second = value;
        }
        if let Some(value) = self.anomaly.stuck_ai_seconds
            && config.anomaly.stuck_ai_seconds != value
        {
            changes.push(KeyChange {
                key: "anomaly.stuck_ai_seconds".to_owned(),
                old: json!(config.anomaly.stuck_ai_seconds),
                new: json!(value),
            });
            config.anomaly.stuck_ai_seconds = value;
        }
        if let Some(value) = self.anomaly.performance_degradation_ms
            && float_differs(config.anomaly.performance_degradation_ms, value)
        {
            changes.push(KeyChange {
                key: "anomaly.performance_degradation_ms".to_owned(),
                old: json!(config.anomaly.performance_degradation_ms),
                new: json!(value),
            });
            config.anomaly.performance_degradation_ms = value;
        }
        if let Some(value) = self.anomaly.memory_threshold_mb
            && float_differs(config.anomaly.memory_threshold_mb, value)
        {
            changes.push(KeyChange {
                key: "anomaly.memory_threshold_mb".to_owned(),
                old: json!(config.anomaly.memory_threshold_mb),
                new: json!(value),
            });
            config.anomaly.memory_threshold_mb = value;
        }

        if let Some(value) = self.telemetry.max_events
            && config.telemetry.max_events != value
        {
            changes.push(KeyChange {
                key: "telemetry.max_events".to_owned(),
                old: json!(config.telemetry.max_events),
                new: json!(value),
            });
            config.telemetry.max_events = value;
        }
        if let Some(value) = self.telemetry.max_reasoning_entries
            && config.telemetry.max_reasoning_entries != value
        {
            changes.push(KeyChange {
                key: "telemetry.max_reasoning_entries".to_owned(),
                old: json!(config.telemetry.max_reasoning_entries),
                new: json!(value),
            });
            config.telemetry.max_reasoning_entries = value;
        }
        if let Some(value) = self.telemetry.counter_reset_interval_ms
            && config.telemetry.counter_reset_interval_ms != value
        {
            changes.push(KeyChange {
                key: "telemetry.counter_reset_interval_ms".to_owned(),
                old: json!(config.telemetry.counter_reset_interval_ms),
                new: json!(value),
            });
            config.telemetry.counter_reset_interval_ms = value;
        }
        if let Some(value) = self.telemetry.debug_mode
            && config.telemetry.debug_mode != value
        {
            changes.push(KeyChange {
                key: "telemetry.debug_mode".to_owned(),
                old: json!(config.telemetry.debug_mode),
                new: json!(value),
            });
            config.telemetry.debug_mode = value;
        }

        changes
    }
}

/// Whether two floats differ beyond epsilon tolerance.
fn float_differs(a: f64, b: f64) -> bool {
    (a - b).abs() > f64::EPSILON
}
