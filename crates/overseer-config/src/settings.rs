//! Typed configuration structure and YAML loading.
//!
//! [`GovernorConfig`] is the single nested record every other component is
//! seeded from: risk threshold and weights, cascade multipliers,
//! per-operation rate limits, anomaly thresholds, and telemetry settings.
//! Every field is hot-reloadable through the store in [`crate::store`].
//!
//! The canonical on-disk form is YAML (`overseer-config.yaml` at the
//! project root). All fields have built-in defaults, so a partial file or
//! no file at all is valid.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use overseer_types::{AffectedSystem, DecisionKind};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A proposed change failed field validation.
    #[error("invalid configuration: {}", errors.join("; "))]
    Invalid {
        /// One message per failed field check.
        errors: Vec<String>,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Fixed-window rate limit for one operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Maximum number of operations allowed per window.
    pub max_per_second: u32,
    /// Window length in milliseconds. Must be positive.
    pub window_ms: u64,
}

/// Thresholds governing the anomaly detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyThresholds {
    /// Spawns within the 1-second sampling window before
    /// `EXCESSIVE_SPAWNING` fires.
    #[serde(default = "default_spawn_rate_per_second")]
    pub spawn_rate_per_second: u32,

    /// Seconds without a state change before an entity counts as stuck.
    #[serde(default = "default_stuck_ai_seconds")]
    pub stuck_ai_seconds: u64,

    /// Rolling average latency in milliseconds before
    /// `PERFORMANCE_DEGRADATION` fires.
    #[serde(default = "default_performance_degradation_ms")]
    pub performance_degradation_ms: f64,

    /// Estimated memory in MiB before the host should report
    /// `MEMORY_THRESHOLD`.
    #[serde(default = "default_memory_threshold_mb")]
    pub memory_threshold_mb: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            spawn_rate_per_second: default_spawn_rate_per_second(),
            stuck_ai_seconds: default_stuck_ai_seconds(),
            performance_degradation_ms: default_performance_degradation_ms(),
            memory_threshold_mb: default_memory_threshold_mb(),
        }
    }
}

/// Retention and sampling settings for the telemetry hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Maximum events retained in the bounded log (most recent kept).
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Maximum reasoning entries retained per entity.
    #[serde(default = "default_max_reasoning_entries")]
    pub max_reasoning_entries: usize,

    /// Interval after which rolling counters reset, in milliseconds.
    #[serde(default = "default_counter_reset_interval_ms")]
    pub counter_reset_interval_ms: u64,

    /// Whether per-entity reasoning capture is enabled.
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            max_reasoning_entries: default_max_reasoning_entries(),
            counter_reset_interval_ms: default_counter_reset_interval_ms(),
            debug_mode: false,
        }
    }
}

/// The complete governance configuration.
///
/// Mirrors the structure of `overseer-config.yaml`. All fields have
/// built-in defaults; the maps always carry an entry for every decision
/// kind and affected system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Risk score above which decisions are rejected, in `[0, 100]`.
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: f64,

    /// Base risk weight per decision kind, each in `[0, 100]`.
    #[serde(default = "default_risk_weights")]
    pub risk_weights: BTreeMap<DecisionKind, f64>,

    /// Cascade multiplier per affected system, each non-negative.
    #[serde(default = "default_cascade_multipliers")]
    pub cascade_multipliers: BTreeMap<AffectedSystem, f64>,

    /// Fixed-window rate limit per decision kind.
    #[serde(default = "default_rate_limits")]
    pub rate_limits: BTreeMap<DecisionKind, RateLimit>,

    /// Anomaly detector thresholds.
    #[serde(default)]
    pub anomaly: AnomalyThresholds,

    /// Telemetry retention and sampling settings.
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            risk_threshold: default_risk_threshold(),
            risk_weights: default_risk_weights(),
            cascade_multipliers: default_cascade_multipliers(),
            rate_limits: default_rate_limits(),
            anomaly: AnomalyThresholds::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl GovernorConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Return the base risk weight for a decision kind, falling back to
    /// the built-in default when the map has no entry.
    pub fn risk_weight(&self, kind: DecisionKind) -> f64 {
        self.risk_weights
            .get(&kind)
            .copied()
            .unwrap_or_else(|| builtin_risk_weight(kind))
    }

    /// Return the cascade multiplier for a system, falling back to the
    /// built-in default when the map has no entry.
    pub fn cascade_multiplier(&self, system: AffectedSystem) -> f64 {
        self.cascade_multipliers
            .get(&system)
            .copied()
            .unwrap_or_else(|| builtin_cascade_multiplier(system))
    }
}

// ---------------------------------------------------------------------------
// Built-in defaults (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_risk_threshold() -> f64 {
    70.0
}

/// Built-in base risk weight for one decision kind.
///
/// The single fallback for weight lookups: [`GovernorConfig::risk_weight`]
/// and the risk engine both land here when a map has no entry.
pub const fn builtin_risk_weight(kind: DecisionKind) -> f64 {
    match kind {
        DecisionKind::EnemyUpdate => 10.0,
        DecisionKind::SquadTactic => 20.0,
        DecisionKind::HeatChange => 15.0,
        DecisionKind::Spawn => 30.0,
        DecisionKind::Despawn => 12.0,
    }
}

/// Built-in cascade multiplier for one affected system.
///
/// Multipliers default to zero: out of the box, cascade prediction is
/// advisory only, and the cascade term starts contributing to risk once
/// the game tunes the multipliers for its subsystems.
pub const fn builtin_cascade_multiplier(_system: AffectedSystem) -> f64 {
    0.0
}

/// Built-in rate limit for one decision kind.
pub(crate) const fn builtin_rate_limit(kind: DecisionKind) -> RateLimit {
    let max_per_second = match kind {
        DecisionKind::EnemyUpdate => 60,
        DecisionKind::SquadTactic => 15,
        DecisionKind::HeatChange => 30,
        DecisionKind::Spawn => 10,
        DecisionKind::Despawn => 20,
    };
    RateLimit {
        max_per_second,
        window_ms: 1_000,
    }
}

fn default_risk_weights() -> BTreeMap<DecisionKind, f64> {
    DecisionKind::ALL
        .into_iter()
        .map(|kind| (kind, builtin_risk_weight(kind)))
        .collect()
}

fn default_cascade_multipliers() -> BTreeMap<AffectedSystem, f64> {
    AffectedSystem::ALL
        .into_iter()
        .map(|system| (system, builtin_cascade_multiplier(system)))
        .collect()
}

fn default_rate_limits() -> BTreeMap<DecisionKind, RateLimit> {
    DecisionKind::ALL
        .into_iter()
        .map(|kind| (kind, builtin_rate_limit(kind)))
        .collect()
}

const fn default_spawn_rate_per_second() -> u32 {
    20
}

const fn default_stuck_ai_seconds() -> u64 {
    30
}

const fn default_performance_degradation_ms() -> f64 {
    100.0
}

const fn default_memory_threshold_mb() -> f64 {
    512.0
}

const fn default_max_events() -> usize {
    10_000
}

const fn default_max_reasoning_entries() -> usize {
    50
}

const fn default_counter_reset_interval_ms() -> u64 {
    60_000
}
