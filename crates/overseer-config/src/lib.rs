//! Validated, hot-reloadable configuration for the Overseer governance core.
//!
//! The configuration store is the source of truth for every other
//! component: risk weights and threshold, cascade multipliers, rate
//! limits, anomaly thresholds, and telemetry settings. Updates validate
//! field-by-field before anything is applied, merge nested maps
//! key-by-key, keep a bounded change log, and notify listeners with the
//! old and new configuration.
//!
//! # Modules
//!
//! - [`settings`] -- The typed [`GovernorConfig`] record and YAML loading
//! - [`patch`] -- Partial updates: validation and deep merge
//! - [`store`] -- The stateful [`ConfigStore`] with change log and listeners

pub mod patch;
pub mod settings;
pub mod store;

pub use patch::{AnomalyPatch, GovernorPatch, KeyChange, TelemetryPatch};
pub use settings::{
    AnomalyThresholds, ConfigError, GovernorConfig, RateLimit, TelemetrySettings,
    builtin_cascade_multiplier, builtin_risk_weight,
};
pub use store::{ChangeListener, ConfigChange, ConfigStore};
