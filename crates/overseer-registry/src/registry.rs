//! Service construction, hot reload, and lifecycle.
//!
//! The registry is the composition root: it builds the configuration
//! store first, seeds the four governance services from it, and hands
//! them to the pipeline. Configuration updates go through the store and
//! are then pushed field-by-field into the live services; no service is
//! ever reconstructed for a config change.

use serde_json::json;
use tracing::{debug, info};

use overseer_authority::AuthorityValidator;
use overseer_autofix::AutofixEngine;
use overseer_config::{ConfigChange, ConfigError, ConfigStore, GovernorConfig, GovernorPatch};
use overseer_pipeline::DecisionPipeline;
use overseer_risk::RiskEngine;
use overseer_telemetry::TelemetryHub;
use overseer_types::{Decision, PipelineTrace, SharedClock, SystemClock, TelemetryKind};

/// Owns the configuration store and the pipeline, and keeps the live
/// services in sync with configuration changes.
#[derive(Debug)]
pub struct ServiceRegistry {
    store: ConfigStore,
    pipeline: DecisionPipeline,
    clock: SharedClock,
}

impl ServiceRegistry {
    /// Build a registry on the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the seed configuration fails
    /// field validation; no service is constructed.
    pub fn new(config: GovernorConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock::shared())
    }

    /// Build a registry on an explicit clock.
    ///
    /// The store is constructed first and validates the seed; every
    /// service is then seeded from the stored configuration and handed to
    /// the pipeline by value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the seed configuration fails
    /// field validation; no service is constructed.
    pub fn with_clock(config: GovernorConfig, clock: SharedClock) -> Result<Self, ConfigError> {
        let store = ConfigStore::new(config, clock.clone())?;
        let current = store.current();
        let risk = RiskEngine::from_config(current, clock.clone());
        let authority = AuthorityValidator::from_config(current, clock.clone());
        let telemetry = TelemetryHub::from_config(current, clock.clone());
        let autofix = AutofixEngine::new(clock.clone());
        let pipeline = DecisionPipeline::new(risk, authority, telemetry, autofix, clock.clone());
        info!("service registry constructed");
        Ok(Self {
            store,
            pipeline,
            clock,
        })
    }

    /// Walk one decision through the pipeline.
    pub fn process(&mut self, decision: Decision) -> PipelineTrace {
        self.pipeline.process(decision)
    }

    /// Validate and apply a configuration patch, then push the changed
    /// fields into the live services and emit a `ConfigChanged` event.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the patch fails field
    /// validation; the live services are left untouched.
    pub fn update_config(&mut self, patch: &GovernorPatch) -> Result<Vec<ConfigChange>, ConfigError> {
        let changes = self.store.update(patch)?;
        if !changes.is_empty() {
            self.push_changes(&changes);
        }
        Ok(changes)
    }

    /// Replace the configuration wholesale through the same path as
    /// [`Self::update_config`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the replacement fails field
    /// validation.
    pub fn load_config(&mut self, config: &GovernorConfig) -> Result<Vec<ConfigChange>, ConfigError> {
        let changes = self.store.load(config)?;
        if !changes.is_empty() {
            self.push_changes(&changes);
        }
        Ok(changes)
    }

    /// Push changed configuration fields into the already-live services.
    fn push_changes(&mut self, changes: &[ConfigChange]) {
        let current = self.store.current().clone();
        let changed = |prefix: &str| {
            changes
                .iter()
                .any(|c| c.key == prefix || c.key.starts_with(&format!("{prefix}.")))
        };

        if changed("risk_threshold") {
            self.pipeline.risk_mut().set_threshold(current.risk_threshold);
        }
        if changed("risk_weights") {
            self.pipeline.risk_mut().merge_weights(&current.risk_weights);
        }
        if changed("cascade_multipliers") {
            self.pipeline
                .risk_mut()
                .merge_multipliers(&current.cascade_multipliers);
        }
        if changed("rate_limits") {
            self.pipeline
                .authority_mut()
                .merge_rate_limits(&current.rate_limits);
        }
        if changed("anomaly") {
            self.pipeline.telemetry_mut().apply_thresholds(current.anomaly);
        }
        if changed("telemetry") {
            self.pipeline.telemetry_mut().apply_settings(current.telemetry);
        }

        let keys: Vec<&str> = changes.iter().map(|c| c.key.as_str()).collect();
        debug!(?keys, "configuration pushed to live services");
        self.pipeline
            .telemetry_mut()
            .emit(TelemetryKind::ConfigChanged, json!({ "keys": keys }));
    }

    /// Periodic upkeep: telemetry counter maintenance plus due throttle
    /// reverts, each revert emitted as a `ThrottleReverted` event.
    pub fn run_maintenance(&mut self) {
        self.pipeline.telemetry_mut().run_maintenance();
        let due = self.pipeline.autofix_mut().poll_reverts();
        for revert in due {
            info!("spawn throttle revert applied");
            self.pipeline.telemetry_mut().emit(
                TelemetryKind::ThrottleReverted,
                json!({
                    "scheduled_at": revert.scheduled_at,
                    "due_at": revert.due_at,
                }),
            );
        }
    }

    /// Clear all bounded state across the owned services. Idempotent;
    /// the instances themselves survive, as do their wiring and the live
    /// configuration.
    pub fn shutdown(&mut self) {
        info!("registry shutdown: clearing bounded state");
        self.pipeline.risk_mut().clear();
        self.pipeline.authority_mut().reset_rate_limits();
        self.pipeline.autofix_mut().clear();
        self.pipeline.telemetry_mut().clear();
        self.pipeline.clear_traces();
        self.store.clear_change_log();
    }

    /// Shutdown plus restore the built-in default configuration.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the defaults always validate.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.shutdown();
        let changes = self.store.reset()?;
        if !changes.is_empty() {
            self.push_changes(&changes);
        }
        Ok(())
    }

    /// The configuration store.
    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Mutable access to the configuration store.
    ///
    /// Updates applied directly to the store bypass the hot-reload push;
    /// prefer [`Self::update_config`].
    pub const fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    /// The pipeline and, through it, the owned services.
    pub const fn pipeline(&self) -> &DecisionPipeline {
        &self.pipeline
    }

    /// Mutable access to the pipeline.
    pub const fn pipeline_mut(&mut self) -> &mut DecisionPipeline {
        &mut self.pipeline
    }

    /// The clock every owned service reads.
    pub fn clock(&self) -> SharedClock {
        self.clock.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use overseer_types::{DecisionKind, ManualClock};

    use super::*;

    fn make_registry() -> ServiceRegistry {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        ServiceRegistry::with_clock(GovernorConfig::default(), ManualClock::shared(start)).unwrap()
    }

    #[test]
    fn services_are_seeded_from_the_stored_config() {
        let mut config = GovernorConfig::default();
        config.risk_threshold = 42.0;
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let registry = ServiceRegistry::with_clock(config, ManualClock::shared(start)).unwrap();
        assert!((registry.pipeline().risk().threshold() - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_seed_config_is_rejected_at_construction() {
        let mut config = GovernorConfig::default();
        config.risk_weights.insert(DecisionKind::Spawn, -5.0);
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let result = ServiceRegistry::with_clock(config, ManualClock::shared(start));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn threshold_update_reaches_the_live_risk_engine() {
        let mut registry = make_registry();
        let patch = GovernorPatch {
            risk_threshold: Some(55.0),
            ..GovernorPatch::default()
        };
        let changes = registry.update_config(&patch).unwrap();
        assert_eq!(changes.len(), 1);
        assert!((registry.pipeline().risk().threshold() - 55.0).abs() < f64::EPSILON);

        let kinds: Vec<TelemetryKind> = registry
            .pipeline()
            .telemetry()
            .events()
            .iter()
            .map(|e| e.kind)
            .collect();
        assert!(kinds.contains(&TelemetryKind::ConfigChanged));
    }

    #[test]
    fn invalid_patch_touches_nothing() {
        let mut registry = make_registry();
        let patch = GovernorPatch {
            risk_threshold: Some(500.0),
            ..GovernorPatch::default()
        };
        assert!(registry.update_config(&patch).is_err());
        assert!((registry.pipeline().risk().threshold() - 70.0).abs() < f64::EPSILON);
        assert!(registry.pipeline().telemetry().events().is_empty());
    }

    #[test]
    fn rate_limit_update_reaches_the_live_validator() {
        let mut registry = make_registry();
        let mut rate_limits = std::collections::BTreeMap::new();
        rate_limits.insert(
            DecisionKind::Spawn,
            overseer_config::RateLimit {
                max_per_second: 1,
                window_ms: 500,
            },
        );
        let patch = GovernorPatch {
            rate_limits,
            ..GovernorPatch::default()
        };
        registry.update_config(&patch).unwrap();
        assert_eq!(
            registry
                .store()
                .current()
                .rate_limits
                .get(&DecisionKind::Spawn)
                .map(|l| l.max_per_second),
            Some(1)
        );
    }

    #[test]
    fn shutdown_is_idempotent_and_zeroes_stats() {
        let mut registry = make_registry();
        registry.pipeline_mut().risk_mut().set_threshold(90.0);

        registry.shutdown();
        registry.shutdown();

        let stats = registry.pipeline().stats();
        assert_eq!(stats.total_processed, 0);
        assert!(registry.pipeline().telemetry().events().is_empty());
        // Shutdown clears state, not configuration.
        assert!((registry.pipeline().risk().threshold() - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_restores_default_config() {
        let mut registry = make_registry();
        let patch = GovernorPatch {
            risk_threshold: Some(10.0),
            ..GovernorPatch::default()
        };
        registry.update_config(&patch).unwrap();

        registry.reset().unwrap();
        assert!((registry.store().current().risk_threshold - 70.0).abs() < f64::EPSILON);
        assert!((registry.pipeline().risk().threshold() - 70.0).abs() < f64::EPSILON);
    }
}
