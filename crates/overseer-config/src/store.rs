//! The hot-reloadable configuration store.
//!
//! [`ConfigStore`] owns the single process-wide [`GovernorConfig`] value.
//! Updates validate first and either apply atomically or leave the state
//! untouched. Every applied change appends one change-log entry per
//! changed key and notifies registered listeners with the old and new
//! configuration; a failing listener is logged and never blocks the rest.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use overseer_types::SharedClock;

use crate::patch::GovernorPatch;
use crate::settings::{ConfigError, GovernorConfig};

/// Maximum change-log entries retained (oldest dropped first).
const MAX_CHANGE_LOG: usize = 1_000;

/// One entry in the bounded configuration change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    /// Dot-separated key path that changed, e.g. `risk_weights.spawn`.
    pub key: String,
    /// The value before the change, as JSON.
    pub old: serde_json::Value,
    /// The value after the change, as JSON.
    pub new: serde_json::Value,
    /// When the change was applied.
    pub changed_at: DateTime<Utc>,
}

/// A configuration change listener.
///
/// Called with the configuration before and after each applied update.
/// Returning `Err` logs a warning; it never aborts the update or blocks
/// the remaining listeners.
pub type ChangeListener = Box<dyn FnMut(&GovernorConfig, &GovernorConfig) -> Result<(), String>>;

/// Validated, hot-reloadable configuration store.
pub struct ConfigStore {
    current: GovernorConfig,
    previous: Option<GovernorConfig>,
    change_log: VecDeque<ConfigChange>,
    listeners: Vec<ChangeListener>,
    clock: SharedClock,
}

impl core::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("change_log_len", &self.change_log.len())
            .field("listener_count", &self.listeners.len())
            .finish()
    }
}

impl ConfigStore {
    /// Create a store seeded with the given configuration.
    ///
    /// The seed goes through the same field validation as any later
    /// update, so a bad file cannot slip into the services at startup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the seed fails field
    /// validation.
    pub fn new(config: GovernorConfig, clock: SharedClock) -> Result<Self, ConfigError> {
        let errors = GovernorPatch::replacing(&config).validate();
        if !errors.is_empty() {
            warn!(error_count = errors.len(), "seed config rejected");
            return Err(ConfigError::Invalid { errors });
        }
        Ok(Self::unchecked(config, clock))
    }

    /// Create a store seeded with built-in defaults.
    pub fn with_defaults(clock: SharedClock) -> Self {
        Self::unchecked(GovernorConfig::default(), clock)
    }

    const fn unchecked(config: GovernorConfig, clock: SharedClock) -> Self {
        Self {
            current: config,
            previous: None,
            change_log: VecDeque::new(),
            listeners: Vec::new(),
            clock,
        }
    }

    /// The live configuration.
    pub const fn current(&self) -> &GovernorConfig {
        &self.current
    }

    /// The configuration before the most recent applied update, if any
    /// update has been applied.
    pub const fn previous(&self) -> Option<&GovernorConfig> {
        self.previous.as_ref()
    }

    /// Register a change listener. Listeners are invoked in registration
    /// order after every applied update.
    pub fn subscribe(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    /// Validate and apply a partial update.
    ///
    /// On validation failure the state is left unchanged. On success the
    /// prior configuration is snapshotted as "previous", only the changed
    /// keys are merged, one change-log entry is appended per changed key,
    /// and all listeners are notified with the old and new configuration.
    ///
    /// Returns the applied changes (possibly empty, when the patch was a
    /// no-op).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] with one message per failed field
    /// check when validation fails.
    pub fn update(&mut self, patch: &GovernorPatch) -> Result<Vec<ConfigChange>, ConfigError> {
        let errors = patch.validate();
        if !errors.is_empty() {
            warn!(error_count = errors.len(), "config update rejected");
            return Err(ConfigError::Invalid { errors });
        }

        let old = self.current.clone();
        let key_changes = patch.apply(&mut self.current);
        if key_changes.is_empty() {
            return Ok(Vec::new());
        }

        let changed_at = self.clock.now();
        let changes: Vec<ConfigChange> = key_changes
            .into_iter()
            .map(|change| ConfigChange {
                key: change.key,
                old: change.old,
                new: change.new,
                changed_at,
            })
            .collect();

        for change in &changes {
            self.change_log.push_back(change.clone());
        }
        while self.change_log.len() > MAX_CHANGE_LOG {
            self.change_log.pop_front();
        }

        self.previous = Some(old.clone());
        info!(changed_keys = changes.len(), "configuration updated");

        let current = self.current.clone();
        for listener in &mut self.listeners {
            if let Err(message) = listener(&old, &current) {
                warn!(%message, "config change listener failed");
            }
        }

        Ok(changes)
    }

    /// Replace the entire configuration with `config`, through the same
    /// validate/merge/log/notify path as [`Self::update`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the replacement fails field
    /// validation.
    pub fn load(&mut self, config: &GovernorConfig) -> Result<Vec<ConfigChange>, ConfigError> {
        let patch = GovernorPatch::replacing(config);
        self.update(&patch)
    }

    /// Restore built-in defaults, through the same path as [`Self::update`].
    ///
    /// # Errors
    ///
    /// Never fails in practice; the defaults always validate.
    pub fn reset(&mut self) -> Result<Vec<ConfigChange>, ConfigError> {
        self.load(&GovernorConfig::default())
    }

    /// The bounded change log, oldest first.
    pub const fn change_log(&self) -> &VecDeque<ConfigChange> {
        &self.change_log
    }

    /// Drop all change-log entries.
    pub fn clear_change_log(&mut self) {
        self.change_log.clear();
    }
}
