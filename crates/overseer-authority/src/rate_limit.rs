//! Fixed-window rate limiting per operation type.
//!
//! Each decision kind gets its own window. A check increments the
//! window's counter as a side effect and passes while the count stays at
//! or below the configured maximum. When the window has aged past
//! `window_ms`, it restarts at the checking instant.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use overseer_config::RateLimit;
use overseer_types::DecisionKind;

/// One live counting window.
#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Per-kind fixed-window counters.
///
/// Deterministic: the outcome of a check depends only on the configured
/// limits, the prior checks, and the instants they were made at.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limits: BTreeMap<DecisionKind, RateLimit>,
    windows: BTreeMap<DecisionKind, Window>,
}

impl FixedWindowLimiter {
    /// Create a limiter with the given per-kind limits.
    pub const fn new(limits: BTreeMap<DecisionKind, RateLimit>) -> Self {
        Self {
            limits,
            windows: BTreeMap::new(),
        }
    }

    /// Record one operation of `kind` at `now` and report whether it is
    /// within the limit.
    ///
    /// Kinds without a configured limit always pass (and no counter is
    /// kept for them).
    pub fn check(&mut self, kind: DecisionKind, now: DateTime<Utc>) -> bool {
        let Some(limit) = self.limits.get(&kind).copied() else {
            return true;
        };

        let window_ms = i64::try_from(limit.window_ms).unwrap_or(i64::MAX);
        let window = self
            .windows
            .entry(kind)
            .or_insert(Window {
                started_at: now,
                count: 0,
            });

        let elapsed = now.signed_duration_since(window.started_at).num_milliseconds();
        if elapsed >= window_ms || elapsed < 0 {
            window.started_at = now;
            window.count = 0;
        }

        window.count = window.count.saturating_add(1);
        window.count <= limit.max_per_second
    }

    /// The configured limit for a kind, if any.
    pub fn limit(&self, kind: DecisionKind) -> Option<RateLimit> {
        self.limits.get(&kind).copied()
    }

    /// Replace the limit for one kind and restart its window.
    pub fn set_limit(&mut self, kind: DecisionKind, limit: RateLimit) {
        self.limits.insert(kind, limit);
        self.windows.remove(&kind);
    }

    /// Shallow-merge limits for several kinds, restarting their windows.
    pub fn merge_limits(&mut self, limits: &BTreeMap<DecisionKind, RateLimit>) {
        for (kind, limit) in limits {
            self.set_limit(*kind, *limit);
        }
    }

    /// The live count within the current window for a kind.
    pub fn window_count(&self, kind: DecisionKind) -> u32 {
        self.windows.get(&kind).map_or(0, |window| window.count)
    }

    /// Drop all live windows, keeping the configured limits.
    pub fn reset(&mut self) {
        self.windows.clear();
    }
}
