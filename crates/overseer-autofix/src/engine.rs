//! The autofix engine: type-keyed remediation with retry-then-escalate.
//!
//! One handler per anomaly kind, all six pre-registered. A handler that
//! reports failure gets one retry per anomaly (the budget is tracked by
//! anomaly id); a second failure, or a handler error, escalates to a
//! human. Escalation is terminal, so the retry entry is dropped with it
//! and the attempt map only holds anomalies mid-flight. The engine never
//! emits telemetry itself: every attempt returns an [`AutofixResult`]
//! and the caller owns the relay.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use overseer_types::{
    AnomalyId, AnomalyKind, AnomalyReport, AutofixResult, EntityId, SharedClock,
};

use crate::revert::{RevertEvent, RevertScheduler};

/// Delay before a spawn throttle is automatically reverted.
pub const THROTTLE_REVERT_DELAY_MS: u64 = 5_000;

/// Extra attempts allowed per anomaly after the first failure.
const RETRY_BUDGET: u32 = 1;

/// What a handler did, before the engine folds in escalation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    /// Whether the remediation took effect.
    pub success: bool,
    /// Short name of the remediation.
    pub action: String,
    /// Number of entities the remediation touched.
    pub entities_affected: u32,
    /// Free-form detail.
    pub details: Option<String>,
}

/// A replaceable remediation handler for one anomaly kind.
///
/// `Err` means the handler itself broke; `Ok` with `success == false`
/// means it ran but the remediation did not take.
pub type FixHandler = Box<dyn FnMut(&AnomalyReport) -> Result<FixOutcome, String>>;

/// Notified when the spawn throttle flips. Failures are logged, never
/// propagated.
pub type ThrottleCallback = Box<dyn FnMut(bool) -> Result<(), String>>;

/// Resets one entity back to a sane state.
pub type ResetCallback = Box<dyn FnMut(EntityId) -> Result<(), String>>;

/// Best-effort host garbage-collection hook.
pub type GcHook = Box<dyn FnMut() -> Result<(), String>>;

enum Handler {
    Builtin,
    Custom(FixHandler),
}

/// Self-healing engine keyed by anomaly kind.
pub struct AutofixEngine {
    handlers: BTreeMap<AnomalyKind, Handler>,
    attempts: BTreeMap<AnomalyId, u32>,
    throttled: bool,
    scheduler: RevertScheduler,
    throttle_callback: Option<ThrottleCallback>,
    reset_callback: Option<ResetCallback>,
    gc_hook: Option<GcHook>,
    clock: SharedClock,
}

impl core::fmt::Debug for AutofixEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AutofixEngine")
            .field("throttled", &self.throttled)
            .field("pending_reverts", &self.scheduler.pending_count())
            .field("tracked_attempts", &self.attempts.len())
            .finish_non_exhaustive()
    }
}

impl AutofixEngine {
    /// Create an engine with the default handler for every anomaly kind.
    pub fn new(clock: SharedClock) -> Self {
        let handlers = AnomalyKind::ALL
            .into_iter()
            .map(|kind| (kind, Handler::Builtin))
            .collect();
        Self {
            handlers,
            attempts: BTreeMap::new(),
            throttled: false,
            scheduler: RevertScheduler::new(),
            throttle_callback: None,
            reset_callback: None,
            gc_hook: None,
            clock,
        }
    }

    /// Attempt remediation for one anomaly report.
    ///
    /// Retries once per anomaly id after a reported failure; a second
    /// failure, an exhausted budget, or a handler error escalates.
    pub fn trigger(&mut self, report: &AnomalyReport) -> AutofixResult {
        let resolved_at = self.clock.now();

        if !self.handlers.contains_key(&report.kind) {
            warn!(kind = %report.kind, "no autofix handler registered");
            return AutofixResult {
                success: false,
                anomaly_id: report.id,
                anomaly_kind: report.kind,
                action_taken: "none".to_owned(),
                entities_affected: 0,
                escalated: true,
                resolved_at,
                details: Some(format!("no handler registered for {}", report.kind)),
            };
        }

        loop {
            match self.run_handler(report) {
                Err(message) => {
                    warn!(kind = %report.kind, message, "autofix handler failed");
                    return AutofixResult {
                        success: false,
                        anomaly_id: report.id,
                        anomaly_kind: report.kind,
                        action_taken: "error".to_owned(),
                        entities_affected: 0,
                        escalated: true,
                        resolved_at,
                        details: Some(message),
                    };
                }
                Ok(outcome) if outcome.success => {
                    self.attempts.remove(&report.id);
                    debug!(kind = %report.kind, action = outcome.action, "autofix applied");
                    return AutofixResult {
                        success: true,
                        anomaly_id: report.id,
                        anomaly_kind: report.kind,
                        action_taken: outcome.action,
                        entities_affected: outcome.entities_affected,
                        escalated: false,
                        resolved_at,
                        details: outcome.details,
                    };
                }
                Ok(outcome) => {
                    let used = self.attempts.entry(report.id).or_insert(0);
                    if *used < RETRY_BUDGET {
                        *used = used.saturating_add(1);
                        debug!(kind = %report.kind, "autofix failed, retrying");
                        continue;
                    }
                    let attempt_count = used.saturating_add(1);
                    self.attempts.remove(&report.id);
                    return AutofixResult {
                        success: false,
                        anomaly_id: report.id,
                        anomaly_kind: report.kind,
                        action_taken: outcome.action,
                        entities_affected: outcome.entities_affected,
                        escalated: true,
                        resolved_at,
                        details: Some(format!(
                            "remediation failed after {attempt_count} attempts"
                        )),
                    };
                }
            }
        }
    }

    fn run_handler(&mut self, report: &AnomalyReport) -> Result<FixOutcome, String> {
        if let Some(Handler::Custom(run)) = self.handlers.get_mut(&report.kind) {
            return run(report);
        }
        Ok(self.run_builtin(report))
    }

    /// Built-in remediations. None of these can error; policy failures
    /// are reported through `success`.
    fn run_builtin(&mut self, report: &AnomalyReport) -> FixOutcome {
        match report.kind {
            AnomalyKind::ExcessiveSpawning => {
                self.throttled = true;
                self.notify_throttle(true);
                self.scheduler
                    .schedule(self.clock.now(), THROTTLE_REVERT_DELAY_MS);
                FixOutcome {
                    success: true,
                    action: "throttle_spawning".to_owned(),
                    entities_affected: 0,
                    details: Some(format!(
                        "spawn throttle engaged, revert in {THROTTLE_REVERT_DELAY_MS}ms"
                    )),
                }
            }
            AnomalyKind::StuckAi => {
                let count = self.reset_entities(&report.affected_entities);
                FixOutcome {
                    success: true,
                    action: "reset_stuck_entities".to_owned(),
                    entities_affected: count,
                    details: None,
                }
            }
            AnomalyKind::PerformanceDegradation => FixOutcome {
                success: false,
                action: "flag_for_review".to_owned(),
                entities_affected: 0,
                details: Some("performance issues require human review".to_owned()),
            },
            AnomalyKind::InvalidState => {
                let count = self.reset_entities(&report.affected_entities);
                FixOutcome {
                    success: count > 0,
                    action: "reset_invalid_entities".to_owned(),
                    entities_affected: count,
                    details: None,
                }
            }
            AnomalyKind::MemoryThreshold => {
                if let Some(hook) = self.gc_hook.as_mut() {
                    if let Err(message) = hook() {
                        warn!(message, "gc hook failed");
                    }
                }
                FixOutcome {
                    success: true,
                    action: "trigger_gc".to_owned(),
                    entities_affected: 0,
                    details: None,
                }
            }
            AnomalyKind::RateLimitBreach => FixOutcome {
                success: true,
                action: "noop".to_owned(),
                entities_affected: 0,
                details: None,
            },
        }
    }

    fn reset_entities(&mut self, entities: &[EntityId]) -> u32 {
        if let Some(reset) = self.reset_callback.as_mut() {
            for entity_id in entities {
                if let Err(message) = reset(*entity_id) {
                    warn!(%entity_id, message, "entity reset callback failed");
                }
            }
        }
        u32::try_from(entities.len()).unwrap_or(u32::MAX)
    }

    fn notify_throttle(&mut self, throttled: bool) {
        if let Some(callback) = self.throttle_callback.as_mut() {
            if let Err(message) = callback(throttled) {
                warn!(throttled, message, "throttle callback failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Wiring and lifecycle
    // -----------------------------------------------------------------------

    /// Replace the handler for one anomaly kind.
    pub fn register_handler(&mut self, kind: AnomalyKind, handler: FixHandler) {
        self.handlers.insert(kind, Handler::Custom(handler));
    }

    /// Remove the handler for one anomaly kind entirely. Reports of that
    /// kind then escalate with action `"none"`.
    pub fn unregister_handler(&mut self, kind: AnomalyKind) {
        self.handlers.remove(&kind);
    }

    /// Set the callback notified when the spawn throttle flips.
    pub fn set_throttle_callback(&mut self, callback: ThrottleCallback) {
        self.throttle_callback = Some(callback);
    }

    /// Set the callback used to reset individual entities.
    pub fn set_reset_callback(&mut self, callback: ResetCallback) {
        self.reset_callback = Some(callback);
    }

    /// Set the best-effort host garbage-collection hook.
    pub fn set_gc_hook(&mut self, hook: GcHook) {
        self.gc_hook = Some(hook);
    }

    /// Whether the spawn throttle is currently engaged.
    pub const fn spawn_throttled(&self) -> bool {
        self.throttled
    }

    /// Number of reverts still scheduled.
    pub fn pending_reverts(&self) -> usize {
        self.scheduler.pending_count()
    }

    /// Number of anomalies with an open retry budget. Entries are dropped
    /// on success and on escalation, so this never grows past the set of
    /// anomalies currently mid-retry.
    pub fn tracked_attempts(&self) -> usize {
        self.attempts.len()
    }

    /// Apply any due throttle reverts and report them.
    pub fn poll_reverts(&mut self) -> Vec<RevertEvent> {
        let now = self.clock.now();
        let due = self.scheduler.poll_due(now);
        if !due.is_empty() && self.throttled {
            self.throttled = false;
            self.notify_throttle(false);
            debug!("spawn throttle reverted");
        }
        due
    }

    /// Drop retry state and the throttle, cancelling pending reverts.
    /// Handlers and callbacks survive.
    pub fn clear(&mut self) {
        self.scheduler.cancel_all();
        self.attempts.clear();
        self.throttled = false;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use chrono::{TimeZone, Utc};
    use overseer_types::{AnomalySeverity, ManualClock};

    use super::*;

    fn make_engine() -> (AutofixEngine, Rc<ManualClock>) {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::shared(start);
        (AutofixEngine::new(clock.clone()), clock)
    }

    fn report(kind: AnomalyKind, affected: Vec<EntityId>) -> AnomalyReport {
        AnomalyReport {
            id: AnomalyId::new(),
            kind,
            severity: AnomalySeverity::High,
            affected_entities: affected,
            detected_at: Utc::now(),
            metrics: BTreeMap::new(),
            description: "test anomaly".to_owned(),
        }
    }

    #[test]
    fn excessive_spawning_throttles_then_reverts_after_delay() {
        let (mut engine, clock) = make_engine();
        let flips = Rc::new(RefCell::new(Vec::new()));
        let log = flips.clone();
        engine.set_throttle_callback(Box::new(move |throttled| {
            log.borrow_mut().push(throttled);
            Ok(())
        }));

        let result = engine.trigger(&report(AnomalyKind::ExcessiveSpawning, Vec::new()));
        assert!(result.success);
        assert_eq!(result.action_taken, "throttle_spawning");
        assert!(engine.spawn_throttled());
        assert_eq!(engine.pending_reverts(), 1);

        clock.advance_ms(4_999);
        assert!(engine.poll_reverts().is_empty());
        assert!(engine.spawn_throttled());

        clock.advance_ms(1);
        assert_eq!(engine.poll_reverts().len(), 1);
        assert!(!engine.spawn_throttled());
        assert_eq!(*flips.borrow(), vec![true, false]);
    }

    #[test]
    fn stuck_ai_resets_exactly_the_affected_entities() {
        let (mut engine, _clock) = make_engine();
        let reset_ids = Rc::new(RefCell::new(Vec::new()));
        let log = reset_ids.clone();
        engine.set_reset_callback(Box::new(move |entity_id| {
            log.borrow_mut().push(entity_id);
            Ok(())
        }));

        let entities = vec![EntityId::new(), EntityId::new(), EntityId::new()];
        let result = engine.trigger(&report(AnomalyKind::StuckAi, entities.clone()));
        assert!(result.success);
        assert_eq!(result.entities_affected, 3);
        assert_eq!(*reset_ids.borrow(), entities);
    }

    #[test]
    fn performance_degradation_always_escalates() {
        let (mut engine, _clock) = make_engine();
        let result = engine.trigger(&report(AnomalyKind::PerformanceDegradation, Vec::new()));
        assert!(!result.success);
        assert!(result.escalated);
        assert_eq!(result.action_taken, "flag_for_review");
        assert!(result.details.unwrap().contains("attempts"));
    }

    #[test]
    fn invalid_state_fails_without_affected_entities() {
        let (mut engine, _clock) = make_engine();
        let failing = engine.trigger(&report(AnomalyKind::InvalidState, Vec::new()));
        assert!(!failing.success);
        assert!(failing.escalated);

        let fixed = engine.trigger(&report(AnomalyKind::InvalidState, vec![EntityId::new()]));
        assert!(fixed.success);
        assert_eq!(fixed.entities_affected, 1);
    }

    #[test]
    fn memory_threshold_runs_gc_hook() {
        let (mut engine, _clock) = make_engine();
        let ran = Rc::new(RefCell::new(false));
        let flag = ran.clone();
        engine.set_gc_hook(Box::new(move || {
            *flag.borrow_mut() = true;
            Ok(())
        }));
        let result = engine.trigger(&report(AnomalyKind::MemoryThreshold, Vec::new()));
        assert!(result.success);
        assert!(*ran.borrow());
    }

    #[test]
    fn rate_limit_breach_is_noop_success() {
        let (mut engine, _clock) = make_engine();
        let result = engine.trigger(&report(AnomalyKind::RateLimitBreach, Vec::new()));
        assert!(result.success);
        assert_eq!(result.action_taken, "noop");
        assert!(!result.escalated);
    }

    #[test]
    fn custom_handler_failing_twice_escalates() {
        let (mut engine, _clock) = make_engine();
        let calls = Rc::new(RefCell::new(0_u32));
        let counter = calls.clone();
        engine.register_handler(
            AnomalyKind::RateLimitBreach,
            Box::new(move |_report| {
                let mut calls = counter.borrow_mut();
                *calls = calls.saturating_add(1);
                Ok(FixOutcome {
                    success: false,
                    action: "custom_fix".to_owned(),
                    entities_affected: 0,
                    details: None,
                })
            }),
        );

        let result = engine.trigger(&report(AnomalyKind::RateLimitBreach, Vec::new()));
        assert!(!result.success);
        assert!(result.escalated);
        assert_eq!(*calls.borrow(), 2);
        assert_eq!(result.details.unwrap(), "remediation failed after 2 attempts");
    }

    #[test]
    fn custom_handler_succeeding_on_retry_is_not_escalated() {
        let (mut engine, _clock) = make_engine();
        let calls = Rc::new(RefCell::new(0_u32));
        let counter = calls.clone();
        engine.register_handler(
            AnomalyKind::StuckAi,
            Box::new(move |_report| {
                let mut calls = counter.borrow_mut();
                *calls = calls.saturating_add(1);
                Ok(FixOutcome {
                    success: *calls > 1,
                    action: "custom_fix".to_owned(),
                    entities_affected: 0,
                    details: None,
                })
            }),
        );

        let result = engine.trigger(&report(AnomalyKind::StuckAi, Vec::new()));
        assert!(result.success);
        assert!(!result.escalated);
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn escalation_drops_the_retry_entry() {
        let (mut engine, _clock) = make_engine();
        for _ in 0..50 {
            let result =
                engine.trigger(&report(AnomalyKind::PerformanceDegradation, Vec::new()));
            assert!(result.escalated);
            assert_eq!(engine.tracked_attempts(), 0);
        }
    }

    #[test]
    fn retried_success_drops_the_retry_entry() {
        let (mut engine, _clock) = make_engine();
        let calls = Rc::new(RefCell::new(0_u32));
        let counter = calls.clone();
        engine.register_handler(
            AnomalyKind::StuckAi,
            Box::new(move |_report| {
                let mut calls = counter.borrow_mut();
                *calls = calls.saturating_add(1);
                Ok(FixOutcome {
                    success: *calls > 1,
                    action: "custom_fix".to_owned(),
                    entities_affected: 0,
                    details: None,
                })
            }),
        );
        let result = engine.trigger(&report(AnomalyKind::StuckAi, Vec::new()));
        assert!(result.success);
        assert_eq!(engine.tracked_attempts(), 0);
    }

    #[test]
    fn handler_error_synthesizes_escalated_failure() {
        let (mut engine, _clock) = make_engine();
        engine.register_handler(
            AnomalyKind::StuckAi,
            Box::new(|_report| Err("handler blew up".to_owned())),
        );
        let result = engine.trigger(&report(AnomalyKind::StuckAi, Vec::new()));
        assert!(!result.success);
        assert!(result.escalated);
        assert_eq!(result.action_taken, "error");
        assert_eq!(result.details.unwrap(), "handler blew up");
    }

    #[test]
    fn missing_handler_escalates_with_action_none() {
        let (mut engine, _clock) = make_engine();
        engine.unregister_handler(AnomalyKind::StuckAi);
        let result = engine.trigger(&report(AnomalyKind::StuckAi, Vec::new()));
        assert!(!result.success);
        assert!(result.escalated);
        assert_eq!(result.action_taken, "none");
    }

    #[test]
    fn clear_cancels_reverts_and_drops_throttle() {
        let (mut engine, clock) = make_engine();
        engine.trigger(&report(AnomalyKind::ExcessiveSpawning, Vec::new()));
        assert!(engine.spawn_throttled());
        assert_eq!(engine.pending_reverts(), 1);

        engine.clear();
        assert!(!engine.spawn_throttled());
        assert_eq!(engine.pending_reverts(), 0);

        clock.advance_ms(10_000);
        assert!(engine.poll_reverts().is_empty());
    }
}
