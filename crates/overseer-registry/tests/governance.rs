//! End-to-end flows through the assembled governance core.

#![allow(clippy::unwrap_used)]

use std::rc::Rc;

use chrono::{TimeZone, Utc};
use serde_json::json;

use overseer_config::{GovernorConfig, GovernorPatch, RateLimit};
use overseer_pipeline::StateProvider;
use overseer_registry::ServiceRegistry;
use overseer_types::{
    Decision, DecisionKind, DecisionParameters, EntityId, EntityState, GameStateSnapshot,
    ManualClock, StageName, StageOutcome, TelemetryKind, ValidationReason,
};

fn make_registry(config: GovernorConfig) -> (ServiceRegistry, Rc<ManualClock>) {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let clock = ManualClock::shared(start);
    let registry = ServiceRegistry::with_clock(config, clock.clone()).unwrap();
    (registry, clock)
}

fn provider_with_entity(entity_id: EntityId) -> StateProvider {
    Box::new(move || {
        let mut snapshot = GameStateSnapshot::empty(Utc::now());
        snapshot.entities.insert(entity_id, EntityState::alive());
        snapshot
    })
}

fn spawn_decision(entity_id: EntityId, count: u32, priority: i64) -> Decision {
    Decision::new(
        entity_id,
        "spawn_wave",
        DecisionParameters::Spawn { count },
        priority,
        Utc::now(),
    )
}

fn event_kinds(registry: &ServiceRegistry) -> Vec<TelemetryKind> {
    registry
        .pipeline()
        .telemetry()
        .events()
        .iter()
        .map(|e| e.kind)
        .collect()
}

#[test]
fn startup_rejects_a_config_file_with_a_zero_window() {
    let config = GovernorConfig::parse(
        "rate_limits:\n  spawn:\n    max_per_second: 5\n    window_ms: 0\n",
    )
    .unwrap();
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let result = ServiceRegistry::with_clock(config, ManualClock::shared(start));
    assert!(result.is_err());
}

#[test]
fn approved_decision_runs_every_stage() {
    let (mut registry, _clock) = make_registry(GovernorConfig::default());
    let entity_id = EntityId::new();
    registry
        .pipeline_mut()
        .set_state_provider(provider_with_entity(entity_id));
    registry
        .pipeline_mut()
        .set_executor(Box::new(|_decision| Ok(json!({"spawned": 1}))));

    let trace = registry.process(spawn_decision(entity_id, 1, 0));

    assert!(trace.executed);
    assert_eq!(trace.stages.len(), 4);
    assert!(trace.stages.iter().all(|s| s.outcome == StageOutcome::Pass));
    assert_eq!(trace.execution_result.unwrap(), json!({"spawned": 1}));

    let stats = registry.pipeline().stats();
    assert_eq!(stats.total_processed, 1);
    assert_eq!(stats.approved, 1);
}

#[test]
fn risk_rejection_short_circuits_the_run() {
    let (mut registry, _clock) = make_registry(GovernorConfig::default());
    let entity_id = EntityId::new();
    registry
        .pipeline_mut()
        .set_state_provider(provider_with_entity(entity_id));

    // Defaults: 30 + 9*2 + 5*5 = 73 > 70.
    let trace = registry.process(spawn_decision(entity_id, 5, 9));

    assert!(!trace.executed);
    assert_eq!(trace.stages.len(), 1);
    assert_eq!(
        trace.stages.first().unwrap().name,
        StageName::RiskAssessment
    );
    assert!(trace.validation.is_none());
}

#[test]
fn validation_rejection_skips_execution_and_telemetry_stages() {
    let (mut registry, _clock) = make_registry(GovernorConfig::default());
    // No state provider: the validator sees an empty world.
    let trace = registry.process(spawn_decision(EntityId::new(), 1, 0));

    assert!(!trace.executed);
    assert_eq!(trace.stages.len(), 2);
    assert_eq!(
        trace.validation.unwrap().reason,
        ValidationReason::EntityNotFound
    );
    assert!(event_kinds(&registry).contains(&TelemetryKind::DecisionRejected));
}

#[test]
fn executor_failure_is_recorded_but_run_completes() {
    let (mut registry, _clock) = make_registry(GovernorConfig::default());
    let entity_id = EntityId::new();
    registry
        .pipeline_mut()
        .set_state_provider(provider_with_entity(entity_id));
    registry
        .pipeline_mut()
        .set_executor(Box::new(|_decision| Err("world is saving".to_owned())));

    let trace = registry.process(spawn_decision(entity_id, 1, 0));

    assert!(!trace.executed);
    assert_eq!(trace.stages.len(), 4);
    let execution = trace
        .stages
        .iter()
        .find(|s| s.name == StageName::Execution)
        .unwrap();
    assert_eq!(execution.outcome, StageOutcome::Fail);
    assert!(event_kinds(&registry).contains(&TelemetryKind::ExecutionFailed));
}

#[test]
fn third_spawn_within_window_is_rate_limited() {
    let mut config = GovernorConfig::default();
    config.rate_limits.insert(
        DecisionKind::Spawn,
        RateLimit {
            max_per_second: 2,
            window_ms: 1_000,
        },
    );
    let (mut registry, _clock) = make_registry(config);
    let entity_id = EntityId::new();
    registry
        .pipeline_mut()
        .set_state_provider(provider_with_entity(entity_id));

    let first = registry.process(spawn_decision(entity_id, 1, 0));
    let second = registry.process(spawn_decision(entity_id, 1, 0));
    let third = registry.process(spawn_decision(entity_id, 1, 0));

    assert!(first.executed);
    assert!(second.executed);
    assert!(!third.executed);
    assert_eq!(
        third.validation.unwrap().reason,
        ValidationReason::RateLimited
    );
}

#[test]
fn spawn_flood_throttles_then_reverts_after_the_delay() {
    let mut config = GovernorConfig::default();
    config.anomaly.spawn_rate_per_second = 3;
    let (mut registry, clock) = make_registry(config);
    let entity_id = EntityId::new();
    registry
        .pipeline_mut()
        .set_state_provider(provider_with_entity(entity_id));

    for _ in 0..5 {
        registry.process(spawn_decision(entity_id, 1, 0));
    }

    let kinds = event_kinds(&registry);
    assert!(kinds.contains(&TelemetryKind::AnomalyDetected));
    assert!(kinds.contains(&TelemetryKind::AutofixTriggered));
    assert!(kinds.contains(&TelemetryKind::AutofixCompleted));
    assert!(registry.pipeline().autofix().spawn_throttled());

    clock.advance_ms(4_000);
    registry.run_maintenance();
    assert!(registry.pipeline().autofix().spawn_throttled());

    clock.advance_ms(1_500);
    registry.run_maintenance();
    assert!(!registry.pipeline().autofix().spawn_throttled());
    assert!(event_kinds(&registry).contains(&TelemetryKind::ThrottleReverted));
}

#[test]
fn hot_reload_changes_a_live_decision() {
    let (mut registry, _clock) = make_registry(GovernorConfig::default());
    let entity_id = EntityId::new();
    registry
        .pipeline_mut()
        .set_state_provider(provider_with_entity(entity_id));

    // Risk 73 is rejected under the default threshold of 70.
    assert!(!registry.process(spawn_decision(entity_id, 5, 9)).executed);

    let patch = GovernorPatch {
        risk_threshold: Some(80.0),
        ..GovernorPatch::default()
    };
    registry.update_config(&patch).unwrap();

    // The same decision now clears the raised threshold.
    assert!(registry.process(spawn_decision(entity_id, 5, 9)).executed);
    assert!(event_kinds(&registry).contains(&TelemetryKind::ConfigChanged));
}

#[test]
fn change_log_records_hot_reloads() {
    let (mut registry, _clock) = make_registry(GovernorConfig::default());
    let patch = GovernorPatch {
        risk_threshold: Some(60.0),
        ..GovernorPatch::default()
    };
    registry.update_config(&patch).unwrap();

    let log = registry.store().change_log();
    assert_eq!(log.len(), 1);
    let entry = log.front().unwrap();
    assert_eq!(entry.key, "risk_threshold");
    assert_eq!(entry.old, json!(70.0));
    assert_eq!(entry.new, json!(60.0));
}

#[test]
fn shutdown_zeroes_stats_and_is_idempotent() {
    let (mut registry, _clock) = make_registry(GovernorConfig::default());
    let entity_id = EntityId::new();
    registry
        .pipeline_mut()
        .set_state_provider(provider_with_entity(entity_id));
    registry.process(spawn_decision(entity_id, 1, 0));
    assert_eq!(registry.pipeline().stats().total_processed, 1);

    registry.shutdown();
    assert_eq!(registry.pipeline().stats().total_processed, 0);
    assert!(registry.pipeline().telemetry().events().is_empty());
    assert!(registry.pipeline().risk().assessment_log().is_empty());

    registry.shutdown();
    assert_eq!(registry.pipeline().stats().total_processed, 0);
}

#[test]
fn shutdown_cancels_a_pending_throttle_revert() {
    let mut config = GovernorConfig::default();
    config.anomaly.spawn_rate_per_second = 2;
    let (mut registry, clock) = make_registry(config);
    let entity_id = EntityId::new();
    registry
        .pipeline_mut()
        .set_state_provider(provider_with_entity(entity_id));

    for _ in 0..4 {
        registry.process(spawn_decision(entity_id, 1, 0));
    }
    assert!(registry.pipeline().autofix().spawn_throttled());
    assert!(registry.pipeline().autofix().pending_reverts() > 0);

    registry.shutdown();
    assert_eq!(registry.pipeline().autofix().pending_reverts(), 0);

    clock.advance_ms(10_000);
    registry.run_maintenance();
    assert!(!event_kinds(&registry).contains(&TelemetryKind::ThrottleReverted));
}

#[test]
fn reset_restores_defaults_after_tuning() {
    let (mut registry, _clock) = make_registry(GovernorConfig::default());
    let patch = GovernorPatch {
        risk_threshold: Some(20.0),
        ..GovernorPatch::default()
    };
    registry.update_config(&patch).unwrap();
    assert!((registry.pipeline().risk().threshold() - 20.0).abs() < f64::EPSILON);

    registry.reset().unwrap();
    assert!((registry.pipeline().risk().threshold() - 70.0).abs() < f64::EPSILON);
    assert_eq!(registry.pipeline().stats().total_processed, 0);
}
