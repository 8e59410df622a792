//! Demo binary for the Overseer governance core.
//!
//! Builds the full service registry, wires a toy game world behind the
//! state provider and executor, then drives a scripted batch of
//! decisions through the pipeline: routine orders, a doomed high-risk
//! spawn, a doctrine violation, and a spawn flood that trips the anomaly
//! detector and the spawn throttle.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `overseer-config.yaml` when present
//! 3. Build the service registry (store, services, pipeline)
//! 4. Wire the demo world: state provider and executor
//! 5. Run the scripted decision batch
//! 6. Run maintenance until the spawn throttle reverts
//! 7. Log pipeline stats and telemetry counters

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use overseer_config::GovernorConfig;
use overseer_registry::ServiceRegistry;
use overseer_types::{
    Decision, DecisionParameters, EnemyState, EntityId, EntityState, FactionDoctrine, FactionId,
    GameStateSnapshot, TacticKind,
};

const CONFIG_PATH: &str = "overseer-config.yaml";

fn main() -> anyhow::Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("overseer-engine starting");

    // 2. Load configuration, falling back to built-in defaults.
    let config = load_config().context("loading configuration")?;
    info!(
        risk_threshold = config.risk_threshold,
        spawn_rate_per_second = config.anomaly.spawn_rate_per_second,
        max_events = config.telemetry.max_events,
        "configuration loaded"
    );

    // 3. Build the service registry; an invalid file aborts startup.
    let mut registry = ServiceRegistry::new(config).context("validating configuration")?;
    info!("service registry constructed");

    // 4. Wire the demo world.
    let (snapshot, grunt, captain, faction) = demo_world();
    registry.pipeline_mut().set_state_provider(Box::new(move || snapshot.clone()));
    registry.pipeline_mut().set_executor(Box::new(|decision| {
        Ok(json!({
            "executed_action": decision.action,
            "entity_id": decision.entity_id,
        }))
    }));
    info!(%grunt, %captain, "demo world wired");

    // 5. Scripted decision batch.
    let decisions = vec![
        Decision::new(
            grunt,
            "engage_player",
            DecisionParameters::EnemyUpdate {
                new_state: EnemyState::Engage,
            },
            2,
            Utc::now(),
        ),
        Decision::new(
            captain,
            "flank_left",
            DecisionParameters::SquadTactic {
                tactic: TacticKind::Flank,
            },
            4,
            Utc::now(),
        )
        .with_faction(faction),
        Decision::new(
            grunt,
            "raise_heat",
            DecisionParameters::HeatChange { delta: 12.0 },
            1,
            Utc::now(),
        ),
        // Rejected by risk: 30 + 18 + 25 = 73 over the default 70.
        Decision::new(
            captain,
            "spawn_wave",
            DecisionParameters::Spawn { count: 5 },
            9,
            Utc::now(),
        ),
        // Rejected by doctrine: the faction forbids retreating.
        Decision::new(
            captain,
            "full_retreat",
            DecisionParameters::SquadTactic {
                tactic: TacticKind::Retreat,
            },
            3,
            Utc::now(),
        )
        .with_faction(faction),
    ];
    for decision in decisions {
        let trace = registry.process(decision);
        info!(
            trace_id = %trace.trace_id,
            kind = %trace.decision.kind,
            executed = trace.executed,
            stages = trace.stages.len(),
            latency_ms = trace.total_latency_ms,
            "decision processed"
        );
    }

    // Hot-reload a permissive spawn rate limit and a tight anomaly
    // threshold so the flood reaches the detector instead of the
    // rate limiter.
    let mut rate_limits = std::collections::BTreeMap::new();
    rate_limits.insert(
        overseer_types::DecisionKind::Spawn,
        overseer_config::RateLimit {
            max_per_second: 100,
            window_ms: 1_000,
        },
    );
    let patch = overseer_config::GovernorPatch {
        rate_limits,
        anomaly: overseer_config::AnomalyPatch {
            spawn_rate_per_second: Some(10),
            ..overseer_config::AnomalyPatch::default()
        },
        ..overseer_config::GovernorPatch::default()
    };
    let changes = registry.update_config(&patch).context("applying flood tuning")?;
    info!(changed_keys = changes.len(), "flood tuning applied");

    // Spawn flood: enough executed spawns inside one second to trip the
    // detector and engage the throttle.
    info!("starting spawn flood");
    for _ in 0..24 {
        registry.process(Decision::new(
            grunt,
            "spawn_wave",
            DecisionParameters::Spawn { count: 1 },
            0,
            Utc::now(),
        ));
    }
    if registry.pipeline().autofix().spawn_throttled() {
        warn!("spawn throttle engaged by autofix");
    }

    // 6. Maintenance: counters and due throttle reverts.
    registry.run_maintenance();
    info!(
        pending_reverts = registry.pipeline().autofix().pending_reverts(),
        "maintenance pass complete"
    );

    // 7. Final stats.
    let stats = registry.pipeline().stats();
    let counters = registry.pipeline().telemetry().counters();
    info!(
        total_processed = stats.total_processed,
        approved = stats.approved,
        rejected = stats.rejected,
        average_latency_ms = stats.average_latency_ms,
        "pipeline stats"
    );
    info!(
        decisions_per_second = counters.decisions_per_second,
        total_decisions = counters.total_decisions,
        total_rejections = counters.total_rejections,
        total_autofixes = counters.total_autofixes,
        active_entities = counters.active_entities,
        estimated_memory_mb = counters.estimated_memory_mb,
        "telemetry counters"
    );

    Ok(())
}

/// Load `overseer-config.yaml` when it exists, defaults otherwise.
fn load_config() -> anyhow::Result<GovernorConfig> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        let config = GovernorConfig::from_file(path)
            .with_context(|| format!("parsing {CONFIG_PATH}"))?;
        Ok(config)
    } else {
        info!("no {CONFIG_PATH} found, using built-in defaults");
        Ok(GovernorConfig::default())
    }
}

/// A small fixed world: two living entities and one faction whose
/// doctrine forbids retreating.
fn demo_world() -> (GameStateSnapshot, EntityId, EntityId, FactionId) {
    let grunt = EntityId::new();
    let captain = EntityId::new();
    let faction = FactionId::new();

    let mut snapshot = GameStateSnapshot::empty(Utc::now());
    snapshot.entities.insert(grunt, EntityState::alive());
    snapshot.entities.insert(
        captain,
        EntityState {
            alive: true,
            state: Some(EnemyState::Patrol),
            faction_id: Some(faction),
            squad_id: None,
        },
    );
    snapshot.factions.insert(
        faction,
        FactionDoctrine {
            allowed_actions: Vec::new(),
            forbidden_actions: vec!["full_retreat".to_owned()],
        },
    );

    (snapshot, grunt, captain, faction)
}
