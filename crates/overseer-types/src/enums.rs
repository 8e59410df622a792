//! Enumeration types for the Overseer decision-governance core.
//!
//! Fixed tag sets shared by every component: decision kinds, validation
//! reasons, pipeline stage names, anomaly kinds, and telemetry event kinds.
//! Wire names follow the serde rename attributes on each type.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Decision taxonomy
// ---------------------------------------------------------------------------

/// The kind of autonomous action a decision proposes.
///
/// This is a closed set: every decision entering the pipeline carries
/// exactly one of these five tags, and risk weights, rate limits, and
/// cascade prediction are all keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Update an existing enemy's behavioral state.
    EnemyUpdate,
    /// Order a squad to change tactic.
    SquadTactic,
    /// Raise or lower the world heat level.
    HeatChange,
    /// Spawn new entities into the world.
    Spawn,
    /// Remove entities from the world.
    Despawn,
}

impl DecisionKind {
    /// All decision kinds, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::EnemyUpdate,
        Self::SquadTactic,
        Self::HeatChange,
        Self::Spawn,
        Self::Despawn,
    ];

    /// Return the snake_case wire name for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnemyUpdate => "enemy_update",
            Self::SquadTactic => "squad_tactic",
            Self::HeatChange => "heat_change",
            Self::Spawn => "spawn",
            Self::Despawn => "despawn",
        }
    }
}

impl core::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tactic a squad can be ordered to adopt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TacticKind {
    /// Direct frontal attack.
    Assault,
    /// Circle around to attack from the side.
    Flank,
    /// Hold position and protect an area.
    Defend,
    /// Withdraw to a safer position.
    Retreat,
    /// Sweep an area looking for targets.
    Patrol,
}

impl TacticKind {
    /// True when the tactic intensifies combat (assault or flank).
    pub const fn is_aggressive(self) -> bool {
        matches!(self, Self::Assault | Self::Flank)
    }
}

/// Behavioral state an enemy entity can transition into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyState {
    /// Standing by, unaware of targets.
    Idle,
    /// Moving along a patrol route.
    Patrol,
    /// Actively fighting a target.
    Engage,
    /// Maneuvering around a target.
    Flank,
    /// Disengaging from combat.
    Retreat,
}

impl EnemyState {
    /// True when the state represents active combat (engage or flank).
    pub const fn is_combat(self) -> bool {
        matches!(self, Self::Engage | Self::Flank)
    }
}

// ---------------------------------------------------------------------------
// Cascade prediction
// ---------------------------------------------------------------------------

/// A game subsystem that a decision can cascade into.
///
/// Cascade multipliers in the configuration are keyed by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectedSystem {
    /// Faction membership, escalation tier, and diplomacy.
    Faction,
    /// World heat level and combat intensity.
    Heat,
    /// Squad composition and tactics.
    Squad,
    /// Global entity counts and world state.
    World,
}

impl AffectedSystem {
    /// All affected systems, in declaration order.
    pub const ALL: [Self; 4] = [Self::Faction, Self::Heat, Self::Squad, Self::World];

    /// Return the snake_case wire name for this system.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Faction => "faction",
            Self::Heat => "heat",
            Self::Squad => "squad",
            Self::World => "world",
        }
    }
}

impl core::fmt::Display for AffectedSystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Authority validation
// ---------------------------------------------------------------------------

/// Why the authority validator approved or rejected a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationReason {
    /// All checks passed.
    Approved,
    /// The acting entity is no longer alive.
    EntityDead,
    /// The action violates the faction's doctrine.
    DoctrineViolation,
    /// The per-operation rate limit was exceeded.
    RateLimited,
    /// The decision references an inconsistent state.
    InvalidState,
    /// The acting entity lacks permission for the action.
    PermissionDenied,
    /// The acting entity does not exist in the snapshot.
    EntityNotFound,
    /// The referenced faction does not exist in the snapshot.
    FactionNotFound,
}

impl ValidationReason {
    /// Return the SCREAMING_SNAKE_CASE wire name for this reason.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::EntityDead => "ENTITY_DEAD",
            Self::DoctrineViolation => "DOCTRINE_VIOLATION",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidState => "INVALID_STATE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::FactionNotFound => "FACTION_NOT_FOUND",
        }
    }
}

impl core::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// Name of a pipeline stage, in fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Risk scoring and cascade prediction.
    RiskAssessment,
    /// Deterministic authority checks.
    Validation,
    /// Handing the decision to the external executor.
    Execution,
    /// Event emission and anomaly detection.
    Telemetry,
}

/// Outcome recorded for a single pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage completed and the run may continue.
    Pass,
    /// The stage failed; later behavior depends on the stage.
    Fail,
    /// The stage was deliberately not executed.
    Skip,
}

// ---------------------------------------------------------------------------
// Anomalies
// ---------------------------------------------------------------------------

/// Kind of abnormal system condition an anomaly report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    /// Spawn rate within the sampling window exceeded the threshold.
    ExcessiveSpawning,
    /// Estimated memory usage crossed the configured ceiling.
    MemoryThreshold,
    /// A tracked entity has not changed state for too long.
    StuckAi,
    /// A component observed an internally inconsistent state.
    InvalidState,
    /// Average pipeline latency exceeded the threshold.
    PerformanceDegradation,
    /// An operation repeatedly hit its rate limit.
    RateLimitBreach,
}

impl AnomalyKind {
    /// All anomaly kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::ExcessiveSpawning,
        Self::MemoryThreshold,
        Self::StuckAi,
        Self::InvalidState,
        Self::PerformanceDegradation,
        Self::RateLimitBreach,
    ];

    /// Return the SCREAMING_SNAKE_CASE wire name for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExcessiveSpawning => "EXCESSIVE_SPAWNING",
            Self::MemoryThreshold => "MEMORY_THRESHOLD",
            Self::StuckAi => "STUCK_AI",
            Self::InvalidState => "INVALID_STATE",
            Self::PerformanceDegradation => "PERFORMANCE_DEGRADATION",
            Self::RateLimitBreach => "RATE_LIMIT_BREACH",
        }
    }
}

impl core::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    /// Notable but requires no action.
    Low,
    /// Warrants monitoring.
    Medium,
    /// Requires remediation.
    High,
    /// Requires immediate human attention.
    Critical,
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// Kind of a telemetry event emitted by the governance core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    /// A decision was scored by the risk engine.
    DecisionAssessed,
    /// A decision passed through the authority validator.
    DecisionValidated,
    /// A decision was rejected by risk scoring or validation.
    DecisionRejected,
    /// A decision was executed successfully.
    DecisionExecuted,
    /// The external executor reported a failure.
    ExecutionFailed,
    /// The anomaly detector found a matching condition.
    AnomalyDetected,
    /// An autofix handler was invoked for an anomaly.
    AutofixTriggered,
    /// An autofix handler remediated its anomaly.
    AutofixCompleted,
    /// An autofix handler gave up and escalated.
    AutofixFailed,
    /// The live configuration was changed.
    ConfigChanged,
    /// Spawning was throttled by the self-healing layer.
    SpawnThrottled,
    /// A spawn throttle was reverted after its delay.
    ThrottleReverted,
    /// An entity was reset by the self-healing layer.
    EntityReset,
}

impl TelemetryKind {
    /// Return the snake_case wire name for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DecisionAssessed => "decision_assessed",
            Self::DecisionValidated => "decision_validated",
            Self::DecisionRejected => "decision_rejected",
            Self::DecisionExecuted => "decision_executed",
            Self::ExecutionFailed => "execution_failed",
            Self::AnomalyDetected => "anomaly_detected",
            Self::AutofixTriggered => "autofix_triggered",
            Self::AutofixCompleted => "autofix_completed",
            Self::AutofixFailed => "autofix_failed",
            Self::ConfigChanged => "config_changed",
            Self::SpawnThrottled => "spawn_throttled",
            Self::ThrottleReverted => "throttle_reverted",
            Self::EntityReset => "entity_reset",
        }
    }
}

impl core::fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
