//! Derived record types produced by the governance pipeline.
//!
//! Everything here is append-only output: risk assessments, validation
//! results, pipeline traces, anomaly reports, autofix results, and
//! telemetry events. Records are immutable once constructed and are
//! propagated strictly by value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::enums::{
    AffectedSystem, AnomalyKind, AnomalySeverity, DecisionKind, StageName, StageOutcome,
    TelemetryKind, ValidationReason,
};
use crate::ids::{AnomalyId, DecisionId, EntityId, TelemetryEventId, TraceId};

// ---------------------------------------------------------------------------
// Risk assessment
// ---------------------------------------------------------------------------

/// A predicted secondary change to another subsystem caused by executing
/// a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadingEffect {
    /// The subsystem the change lands in.
    pub system: AffectedSystem,
    /// Name of the variable expected to change.
    pub variable: String,
    /// Predicted signed change to the variable.
    pub predicted_change: f64,
    /// Confidence in the prediction, in `[0, 1]`.
    pub confidence: f64,
}

/// The risk engine's verdict on a single decision.
///
/// Derived and immutable; appended to the engine's bounded log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// The assessed decision.
    pub decision_id: DecisionId,
    /// Kind of the assessed decision.
    pub decision_kind: DecisionKind,
    /// Risk score, clamped to `[0, 100]`.
    pub risk_score: f64,
    /// Predicted cascading effects.
    pub cascading_effects: Vec<CascadingEffect>,
    /// Whether the score is at or below the configured threshold.
    pub approved: bool,
    /// Why the decision was rejected; `None` when approved.
    pub rejection_reason: Option<String>,
    /// When the assessment was made.
    pub assessed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Authority validation
// ---------------------------------------------------------------------------

/// The authority validator's verdict on a single decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether all checks passed.
    pub valid: bool,
    /// Which check decided the outcome.
    pub reason: ValidationReason,
    /// Free-form detail about the deciding check.
    pub details: Option<String>,
    /// The entity the deciding check concerned, when applicable.
    pub entity_id: Option<EntityId>,
    /// When the validation ran.
    pub validated_at: DateTime<Utc>,
}

impl ValidationResult {
    /// Build an approved result.
    pub const fn approved(validated_at: DateTime<Utc>) -> Self {
        Self {
            valid: true,
            reason: ValidationReason::Approved,
            details: None,
            entity_id: None,
            validated_at,
        }
    }

    /// Build a rejection with the given reason and detail.
    pub const fn rejected(
        reason: ValidationReason,
        details: Option<String>,
        entity_id: Option<EntityId>,
        validated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            valid: false,
            reason,
            details,
            entity_id,
            validated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline traces
// ---------------------------------------------------------------------------

/// The record of one pipeline stage within a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    /// Which stage this record describes.
    pub name: StageName,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended. Always `>= started_at`.
    pub ended_at: DateTime<Utc>,
    /// Outcome of the stage.
    pub outcome: StageOutcome,
    /// Free-form detail (failure messages, rejection reasons).
    pub details: Option<String>,
}

/// The full record of one decision's journey through the pipeline.
///
/// A risk-rejected decision has no validation stage at all; a
/// validation-rejected decision has no execution or telemetry stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTrace {
    /// Unique identifier for this run.
    pub trace_id: TraceId,
    /// The decision that was processed.
    pub decision: Decision,
    /// The risk verdict, when the stage ran to a result.
    pub risk: Option<RiskAssessment>,
    /// The validation verdict, when the stage ran.
    pub validation: Option<ValidationResult>,
    /// Whether the execution stage treated the decision as executed.
    pub executed: bool,
    /// Opaque result returned by the executor, stored verbatim.
    pub execution_result: Option<serde_json::Value>,
    /// Total wall-clock latency of the run in milliseconds.
    pub total_latency_ms: f64,
    /// Ordered stage records.
    pub stages: Vec<PipelineStage>,
    /// When the trace was recorded.
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Anomalies and self-healing
// ---------------------------------------------------------------------------

/// An abnormal system condition detected from telemetry.
///
/// Transient: produced and consumed within one detection cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// Unique identifier for this detection.
    pub id: AnomalyId,
    /// Which abnormal condition was detected.
    pub kind: AnomalyKind,
    /// How severe the condition is.
    pub severity: AnomalySeverity,
    /// Entities implicated in the condition.
    pub affected_entities: Vec<EntityId>,
    /// When the condition was detected.
    pub detected_at: DateTime<Utc>,
    /// Metric values that triggered the detection.
    pub metrics: BTreeMap<String, f64>,
    /// Human-readable description of the condition.
    pub description: String,
}

/// The outcome of one autofix attempt for one anomaly report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutofixResult {
    /// Whether the remediation succeeded.
    pub success: bool,
    /// The anomaly this result answers.
    pub anomaly_id: AnomalyId,
    /// Kind of the anomaly this result answers.
    pub anomaly_kind: AnomalyKind,
    /// Short name of the remediation that was taken.
    pub action_taken: String,
    /// Number of entities the remediation touched.
    pub entities_affected: u32,
    /// Whether the engine gave up and escalated to a human.
    pub escalated: bool,
    /// When the attempt finished.
    pub resolved_at: DateTime<Utc>,
    /// Free-form detail (handler messages, attempt counts).
    pub details: Option<String>,
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// A single telemetry event recorded by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Unique identifier for the event.
    pub event_id: TelemetryEventId,
    /// Kind of the event.
    pub kind: TelemetryKind,
    /// When the event was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Structured payload.
    pub data: serde_json::Value,
    /// Latency associated with the event, when meaningful.
    pub latency_ms: Option<f64>,
    /// The pipeline trace this event belongs to, when any.
    pub trace_id: Option<TraceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_constructors() {
        let now = Utc::now();
        let ok = ValidationResult::approved(now);
        assert!(ok.valid);
        assert_eq!(ok.reason, ValidationReason::Approved);

        let dead = ValidationResult::rejected(
            ValidationReason::EntityDead,
            Some("entity is dead".to_owned()),
            None,
            now,
        );
        assert!(!dead.valid);
        assert_eq!(dead.reason, ValidationReason::EntityDead);
    }

    #[test]
    fn trace_serde_roundtrip() {
        let now = Utc::now();
        let decision = Decision::new(
            EntityId::new(),
            "spawn_wave",
            crate::decision::DecisionParameters::Spawn { count: 2 },
            1,
            now,
        );
        let trace = PipelineTrace {
            trace_id: TraceId::new(),
            decision,
            risk: None,
            validation: None,
            executed: false,
            execution_result: None,
            total_latency_ms: 0.0,
            stages: vec![PipelineStage {
                name: StageName::RiskAssessment,
                started_at: now,
                ended_at: now,
                outcome: StageOutcome::Fail,
                details: None,
            }],
            recorded_at: now,
        };
        let json = serde_json::to_string(&trace).ok();
        assert!(json.is_some());
        let restored: Result<PipelineTrace, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert!(restored.is_ok());
    }
}
