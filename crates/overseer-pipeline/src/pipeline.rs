//! The decision pipeline: risk → validation → execution → telemetry.
//!
//! The pipeline owns the four governance services by value and walks
//! every decision through the fixed stage order, producing one trace per
//! run. Risk rejection stops the run with only the risk stage recorded;
//! validation rejection stops it after the validation stage; an executor
//! failure is recorded but still reaches the telemetry stage. The
//! telemetry stage runs anomaly detection exactly once and relays any
//! report to the autofix engine, emitting the trigger and outcome events
//! itself so the hub and the engine never hold references to each other.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use overseer_authority::AuthorityValidator;
use overseer_autofix::AutofixEngine;
use overseer_risk::RiskEngine;
use overseer_telemetry::TelemetryHub;
use overseer_types::{
    elapsed_ms, AnomalyReport, Decision, GameStateSnapshot, PipelineStage, PipelineTrace,
    SharedClock, StageName, StageOutcome, TelemetryKind, TraceId,
};

/// Maximum traces retained, oldest evicted first.
const MAX_TRACES: usize = 1_000;

/// Executes an approved decision against the game, returning an opaque
/// result. Invoked at most once per pipeline run.
pub type Executor = Box<dyn FnMut(&Decision) -> Result<serde_json::Value, String>>;

/// Supplies a point-in-time world snapshot for the validation stage.
pub type StateProvider = Box<dyn FnMut() -> GameStateSnapshot>;

/// Aggregate counters derived from the retained traces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineStats {
    /// Traces currently retained.
    pub total_processed: usize,
    /// Retained traces whose decision was executed.
    pub approved: usize,
    /// Retained traces whose decision was not executed.
    pub rejected: usize,
    /// Mean total latency across retained traces, zero when empty.
    pub average_latency_ms: f64,
}

/// The staged decision processor.
pub struct DecisionPipeline {
    risk: RiskEngine,
    authority: AuthorityValidator,
    telemetry: TelemetryHub,
    autofix: AutofixEngine,
    executor: Option<Executor>,
    state_provider: Option<StateProvider>,
    traces: VecDeque<PipelineTrace>,
    clock: SharedClock,
}

impl core::fmt::Debug for DecisionPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DecisionPipeline")
            .field("risk", &self.risk)
            .field("authority", &self.authority)
            .field("telemetry", &self.telemetry)
            .field("autofix", &self.autofix)
            .field("traces", &self.traces.len())
            .field("has_executor", &self.executor.is_some())
            .field("has_state_provider", &self.state_provider.is_some())
            .finish()
    }
}

impl DecisionPipeline {
    /// Assemble a pipeline from already-seeded services.
    pub fn new(
        risk: RiskEngine,
        authority: AuthorityValidator,
        telemetry: TelemetryHub,
        autofix: AutofixEngine,
        clock: SharedClock,
    ) -> Self {
        Self {
            risk,
            authority,
            telemetry,
            autofix,
            executor: None,
            state_provider: None,
            traces: VecDeque::new(),
            clock,
        }
    }

    /// Walk one decision through the fixed stage order and record a
    /// trace. Returns a clone of the recorded trace.
    pub fn process(&mut self, decision: Decision) -> PipelineTrace {
        let started = self.clock.now();
        let trace_id = TraceId::new();
        let mut stages = Vec::new();

        // Stage 1: risk assessment. Rejection stops the run; later
        // stages are not recorded at all.
        let assessment = self.risk.assess(&decision);
        let risk_ended = self.clock.now();
        self.telemetry.emit_with(
            TelemetryKind::DecisionAssessed,
            json!({
                "decision_id": decision.id,
                "decision_kind": decision.kind.as_str(),
                "risk_score": assessment.risk_score,
                "approved": assessment.approved,
            }),
            None,
            Some(trace_id),
        );
        if !assessment.approved {
            debug!(decision_id = %decision.id, risk_score = assessment.risk_score, "risk rejection");
            stages.push(stage(
                StageName::RiskAssessment,
                started,
                risk_ended,
                StageOutcome::Fail,
                assessment.rejection_reason.clone(),
            ));
            return self.finish_trace(trace_id, decision, Some(assessment), None, false, None, started, stages);
        }
        stages.push(stage(
            StageName::RiskAssessment,
            started,
            risk_ended,
            StageOutcome::Pass,
            None,
        ));

        // Stage 2: authority validation against a fresh snapshot.
        let validation_started = self.clock.now();
        let snapshot = match self.state_provider.as_mut() {
            Some(provider) => provider(),
            None => GameStateSnapshot::empty(validation_started),
        };
        let validation = self.authority.validate(&decision, &snapshot);
        let validation_ended = self.clock.now();
        self.telemetry.emit_with(
            TelemetryKind::DecisionValidated,
            json!({
                "decision_id": decision.id,
                "valid": validation.valid,
                "reason": validation.reason,
            }),
            None,
            Some(trace_id),
        );
        if !validation.valid {
            debug!(decision_id = %decision.id, reason = %validation.reason, "validation rejection");
            stages.push(stage(
                StageName::Validation,
                validation_started,
                validation_ended,
                StageOutcome::Fail,
                validation.details.clone(),
            ));
            self.telemetry.emit_with(
                TelemetryKind::DecisionRejected,
                json!({
                    "decision_id": decision.id,
                    "decision_kind": decision.kind.as_str(),
                    "stage": "validation",
                    "reason": validation.reason,
                }),
                Some(elapsed_ms(started, validation_ended)),
                Some(trace_id),
            );
            return self.finish_trace(
                trace_id,
                decision,
                Some(assessment),
                Some(validation),
                false,
                None,
                started,
                stages,
            );
        }
        stages.push(stage(
            StageName::Validation,
            validation_started,
            validation_ended,
            StageOutcome::Pass,
            None,
        ));

        // Stage 3: execution. A missing executor counts as executed; an
        // executor failure is recorded but does not stop the run.
        let execution_started = self.clock.now();
        let mut executed = false;
        let mut execution_result = None;
        let execution_outcome = match self.executor.as_mut() {
            None => {
                executed = true;
                (StageOutcome::Pass, None)
            }
            Some(run) => match run(&decision) {
                Ok(result) => {
                    executed = true;
                    execution_result = Some(result);
                    (StageOutcome::Pass, None)
                }
                Err(message) => {
                    warn!(decision_id = %decision.id, message, "executor failed");
                    self.telemetry.emit_with(
                        TelemetryKind::ExecutionFailed,
                        json!({
                            "decision_id": decision.id,
                            "decision_kind": decision.kind.as_str(),
                            "error": message,
                        }),
                        None,
                        Some(trace_id),
                    );
                    (StageOutcome::Fail, Some(message))
                }
            },
        };
        let execution_ended = self.clock.now();
        stages.push(stage(
            StageName::Execution,
            execution_started,
            execution_ended,
            execution_outcome.0,
            execution_outcome.1,
        ));
        if executed {
            self.telemetry.record_state_change(decision.entity_id);
            self.telemetry.emit_with(
                TelemetryKind::DecisionExecuted,
                json!({
                    "decision_id": decision.id,
                    "decision_kind": decision.kind.as_str(),
                    "action": decision.action,
                }),
                Some(elapsed_ms(started, execution_ended)),
                Some(trace_id),
            );
        }

        // Stage 4: telemetry. Always a trivial pass, then exactly one
        // anomaly check; any report is relayed to the autofix engine.
        let telemetry_started = self.clock.now();
        let report = self.telemetry.detect_anomaly();
        let telemetry_ended = self.clock.now();
        stages.push(stage(
            StageName::Telemetry,
            telemetry_started,
            telemetry_ended,
            StageOutcome::Pass,
            None,
        ));
        if let Some(report) = report {
            self.relay_anomaly(&report, trace_id);
        }

        self.finish_trace(
            trace_id,
            decision,
            Some(assessment),
            Some(validation),
            executed,
            execution_result,
            started,
            stages,
        )
    }

    /// Hand a detected anomaly to the autofix engine and emit the
    /// trigger and outcome events on its behalf.
    fn relay_anomaly(&mut self, report: &AnomalyReport, trace_id: TraceId) {
        info!(kind = %report.kind, severity = ?report.severity, "anomaly detected, triggering autofix");
        self.telemetry.emit_with(
            TelemetryKind::AutofixTriggered,
            json!({
                "anomaly_id": report.id,
                "anomaly_kind": report.kind,
                "severity": report.severity,
            }),
            None,
            Some(trace_id),
        );
        let result = self.autofix.trigger(report);
        let kind = if result.success {
            TelemetryKind::AutofixCompleted
        } else {
            TelemetryKind::AutofixFailed
        };
        let data = serde_json::to_value(&result).unwrap_or_else(|_| json!(null));
        self.telemetry.emit_with(kind, data, None, Some(trace_id));
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_trace(
        &mut self,
        trace_id: TraceId,
        decision: Decision,
        risk: Option<overseer_types::RiskAssessment>,
        validation: Option<overseer_types::ValidationResult>,
        executed: bool,
        execution_result: Option<serde_json::Value>,
        started: DateTime<Utc>,
        stages: Vec<PipelineStage>,
    ) -> PipelineTrace {
        let now = self.clock.now();
        let trace = PipelineTrace {
            trace_id,
            decision,
            risk,
            validation,
            executed,
            execution_result,
            total_latency_ms: elapsed_ms(started, now),
            stages,
            recorded_at: now,
        };
        self.traces.push_back(trace.clone());
        while self.traces.len() > MAX_TRACES {
            self.traces.pop_front();
        }
        trace
    }

    // -----------------------------------------------------------------------
    // Wiring
    // -----------------------------------------------------------------------

    /// Install the executor invoked for decisions that pass validation.
    pub fn set_executor(&mut self, executor: Executor) {
        self.executor = Some(executor);
    }

    /// Install the world-state provider for the validation stage.
    pub fn set_state_provider(&mut self, provider: StateProvider) {
        self.state_provider = Some(provider);
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// The retained traces, oldest first.
    pub const fn traces(&self) -> &VecDeque<PipelineTrace> {
        &self.traces
    }

    /// The most recently recorded trace.
    pub fn latest_trace(&self) -> Option<&PipelineTrace> {
        self.traces.back()
    }

    /// Aggregate stats over the retained traces. "Approved" counts
    /// executed decisions.
    pub fn stats(&self) -> PipelineStats {
        let total_processed = self.traces.len();
        let approved = self.traces.iter().filter(|t| t.executed).count();
        let latency_sum: f64 = self.traces.iter().map(|t| t.total_latency_ms).sum();
        #[allow(clippy::cast_precision_loss)]
        let average_latency_ms = if total_processed == 0 {
            0.0
        } else {
            latency_sum / total_processed as f64
        };
        PipelineStats {
            total_processed,
            approved,
            rejected: total_processed.saturating_sub(approved),
            average_latency_ms,
        }
    }

    /// Drop all retained traces.
    pub fn clear_traces(&mut self) {
        self.traces.clear();
    }

    // -----------------------------------------------------------------------
    // Service access (hot reload and maintenance run through these)
    // -----------------------------------------------------------------------

    /// The owned risk engine.
    pub const fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    /// Mutable access to the owned risk engine.
    pub const fn risk_mut(&mut self) -> &mut RiskEngine {
        &mut self.risk
    }

    /// The owned authority validator.
    pub const fn authority(&self) -> &AuthorityValidator {
        &self.authority
    }

    /// Mutable access to the owned authority validator.
    pub const fn authority_mut(&mut self) -> &mut AuthorityValidator {
        &mut self.authority
    }

    /// The owned telemetry hub.
    pub const fn telemetry(&self) -> &TelemetryHub {
        &self.telemetry
    }

    /// Mutable access to the owned telemetry hub.
    pub const fn telemetry_mut(&mut self) -> &mut TelemetryHub {
        &mut self.telemetry
    }

    /// The owned autofix engine.
    pub const fn autofix(&self) -> &AutofixEngine {
        &self.autofix
    }

    /// Mutable access to the owned autofix engine.
    pub const fn autofix_mut(&mut self) -> &mut AutofixEngine {
        &mut self.autofix
    }
}

const fn stage(
    name: StageName,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    outcome: StageOutcome,
    details: Option<String>,
) -> PipelineStage {
    PipelineStage {
        name,
        started_at,
        ended_at,
        outcome,
        details,
    }
}
