//! The risk engine: scoring, approval, and the priority queue.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use overseer_config::{GovernorConfig, builtin_cascade_multiplier, builtin_risk_weight};
use overseer_types::{
    AffectedSystem, Decision, DecisionKind, DecisionParameters, RiskAssessment, SharedClock,
};

use crate::cascade::predict_cascade;

/// Maximum assessments retained in the bounded log (oldest dropped).
const MAX_ASSESSMENT_LOG: usize = 10_000;

/// Priority contribution per priority point.
const PRIORITY_WEIGHT: f64 = 2.0;

/// Risk contribution per spawned entity.
const SPAWN_MAGNITUDE: f64 = 5.0;

/// Risk contribution per absolute heat-delta point.
const HEAT_MAGNITUDE: f64 = 0.5;

/// Scores a decision's danger and predicts its side effects.
///
/// Every assessment is appended to a bounded log. The engine also owns a
/// priority queue for batched assessment: decisions are inserted in
/// priority order (stable for ties) and drained front-to-back.
pub struct RiskEngine {
    threshold: f64,
    weights: BTreeMap<DecisionKind, f64>,
    multipliers: BTreeMap<AffectedSystem, f64>,
    queue: Vec<Decision>,
    log: VecDeque<RiskAssessment>,
    clock: SharedClock,
}

impl core::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("threshold", &self.threshold)
            .field("queue_len", &self.queue.len())
            .field("log_len", &self.log.len())
            .finish()
    }
}

impl RiskEngine {
    /// Create an engine seeded from the governance configuration.
    pub fn from_config(config: &GovernorConfig, clock: SharedClock) -> Self {
        Self {
            threshold: config.risk_threshold.clamp(0.0, 100.0),
            weights: config.risk_weights.clone(),
            multipliers: config.cascade_multipliers.clone(),
            queue: Vec::new(),
            log: VecDeque::new(),
            clock,
        }
    }

    /// Score a decision and record the assessment.
    ///
    /// Base risk is the per-kind weight plus twice the priority plus a
    /// kind-specific magnitude term (spawn count, absolute heat delta).
    /// Each predicted cascade effect then contributes
    /// `|predicted_change| * multiplier(system) * confidence`. The total
    /// is clamped to `[0, 100]` and compared against the threshold.
    pub fn assess(&mut self, decision: &Decision) -> RiskAssessment {
        // Missing map entries fall back to the built-in weights, the
        // same lookup `GovernorConfig` exposes.
        let weight = self
            .weights
            .get(&decision.kind)
            .copied()
            .unwrap_or_else(|| builtin_risk_weight(decision.kind));

        // Negative priorities lower risk; the final clamp keeps the
        // score in range either way.
        #[allow(clippy::cast_precision_loss)]
        let priority_term = decision.priority as f64 * PRIORITY_WEIGHT;

        let magnitude = match decision.parameters {
            DecisionParameters::Spawn { count } => f64::from(count) * SPAWN_MAGNITUDE,
            DecisionParameters::HeatChange { delta } => delta.abs() * HEAT_MAGNITUDE,
            DecisionParameters::Despawn { .. }
            | DecisionParameters::SquadTactic { .. }
            | DecisionParameters::EnemyUpdate { .. } => 0.0,
        };

        let cascading_effects = predict_cascade(decision);
        let cascade_term: f64 = cascading_effects
            .iter()
            .map(|effect| {
                let multiplier = self
                    .multipliers
                    .get(&effect.system)
                    .copied()
                    .unwrap_or_else(|| builtin_cascade_multiplier(effect.system));
                effect.predicted_change.abs() * multiplier * effect.confidence
            })
            .sum();

        let risk_score = (weight + priority_term + magnitude + cascade_term).clamp(0.0, 100.0);
        let approved = risk_score <= self.threshold;
        let rejection_reason = if approved {
            None
        } else {
            Some(format!(
                "risk score {risk_score:.1} exceeds threshold {}",
                self.threshold
            ))
        };

        debug!(
            decision_id = %decision.id,
            kind = %decision.kind,
            risk_score,
            approved,
            "decision assessed"
        );

        let assessment = RiskAssessment {
            decision_id: decision.id,
            decision_kind: decision.kind,
            risk_score,
            cascading_effects,
            approved,
            rejection_reason,
            assessed_at: self.clock.now(),
        };

        self.log.push_back(assessment.clone());
        while self.log.len() > MAX_ASSESSMENT_LOG {
            self.log.pop_front();
        }

        assessment
    }

    /// Insert a decision into the queue before the first queued item with
    /// strictly lower priority. Equal priorities keep submission order.
    pub fn queue_decision(&mut self, decision: Decision) {
        let position = self
            .queue
            .iter()
            .position(|queued| queued.priority < decision.priority)
            .unwrap_or(self.queue.len());
        self.queue.insert(position, decision);
    }

    /// Drain the queue front-to-back, assessing each decision.
    ///
    /// The returned assessments follow strictly non-increasing priority
    /// order for any input set.
    pub fn process_queue(&mut self) -> Vec<RiskAssessment> {
        let queued = core::mem::take(&mut self.queue);
        queued
            .iter()
            .map(|decision| self.assess(decision))
            .collect()
    }

    /// Number of decisions currently queued.
    pub const fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// The current approval threshold.
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Set the approval threshold, clamped to `[0, 100]`.
    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold.clamp(0.0, 100.0);
    }

    /// Shallow-merge per-kind risk weights.
    pub fn merge_weights(&mut self, weights: &BTreeMap<DecisionKind, f64>) {
        for (kind, weight) in weights {
            self.weights.insert(*kind, *weight);
        }
    }

    /// Shallow-merge per-system cascade multipliers.
    pub fn merge_multipliers(&mut self, multipliers: &BTreeMap<AffectedSystem, f64>) {
        for (system, multiplier) in multipliers {
            self.multipliers.insert(*system, *multiplier);
        }
    }

    /// The bounded assessment log, oldest first.
    pub const fn assessment_log(&self) -> &VecDeque<RiskAssessment> {
        &self.log
    }

    /// Drop all queued decisions and logged assessments.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.log.clear();
    }
}
