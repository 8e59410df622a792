//! Cascade prediction: mapping a decision to its expected side effects.
//!
//! Each decision kind maps to a fixed table of [`CascadingEffect`]s on
//! other game subsystems. The parameter union makes the mapping
//! exhaustive -- there is no untyped lookup, and adding a decision kind
//! forces this table to be extended.

use overseer_types::{AffectedSystem, CascadingEffect, Decision, DecisionParameters};

/// Heat delta above which a faction escalation-tier shift is predicted.
const ESCALATION_DELTA: f64 = 20.0;

/// Predicted combat-intensity bump for aggressive squad tactics.
const AGGRESSIVE_TACTIC_INTENSITY: f64 = 10.0;

/// Predicted combat-activity bump for combat enemy states.
const COMBAT_STATE_ACTIVITY: f64 = 5.0;

/// Predict the cascading effects of executing a decision.
///
/// The table is fixed per decision kind:
/// - **Spawn** touches the world entity count and, less confidently, the
///   faction member count.
/// - **Despawn** is the mirror image, and also shrinks squads.
/// - **Heat change** moves the heat level almost one-for-one; large
///   deltas also predict a faction escalation-tier shift.
/// - **Squad tactic** always registers a tactic change; aggressive
///   tactics also raise predicted combat intensity.
/// - **Enemy update** only cascades when the new state means combat.
pub fn predict_cascade(decision: &Decision) -> Vec<CascadingEffect> {
    match decision.parameters {
        DecisionParameters::Spawn { count } => {
            let count = f64::from(count);
            vec![
                CascadingEffect {
                    system: AffectedSystem::World,
                    variable: "entity_count".to_owned(),
                    predicted_change: count,
                    confidence: 0.9,
                },
                CascadingEffect {
                    system: AffectedSystem::Faction,
                    variable: "member_count".to_owned(),
                    predicted_change: count,
                    confidence: 0.8,
                },
            ]
        }
        DecisionParameters::Despawn { count } => {
            let count = f64::from(count);
            vec![
                CascadingEffect {
                    system: AffectedSystem::World,
                    variable: "entity_count".to_owned(),
                    predicted_change: -count,
                    confidence: 0.9,
                },
                CascadingEffect {
                    system: AffectedSystem::Faction,
                    variable: "member_count".to_owned(),
                    predicted_change: -count,
                    confidence: 0.8,
                },
                CascadingEffect {
                    system: AffectedSystem::Squad,
                    variable: "member_count".to_owned(),
                    predicted_change: -count,
                    confidence: 0.7,
                },
            ]
        }
        DecisionParameters::HeatChange { delta } => {
            let mut effects = vec![CascadingEffect {
                system: AffectedSystem::Heat,
                variable: "heat_level".to_owned(),
                predicted_change: delta,
                confidence: 0.95,
            }];
            if delta.abs() >= ESCALATION_DELTA {
                effects.push(CascadingEffect {
                    system: AffectedSystem::Faction,
                    variable: "escalation_tier".to_owned(),
                    predicted_change: delta / ESCALATION_DELTA,
                    confidence: 0.6,
                });
            }
            effects
        }
        DecisionParameters::SquadTactic { tactic } => {
            let mut effects = vec![CascadingEffect {
                system: AffectedSystem::Squad,
                variable: "tactic_change".to_owned(),
                predicted_change: 1.0,
                confidence: 1.0,
            }];
            if tactic.is_aggressive() {
                effects.push(CascadingEffect {
                    system: AffectedSystem::Heat,
                    variable: "combat_intensity".to_owned(),
                    predicted_change: AGGRESSIVE_TACTIC_INTENSITY,
                    confidence: 0.7,
                });
            }
            effects
        }
        DecisionParameters::EnemyUpdate { new_state } => {
            if new_state.is_combat() {
                vec![CascadingEffect {
                    system: AffectedSystem::Heat,
                    variable: "combat_activity".to_owned(),
                    predicted_change: COMBAT_STATE_ACTIVITY,
                    confidence: 0.6,
                }]
            } else {
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use overseer_types::{EnemyState, EntityId, TacticKind};

    use super::*;

    fn decision(parameters: DecisionParameters) -> Decision {
        Decision::new(EntityId::new(), "act", parameters, 1, Utc::now())
    }

    #[test]
    fn spawn_cascades_to_world_and_faction() {
        let effects = predict_cascade(&decision(DecisionParameters::Spawn { count: 5 }));
        assert_eq!(effects.len(), 2);
        assert!(effects.iter().any(|e| {
            e.system == AffectedSystem::World && (e.predicted_change - 5.0).abs() < f64::EPSILON
        }));
        assert!(effects.iter().any(|e| e.system == AffectedSystem::Faction));
    }

    #[test]
    fn despawn_cascades_negative_across_three_systems() {
        let effects = predict_cascade(&decision(DecisionParameters::Despawn { count: 3 }));
        assert_eq!(effects.len(), 3);
        assert!(effects.iter().all(|e| e.predicted_change < 0.0));
    }

    #[test]
    fn small_heat_change_touches_heat_only() {
        let effects = predict_cascade(&decision(DecisionParameters::HeatChange { delta: 10.0 }));
        assert_eq!(effects.len(), 1);
        assert_eq!(
            effects.first().map(|e| e.system),
            Some(AffectedSystem::Heat)
        );
    }

    #[test]
    fn large_heat_change_predicts_escalation() {
        let effects = predict_cascade(&decision(DecisionParameters::HeatChange { delta: -40.0 }));
        assert_eq!(effects.len(), 2);
        assert!(effects.iter().any(|e| e.variable == "escalation_tier"));
    }

    #[test]
    fn aggressive_tactic_raises_intensity() {
        let assault = predict_cascade(&decision(DecisionParameters::SquadTactic {
            tactic: TacticKind::Assault,
        }));
        assert_eq!(assault.len(), 2);

        let defend = predict_cascade(&decision(DecisionParameters::SquadTactic {
            tactic: TacticKind::Defend,
        }));
        assert_eq!(defend.len(), 1);
    }

    #[test]
    fn passive_enemy_update_has_no_cascade() {
        let idle = predict_cascade(&decision(DecisionParameters::EnemyUpdate {
            new_state: EnemyState::Idle,
        }));
        assert!(idle.is_empty());

        let engage = predict_cascade(&decision(DecisionParameters::EnemyUpdate {
            new_state: EnemyState::Engage,
        }));
        assert_eq!(engage.len(), 1);
    }

    #[test]
    fn confidences_are_in_unit_interval() {
        for parameters in [
            DecisionParameters::Spawn { count: 2 },
            DecisionParameters::Despawn { count: 2 },
            DecisionParameters::HeatChange { delta: 50.0 },
            DecisionParameters::SquadTactic {
                tactic: TacticKind::Flank,
            },
            DecisionParameters::EnemyUpdate {
                new_state: EnemyState::Flank,
            },
        ] {
            for effect in predict_cascade(&decision(parameters)) {
                assert!((0.0..=1.0).contains(&effect.confidence));
            }
        }
    }
}
