//! The authority validator: ordered, short-circuiting rule checks.

use std::collections::BTreeMap;

use tracing::debug;

use overseer_config::{GovernorConfig, RateLimit};
use overseer_types::{
    Decision, DecisionKind, GameStateSnapshot, SharedClock, ValidationReason, ValidationResult,
};

use crate::rate_limit::FixedWindowLimiter;

/// Validates a decision's authority against world rules.
///
/// Checks run in a fixed order and the first failure decides the
/// outcome: entity liveness, faction doctrine, then the per-kind rate
/// limit. The rate-limit counter increments as a side effect of each
/// check that reaches it, so the validator is deterministic given
/// identical inputs and identical limiter state.
pub struct AuthorityValidator {
    limiter: FixedWindowLimiter,
    clock: SharedClock,
}

impl core::fmt::Debug for AuthorityValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthorityValidator")
            .field("limiter", &self.limiter)
            .finish()
    }
}

impl AuthorityValidator {
    /// Create a validator seeded from the governance configuration.
    pub fn from_config(config: &GovernorConfig, clock: SharedClock) -> Self {
        Self {
            limiter: FixedWindowLimiter::new(config.rate_limits.clone()),
            clock,
        }
    }

    /// Run the ordered authority checks for one decision.
    pub fn validate(
        &mut self,
        decision: &Decision,
        snapshot: &GameStateSnapshot,
    ) -> ValidationResult {
        let now = self.clock.now();

        // Check 1: the acting entity must exist and be alive.
        let Some(entity) = snapshot.entities.get(&decision.entity_id) else {
            debug!(decision_id = %decision.id, entity_id = %decision.entity_id, "entity not found");
            return ValidationResult::rejected(
                ValidationReason::EntityNotFound,
                Some(format!("entity {} not in snapshot", decision.entity_id)),
                Some(decision.entity_id),
                now,
            );
        };
        if !entity.alive {
            debug!(decision_id = %decision.id, entity_id = %decision.entity_id, "entity dead");
            return ValidationResult::rejected(
                ValidationReason::EntityDead,
                Some(format!("entity {} is dead", decision.entity_id)),
                Some(decision.entity_id),
                now,
            );
        }

        // Check 2: faction doctrine, when the decision acts for a faction.
        if let Some(faction_id) = decision.faction_id {
            let Some(doctrine) = snapshot.factions.get(&faction_id) else {
                return ValidationResult::rejected(
                    ValidationReason::FactionNotFound,
                    Some(format!("faction {faction_id} not in snapshot")),
                    Some(decision.entity_id),
                    now,
                );
            };
            if !doctrine.permits(&decision.action) {
                debug!(
                    decision_id = %decision.id,
                    faction_id = %faction_id,
                    action = %decision.action,
                    "doctrine violation"
                );
                return ValidationResult::rejected(
                    ValidationReason::DoctrineViolation,
                    Some(format!(
                        "action '{}' violates doctrine of faction {faction_id}",
                        decision.action
                    )),
                    Some(decision.entity_id),
                    now,
                );
            }
        }

        // Check 3: per-kind rate limit. Counting is a side effect of the
        // check itself.
        if !self.limiter.check(decision.kind, now) {
            debug!(decision_id = %decision.id, kind = %decision.kind, "rate limited");
            return ValidationResult::rejected(
                ValidationReason::RateLimited,
                Some(format!(
                    "rate limit exceeded for {} operations",
                    decision.kind
                )),
                Some(decision.entity_id),
                now,
            );
        }

        ValidationResult::approved(now)
    }

    /// Drop all live rate-limit windows.
    pub fn reset_rate_limits(&mut self) {
        self.limiter.reset();
    }

    /// Replace the rate limit for one decision kind.
    pub fn set_rate_limit_config(&mut self, kind: DecisionKind, limit: RateLimit) {
        self.limiter.set_limit(kind, limit);
    }

    /// Shallow-merge rate limits for several kinds.
    pub fn merge_rate_limits(&mut self, limits: &BTreeMap<DecisionKind, RateLimit>) {
        self.limiter.merge_limits(limits);
    }

    /// The live count within the current window for a kind.
    pub fn window_count(&self, kind: DecisionKind) -> u32 {
        self.limiter.window_count(kind)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use overseer_types::{
        DecisionParameters, EntityId, EntityState, FactionDoctrine, FactionId, ManualClock,
    };

    use super::*;

    fn make_validator() -> AuthorityValidator {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        AuthorityValidator::from_config(&GovernorConfig::default(), ManualClock::shared(start))
    }

    fn spawn_decision(entity_id: EntityId) -> Decision {
        Decision::new(
            entity_id,
            "spawn_wave",
            DecisionParameters::Spawn { count: 1 },
            1,
            Utc::now(),
        )
    }

    fn snapshot_with_entity(entity_id: EntityId, state: EntityState) -> GameStateSnapshot {
        let mut snapshot = GameStateSnapshot::empty(Utc::now());
        snapshot.entities.insert(entity_id, state);
        snapshot
    }

    #[test]
    fn unknown_entity_not_found() {
        let mut validator = make_validator();
        let snapshot = GameStateSnapshot::empty(Utc::now());
        let result = validator.validate(&spawn_decision(EntityId::new()), &snapshot);
        assert!(!result.valid);
        assert_eq!(result.reason, ValidationReason::EntityNotFound);
    }

    #[test]
    fn dead_entity_rejected_for_any_kind() {
        let mut validator = make_validator();
        let entity_id = EntityId::new();
        let snapshot = snapshot_with_entity(entity_id, EntityState::dead());

        for parameters in [
            DecisionParameters::Spawn { count: 1 },
            DecisionParameters::Despawn { count: 1 },
            DecisionParameters::HeatChange { delta: 5.0 },
        ] {
            let decision =
                Decision::new(entity_id, "act", parameters, 1, Utc::now());
            let result = validator.validate(&decision, &snapshot);
            assert_eq!(result.reason, ValidationReason::EntityDead);
            assert_eq!(result.entity_id, Some(entity_id));
        }
    }

    #[test]
    fn forbidden_action_is_doctrine_violation() {
        let mut validator = make_validator();
        let entity_id = EntityId::new();
        let faction_id = FactionId::new();
        let mut snapshot = snapshot_with_entity(entity_id, EntityState::alive());
        snapshot.factions.insert(
            faction_id,
            FactionDoctrine {
                allowed_actions: Vec::new(),
                forbidden_actions: vec!["spawn_wave".to_owned()],
            },
        );

        let decision = spawn_decision(entity_id).with_faction(faction_id);
        let result = validator.validate(&decision, &snapshot);
        assert_eq!(result.reason, ValidationReason::DoctrineViolation);
    }

    #[test]
    fn nonempty_allowlist_excludes_unlisted_action() {
        let mut validator = make_validator();
        let entity_id = EntityId::new();
        let faction_id = FactionId::new();
        let mut snapshot = snapshot_with_entity(entity_id, EntityState::alive());
        snapshot.factions.insert(
            faction_id,
            FactionDoctrine {
                allowed_actions: vec!["patrol".to_owned()],
                forbidden_actions: Vec::new(),
            },
        );

        let decision = spawn_decision(entity_id).with_faction(faction_id);
        let result = validator.validate(&decision, &snapshot);
        assert_eq!(result.reason, ValidationReason::DoctrineViolation);
    }

    #[test]
    fn missing_faction_rejected() {
        let mut validator = make_validator();
        let entity_id = EntityId::new();
        let snapshot = snapshot_with_entity(entity_id, EntityState::alive());
        let decision = spawn_decision(entity_id).with_faction(FactionId::new());
        let result = validator.validate(&decision, &snapshot);
        assert_eq!(result.reason, ValidationReason::FactionNotFound);
    }

    #[test]
    fn scenario_third_spawn_within_window_rate_limited() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut validator =
            AuthorityValidator::from_config(&GovernorConfig::default(), ManualClock::shared(start));
        validator.set_rate_limit_config(
            DecisionKind::Spawn,
            RateLimit {
                max_per_second: 2,
                window_ms: 1_000,
            },
        );

        let entity_id = EntityId::new();
        let snapshot = snapshot_with_entity(entity_id, EntityState::alive());

        let first = validator.validate(&spawn_decision(entity_id), &snapshot);
        assert!(first.valid);
        let second = validator.validate(&spawn_decision(entity_id), &snapshot);
        assert!(second.valid);
        let third = validator.validate(&spawn_decision(entity_id), &snapshot);
        assert!(!third.valid);
        assert_eq!(third.reason, ValidationReason::RateLimited);
    }

    #[test]
    fn validate_is_pure_given_reset_limiter_state() {
        let mut validator = make_validator();
        let entity_id = EntityId::new();
        let snapshot = snapshot_with_entity(entity_id, EntityState::alive());
        let decision = spawn_decision(entity_id);

        let first = validator.validate(&decision, &snapshot);
        validator.reset_rate_limits();
        let second = validator.validate(&decision, &snapshot);
        assert_eq!((first.valid, first.reason), (second.valid, second.reason));
    }

    #[test]
    fn dead_entity_does_not_consume_rate_budget() {
        let mut validator = make_validator();
        let entity_id = EntityId::new();
        let snapshot = snapshot_with_entity(entity_id, EntityState::dead());
        let _ = validator.validate(&spawn_decision(entity_id), &snapshot);
        assert_eq!(validator.window_count(DecisionKind::Spawn), 0);
    }

    #[test]
    fn approved_when_all_checks_pass() {
        let mut validator = make_validator();
        let entity_id = EntityId::new();
        let snapshot = snapshot_with_entity(entity_id, EntityState::alive());
        let result = validator.validate(&spawn_decision(entity_id), &snapshot);
        assert!(result.valid);
        assert_eq!(result.reason, ValidationReason::Approved);
        assert!(result.details.is_none());
    }
}
