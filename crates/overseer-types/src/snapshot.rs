//! Game-state snapshot consumed by the authority validator.
//!
//! The governance core never holds a live reference into the game's world
//! state. Instead, an injected provider hands the validation stage a
//! point-in-time [`GameStateSnapshot`] once per run. When no provider is
//! configured, [`GameStateSnapshot::empty`] substitutes a deterministic
//! empty state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{AnomalyKind, EnemyState, TacticKind};
use crate::ids::{EntityId, FactionId, SquadId};

/// Point-in-time view of one game entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    /// Whether the entity is currently alive.
    pub alive: bool,
    /// The entity's current behavioral state, when it is an enemy.
    pub state: Option<EnemyState>,
    /// The faction the entity belongs to, when any.
    pub faction_id: Option<FactionId>,
    /// The squad the entity belongs to, when any.
    pub squad_id: Option<SquadId>,
}

impl EntityState {
    /// A minimal living entity with no affiliations.
    pub const fn alive() -> Self {
        Self {
            alive: true,
            state: None,
            faction_id: None,
            squad_id: None,
        }
    }

    /// A minimal dead entity with no affiliations.
    pub const fn dead() -> Self {
        Self {
            alive: false,
            state: None,
            faction_id: None,
            squad_id: None,
        }
    }
}

/// The doctrine a faction imposes on actions taken in its name.
///
/// An action is doctrine-compliant when it is not in `forbidden_actions`
/// and, if `allowed_actions` is non-empty, appears in that list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FactionDoctrine {
    /// Actions the faction explicitly permits. Empty means "no allowlist".
    pub allowed_actions: Vec<String>,
    /// Actions the faction explicitly forbids.
    pub forbidden_actions: Vec<String>,
}

impl FactionDoctrine {
    /// Whether the doctrine permits the named action.
    pub fn permits(&self, action: &str) -> bool {
        if self.forbidden_actions.iter().any(|a| a == action) {
            return false;
        }
        self.allowed_actions.is_empty() || self.allowed_actions.iter().any(|a| a == action)
    }
}

/// Point-in-time view of one squad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadState {
    /// Members of the squad.
    pub members: Vec<EntityId>,
    /// The tactic the squad is currently executing.
    pub current_tactic: TacticKind,
}

/// A point-in-time snapshot of the world state relevant to validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    /// Entities known to the game, keyed by ID.
    pub entities: BTreeMap<EntityId, EntityState>,
    /// Factions and their doctrines, keyed by ID.
    pub factions: BTreeMap<FactionId, FactionDoctrine>,
    /// Squads, keyed by ID.
    pub squads: BTreeMap<SquadId, SquadState>,
    /// The game's clock reading at snapshot time.
    pub world_time: DateTime<Utc>,
    /// Anomaly kinds the game itself currently considers active.
    pub active_anomalies: Vec<AnomalyKind>,
}

impl GameStateSnapshot {
    /// The deterministic empty state: no entities, factions, or squads,
    /// the given time, and no active anomalies.
    pub const fn empty(world_time: DateTime<Utc>) -> Self {
        Self {
            entities: BTreeMap::new(),
            factions: BTreeMap::new(),
            squads: BTreeMap::new(),
            world_time,
            active_anomalies: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_nothing() {
        let snapshot = GameStateSnapshot::empty(Utc::now());
        assert!(snapshot.entities.is_empty());
        assert!(snapshot.factions.is_empty());
        assert!(snapshot.squads.is_empty());
        assert!(snapshot.active_anomalies.is_empty());
    }

    #[test]
    fn doctrine_forbidden_wins() {
        let doctrine = FactionDoctrine {
            allowed_actions: vec!["advance".to_owned()],
            forbidden_actions: vec!["advance".to_owned()],
        };
        assert!(!doctrine.permits("advance"));
    }

    #[test]
    fn doctrine_empty_allowlist_permits_unlisted() {
        let doctrine = FactionDoctrine {
            allowed_actions: Vec::new(),
            forbidden_actions: vec!["ambush".to_owned()],
        };
        assert!(doctrine.permits("advance"));
        assert!(!doctrine.permits("ambush"));
    }

    #[test]
    fn doctrine_nonempty_allowlist_restricts() {
        let doctrine = FactionDoctrine {
            allowed_actions: vec!["patrol".to_owned()],
            forbidden_actions: Vec::new(),
        };
        assert!(doctrine.permits("patrol"));
        assert!(!doctrine.permits("assault"));
    }
}
