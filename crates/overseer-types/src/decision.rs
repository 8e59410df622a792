//! Decision types submitted by external producers for gated execution.
//!
//! A [`Decision`] is a proposed autonomous action. It is produced outside
//! the governance core (by goal planners, utility AI, the director loop)
//! and is immutable once submitted. Parameters are a tagged union keyed by
//! the decision kind, so cascade prediction and magnitude terms can match
//! exhaustively instead of probing an untyped bag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{DecisionKind, EnemyState, TacticKind};
use crate::ids::{DecisionId, EntityId, FactionId, SquadId};

/// Kind-specific parameters carried by a [`Decision`].
///
/// Each variant corresponds to one [`DecisionKind`] and carries exactly the
/// data the risk engine and cascade predictor interpret for that kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionParameters {
    /// Parameters for [`DecisionKind::EnemyUpdate`].
    EnemyUpdate {
        /// The behavioral state the enemy should transition into.
        new_state: EnemyState,
    },
    /// Parameters for [`DecisionKind::SquadTactic`].
    SquadTactic {
        /// The tactic the squad should adopt.
        tactic: TacticKind,
    },
    /// Parameters for [`DecisionKind::HeatChange`].
    HeatChange {
        /// Signed change to the world heat level.
        delta: f64,
    },
    /// Parameters for [`DecisionKind::Spawn`].
    Spawn {
        /// Number of entities to spawn.
        count: u32,
    },
    /// Parameters for [`DecisionKind::Despawn`].
    Despawn {
        /// Number of entities to remove.
        count: u32,
    },
}

impl DecisionParameters {
    /// Return the [`DecisionKind`] this parameter set belongs to.
    pub const fn kind(&self) -> DecisionKind {
        match self {
            Self::EnemyUpdate { .. } => DecisionKind::EnemyUpdate,
            Self::SquadTactic { .. } => DecisionKind::SquadTactic,
            Self::HeatChange { .. } => DecisionKind::HeatChange,
            Self::Spawn { .. } => DecisionKind::Spawn,
            Self::Despawn { .. } => DecisionKind::Despawn,
        }
    }
}

/// A proposed autonomous action submitted for gated execution.
///
/// Decisions are produced externally and never mutated by the pipeline.
/// `priority` is a plain integer with no enforced range; larger values are
/// served first by the risk engine's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Unique identifier assigned by the producer.
    pub id: DecisionId,
    /// The kind of action proposed.
    pub kind: DecisionKind,
    /// The entity acting or acted upon.
    pub entity_id: EntityId,
    /// The faction whose doctrine governs the action, when applicable.
    pub faction_id: Option<FactionId>,
    /// The squad involved in the action, when applicable.
    pub squad_id: Option<SquadId>,
    /// Name of the concrete action (checked against faction doctrine).
    pub action: String,
    /// Kind-specific parameters.
    pub parameters: DecisionParameters,
    /// Priority; larger values are served first.
    pub priority: i64,
    /// When the producer issued the decision.
    pub issued_at: DateTime<Utc>,
}

impl Decision {
    /// Build a decision with a fresh ID, deriving the kind from the
    /// parameter union.
    pub fn new(
        entity_id: EntityId,
        action: impl Into<String>,
        parameters: DecisionParameters,
        priority: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DecisionId::new(),
            kind: parameters.kind(),
            entity_id,
            faction_id: None,
            squad_id: None,
            action: action.into(),
            parameters,
            priority,
            issued_at,
        }
    }

    /// Attach a faction whose doctrine must be honored.
    #[must_use]
    pub const fn with_faction(mut self, faction_id: FactionId) -> Self {
        self.faction_id = Some(faction_id);
        self
    }

    /// Attach the squad involved in the action.
    #[must_use]
    pub const fn with_squad(mut self, squad_id: SquadId) -> Self {
        self.squad_id = Some(squad_id);
        self
    }
}
