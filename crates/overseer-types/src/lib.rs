//! Shared type definitions for the Overseer decision-governance core.
//!
//! This crate is the single source of truth for all types used across the
//! Overseer workspace. Components exchange these values strictly by value
//! or explicit callback; no component holds a live reference into another's
//! internal state.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all identifiers
//! - [`enums`] -- Fixed tag sets (decision kinds, reasons, anomaly kinds)
//! - [`decision`] -- The externally produced [`Decision`] and its
//!   kind-keyed parameter union
//! - [`reports`] -- Derived records (assessments, traces, anomaly reports,
//!   autofix results, telemetry events)
//! - [`snapshot`] -- The world-state snapshot consumed by validation
//! - [`clock`] -- Deterministic time source shared by all components

pub mod clock;
pub mod decision;
pub mod enums;
pub mod ids;
pub mod reports;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use clock::{Clock, ManualClock, SharedClock, SystemClock, elapsed_ms};
pub use decision::{Decision, DecisionParameters};
pub use enums::{
    AffectedSystem, AnomalyKind, AnomalySeverity, DecisionKind, EnemyState, StageName,
    StageOutcome, TacticKind, TelemetryKind, ValidationReason,
};
pub use ids::{
    AnomalyId, DecisionId, EntityId, FactionId, SquadId, TelemetryEventId, TraceId,
};
pub use reports::{
    AnomalyReport, AutofixResult, CascadingEffect, PipelineStage, PipelineTrace, RiskAssessment,
    TelemetryEvent, ValidationResult,
};
pub use snapshot::{EntityState, FactionDoctrine, GameStateSnapshot, SquadState};
