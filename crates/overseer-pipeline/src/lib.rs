//! Staged decision processing.
//!
//! The [`DecisionPipeline`] owns the risk engine, authority validator,
//! telemetry hub, and autofix engine, and walks every submitted decision
//! through the fixed stage order, recording one bounded trace per run.

pub mod pipeline;

pub use pipeline::{DecisionPipeline, Executor, PipelineStats, StateProvider};
