//! Risk assessment for the Overseer governance core.
//!
//! Scores every proposed decision on a `[0, 100]` scale, predicts the
//! side effects executing it would cascade into other subsystems, and
//! approves or rejects against a configurable threshold. Rejection is a
//! first-class outcome of assessment, not an error.
//!
//! # Modules
//!
//! - [`cascade`] -- Fixed per-kind cascade prediction table
//! - [`engine`] -- The stateful [`RiskEngine`]: scoring, queue, log

pub mod cascade;
pub mod engine;

pub use cascade::predict_cascade;
pub use engine::RiskEngine;
