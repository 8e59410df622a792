//! Self-healing remediation for detected anomalies.
//!
//! One handler per anomaly kind with a retry-then-escalate policy, a
//! spawn throttle with a scheduled, cancellable revert, and explicit
//! callbacks for the effects that belong to the host game (entity
//! resets, garbage collection, throttle enforcement).

pub mod engine;
pub mod revert;

pub use engine::{
    AutofixEngine, FixHandler, FixOutcome, GcHook, ResetCallback, ThrottleCallback,
    THROTTLE_REVERT_DELAY_MS,
};
pub use revert::{RevertEvent, RevertHandle, RevertScheduler};
