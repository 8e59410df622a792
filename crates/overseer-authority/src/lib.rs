//! Authority validation for proposed decisions.
//!
//! The second gate of the governance pipeline. Decisions that survive the
//! risk gate are checked here against the current game-state snapshot:
//! the acting entity must exist and be alive, the action must comply with
//! the owning faction's doctrine, and the decision kind must be within
//! its fixed-window rate budget. Checks run in that order and the first
//! failure decides the outcome.

pub mod rate_limit;
pub mod validator;

pub use rate_limit::FixedWindowLimiter;
pub use validator::AuthorityValidator;
