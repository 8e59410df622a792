//! Telemetry collection and anomaly detection.
//!
//! The observability backbone of the governance core. The
//! [`TelemetryHub`] keeps a bounded event log, rolling counters with a
//! pure snapshot read, a one-second spawn sampling window, and
//! insertion-ordered entity activity for stuck detection. Detection
//! returns anomaly reports to the caller; the pipeline relays them to
//! the self-healing engine.

pub mod hub;
pub mod sink;

pub use hub::{CounterSnapshot, EventListener, TelemetryHub};
pub use sink::{NoopSink, TelemetrySink};
