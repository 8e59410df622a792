//! Pluggable destinations for telemetry events.
//!
//! A sink is the hub's outbound edge: every recorded event is forwarded
//! to exactly one sink. Sink failures are logged by the hub and never
//! reach the caller, so a broken exporter cannot take the governance
//! core down with it.

use overseer_types::{AnomalyReport, TelemetryEvent};

/// Destination for telemetry events.
///
/// Implementations may buffer; the hub calls [`TelemetrySink::flush`] on
/// shutdown. `log_incident` has a no-op default for sinks that only care
/// about the event stream.
pub trait TelemetrySink {
    /// Record one telemetry event.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the event could not be recorded.
    /// The hub logs the message and continues.
    fn log_event(&mut self, event: &TelemetryEvent) -> Result<(), String>;

    /// Record an anomaly as an incident. Defaults to a no-op.
    ///
    /// # Errors
    ///
    /// Returns a message describing the failure; the hub logs it and
    /// continues.
    fn log_incident(&mut self, _report: &AnomalyReport) -> Result<(), String> {
        Ok(())
    }

    /// Flush any buffered output. Defaults to a no-op.
    ///
    /// # Errors
    ///
    /// Returns a message describing the failure; the hub logs it and
    /// continues.
    fn flush(&mut self) -> Result<(), String> {
        Ok(())
    }
}

/// The default sink: discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn log_event(&mut self, _event: &TelemetryEvent) -> Result<(), String> {
        Ok(())
    }
}
