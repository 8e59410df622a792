//! Clock abstraction for all temporal behavior in the governance core.
//!
//! Rate-limit windows, spawn sampling, stuck-entity ages, counter resets,
//! scheduled throttle reverts, and trace latencies all read time through
//! [`Clock`]. Production code uses [`SystemClock`]; tests use
//! [`ManualClock`] to drive time deterministically.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of the current time.
pub trait Clock: core::fmt::Debug {
    /// Return the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Shared handle to a clock. The core is single-threaded, so a plain
/// reference-counted handle is sufficient.
pub type SharedClock = Rc<dyn Clock>;

/// Wall-clock time via [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub const fn new() -> Self {
        Self
    }

    /// Create a shared handle to a system clock.
    pub fn shared() -> SharedClock {
        Rc::new(Self)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock for deterministic tests.
///
/// Stores milliseconds since the Unix epoch and only moves when told to,
/// in the same spirit as the stub collaborators the engine ships for
/// exercising flows without live dependencies.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Cell<i64>,
}

impl ManualClock {
    /// Create a manual clock starting at the given instant.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now_ms: Cell::new(start.timestamp_millis()),
        }
    }

    /// Create a shared manual clock starting at the given instant.
    pub fn shared(start: DateTime<Utc>) -> Rc<Self> {
        Rc::new(Self::starting_at(start))
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        self.now_ms.set(self.now_ms.get().saturating_add(ms));
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.num_milliseconds());
    }

    /// Set the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        self.now_ms.set(instant.timestamp_millis());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_ms.get())
            .single()
            .unwrap_or_default()
    }
}

/// Elapsed milliseconds between two instants, clamped to zero when the
/// interval is negative.
pub fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let ms = end
        .signed_duration_since(start)
        .num_milliseconds()
        .max(0);
    // Millisecond spans in this core stay far below 2^52.
    #[allow(clippy::cast_precision_loss)]
    {
        ms as f64
    }
}
