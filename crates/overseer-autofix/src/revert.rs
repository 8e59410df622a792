//! Cancellable scheduling for deferred remediation reverts.
//!
//! The spawn-throttle handler does not sleep: it records a revert entry
//! with a due time, and the owner polls the scheduler from its
//! maintenance loop. Shutdown cancels pending entries, so no revert can
//! fire after the engine has been cleared.

use chrono::{DateTime, Duration, Utc};

/// Opaque handle to one scheduled revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RevertHandle(u64);

/// A revert that has come due and been removed from the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevertEvent {
    /// The handle the revert was scheduled under.
    pub handle: RevertHandle,
    /// When the revert was scheduled.
    pub scheduled_at: DateTime<Utc>,
    /// When the revert was due to fire.
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct PendingRevert {
    handle: RevertHandle,
    scheduled_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
}

/// Holds pending revert entries until they come due or are cancelled.
#[derive(Debug, Default)]
pub struct RevertScheduler {
    next_handle: u64,
    pending: Vec<PendingRevert>,
}

impl RevertScheduler {
    /// Create an empty scheduler.
    pub const fn new() -> Self {
        Self {
            next_handle: 0,
            pending: Vec::new(),
        }
    }

    /// Schedule a revert `delay_ms` after `scheduled_at`.
    pub fn schedule(&mut self, scheduled_at: DateTime<Utc>, delay_ms: u64) -> RevertHandle {
        let handle = RevertHandle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);
        let delay = Duration::milliseconds(i64::try_from(delay_ms).unwrap_or(i64::MAX));
        let due_at = scheduled_at.checked_add_signed(delay).unwrap_or(scheduled_at);
        self.pending.push(PendingRevert {
            handle,
            scheduled_at,
            due_at,
        });
        handle
    }

    /// Cancel one pending revert. Returns whether it was still pending.
    pub fn cancel(&mut self, handle: RevertHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|entry| entry.handle != handle);
        self.pending.len() < before
    }

    /// Cancel every pending revert.
    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    /// Remove and return every revert due at or before `now`, in
    /// scheduling order.
    pub fn poll_due(&mut self, now: DateTime<Utc>) -> Vec<RevertEvent> {
        let mut due = Vec::new();
        self.pending.retain(|entry| {
            if entry.due_at <= now {
                due.push(RevertEvent {
                    handle: entry.handle,
                    scheduled_at: entry.scheduled_at,
                    due_at: entry.due_at,
                });
                false
            } else {
                true
            }
        });
        due
    }

    /// Number of reverts still pending.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, second).unwrap()
    }

    #[test]
    fn revert_fires_only_once_due() {
        let mut scheduler = RevertScheduler::new();
        scheduler.schedule(at(0), 5_000);

        assert!(scheduler.poll_due(at(4)).is_empty());
        let due = scheduler.poll_due(at(5));
        assert_eq!(due.len(), 1);
        assert_eq!(due.first().unwrap().due_at, at(5));
        assert!(scheduler.poll_due(at(10)).is_empty());
    }

    #[test]
    fn cancel_prevents_firing() {
        let mut scheduler = RevertScheduler::new();
        let handle = scheduler.schedule(at(0), 1_000);
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(scheduler.poll_due(at(30)).is_empty());
    }

    #[test]
    fn cancel_all_drains_pending() {
        let mut scheduler = RevertScheduler::new();
        scheduler.schedule(at(0), 1_000);
        scheduler.schedule(at(0), 2_000);
        assert_eq!(scheduler.pending_count(), 2);
        scheduler.cancel_all();
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn due_reverts_keep_scheduling_order() {
        let mut scheduler = RevertScheduler::new();
        let first = scheduler.schedule(at(0), 1_000);
        let second = scheduler.schedule(at(0), 500);
        let due = scheduler.poll_due(at(2));
        let handles: Vec<RevertHandle> = due.iter().map(|e| e.handle).collect();
        assert_eq!(handles, vec![first, second]);
    }
}
