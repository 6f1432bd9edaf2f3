use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Most recent failure seen by the pump.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Point-in-time view of a scheduler's counters and flags.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PumpMetrics {
    /// Pump steps performed (tasks resumed plus jobs invoked).
    pub steps: u64,
    /// Tasks and jobs that ended with an error.
    pub failures: u64,
    /// Entries dropped because the bounded queue was full.
    pub dropped: u64,
    /// Rotations of blocked tasks that were not resumed (`await_ready` policy).
    pub deferred: u64,
    /// Entries currently queued.
    pub queued: usize,
    pub stopping: bool,
    pub cancelling: bool,
    pub last_error: Option<ErrorRecord>,
}

/// Live counters owned by one scheduler instance.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    steps: AtomicU64,
    failures: AtomicU64,
    dropped: AtomicU64,
    deferred: AtomicU64,
    last_error: Mutex<Option<ErrorRecord>>,
}

impl Counters {
    pub(crate) fn record_step(&self) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, message: impl Into<String>) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(ErrorRecord {
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub(crate) fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self, queued: usize, stopping: bool, cancelling: bool) -> PumpMetrics {
        PumpMetrics {
            steps: self.steps.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            queued,
            stopping,
            cancelling,
            last_error: self.last_error.lock().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics() {
        let m = PumpMetrics::default();
        assert_eq!(m.steps, 0);
        assert_eq!(m.failures, 0);
        assert!(m.last_error.is_none());
    }

    #[test]
    fn failures_keep_latest_message() {
        let c = Counters::default();
        c.record_failure("first");
        c.record_failure("second");
        c.record_step();
        c.record_drop();

        let m = c.snapshot(2, true, false);
        assert_eq!(m.failures, 2);
        assert_eq!(m.steps, 1);
        assert_eq!(m.dropped, 1);
        assert_eq!(m.queued, 2);
        assert!(m.stopping);
        assert_eq!(m.last_error.unwrap().message, "second");
    }

    #[test]
    fn snapshot_serializes() {
        let c = Counters::default();
        c.record_deferred();
        let json = serde_json::to_value(c.snapshot(0, false, false)).unwrap();
        assert_eq!(json["deferred"], 1);
        assert_eq!(json["last_error"], serde_json::Value::Null);
    }
}
