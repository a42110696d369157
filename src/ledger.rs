//! Failure ledger and run reporting
//!
//! Append-only, run-scoped record of every work item that failed. Nothing is
//! ever removed or overwritten during a run; the final report carries enough
//! key information to drive a retry run restricted to the failed keys.

use crate::WorkKey;
use std::sync::Mutex;

/// Failure classification at the work-item granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The compute service rejected or produced an empty/invalid composition
    RequestBuild,
    /// Non-200 HTTP status or connection failure while downloading
    Transport,
    /// Local write failure; any partial artifact was discarded
    Sink,
    /// Day-gate probe failed, so every region of that day was skipped without
    /// being individually attempted. The recorded key is the probe's.
    DaySkipped,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::RequestBuild => "request-build",
            FailureKind::Transport => "transport",
            FailureKind::Sink => "sink",
            FailureKind::DaySkipped => "day-skipped",
        };
        write!(f, "{s}")
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    /// Key of the failed work item (for day skips, the probe's key)
    pub key: WorkKey,
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable cause
    pub message: String,
}

/// Run-scoped, append-only collection of failure records.
#[derive(Debug, Default)]
pub struct FailureLedger {
    records: Mutex<Vec<FailureRecord>>,
}

impl FailureLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failure record. Never blocks beyond the internal lock.
    pub fn record(&self, key: WorkKey, kind: FailureKind, message: impl Into<String>) {
        let record = FailureRecord {
            key,
            kind,
            message: message.into(),
        };
        self.records
            .lock()
            .expect("failure ledger lock poisoned")
            .push(record);
    }

    /// Number of records so far.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .expect("failure ledger lock poisoned")
            .len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records in append order.
    pub fn records(&self) -> Vec<FailureRecord> {
        self.records
            .lock()
            .expect("failure ledger lock poisoned")
            .clone()
    }

    /// Keys of all failed items, in append order. Day-skip entries contribute
    /// the probe key; a retry run for such a day should re-enumerate the whole
    /// day.
    pub fn failed_keys(&self) -> Vec<WorkKey> {
        self.records().into_iter().map(|r| r.key).collect()
    }

    /// Number of day-skip records.
    pub fn skipped_days(&self) -> u64 {
        self.records()
            .iter()
            .filter(|r| r.kind == FailureKind::DaySkipped)
            .count() as u64
    }
}

/// Final report of one extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Work items whose outcome resolved (success or failure)
    pub processed: u64,
    /// Work items persisted to the sink
    pub succeeded: u64,
    /// Work items recorded in the ledger (including day skips)
    pub failed: u64,
    /// Days abandoned by the gate probe
    pub skipped_days: u64,
    /// All failure records, in append order
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    /// Whether the run completed without a single failure.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
