//! Run orchestration: day-by-day aggregation of pool outcomes

use super::pool::{DayResult, FetchPool};
use super::FetchOutcome;
use crate::catalog::Region;
use crate::enumerate::Enumerator;
use crate::ledger::{FailureKind, FailureLedger, RunReport};
use crate::sink::Persist;
use crate::WorkItem;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Walks the date range one day at a time, feeding each day's batch to the
/// pool and folding outcomes into counters and the failure ledger.
///
/// Days are strictly sequential: day N+1 is not submitted until every item of
/// day N has resolved. Within a day, outcome arrival order is unspecified.
pub struct ExtractRun {
    pool: FetchPool,
    ledger: FailureLedger,
    processed: AtomicU64,
    succeeded: AtomicU64,
}

impl ExtractRun {
    /// Create a run over a pool with a fresh ledger.
    pub fn new(pool: FetchPool) -> Self {
        Self {
            pool,
            ledger: FailureLedger::new(),
            processed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
        }
    }

    /// The run's failure ledger.
    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    /// Process every day of the range in order, calling `on_day` after each
    /// day resolves (drives the progress display). Stops early on shutdown.
    pub async fn run<F>(
        &self,
        enumerator: &Enumerator,
        regions: &[Region],
        sink: &Arc<dyn Persist>,
        probe: Option<&Region>,
        mut on_day: F,
    ) where
        F: FnMut(NaiveDate),
    {
        for date in enumerator.days() {
            if self.pool.shutdown_requested() {
                warn!(date = %date, "Shutdown requested, stopping before this day");
                break;
            }
            self.run_day(date, regions, sink, probe).await;
            on_day(date);
        }
    }

    /// Process one day's batch to full resolution.
    pub async fn run_day(
        &self,
        date: NaiveDate,
        regions: &[Region],
        sink: &Arc<dyn Persist>,
        probe: Option<&Region>,
    ) {
        let batch: Vec<WorkItem> = regions.iter().map(|r| WorkItem::new(date, r)).collect();
        info!(date = %date, items = batch.len(), "Processing day");

        match probe {
            None => {
                let outcomes = self.pool.run_day(batch, sink).await;
                self.absorb(outcomes);
            }
            Some(region) => {
                let probe_item = WorkItem::new(date, region);
                match self.pool.run_day_gated(probe_item, batch, sink).await {
                    DayResult::Completed(outcomes) => self.absorb(outcomes),
                    DayResult::Skipped { probe_key, error } => {
                        self.ledger.record(
                            probe_key,
                            FailureKind::DaySkipped,
                            format!("gate probe failed: {error}"),
                        );
                    }
                    DayResult::Cancelled => {}
                }
            }
        }
    }

    fn absorb(&self, outcomes: Vec<FetchOutcome>) {
        for outcome in outcomes {
            self.processed.fetch_add(1, Ordering::Relaxed);
            match outcome {
                FetchOutcome::Success { .. } => {
                    self.succeeded.fetch_add(1, Ordering::Relaxed);
                }
                FetchOutcome::Failure { key, error } => {
                    self.ledger.record(key, error.kind(), error.to_string());
                }
            }
        }
    }

    /// Final report. `processed` counts items that resolved to an outcome;
    /// skipped days contribute one ledger entry each but no processed items.
    pub fn report(&self) -> RunReport {
        RunReport {
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.ledger.len() as u64,
            skipped_days: self.ledger.skipped_days(),
            failures: self.ledger.records(),
        }
    }
}
