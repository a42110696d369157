//! Fetch worker pool and run orchestration
//!
//! This is the heart of the pipeline: a bounded-concurrency executor that
//! turns enumerated work items into persisted artifacts and ledger entries.
//!
//! # Overview
//!
//! 1. **Batch submission**: all work items of a day are submitted at once
//!    ([`pool::FetchPool::run_day`]); a counting semaphore caps how many
//!    remote requests are actually in flight
//! 2. **Per-item attempt**: acquire a slot, compose the feature stack and
//!    derive the download URL ([`crate::compute`]), GET it, stream the body
//!    into the sink, release the slot unconditionally
//! 3. **Day gating**: the tabular variant probes one designated region before
//!    committing the day's batch ([`pool::FetchPool::run_day_gated`])
//! 4. **Aggregation**: [`run::ExtractRun`] walks the date range day by day
//!    and folds outcomes into counters and the failure ledger
//!
//! # Error handling
//!
//! Each work item resolves to exactly one [`FetchOutcome`]. Failures are
//! isolated per item - nothing a single item does can abort its siblings -
//! and are only aggregated in the [`crate::ledger::FailureLedger`]. There is
//! no automatic retry by default; a bounded retry with exponential backoff
//! can be enabled for transport failures via
//! [`config::ExtractConfig::max_retries`].

use crate::compute::ComputeError;
use crate::ledger::FailureKind;
use crate::sink::{SinkError, Written};
use crate::WorkKey;

pub mod config;
pub mod pool;
pub mod run;

pub use config::{build_http_client, ExtractConfig};
pub use pool::{DayResult, FetchPool};
pub use run::ExtractRun;

/// Per-attempt fetch errors (T-item granularity).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Building the remote request failed
    #[error("request build failed: {0}")]
    RequestBuild(#[from] ComputeError),

    /// The download URL answered with a non-200 status
    #[error("HTTP status {status}")]
    Transport {
        /// HTTP status code returned by the download URL
        status: u16,
    },

    /// The download connection failed before a status was received
    #[error("connection failed: {0}")]
    Connection(String),

    /// Persisting the payload failed; any partial artifact was discarded
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

impl FetchError {
    /// Ledger classification for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::RequestBuild(_) => FailureKind::RequestBuild,
            FetchError::Transport { .. } | FetchError::Connection(_) => FailureKind::Transport,
            FetchError::Sink(_) => FailureKind::Sink,
        }
    }

    /// Whether a bounded retry may be attempted. Only transport-level
    /// failures are worth retrying; compute rejections and sink failures are
    /// not transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport { .. } | FetchError::Connection(_)
        )
    }
}

/// Resolution of one work item. Produced exactly once per submitted item and
/// consumed exactly once by the run aggregation.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Payload persisted durably
    Success {
        /// Key of the completed work item
        key: WorkKey,
        /// What the sink wrote
        written: Written,
    },
    /// Attempt failed; nothing was persisted for this key
    Failure {
        /// Key of the failed work item
        key: WorkKey,
        /// Cause
        error: FetchError,
    },
}

impl FetchOutcome {
    /// Key of the work item this outcome resolves.
    pub fn key(&self) -> WorkKey {
        match self {
            FetchOutcome::Success { key, .. } | FetchOutcome::Failure { key, .. } => *key,
        }
    }
}
