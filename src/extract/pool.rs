//! Bounded-concurrency fetch worker pool

use super::config::{calculate_backoff, ExtractConfig};
use super::{FetchError, FetchOutcome};
use crate::compute::{DownloadRequest, FeatureCompute};
use crate::shutdown::{self, SharedShutdown};
use crate::sink::{Persist, SinkError};
use crate::{WorkItem, WorkKey};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Resolution of one day's batch.
#[derive(Debug)]
pub enum DayResult {
    /// The batch ran; one outcome per item that was not cancelled
    Completed(Vec<FetchOutcome>),
    /// The gate probe failed; no region of this day was attempted
    Skipped {
        /// Key of the probe item
        probe_key: WorkKey,
        /// What the probe ran into
        error: FetchError,
    },
    /// Shutdown was requested before the day started
    Cancelled,
}

/// Executes work items against a [`FeatureCompute`] backend with a semaphore
/// capping in-flight remote requests.
///
/// The pool is cheap to clone; clones share the semaphore, HTTP client, and
/// compute backend, so the in-flight cap holds across all of them.
#[derive(Clone)]
pub struct FetchPool {
    compute: Arc<dyn FeatureCompute>,
    client: reqwest::Client,
    limit: Arc<Semaphore>,
    max_retries: u32,
    shutdown: Option<SharedShutdown>,
}

impl FetchPool {
    /// Create a pool over `compute`, picking up the global shutdown handle if
    /// one is registered.
    pub fn new(
        compute: Arc<dyn FeatureCompute>,
        client: reqwest::Client,
        config: &ExtractConfig,
    ) -> Self {
        Self {
            compute,
            client,
            limit: Arc::new(Semaphore::new(config.effective_limit())),
            max_retries: config.max_retries,
            shutdown: shutdown::get_global_shutdown(),
        }
    }

    /// Replace the shutdown handle (used by tests to drive cancellation
    /// deterministically).
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Whether cooperative shutdown has been requested.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    /// Run one day's batch. All items are submitted immediately; the
    /// semaphore, not submission order, bounds in-flight requests. Returns one
    /// outcome per item, except items that observed shutdown before starting,
    /// which vanish without a trace.
    pub async fn run_day(&self, items: Vec<WorkItem>, sink: &Arc<dyn Persist>) -> Vec<FetchOutcome> {
        let mut tasks = JoinSet::new();
        for item in items {
            let pool = self.clone();
            let sink = Arc::clone(sink);
            tasks.spawn(async move { pool.fetch_item(item, sink).await });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {} // cancelled before starting
                Err(e) => error!(error = %e, "Fetch task panicked"),
            }
        }
        outcomes
    }

    /// Run one day's batch behind a gate probe.
    ///
    /// The probe item is attempted first, alone and outside the semaphore,
    /// and its payload is discarded. Only if it succeeds is the full batch
    /// submitted; otherwise the whole day is skipped with zero per-region
    /// requests issued.
    pub async fn run_day_gated(
        &self,
        probe: WorkItem,
        items: Vec<WorkItem>,
        sink: &Arc<dyn Persist>,
    ) -> DayResult {
        if self.shutdown_requested() {
            return DayResult::Cancelled;
        }

        match self.probe(&probe, &sink.download_request()).await {
            Ok(()) => {
                debug!(key = %probe.key, "Gate probe succeeded");
                DayResult::Completed(self.run_day(items, sink).await)
            }
            Err(error) => {
                warn!(key = %probe.key, error = %error, "Gate probe failed, skipping day");
                DayResult::Skipped {
                    probe_key: probe.key,
                    error,
                }
            }
        }
    }

    /// One cheap availability check: build the request, hit the download URL,
    /// and inspect what comes back. A structurally broken day answers 200
    /// with an empty body, so the payload must be read, not just the status;
    /// it is discarded afterwards either way.
    async fn probe(&self, item: &WorkItem, request: &DownloadRequest) -> Result<(), FetchError> {
        let url = self.build_url(item, request).await?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Transport { status });
        }

        let payload = response
            .text()
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        if payload.trim().is_empty() {
            return Err(FetchError::Sink(SinkError::EmptyPayload(
                "probe returned no data".to_string(),
            )));
        }
        Ok(())
    }

    async fn build_url(
        &self,
        item: &WorkItem,
        request: &DownloadRequest,
    ) -> Result<String, FetchError> {
        let handle = self
            .compute
            .compose_features(
                &item.geometry,
                &item.window.start_iso(),
                &item.window.end_iso(),
            )
            .await?;
        Ok(handle.download_url(request).await?)
    }

    /// Process one item to its single outcome. Returns `None` if shutdown was
    /// observed before the first attempt started.
    async fn fetch_item(self, item: WorkItem, sink: Arc<dyn Persist>) -> Option<FetchOutcome> {
        if self.shutdown_requested() {
            return None;
        }

        // Slot held for the full attempt, including the sink write.
        let _permit = match Arc::clone(&self.limit).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return None,
        };
        if self.shutdown_requested() {
            return None;
        }

        let request = sink.download_request();
        let mut retry_count = 0u32;
        loop {
            match self.attempt(&item, &request, sink.as_ref()).await {
                Ok(written) => {
                    info!(
                        key = %item.key,
                        units = written.units,
                        destination = %written.destination.display(),
                        "Work item completed"
                    );
                    return Some(FetchOutcome::Success {
                        key: item.key,
                        written,
                    });
                }
                Err(error) => {
                    if error.is_retryable()
                        && retry_count < self.max_retries
                        && !self.shutdown_requested()
                    {
                        let backoff = calculate_backoff(retry_count);
                        warn!(
                            key = %item.key,
                            error = %error,
                            backoff_ms = backoff.as_millis() as u64,
                            "Retrying after backoff"
                        );
                        tokio::time::sleep(backoff).await;
                        retry_count += 1;
                        continue;
                    }
                    error!(key = %item.key, error = %error, "Work item failed");
                    return Some(FetchOutcome::Failure {
                        key: item.key,
                        error,
                    });
                }
            }
        }
    }

    async fn attempt(
        &self,
        item: &WorkItem,
        request: &DownloadRequest,
        sink: &dyn Persist,
    ) -> Result<crate::sink::Written, FetchError> {
        let url = self.build_url(item, request).await?;
        debug!(key = %item.key, "Downloading artifact");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Transport { status });
        }

        Ok(sink.persist(&item.key, response).await?)
    }
}
