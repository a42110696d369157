//! Persistence backends for fetched payloads
//!
//! Two backends implement the [`Persist`] seam between the worker pool and
//! disk:
//!
//! - [`RasterSink`] writes one artifact file per work item key. Writes are
//!   atomic from any reader's perspective: the payload streams into a `.part`
//!   file that is renamed into place only after the stream completes, so an
//!   interrupted fetch leaves nothing at the destination path.
//! - [`TableSink`] appends rows to one shared CSV table per run. Appends are
//!   serialized by an async mutex, so concurrent workers never interleave
//!   partial rows; a header is written exactly once, when the table is
//!   created. No ordering across workers is guaranteed, only atomicity per
//!   append.
//!
//! Per-key raster writes need no coordination and proceed fully in parallel;
//! the table mutex is the only shared mutable disk resource in a run.

use crate::compute::DownloadRequest;
use crate::WorkKey;
use async_trait::async_trait;
use std::path::PathBuf;

pub mod raster;
pub mod table;

pub use raster::RasterSink;
pub use table::TableSink;

/// Sink errors. Always fatal to the affected work item; a partial artifact is
/// discarded rather than reported as success.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV parse or write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Failure reading the response body
    #[error("read error: {0}")]
    ReadError(String),

    /// Payload contained no data rows
    #[error("empty payload: {0}")]
    EmptyPayload(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// What a successful persist call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Written {
    /// Destination path (artifact file or shared table)
    pub destination: PathBuf,
    /// Payload size: bytes for rasters, data rows for tables
    pub units: u64,
}

/// Seam between the fetch worker pool and durable storage. A sink decides the
/// download shape it wants (raster bytes or sampled CSV) and persists one
/// successful response per call.
#[async_trait]
pub trait Persist: Send + Sync {
    /// The download shape this sink consumes.
    fn download_request(&self) -> DownloadRequest;

    /// Persist one successful (status 200) response for `key`.
    ///
    /// Must never leave a partial artifact observable on failure.
    async fn persist(&self, key: &WorkKey, response: reqwest::Response) -> SinkResult<Written>;
}
