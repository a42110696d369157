//! CLI error types and conversions

use crate::catalog::CatalogError;
use crate::compute::ComputeError;
use crate::sink::SinkError;

/// Errors that abort a command before or outside the per-item fetch loop.
/// Per-item failures never surface here; they land in the failure ledger.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Catalog error
    #[error("catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    /// Compute service error
    #[error("compute error: {0}")]
    ComputeError(#[from] ComputeError),

    /// Sink error
    #[error("sink error: {0}")]
    SinkError(#[from] SinkError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
