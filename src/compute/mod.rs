//! Remote feature-composition interface
//!
//! The pipeline never depends on the compute service's internal object model.
//! It only needs two operations: compose the daily feature stack for a
//! geometry and time window, and turn the composed result into exactly one
//! download URL. Everything behind those two calls - band math, weather and
//! terrain reductions, compositing - is the service's business.
//!
//! [`RemoteHandle`] is single-use by construction: `download_url` consumes the
//! handle, so a handle can never yield more than one URL.

use crate::Polygon;
use async_trait::async_trait;

pub mod rest;

/// Request-building errors. All of these surface as per-item failures in the
/// ledger, on the same footing as transport failures during the download
/// itself.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// Missing or invalid endpoint configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Service rejected the composition or download request
    #[error("compute service rejected request: {0}")]
    Rejected(String),

    /// Composition produced an empty result for this geometry/window
    /// (e.g. zero bands, no data in the region)
    #[error("empty result: {0}")]
    EmptyResult(String),

    /// Network failure talking to the compute service
    #[error("network error: {0}")]
    NetworkError(String),

    /// Response could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for compute operations
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Parameters for a direct raster download.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RasterOptions {
    /// Pixel resolution in meters
    pub scale: u32,
    /// Optional projection override (e.g. "EPSG:32610")
    pub crs: Option<String>,
    /// Payload format requested from the service
    pub format: String,
    /// Upper bound on pixels the service may produce
    pub max_pixels: f64,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE_METERS,
            crs: None,
            format: "GeoTIFF".to_string(),
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

/// Parameters for sampling raster pixels within the region into a CSV table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SampleOptions {
    /// Pixel resolution in meters
    pub scale: u32,
    /// Include pixel coordinates in the sampled rows
    pub geometries: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE_METERS,
            geometries: true,
        }
    }
}

/// Default pixel resolution, matching the 375m grid of the source imagery.
pub const DEFAULT_SCALE_METERS: u32 = 375;

/// Default pixel budget for raster downloads.
pub const DEFAULT_MAX_PIXELS: f64 = 1e13;

/// The two supported download result shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadRequest {
    /// Direct byte-stream raster download
    Raster(RasterOptions),
    /// Sample pixels within the region, producing CSV rows
    Sample(SampleOptions),
}

/// Single-use descriptor of a composed feature stack. Consuming it yields
/// exactly one download URL.
#[async_trait]
pub trait RemoteHandle: Send {
    /// Derive the download URL for the composed result. Consumes the handle.
    async fn download_url(self: Box<Self>, request: &DownloadRequest) -> ComputeResult<String>;
}

/// Narrow interface to the remote compute collaborator.
#[async_trait]
pub trait FeatureCompute: Send + Sync {
    /// Compose the daily feature stack for a geometry and time window.
    ///
    /// Performs no payload I/O; the returned handle is the only way to reach
    /// the composed result.
    async fn compose_features(
        &self,
        geometry: &Polygon,
        start_iso: &str,
        end_iso: &str,
    ) -> ComputeResult<Box<dyn RemoteHandle>>;
}
