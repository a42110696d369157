//! # Fire Data Extractor Library
//!
//! A library for extracting daily wildfire-prediction feature data from a remote
//! geospatial compute service and downloading the results under a strict cap on
//! concurrently in-flight requests.
//!
//! ## Features
//!
//! - **Two extraction variants**: per-region GeoTIFF rasters (one file per day and
//!   sub-region) and sampled pixel time series (one shared CSV table per year)
//! - **Bounded concurrency**: a counting semaphore caps in-flight remote requests
//!   (default 30) while whole-day batches are submitted at once
//! - **Day gating**: the time-series variant probes one designated region per day
//!   and abandons the day cheaply if the probe fails
//! - **Partial-failure isolation**: one failure outcome per work item, aggregated
//!   in a run-scoped ledger; no item failure aborts its siblings
//! - **Incremental-write correctness**: raster files appear atomically or not at
//!   all; table appends are serialized and never interleave partial rows
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use fire_data_extractor::catalog::load_regions;
//! use fire_data_extractor::compute::rest::RestCompute;
//! use fire_data_extractor::compute::RasterOptions;
//! use fire_data_extractor::enumerate::Enumerator;
//! use fire_data_extractor::extract::{build_http_client, ExtractConfig, ExtractRun, FetchPool};
//! use fire_data_extractor::sink::{Persist, RasterSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let regions = load_regions("config/US_polygons.json")?;
//! let enumerator = Enumerator::from_months(2024, 6, 8)?;
//!
//! let client = build_http_client()?;
//! let compute = Arc::new(RestCompute::from_env(client.clone())?);
//! let sink: Arc<dyn Persist> =
//!     Arc::new(RasterSink::new("data/fire_images", RasterOptions::default())?);
//!
//! let pool = FetchPool::new(compute, client, &ExtractConfig::default());
//! let run = ExtractRun::new(pool);
//! run.run(&enumerator, &regions, &sink, None, |_day| {}).await;
//!
//! let report = run.report();
//! println!("{} succeeded, {} failed", report.succeeded, report.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`catalog`] - Region catalog loading (GeoJSON feature collection)
//! - [`enumerate`] - Day-major work item enumeration over a date range
//! - [`compute`] - Narrow interface to the remote feature-composition service
//! - [`extract`] - Semaphore-bounded fetch worker pool and run orchestration
//! - [`sink`] - Durable persistence backends (raster files, shared CSV table)
//! - [`ledger`] - Run-scoped record of failed work items
//! - [`cli`] - Command-line surface

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Region catalog loading
pub mod catalog;

/// CLI command implementations
pub mod cli;

/// Remote feature-composition interface
pub mod compute;

/// Work item enumeration
pub mod enumerate;

/// Fetch worker pool and run orchestration
pub mod extract;

/// Failure ledger and run reporting
pub mod ledger;

/// Persistence backends for fetched payloads
pub mod sink;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

// Re-export commonly used types
pub use catalog::Region;
pub use enumerate::{WorkItem, WorkKey};

/// Polygon geometry as it appears in the region catalog: a list of rings, each
/// ring an ordered sequence of `[longitude, latitude]` vertex pairs with the
/// outer ring first. The coordinate nesting is carried verbatim to the remote
/// compute service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Ring list, outer ring first
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl Polygon {
    /// Create a polygon from a single outer ring.
    pub fn from_ring(ring: Vec<[f64; 2]>) -> Self {
        Self {
            coordinates: vec![ring],
        }
    }

    /// The outer ring, if present.
    pub fn outer_ring(&self) -> Option<&[[f64; 2]]> {
        self.coordinates.first().map(|r| r.as_slice())
    }

    /// Validate polygon integrity: at least one ring, and an outer ring that is
    /// a closed sequence of at least four vertices.
    pub fn validate(&self) -> Result<(), String> {
        let ring = self
            .outer_ring()
            .ok_or_else(|| "Polygon has no rings".to_string())?;

        if ring.len() < 4 {
            return Err(format!(
                "Outer ring must have at least 4 vertices, got {}",
                ring.len()
            ));
        }

        let first = ring[0];
        let last = ring[ring.len() - 1];
        if first != last {
            return Err(format!(
                "Outer ring is not closed: first vertex {:?} != last vertex {:?}",
                first, last
            ));
        }

        Ok(())
    }
}

/// One-day extraction window: a calendar date plus start/end time-of-day
/// strings. The remote service receives the window as two local ISO 8601
/// strings, `{date}T{start}` and `{date}T{end}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Calendar date of the window
    pub date: NaiveDate,
    /// Start time of day (e.g. "00:00")
    pub start: String,
    /// End time of day (e.g. "23:59")
    pub end: String,
}

/// Default window start time of day.
pub const DAY_WINDOW_START: &str = "00:00";
/// Default window end time of day.
pub const DAY_WINDOW_END: &str = "23:59";

impl TimeWindow {
    /// Create the default whole-day window for a date.
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            start: DAY_WINDOW_START.to_string(),
            end: DAY_WINDOW_END.to_string(),
        }
    }

    /// Date formatted as `YYYY-MM-DD`.
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Window start as `YYYY-MM-DDTHH:MM`.
    pub fn start_iso(&self) -> String {
        format!("{}T{}", self.date_string(), self.start)
    }

    /// Window end as `YYYY-MM-DDTHH:MM`.
    pub fn end_iso(&self) -> String {
        format!("{}T{}", self.date_string(), self.end)
    }
}
