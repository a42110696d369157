//! Extraction command implementation

use crate::catalog::{self, Region};
use crate::compute::rest::RestCompute;
use crate::compute::{RasterOptions, SampleOptions, DEFAULT_SCALE_METERS};
use crate::enumerate::Enumerator;
use crate::extract::config::{DEFAULT_REQUEST_LIMIT, MAX_REQUEST_LIMIT};
use crate::extract::{build_http_client, ExtractConfig, ExtractRun, FetchPool};
use crate::ledger::RunReport;
use crate::sink::{Persist, RasterSink, TableSink};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::CliError;

/// Parse and validate the concurrency value.
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_REQUEST_LIMIT {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_REQUEST_LIMIT}"
        ));
    }
    Ok(value)
}

/// Wildfire feature extraction CLI
#[derive(Parser, Debug)]
#[command(name = "fire-data-extractor")]
#[command(about = "Download daily wildfire feature rasters and pixel samples", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Region catalog file (GeoJSON FeatureCollection of polygons)
    #[arg(long, global = true, default_value = "config/US_polygons.json")]
    pub catalog: PathBuf,

    /// Output directory root
    #[arg(long, global = true, default_value = "data")]
    pub output_dir: PathBuf,

    /// Number of simultaneous remote requests (default: 30, max: 64)
    ///
    /// The compute service sheds load beyond roughly this many requests per
    /// client; raising it past the default mostly converts successes into
    /// transport failures.
    #[arg(long, global = true, default_value_t = DEFAULT_REQUEST_LIMIT, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Retries for transient transport failures (0 disables retries)
    #[arg(long, global = true, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: u32,
}

/// Available extraction commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download one raster artifact per region per day
    Images(ImagesArgs),
    /// Sample pixel rows into one shared CSV table for the year
    Timeseries(TimeseriesArgs),
}

/// Date range and resolution shared by both commands.
#[derive(Args, Debug)]
pub struct RangeArgs {
    /// Year to extract
    pub year: i32,

    /// First month of the range
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub start_month: u32,

    /// Last month of the range (inclusive)
    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub end_month: u32,

    /// Pixel resolution in meters
    #[arg(long, default_value_t = DEFAULT_SCALE_METERS)]
    pub scale: u32,
}

/// Arguments for the `images` command
#[derive(Args, Debug)]
pub struct ImagesArgs {
    /// Date range and resolution
    #[command(flatten)]
    pub range: RangeArgs,

    /// Projection override for the raster payload (e.g. "EPSG:32610")
    #[arg(long)]
    pub crs: Option<String>,
}

/// Arguments for the `timeseries` command
#[derive(Args, Debug)]
pub struct TimeseriesArgs {
    /// Date range and resolution
    #[command(flatten)]
    pub range: RangeArgs,

    /// Catalog id of the region used as the day-gate probe
    /// (default: first region in the catalog)
    #[arg(long)]
    pub probe_index: Option<u32>,
}

/// Shared setup: catalog, enumerator, HTTP session, compute adapter, pool.
struct RunContext {
    regions: Vec<Region>,
    enumerator: Enumerator,
    run: ExtractRun,
}

impl RunContext {
    fn build(cli: &Cli, range: &RangeArgs) -> Result<Self, CliError> {
        let regions = catalog::load_regions(&cli.catalog)?;
        info!(
            catalog = %cli.catalog.display(),
            regions = regions.len(),
            "Region catalog loaded"
        );

        let enumerator = Enumerator::from_months(range.year, range.start_month, range.end_month)
            .map_err(CliError::InvalidArgument)?;

        let client = build_http_client()
            .map_err(|e| CliError::ConfigurationError(format!("HTTP client: {e}")))?;
        let compute = Arc::new(RestCompute::from_env(client.clone())?);

        let config = ExtractConfig {
            request_limit: cli.concurrency,
            max_retries: cli.max_retries,
        };
        let pool = FetchPool::new(compute, client, &config);

        Ok(Self {
            regions,
            enumerator,
            run: ExtractRun::new(pool),
        })
    }

    async fn execute(
        &self,
        sink: Arc<dyn Persist>,
        probe: Option<&Region>,
        label: &str,
    ) -> RunReport {
        let pb = create_progress_bar(self.enumerator.day_count(), label);
        self.run
            .run(&self.enumerator, &self.regions, &sink, probe, |date| {
                pb.set_message(date.format("%Y-%m-%d").to_string());
                pb.inc(1);
            })
            .await;
        pb.finish();

        let report = self.run.report();
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped_days = report.skipped_days,
            "Extraction run finished"
        );
        for failure in &report.failures {
            info!(key = %failure.key, kind = %failure.kind, "{}", failure.message);
        }
        report
    }
}

impl ImagesArgs {
    /// Run the raster extraction for the configured range.
    pub async fn execute(&self, cli: &Cli) -> Result<RunReport, CliError> {
        let context = RunContext::build(cli, &self.range)?;

        let options = RasterOptions {
            scale: self.range.scale,
            crs: self.crs.clone(),
            ..RasterOptions::default()
        };
        let sink: Arc<dyn Persist> = Arc::new(RasterSink::new(&cli.output_dir, options)?);

        let label = format!("Downloading rasters {}", self.range.year);
        Ok(context.execute(sink, None, &label).await)
    }
}

impl TimeseriesArgs {
    /// Run the day-gated pixel sampling for the configured range.
    pub async fn execute(&self, cli: &Cli) -> Result<RunReport, CliError> {
        let context = RunContext::build(cli, &self.range)?;

        let probe = match self.probe_index {
            Some(id) => context
                .regions
                .iter()
                .find(|r| r.id == id)
                .ok_or_else(|| {
                    CliError::InvalidArgument(format!("no region with id {id} in catalog"))
                })?,
            // Catalog loading guarantees at least one region.
            None => &context.regions[0],
        }
        .clone();

        let options = SampleOptions {
            scale: self.range.scale,
            ..SampleOptions::default()
        };
        let table_path = cli.output_dir.join(format!("{}.csv", self.range.year));
        let sink: Arc<dyn Persist> = Arc::new(TableSink::new(table_path, options)?);

        let label = format!("Sampling timeseries {}", self.range.year);
        Ok(context.execute(sink, Some(&probe), &label).await)
    }
}

/// Create the per-day progress bar.
fn create_progress_bar(total_days: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_days);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} days {msg}")
            .expect("hardcoded template is valid")
            .progress_chars("#>-"),
    );
    pb.set_message(label.to_string());
    pb
}
