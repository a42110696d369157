//! Shared CSV table sink: append-only, one table per run

use super::{Persist, SinkError, SinkResult, Written};
use crate::compute::{DownloadRequest, SampleOptions};
use crate::WorkKey;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Appends sampled pixel rows from every successful work item to one shared
/// CSV file, injecting a `date` column per row.
///
/// The file is created with a header on the first successful append; later
/// appends write data rows only. An async mutex serializes appends so
/// concurrent workers never interleave partial rows. Callers get atomicity
/// per call, not ordering across workers.
pub struct TableSink {
    path: PathBuf,
    options: SampleOptions,
    append_lock: Mutex<()>,
}

impl TableSink {
    /// Create a sink writing to `path`, creating parent directories if needed.
    /// The table file itself is not created until the first successful append.
    pub fn new<P: Into<PathBuf>>(path: P, options: SampleOptions) -> SinkResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SinkError::IoError(format!(
                        "failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        Ok(Self {
            path,
            options,
            append_lock: Mutex::new(()),
        })
    }

    /// The shared table path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the data rows of one CSV payload, tagging each row with `date`.
    ///
    /// The payload's header is extended with a `date` column and written only
    /// if the table does not exist yet (or is empty). A payload with no data
    /// rows is an [`SinkError::EmptyPayload`] failure, mirroring the upstream
    /// "no data for this window" condition.
    pub async fn append_rows(&self, date: &str, payload: &str) -> SinkResult<Written> {
        let (header, rows, row_count) = render_rows(date, payload)?;

        let _guard = self.append_lock.lock().await;

        // The blocking file I/O runs off the async worker threads; the lock
        // stays held across it so appends remain serialized.
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_to_file(&path, &header, &rows))
            .await
            .map_err(|e| SinkError::IoError(format!("append task failed: {e}")))??;

        debug!(
            date = date,
            rows = row_count,
            path = %self.path.display(),
            "Table rows appended"
        );

        Ok(Written {
            destination: self.path.clone(),
            units: row_count,
        })
    }
}

/// Append rendered bytes to the table file, writing the header first if the
/// file is empty.
fn append_to_file(path: &Path, header: &[u8], rows: &[u8]) -> SinkResult<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SinkError::IoError(format!("failed to open {}: {e}", path.display())))?;

    let is_new = file
        .metadata()
        .map_err(|e| SinkError::IoError(e.to_string()))?
        .len()
        == 0;

    if is_new {
        file.write_all(header)
            .map_err(|e| SinkError::IoError(e.to_string()))?;
    }
    file.write_all(rows)
        .map_err(|e| SinkError::IoError(e.to_string()))?;
    file.flush()
        .map_err(|e| SinkError::IoError(e.to_string()))?;
    Ok(())
}

/// Render one payload into header bytes and data-row bytes with the `date`
/// column appended.
fn render_rows(date: &str, payload: &str) -> SinkResult<(Vec<u8>, Vec<u8>, u64)> {
    if payload.trim().is_empty() {
        return Err(SinkError::EmptyPayload(
            "payload contained no rows".to_string(),
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(false)
        .from_reader(payload.as_bytes());

    let mut header = reader
        .headers()
        .map_err(|e| SinkError::CsvError(format!("failed to parse header: {e}")))?
        .clone();
    header.push_field("date");

    let mut header_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    header_writer
        .write_record(&header)
        .map_err(|e| SinkError::CsvError(e.to_string()))?;
    let header_bytes = header_writer
        .into_inner()
        .map_err(|e| SinkError::CsvError(e.to_string()))?;

    let mut row_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    let mut row_count = 0u64;
    for record in reader.records() {
        let mut record =
            record.map_err(|e| SinkError::CsvError(format!("failed to parse row: {e}")))?;
        record.push_field(date);
        row_writer
            .write_record(&record)
            .map_err(|e| SinkError::CsvError(e.to_string()))?;
        row_count += 1;
    }

    if row_count == 0 {
        return Err(SinkError::EmptyPayload(
            "payload contained a header but no data rows".to_string(),
        ));
    }

    let row_bytes = row_writer
        .into_inner()
        .map_err(|e| SinkError::CsvError(e.to_string()))?;

    Ok((header_bytes, row_bytes, row_count))
}

#[async_trait]
impl Persist for TableSink {
    fn download_request(&self) -> DownloadRequest {
        DownloadRequest::Sample(self.options.clone())
    }

    async fn persist(&self, key: &WorkKey, response: reqwest::Response) -> SinkResult<Written> {
        let payload = response
            .text()
            .await
            .map_err(|e| SinkError::ReadError(e.to_string()))?;
        let date = key.date.format("%Y-%m-%d").to_string();
        self.append_rows(&date, &payload).await
    }
}
