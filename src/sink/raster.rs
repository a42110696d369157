//! Raster artifact sink: one file per work item key

use super::{Persist, SinkError, SinkResult, Written};
use crate::compute::{DownloadRequest, RasterOptions};
use crate::WorkKey;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// File extension for raster artifacts.
const RASTER_EXTENSION: &str = "tif";

/// Writes each successful payload to `{output_dir}/{date}_{region_id}.tif`.
///
/// The payload streams into a sibling `.part` file first and is renamed into
/// place once the stream completes, so a later reader either sees the full
/// artifact or nothing.
pub struct RasterSink {
    output_dir: PathBuf,
    options: RasterOptions,
}

impl RasterSink {
    /// Create a sink rooted at `output_dir`, creating the directory if needed.
    pub fn new<P: Into<PathBuf>>(output_dir: P, options: RasterOptions) -> SinkResult<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|e| {
            SinkError::IoError(format!(
                "failed to create output directory {}: {e}",
                output_dir.display()
            ))
        })?;
        Ok(Self {
            output_dir,
            options,
        })
    }

    /// Destination path for a work item key.
    pub fn artifact_path(&self, key: &WorkKey) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}.{RASTER_EXTENSION}",
            key.date.format("%Y-%m-%d"),
            key.region_id
        ))
    }

    /// Stream a payload into the artifact for `key`.
    ///
    /// On any stream or write error the partial `.part` file is removed and
    /// the destination path is left untouched.
    pub async fn write_stream<S>(&self, key: &WorkKey, mut stream: S) -> SinkResult<Written>
    where
        S: Stream<Item = SinkResult<Bytes>> + Unpin + Send,
    {
        let destination = self.artifact_path(key);
        let partial = destination.with_extension(format!("{RASTER_EXTENSION}.part"));

        let result = self.stream_to_file(&partial, &mut stream).await;
        match result {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &destination)
                    .await
                    .map_err(|e| {
                        SinkError::IoError(format!(
                            "failed to finalize {}: {e}",
                            destination.display()
                        ))
                    })?;
                debug!(
                    key = %key,
                    bytes = bytes,
                    path = %destination.display(),
                    "Raster artifact written"
                );
                Ok(Written {
                    destination,
                    units: bytes,
                })
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&partial).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            path = %partial.display(),
                            error = %remove_err,
                            "Failed to remove partial artifact"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn stream_to_file<S>(&self, path: &Path, stream: &mut S) -> SinkResult<u64>
    where
        S: Stream<Item = SinkResult<Bytes>> + Unpin + Send,
    {
        let mut file = tokio::fs::File::create(path).await.map_err(|e| {
            SinkError::IoError(format!("failed to create {}: {e}", path.display()))
        })?;

        let mut bytes_written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| {
                SinkError::IoError(format!("failed to write {}: {e}", path.display()))
            })?;
            bytes_written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| SinkError::IoError(format!("failed to flush {}: {e}", path.display())))?;
        file.sync_all()
            .await
            .map_err(|e| SinkError::IoError(format!("failed to sync {}: {e}", path.display())))?;

        Ok(bytes_written)
    }
}

#[async_trait]
impl Persist for RasterSink {
    fn download_request(&self) -> DownloadRequest {
        DownloadRequest::Raster(self.options.clone())
    }

    async fn persist(&self, key: &WorkKey, response: reqwest::Response) -> SinkResult<Written> {
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| SinkError::ReadError(e.to_string())));
        self.write_stream(key, Box::pin(stream)).await
    }
}
