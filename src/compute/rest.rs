//! REST adapter for the remote feature-composition service
//!
//! Wire format: `POST {base}/v1/features:compose` with the geometry and time
//! window returns a composition descriptor `{"expression": "...", "bands": n}`;
//! `POST {base}/v1/features:download` with that expression and the desired
//! result shape returns `{"url": "..."}`. The URL is then fetched by the
//! worker pool over plain GET - this adapter never downloads payload bytes
//! itself.
//!
//! The adapter shares the run's HTTP session (`reqwest::Client` clones are
//! cheap handle copies) so composition calls and payload downloads reuse one
//! connection pool.

use super::{ComputeError, ComputeResult, DownloadRequest, FeatureCompute, RemoteHandle};
use crate::Polygon;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Environment variable naming the compute service base URL.
pub const ENDPOINT_URL_VAR: &str = "FEATURE_COMPUTE_URL";

/// Environment variable holding the bearer token, if the service requires one.
pub const ENDPOINT_TOKEN_VAR: &str = "FEATURE_COMPUTE_TOKEN";

/// REST-backed implementation of [`FeatureCompute`].
pub struct RestCompute {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComposeResponse {
    expression: String,
    #[serde(default)]
    bands: u32,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    url: String,
}

impl RestCompute {
    /// Create an adapter for the service at `base_url`, reusing the given
    /// HTTP session. A trailing slash on the base URL is tolerated.
    pub fn new(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            base_url,
            token,
        }
    }

    /// Create an adapter from `FEATURE_COMPUTE_URL` / `FEATURE_COMPUTE_TOKEN`.
    pub fn from_env(client: Client) -> ComputeResult<Self> {
        let base_url = std::env::var(ENDPOINT_URL_VAR).map_err(|_| {
            ComputeError::Configuration(format!("{ENDPOINT_URL_VAR} is not set"))
        })?;
        let token = std::env::var(ENDPOINT_TOKEN_VAR).ok();
        Ok(Self::new(client, base_url, token))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> ComputeResult<T> {
        let url = format!("{}{endpoint}", self.base_url);
        debug!(url = %url, "Compute service request");

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ComputeError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ComputeError::Rejected(format!(
                "{endpoint} returned {status}: {detail}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ComputeError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl FeatureCompute for RestCompute {
    async fn compose_features(
        &self,
        geometry: &Polygon,
        start_iso: &str,
        end_iso: &str,
    ) -> ComputeResult<Box<dyn RemoteHandle>> {
        let body = json!({
            "start": start_iso,
            "end": end_iso,
            "geometry": {
                "type": "Polygon",
                "coordinates": geometry.coordinates,
            },
        });

        let composed: ComposeResponse = self.post_json("/v1/features:compose", body).await?;
        if composed.bands == 0 {
            return Err(ComputeError::EmptyResult(format!(
                "composed image has zero bands for window {start_iso}..{end_iso}"
            )));
        }

        Ok(Box::new(RestHandle {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            expression: composed.expression,
            region: geometry.clone(),
        }))
    }
}

/// Handle over one composed expression. Consumed by `download_url`.
struct RestHandle {
    client: Client,
    base_url: String,
    token: Option<String>,
    expression: String,
    region: Polygon,
}

#[async_trait]
impl RemoteHandle for RestHandle {
    async fn download_url(self: Box<Self>, request: &DownloadRequest) -> ComputeResult<String> {
        let region = json!({
            "type": "Polygon",
            "coordinates": self.region.coordinates,
        });
        let body = match request {
            DownloadRequest::Raster(options) => json!({
                "expression": self.expression,
                "region": region,
                "raster": options,
            }),
            DownloadRequest::Sample(options) => json!({
                "expression": self.expression,
                "region": region,
                "sample": options,
            }),
        };

        let adapter = RestCompute {
            client: self.client,
            base_url: self.base_url,
            token: self.token,
        };
        let response: DownloadResponse = adapter.post_json("/v1/features:download", body).await?;
        Ok(response.url)
    }
}
