//! Fetch pool configuration constants

use std::time::Duration;

/// Default cap on simultaneous in-flight remote requests.
/// Matches what the upstream compute service tolerates per client before it
/// starts shedding requests.
pub const DEFAULT_REQUEST_LIMIT: usize = 30;

/// Hard ceiling for the request limit regardless of CLI input.
pub const MAX_REQUEST_LIMIT: usize = 64;

/// Time allowed to establish a connection.
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Whole-request timeout. Raster payloads for large regions can take minutes
/// to generate server-side before the first byte arrives.
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 600;

/// Initial backoff delay in milliseconds.
/// 1 second is long enough for rate limit windows to reset but short enough
/// to not overly delay recovery from transient errors.
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum backoff delay in milliseconds.
/// 30 seconds caps exponential backoff to prevent excessive wait times.
pub const MAX_BACKOFF_MS: u64 = 30000;

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS * 2u64.pow(retry_count);
    let delay_ms = delay_ms.min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}

/// Tunables for one fetch pool.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Cap on simultaneous in-flight remote requests (clamped to
    /// `1..=MAX_REQUEST_LIMIT`)
    pub request_limit: usize,
    /// Additional attempts for retryable transport failures. Zero disables
    /// retries entirely; each item then gets exactly one attempt.
    pub max_retries: u32,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            request_limit: DEFAULT_REQUEST_LIMIT,
            max_retries: 0,
        }
    }
}

impl ExtractConfig {
    /// Request limit clamped to the allowed range.
    pub fn effective_limit(&self) -> usize {
        self.request_limit.clamp(1, MAX_REQUEST_LIMIT)
    }
}

/// Build the HTTP client shared by every worker. One client per run so the
/// connection pool is reused across items.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
        .build()
}
