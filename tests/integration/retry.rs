//! Bounded retry behavior for transport failures

use crate::integration::support::{test_regions, MockCompute};
use fire_data_extractor::compute::{FeatureCompute, RasterOptions};
use fire_data_extractor::enumerate::Enumerator;
use fire_data_extractor::extract::{build_http_client, ExtractConfig, ExtractRun, FetchPool};
use fire_data_extractor::ledger::FailureKind;
use fire_data_extractor::sink::{Persist, RasterSink};
use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn retrying_pool(server: &MockServer, max_retries: u32) -> FetchPool {
    FetchPool::new(
        Arc::new(MockCompute::new(server.uri())) as Arc<dyn FeatureCompute>,
        build_http_client().unwrap(),
        &ExtractConfig {
            request_limit: 2,
            max_retries,
        },
    )
}

#[tokio::test]
async fn test_transient_failure_recovers_with_one_outcome() {
    let server = MockServer::start().await;

    // First request fails with 500, the retry succeeds.
    Mock::given(method("GET"))
        .and(path("/artifact/2024-06-01/1"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artifact/2024-06-01/1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"raster-bytes".to_vec()))
        .mount(&server)
        .await;

    let regions = test_regions(1);
    let enumerator = Enumerator::new(date(2024, 6, 1), date(2024, 6, 1));
    let output = TempDir::new().unwrap();
    let sink: Arc<dyn Persist> =
        Arc::new(RasterSink::new(output.path(), RasterOptions::default()).unwrap());

    let run = ExtractRun::new(retrying_pool(&server, 1));
    run.run(&enumerator, &regions, &sink, None, |_| {}).await;

    // Exactly one outcome for the item, and it is the success.
    let report = run.report();
    assert_eq!(report.processed, 1);
    assert_eq!(report.succeeded, 1);
    assert!(report.is_clean());
    assert_eq!(
        std::fs::read(output.path().join("2024-06-01_1.tif")).unwrap(),
        b"raster-bytes"
    );
}

#[tokio::test]
async fn test_exhausted_retries_yield_single_failure() {
    let server = MockServer::start().await;

    // Persistent failure: the initial attempt plus one retry, nothing more.
    Mock::given(method("GET"))
        .and(path("/artifact/2024-06-01/1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let regions = test_regions(1);
    let enumerator = Enumerator::new(date(2024, 6, 1), date(2024, 6, 1));
    let output = TempDir::new().unwrap();
    let sink: Arc<dyn Persist> =
        Arc::new(RasterSink::new(output.path(), RasterOptions::default()).unwrap());

    let run = ExtractRun::new(retrying_pool(&server, 1));
    run.run(&enumerator, &regions, &sink, None, |_| {}).await;

    let report = run.report();
    assert_eq!(report.processed, 1);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].kind, FailureKind::Transport);
    assert!(
        report.failures[0].message.contains("500"),
        "{}",
        report.failures[0].message
    );
    assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
}
