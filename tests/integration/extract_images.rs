//! End-to-end raster extraction against a mock download server

use crate::integration::support::{test_regions, MockCompute};
use fire_data_extractor::compute::{FeatureCompute, RasterOptions};
use fire_data_extractor::enumerate::Enumerator;
use fire_data_extractor::extract::{build_http_client, ExtractConfig, ExtractRun, FetchPool};
use fire_data_extractor::ledger::FailureKind;
use fire_data_extractor::shutdown::ShutdownCoordinator;
use fire_data_extractor::sink::{Persist, RasterSink};
use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn pool_with_limit(server: &MockServer, limit: usize) -> (Arc<MockCompute>, FetchPool) {
    let compute = Arc::new(MockCompute::new(server.uri()));
    let pool = FetchPool::new(
        Arc::clone(&compute) as Arc<dyn FeatureCompute>,
        build_http_client().unwrap(),
        &ExtractConfig {
            request_limit: limit,
            max_retries: 0,
        },
    );
    (compute, pool)
}

#[tokio::test]
async fn test_raster_run_with_partial_failures() {
    let server = MockServer::start().await;

    // Region 2 is persistently unavailable; everything else succeeds.
    Mock::given(method("GET"))
        .and(path_regex(r"^/artifact/\d{4}-\d{2}-\d{2}/2$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/artifact/\d{4}-\d{2}-\d{2}/(1|3)$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"raster-bytes".to_vec()))
        .mount(&server)
        .await;

    let regions = test_regions(3);
    let enumerator = Enumerator::new(date(2024, 6, 1), date(2024, 6, 2));
    let output = TempDir::new().unwrap();
    let sink: Arc<dyn Persist> =
        Arc::new(RasterSink::new(output.path(), RasterOptions::default()).unwrap());

    let (_, pool) = pool_with_limit(&server, 2);
    let run = ExtractRun::new(pool);
    run.run(&enumerator, &regions, &sink, None, |_| {}).await;

    let report = run.report();
    assert_eq!(report.processed, 6);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 2);
    assert_eq!(report.skipped_days, 0);
    for failure in &report.failures {
        assert_eq!(failure.key.region_id, 2);
        assert_eq!(failure.kind, FailureKind::Transport);
        assert!(failure.message.contains("404"), "{}", failure.message);
    }

    // Successful artifacts exist with the expected names and content; the
    // failed key left nothing behind.
    for name in [
        "2024-06-01_1.tif",
        "2024-06-01_3.tif",
        "2024-06-02_1.tif",
        "2024-06-02_3.tif",
    ] {
        let contents = std::fs::read(output.path().join(name)).unwrap();
        assert_eq!(contents, b"raster-bytes");
    }
    assert!(!output.path().join("2024-06-01_2.tif").exists());
    assert!(!output.path().join("2024-06-01_2.tif.part").exists());
}

#[tokio::test]
async fn test_in_flight_requests_stay_under_cap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/artifact/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;

    let regions = test_regions(8);
    let enumerator = Enumerator::new(date(2024, 6, 1), date(2024, 6, 1));
    let output = TempDir::new().unwrap();
    let sink: Arc<dyn Persist> =
        Arc::new(RasterSink::new(output.path(), RasterOptions::default()).unwrap());

    let (compute, pool) = pool_with_limit(&server, 3);
    let run = ExtractRun::new(pool);
    run.run(&enumerator, &regions, &sink, None, |_| {}).await;

    let report = run.report();
    assert_eq!(report.succeeded, 8);
    assert!(
        compute.max_in_flight() <= 3,
        "observed {} in-flight compositions with cap 3",
        compute.max_in_flight()
    );
}

#[tokio::test]
async fn test_shutdown_before_run_leaves_no_trace() {
    let server = MockServer::start().await;
    let regions = test_regions(3);
    let enumerator = Enumerator::new(date(2024, 6, 1), date(2024, 6, 2));
    let output = TempDir::new().unwrap();
    let sink: Arc<dyn Persist> =
        Arc::new(RasterSink::new(output.path(), RasterOptions::default()).unwrap());

    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let (_, pool) = pool_with_limit(&server, 2);
    let run = ExtractRun::new(pool.with_shutdown(shutdown));
    run.run(&enumerator, &regions, &sink, None, |_| {}).await;

    // Unstarted items vanish: no outcomes, no ledger entries, no files.
    let report = run.report();
    assert_eq!(report.processed, 0);
    assert!(report.is_clean());
    assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
}
