//! Day-gate probe semantics for the timeseries variant

use crate::integration::support::{test_regions, MockCompute};
use fire_data_extractor::compute::{FeatureCompute, SampleOptions};
use fire_data_extractor::enumerate::Enumerator;
use fire_data_extractor::extract::{build_http_client, ExtractConfig, ExtractRun, FetchPool};
use fire_data_extractor::ledger::FailureKind;
use fire_data_extractor::sink::{Persist, TableSink};
use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SAMPLE_CSV: &str = "longitude,latitude,M11\n-120.0,34.0,0.52\n";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_failed_probe_skips_whole_day() {
    let server = MockServer::start().await;

    // Day one: the probe region is unavailable. No other region of that day
    // may see a single request.
    Mock::given(method("GET"))
        .and(path("/artifact/2024-07-01/1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artifact/2024-07-01/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_CSV))
        .expect(0)
        .mount(&server)
        .await;

    // Day two behaves normally.
    Mock::given(method("GET"))
        .and(path_regex(r"^/artifact/2024-07-02/(1|2)$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_CSV))
        .mount(&server)
        .await;

    let regions = test_regions(2);
    let enumerator = Enumerator::new(date(2024, 7, 1), date(2024, 7, 2));
    let output = TempDir::new().unwrap();
    let table_path = output.path().join("2024.csv");
    let sink: Arc<dyn Persist> =
        Arc::new(TableSink::new(&table_path, SampleOptions::default()).unwrap());

    let pool = FetchPool::new(
        Arc::new(MockCompute::new(server.uri())) as Arc<dyn FeatureCompute>,
        build_http_client().unwrap(),
        &ExtractConfig {
            request_limit: 4,
            max_retries: 0,
        },
    );
    let run = ExtractRun::new(pool);
    run.run(&enumerator, &regions, &sink, Some(&regions[0]), |_| {})
        .await;

    let report = run.report();
    // The skipped day contributes one ledger entry and zero processed items.
    assert_eq!(report.processed, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped_days, 1);

    let skip = &report.failures[0];
    assert_eq!(skip.kind, FailureKind::DaySkipped);
    assert_eq!(skip.key.date, date(2024, 7, 1));
    assert_eq!(skip.key.region_id, 1);
    assert!(skip.message.contains("500"), "{}", skip.message);

    // Only day two reached the table.
    let contents = std::fs::read_to_string(&table_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].ends_with("2024-07-02"));
    assert!(lines[2].ends_with("2024-07-02"));
}

#[tokio::test]
async fn test_empty_probe_payload_skips_day() {
    let server = MockServer::start().await;

    // The probe region answers 200 but with nothing in it: an upstream
    // no-data day. That must fail the gate, not pass it and let every
    // region fail individually.
    Mock::given(method("GET"))
        .and(path("/artifact/2024-07-01/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artifact/2024-07-01/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_CSV))
        .expect(0)
        .mount(&server)
        .await;

    let regions = test_regions(2);
    let enumerator = Enumerator::new(date(2024, 7, 1), date(2024, 7, 1));
    let output = TempDir::new().unwrap();
    let table_path = output.path().join("2024.csv");
    let sink: Arc<dyn Persist> =
        Arc::new(TableSink::new(&table_path, SampleOptions::default()).unwrap());

    let pool = FetchPool::new(
        Arc::new(MockCompute::new(server.uri())) as Arc<dyn FeatureCompute>,
        build_http_client().unwrap(),
        &ExtractConfig {
            request_limit: 4,
            max_retries: 0,
        },
    );
    let run = ExtractRun::new(pool);
    run.run(&enumerator, &regions, &sink, Some(&regions[0]), |_| {})
        .await;

    let report = run.report();
    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped_days, 1);
    assert_eq!(report.failures[0].kind, FailureKind::DaySkipped);
    assert_eq!(report.failures[0].key.date, date(2024, 7, 1));
    assert!(
        report.failures[0].message.contains("no data"),
        "{}",
        report.failures[0].message
    );
    assert!(!table_path.exists());
}

#[tokio::test]
async fn test_probe_payload_is_discarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/artifact/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_CSV))
        .mount(&server)
        .await;

    let regions = test_regions(1);
    let enumerator = Enumerator::new(date(2024, 7, 1), date(2024, 7, 1));
    let output = TempDir::new().unwrap();
    let table_path = output.path().join("2024.csv");
    let sink: Arc<dyn Persist> =
        Arc::new(TableSink::new(&table_path, SampleOptions::default()).unwrap());

    let pool = FetchPool::new(
        Arc::new(MockCompute::new(server.uri())) as Arc<dyn FeatureCompute>,
        build_http_client().unwrap(),
        &ExtractConfig::default(),
    );
    let run = ExtractRun::new(pool);
    run.run(&enumerator, &regions, &sink, Some(&regions[0]), |_| {})
        .await;

    let report = run.report();
    assert_eq!(report.succeeded, 1);
    assert!(report.is_clean());

    // The probe hit the same region but only the batch item wrote rows.
    let contents = std::fs::read_to_string(&table_path).unwrap();
    assert_eq!(contents.lines().count(), 2);
}
