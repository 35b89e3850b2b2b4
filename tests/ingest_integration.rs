//! Integration tests for the ingest pipeline: unpack → parse → store.

use std::path::Path;
use std::time::Duration;

use mtgdb_core::dataset::Rarity;
use mtgdb_core::fetch::{FetchEngine, FetchRequest, HttpClient, RetryPolicy};
use mtgdb_core::pipeline::{IngestError, IngestPipeline};
use mtgdb_core::store::{CardStore, LinkRegistry, NewLink, ReinitConfirmation};
use mtgdb_core::unpack::UnpackError;
use mtgdb_core::{Database, DatabaseOptions};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::fixtures::{large_set_json, set_map_json, tst_bolt_json, write_zip, zip_bytes};
use support::socket_guard::start_mock_server_or_skip;

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        mock_server
    }};
}

/// File-backed store plus a pipeline staging under the same temp dir.
async fn setup(temp_dir: &TempDir) -> (CardStore, IngestPipeline) {
    let db = Database::new(&temp_dir.path().join("cards.db")).await.unwrap();
    let store = CardStore::new(db);
    let engine = FetchEngine::new(
        4,
        RetryPolicy::new(1, Duration::from_millis(10), Duration::from_millis(10), 2.0),
    )
    .unwrap();
    let pipeline = IngestPipeline::new(
        store.clone(),
        engine,
        HttpClient::new(),
        temp_dir.path().join("work"),
    );
    (store, pipeline)
}

fn write_fixture_zip(dir: &Path, name: &str, json: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    write_zip(&path, &[("AllPrintings.json", json.as_bytes())]);
    path
}

#[tokio::test]
async fn test_end_to_end_single_card_stats() {
    let temp_dir = TempDir::new().unwrap();
    let (store, pipeline) = setup(&temp_dir).await;
    let archive = write_fixture_zip(temp_dir.path(), "tst.zip", &tst_bolt_json());

    let report = pipeline.ingest_local(&archive, "AllPrintings").await;
    let summary = report.result.unwrap();
    assert_eq!(summary.sets_written, 1);
    assert_eq!(summary.cards_written, 1);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_sets, 1);
    assert_eq!(stats.total_cards, 1);
    assert_eq!(stats.by_rarity.get(Rarity::Common), 1);
    assert_eq!(stats.by_set[0].code, "TST");
    assert_eq!(stats.by_set[0].cards, 1);
}

#[tokio::test]
async fn test_reingesting_same_archive_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let (store, pipeline) = setup(&temp_dir).await;
    let json = set_map_json(&[
        (
            "TST",
            "Test Set",
            &[
                ("c1", "Bolt", "Instant", "common"),
                ("c2", "Bear", "Creature — Bear", "uncommon"),
            ],
        ),
        ("AAA", "Other", &[("c3", "Opt", "Instant", "common")]),
    ]);
    let archive = write_fixture_zip(temp_dir.path(), "all.zip", &json);

    pipeline.ingest_local(&archive, "AllPrintings").await.result.unwrap();
    let first = store.stats().await.unwrap();
    let first_cards = store.list_cards(100, 0).await.unwrap();

    pipeline.ingest_local(&archive, "AllPrintings").await.result.unwrap();
    let second = store.stats().await.unwrap();
    let second_cards = store.list_cards(100, 0).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first_cards, second_cards);
    assert_eq!(second.total_cards, 3);
}

#[tokio::test]
async fn test_one_corrupt_record_in_ten_thousand_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let (store, pipeline) = setup(&temp_dir).await;
    let archive = write_fixture_zip(
        temp_dir.path(),
        "big.zip",
        &large_set_json("BIG", 10_000, Some(4_242)),
    );

    let summary = pipeline.ingest_local(&archive, "Big").await.result.unwrap();

    assert_eq!(summary.cards_written, 9_999);
    assert_eq!(summary.skipped.cards, 1);
    assert_eq!(store.stats().await.unwrap().total_cards, 9_999);
}

#[tokio::test]
async fn test_concurrent_archives_produce_union() {
    let temp_dir = TempDir::new().unwrap();
    let (store, pipeline) = setup(&temp_dir).await;
    let first = write_fixture_zip(
        temp_dir.path(),
        "one.zip",
        &set_map_json(&[("ONE", "First", &[("a1", "Alpha", "Instant", "common")])]),
    );
    let second = write_fixture_zip(
        temp_dir.path(),
        "two.zip",
        &set_map_json(&[("TWO", "Second", &[("b1", "Beta", "Sorcery", "rare")])]),
    );

    let (left, right) = tokio::join!(
        pipeline.ingest_local(&first, "One"),
        pipeline.ingest_local(&second, "Two"),
    );
    left.result.unwrap();
    right.result.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_sets, 2);
    assert_eq!(stats.total_cards, 2);
    assert_eq!(stats.by_rarity.get(Rarity::Rare), 1);
}

#[tokio::test]
async fn test_small_archive_survives_long_sibling_write() {
    let temp_dir = TempDir::new().unwrap();
    // A busy timeout far shorter than the large write, so the small archive
    // has to wait for the lock at the pipeline level.
    let db = Database::new_with_options(
        &temp_dir.path().join("cards.db"),
        DatabaseOptions {
            max_connections: 4,
            busy_timeout_ms: 20,
        },
    )
    .await
    .unwrap();
    let store = CardStore::new(db);
    let pipeline = IngestPipeline::new(
        store.clone(),
        FetchEngine::new(2, RetryPolicy::with_max_attempts(1)).unwrap(),
        HttpClient::new(),
        temp_dir.path().join("work"),
    )
    .with_write_retry(RetryPolicy::new(
        200,
        Duration::from_millis(10),
        Duration::from_millis(100),
        2.0,
    ));

    let big = write_fixture_zip(
        temp_dir.path(),
        "big.zip",
        &large_set_json("BIG", 30_000, None),
    );
    let small = write_fixture_zip(temp_dir.path(), "small.zip", &tst_bolt_json());

    let (big_report, small_report) = tokio::join!(
        pipeline.ingest_local(&big, "Big"),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            pipeline.ingest_local(&small, "Small").await
        },
    );

    assert_eq!(big_report.result.unwrap().cards_written, 30_000);
    assert_eq!(small_report.result.unwrap().cards_written, 1);
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_sets, 2);
    assert_eq!(stats.total_cards, 30_001);
}

#[tokio::test]
async fn test_local_json_with_byte_order_mark() {
    let temp_dir = TempDir::new().unwrap();
    let (store, pipeline) = setup(&temp_dir).await;
    let source = temp_dir.path().join("AllPrintings.json");
    let mut bytes = b"\xEF\xBB\xBF".to_vec();
    bytes.extend_from_slice(tst_bolt_json().as_bytes());
    std::fs::write(&source, bytes).unwrap();

    let report = pipeline.ingest_local(&source, "AllPrintings").await;

    assert_eq!(report.result.unwrap().cards_written, 1);
    assert_eq!(store.stats().await.unwrap().total_cards, 1);
}

#[tokio::test]
async fn test_run_fetches_and_ingests_in_parallel() {
    let mock_server = require_mock_server!();
    let one = zip_bytes(&[(
        "One.json",
        set_map_json(&[("ONE", "First", &[("a1", "Alpha", "Instant", "common")])]).as_bytes(),
    )]);
    let two = zip_bytes(&[(
        "Two.json",
        set_map_json(&[("TWO", "Second", &[("b1", "Beta", "Sorcery", "rare")])]).as_bytes(),
    )]);
    Mock::given(method("GET"))
        .and(path("/One.json.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(one))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Two.json.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(two))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let (store, pipeline) = setup(&temp_dir).await;
    let report = pipeline
        .run(vec![
            FetchRequest::new("One", format!("{}/One.json.zip", mock_server.uri())),
            FetchRequest::new("Two", format!("{}/Two.json.zip", mock_server.uri())),
        ])
        .await;

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.totals().cards_written, 2);
    assert_eq!(store.stats().await.unwrap().total_sets, 2);

    let sets = store.list_sets().await.unwrap();
    assert_eq!(sets[0].category, "One");
    assert_eq!(sets[1].category, "Two");
}

#[tokio::test]
async fn test_run_failing_archives_do_not_affect_others() {
    let mock_server = require_mock_server!();
    let good = zip_bytes(&[("TST.json", tst_bolt_json().as_bytes())]);
    Mock::given(method("GET"))
        .and(path("/good.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(good))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/corrupt.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04 truncated".to_vec()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let (store, pipeline) = setup(&temp_dir).await;
    let report = pipeline
        .run(vec![
            FetchRequest::new("Corrupt", format!("{}/corrupt.zip", mock_server.uri())),
            FetchRequest::new("Good", format!("{}/good.zip", mock_server.uri())),
            FetchRequest::new("Missing", format!("{}/missing.zip", mock_server.uri())),
        ])
        .await;

    assert!(matches!(
        report.archives[0].result,
        Err(IngestError::Unpack(UnpackError::Corrupt { .. }))
    ));
    assert!(report.archives[1].result.is_ok());
    assert!(matches!(report.archives[2].result, Err(IngestError::Fetch(_))));
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 2);
    assert_eq!(store.stats().await.unwrap().total_cards, 1);
}

#[tokio::test]
async fn test_registry_links_drive_ingestion() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/AllPrintings.json.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(zip_bytes(&[("AllPrintings.json", tst_bolt_json().as_bytes())])),
        )
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let (store, pipeline) = setup(&temp_dir).await;
    let registry = LinkRegistry::new(store.database().clone());
    registry
        .replace_all(&[NewLink::new(
            "AllPrintings",
            format!("{}/AllPrintings.json.zip", mock_server.uri()),
        )])
        .await
        .unwrap();

    let requests = registry
        .list()
        .await
        .unwrap()
        .iter()
        .map(mtgdb_core::store::Link::to_fetch_request)
        .collect();
    let report = pipeline.run(requests).await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.archives[0].category, "AllPrintings");
    assert_eq!(store.stats().await.unwrap().total_cards, 1);
}

#[tokio::test]
async fn test_archive_without_json_reports_no_data_file() {
    let temp_dir = TempDir::new().unwrap();
    let (store, pipeline) = setup(&temp_dir).await;
    let archive = temp_dir.path().join("readme.zip");
    write_zip(&archive, &[("README.txt", b"nothing here")]);

    let report = pipeline.ingest_local(&archive, "Docs").await;

    assert!(matches!(report.result, Err(IngestError::NoDataFile { .. })));
    assert_eq!(store.stats().await.unwrap().total_cards, 0);
}

#[tokio::test]
async fn test_reinitialize_after_ingest_empties_store() {
    let temp_dir = TempDir::new().unwrap();
    let (store, pipeline) = setup(&temp_dir).await;
    let archive = write_fixture_zip(temp_dir.path(), "tst.zip", &tst_bolt_json());
    pipeline.ingest_local(&archive, "AllPrintings").await.result.unwrap();

    store.reinitialize(ReinitConfirmation::Confirmed).await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_cards, 0);
    assert_eq!(stats.total_sets, 0);

    // Schema is usable again right away.
    pipeline.ingest_local(&archive, "AllPrintings").await.result.unwrap();
    assert_eq!(store.stats().await.unwrap().total_cards, 1);
}
