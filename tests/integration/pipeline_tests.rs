//! Integration tests for the fetch pipeline
//!
//! These tests use wiremock as the character-window API and in-process
//! renderer and publisher doubles to run full fetch cycles end-to-end.

use exile_tracker::config::{ApiConfig, FetcherConfig, UserAgentConfig};
use exile_tracker::poe::PoeClient;
use exile_tracker::publish::{BuildSite, PublishError, Publisher};
use exile_tracker::renderer::{RenderError, Renderer};
use exile_tracker::storage::{SqliteStorage, Storage};
use exile_tracker::FetchScheduler;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ITEMS_PATH: &str = "/character-window/get-items";
const PASSIVES_PATH: &str = "/character-window/get-passive-skills";

/// Renderer returning a fixed export and counting its invocations
#[derive(Clone, Default)]
struct FixedRenderer {
    export: Arc<Mutex<String>>,
    calls: Arc<AtomicUsize>,
}

impl FixedRenderer {
    fn new(export: &str) -> Self {
        Self {
            export: Arc::new(Mutex::new(export.to_string())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn set_export(&self, export: &str) {
        *self.export.lock().unwrap() = export.to_string();
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Renderer for FixedRenderer {
    async fn render(
        &self,
        _character_id: i64,
        items: &[u8],
        passives: &[u8],
    ) -> Result<String, RenderError> {
        assert!(!items.is_empty());
        assert!(!passives.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.export.lock().unwrap().clone())
    }
}

/// Publisher recording every upload
#[derive(Clone, Default)]
struct CountingPublisher {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl CountingPublisher {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Publisher for CountingPublisher {
    async fn publish(&self, _export: &str, site: &BuildSite) -> Result<String, PublishError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(PublishError::Rejected {
                site: site.label.to_string(),
                status: 503,
                body: "maintenance".to_string(),
            });
        }
        Ok(site.reference(&format!("build{}", n)))
    }
}

type TestScheduler = FetchScheduler<SqliteStorage, FixedRenderer, CountingPublisher>;

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        client_name: "TestTracker".to_string(),
        client_version: "1.0.0".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn fetcher_config() -> FetcherConfig {
    FetcherConfig {
        interval_minutes: 1,
        pacing_ms: 0,
        realm: "pc".to_string(),
    }
}

fn client_for(server: &MockServer) -> PoeClient {
    let api = ApiConfig {
        base_url: server.uri(),
        timeout_secs: 5,
    };
    PoeClient::new(&api, &user_agent()).unwrap()
}

/// Registers and tracks a character, returning (character id, tracked id)
fn track(storage: &mut SqliteStorage, account: &str, character: &str) -> (i64, i64) {
    let account_id = match storage.find_account_by_name(account).unwrap() {
        Some(existing) => existing.id,
        None => storage.create_account(account, None).unwrap(),
    };
    let character_id = storage
        .create_character(account_id, character, Some("Standard"))
        .unwrap();
    let tracked_id = storage.track_character(character_id).unwrap();
    (character_id, tracked_id)
}

fn items_body(character: &str) -> serde_json::Value {
    serde_json::json!({
        "items": [
            {"id": "a1", "name": "Doom Veil", "typeLine": "Hubris Circlet", "inventoryId": "Helm", "ilvl": 84}
        ],
        "character": {"name": character, "class": "Witch", "league": "Standard", "level": 92}
    })
}

fn passives_body() -> serde_json::Value {
    serde_json::json!({
        "hashes": [4, 8, 15, 16, 23, 42],
        "hashes_ex": [],
        "mastery_effects": {},
        "items": []
    })
}

/// Mounts successful items and passives responses for one character
async fn mount_character(server: &MockServer, account: &str, character: &str) {
    Mock::given(method("GET"))
        .and(path(ITEMS_PATH))
        .and(query_param("accountName", account))
        .and(query_param("character", character))
        .and(query_param("realm", "pc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items_body(character)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(PASSIVES_PATH))
        .and(query_param("accountName", account))
        .and(query_param("character", character))
        .respond_with(ResponseTemplate::new(200).set_body_json(passives_body()))
        .mount(server)
        .await;
}

fn scheduler(
    server: &MockServer,
    storage: SqliteStorage,
    renderer: &FixedRenderer,
    publisher: &CountingPublisher,
) -> TestScheduler {
    scheduler_with(server, storage, renderer, publisher, &fetcher_config())
}

fn scheduler_with(
    server: &MockServer,
    storage: SqliteStorage,
    renderer: &FixedRenderer,
    publisher: &CountingPublisher,
    fetcher: &FetcherConfig,
) -> TestScheduler {
    FetchScheduler::new(
        Arc::new(Mutex::new(storage)),
        client_for(server),
        renderer.clone(),
        fetcher,
    )
    .with_publisher(publisher.clone(), BuildSite::pobb_in())
}

/// Scheduler over two tracked characters with a long pause between them
async fn slow_paced_scheduler(
    server: &MockServer,
    renderer: &FixedRenderer,
    publisher: &CountingPublisher,
) -> TestScheduler {
    mount_character(server, "exile_42", "HexDoll").await;
    mount_character(server, "exile_42", "BoneZone").await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    track(&mut storage, "exile_42", "HexDoll");
    track(&mut storage, "exile_42", "BoneZone");

    let fetcher = FetcherConfig {
        pacing_ms: 60_000,
        ..fetcher_config()
    };
    scheduler_with(server, storage, renderer, publisher, &fetcher)
}

async fn wait_for_first_render(renderer: &FixedRenderer) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while renderer.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("first character was not rendered");
}

#[tokio::test]
async fn test_new_export_is_stored_then_unchanged() {
    let server = MockServer::start().await;
    mount_character(&server, "exile_42", "HexDoll").await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let (character_id, tracked_id) = track(&mut storage, "exile_42", "HexDoll");

    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = scheduler(&server, storage, &renderer, &publisher);

    let first = scheduler.run_once().await;
    assert_eq!(first.processed, 1);
    assert_eq!(first.persisted, 1);
    assert_eq!(first.failed, 0);
    assert_eq!(publisher.calls(), 1);

    {
        let storage = scheduler.storage();
        let storage = storage.lock().unwrap();
        let latest = storage.get_latest_snapshot(character_id).unwrap().unwrap();
        assert_eq!(latest.export_string, "E1");

        let links = storage.list_snapshot_links(latest.id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://pobb.in/build1");

        let tracked = storage.list_tracked_characters().unwrap();
        assert_eq!(tracked[0].id, tracked_id);
        assert!(tracked[0].last_fetch.is_some());
    }

    let second = scheduler.run_once().await;
    assert_eq!(second.persisted, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(publisher.calls(), 1);

    let storage = scheduler.storage();
    assert_eq!(
        storage.lock().unwrap().count_snapshots(character_id).unwrap(),
        1
    );
}

#[tokio::test]
async fn test_changed_export_is_appended_and_published() {
    let server = MockServer::start().await;
    mount_character(&server, "exile_42", "HexDoll").await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let (character_id, _) = track(&mut storage, "exile_42", "HexDoll");

    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = scheduler(&server, storage, &renderer, &publisher);

    scheduler.run_once().await;
    renderer.set_export("E2");
    let report = scheduler.run_once().await;

    assert_eq!(report.persisted, 1);
    assert_eq!(publisher.calls(), 2);

    let storage = scheduler.storage();
    let storage = storage.lock().unwrap();
    let history: Vec<String> = storage
        .list_snapshots(character_id)
        .unwrap()
        .into_iter()
        .map(|s| s.export_string)
        .collect();
    assert_eq!(history, vec!["E1", "E2"]);
}

#[tokio::test]
async fn test_skipped_rows_are_never_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let (_, tracked_id) = track(&mut storage, "exile_42", "HexDoll");
    storage.mark_should_skip(tracked_id, true).unwrap();

    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = scheduler(&server, storage, &renderer, &publisher);

    let report = scheduler.run_once().await;

    assert_eq!(report.processed, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(renderer.calls(), 0);
}

#[tokio::test]
async fn test_dead_character_is_skipped_from_then_on() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let (character_id, _) = track(&mut storage, "exile_42", "HexDoll");
    storage.update_died_status(character_id, true).unwrap();

    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = scheduler(&server, storage, &renderer, &publisher);

    let first = scheduler.run_once().await;
    assert_eq!(first.processed, 1);
    assert_eq!(first.skipped, 1);

    let tracked = scheduler
        .storage()
        .lock()
        .unwrap()
        .list_tracked_characters()
        .unwrap();
    assert!(tracked[0].should_skip);

    let second = scheduler.run_once().await;
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 1);
}

#[tokio::test]
async fn test_failure_does_not_stop_the_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ITEMS_PATH))
        .and(query_param("character", "Broken"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": 1, "message": "Resource not found"}
        })))
        .mount(&server)
        .await;
    mount_character(&server, "exile_42", "HexDoll").await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    track(&mut storage, "exile_42", "Broken");
    let (healthy_id, _) = track(&mut storage, "exile_42", "HexDoll");

    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = scheduler(&server, storage, &renderer, &publisher);

    let report = scheduler.run_once().await;

    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(
        scheduler
            .storage()
            .lock()
            .unwrap()
            .count_snapshots(healthy_id)
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_rate_limited_character_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ITEMS_PATH))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("X-Rate-Limit-Rules", "account,ip")
                .insert_header("Retry-After", "5"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let (character_id, _) = track(&mut storage, "exile_42", "HexDoll");

    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = scheduler(&server, storage, &renderer, &publisher);

    let report = scheduler.run_once().await;

    assert_eq!(report.failed, 1);
    assert_eq!(renderer.calls(), 0);
    assert_eq!(
        scheduler
            .storage()
            .lock()
            .unwrap()
            .count_snapshots(character_id)
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_malformed_document_never_reaches_renderer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ITEMS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PASSIVES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(passives_body()))
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    track(&mut storage, "exile_42", "HexDoll");

    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = scheduler(&server, storage, &renderer, &publisher);

    let report = scheduler.run_once().await;

    assert_eq!(report.failed, 1);
    assert_eq!(renderer.calls(), 0);
}

#[tokio::test]
async fn test_publish_failure_keeps_snapshot() {
    let server = MockServer::start().await;
    mount_character(&server, "exile_42", "HexDoll").await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let (character_id, _) = track(&mut storage, "exile_42", "HexDoll");

    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher {
        fail: true,
        ..Default::default()
    };
    let scheduler = scheduler(&server, storage, &renderer, &publisher);

    let report = scheduler.run_once().await;
    assert_eq!(report.failed, 1);

    let storage = scheduler.storage();
    let storage = storage.lock().unwrap();
    let snapshot = storage.get_latest_snapshot(character_id).unwrap().unwrap();
    assert_eq!(snapshot.export_string, "E1");
    assert!(storage.list_snapshot_links(snapshot.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_without_publisher_snapshots_are_still_stored() {
    let server = MockServer::start().await;
    mount_character(&server, "exile_42", "HexDoll").await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let (character_id, _) = track(&mut storage, "exile_42", "HexDoll");

    let scheduler: TestScheduler = FetchScheduler::new(
        Arc::new(Mutex::new(storage)),
        client_for(&server),
        FixedRenderer::new("E1"),
        &fetcher_config(),
    );

    let report = scheduler.run_once().await;

    assert_eq!(report.persisted, 1);
    assert_eq!(
        scheduler
            .storage()
            .lock()
            .unwrap()
            .count_snapshots(character_id)
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_started_scheduler_runs_first_cycle_and_stops() {
    let server = MockServer::start().await;
    mount_character(&server, "exile_42", "HexDoll").await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let (character_id, _) = track(&mut storage, "exile_42", "HexDoll");

    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = scheduler(&server, storage, &renderer, &publisher);
    let storage = scheduler.storage();

    let handle = scheduler.start(CancellationToken::new());

    // The first cycle runs without waiting for the interval
    tokio::time::timeout(Duration::from_secs(10), async {
        while publisher.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("first cycle did not publish");

    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert_eq!(
        storage.lock().unwrap().count_snapshots(character_id).unwrap(),
        1
    );
}

#[tokio::test]
async fn test_cancellation_token_stops_scheduler() {
    let server = MockServer::start().await;
    mount_character(&server, "exile_42", "HexDoll").await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    track(&mut storage, "exile_42", "HexDoll");

    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = scheduler(&server, storage, &renderer, &publisher);

    let cancel = CancellationToken::new();
    let handle = scheduler.start(cancel.clone());

    tokio::time::timeout(Duration::from_secs(10), async {
        while renderer.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("first cycle did not render");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn test_stop_during_pacing_ends_cycle() {
    let server = MockServer::start().await;
    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = slow_paced_scheduler(&server, &renderer, &publisher).await;
    let storage = scheduler.storage();

    let handle = scheduler.start(CancellationToken::new());
    wait_for_first_render(&renderer).await;

    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("scheduler kept pacing after stop")
        .unwrap();

    assert_eq!(renderer.calls(), 1);
    // The character in flight was finished before stopping
    let storage = storage.lock().unwrap();
    let tracked = storage.list_tracked_characters().unwrap();
    assert!(tracked[0].last_fetch.is_some());
    assert!(tracked[1].last_fetch.is_none());
}

#[tokio::test]
async fn test_cancel_during_pacing_ends_cycle() {
    let server = MockServer::start().await;
    let renderer = FixedRenderer::new("E1");
    let publisher = CountingPublisher::default();
    let scheduler = slow_paced_scheduler(&server, &renderer, &publisher).await;

    let cancel = CancellationToken::new();
    let handle = scheduler.start(cancel.clone());
    wait_for_first_render(&renderer).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("scheduler kept pacing after cancellation")
        .unwrap();

    assert_eq!(renderer.calls(), 1);
}
