//! End-to-end tests for the ingestion loop
//!
//! Drives real fetch cycles against a fake upstream over HTTP and checks
//! the results through the query API.

mod common;

use chrono::{TimeZone, Utc};
use common::{
    upstream_item, FakeUpstream, TestClient, TestServer, EXHAUSTED_API_KEY, GOOD_API_KEY,
    SEEDED_VIDEOS_COUNT, TEST_SEARCH_QUERY, VIDEO_1_ID,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use ytfetcher_server::fetcher::{Credential, CredentialRotator, CredentialSet, YouTubeSearchClient};
use ytfetcher_server::ingestion::{
    CycleOutcome, IngestionLoop, IngestionSettings, LoopState, Watermark,
};

const FETCH_INTERVAL: Duration = Duration::from_secs(10);
const COOLDOWN: Duration = Duration::from_secs(60);

fn make_loop(server: &TestServer, upstream: &FakeUpstream, keys: &[&str]) -> IngestionLoop {
    let client = YouTubeSearchClient::new(&upstream.base_url, Duration::from_secs(5))
        .expect("Failed to build search client");
    let credentials = CredentialSet::new(keys.iter().map(|k| Credential::new(*k)).collect());
    IngestionLoop::new(
        CredentialRotator::new(credentials, Arc::new(client)),
        server.video_store.clone(),
        Watermark::new(Utc.with_ymd_and_hms(2024, 6, 4, 0, 0, 0).unwrap()),
        IngestionSettings {
            search_query: TEST_SEARCH_QUERY.to_string(),
            max_results: 50,
            fetch_interval: FETCH_INTERVAL,
            cooldown_interval: COOLDOWN,
        },
    )
}

// =============================================================================
// Fetch Cycles
// =============================================================================

#[tokio::test]
async fn test_cycle_rotates_past_exhausted_key_and_persists() {
    let server = TestServer::spawn().await;
    let upstream = FakeUpstream::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let mut ingestion = make_loop(&server, &upstream, &[EXHAUSTED_API_KEY, GOOD_API_KEY]);

    upstream.set_items(vec![
        upstream_item("new-1", "Cricket live", "2024-06-05T10:00:00Z"),
        upstream_item(VIDEO_1_ID, "Already stored", "2024-06-01T10:00:00Z"),
        upstream_item("new-2", "Cricket recap", "2024-06-05T12:00:00Z"),
        upstream_item("new-1", "Cricket live", "2024-06-05T10:00:00Z"),
    ]);

    let report = ingestion.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, CycleOutcome::Ingested);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.credential_failures.len(), 1);
    assert_eq!(report.credential_failures[0].failure.category(), "quota_exceeded");
    assert_eq!(
        report.watermark_after,
        Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap()
    );
    assert_eq!(ingestion.state(), LoopState::Cycling(FETCH_INTERVAL));

    // Both keys were tried, in order, with the same request
    let requests = upstream.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["key"], EXHAUSTED_API_KEY);
    assert_eq!(requests[1]["key"], GOOD_API_KEY);
    let request = &requests[1];
    assert_eq!(request["q"], TEST_SEARCH_QUERY);
    assert_eq!(request["part"], "snippet");
    assert_eq!(request["type"], "video");
    assert_eq!(request["order"], "date");
    assert_eq!(request["maxResults"], "50");
    assert_eq!(request["publishedAfter"], "2024-06-04T00:00:00Z");

    let body: Value = client.count_videos(&[]).await.json().await.unwrap();
    assert_eq!(body["total_count"], SEEDED_VIDEOS_COUNT + 2);

    let body: Value = client
        .search_videos(&[("q", "cricket live")])
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["total_count"], 1);
    let video = &body["videos"][0];
    assert_eq!(video["video_id"], "new-1");
    assert_eq!(video["thumbnail_url"], "https://i.ytimg.com/vi/new-1/hqdefault.jpg");
    assert_eq!(video["video_url"], "https://www.youtube.com/watch?v=new-1");
}

#[tokio::test]
async fn test_next_cycle_uses_advanced_watermark() {
    let server = TestServer::spawn().await;
    let upstream = FakeUpstream::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let mut ingestion = make_loop(&server, &upstream, &[GOOD_API_KEY]);
    let token = CancellationToken::new();

    upstream.set_items(vec![upstream_item(
        "new-1",
        "Cricket live",
        "2024-06-05T10:00:00Z",
    )]);
    let first = ingestion.run_cycle(&token).await;
    assert_eq!(first.inserted, 1);

    // Upstream keeps returning the boundary item; it must not be stored twice
    let second = ingestion.run_cycle(&token).await;
    assert_eq!(second.outcome, CycleOutcome::Ingested);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.watermark_before, second.watermark_after);

    let requests = upstream.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1]["publishedAfter"], "2024-06-05T10:00:00Z");

    let body: Value = client.count_videos(&[]).await.json().await.unwrap();
    assert_eq!(body["total_count"], SEEDED_VIDEOS_COUNT + 1);
}

#[tokio::test]
async fn test_all_keys_exhausted_backs_off() {
    let server = TestServer::spawn().await;
    let upstream = FakeUpstream::spawn().await;
    let mut ingestion = make_loop(&server, &upstream, &[EXHAUSTED_API_KEY, "unknown-key-42"]);
    let watermark = ingestion.watermark();

    let report = ingestion.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, CycleOutcome::AllFailed);
    assert_eq!(report.credential_failures.len(), 2);
    assert_eq!(report.credential_failures[0].failure.category(), "quota_exceeded");
    assert_eq!(report.credential_failures[1].failure.category(), "bad_request");
    assert_eq!(ingestion.state(), LoopState::BackingOff(COOLDOWN));
    assert_eq!(ingestion.watermark(), watermark);

    // Neither key shows up in the report
    let rendered = format!("{:?}", report);
    assert!(!rendered.contains(EXHAUSTED_API_KEY));
    assert!(!rendered.contains("unknown-key-42"));
}

#[tokio::test]
async fn test_empty_response_keeps_watermark() {
    let server = TestServer::spawn().await;
    let upstream = FakeUpstream::spawn().await;
    let mut ingestion = make_loop(&server, &upstream, &[GOOD_API_KEY]);
    let watermark = ingestion.watermark();

    let report = ingestion.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, CycleOutcome::Empty);
    assert_eq!(ingestion.watermark(), watermark);
    assert_eq!(ingestion.state(), LoopState::Cycling(FETCH_INTERVAL));
}

// =============================================================================
// Loop Lifecycle
// =============================================================================

#[tokio::test]
async fn test_run_stops_promptly_on_shutdown() {
    let server = TestServer::spawn().await;
    let upstream = FakeUpstream::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let mut ingestion = make_loop(&server, &upstream, &[GOOD_API_KEY]);

    upstream.set_items(vec![upstream_item(
        "new-1",
        "Cricket live",
        "2024-06-05T10:00:00Z",
    )]);

    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let token = token.clone();
        async move {
            ingestion.run(token).await;
            ingestion
        }
    });

    // Wait for the first cycle to land, then stop during the inter-cycle wait
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let body: Value = client.count_videos(&[]).await.json().await.unwrap();
        if body["total_count"] == SEEDED_VIDEOS_COUNT + 1 {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "first cycle never completed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    token.cancel();

    let ingestion = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop did not stop within the fetch interval")
        .unwrap();
    assert_eq!(ingestion.state(), LoopState::ShuttingDown);
    assert_eq!(upstream.requests().len(), 1);
}
