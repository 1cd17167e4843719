//! Integration tests for the paged crawl
//!
//! These tests run the fetcher and sink against a mock API:
//! - cursor following and termination
//! - record budget as a soft ceiling
//! - failed requests keeping earlier rows
//! - bundled records and empty pages

#![allow(clippy::unwrap_used, clippy::expect_used)]

use futures::StreamExt;
use nftset_ingest::opensea::{crawl, ApiClient, CrawlPlan, Direction, FetchRequest};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const API_KEY: &str = "test-key";

fn client_for(server: &MockServer) -> ApiClient {
    let base = Url::parse(&format!("{}/api/v1/", server.uri())).unwrap();
    ApiClient::new(base, API_KEY, Duration::from_secs(5)).unwrap()
}

fn event(id: u64) -> Value {
    json!({
        "asset": {"id": id, "image_url": format!("https://img.example/{}.png", id), "num_sales": 1},
        "asset_bundle": null,
        "auction_type": "dutch",
        "total_price": (id * 100).to_string(),
        "payment_token": {"symbol": "ETH", "decimals": 18},
        "quantity": "1"
    })
}

fn bundle_event() -> Value {
    json!({
        "asset": null,
        "asset_bundle": {"slug": "bundle"},
        "auction_type": "english",
        "total_price": "5",
        "payment_token": null,
        "quantity": "3"
    })
}

fn page(records: Vec<Value>, next: Option<&str>) -> Value {
    json!({"asset_events": records, "next": next, "previous": null})
}

/// First page matches any request; cursor pages win by priority
async fn mount_page(server: &MockServer, cursor: Option<&str>, body: Value, expected: u64) {
    let mock = Mock::given(method("GET"))
        .and(path("/api/v1/events"))
        .and(header("X-API-KEY", API_KEY))
        .and(query_param("event_type", "successful"));

    let (mock, priority) = match cursor {
        Some(c) => (mock.and(query_param("cursor", c)), 1),
        None => (mock, 5),
    };

    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .with_priority(priority)
        .expect(expected)
        .mount(server)
        .await;
}

fn read_rows(path: &std::path::Path) -> (Vec<String>, Vec<csv::StringRecord>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader.records().map(|r| r.unwrap()).collect();
    (header, rows)
}

#[tokio::test]
async fn test_follows_cursor_until_exhausted() {
    let server = MockServer::start().await;
    mount_page(&server, None, page(vec![event(1), event(2)], Some("c2")), 1).await;
    mount_page(&server, Some("c2"), page(vec![event(3)], Some("c3")), 1).await;
    mount_page(&server, Some("c3"), page(vec![event(4)], None), 1).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("events.csv");
    let summary = crawl(&client_for(&server), &CrawlPlan::events(100), &output)
        .await
        .unwrap();

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.rows_written, 4);

    let (header, rows) = read_rows(&output);
    assert_eq!(
        header,
        vec!["asset", "asset_bundle", "auction_type", "total_price", "payment_token", "quantity"]
    );
    assert_eq!(rows.len(), 4);
    assert_eq!(&rows[3][3], "400");
}

#[tokio::test]
async fn test_budget_is_a_soft_ceiling() {
    let server = MockServer::start().await;
    mount_page(&server, None, page(vec![event(1), event(2)], Some("c2")), 1).await;
    mount_page(&server, Some("c2"), page(vec![event(3), event(4)], Some("c3")), 1).await;
    mount_page(&server, Some("c3"), page(vec![event(5), event(6)], Some("c4")), 0).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("events.csv");
    let summary = crawl(&client_for(&server), &CrawlPlan::events(3), &output)
        .await
        .unwrap();

    // The second page is consumed whole, overshooting the budget of 3
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.rows_written, 4);
}

#[tokio::test]
async fn test_failed_request_keeps_earlier_rows() {
    let server = MockServer::start().await;
    mount_page(&server, None, page(vec![event(1), event(2)], Some("c2")), 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/events"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("events.csv");
    let summary = crawl(&client_for(&server), &CrawlPlan::events(100), &output)
        .await
        .unwrap();

    assert_eq!(summary.pages, 1);
    assert_eq!(summary.rows_written, 2);
    let (_, rows) = read_rows(&output);
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_bundles_are_dropped_and_budget_counts_them() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        None,
        page(vec![bundle_event(), event(1), bundle_event()], Some("c2")),
        1,
    )
    .await;
    mount_page(&server, Some("c2"), page(vec![event(2)], Some("c3")), 0).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("events.csv");
    let summary = crawl(&client_for(&server), &CrawlPlan::events(3), &output)
        .await
        .unwrap();

    assert_eq!(summary.records_seen, 3);
    assert_eq!(summary.rows_written, 1);
    assert!(summary.rows_written < summary.records_seen);

    let (header, rows) = read_rows(&output);
    assert_eq!(header[0], "asset");
    assert_eq!(rows.len(), 1);

    let asset: Value = serde_json::from_str(&rows[0][0]).unwrap();
    assert_eq!(asset, event(1)["asset"]);
    let token: Value = serde_json::from_str(&rows[0][4]).unwrap();
    assert_eq!(token, event(1)["payment_token"]);
}

#[tokio::test]
async fn test_record_with_extra_field_does_not_end_crawl() {
    let server = MockServer::start().await;

    let mut odd = event(2);
    odd["extra"] = json!("surprise");
    mount_page(&server, None, page(vec![event(1), odd, event(3)], Some("c2")), 1).await;
    mount_page(&server, Some("c2"), page(vec![event(4)], None), 1).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("events.csv");
    let summary = crawl(&client_for(&server), &CrawlPlan::events(100), &output)
        .await
        .unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.records_seen, 4);
    assert_eq!(summary.rows_written, 3);
    assert_eq!(summary.skipped, 1);

    let (header, rows) = read_rows(&output);
    assert!(!header.contains(&"extra".to_string()));
    let prices: Vec<&str> = rows.iter().map(|r| &r[3]).collect();
    assert_eq!(prices, vec!["100", "300", "400"]);
}

#[tokio::test]
async fn test_empty_page_writes_no_header() {
    let server = MockServer::start().await;
    mount_page(&server, None, page(vec![], None), 1).await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("events.csv");
    let summary = crawl(&client_for(&server), &CrawlPlan::events(10), &output)
        .await
        .unwrap();

    assert_eq!(summary.pages, 1);
    assert_eq!(summary.rows_written, 0);
    assert!(std::fs::read(&output).unwrap().is_empty());
}

#[tokio::test]
async fn test_previous_direction_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/assets"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assets": [{"id": 1}, {"id": 2}],
            "next": "ignored",
            "previous": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let plan = CrawlPlan::assets(100);
    assert_eq!(plan.request.direction, Direction::Previous);

    let pages: Vec<_> = client.pages(&plan.request).unwrap().collect().await;
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].records.len(), 2);
    assert_eq!(pages[0].cursor, None);
}

#[tokio::test]
async fn test_unreachable_server_yields_nothing() {
    let base = Url::parse("http://127.0.0.1:9/api/v1/").unwrap();
    let client = ApiClient::new(base, API_KEY, Duration::from_secs(2)).unwrap();
    let request = FetchRequest {
        endpoint: "events".to_string(),
        query: vec![],
        list_field: "asset_events".to_string(),
        budget: 10,
        direction: Direction::Next,
    };

    let pages: Vec<_> = client.pages(&request).unwrap().collect().await;
    assert!(pages.is_empty());
}
