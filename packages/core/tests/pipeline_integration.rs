//! End-to-end tests for the fetch → resolve → normalize pipeline.
//!
//! Upstream APIs are stubbed with wiremock and reached through the real
//! reqwest transport, so status mapping, retry and caching are exercised the
//! same way the binary uses them. The mock server's host is `127.0.0.1`, so
//! these tests pass the provider hint explicitly instead of deriving it from
//! the URL.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio_test::{assert_err, assert_ok};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use widget_feed::{
    adapters::{AdapterRegistry, ViewType},
    cache::ResponseCache,
    error::AppError,
    paths::{extract_paths, get_value},
    pipeline::fetch_and_normalize,
    scheduler::PollingScheduler,
    services::{
        api_client::{ApiClient, RetryPolicy},
        http::ReqwestTransport,
    },
    store::{DataStatus, WidgetDataStore},
};

// ---- Helpers ----------------------------------------------------------------

fn coinbase_rates() -> Value {
    json!({
        "data": {
            "currency": "USD",
            "rates": { "EUR": "0.92", "GBP": "0.79", "JPY": "151.3", "CHF": "0.88" }
        }
    })
}

fn daily_series() -> Value {
    json!({
        "Meta Data": { "1. Information": "Daily Prices", "2. Symbol": "IBM" },
        "Time Series (Daily)": {
            "2024-03-01": { "1. open": "185.0", "4. close": "186.5" },
            "2024-03-04": { "1. open": "187.0", "4. close": "188.2" }
        }
    })
}

/// Client over the real reqwest transport with fast retries.
fn client() -> ApiClient {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    ApiClient::new(Arc::new(transport), Arc::new(ResponseCache::default())).with_retry_policy(
        RetryPolicy {
            retries: 2,
            base_delay: Duration::from_millis(20),
        },
    )
}

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ---- Tests ------------------------------------------------------------------

#[tokio::test]
async fn coinbase_rates_table_end_to_end() {
    let server = MockServer::start().await;
    mount_json(&server, "/v2/exchange-rates", coinbase_rates()).await;
    let url = format!("{}/v2/exchange-rates", server.uri());

    let result = assert_ok!(
        fetch_and_normalize(
            &client(),
            &AdapterRegistry::with_defaults(),
            "coinbase",
            &url,
            ViewType::Table,
        )
        .await
    );

    assert_eq!(result.source(), Some("coinbase-rates"));
    assert_eq!(result.field("currencyMap.JPY"), Some(&json!(["USD", "JPY", 151.3])));
    assert!(result.meta.as_ref().and_then(|m| m.last_updated).is_some());
}

#[tokio::test]
async fn alphavantage_series_end_to_end() {
    let server = MockServer::start().await;
    mount_json(&server, "/query", daily_series()).await;
    let url = format!("{}/query", server.uri());

    let result = assert_ok!(
        fetch_and_normalize(
            &client(),
            &AdapterRegistry::with_defaults(),
            "alphavantage",
            &url,
            ViewType::Chart,
        )
        .await
    );

    assert_eq!(result.field("timeSeries.rows[0].date"), Some(&json!("2024-03-04")));
    assert_eq!(
        result.field("timeSeries.columns"),
        Some(&json!(["date", "open", "close"]))
    );
}

#[tokio::test]
async fn transient_failures_are_retried_then_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/exchange-rates"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/exchange-rates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(coinbase_rates()))
        .expect(1)
        .mount(&server)
        .await;
    let url = format!("{}/v2/exchange-rates", server.uri());
    let client = client();

    assert_ok!(client.fetch_api(&url).await);
    // Second call is answered by the cache.
    assert_ok!(client.fetch_api(&url).await);

    assert!(client.cache().has(&url));
}

#[tokio::test]
async fn exhausted_retries_surface_the_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/exchange-rates"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    let url = format!("{}/v2/exchange-rates", server.uri());

    let err = assert_err!(
        fetch_and_normalize(
            &client(),
            &AdapterRegistry::with_defaults(),
            "coinbase",
            &url,
            ViewType::Card,
        )
        .await
    );

    assert_eq!(
        err,
        AppError::Http {
            status: 500,
            status_text: "Internal Server Error".to_string(),
        }
    );
    assert_eq!(err.to_string(), "API failed: 500 Internal Server Error");
}

#[tokio::test]
async fn concurrent_fetches_share_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/exchange-rates"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(coinbase_rates())
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let url = format!("{}/v2/exchange-rates", server.uri());
    let client = client();

    let results = futures::future::join_all((0..5).map(|_| client.fetch_api(&url))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert!(client.cache().has(&url));
}

#[tokio::test]
async fn fresh_fetch_always_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/exchange-rates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(coinbase_rates()))
        .expect(3)
        .mount(&server)
        .await;
    let url = format!("{}/v2/exchange-rates", server.uri());
    let client = client();

    assert_ok!(client.fetch_api(&url).await);
    assert_ok!(client.fetch_api_fresh(&url).await);
    assert_ok!(client.fetch_api_fresh(&url).await);

    assert!(!client.cache().has(&url));
}

#[tokio::test]
async fn every_extracted_path_resolves_on_a_live_response() {
    let server = MockServer::start().await;
    mount_json(&server, "/v2/exchange-rates", coinbase_rates()).await;
    let url = format!("{}/v2/exchange-rates", server.uri());

    let raw = assert_ok!(client().fetch_api(&url).await);
    let paths = extract_paths(&raw);

    assert_eq!(
        paths,
        vec![
            "data.currency",
            "data.rates.EUR",
            "data.rates.GBP",
            "data.rates.JPY",
            "data.rates.CHF",
        ]
    );
    for p in &paths {
        assert!(get_value(&raw, p).is_some(), "unresolved path {}", p);
    }
}

#[tokio::test]
async fn scheduler_publishes_error_for_unknown_host_into_store() {
    let server = MockServer::start().await;
    mount_json(&server, "/v2/exchange-rates", coinbase_rates()).await;
    let url = format!("{}/v2/exchange-rates", server.uri());

    let store = Arc::new(RwLock::new(WidgetDataStore::new()));
    let scheduler = PollingScheduler::new(
        client(),
        Arc::new(AdapterRegistry::with_defaults()),
        store.clone(),
    );

    let handle = scheduler.start_polling("rates", &url, 60, ViewType::Card);
    assert!(handle.is_some());

    let mut state = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let guard = store.read().await;
        if let Some(s) = guard.get("rates").filter(|s| s.status == DataStatus::Error) {
            state = Some(s.clone());
            break;
        }
    }
    scheduler.shutdown().await;

    // 127.0.0.1 matches no provider.
    let state = state.expect("widget should reach the error state");
    assert_eq!(
        state.error.as_deref(),
        Some("Unsupported API provider: \"\"")
    );
}
