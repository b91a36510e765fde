//! Integration Tests for the proxy endpoint
//!
//! Drives the full router against a wiremock upstream: cache hit/miss,
//! TTL expiry, 429 handling, retry exhaustion and request coalescing.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use reel_proxy::{
    api::create_router,
    cache::CacheStore,
    scheduler::Scheduler,
    upstream::{RetryPolicy, UpstreamClient},
    AppState, ProxyService,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// == Helper Functions ==

struct TestApp {
    ttl: Duration,
    retry: RetryPolicy,
    dedupe: bool,
}

impl Default for TestApp {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            retry: RetryPolicy::new(3, Duration::from_millis(10)),
            dedupe: false,
        }
    }
}

impl TestApp {
    fn build(self, upstream_uri: &str) -> Router {
        let upstream = UpstreamClient::new(
            Url::parse(upstream_uri).unwrap(),
            "secret",
            "apiKey",
            self.retry,
            Duration::from_secs(5),
        )
        .unwrap();
        let proxy = ProxyService::new(
            CacheStore::new(100, self.ttl),
            Scheduler::new(100.0),
            upstream,
            self.dedupe,
        );
        create_router(AppState::new(proxy))
    }
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_to_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn x_cache(response: &Response) -> &str {
    response.headers().get("x-cache").unwrap().to_str().unwrap()
}

// == Cache Behaviour ==

#[tokio::test]
async fn test_miss_then_hit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .and(query_param("language", "en-US"))
        .and(query_param("apiKey", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 550})))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::default().build(&server.uri());

    let first = get(&app, "/proxy/movie/550?language=en-US").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(x_cache(&first), "MISS");
    assert_eq!(
        first.headers().get("cache-control").unwrap(),
        "public, s-maxage=300, stale-while-revalidate=600"
    );
    assert_eq!(first.headers().get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(body_to_json(first).await, json!({"id": 550}));

    let second = get(&app, "/proxy/movie/550?language=en-US").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(x_cache(&second), "HIT");
    assert_eq!(body_to_json(second).await, json!({"id": 550}));
}

#[tokio::test]
async fn test_query_order_shares_cache_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/discover/movie"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"page": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::default().build(&server.uri());

    let first = get(&app, "/proxy/discover/movie?page=2&sort_by=popularity.desc").await;
    assert_eq!(x_cache(&first), "MISS");

    let second = get(&app, "/proxy/discover/movie?sort_by=popularity.desc&page=2").await;
    assert_eq!(x_cache(&second), "HIT");
}

#[tokio::test]
async fn test_client_api_key_is_replaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .and(query_param("apiKey", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 550})))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::default().build(&server.uri());

    let response = get(&app, "/proxy/movie/550?apiKey=stolen").await;
    assert_eq!(response.status(), StatusCode::OK);

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert_eq!(query, "apiKey=secret");
}

#[tokio::test]
async fn test_expired_entry_triggers_fresh_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 550})))
        .expect(2)
        .mount(&server)
        .await;

    let app = TestApp {
        ttl: Duration::from_millis(300),
        ..TestApp::default()
    }
    .build(&server.uri());

    assert_eq!(x_cache(&get(&app, "/proxy/movie/550").await), "MISS");
    assert_eq!(x_cache(&get(&app, "/proxy/movie/550").await), "HIT");

    tokio::time::sleep(Duration::from_millis(400)).await;

    let after = get(&app, "/proxy/movie/550").await;
    assert_eq!(x_cache(&after), "MISS");
    assert_eq!(body_to_json(after).await, json!({"id": 550}));
}

// == Upstream Failures ==

#[tokio::test]
async fn test_throttle_honours_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 550})))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::default().build(&server.uri());

    let start = Instant::now();
    let response = get(&app, "/proxy/movie/550").await;

    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response).await, json!({"id": 550}));
}

#[tokio::test]
async fn test_persistent_500_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(3)
        .mount(&server)
        .await;

    let app = TestApp::default().build(&server.uri());

    let response = get(&app, "/proxy/movie/550").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
    assert_eq!(response.headers().get("access-control-allow-origin").unwrap(), "*");

    let json = body_to_json(response).await;
    assert!(!json["error"].as_str().unwrap().is_empty());
    let details = json["details"].as_str().unwrap();
    assert!(details.contains("3 attempts"), "details: {}", details);
    assert!(details.contains("upstream exploded"), "details: {}", details);
}

#[tokio::test]
async fn test_failure_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 550})))
        .mount(&server)
        .await;

    let app = TestApp {
        retry: RetryPolicy::new(1, Duration::ZERO),
        ..TestApp::default()
    }
    .build(&server.uri());

    let failed = get(&app, "/proxy/movie/550").await;
    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let recovered = get(&app, "/proxy/movie/550").await;
    assert_eq!(recovered.status(), StatusCode::OK);
    assert_eq!(x_cache(&recovered), "MISS");
}

#[tokio::test]
async fn test_unreachable_upstream_reports_network_failure() {
    // Port 9 (discard) is closed on test hosts
    let app = TestApp {
        retry: RetryPolicy::new(2, Duration::from_millis(10)),
        ..TestApp::default()
    }
    .build("http://127.0.0.1:9");

    let response = get(&app, "/proxy/movie/550").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_to_json(response).await;
    let details = json["details"].as_str().unwrap();
    assert!(details.contains("Network failure"), "details: {}", details);
    assert!(!details.contains("secret"), "API key leaked: {}", details);
}

// == Concurrency ==

async fn burst(app: &Router, n: usize) -> Vec<Response> {
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                app.oneshot(
                    Request::builder()
                        .uri("/proxy/movie/550")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap()
            })
        })
        .collect();

    let mut responses = Vec::with_capacity(n);
    for handle in handles {
        responses.push(handle.await.unwrap());
    }
    responses
}

#[tokio::test]
async fn test_concurrent_misses_each_call_upstream_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 550}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(4)
        .mount(&server)
        .await;

    let app = TestApp::default().build(&server.uri());

    for response in burst(&app, 4).await {
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_concurrent_misses_coalesce_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 550}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp {
        dedupe: true,
        ..TestApp::default()
    }
    .build(&server.uri());

    for response in burst(&app, 5).await {
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_to_json(response).await, json!({"id": 550}));
    }
}

// == Stats ==

#[tokio::test]
async fn test_stats_reflect_traffic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 550})))
        .mount(&server)
        .await;

    let app = TestApp::default().build(&server.uri());

    get(&app, "/proxy/movie/550").await;
    get(&app, "/proxy/movie/550").await;

    let stats = body_to_json(get(&app, "/stats").await).await;
    assert_eq!(stats["cache"]["hits"], 1);
    assert_eq!(stats["cache"]["misses"], 1);
    assert_eq!(stats["cache"]["total_entries"], 1);
    assert_eq!(stats["scheduler"]["dispatched"], 1);
}
