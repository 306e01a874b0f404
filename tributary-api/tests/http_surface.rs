//! The full server stack against mocked providers.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tributary_api::{ApiConfig, ApiServer};
use tributary_fetch::{RetryPolicy, UpstreamConfig};

fn server_for(mock: &MockServer) -> ApiServer {
    let config = ApiConfig {
        upstream: UpstreamConfig::with_base_url(&mock.uri()).with_retry(RetryPolicy {
            max_retries: 2,
            backoff_factor: 0.01,
        }),
        ..Default::default()
    };
    ApiServer::new(config).unwrap()
}

async fn get(server: &ApiServer, uri: &str) -> (StatusCode, Value) {
    let response = server
        .router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_weather_round_trip() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Berlin"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "main": { "temp": 9.8, "humidity": 66 },
            "weather": [{ "description": "broken clouds" }]
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let server = server_for(&mock);

    let (status, body) = get(&server, "/api/weather?location=Berlin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["temperature"], 9.8);
    assert_eq!(body["humidity"], 66);

    // second request is a cache hit; the mock verifies a single upstream call
    let (status, _) = get(&server, "/api/weather?location=Berlin").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_persistent_upstream_throttling_is_service_unavailable() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(3)
        .mount(&mock)
        .await;

    let server = server_for(&mock);

    let (status, body) = get(&server, "/api/stocks?symbol=MSFT").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn test_malformed_body_is_bad_gateway() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock)
        .await;

    let server = server_for(&mock);

    let (status, body) = get(&server, "/api/news?query=rust").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "BAD_GATEWAY");
}

#[tokio::test]
async fn test_aggregate_takes_status_of_failed_part() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "cod": "404",
            "message": "city not found"
        })))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalResults": 0,
            "articles": []
        })))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Global Quote": { "05. price": "1.0", "06. volume": "1", "09. change": "0.0" }
        })))
        .mount(&mock)
        .await;

    let server = server_for(&mock);

    let (status, body) = get(
        &server,
        "/api/aggregate?location=Nowhere&news_query=rust&stock_symbol=AAPL",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "AGGREGATE_FAILED");

    let (_, stats) = get(&server, "/api/stats").await;
    // news and stocks succeeded and stay cached; the aggregate does not
    assert_eq!(stats["cache"]["total_entries"], 2);
}
