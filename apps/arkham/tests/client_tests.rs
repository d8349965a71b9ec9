//! Integration tests for the upstream clients.
//!
//! Uses wiremock to stand in for trade.gov, ACLED and the generative-AI
//! endpoint.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use arkham::api::{AppState, create_router};
use arkham::clients::{AcledClient, AcledToken, GenAiClient, TradeGovClient};
use arkham::monitor::DashboardState;
use arkham::{AppError, Config};
use arkham_core::RiskCategory;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn token(access: &str, refresh: &str, expires_in: i64) -> AcledToken {
    let now = Utc::now();
    AcledToken {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        token_type: "Bearer".to_string(),
        expires_in,
        expires_at: now + Duration::seconds(expires_in),
        created_at: now - Duration::hours(25),
    }
}

fn token_response(access: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access,
        "refresh_token": format!("{access}-refresh"),
        "token_type": "Bearer",
        "expires_in": 86_400,
    }))
}

fn events_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": 200,
        "data": [{
            "event_id_cnty": "TWN123",
            "event_date": "2025-03-01",
            "event_type": "Protests",
            "sub_event_type": "Peaceful protest",
            "country": "Taiwan",
            "location": "Kaohsiung",
            "fatalities": "0",
            "notes": "Dock workers protest",
        }],
    }))
}

fn acled(server: &MockServer) -> AcledClient {
    AcledClient::new(&server.uri(), Some("analyst@example.com".to_string()), Some("pa%24%24".to_string())).unwrap()
}

// =============================================================================
// TRADE.GOV TESTS
// =============================================================================

#[tokio::test]
async fn test_trade_gov_search_maps_leads() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/trade_leads/v1/search"))
        .and(query_param("subscription-key", "tg-key"))
        .and(query_param("country_codes", "TW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "id": "1", "title": "Port expansion tender", "country_code": "TW", "description": "Kaohsiung" },
                { "id": "2", "title": "Logistics contract", "country_code": "TW" },
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = TradeGovClient::new(&mock_server.uri(), "tg-key").unwrap();
    let points = client.search(Some("taiwan"), 10, Utc::now()).await.unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].title, "Port expansion tender");
    assert_eq!(points[0].source, "trade_gov_api");
    assert_eq!(points[0].category, RiskCategory::TradeNews);
    assert_eq!(points[1].location, "TW");
}

#[tokio::test]
async fn test_trade_gov_error_status_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/trade_leads/v1/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let client = TradeGovClient::new(&mock_server.uri(), "tg-key").unwrap();
    assert!(client.search(None, 10, Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_trade_gov_missing_search_probes_count() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/trade_leads/v1/search"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/trade_leads/v1/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 12 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = TradeGovClient::new(&mock_server.uri(), "tg-key").unwrap();
    assert!(client.search(None, 10, Utc::now()).await.unwrap().is_empty());
}

// =============================================================================
// GENERATIVE AI TESTS
// =============================================================================

#[tokio::test]
async fn test_genai_generate_joins_parts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash-exp:generateContent"))
        .and(query_param("key", "g-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Reroute via " }, { "text": "Busan." }] } }]
        })))
        .mount(&mock_server)
        .await;

    let client = GenAiClient::new(&mock_server.uri(), Some("g-key".to_string())).unwrap();
    assert_eq!(client.generate("what now?").await.unwrap(), "Reroute via Busan.");
}

#[tokio::test]
async fn test_genai_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&mock_server)
        .await;

    let client = GenAiClient::new(&mock_server.uri(), Some("g-key".to_string())).unwrap();
    let err = client.generate("what now?").await.unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));
}

// =============================================================================
// ACLED TOKEN TESTS
// =============================================================================

#[tokio::test]
async fn test_acled_reuses_valid_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response("unused"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = acled(&mock_server).with_token(token("cached", "r1", 3_600));
    assert_eq!(client.access_token(false).await.unwrap(), "cached");
    assert_eq!(client.access_token(false).await.unwrap(), "cached");
}

#[tokio::test]
async fn test_acled_refreshes_expired_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(token_response("refreshed"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = acled(&mock_server).with_token(token("stale", "r1", -60));
    assert_eq!(client.access_token(false).await.unwrap(), "refreshed");

    let cached = client.cached_token().await.unwrap();
    assert_eq!(cached.refresh_token, "refreshed-refresh");
    assert!(!cached.is_expired(Utc::now()));
}

#[tokio::test]
async fn test_acled_concurrent_callers_share_one_refresh() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(token_response("shared").set_delay(std::time::Duration::from_millis(50)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(token_response("unused"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = Arc::new(acled(&mock_server).with_token(token("stale", "r1", -60)));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.access_token(false).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().as_deref(), Some("shared"));
    }
}

#[tokio::test]
async fn test_acled_concurrent_cold_start_grants_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(token_response("first").set_delay(std::time::Duration::from_millis(50)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = acled(&mock_server);
    let (a, b, c) = tokio::join!(
        client.access_token(false),
        client.access_token(false),
        client.access_token(false),
    );
    assert_eq!([a, b, c], [Some("first".to_string()), Some("first".to_string()), Some("first".to_string())]);
}

#[tokio::test]
async fn test_acled_failed_refresh_falls_back_to_password_grant() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("client_id=acled"))
        .respond_with(token_response("granted"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = acled(&mock_server).with_token(token("stale", "r1", -60));
    assert_eq!(client.access_token(false).await.unwrap(), "granted");
}

#[tokio::test]
async fn test_acled_password_is_decoded() {
    let mock_server = MockServer::start().await;

    // "pa$$" is sent form-encoded as "pa%24%24"
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("password=pa%24%24"))
        .respond_with(token_response("granted"))
        .expect(1)
        .mount(&mock_server)
        .await;

    assert_eq!(acled(&mock_server).access_token(false).await.unwrap(), "granted");
}

#[tokio::test]
async fn test_acled_login_then_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "current_user": {} })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response("after-login"))
        .mount(&mock_server)
        .await;

    assert_eq!(acled(&mock_server).access_token(false).await.unwrap(), "after-login");
}

#[tokio::test]
async fn test_acled_without_credentials_has_no_token() {
    let client = AcledClient::new("http://127.0.0.1:9", None, None).unwrap();
    assert!(!client.has_credentials());
    assert!(client.access_token(false).await.is_none());
}

#[tokio::test]
async fn test_acled_retries_once_after_401() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/acled/read"))
        .and(header("authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(token_response("fresh"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/acled/read"))
        .and(header("authorization", "Bearer fresh"))
        .and(query_param("_format", "json"))
        .respond_with(events_response())
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = acled(&mock_server).with_token(token("revoked", "r1", 3_600));
    let body: Value = client
        .fetch("acled/read", vec![("limit".to_string(), "1".to_string())])
        .await
        .unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_acled_political_events() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/acled/read"))
        .and(query_param("country", "Taiwan"))
        .and(query_param("event_date_where", "BETWEEN"))
        .respond_with(events_response())
        .mount(&mock_server)
        .await;

    let client = acled(&mock_server).with_token(token("cached", "r1", 3_600));
    let points = client.political_events(Some("taiwan"), Utc::now()).await.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].category, RiskCategory::Political);
}

// =============================================================================
// END-TO-END WITH MOCKED UPSTREAMS
// =============================================================================

#[tokio::test]
async fn test_api_uses_live_trade_news_and_model() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/trade_leads/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": "9", "title": "Live lead", "country_code": "TW" }]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash-exp:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "All clear." }] } }]
        })))
        .mount(&mock_server)
        .await;

    let config = Config {
        trade_gov_api_key: Some("tg-key".to_string()),
        trade_gov_base_url: mock_server.uri(),
        genai_api_key: Some("g-key".to_string()),
        genai_base_url: mock_server.uri(),
        rate_limit: 1_000,
        ..Config::default()
    };
    let state = AppState::with_dashboard(config, DashboardState::seeded(3)).unwrap();
    let server = TestServer::new(create_router(Arc::new(state))).unwrap();

    let news: Value = server.get("/api/data/trade-news").await.json();
    assert_eq!(news["count"], 1);
    assert_eq!(news["data"][0]["title"], "Live lead");

    let reply: Value = server
        .post("/api/agent/query")
        .json(&json!({ "message": "status?" }))
        .await
        .json();
    assert_eq!(reply["response"], "All clear.");

    let info: Value = server.get("/api/agent/info").await.json();
    assert_eq!(info["initialized"], true);
}

#[tokio::test]
async fn test_api_falls_back_when_model_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let config = Config {
        genai_api_key: Some("g-key".to_string()),
        genai_base_url: mock_server.uri(),
        rate_limit: 1_000,
        ..Config::default()
    };
    let state = AppState::with_dashboard(config, DashboardState::seeded(5)).unwrap();
    let server = TestServer::new(create_router(Arc::new(state))).unwrap();

    let disruption: Value = server.post("/api/dashboard/disruption").await.json();
    let recommendation = disruption["recommendation"].as_str().unwrap();
    assert!(recommendation.starts_with("Reroute shipment SHP-1001 via"));

    let reply: Value = server
        .post("/api/agent/query")
        .json(&json!({ "message": "status?" }))
        .await
        .json();
    assert_eq!(reply["success"], true);
    assert!(reply["response"].as_str().unwrap().contains("[Mock Agent]"));
}
