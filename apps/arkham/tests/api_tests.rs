//! Integration tests for the Arkham HTTP API.
//!
//! Drives the full router through axum-test. Upstreams are unconfigured, so
//! every feed answers with fallback data.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use arkham::api::{AppState, create_router};
use arkham::monitor::DashboardState;
use arkham::Config;
use arkham_core::catalog::PRIMARY_ROUTE_ID;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn test_config() -> Config {
    Config {
        rate_limit: 10_000,
        ..Config::default()
    }
}

fn server_with(config: Config) -> TestServer {
    let state = AppState::with_dashboard(config, DashboardState::seeded(42)).unwrap();
    TestServer::new(create_router(Arc::new(state))).unwrap()
}

fn server() -> TestServer {
    server_with(test_config())
}

/// Server backed by a document store in a temp directory.
fn server_with_store() -> (TestServer, TempDir) {
    let temp = tempfile::tempdir().unwrap();
    let config = Config {
        store_path: Some(temp.path().join("store").join("arkham.redb")),
        logs_dir: temp.path().join("logs"),
        ..test_config()
    };
    (server_with(config), temp)
}

fn route_body() -> Value {
    json!({
        "origin": "Port of Taipei, Taiwan",
        "destination": "Port of Los Angeles, USA",
    })
}

fn error_message(body: &Value) -> &str {
    assert_eq!(body["success"], false);
    body["error"].as_str().unwrap()
}

// =============================================================================
// HEALTH TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let server = server();

    let health: Value = server.get("/health").await.json();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "Arkham AI");

    let api: Value = server.get("/api/health").await.json();
    assert_eq!(api["status"], "ok");
    assert_eq!(api["message"], "Arkham AI agent is running");

    let index: Value = server.get("/").await.json();
    assert_eq!(index["note"], "Frontend not found, serving API only");
}

// =============================================================================
// AGENT TESTS
// =============================================================================

#[tokio::test]
async fn test_agent_query_mock_reply() {
    let server = server();

    let response = server
        .post("/api/agent/query")
        .json(&json!({ "message": "Is the Taiwan Strait safe?" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["agent"], "Arkham AI");
    assert!(body["response"].as_str().unwrap().contains("[Mock Agent]"));
}

#[tokio::test]
async fn test_agent_query_requires_message() {
    let server = server();

    let response = server.post("/api/agent/query").json(&json!({ "user_id": "u1" })).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Missing 'message' field in request");

    let response = server.post("/api/agent/query").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "No JSON data provided");
}

#[tokio::test]
async fn test_agent_info_without_model() {
    let body: Value = server().get("/api/agent/info").await.json();
    assert_eq!(body["name"], "Arkham AI");
    assert_eq!(body["initialized"], false);
    assert_eq!(body["location"], "us-central1");
}

// =============================================================================
// RISK DATA TESTS
// =============================================================================

#[tokio::test]
async fn test_trade_news_respects_limit() {
    let server = server();

    let body: Value = server
        .get("/api/data/trade-news")
        .add_query_param("region", "taiwan")
        .add_query_param("limit", "2")
        .await
        .json();
    assert_eq!(body["success"], true);
    assert!(body["count"].as_u64().unwrap() <= 2);
    assert_eq!(body["count"].as_u64().unwrap() as usize, body["data"].as_array().unwrap().len());
}

#[tokio::test]
async fn test_bad_limit_is_rejected() {
    let response = server()
        .get("/api/data/trade-news")
        .add_query_param("limit", "lots")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_all_data_covers_every_feed() {
    let body: Value = server().get("/api/data/all").await.json();
    let categories: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["category"].as_str().unwrap())
        .collect();
    assert!(categories.contains(&"trade_news"));
    assert!(categories.contains(&"political"));
    assert!(categories.contains(&"port_congestion"));
}

#[tokio::test]
async fn test_route_data_echoes_route() {
    let server = server();

    let mut request = route_body();
    request["route_regions"] = json!(["japan"]);
    let body: Value = server.post("/api/data/route").json(&request).await.json();
    assert_eq!(body["route"]["origin"], "Port of Taipei, Taiwan");
    assert_eq!(body["route"]["regions"], json!(["japan"]));

    let response = server
        .post("/api/data/route")
        .json(&json!({ "origin": "Taiwan" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "Missing 'origin' or 'destination' field");
}

// =============================================================================
// ROUTE TESTS
// =============================================================================

#[tokio::test]
async fn test_list_routes() {
    let body: Value = server().get("/api/routes").await.json();
    let routes = body["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0]["route_id"], "ROUTE-001");
    assert_eq!(routes[1]["origin"], "Vietnam");
}

#[tokio::test]
async fn test_assess_route_shape() {
    let body: Value = server().post("/api/routes/assess").json(&route_body()).await.json();
    let assessment = &body["assessment"];

    let score = assessment["overall_risk_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));
    assert!(assessment["risk_level"].is_string());
    assert!(assessment["factors"]["congestion"].is_number());
    assert!(assessment["factors"]["tariffs"].is_number());
    assert!(assessment["factors"]["political_unrest"].is_number());
    assert_eq!(
        assessment["factors"]["congestion"],
        assessment["breakdown"]["port_congestion"]
    );
}

#[tokio::test]
async fn test_route_risk_by_id() {
    let server = server();

    let body: Value = server
        .get("/api/routes/ROUTE-001/risk")
        .add_query_param("origin", "Taiwan")
        .add_query_param("destination", "Los Angeles")
        .await
        .json();
    assert_eq!(body["route_id"], "ROUTE-001");
    assert_eq!(body["assessment"]["route_id"], "ROUTE-001");

    let response = server.get("/api/routes/ROUTE-001/risk").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compare_needs_two_routes() {
    let server = server();

    let response = server
        .post("/api/routes/compare")
        .json(&json!({ "routes": [route_body()] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "At least 2 routes required for comparison");

    let response = server
        .post("/api/routes/compare")
        .json(&json!({ "routes": [route_body(), { "origin": "Vietnam" }] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compare_ranks_by_risk() {
    let body: Value = server()
        .post("/api/routes/compare")
        .json(&json!({
            "routes": [
                route_body(),
                { "origin": "Ho Chi Minh City, Vietnam", "destination": "Port of Los Angeles, USA" },
                { "origin": "Busan, South Korea", "destination": "Seattle, USA" },
            ]
        }))
        .await
        .json();
    let scores: Vec<f64> = body["comparison"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["overall_risk_score"].as_f64().unwrap())
        .collect();
    assert_eq!(scores.len(), 3);
    assert!(scores.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_predict_default_horizons() {
    let body: Value = server().post("/api/routes/predict").json(&route_body()).await.json();
    let predictions = body["prediction"]["predictions"].as_array().unwrap();
    let days: Vec<u64> = predictions
        .iter()
        .map(|p| p["days_ahead"].as_u64().unwrap())
        .collect();
    assert_eq!(days, vec![3, 5, 7]);
}

#[tokio::test]
async fn test_route_prediction_parses_days() {
    let body: Value = server()
        .get("/api/routes/ROUTE-002/predict")
        .add_query_param("origin", "Vietnam")
        .add_query_param("destination", "Los Angeles")
        .add_query_param("days_ahead", "2,4")
        .await
        .json();
    assert_eq!(body["route_id"], "ROUTE-002");
    assert_eq!(body["prediction"]["predictions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_route_prediction_ignores_out_of_range_days() {
    let response = server()
        .get("/api/routes/ROUTE-001/predict")
        .add_query_param("origin", "Taiwan")
        .add_query_param("destination", "Los Angeles")
        .add_query_param("days_ahead", "4000000000")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    for p in body["prediction"]["predictions"].as_array().unwrap() {
        let score = p["predicted_risk_score"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));
    }
    let days: Vec<u64> = body["prediction"]["predictions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["days_ahead"].as_u64().unwrap())
        .collect();
    assert_eq!(days, vec![3, 5, 7]);
}

#[tokio::test]
async fn test_predict_body_drops_out_of_range_days() {
    let mut request = route_body();
    request["days_ahead"] = json!([0, 5, 365]);

    let response = server().post("/api/routes/predict").json(&request).await;
    response.assert_status_ok();
    let body: Value = response.json();
    let predictions = body["prediction"]["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0]["days_ahead"], 5);
}

#[tokio::test]
async fn test_optimize_route() {
    let mut request = route_body();
    request["priority"] = json!("risk");
    request["max_alternatives"] = json!(2);
    request["include_predictions"] = json!(false);

    let response = server().post("/api/routes/optimize").json(&request).await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["message"], "Route optimization complete");
    let routes = body["optimized_routes"].as_array().unwrap();
    assert!(routes.len() <= 2);
    // the original route takes part in the ranking, so ranks may skip
    let ranks: Vec<u64> = routes.iter().map(|r| r["rank"].as_u64().unwrap()).collect();
    assert!(ranks.iter().all(|&rank| rank >= 1));
    assert!(ranks.windows(2).all(|w| w[0] < w[1]));
    for route in routes {
        assert!(route["risk_assessment"]["factors"].is_object());
    }
    assert!(body["recommendation"].is_string());
    assert_eq!(body["optimization"]["recommendation"], body["recommendation"]);
    assert!(body["original_route"]["metrics"]["risk_score"].is_number());
}

// =============================================================================
// EXECUTION TESTS
// =============================================================================

#[tokio::test]
async fn test_monitor_requires_fields() {
    let response = server()
        .post("/api/execution/monitor")
        .json(&json!({ "origin": "Taiwan", "destination": "Los Angeles" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        error_message(&body),
        "Missing required fields: shipment_id, origin, destination"
    );
}

#[tokio::test]
async fn test_monitor_reports_decision() {
    let mut request = route_body();
    request["shipment_id"] = json!("SHP-1001");

    let body: Value = server().post("/api/execution/monitor").json(&request).await.json();
    assert_eq!(body["success"], true);
    if body["action_triggered"] == true {
        assert_eq!(body["action"]["shipment_id"], "SHP-1001");
        assert!(body["action"]["action_id"].is_string());
    } else {
        assert_eq!(body["message"], "No action required. Risk levels are acceptable.");
    }
}

#[tokio::test]
async fn test_execute_reroute() {
    let server = server();
    let mut request = route_body();
    request["shipment_id"] = json!("SHP-1001");
    request["new_route_id"] = json!("ALT-1");
    request["reason"] = json!("Typhoon warning");

    let body: Value = server.post("/api/execution/execute").json(&request).await.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["action"]["shipment_id"], "SHP-1001");
    assert_eq!(body["action"]["status"], "completed");
    assert!(body["execution_timestamp"].is_string());

    let logs: Value = server
        .get("/api/logs")
        .add_query_param("category", "execution")
        .await
        .json();
    assert!(logs["count"].as_u64().unwrap() >= 1);

    request["new_route_id"] = json!("");
    let response = server.post("/api/execution/execute").json(&request).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// LOG TESTS
// =============================================================================

#[tokio::test]
async fn test_logs_filter_by_category() {
    let server = server();
    server
        .post("/api/agent/query")
        .json(&json!({ "message": "hello", "user_id": "ops" }))
        .await
        .assert_status_ok();

    let body: Value = server
        .get("/api/logs")
        .add_query_param("category", "agent_query")
        .await
        .json();
    let logs = body["logs"].as_array().unwrap();
    assert!(!logs.is_empty());
    assert!(logs.iter().all(|l| l["category"] == "agent_query"));
    assert_eq!(logs[0]["user_id"], "ops");
}

#[tokio::test]
async fn test_logs_reject_unknown_level() {
    let response = server().get("/api/logs").add_query_param("level", "loud").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_logs_writes_file() {
    let (server, _temp) = server_with_store();
    server.post("/api/routes/assess").json(&route_body()).await.assert_status_ok();

    let body: Value = server.get("/api/logs/export").await.json();
    let filepath = body["filepath"].as_str().unwrap();
    assert!(body["message"].as_str().unwrap().starts_with("Logs exported to "));

    let written: Value = serde_json::from_str(&std::fs::read_to_string(filepath).unwrap()).unwrap();
    assert!(!written.as_array().unwrap().is_empty());
}

// =============================================================================
// ACLED AUTH TESTS
// =============================================================================

#[tokio::test]
async fn test_acled_token_without_credentials() {
    let server = server();

    let body: Value = server.get("/api/auth/acled/token").await.json();
    assert_eq!(body["token_status"]["has_token"], false);

    let response = server.post("/api/auth/acled/refresh").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(
        error_message(&body),
        "Failed to refresh token. Check ACLED credentials."
    );
}

// =============================================================================
// DOCUMENT STORE TESTS
// =============================================================================

#[tokio::test]
async fn test_db_disconnected() {
    let server = server();

    let response = server.get("/api/db/health").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["status"], "disconnected");

    let response = server.get("/api/db/stats").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(error_message(&body), "MongoDB not connected");
}

#[tokio::test]
async fn test_db_persists_assessments_and_feeds() {
    let (server, _temp) = server_with_store();

    let health: Value = server.get("/api/db/health").await.json();
    assert_eq!(health["status"], "connected");
    assert_eq!(health["database"], "arkham_ai");

    // Taiwan and USA carry no political events, Japan does
    let mut request = route_body();
    request["route_regions"] = json!(["Japan"]);
    server.post("/api/routes/assess").json(&request).await.assert_status_ok();

    let stats: Value = server.get("/api/db/stats").await.json();
    assert!(stats["stats"]["assessments"].as_u64().unwrap() >= 1);
    assert!(stats["stats"]["risk_data"].as_u64().unwrap() >= 1);
    assert!(stats["stats"]["logs"].as_u64().unwrap() >= 1);

    let risk: Value = server
        .get("/api/db/risk-data")
        .add_query_param("category", "political")
        .add_query_param("limit", "5")
        .await
        .json();
    let data = risk["data"].as_array().unwrap();
    assert!(!data.is_empty() && data.len() <= 5);
    assert!(data.iter().all(|d| d["category"] == "political"));
}

#[tokio::test]
async fn test_db_risk_data_rejects_bad_days_back() {
    let (server, _temp) = server_with_store();

    for days_back in ["-1", "9223372036854775807", "soon"] {
        let response = server
            .get("/api/db/risk-data")
            .add_query_param("days_back", days_back)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
    }

    server
        .get("/api/db/risk-data")
        .add_query_param("days_back", "7")
        .await
        .assert_status_ok();
}

// =============================================================================
// DASHBOARD TESTS
// =============================================================================

#[tokio::test]
async fn test_dashboard_baseline() {
    let body: Value = server().get("/api/dashboard").await.json();
    let dashboard = &body["dashboard"];
    assert_eq!(dashboard["shipment"]["id"], "SHP-1001");
    assert_eq!(dashboard["active_route_id"], PRIMARY_ROUTE_ID);
    assert!(dashboard["disruption"].is_null());
    assert_eq!(dashboard["monitoring"], false);
}

#[tokio::test]
async fn test_disruption_reroutes_to_safest() {
    let server = server();

    let body: Value = server.post("/api/dashboard/disruption").await.json();
    let disruption = &body["disruption"];
    let dashboard = &body["dashboard"];

    assert!(disruption["primary_risk"].as_f64().unwrap() >= 0.75);
    assert_eq!(dashboard["active_route_id"], disruption["rerouted_to"]);
    assert!(!body["recommendation"].as_str().unwrap().is_empty());

    let active = disruption["rerouted_to"].as_str().unwrap();
    let routes = dashboard["routes"].as_array().unwrap();
    let active_risk = routes
        .iter()
        .find(|r| r["id"] == active)
        .map(|r| r["risk"]["overall"].as_f64().unwrap())
        .unwrap();
    for route in routes.iter().filter(|r| r["id"] != PRIMARY_ROUTE_ID) {
        assert!(active_risk <= route["risk"]["overall"].as_f64().unwrap());
    }

    let reset: Value = server.post("/api/dashboard/reset").await.json();
    assert_eq!(reset["dashboard"]["active_route_id"], PRIMARY_ROUTE_ID);
    assert!(reset["dashboard"]["disruption"].is_null());
}

#[tokio::test]
async fn test_configure_shipment() {
    let server = server();

    let body: Value = server
        .post("/api/dashboard/shipment")
        .json(&json!({
            "shipment_id": "SHP-2002",
            "origin": "Port of Taipei, Taiwan",
            "destination": "Port of Los Angeles, USA",
        }))
        .await
        .json();
    assert_eq!(body["dashboard"]["shipment"]["id"], "SHP-2002");
    assert_eq!(body["dashboard"]["shipment"]["contents"], "Semiconductor wafers");

    let response = server
        .post("/api/dashboard/shipment")
        .json(&json!({ "shipment_id": "SHP-2002" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_monitoring_toggle() {
    let server = server();

    let body: Value = server
        .post("/api/dashboard/monitoring")
        .json(&json!({ "enabled": true }))
        .await
        .json();
    assert_eq!(body["monitoring"], true);
    assert_eq!(body["dashboard"]["monitoring"], true);

    let response = server
        .post("/api/dashboard/monitoring")
        .json(&json!({ "unrelated": 1 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// MIDDLEWARE TESTS
// =============================================================================

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let server = server_with(Config {
        api_key: Some("s3cret".to_string()),
        ..test_config()
    });

    server.get("/health").await.assert_status_ok();

    let response = server.get("/api/routes").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server.get("/api/routes").authorization_bearer("wrong").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    server
        .get("/api/routes")
        .authorization_bearer("s3cret")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_rate_limit() {
    let server = server_with(Config {
        rate_limit: 1,
        ..test_config()
    });

    server.get("/health").await.assert_status_ok();
    let response = server.get("/health").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
}
