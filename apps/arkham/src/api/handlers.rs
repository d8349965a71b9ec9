//! Route handlers.
//!
//! Success bodies carry `"success": true`; failures go through
//! [`AppError`]'s envelope.

use std::sync::Arc;

use arkham_core::execution::ExecutionMode;
use arkham_core::journal::LogFilter;
use arkham_core::optimizer::{OptimizationPriority, OptimizedRoute};
use arkham_core::prompts::disruption_prompt;
use arkham_core::risk::RiskAssessment;
use arkham_core::storage::{DocumentStore, RiskDataQuery};
use arkham_core::RiskDataPoint;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::{Query, QueryRejection};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use super::AppState;
use super::types::{
    CompareBody, ExecuteBody, FeedParams, LogParams, MonitorBody, MonitoringBody, OptimizeBody,
    PredictBody, QueryBody, RiskDataParams, RouteBody, RouteParams, ShipmentBody, body, query,
};
use crate::agent::OptimizeRequest;
use crate::ingestion::DEFAULT_TRADE_LIMIT;
use crate::{AppError, AppResult};

type JsonBody = Result<Json<Value>, JsonRejection>;
type Params<T> = Result<Query<T>, QueryRejection>;
type Shared = State<Arc<AppState>>;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DB_NOT_CONNECTED: &str = "MongoDB not connected";
const MISSING_ENDPOINTS: &str = "Missing 'origin' or 'destination' field";
const MISSING_ENDPOINT_PARAMS: &str = "Missing 'origin' or 'destination' query parameter";

fn bad_request(message: &str) -> AppError {
    AppError::BadRequest(message.to_string())
}

fn to_value(value: &impl serde::Serialize) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn points_response(points: &[RiskDataPoint]) -> AppResult<Json<Value>> {
    Ok(Json(json!({
        "success": true,
        "count": points.len(),
        "data": to_value(&points)?,
    })))
}

/// Assessment JSON plus the `factors` view the dashboard reads.
fn assessment_json(assessment: &RiskAssessment) -> AppResult<Value> {
    let mut value = to_value(assessment)?;
    if let Some(map) = value.as_object_mut() {
        let b = &assessment.breakdown;
        map.insert(
            "factors".to_string(),
            json!({
                "congestion": b.port_congestion,
                "tariffs": b.trade_news,
                "political_unrest": b.political,
            }),
        );
    }
    Ok(value)
}

fn optimized_route_json(route: &OptimizedRoute) -> AppResult<Value> {
    let mut value = to_value(route)?;
    if let Some(map) = value.as_object_mut() {
        map.insert("risk_assessment".to_string(), assessment_json(&route.risk_assessment)?);
    }
    Ok(value)
}

fn connected_store(state: &AppState) -> AppResult<&DocumentStore> {
    state
        .store()
        .map(Arc::as_ref)
        .ok_or_else(|| AppError::Unavailable(DB_NOT_CONNECTED.to_string()))
}

// =============================================================================
// HEALTH
// =============================================================================

pub async fn index(State(state): Shared) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.config.agent_name,
        "version": VERSION,
        "note": "Frontend not found, serving API only",
    }))
}

pub async fn health(State(state): Shared) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.config.agent_name,
        "version": VERSION,
    }))
}

pub async fn api_health(State(state): Shared) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": format!("{} agent is running", state.config.agent_name),
    }))
}

// =============================================================================
// AGENT
// =============================================================================

pub async fn agent_query(State(state): Shared, payload: JsonBody) -> AppResult<Json<Value>> {
    let request: QueryBody = body(payload)?;
    let message = request
        .message()
        .ok_or_else(|| bad_request("Missing 'message' field in request"))?;
    let user_id = request.user_id.as_deref().unwrap_or("anonymous");

    let reply = state.agent.query(message, user_id).await;
    Ok(Json(to_value(&reply)?))
}

pub async fn agent_info(State(state): Shared) -> AppResult<Json<Value>> {
    Ok(Json(to_value(&state.agent.info())?))
}

// =============================================================================
// RISK DATA
// =============================================================================

pub async fn trade_news(State(state): Shared, params: Params<FeedParams>) -> AppResult<Json<Value>> {
    let params = query(params)?;
    let limit = params.limit.unwrap_or(DEFAULT_TRADE_LIMIT);
    let points = state.agent.ingestion().trade_news(params.region(), limit).await;
    points_response(&points)
}

pub async fn political(State(state): Shared, params: Params<FeedParams>) -> AppResult<Json<Value>> {
    let params = query(params)?;
    let points = state.agent.ingestion().political(params.region()).await;
    points_response(&points)
}

pub async fn ports(State(state): Shared, params: Params<FeedParams>) -> AppResult<Json<Value>> {
    let params = query(params)?;
    let points = state.agent.ingestion().ports(params.port_code()).await;
    points_response(&points)
}

pub async fn all_data(State(state): Shared, params: Params<FeedParams>) -> AppResult<Json<Value>> {
    let params = query(params)?;
    let points = state
        .agent
        .ingestion()
        .all(params.region(), params.port_code())
        .await;
    points_response(&points)
}

pub async fn route_data(State(state): Shared, payload: JsonBody) -> AppResult<Json<Value>> {
    let request: RouteBody = body(payload)?;
    let route = request.route().ok_or_else(|| bad_request(MISSING_ENDPOINTS))?;

    let points = state
        .agent
        .ingestion()
        .for_route(&route.origin, &route.destination, &route.regions)
        .await;
    Ok(Json(json!({
        "success": true,
        "count": points.len(),
        "route": {
            "origin": route.origin,
            "destination": route.destination,
            "regions": route.regions,
        },
        "data": to_value(&points)?,
    })))
}

// =============================================================================
// ROUTES
// =============================================================================

pub async fn list_routes() -> Json<Value> {
    Json(json!({
        "success": true,
        "routes": [
            { "route_id": "ROUTE-001", "origin": "Taiwan", "destination": "Los Angeles", "status": "active" },
            { "route_id": "ROUTE-002", "origin": "Vietnam", "destination": "Los Angeles", "status": "active" },
        ],
    }))
}

pub async fn assess_route(State(state): Shared, payload: JsonBody) -> AppResult<Json<Value>> {
    let request: RouteBody = body(payload)?;
    let route = request.route().ok_or_else(|| bad_request(MISSING_ENDPOINTS))?;

    let assessment = state.agent.assess(&route).await;
    Ok(Json(json!({
        "success": true,
        "assessment": assessment_json(&assessment)?,
    })))
}

pub async fn route_risk(
    State(state): Shared,
    Path(route_id): Path<String>,
    params: Params<RouteParams>,
) -> AppResult<Json<Value>> {
    let route = query(params)?
        .route()
        .ok_or_else(|| bad_request(MISSING_ENDPOINT_PARAMS))?
        .route_id(Some(route_id.clone()));

    let assessment = state.agent.assess(&route).await;
    Ok(Json(json!({
        "success": true,
        "route_id": route_id,
        "assessment": to_value(&assessment)?,
    })))
}

pub async fn compare_routes(State(state): Shared, payload: JsonBody) -> AppResult<Json<Value>> {
    let request: CompareBody = body(payload)?;
    if request.routes.len() < 2 {
        return Err(bad_request("At least 2 routes required for comparison"));
    }
    let routes = request
        .routes
        .iter()
        .map(RouteBody::route)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| bad_request("Each route must have 'origin' and 'destination'"))?;

    let comparison: Vec<Value> = state
        .agent
        .compare(&routes)
        .await
        .iter()
        .map(|a| {
            json!({
                "origin": a.origin,
                "destination": a.destination,
                "overall_risk_score": a.overall_risk_score,
                "risk_level": a.risk_level,
                "breakdown": a.breakdown,
                "recommendation": a.recommendation,
                "confidence": a.confidence,
            })
        })
        .collect();
    Ok(Json(json!({ "success": true, "comparison": comparison })))
}

pub async fn predict_route(State(state): Shared, payload: JsonBody) -> AppResult<Json<Value>> {
    let request: PredictBody = body(payload)?;
    let route = request.route.route().ok_or_else(|| bad_request(MISSING_ENDPOINTS))?;

    let prediction = state.agent.predict(&route, &request.days_ahead).await;
    Ok(Json(json!({
        "success": true,
        "prediction": to_value(&prediction)?,
    })))
}

pub async fn route_prediction(
    State(state): Shared,
    Path(route_id): Path<String>,
    params: Params<RouteParams>,
) -> AppResult<Json<Value>> {
    let params = query(params)?;
    let route = params
        .route()
        .ok_or_else(|| bad_request(MISSING_ENDPOINT_PARAMS))?
        .route_id(Some(route_id.clone()));
    let days = params.days_ahead();

    let prediction = state.agent.predict(&route, &days).await;
    Ok(Json(json!({
        "success": true,
        "route_id": route_id,
        "prediction": to_value(&prediction)?,
    })))
}

pub async fn optimize_route(State(state): Shared, payload: JsonBody) -> AppResult<Json<Value>> {
    let request: OptimizeBody = body(payload)?;
    let route = request.route.route().ok_or_else(|| bad_request(MISSING_ENDPOINTS))?;

    let mut optimize = OptimizeRequest::new(route.origin, route.destination);
    optimize.priority = request
        .priority
        .as_deref()
        .map(OptimizationPriority::parse)
        .unwrap_or_default();
    optimize.weights = request.weights;
    if let Some(include) = request.include_predictions {
        optimize.include_predictions = include;
    }
    if let Some(max) = request.max_alternatives {
        optimize.max_alternatives = max;
    }

    let result = state.agent.optimize(&optimize).await;
    let routes = result
        .optimized_routes
        .iter()
        .map(optimized_route_json)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(json!({
        "success": true,
        "message": "Route optimization complete",
        "original_route": optimized_route_json(&result.original_route)?,
        "optimized_routes": routes,
        "recommendation": result.recommendation,
        "optimization": {
            "recommendation": result.recommendation,
            "optimization_criteria": result.optimization_criteria,
            "optimization_timestamp": result.optimization_timestamp,
        },
    })))
}

// =============================================================================
// EXECUTION
// =============================================================================

pub async fn monitor_shipment(State(state): Shared, payload: JsonBody) -> AppResult<Json<Value>> {
    let request: MonitorBody = body(payload)?;
    let (Some(shipment_id), Some(route)) = (request.shipment_id(), request.route.route()) else {
        return Err(bad_request("Missing required fields: shipment_id, origin, destination"));
    };
    let mode = request
        .execution_mode
        .as_deref()
        .map(ExecutionMode::parse)
        .unwrap_or_default();

    let Some(action) = state.agent.monitor(shipment_id, &route, mode).await else {
        return Ok(Json(json!({
            "success": true,
            "action_triggered": false,
            "message": "No action required. Risk levels are acceptable.",
        })));
    };
    Ok(Json(json!({
        "success": true,
        "action_triggered": true,
        "action": {
            "action_id": action.action_id,
            "action_type": action.action_type,
            "shipment_id": action.shipment_id,
            "original_route_id": action.original_route_id,
            "new_route_id": action.new_route_id,
            "reason": action.reason,
            "risk_score_before": action.risk_score_before,
            "risk_score_after": action.risk_score_after,
            "status": action.status,
            "created_at": action.created_at,
            "estimated_impact": action.estimated_impact,
        },
    })))
}

pub async fn execute_reroute(State(state): Shared, payload: JsonBody) -> AppResult<Json<Value>> {
    let request: ExecuteBody = body(payload)?;
    let (Some((shipment_id, new_route_id)), Some(route)) = (request.ids(), request.route.route()) else {
        return Err(bad_request(
            "Missing required fields: shipment_id, new_route_id, origin, destination",
        ));
    };

    let result = state
        .agent
        .execute_reroute(shipment_id, new_route_id, &route, request.reason.as_deref())
        .await;
    let action = &result.action;
    Ok(Json(json!({
        "success": result.success,
        "message": result.message,
        "action": {
            "action_id": action.action_id,
            "action_type": action.action_type,
            "shipment_id": action.shipment_id,
            "status": action.status,
            "risk_score_before": action.risk_score_before,
            "risk_score_after": action.risk_score_after,
            "executed_at": action.executed_at,
        },
        "details": result.details,
        "execution_timestamp": result.execution_timestamp,
    })))
}

// =============================================================================
// LOGS
// =============================================================================

pub async fn logs(State(state): Shared, params: Params<LogParams>) -> AppResult<Json<Value>> {
    let filter = query(params)?.apply(LogFilter::default())?;

    let entries = state.agent.ledger().query(&filter).await;
    Ok(Json(json!({
        "success": true,
        "count": entries.len(),
        "logs": to_value(&entries)?,
    })))
}

pub async fn export_logs(State(state): Shared, params: Params<LogParams>) -> AppResult<Json<Value>> {
    let filter = query(params)?.apply(LogFilter::for_export())?;

    let dir = &state.config.logs_dir;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("logs_export_{}.json", Utc::now().format("%Y%m%d_%H%M%S")));
    let count = state.agent.ledger().export(&path, &filter).await?;

    let filepath = path.display().to_string();
    Ok(Json(json!({
        "success": true,
        "message": format!("Logs exported to {filepath}"),
        "filepath": filepath,
        "count": count,
    })))
}

// =============================================================================
// ACLED AUTH
// =============================================================================

pub async fn acled_token(State(state): Shared) -> Json<Value> {
    let now = Utc::now();
    let status = match state.agent.acled().cached_token().await {
        Some(token) => json!({
            "has_token": true,
            "is_expired": token.is_expired(now),
            "is_expiring_soon": token.is_expiring_soon(now),
            "expires_at": token.expires_at,
            "created_at": token.created_at,
        }),
        None => json!({
            "has_token": false,
            "message": "No token available. Configure ACLED credentials to authenticate.",
        }),
    };
    Json(json!({ "success": true, "token_status": status }))
}

pub async fn acled_refresh(State(state): Shared) -> AppResult<Json<Value>> {
    let acled = state.agent.acled();
    if acled.access_token(true).await.is_none() {
        return Err(AppError::Internal(
            "Failed to refresh token. Check ACLED credentials.".to_string(),
        ));
    }
    let expires_at = acled.cached_token().await.map(|t| t.expires_at);
    Ok(Json(json!({
        "success": true,
        "message": "Token refreshed successfully",
        "token_status": { "expires_at": expires_at },
    })))
}

pub async fn acled_test(State(state): Shared) -> AppResult<Json<Value>> {
    let data = state
        .agent
        .acled()
        .fetch("acled/read", vec![("limit".to_string(), "1".to_string())])
        .await?;

    match data.get("status") {
        Some(status) if status.as_i64() == Some(200) => Ok(Json(json!({
            "success": true,
            "message": "ACLED API connection successful",
            "data_count": data.get("data").and_then(Value::as_array).map_or(0, Vec::len),
        }))),
        other => Err(AppError::Upstream(format!(
            "ACLED API returned status {}",
            other.map_or_else(|| "unknown".to_string(), Value::to_string)
        ))),
    }
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

pub async fn db_health(State(state): Shared) -> Response {
    if state.store().is_some() {
        Json(json!({
            "success": true,
            "status": "connected",
            "database": state.config.database_name,
            "message": "MongoDB Atlas connection is active",
        }))
        .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "status": "disconnected",
                "message": "MongoDB Atlas not configured or connection failed",
            })),
        )
            .into_response()
    }
}

pub async fn db_risk_data(State(state): Shared, params: Params<RiskDataParams>) -> AppResult<Json<Value>> {
    let store = connected_store(&state)?;
    let filter = RiskDataQuery::from(query(params)?);

    let results = store.risk_data(&filter, Utc::now())?;
    Ok(Json(json!({
        "success": true,
        "count": results.len(),
        "data": results,
    })))
}

pub async fn db_stats(State(state): Shared) -> AppResult<Json<Value>> {
    let stats = connected_store(&state)?.stats()?;
    Ok(Json(json!({
        "success": true,
        "database": state.config.database_name,
        "stats": stats.collections,
        "total_documents": stats.total_documents,
    })))
}

// =============================================================================
// DASHBOARD
// =============================================================================

async fn dashboard_view(state: &AppState) -> AppResult<Value> {
    to_value(&state.dashboard.read().await.dashboard().view())
}

pub async fn dashboard(State(state): Shared) -> AppResult<Json<Value>> {
    Ok(Json(json!({
        "success": true,
        "dashboard": dashboard_view(&state).await?,
    })))
}

pub async fn configure_shipment(State(state): Shared, payload: JsonBody) -> AppResult<Json<Value>> {
    let request: ShipmentBody = body(payload)?;
    let (id, origin, destination) = request
        .required()
        .ok_or_else(|| bad_request("Missing required fields: shipment_id, origin, destination"))?;

    {
        let mut guard = state.dashboard.write().await;
        let contents = request
            .contents
            .clone()
            .unwrap_or_else(|| guard.dashboard().shipment().contents.clone());
        guard
            .dashboard_mut()
            .configure_shipment(id, &contents, origin, destination, Utc::now());
    }
    dashboard(State(state)).await
}

pub async fn trigger_disruption(State(state): Shared) -> AppResult<Json<Value>> {
    let (disruption, prompt, canned) = {
        let mut guard = state.dashboard.write().await;
        let disruption = guard.trigger_disruption();
        let prompt = disruption_prompt(guard.dashboard());
        (disruption, prompt, guard.dashboard().canned_recommendation())
    };
    info!(scenario = %disruption.scenario, rerouted_to = %disruption.rerouted_to, "disruption triggered");

    let recommendation = state.agent.dashboard_recommendation(&prompt, canned).await;
    state
        .dashboard
        .write()
        .await
        .dashboard_mut()
        .record_recommendation(Utc::now(), &recommendation);

    Ok(Json(json!({
        "success": true,
        "disruption": disruption,
        "recommendation": recommendation,
        "dashboard": dashboard_view(&state).await?,
    })))
}

pub async fn reset_dashboard(State(state): Shared) -> AppResult<Json<Value>> {
    state.dashboard.write().await.reset();
    dashboard(State(state)).await
}

pub async fn set_monitoring(State(state): Shared, payload: JsonBody) -> AppResult<Json<Value>> {
    let request: MonitoringBody = body(payload)?;
    let enabled = request
        .enabled
        .ok_or_else(|| bad_request("Missing 'enabled' field"))?;

    state
        .dashboard
        .write()
        .await
        .dashboard_mut()
        .set_monitoring(enabled, Utc::now());
    Ok(Json(json!({
        "success": true,
        "monitoring": enabled,
        "dashboard": dashboard_view(&state).await?,
    })))
}
