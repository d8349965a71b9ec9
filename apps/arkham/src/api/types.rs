//! Request bodies and query strings.

use arkham_core::journal::{LogCategory, LogFilter, LogLevel};
use arkham_core::optimizer::Weights;
use arkham_core::storage::RiskDataQuery;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use axum_extra::extract::{Query, QueryRejection};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::agent::RouteQuery;
use crate::{AppError, AppResult};

pub const NO_JSON: &str = "No JSON data provided";

/// Decode a JSON body. A missing, malformed or empty object is the same
/// "no data" error.
pub fn body<T: DeserializeOwned>(payload: Result<Json<Value>, JsonRejection>) -> AppResult<T> {
    let Ok(Json(value)) = payload else {
        return Err(AppError::BadRequest(NO_JSON.to_string()));
    };
    if value.as_object().is_none_or(|map| map.is_empty()) {
        return Err(AppError::BadRequest(NO_JSON.to_string()));
    }
    serde_json::from_value(value).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

// =============================================================================
// BODIES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueryBody {
    pub message: Option<String>,
    pub user_id: Option<String>,
}

impl QueryBody {
    pub fn message(&self) -> Option<&str> {
        present(&self.message)
    }
}

/// Body shared by every route-scoped POST.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RouteBody {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub route_regions: Vec<String>,
    pub route_id: Option<String>,
}

impl RouteBody {
    /// The route, or `None` when either endpoint is missing.
    pub fn route(&self) -> Option<RouteQuery> {
        let (origin, destination) = (present(&self.origin)?, present(&self.destination)?);
        Some(
            RouteQuery::new(origin, destination)
                .regions(self.route_regions.clone())
                .route_id(self.route_id.clone()),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CompareBody {
    pub routes: Vec<RouteBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PredictBody {
    #[serde(flatten)]
    pub route: RouteBody,
    pub days_ahead: Vec<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OptimizeBody {
    #[serde(flatten)]
    pub route: RouteBody,
    pub priority: Option<String>,
    pub weights: Option<Weights>,
    pub include_predictions: Option<bool>,
    pub max_alternatives: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MonitorBody {
    pub shipment_id: Option<String>,
    #[serde(flatten)]
    pub route: RouteBody,
    pub execution_mode: Option<String>,
}

impl MonitorBody {
    pub fn shipment_id(&self) -> Option<&str> {
        present(&self.shipment_id)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExecuteBody {
    pub shipment_id: Option<String>,
    pub new_route_id: Option<String>,
    #[serde(flatten)]
    pub route: RouteBody,
    pub reason: Option<String>,
}

impl ExecuteBody {
    pub fn ids(&self) -> Option<(&str, &str)> {
        Some((present(&self.shipment_id)?, present(&self.new_route_id)?))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShipmentBody {
    pub shipment_id: Option<String>,
    pub contents: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
}

impl ShipmentBody {
    pub fn required(&self) -> Option<(&str, &str, &str)> {
        Some((
            present(&self.shipment_id)?,
            present(&self.origin)?,
            present(&self.destination)?,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MonitoringBody {
    pub enabled: Option<bool>,
}

// =============================================================================
// QUERY STRING
// =============================================================================

/// Decode a query string. Unparseable values are a 400 rather than axum's
/// plain-text rejection.
pub fn query<T>(params: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    params
        .map(|Query(value)| value)
        .map_err(|e| AppError::BadRequest(format!("Invalid query parameters: {e}")))
}

/// `region`, `port_code` and `limit` for the feed endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedParams {
    pub region: Option<String>,
    pub port_code: Option<String>,
    pub limit: Option<usize>,
}

impl FeedParams {
    pub fn region(&self) -> Option<&str> {
        present(&self.region)
    }

    pub fn port_code(&self) -> Option<&str> {
        present(&self.port_code)
    }
}

/// A route named by `origin`, `destination` and repeated `regions`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RouteParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub regions: Vec<String>,
    /// Comma-separated horizons, e.g. `3,5,7`.
    pub days_ahead: Option<String>,
}

impl RouteParams {
    pub fn route(&self) -> Option<RouteQuery> {
        let (origin, destination) = (present(&self.origin)?, present(&self.destination)?);
        let regions = self.regions.iter().filter(|r| !r.is_empty()).cloned().collect();
        Some(RouteQuery::new(origin, destination).regions(regions))
    }

    pub fn days_ahead(&self) -> Vec<u32> {
        arkham_core::forecast::parse_horizons(present(&self.days_ahead).unwrap_or_default())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogParams {
    pub category: Option<String>,
    pub level: Option<String>,
    pub shipment_id: Option<String>,
    pub route_id: Option<String>,
    pub limit: Option<usize>,
}

impl LogParams {
    /// Overlay these filters onto `filter`. Unknown labels are rejected.
    pub fn apply(&self, mut filter: LogFilter) -> AppResult<LogFilter> {
        if let Some(raw) = present(&self.category) {
            filter.category = Some(
                LogCategory::parse(raw).ok_or_else(|| AppError::BadRequest(format!("Unknown log category: {raw}")))?,
            );
        }
        if let Some(raw) = present(&self.level) {
            filter.level =
                Some(LogLevel::parse(raw).ok_or_else(|| AppError::BadRequest(format!("Unknown log level: {raw}")))?);
        }
        filter.shipment_id = present(&self.shipment_id).map(str::to_string);
        filter.route_id = present(&self.route_id).map(str::to_string);
        if let Some(limit) = self.limit {
            filter.limit = limit;
        }
        Ok(filter)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RiskDataParams {
    pub category: Option<String>,
    pub location: Option<String>,
    pub source: Option<String>,
    pub days_back: Option<i64>,
    pub limit: Option<usize>,
}

impl From<RiskDataParams> for RiskDataQuery {
    fn from(params: RiskDataParams) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            category: keep(params.category),
            location: keep(params.location),
            source: keep(params.source),
            days_back: params.days_back,
            limit: params.limit.unwrap_or(Self::default().limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::extract::FromRequestParts;
    use axum::http::Request;

    async fn parse<T: DeserializeOwned + Send>(uri: &str) -> AppResult<T> {
        let (mut parts, ()) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        query(Query::<T>::from_request_parts(&mut parts, &()).await)
    }

    #[tokio::test]
    async fn route_params_keep_repeated_regions() {
        let q: RouteParams =
            parse("/r?origin=Port+of+Taipei%2C+Taiwan&regions=japan&regions=pacific&destination=").await.unwrap();
        assert_eq!(q.origin.as_deref(), Some("Port of Taipei, Taiwan"));
        assert_eq!(q.regions, vec!["japan", "pacific"]);
        // empty destination counts as missing
        assert!(q.route().is_none());

        let q: RouteParams = parse("/r?origin=Taiwan&destination=Busan&regions=japan&days_ahead=2,4").await.unwrap();
        assert_eq!(q.route().unwrap().regions, vec!["japan"]);
        assert_eq!(q.days_ahead(), vec![2, 4]);
    }

    #[tokio::test]
    async fn numbers_default_or_reject() {
        let q: RiskDataParams = parse("/d?limit=5&category=political").await.unwrap();
        let risk = RiskDataQuery::from(q);
        assert_eq!(risk.limit, 5);
        assert_eq!(risk.category.as_deref(), Some("political"));

        let q: RiskDataParams = parse("/d").await.unwrap();
        assert_eq!(RiskDataQuery::from(q).limit, RiskDataQuery::default().limit);

        let err = parse::<RiskDataParams>("/d?days_back=x").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(parse::<FeedParams>("/f?limit=lots").await.is_err());
        assert!(parse::<FeedParams>("/f?limit=-1").await.is_err());
    }

    #[tokio::test]
    async fn log_params_overlay_filter() {
        let q: LogParams = parse("/l?category=execution&limit=3&route_id=").await.unwrap();
        let filter = q.apply(LogFilter::default()).unwrap();
        assert_eq!(filter.category, Some(LogCategory::Execution));
        assert_eq!(filter.limit, 3);
        assert_eq!(filter.route_id, None);

        let q: LogParams = parse("/l?level=loud").await.unwrap();
        assert!(q.apply(LogFilter::default()).is_err());
    }

    #[test]
    fn empty_body_is_no_data() {
        let err = body::<RouteBody>(Ok(Json(serde_json::json!({})))).unwrap_err();
        assert_eq!(err.to_string(), NO_JSON);
    }

    #[test]
    fn flattened_route_fields() {
        let parsed: MonitorBody = body(Ok(Json(serde_json::json!({
            "shipment_id": "S1",
            "origin": "Taiwan",
            "destination": "Los Angeles",
            "route_regions": ["japan"],
        }))))
        .unwrap();
        let route = parsed.route.route().unwrap();
        assert_eq!(route.regions, vec!["japan"]);
        assert_eq!(parsed.shipment_id(), Some("S1"));
    }
}
