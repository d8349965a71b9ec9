//! # Feeds
//!
//! Risk data points and everything that produces them without a network:
//! the authored fallback feeds, and the mapping from raw trade.gov leads and
//! ACLED events into scored data points.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::clamp_unit;

// =============================================================================
// TYPES
// =============================================================================

/// Risk category of a data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    TradeNews,
    Political,
    PortCongestion,
}

impl RiskCategory {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TradeNews => "trade_news",
            Self::Political => "political",
            Self::PortCongestion => "port_congestion",
        }
    }

    /// Human label used in recommendations.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TradeNews => "Trade News",
            Self::Political => "Political",
            Self::PortCongestion => "Port Congestion",
        }
    }
}

/// A single risk observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDataPoint {
    pub source: String,
    pub category: RiskCategory,
    pub title: String,
    pub description: String,
    /// Severity in `[0, 1]`.
    pub severity: f64,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RiskDataPoint {
    /// Create a data point. Severity is clamped into `[0, 1]`.
    pub fn new(
        source: impl Into<String>,
        category: RiskCategory,
        title: impl Into<String>,
        description: impl Into<String>,
        severity: f64,
        location: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            category,
            title: title.into(),
            description: description.into(),
            severity: clamp_unit(severity),
            location: location.into(),
            timestamp,
            metadata: Map::new(),
        }
    }

    /// Attach metadata. Non-object values are ignored.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        if let Value::Object(map) = metadata {
            self.metadata = map;
        }
        self
    }

    /// Hours elapsed between the observation and `now`.
    pub fn hours_ago(&self, now: DateTime<Utc>) -> f64 {
        (now - self.timestamp).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Sort newest first.
pub fn sort_newest_first(points: &mut [RiskDataPoint]) {
    points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

fn matches_region(location: &str, region: Option<&str>) -> bool {
    match region {
        Some(r) => location.to_lowercase().contains(&r.to_lowercase()),
        None => true,
    }
}

// =============================================================================
// FALLBACK FEEDS
// =============================================================================

/// Authored trade news, filtered by region and truncated to `limit`.
pub fn mock_trade_news(now: DateTime<Utc>, region: Option<&str>, limit: usize) -> Vec<RiskDataPoint> {
    let items = vec![
        RiskDataPoint::new(
            "trade_news_api",
            RiskCategory::TradeNews,
            "New Tariffs Announced on Semiconductor Imports",
            "Trade tensions escalate with new tariffs affecting semiconductor supply chains",
            0.75,
            "Taiwan Strait",
            now - Duration::hours(2),
        )
        .with_metadata(json!({"impact": "high", "sector": "semiconductors"})),
        RiskDataPoint::new(
            "trade_news_api",
            RiskCategory::TradeNews,
            "Supply Chain Disruption in South China Sea",
            "Increased shipping delays due to regional tensions",
            0.65,
            "South China Sea",
            now - Duration::hours(5),
        )
        .with_metadata(json!({"impact": "medium", "sector": "shipping"})),
        RiskDataPoint::new(
            "trade_news_api",
            RiskCategory::TradeNews,
            "Trade Agreement Updates",
            "Positive developments in regional trade agreements",
            0.25,
            "Southeast Asia",
            now - Duration::days(1),
        )
        .with_metadata(json!({"impact": "low", "sector": "general"})),
    ];

    items
        .into_iter()
        .filter(|p| matches_region(&p.location, region))
        .take(limit)
        .collect()
}

/// Authored geopolitical events, filtered by region.
pub fn mock_political(now: DateTime<Utc>, region: Option<&str>) -> Vec<RiskDataPoint> {
    let items = vec![
        RiskDataPoint::new(
            "geopolitical_api",
            RiskCategory::Political,
            "Increased Military Activity in Region",
            "Heightened military presence affecting shipping lanes",
            0.70,
            "East China Sea",
            now - Duration::hours(3),
        )
        .with_metadata(json!({"type": "military", "duration": "ongoing"})),
        RiskDataPoint::new(
            "geopolitical_api",
            RiskCategory::Political,
            "Diplomatic Tensions Rising",
            "Escalating diplomatic tensions between regional powers",
            0.60,
            "Asia-Pacific",
            now - Duration::days(1),
        )
        .with_metadata(json!({"type": "diplomatic", "duration": "recent"})),
        RiskDataPoint::new(
            "geopolitical_api",
            RiskCategory::Political,
            "Stable Political Environment",
            "No significant political disruptions reported",
            0.20,
            "Japan",
            now - Duration::hours(12),
        )
        .with_metadata(json!({"type": "stability", "duration": "stable"})),
    ];

    items
        .into_iter()
        .filter(|p| matches_region(&p.location, region))
        .collect()
}

/// Authored port congestion readings, filtered by port code.
pub fn mock_port_congestion(now: DateTime<Utc>, port_code: Option<&str>) -> Vec<RiskDataPoint> {
    let items = vec![
        RiskDataPoint::new(
            "port_api",
            RiskCategory::PortCongestion,
            "High Congestion at Los Angeles Port",
            "Container backlog causing 3-5 day delays",
            0.55,
            "Los Angeles, USA",
            now - Duration::hours(1),
        )
        .with_metadata(json!({"port_code": "USLAX", "wait_time_days": 4, "capacity": "85%"})),
        RiskDataPoint::new(
            "port_api",
            RiskCategory::PortCongestion,
            "Normal Operations at Singapore Port",
            "Port operating at normal capacity",
            0.15,
            "Singapore",
            now - Duration::hours(6),
        )
        .with_metadata(json!({"port_code": "SGSIN", "wait_time_days": 0, "capacity": "45%"})),
        RiskDataPoint::new(
            "port_api",
            RiskCategory::PortCongestion,
            "Moderate Delays at Rotterdam",
            "Slight congestion with 1-2 day delays",
            0.35,
            "Rotterdam, Netherlands",
            now - Duration::hours(4),
        )
        .with_metadata(json!({"port_code": "NLRTM", "wait_time_days": 2, "capacity": "70%"})),
    ];

    items
        .into_iter()
        .filter(|p| match port_code {
            Some(code) => p
                .metadata
                .get("port_code")
                .and_then(Value::as_str)
                .is_some_and(|c| c.to_uppercase().contains(&code.to_uppercase())),
            None => true,
        })
        .collect()
}

// =============================================================================
// TRADE.GOV LEADS
// =============================================================================

fn parse_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw?, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Severity of a trade lead from its tender deadline and its age.
pub fn trade_lead_severity(
    now: DateTime<Utc>,
    published: DateTime<Utc>,
    tender_end: Option<DateTime<Utc>>,
) -> f64 {
    let mut severity: f64 = 0.5;

    if let Some(end) = tender_end {
        let days_until = (end - now).num_days();
        if (0..=7).contains(&days_until) {
            severity = 0.8;
        } else if (8..=30).contains(&days_until) {
            severity = 0.6;
        }
    }

    let days_old = (now - published).num_days();
    if days_old <= 1 {
        severity = (severity + 0.2).min(1.0);
    } else if days_old <= 7 {
        severity = (severity + 0.1).min(1.0);
    }

    clamp_unit(severity)
}

/// Map one trade.gov lead object into a data point.
pub fn trade_lead_to_point(now: DateTime<Utc>, lead: &Value) -> RiskDataPoint {
    let text = |key: &str| lead.get(key).and_then(Value::as_str);

    let title = text("title").unwrap_or("Trade Lead Update");
    let description = truncate_chars(text("description").unwrap_or(""), 500);
    let location = text("country_code").unwrap_or("Unknown");
    let published = parse_date(text("published_date")).unwrap_or(now);
    let tender_end = parse_date(text("tender_end_date"));
    let severity = trade_lead_severity(now, published, tender_end);

    RiskDataPoint::new(
        "trade_gov_api",
        RiskCategory::TradeNews,
        title,
        description,
        severity,
        location,
        published,
    )
    .with_metadata(json!({
        "article_id": lead.get("id"),
        "source": "US Trade.gov",
        "url": lead.get("url"),
        "country_code": lead.get("country_code"),
        "tender_start_date": lead.get("tender_start_date"),
        "tender_end_date": lead.get("tender_end_date"),
        "contract_start_date": lead.get("contract_start_date"),
        "contract_end_date": lead.get("contract_end_date"),
        "raw_data": lead,
    }))
}

// =============================================================================
// ACLED EVENTS
// =============================================================================

/// Severity of an ACLED event from its type and fatalities.
pub fn acled_severity(event: &Value) -> f64 {
    let field = |key: &str| {
        event
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase()
    };
    let event_type = field("event_type");
    let sub_event_type = field("sub_event_type");
    let mentions = |word: &str| event_type.contains(word) || sub_event_type.contains(word);

    let mut severity = 0.3;
    if mentions("violence") {
        severity += 0.3;
    } else if mentions("battle") {
        severity += 0.4;
    } else if mentions("explosion") {
        severity += 0.35;
    } else if mentions("protest") {
        severity += 0.1;
    }

    let fatalities = fatalities(event);
    if fatalities >= 100 {
        severity += 0.3;
    } else if fatalities >= 10 {
        severity += 0.2;
    } else if fatalities >= 1 {
        severity += 0.1;
    }

    f64::min(1.0, severity)
}

// ACLED sends fatalities as a number or a numeric string.
fn fatalities(event: &Value) -> i64 {
    match event.get("fatalities") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Map one ACLED event into a data point.
pub fn acled_event_to_point(now: DateTime<Utc>, event: &Value) -> RiskDataPoint {
    let text = |key: &str| event.get(key).and_then(Value::as_str).unwrap_or("");

    let title = format!(
        "{} - {}",
        event.get("event_type").and_then(Value::as_str).unwrap_or("Event"),
        text("sub_event_type")
    );
    let notes = truncate_chars(text("notes"), 200);
    let description = if notes.is_empty() {
        let place = event.get("location").and_then(Value::as_str).unwrap_or("Unknown");
        format!("Event in {place}")
    } else {
        notes
    };
    let location = format!("{}, {}, {}", text("country"), text("admin1"), text("location"));
    let timestamp = parse_date(event.get("event_date").and_then(Value::as_str)).unwrap_or(now);

    RiskDataPoint::new(
        "acled_api",
        RiskCategory::Political,
        title,
        description,
        acled_severity(event),
        location,
        timestamp,
    )
    .with_metadata(json!({
        "event_id": event.get("event_id_cnty"),
        "event_type": event.get("event_type"),
        "sub_event_type": event.get("sub_event_type"),
        "fatalities": fatalities(event),
        "country": event.get("country"),
        "admin1": event.get("admin1"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn mock_trade_news_filters_by_region() {
        let all = mock_trade_news(now(), None, 50);
        assert_eq!(all.len(), 3);

        let strait = mock_trade_news(now(), Some("taiwan"), 50);
        assert_eq!(strait.len(), 1);
        assert_eq!(strait[0].title, "New Tariffs Announced on Semiconductor Imports");

        assert_eq!(mock_trade_news(now(), None, 2).len(), 2);
        assert!(mock_trade_news(now(), Some("usa"), 50).is_empty());
    }

    #[test]
    fn mock_political_filters_by_region() {
        let japan = mock_political(now(), Some("Japan"));
        assert_eq!(japan.len(), 1);
        assert!((japan[0].severity - 0.20).abs() < 1e-9);
        assert_eq!(mock_political(now(), None).len(), 3);
    }

    #[test]
    fn mock_ports_filter_by_code() {
        let la = mock_port_congestion(now(), Some("uslax"));
        assert_eq!(la.len(), 1);
        assert_eq!(la[0].location, "Los Angeles, USA");
        assert_eq!(la[0].metadata["wait_time_days"], 4);
        assert!(mock_port_congestion(now(), Some("CNSHA")).is_empty());
    }

    #[test]
    fn severity_is_clamped_on_construction() {
        let p = RiskDataPoint::new("x", RiskCategory::Political, "t", "d", 1.4, "l", now());
        assert!((p.severity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trade_lead_severity_deadline_and_recency() {
        let n = now();
        // fresh lead, deadline in 3 days
        let s = trade_lead_severity(n, n, Some(n + Duration::days(3)));
        assert!((s - 1.0).abs() < 1e-9);
        // week-old lead, deadline in 20 days
        let s = trade_lead_severity(n, n - Duration::days(5), Some(n + Duration::days(20)));
        assert!((s - 0.7).abs() < 1e-9);
        // old lead, no deadline
        let s = trade_lead_severity(n, n - Duration::days(40), None);
        assert!((s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn trade_lead_maps_fields() {
        let lead = json!({
            "id": "abc",
            "title": "Port equipment tender",
            "description": "x".repeat(800),
            "country_code": "VN",
            "published_date": "2025-03-09",
            "tender_end_date": "2025-03-15"
        });
        let p = trade_lead_to_point(now(), &lead);
        assert_eq!(p.source, "trade_gov_api");
        assert_eq!(p.location, "VN");
        assert_eq!(p.description.len(), 500);
        assert!((p.severity - 1.0).abs() < 1e-9);
        assert_eq!(p.metadata["article_id"], "abc");
    }

    #[test]
    fn trade_lead_defaults_when_fields_missing() {
        let p = trade_lead_to_point(now(), &json!({}));
        assert_eq!(p.title, "Trade Lead Update");
        assert_eq!(p.location, "Unknown");
        assert_eq!(p.timestamp, now());
    }

    #[test]
    fn acled_severity_rules() {
        let battle = json!({"event_type": "Battles", "sub_event_type": "Armed clash", "fatalities": 12});
        assert!((acled_severity(&battle) - 0.9).abs() < 1e-9);

        let protest = json!({"event_type": "Protests", "sub_event_type": "Peaceful protest", "fatalities": "0"});
        assert!((acled_severity(&protest) - 0.4).abs() < 1e-9);

        let massacre = json!({"event_type": "Violence against civilians", "fatalities": 150});
        assert!((acled_severity(&massacre) - 0.9).abs() < 1e-9);

        let capped = json!({"event_type": "Battles", "fatalities": 500});
        assert!((acled_severity(&capped) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn acled_event_maps_fields() {
        let event = json!({
            "event_id_cnty": "TWN123",
            "event_date": "2025-03-01",
            "event_type": "Protests",
            "sub_event_type": "Peaceful protest",
            "country": "Taiwan",
            "admin1": "Taipei City",
            "location": "Taipei",
            "fatalities": 0,
            "notes": ""
        });
        let p = acled_event_to_point(now(), &event);
        assert_eq!(p.title, "Protests - Peaceful protest");
        assert_eq!(p.description, "Event in Taipei");
        assert_eq!(p.location, "Taiwan, Taipei City, Taipei");
        assert_eq!(p.category, RiskCategory::Political);
        assert_eq!(p.timestamp.format("%Y-%m-%d").to_string(), "2025-03-01");
    }

    #[test]
    fn sort_newest_first_orders_by_timestamp() {
        let mut points = mock_political(now(), None);
        sort_newest_first(&mut points);
        assert_eq!(points[0].title, "Increased Military Activity in Region");
        assert_eq!(points[2].title, "Diplomatic Tensions Rising");
    }
}
