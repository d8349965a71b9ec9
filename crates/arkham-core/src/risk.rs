//! # Risk Assessment
//!
//! Scores a route from its risk data points.
//!
//! ```text
//! category risk = Σ severity·decay(age) / n        (decay over 168h)
//! total         = 0.35·trade + 0.40·political + 0.25·port
//! overall       = min(1, total · multiplier)      (critical/recent bumps)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feeds::{RiskCategory, RiskDataPoint};
use crate::round_to;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Weight of trade news in the total.
pub const TRADE_NEWS_WEIGHT: f64 = 0.35;
/// Weight of political risk in the total.
pub const POLITICAL_WEIGHT: f64 = 0.40;
/// Weight of port congestion in the total.
pub const PORT_CONGESTION_WEIGHT: f64 = 0.25;
/// Age at which an observation stops contributing.
pub const DECAY_HORIZON_HOURS: f64 = 168.0;

const CRITICAL_SEVERITY: f64 = 0.8;
const RECENT_SEVERITY: f64 = 0.7;
const RECENT_WINDOW_HOURS: f64 = 24.0;
const MAX_FACTORS: usize = 5;

// =============================================================================
// TYPES
// =============================================================================

/// Discrete risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Level for a score: ≥0.75 critical, ≥0.5 high, ≥0.25 medium.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            Self::Critical
        } else if score >= 0.50 {
            Self::High
        } else if score >= 0.25 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse a wire name, case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Per-category risk plus the weighted total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub trade_news: f64,
    pub political: f64,
    pub port_congestion: f64,
    pub total: f64,
}

impl RiskBreakdown {
    /// The category with the highest risk. Ties keep the earlier category.
    pub fn primary_category(&self) -> RiskCategory {
        let mut best = (RiskCategory::TradeNews, self.trade_news);
        for candidate in [
            (RiskCategory::Political, self.political),
            (RiskCategory::PortCongestion, self.port_congestion),
        ] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        best.0
    }
}

/// One of the top observations behind an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub category: RiskCategory,
    pub title: String,
    pub description: String,
    pub severity: f64,
    pub location: String,
    pub hours_ago: f64,
    pub impact: RiskLevel,
}

/// Complete assessment of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub route_id: Option<String>,
    pub origin: String,
    pub destination: String,
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
    pub breakdown: RiskBreakdown,
    pub contributing_factors: Vec<ContributingFactor>,
    pub recommendation: String,
    pub confidence: f64,
    pub assessment_timestamp: DateTime<Utc>,
}

// =============================================================================
// SCORING
// =============================================================================

/// Time-decayed mean severity of one category.
pub fn category_risk(points: &[&RiskDataPoint], now: DateTime<Utc>) -> f64 {
    if points.is_empty() {
        return 0.0;
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for point in points {
        let weight = f64::max(0.0, 1.0 - point.hours_ago(now) / DECAY_HORIZON_HOURS);
        weighted_sum += point.severity * weight;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return 0.0;
    }
    f64::min(1.0, weighted_sum / points.len() as f64)
}

/// Per-category breakdown with the weighted total.
pub fn breakdown(points: &[RiskDataPoint], now: DateTime<Utc>) -> RiskBreakdown {
    let of = |category: RiskCategory| -> Vec<&RiskDataPoint> {
        points.iter().filter(|p| p.category == category).collect()
    };

    let trade_news = category_risk(&of(RiskCategory::TradeNews), now);
    let political = category_risk(&of(RiskCategory::Political), now);
    let port_congestion = category_risk(&of(RiskCategory::PortCongestion), now);

    RiskBreakdown {
        trade_news,
        political,
        port_congestion,
        total: trade_news * TRADE_NEWS_WEIGHT
            + political * POLITICAL_WEIGHT
            + port_congestion * PORT_CONGESTION_WEIGHT,
    }
}

/// Overall score from the breakdown, bumped for critical and recent events.
pub fn overall_score(breakdown: &RiskBreakdown, points: &[RiskDataPoint], now: DateTime<Utc>) -> f64 {
    let mut multiplier: f64 = 1.0;

    let critical = points.iter().filter(|p| p.severity > CRITICAL_SEVERITY).count();
    if critical > 0 {
        multiplier = f64::min(1.2, 1.0 + critical as f64 * 0.05);
    }

    let recent_severe = points
        .iter()
        .any(|p| p.severity > RECENT_SEVERITY && p.hours_ago(now) < RECENT_WINDOW_HOURS);
    if recent_severe {
        multiplier = f64::min(1.3, multiplier + 0.1);
    }

    round_to(f64::min(1.0, breakdown.total * multiplier), 3)
}

/// Top observations by severity, then recency.
pub fn contributing_factors(points: &[RiskDataPoint], now: DateTime<Utc>) -> Vec<ContributingFactor> {
    let mut sorted: Vec<&RiskDataPoint> = points.iter().collect();
    sorted.sort_by(|a, b| {
        b.severity
            .total_cmp(&a.severity)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });

    sorted
        .into_iter()
        .take(MAX_FACTORS)
        .map(|p| ContributingFactor {
            category: p.category,
            title: p.title.clone(),
            description: p.description.clone(),
            severity: p.severity,
            location: p.location.clone(),
            hours_ago: round_to(p.hours_ago(now), 1),
            impact: RiskLevel::from_score(p.severity),
        })
        .collect()
}

/// Recommendation text for a level.
pub fn recommendation(level: RiskLevel, breakdown: &RiskBreakdown) -> String {
    match level {
        RiskLevel::Critical => "CRITICAL RISK: Immediate rerouting recommended. \
             Multiple high-severity risks detected. \
             Consider alternative routes or delay shipment."
            .to_string(),
        RiskLevel::High => format!(
            "HIGH RISK: Consider rerouting. Primary concern: {}. \
             Monitor closely and prepare alternative routes.",
            breakdown.primary_category().label()
        ),
        RiskLevel::Medium => "MEDIUM RISK: Monitor route conditions. \
             Some risks present but manageable. \
             Have contingency plans ready."
            .to_string(),
        RiskLevel::Low => "LOW RISK: Route appears safe. \
             Continue monitoring for any changes in conditions."
            .to_string(),
    }
}

/// Confidence from data volume and recency.
pub fn confidence(points: &[RiskDataPoint], now: DateTime<Utc>) -> f64 {
    if points.is_empty() {
        return 0.3;
    }
    let volume = f64::min(1.0, points.len() as f64 / 10.0);
    let recent = points
        .iter()
        .filter(|p| p.hours_ago(now) < RECENT_WINDOW_HOURS)
        .count();
    let recency = f64::min(1.0, recent as f64 / 5.0);
    round_to(volume * 0.6 + recency * 0.4, 2)
}

/// Assess a route from already-fetched data points.
pub fn assess(
    points: &[RiskDataPoint],
    origin: &str,
    destination: &str,
    route_id: Option<&str>,
    now: DateTime<Utc>,
) -> RiskAssessment {
    let breakdown = breakdown(points, now);
    let overall = overall_score(&breakdown, points, now);
    let level = RiskLevel::from_score(overall);

    RiskAssessment {
        route_id: route_id.map(str::to_string),
        origin: origin.to_string(),
        destination: destination.to_string(),
        overall_risk_score: overall,
        risk_level: level,
        breakdown,
        contributing_factors: contributing_factors(points, now),
        recommendation: recommendation(level, &breakdown),
        confidence: confidence(points, now),
        assessment_timestamp: now,
    }
}

/// Sort assessments from safest to riskiest.
pub fn rank_by_risk(assessments: &mut [RiskAssessment]) {
    assessments.sort_by(|a, b| a.overall_risk_score.total_cmp(&b.overall_risk_score));
}
