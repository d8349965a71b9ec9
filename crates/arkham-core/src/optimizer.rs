//! # Route Optimizer
//!
//! Balances risk, cost and time across a candidate set.
//!
//! The optimizer never fetches data itself. The caller assesses each
//! [`Candidate`] (risk data is an I/O concern) and hands the assessed routes
//! back to [`rank`], which scores them and picks the alternatives.
//!
//! ```text
//! score = risk·w_risk + norm(cost)·w_cost + norm(time)·w_time   (lower wins)
//! norm(cost) = clamp((cost − 5000) / 45000)
//! norm(time) = clamp((days − 10) / 20)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::waypoint_regions;
use crate::forecast::PredictiveAssessment;
use crate::risk::RiskAssessment;
use crate::{clamp_unit, round_to};

/// Route id given to the route being optimized away from.
pub const ORIGINAL_ROUTE_ID: &str = "ORIGINAL";
/// Alternatives returned when the caller does not say.
pub const DEFAULT_MAX_ALTERNATIVES: usize = 5;

const MIN_COST_USD: f64 = 5_000.0;
const MAX_COST_USD: f64 = 50_000.0;
const MIN_TIME_DAYS: f64 = 10.0;
const MAX_TIME_DAYS: f64 = 30.0;

// =============================================================================
// WEIGHTS
// =============================================================================

/// What the caller cares about most.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationPriority {
    Risk,
    Cost,
    Time,
    #[default]
    Balanced,
}

impl OptimizationPriority {
    /// Parse a priority. Unknown strings are balanced.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "risk" => Self::Risk,
            "cost" => Self::Cost,
            "time" => Self::Time,
            _ => Self::Balanced,
        }
    }

    pub fn weights(self) -> Weights {
        match self {
            Self::Risk => Weights::new(0.70, 0.15, 0.15),
            Self::Cost => Weights::new(0.20, 0.60, 0.20),
            Self::Time => Weights::new(0.20, 0.20, 0.60),
            Self::Balanced => Weights::new(0.50, 0.30, 0.20),
        }
    }
}

/// Relative weight of each objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    #[serde(default)]
    pub risk: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub time: f64,
}

impl Weights {
    pub const fn new(risk: f64, cost: f64, time: f64) -> Self {
        Self { risk, cost, time }
    }

    fn sum(&self) -> f64 {
        self.risk + self.cost + self.time
    }
}

/// Effective weights: custom weights normalized to sum 1, or the priority's.
pub fn resolve_weights(priority: OptimizationPriority, custom: Option<Weights>) -> Weights {
    match custom {
        Some(w) if w.sum().is_finite() && w.sum() > 0.0 => {
            let total = w.sum();
            Weights::new(w.risk / total, w.cost / total, w.time / total)
        }
        _ => priority.weights(),
    }
}

// =============================================================================
// ROUTES
// =============================================================================

/// Physical and commercial measures of a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub risk_score: f64,
    pub cost_usd: f64,
    pub time_days: f64,
    pub distance_km: f64,
    pub port_calls: u32,
}

/// An unassessed route option.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub route_id: String,
    pub origin: String,
    pub destination: String,
    pub waypoints: Vec<String>,
    pub route_regions: Vec<String>,
    /// Authored metrics. `None` means estimate from distance.
    pub metrics: Option<RouteMetrics>,
}

impl Candidate {
    /// Regions to pull risk data for: authored regions plus waypoint regions.
    pub fn regions(&self) -> Vec<String> {
        let mut regions = self.route_regions.clone();
        for region in waypoint_regions(&self.waypoints) {
            if !regions.contains(&region) {
                regions.push(region);
            }
        }
        regions
    }

    /// Attach an assessment, producing a scorable route.
    pub fn assessed(self, assessment: RiskAssessment) -> OptimizedRoute {
        let mut metrics = self
            .metrics
            .unwrap_or_else(|| estimate_metrics(&self.origin, &self.destination, &self.waypoints));
        metrics.risk_score = assessment.overall_risk_score;

        OptimizedRoute {
            route_id: self.route_id,
            origin: self.origin,
            destination: self.destination,
            waypoints: self.waypoints,
            metrics,
            risk_assessment: assessment,
            predictive_assessment: None,
            optimization_score: 0.0,
            rank: 0,
        }
    }
}

/// An assessed, scored and ranked route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedRoute {
    pub route_id: String,
    pub origin: String,
    pub destination: String,
    pub waypoints: Vec<String>,
    pub metrics: RouteMetrics,
    pub risk_assessment: RiskAssessment,
    pub predictive_assessment: Option<PredictiveAssessment>,
    pub optimization_score: f64,
    pub rank: usize,
}

/// Result of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub original_route: OptimizedRoute,
    pub optimized_routes: Vec<OptimizedRoute>,
    pub optimization_criteria: Weights,
    pub recommendation: String,
    pub optimization_timestamp: DateTime<Utc>,
}

impl OptimizationResult {
    /// Best-ranked alternative, if any.
    pub fn best(&self) -> Option<&OptimizedRoute> {
        self.optimized_routes.first()
    }
}

/// The route being optimized away from.
pub fn original(origin: &str, destination: &str) -> Candidate {
    Candidate {
        route_id: ORIGINAL_ROUTE_ID.to_string(),
        origin: origin.to_string(),
        destination: destination.to_string(),
        waypoints: Vec::new(),
        route_regions: Vec::new(),
        metrics: None,
    }
}

struct AuthoredAlternative {
    route_id: &'static str,
    waypoint: &'static str,
    regions: &'static [&'static str],
    cost_usd: f64,
    time_days: f64,
    distance_km: f64,
}

const TAIWAN_LA_ALTERNATIVES: &[AuthoredAlternative] = &[
    AuthoredAlternative {
        route_id: "TW-VN-LA",
        waypoint: "Port of Ho Chi Minh City, Vietnam",
        regions: &["taiwan", "vietnam", "south china sea", "pacific"],
        cost_usd: 15_000.0,
        time_days: 15.0,
        distance_km: 12_000.0,
    },
    AuthoredAlternative {
        route_id: "TW-JP-LA",
        waypoint: "Port of Tokyo, Japan",
        regions: &["taiwan", "japan", "pacific"],
        cost_usd: 25_000.0,
        time_days: 16.0,
        distance_km: 11_000.0,
    },
    AuthoredAlternative {
        route_id: "TW-SG-LA",
        waypoint: "Port of Singapore, Singapore",
        regions: &["taiwan", "singapore", "south china sea", "pacific"],
        cost_usd: 18_000.0,
        time_days: 17.0,
        distance_km: 14_000.0,
    },
    AuthoredAlternative {
        route_id: "TW-SH-LA",
        waypoint: "Port of Shanghai, China",
        regions: &["taiwan", "china", "pacific"],
        cost_usd: 12_000.0,
        time_days: 16.0,
        distance_km: 11_500.0,
    },
];

/// Alternative routes for an origin/destination pair.
///
/// Taiwan to Los Angeles has four authored alternatives; any other pair gets
/// three generic ones.
pub fn alternatives(origin: &str, destination: &str) -> Vec<Candidate> {
    let o = origin.to_lowercase();
    let d = destination.to_lowercase();

    if o.contains("taiwan") && d.contains("los angeles") {
        return TAIWAN_LA_ALTERNATIVES
            .iter()
            .map(|alt| Candidate {
                route_id: alt.route_id.to_string(),
                origin: origin.to_string(),
                destination: destination.to_string(),
                waypoints: vec![alt.waypoint.to_string()],
                route_regions: alt.regions.iter().map(|r| (*r).to_string()).collect(),
                metrics: Some(RouteMetrics {
                    risk_score: 0.0,
                    cost_usd: alt.cost_usd,
                    time_days: alt.time_days,
                    distance_km: alt.distance_km,
                    port_calls: 3,
                }),
            })
            .collect();
    }

    (1..=3u32)
        .map(|i| Candidate {
            route_id: format!("ALT-{i:03}"),
            origin: origin.to_string(),
            destination: destination.to_string(),
            waypoints: Vec::new(),
            route_regions: Vec::new(),
            metrics: Some(RouteMetrics {
                risk_score: 0.0,
                cost_usd: 10_000.0 + f64::from(i) * 2_000.0,
                time_days: 14.0 + f64::from(i),
                distance_km: 10_000.0 + f64::from(i) * 500.0,
                port_calls: 2,
            }),
        })
        .collect()
}

/// Distance-based estimate for a route without authored metrics.
pub fn estimate_metrics(origin: &str, destination: &str, waypoints: &[String]) -> RouteMetrics {
    let base_km = match (origin, destination) {
        ("Taiwan", "Los Angeles") => 11_000.0,
        ("Vietnam", "Los Angeles") => 12_000.0,
        ("Japan", "Los Angeles") => 9_000.0,
        ("Singapore", "Los Angeles") => 14_000.0,
        _ => 10_000.0,
    };
    let distance_km = base_km + waypoints.len() as f64 * 500.0;
    let port_calls = waypoints.len() as u32 + 2;

    RouteMetrics {
        risk_score: 0.0,
        // km → nautical miles at 20 knots
        time_days: distance_km / 1852.0 / 20.0 / 24.0,
        cost_usd: distance_km + f64::from(port_calls) * 500.0,
        distance_km,
        port_calls,
    }
}

// =============================================================================
// SCORING
// =============================================================================

/// Weighted optimization score, lower is better.
pub fn score(metrics: &RouteMetrics, weights: &Weights) -> f64 {
    let cost = clamp_unit((metrics.cost_usd - MIN_COST_USD) / (MAX_COST_USD - MIN_COST_USD));
    let time = clamp_unit((metrics.time_days - MIN_TIME_DAYS) / (MAX_TIME_DAYS - MIN_TIME_DAYS));
    round_to(
        metrics.risk_score * weights.risk + cost * weights.cost + time * weights.time,
        4,
    )
}

/// Score and rank the original plus its alternatives.
///
/// Returns the scored original and up to `max_alternatives` alternatives in
/// rank order. Ranks count the original, so the best alternative can be
/// rank 2.
pub fn rank(
    mut original: OptimizedRoute,
    mut alternatives: Vec<OptimizedRoute>,
    weights: &Weights,
    max_alternatives: usize,
) -> (OptimizedRoute, Vec<OptimizedRoute>) {
    original.optimization_score = score(&original.metrics, weights);
    for route in &mut alternatives {
        route.optimization_score = score(&route.metrics, weights);
    }
    alternatives.sort_by(|a, b| a.optimization_score.total_cmp(&b.optimization_score));

    // the original wins ties
    let ahead = alternatives
        .iter()
        .filter(|r| r.optimization_score < original.optimization_score)
        .count();
    original.rank = ahead + 1;
    for (idx, route) in alternatives.iter_mut().enumerate() {
        route.rank = if idx < ahead { idx + 1 } else { idx + 2 };
    }

    alternatives.truncate(max_alternatives);
    (original, alternatives)
}

// =============================================================================
// RECOMMENDATION
// =============================================================================

/// Recommendation used when no alternatives exist.
pub const NO_ALTERNATIVES: &str = "No alternative routes found. Current route is the only option.";

/// Group thousands: `12345.6` → `"12,346"`.
pub fn thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0.0 {
        format!("-{out}")
    } else {
        out
    }
}

/// Signed dollar delta: `$+4,000`, `$-1,000`.
pub fn signed_usd(value: f64) -> String {
    let sign = if value.round() < 0.0 { "" } else { "+" };
    format!("${sign}{}", thousands(value))
}

/// Rule-based recommendation comparing the original with the best alternative.
pub fn fallback_recommendation(original: &OptimizedRoute, best: Option<&OptimizedRoute>) -> String {
    let Some(best) = best else {
        return NO_ALTERNATIVES.to_string();
    };

    let improvement = original.metrics.risk_score - best.metrics.risk_score;
    let cost_delta = best.metrics.cost_usd - original.metrics.cost_usd;
    let time_delta = best.metrics.time_days - original.metrics.time_days;

    if improvement > 0.2 {
        format!(
            "STRONGLY RECOMMENDED: Reroute via {}. Risk reduction: {:.2} ({:.2} → {:.2}). \
             Cost impact: {}. Time impact: {:+.1} days.",
            best.route_id,
            improvement,
            original.metrics.risk_score,
            best.metrics.risk_score,
            signed_usd(cost_delta),
            time_delta
        )
    } else if improvement > 0.1 {
        format!(
            "RECOMMENDED: Consider rerouting via {}. Risk reduction: {:.2}. \
             Cost impact: {}. Time impact: {:+.1} days.",
            best.route_id,
            improvement,
            signed_usd(cost_delta),
            time_delta
        )
    } else if best.optimization_score < original.optimization_score {
        format!(
            "OPTIONAL: Alternative route via {} offers better overall optimization. \
             Risk: {:.2} vs {:.2}. Cost: ${} vs ${}. Time: {:.1} vs {:.1} days.",
            best.route_id,
            best.metrics.risk_score,
            original.metrics.risk_score,
            thousands(best.metrics.cost_usd),
            thousands(original.metrics.cost_usd),
            best.metrics.time_days,
            original.metrics.time_days
        )
    } else {
        "CURRENT ROUTE OPTIMAL: Current route appears to be the best option \
         based on the selected optimization criteria."
            .to_string()
    }
}
