//! # Forecast
//!
//! Predicts where a route's risk is heading 3, 5 and 7 days out.
//!
//! Two sources feed a prediction: a statistical projection from the current
//! assessment, and (when the app has a generative endpoint) a JSON reply from
//! the model. A reply that cannot be parsed degrades to the statistical path.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::feeds::RiskDataPoint;
use crate::risk::{RiskAssessment, RiskLevel};
use crate::{ArkhamError, Result, clamp_unit, round_to};

/// Horizons used when the caller asks for none.
pub const DEFAULT_HORIZONS: [u32; 3] = [3, 5, 7];

/// Furthest horizon a forecast will project to.
pub const MAX_HORIZON_DAYS: u32 = 30;

/// Number of recent observations compared against the current score.
const TREND_SAMPLE: usize = 10;

/// Direction of a risk prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }

    /// Parse a trend label. Anything unrecognised is stable.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "increasing" => Self::Increasing,
            "decreasing" => Self::Decreasing,
            _ => Self::Stable,
        }
    }
}

/// One horizon of a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub days_ahead: u32,
    pub predicted_risk_score: f64,
    pub predicted_risk_level: RiskLevel,
    pub confidence: f64,
    pub trend: Trend,
    pub key_factors: Vec<String>,
    pub target_date: DateTime<Utc>,
}

/// Forecast across all requested horizons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictiveAssessment {
    pub route_id: Option<String>,
    pub origin: String,
    pub destination: String,
    pub current_risk_score: f64,
    pub predictions: Vec<Prediction>,
    pub overall_trend: Trend,
    pub recommendation: String,
    pub assessment_timestamp: DateTime<Utc>,
}

/// Requested horizons within `1..=MAX_HORIZON_DAYS`, or the defaults when
/// none remain.
pub fn horizons(requested: &[u32]) -> Vec<u32> {
    let kept: Vec<u32> = requested
        .iter()
        .copied()
        .filter(|days| (1..=MAX_HORIZON_DAYS).contains(days))
        .collect();
    if kept.is_empty() { DEFAULT_HORIZONS.to_vec() } else { kept }
}

/// Parse a comma-separated horizon list such as `"3,5,7"`.
///
/// Malformed input yields the defaults. Out-of-range horizons are dropped.
pub fn parse_horizons(raw: &str) -> Vec<u32> {
    let parsed: std::result::Result<Vec<u32>, _> = raw
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect();
    match parsed {
        Ok(days) => horizons(&days),
        Err(_) => DEFAULT_HORIZONS.to_vec(),
    }
}

/// `now` shifted forward by `days`, saturating at `now` when out of range.
fn target_date(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_add_signed(span))
        .unwrap_or(now)
}

// =============================================================================
// STATISTICAL PATH
// =============================================================================

/// Project the current score forward using the recent severity average.
pub fn predict_statistical(
    current: &RiskAssessment,
    history: &[RiskDataPoint],
    days_ahead: u32,
    now: DateTime<Utc>,
) -> Prediction {
    let current_score = current.overall_risk_score;

    let (trend, projected) = if history.is_empty() {
        (Trend::Stable, current_score)
    } else {
        let sample = &history[..history.len().min(TREND_SAMPLE)];
        let avg = sample.iter().map(|p| p.severity).sum::<f64>() / sample.len() as f64;
        if avg > current_score * 1.1 {
            (Trend::Increasing, f64::min(1.0, current_score * 1.15))
        } else if avg < current_score * 0.9 {
            (Trend::Decreasing, f64::max(0.0, current_score * 0.85))
        } else {
            (Trend::Stable, current_score)
        }
    };

    // uncertainty grows 2% per day
    let time_factor = clamp_unit(1.0 - f64::from(days_ahead) * 0.02);
    let score = round_to(
        clamp_unit(current_score * time_factor + projected * (1.0 - time_factor)),
        3,
    );
    let confidence = round_to(f64::max(0.5, 0.8 - f64::from(days_ahead) * 0.05), 2);

    Prediction {
        days_ahead,
        predicted_risk_score: score,
        predicted_risk_level: RiskLevel::from_score(score),
        confidence,
        trend,
        key_factors: current
            .contributing_factors
            .iter()
            .take(3)
            .map(|f| f.title.clone())
            .collect(),
        target_date: target_date(now, days_ahead),
    }
}

// =============================================================================
// MODEL PATH
// =============================================================================

#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(default = "default_model_score")]
    predicted_risk_score: f64,
    #[serde(default = "default_model_confidence")]
    confidence: f64,
    #[serde(default)]
    trend: Option<String>,
    #[serde(default)]
    key_factors: Vec<String>,
}

fn default_model_score() -> f64 {
    0.5
}

fn default_model_confidence() -> f64 {
    0.7
}

/// Extract the first flat `{...}` object from free-form model output.
fn first_json_object(text: &str) -> &str {
    if let Some(start) = text.find('{')
        && let Some(len) = text[start..].find('}')
    {
        return &text[start..=start + len];
    }
    text
}

/// Parse a model reply into a prediction.
pub fn parse_model_prediction(text: &str, days_ahead: u32, now: DateTime<Utc>) -> Result<Prediction> {
    let reply: ModelReply = serde_json::from_str(first_json_object(text))?;
    if !reply.predicted_risk_score.is_finite() {
        return Err(ArkhamError::InvalidInput(
            "model returned a non-finite risk score".to_string(),
        ));
    }

    let score = round_to(clamp_unit(reply.predicted_risk_score), 3);
    Ok(Prediction {
        days_ahead,
        predicted_risk_score: score,
        predicted_risk_level: RiskLevel::from_score(score),
        confidence: round_to(clamp_unit(reply.confidence), 2),
        trend: reply.trend.as_deref().map(Trend::parse).unwrap_or_default(),
        key_factors: reply.key_factors,
        target_date: target_date(now, days_ahead),
    })
}

/// Count of severe observations (>0.6) from the last 7 days.
pub fn recent_high_severity(history: &[RiskDataPoint], now: DateTime<Utc>) -> usize {
    history
        .iter()
        .filter(|p| p.severity > 0.6 && (now - p.timestamp).num_days() < 7)
        .count()
}

// =============================================================================
// AGGREGATION
// =============================================================================

/// Majority trend across predictions. Ties are stable.
pub fn overall_trend(predictions: &[Prediction]) -> Trend {
    let increasing = predictions.iter().filter(|p| p.trend == Trend::Increasing).count();
    let decreasing = predictions.iter().filter(|p| p.trend == Trend::Decreasing).count();
    match increasing.cmp(&decreasing) {
        std::cmp::Ordering::Greater => Trend::Increasing,
        std::cmp::Ordering::Less => Trend::Decreasing,
        std::cmp::Ordering::Equal => Trend::Stable,
    }
}

/// Recommendation driven by the worst prediction.
pub fn recommendation(predictions: &[Prediction], trend: Trend) -> String {
    let worst = predictions
        .iter()
        .max_by(|a, b| a.predicted_risk_score.total_cmp(&b.predicted_risk_score));

    match worst {
        Some(w) if w.predicted_risk_level == RiskLevel::Critical => format!(
            "CRITICAL RISK PREDICTED: Risk is predicted to reach critical levels ({:.2}) in {} days. \
             Immediate action required. Consider rerouting or delaying shipment.",
            w.predicted_risk_score, w.days_ahead
        ),
        Some(w) if w.predicted_risk_level == RiskLevel::High => {
            if trend == Trend::Increasing {
                format!(
                    "HIGH RISK TREND: Risk is increasing and predicted to reach {:.2} in {} days. \
                     Prepare alternative routes and monitor closely.",
                    w.predicted_risk_score, w.days_ahead
                )
            } else {
                "MODERATE RISK: Risk predicted to remain manageable. \
                 Monitor conditions and have contingency plans ready."
                    .to_string()
            }
        }
        _ if trend == Trend::Decreasing => "POSITIVE TREND: Risk is decreasing. \
             Current risk should improve over time. \
             Continue monitoring but conditions appear favorable."
            .to_string(),
        _ => "STABLE CONDITIONS: Risk levels predicted to remain relatively stable. \
             Continue standard monitoring procedures."
            .to_string(),
    }
}

/// Assemble a forecast from per-horizon predictions.
pub fn assemble(
    current: &RiskAssessment,
    predictions: Vec<Prediction>,
    now: DateTime<Utc>,
) -> PredictiveAssessment {
    let trend = overall_trend(&predictions);
    PredictiveAssessment {
        route_id: current.route_id.clone(),
        origin: current.origin.clone(),
        destination: current.destination.clone(),
        current_risk_score: current.overall_risk_score,
        recommendation: recommendation(&predictions, trend),
        predictions,
        overall_trend: trend,
        assessment_timestamp: now,
    }
}

/// Statistical forecast for every horizon.
pub fn predict(
    current: &RiskAssessment,
    history: &[RiskDataPoint],
    days_ahead: &[u32],
    now: DateTime<Utc>,
) -> PredictiveAssessment {
    let predictions = horizons(days_ahead)
        .into_iter()
        .map(|days| predict_statistical(current, history, days, now))
        .collect();
    assemble(current, predictions, now)
}
