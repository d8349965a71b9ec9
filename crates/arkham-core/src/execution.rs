//! # Execution
//!
//! Decides when a shipment gets rerouted and walks the resulting action
//! through its lifecycle:
//!
//! ```text
//! pending ──(approve)──► approved ──► executing ──► completed
//!                                          └──────► failed
//! ```
//!
//! Every transition is written to the [`Journal`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::ArkhamError;
use crate::journal::Journal;
use crate::optimizer::OptimizationResult;
use crate::risk::RiskAssessment;

/// Risk at which the agent reroutes on its own.
pub const AUTO_EXECUTE_THRESHOLD: f64 = 0.75;
/// Risk at which alternatives are worth looking at.
pub const REVIEW_THRESHOLD: f64 = 0.50;
/// Reduction at which semi-automatic mode approves without a human.
pub const AUTO_APPROVE_REDUCTION: f64 = 0.50;
/// Smallest reduction worth a reroute.
pub const MIN_RISK_REDUCTION: f64 = 0.20;

/// Who executes the actions.
pub const EXECUTED_BY: &str = "arkham_ai";
/// The only action type the agent creates.
pub const REROUTE: &str = "reroute";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Approved,
    Executing,
    Completed,
    Failed,
    Rejected,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }
}

/// How much autonomy the agent has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Automatic,
    Manual,
    #[default]
    SemiAutomatic,
}

impl ExecutionMode {
    /// Parse a mode. Unknown strings are semi-automatic.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "automatic" => Self::Automatic,
            "manual" => Self::Manual,
            _ => Self::SemiAutomatic,
        }
    }

    /// Initial status of an action created under this mode.
    pub fn initial_status(self, reduction: f64) -> ExecutionStatus {
        match self {
            Self::Automatic => ExecutionStatus::Approved,
            Self::SemiAutomatic if reduction >= AUTO_APPROVE_REDUCTION => ExecutionStatus::Approved,
            _ => ExecutionStatus::Pending,
        }
    }
}

/// A decided change to a shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionAction {
    pub action_id: String,
    pub action_type: String,
    pub shipment_id: String,
    pub original_route_id: String,
    pub new_route_id: Option<String>,
    pub reason: String,
    pub risk_score_before: f64,
    pub risk_score_after: f64,
    pub estimated_impact: Map<String, Value>,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub executed_by: String,
    pub metadata: Map<String, Value>,
}

impl ExecutionAction {
    /// New reroute action in the pending state.
    pub fn reroute(
        shipment_id: &str,
        new_route_id: &str,
        risk_before: f64,
        risk_after: f64,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            action_id: action_id(shipment_id, now),
            action_type: REROUTE.to_string(),
            shipment_id: shipment_id.to_string(),
            original_route_id: shipment_route_id(shipment_id),
            new_route_id: Some(new_route_id.to_string()),
            reason: reason.into(),
            risk_score_before: risk_before,
            risk_score_after: risk_after,
            estimated_impact: Map::new(),
            status: ExecutionStatus::Pending,
            created_at: now,
            executed_at: None,
            executed_by: EXECUTED_BY.to_string(),
            metadata: Map::new(),
        }
    }

    pub fn risk_reduction(&self) -> f64 {
        self.risk_score_before - self.risk_score_after
    }
}

/// Outcome of trying to execute an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub action: ExecutionAction,
    pub success: bool,
    pub message: String,
    pub execution_timestamp: DateTime<Utc>,
    pub details: Map<String, Value>,
}

/// `EXEC-{shipment}-{YYYYmmddHHMMSS}`.
pub fn action_id(shipment_id: &str, now: DateTime<Utc>) -> String {
    format!("EXEC-{shipment_id}-{}", now.format("%Y%m%d%H%M%S"))
}

/// Route id a shipment is tracked under: `SHIP-{shipment}`.
pub fn shipment_route_id(shipment_id: &str) -> String {
    format!("SHIP-{shipment_id}")
}

/// Whether a risk score is high enough to look for alternatives.
pub fn requires_optimization(risk_score: f64) -> bool {
    risk_score >= REVIEW_THRESHOLD
}

/// Reroute action with status and impact set for `mode`.
pub fn create_reroute_action(
    shipment_id: &str,
    new_route_id: &str,
    current_risk: f64,
    new_risk: f64,
    reason: impl Into<String>,
    mode: ExecutionMode,
    now: DateTime<Utc>,
) -> ExecutionAction {
    let reduction = current_risk - new_risk;
    let percent = if current_risk > 0.0 {
        reduction / current_risk * 100.0
    } else {
        0.0
    };

    let mut action = ExecutionAction::reroute(shipment_id, new_route_id, current_risk, new_risk, reason, now);
    action.estimated_impact = impact(json!({
        "risk_reduction": reduction,
        "risk_reduction_percent": percent,
    }));
    action.status = mode.initial_status(reduction);
    action
}

/// Run an approved action to completion.
///
/// Actions in any other state are left untouched and reported as failures.
pub fn execute(mut action: ExecutionAction, journal: &mut Journal, now: DateTime<Utc>) -> ExecutionResult {
    if action.status != ExecutionStatus::Approved {
        let status = action.status.as_str();
        return ExecutionResult {
            message: ArkhamError::NotApproved(status.to_string()).to_string(),
            details: impact(json!({ "status": status })),
            success: false,
            execution_timestamp: now,
            action,
        };
    }

    action.status = ExecutionStatus::Executing;
    action.executed_at = Some(now);
    journal.execution(
        now,
        &action.action_id,
        &action.action_type,
        &action.shipment_id,
        ExecutionStatus::Executing,
        json!({
            "original_route": action.original_route_id,
            "new_route": action.new_route_id,
            "risk_before": action.risk_score_before,
            "risk_after": action.risk_score_after,
        }),
    );

    // hand-off to logistics systems is simulated
    action.status = ExecutionStatus::Completed;
    journal.execution(
        now,
        &action.action_id,
        &action.action_type,
        &action.shipment_id,
        ExecutionStatus::Completed,
        json!({ "executed_at": now }),
    );

    ExecutionResult {
        message: format!(
            "Successfully executed {} for shipment {}",
            action.action_type, action.shipment_id
        ),
        details: impact(json!({
            "action_id": action.action_id,
            "risk_reduction": action.risk_reduction(),
            "executed_at": now,
        })),
        success: true,
        execution_timestamp: now,
        action,
    }
}

/// Decide whether a monitored shipment needs a reroute.
///
/// `optimization` must be the risk-priority optimization of the shipment's
/// route when [`requires_optimization`] holds for `current`; it is ignored
/// otherwise.
pub fn monitor(
    shipment_id: &str,
    current: &RiskAssessment,
    optimization: Option<&OptimizationResult>,
    mode: ExecutionMode,
    journal: &mut Journal,
    now: DateTime<Utc>,
) -> Option<ExecutionAction> {
    let current_risk = current.overall_risk_score;
    let best = optimization.and_then(OptimizationResult::best);

    if current_risk >= AUTO_EXECUTE_THRESHOLD {
        let best = best?;
        let new_risk = best.metrics.risk_score;
        let reduction = current_risk - new_risk;
        if reduction < MIN_RISK_REDUCTION {
            return None;
        }

        let action = create_reroute_action(
            shipment_id,
            &best.route_id,
            current_risk,
            new_risk,
            format!(
                "CRITICAL RISK DETECTED: Risk {current_risk:.2} exceeds threshold. \
                 Rerouting to reduce risk to {new_risk:.2} (reduction: {reduction:.2})"
            ),
            mode,
            now,
        );
        if action.status == ExecutionStatus::Approved {
            return Some(execute(action, journal, now).action);
        }
        return Some(action);
    }

    if requires_optimization(current_risk)
        && let Some(best) = best
        && let Some(result) = optimization
    {
        let new_risk = best.metrics.risk_score;
        if current_risk - new_risk >= MIN_RISK_REDUCTION {
            return Some(create_reroute_action(
                shipment_id,
                &best.route_id,
                current_risk,
                new_risk,
                result.recommendation.clone(),
                mode,
                now,
            ));
        }
    }

    journal.monitoring(
        now,
        shipment_id,
        current_risk,
        current.risk_level.as_str(),
        "none",
        "Risk below threshold",
    );
    None
}

/// Operator-requested reroute onto `new_route_id`.
///
/// The request itself is the approval, so the action is created approved
/// and executed immediately.
pub fn execute_reroute(
    shipment_id: &str,
    new_route_id: &str,
    original: &RiskAssessment,
    new: &RiskAssessment,
    reason: Option<&str>,
    journal: &mut Journal,
    now: DateTime<Utc>,
) -> ExecutionResult {
    let mut action = ExecutionAction::reroute(
        shipment_id,
        new_route_id,
        original.overall_risk_score,
        new.overall_risk_score,
        reason.unwrap_or("Risk mitigation reroute"),
        now,
    );
    action.estimated_impact = impact(json!({
        "risk_reduction": original.overall_risk_score - new.overall_risk_score,
        "cost_delta": 0,
        "time_delta": 0,
    }));
    action.status = ExecutionStatus::Approved;
    execute(action, journal, now)
}

fn impact(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
