//! Agent orchestration.
//!
//! Glues ingestion, the core scoring pipeline, the generative endpoint and
//! the ledger together. Every model call has a deterministic fallback:
//!
//! - agent query: the mock reply
//! - predictions: the statistical projection
//! - optimization and dashboard recommendations: the rule-based text
//!
//! Locks are never held across an upstream call.

use std::sync::Arc;

use arkham_core::execution::{self, ExecutionAction, ExecutionMode, ExecutionResult};
use arkham_core::forecast::{self, DEFAULT_HORIZONS, Prediction, PredictiveAssessment};
use arkham_core::optimizer::{
    self, Candidate, OptimizationPriority, OptimizationResult, OptimizedRoute, Weights,
};
use arkham_core::prompts;
use arkham_core::risk::{self, RiskAssessment};
use arkham_core::storage::Collection;
use arkham_core::RiskDataPoint;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::clients::{AcledClient, GenAiClient, genai};
use crate::ingestion::Ingestion;
use crate::ledger::Ledger;
use crate::{AppError, AppResult, Config};

/// Alternatives considered when monitoring decides to look for a reroute.
pub const MONITOR_MAX_ALTERNATIVES: usize = 3;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub initialized: bool,
    pub project: String,
    pub location: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryReply {
    pub success: bool,
    pub response: String,
    pub agent: String,
}

/// A route to assess: endpoints plus any extra regions it crosses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteQuery {
    pub origin: String,
    pub destination: String,
    pub regions: Vec<String>,
    pub route_id: Option<String>,
}

impl RouteQuery {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn regions(mut self, regions: Vec<String>) -> Self {
        self.regions = regions;
        self
    }

    #[must_use]
    pub fn route_id(mut self, route_id: Option<String>) -> Self {
        self.route_id = route_id;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeRequest {
    pub origin: String,
    pub destination: String,
    pub priority: OptimizationPriority,
    pub weights: Option<Weights>,
    pub include_predictions: bool,
    pub max_alternatives: usize,
    pub shipment_id: Option<String>,
}

impl OptimizeRequest {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            priority: OptimizationPriority::default(),
            weights: None,
            include_predictions: true,
            max_alternatives: optimizer::DEFAULT_MAX_ALTERNATIVES,
            shipment_id: None,
        }
    }
}

// =============================================================================
// AGENT
// =============================================================================

#[derive(Debug)]
pub struct Agent {
    name: String,
    project: String,
    location: String,
    genai: GenAiClient,
    acled: Arc<AcledClient>,
    ingestion: Ingestion,
    ledger: Arc<Ledger>,
}

impl Agent {
    pub fn new(config: &Config, ledger: Arc<Ledger>) -> AppResult<Self> {
        let acled = Arc::new(AcledClient::new(
            &config.acled_base_url,
            config.acled_username.clone(),
            config.acled_password.clone(),
        )?);
        let genai = GenAiClient::new(&config.genai_base_url, config.genai_api_key.clone())?;
        if !genai.is_configured() {
            info!("no generative AI key configured, using mock agent and rule-based recommendations");
        }

        Ok(Self {
            name: config.agent_name.clone(),
            project: config.project.clone(),
            location: config.location.clone(),
            ingestion: Ingestion::new(config, Arc::clone(&acled), Arc::clone(&ledger))?,
            genai,
            acled,
            ledger,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn acled(&self) -> &AcledClient {
        &self.acled
    }

    pub fn ingestion(&self) -> &Ingestion {
        &self.ingestion
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name.clone(),
            initialized: self.genai.is_configured(),
            project: self.project.clone(),
            location: self.location.clone(),
            model: genai::MODEL.to_string(),
        }
    }

    /// Free-form question to the model.
    pub async fn query(&self, message: &str, user_id: &str) -> QueryReply {
        let (response, answered) = if self.genai.is_configured() {
            match self.genai.generate(message).await {
                Ok(text) => (text, true),
                Err(e) => {
                    warn!(error = %e, "agent query failed, using mock reply");
                    (prompts::mock_agent_reply(message), false)
                }
            }
        } else {
            (prompts::mock_agent_reply(message), true)
        };

        let now = Utc::now();
        self.ledger
            .record(|j| j.agent_query(now, user_id, message, &response, answered))
            .await;

        QueryReply {
            success: true,
            response,
            agent: self.name.clone(),
        }
    }

    // =========================================================================
    // RISK
    // =========================================================================

    /// Assessment plus the data it was computed from.
    async fn evaluate(&self, route: &RouteQuery) -> (Vec<RiskDataPoint>, RiskAssessment) {
        let points = self
            .ingestion
            .for_route(&route.origin, &route.destination, &route.regions)
            .await;
        let assessment = risk::assess(
            &points,
            &route.origin,
            &route.destination,
            route.route_id.as_deref(),
            Utc::now(),
        );
        (points, assessment)
    }

    /// Assess a route, journal the result and persist it.
    pub async fn assess(&self, route: &RouteQuery) -> RiskAssessment {
        let (_, assessment) = self.evaluate(route).await;
        let now = Utc::now();
        self.ledger.record(|j| j.risk_assessment(now, &assessment, None)).await;
        self.ledger.save(Collection::Assessments, &assessment);
        assessment
    }

    /// Assess several routes, safest first.
    pub async fn compare(&self, routes: &[RouteQuery]) -> Vec<RiskAssessment> {
        let mut assessments = Vec::with_capacity(routes.len());
        for route in routes {
            assessments.push(self.assess(route).await);
        }
        risk::rank_by_risk(&mut assessments);
        assessments
    }

    // =========================================================================
    // FORECAST
    // =========================================================================

    /// Forecast a route over `days_ahead` (defaults when empty).
    pub async fn predict(&self, route: &RouteQuery, days_ahead: &[u32]) -> PredictiveAssessment {
        let (history, current) = self.evaluate(route).await;
        let now = Utc::now();

        let mut predictions = Vec::new();
        for days in forecast::horizons(days_ahead) {
            predictions.push(self.predict_horizon(&current, &history, days, now).await);
        }
        let assessment = forecast::assemble(&current, predictions, now);

        let route_id = route.route_id.as_deref().unwrap_or("unknown");
        self.ledger
            .record(|j| {
                for p in &assessment.predictions {
                    j.prediction(now, route_id, p);
                }
            })
            .await;
        assessment
    }

    async fn predict_horizon(
        &self,
        current: &RiskAssessment,
        history: &[RiskDataPoint],
        days: u32,
        now: DateTime<Utc>,
    ) -> Prediction {
        if !self.genai.is_configured() {
            return forecast::predict_statistical(current, history, days, now);
        }

        let prompt = prompts::prediction_prompt(current, history, days, now);
        let reply = match self.genai.generate(&prompt).await {
            Ok(text) => forecast::parse_model_prediction(&text, days, now).map_err(AppError::from),
            Err(e) => Err(e),
        };
        match reply {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!(days, error = %e, "model prediction failed, using statistical projection");
                forecast::predict_statistical(current, history, days, now)
            }
        }
    }

    // =========================================================================
    // OPTIMIZATION
    // =========================================================================

    async fn assess_candidate(&self, candidate: Candidate, include_predictions: bool) -> OptimizedRoute {
        let query = RouteQuery::new(candidate.origin.clone(), candidate.destination.clone())
            .regions(candidate.regions())
            .route_id(Some(candidate.route_id.clone()));
        let (history, assessment) = self.evaluate(&query).await;

        let mut route = candidate.assessed(assessment);
        if include_predictions {
            route.predictive_assessment = Some(forecast::predict(
                &route.risk_assessment,
                &history,
                &DEFAULT_HORIZONS,
                Utc::now(),
            ));
        }
        route
    }

    /// Rank alternatives for a route by weighted risk, cost and time.
    pub async fn optimize(&self, request: &OptimizeRequest) -> OptimizationResult {
        let weights = optimizer::resolve_weights(request.priority, request.weights);

        let original = self
            .assess_candidate(
                optimizer::original(&request.origin, &request.destination),
                request.include_predictions,
            )
            .await;
        let mut alternatives = Vec::new();
        for candidate in optimizer::alternatives(&request.origin, &request.destination) {
            alternatives.push(self.assess_candidate(candidate, request.include_predictions).await);
        }

        let (original, ranked) = optimizer::rank(original, alternatives, &weights, request.max_alternatives);
        let recommendation = self.optimization_recommendation(&original, ranked.first()).await;

        let now = Utc::now();
        self.ledger
            .record(|j| {
                j.optimization(
                    now,
                    &original.route_id,
                    &ranked,
                    &recommendation,
                    request.shipment_id.as_deref(),
                );
            })
            .await;

        OptimizationResult {
            original_route: original,
            optimized_routes: ranked,
            optimization_criteria: weights,
            recommendation,
            optimization_timestamp: now,
        }
    }

    async fn optimization_recommendation(
        &self,
        original: &OptimizedRoute,
        best: Option<&OptimizedRoute>,
    ) -> String {
        let Some(best) = best else {
            return optimizer::NO_ALTERNATIVES.to_string();
        };
        if !self.genai.is_configured() {
            return optimizer::fallback_recommendation(original, Some(best));
        }

        match self.genai.generate(&prompts::optimization_prompt(original, best)).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "model recommendation failed, using rule-based text");
                optimizer::fallback_recommendation(original, Some(best))
            }
        }
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    /// Check a shipment and decide on (and possibly run) a reroute.
    pub async fn monitor(
        &self,
        shipment_id: &str,
        route: &RouteQuery,
        mode: ExecutionMode,
    ) -> Option<ExecutionAction> {
        let query = route
            .clone()
            .route_id(Some(execution::shipment_route_id(shipment_id)));
        let (_, current) = self.evaluate(&query).await;

        let optimization = if execution::requires_optimization(current.overall_risk_score) {
            let mut request = OptimizeRequest::new(route.origin.clone(), route.destination.clone());
            request.priority = OptimizationPriority::Risk;
            request.max_alternatives = MONITOR_MAX_ALTERNATIVES;
            request.shipment_id = Some(shipment_id.to_string());
            Some(self.optimize(&request).await)
        } else {
            None
        };

        let now = Utc::now();
        let action = self
            .ledger
            .record(|j| execution::monitor(shipment_id, &current, optimization.as_ref(), mode, j, now))
            .await;
        if let Some(action) = &action {
            info!(
                action_id = %action.action_id,
                status = action.status.as_str(),
                "monitoring triggered an action"
            );
            self.ledger.save(Collection::Executions, action);
        }
        action
    }

    /// Operator-requested reroute onto `new_route_id`.
    pub async fn execute_reroute(
        &self,
        shipment_id: &str,
        new_route_id: &str,
        route: &RouteQuery,
        reason: Option<&str>,
    ) -> ExecutionResult {
        let (_, new) = self
            .evaluate(&route.clone().route_id(Some(new_route_id.to_string())))
            .await;
        let (_, original) = self
            .evaluate(&route.clone().route_id(Some(execution::shipment_route_id(shipment_id))))
            .await;

        let now = Utc::now();
        let result = self
            .ledger
            .record(|j| execution::execute_reroute(shipment_id, new_route_id, &original, &new, reason, j, now))
            .await;
        self.ledger.save(Collection::Executions, &result.action);
        result
    }

    // =========================================================================
    // DASHBOARD
    // =========================================================================

    /// Model-written recommendation for a disruption, or `canned` on any
    /// failure.
    pub async fn dashboard_recommendation(&self, prompt: &str, canned: String) -> String {
        if !self.genai.is_configured() {
            return canned;
        }
        match self.genai.generate(prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "disruption recommendation failed, using canned text");
                canned
            }
        }
    }
}
