//! Prompt text sent to the generative endpoint.

use chrono::{DateTime, Utc};

use crate::dashboard::Dashboard;
use crate::feeds::RiskDataPoint;
use crate::forecast::recent_high_severity;
use crate::optimizer::{OptimizedRoute, signed_usd, thousands};
use crate::risk::RiskAssessment;

/// Standing instruction for every agent conversation.
pub const SYSTEM_INSTRUCTION: &str = "You are Arkham AI, an autonomous supply chain rerouting agent.

Your primary responsibilities:
1. Monitor geopolitical risks and trade disruptions in real-time
2. Assess risk levels for shipping routes using multiple data sources
3. Predict risk levels 3-7 days ahead using predictive analytics
4. Optimize routes by balancing risk, cost, and time
5. Automatically execute route changes when high risk is detected
6. Provide clear explanations for rerouting decisions

When analyzing routes, consider:
- Current geopolitical tensions and trade policies
- Port congestion and operational status
- Historical risk patterns
- Cost implications of route changes
- Time-to-delivery impacts

Always prioritize safety and reliability while minimizing disruption to supply chains.";

/// Reply used when no model is configured.
pub fn mock_agent_reply(message: &str) -> String {
    format!(
        "[Mock Agent] Received query: {message}. \
         ADK agent not available - using mock response for development."
    )
}

/// Ask for a JSON forecast `days_ahead` days out.
pub fn prediction_prompt(
    current: &RiskAssessment,
    history: &[RiskDataPoint],
    days_ahead: u32,
    now: DateTime<Utc>,
) -> String {
    let factors: Vec<String> = current
        .contributing_factors
        .iter()
        .take(5)
        .map(|f| format!("- {}: {} (severity: {:.2})", f.category.as_str(), f.title, f.severity))
        .collect();

    format!(
        "You are a supply chain risk prediction expert. Analyze the following risk data and \
predict the risk level {days} days into the future.

Current Risk Assessment:
- Overall Risk Score: {score:.2}
- Risk Level: {level}
- Route: {origin} → {destination}

Current Risk Factors:
{factors}

Risk Breakdown:
- Trade News Risk: {trade:.2}
- Political Risk: {political:.2}
- Port Congestion Risk: {port:.2}

Recent High-Severity Events (last 7 days): {recent}

Based on this data, predict the risk level {days} days from now. Consider:
1. Current trends and patterns
2. Historical risk patterns for similar routes
3. Geopolitical and trade dynamics
4. Port congestion patterns

Provide your prediction in the following JSON format:
{{
    \"predicted_risk_score\": <float between 0.0 and 1.0>,
    \"confidence\": <float between 0.0 and 1.0>,
    \"trend\": \"<increasing|decreasing|stable>\",
    \"key_factors\": [\"factor1\", \"factor2\", \"factor3\"]
}}

Be specific and data-driven in your prediction.",
        days = days_ahead,
        score = current.overall_risk_score,
        level = current.risk_level.as_str(),
        origin = current.origin,
        destination = current.destination,
        factors = factors.join("\n"),
        trade = current.breakdown.trade_news,
        political = current.breakdown.political,
        port = current.breakdown.port_congestion,
        recent = recent_high_severity(history, now),
    )
}

fn route_block(label: &str, route: &OptimizedRoute) -> String {
    let b = &route.risk_assessment.breakdown;
    format!(
        "{label}: {} -> {}\n\
         - Risk Score: {:.2}\n\
         - Cost: ${}\n\
         - Time: {:.1} days\n\
         - Risk Breakdown: Trade News: {:.2}, Political: {:.2}, Port Congestion: {:.2}",
        route.origin,
        route.destination,
        route.metrics.risk_score,
        thousands(route.metrics.cost_usd),
        route.metrics.time_days,
        b.trade_news,
        b.political,
        b.port_congestion
    )
}

/// Ask whether to reroute from `original` onto `best`.
pub fn optimization_prompt(original: &OptimizedRoute, best: &OptimizedRoute) -> String {
    let improvement = original.metrics.risk_score - best.metrics.risk_score;
    let waypoints = if best.waypoints.is_empty() {
        "None".to_string()
    } else {
        best.waypoints.join(", ")
    };
    let factors: Vec<String> = best
        .risk_assessment
        .contributing_factors
        .iter()
        .take(3)
        .map(|f| {
            let description: String = f.description.chars().take(100).collect();
            format!("- {}: {} (Severity: {:.2})", f.title, description, f.severity)
        })
        .collect();

    format!(
        "Analyze these shipping routes and provide a recommendation:

{original}

{best}
- Waypoints: {waypoints}

Risk Improvement: {improvement:.2} ({percent:.1}% reduction)
Cost Impact: {cost}
Time Impact: {time:+.1} days

Contributing Risk Factors:
{factors}

Based on the risk assessment, cost, and time analysis, should we reroute? Provide a clear, \
concise recommendation (2-3 sentences) explaining:
1. Whether to reroute or stay on current route
2. Key reasons (risk reduction, cost/time tradeoffs)
3. Any important considerations

Be specific about the risk factors and why the alternative is better or worse.",
        original = route_block("Original Route", original),
        best = route_block("Best Alternative Route", best),
        percent = improvement * 100.0,
        cost = signed_usd(best.metrics.cost_usd - original.metrics.cost_usd),
        time = best.metrics.time_days - original.metrics.time_days,
        factors = factors.join("\n"),
    )
}

/// Ask for a one-sentence reroute recommendation after a disruption.
pub fn disruption_prompt(dashboard: &Dashboard) -> String {
    let shipment = dashboard.shipment();
    let scenario = dashboard
        .disruption()
        .map(|d| d.scenario.as_str())
        .unwrap_or("No active disruption");

    let routes: Vec<String> = dashboard
        .routes()
        .iter()
        .map(|route| {
            let p = dashboard.profile(&route.id).unwrap_or_default();
            format!(
                "- {} ({} days, ${}): risk {}%, congestion {:.2}, tariffs {:.2}, unrest {:.2}",
                route.name,
                route.transit_days(),
                thousands(route.cost_usd() as f64),
                p.percent(),
                p.congestion,
                p.tariffs,
                p.unrest
            )
        })
        .collect();

    let active = dashboard
        .route(dashboard.active_route_id())
        .map(|r| r.name.as_str())
        .unwrap_or("unknown");

    format!(
        "A disruption has hit shipment {id} ({contents}) from {origin} to {destination}.

Disruption: {scenario}

Routes and current risk:
{routes}

The lowest-risk alternative is {active}. In one or two sentences, recommend what the \
operator should do and why.",
        id = shipment.id,
        contents = shipment.contents,
        origin = shipment.origin,
        destination = shipment.destination,
        routes = routes.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::{mock_political, mock_trade_news};
    use crate::optimizer::{alternatives, original};
    use crate::risk::assess;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn mock_reply_echoes_message() {
        assert_eq!(
            mock_agent_reply("hello"),
            "[Mock Agent] Received query: hello. ADK agent not available - using mock response for development."
        );
    }

    #[test]
    fn prediction_prompt_embeds_context() {
        let mut points = mock_trade_news(now(), None, 10);
        points.extend(mock_political(now(), None));
        let current = assess(&points, "Taiwan", "Los Angeles", None, now());
        let prompt = prediction_prompt(&current, &points, 5, now());
        assert!(prompt.contains("predict the risk level 5 days into the future"));
        assert!(prompt.contains("Route: Taiwan → Los Angeles"));
        assert!(prompt.contains("\"predicted_risk_score\""));
        assert!(prompt.contains("- trade_news: New Tariffs Announced on Semiconductor Imports"));
    }

    #[test]
    fn optimization_prompt_compares_routes() {
        let orig = original("Taiwan", "Los Angeles").assessed(assess(&[], "Taiwan", "Los Angeles", None, now()));
        let alt = alternatives("Taiwan", "Los Angeles")
            .remove(0)
            .assessed(assess(&[], "Taiwan", "Los Angeles", None, now()));
        let prompt = optimization_prompt(&orig, &alt);
        assert!(prompt.contains("Original Route: Taiwan -> Los Angeles"));
        assert!(prompt.contains("- Waypoints: Port of Ho Chi Minh City, Vietnam"));
        assert!(prompt.contains("Cost Impact: $+3,000"));
    }

    #[test]
    fn disruption_prompt_names_scenario() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut dashboard = Dashboard::new(&mut rng, now());
        let disruption = dashboard.trigger_disruption(&mut rng, now());
        let prompt = disruption_prompt(&dashboard);
        assert!(prompt.contains(&format!("Disruption: {}", disruption.scenario)));
        assert!(prompt.contains("shipment SHP-1001"));
    }
}
