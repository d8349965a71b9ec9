//! # Dashboard
//!
//! The scripted demo: one shipment, the five catalog routes, a risk profile
//! per route and an event feed.
//!
//! Risk numbers here are authored, not assessed. Baselines are
//! `base + index·step ± jitter`; a disruption swaps in a scenario's scripted
//! values for the primary route and moves the shipment to the safest
//! alternative.
//!
//! ## Invariants
//!
//! - every profile value stays in [0, 1]
//! - while disrupted, the primary route's overall risk is at least 0.75
//! - while disrupted, the active route has the lowest overall risk of the
//!   non-primary routes (catalog order breaks ties)

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{PRIMARY_ROUTE_ID, PRIMARY_TRANSIT_DAYS, Port, Route, demo_routes, ports};
use crate::{clamp_unit, round_to};

/// Floor of the primary route's overall risk while disrupted.
pub const DISRUPTED_FLOOR: f64 = 0.75;

const BASELINE_JITTER: f64 = 0.03;
const SCENARIO_JITTER: f64 = 0.02;
const REFRESH_JITTER: f64 = 0.02;

// =============================================================================
// TYPES
// =============================================================================

/// The shipment being tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    pub contents: String,
    pub origin: String,
    pub destination: String,
    pub route_id: String,
    pub eta_days: i64,
}

impl Default for Shipment {
    fn default() -> Self {
        Self {
            id: "SHP-1001".to_string(),
            contents: "Semiconductor wafers".to_string(),
            origin: "Port of Taipei, Taiwan".to_string(),
            destination: "Port of Los Angeles, USA".to_string(),
            route_id: PRIMARY_ROUTE_ID.to_string(),
            eta_days: PRIMARY_TRANSIT_DAYS,
        }
    }
}

/// Overall risk plus the three displayed sub-factors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub overall: f64,
    pub congestion: f64,
    pub tariffs: f64,
    pub unrest: f64,
}

impl RiskProfile {
    pub const fn new(overall: f64, congestion: f64, tariffs: f64, unrest: f64) -> Self {
        Self {
            overall,
            congestion,
            tariffs,
            unrest,
        }
    }

    fn map(self, mut f: impl FnMut(f64) -> f64) -> Self {
        Self {
            overall: f(self.overall),
            congestion: f(self.congestion),
            tariffs: f(self.tariffs),
            unrest: f(self.unrest),
        }
    }

    fn jittered(self, rng: &mut impl Rng, amount: f64) -> Self {
        self.map(|v| round_to(clamp_unit(v + rng.gen_range(-amount..=amount)), 3))
    }

    /// Whether every value lies in [0, 1].
    pub fn in_unit_range(&self) -> bool {
        [self.overall, self.congestion, self.tariffs, self.unrest]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }

    /// Overall risk as a whole percentage.
    pub fn percent(&self) -> i64 {
        (self.overall * 100.0).round() as i64
    }
}

/// A timestamped line in the event feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// A scripted disruption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    pub title: &'static str,
    /// Scripted profile for the primary route.
    pub primary: RiskProfile,
    /// Extra risk added to named alternatives.
    pub bumps: &'static [(&'static str, f64)],
}

/// The fixed scenario list disruptions are drawn from.
pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        title: "Typhoon closes Taiwan Strait shipping lanes",
        primary: RiskProfile::new(0.86, 0.90, 0.40, 0.55),
        bumps: &[("TW-SH-LA", 0.35), ("TW-JP-LA", 0.15)],
    },
    Scenario {
        title: "Tariff escalation on semiconductor imports",
        primary: RiskProfile::new(0.78, 0.45, 0.95, 0.50),
        bumps: &[("TW-SH-LA", 0.30), ("TW-VN-LA", 0.10)],
    },
    Scenario {
        title: "Labor strike at Port of Los Angeles",
        primary: RiskProfile::new(0.81, 0.95, 0.30, 0.60),
        bumps: &[
            ("TW-VN-LA", 0.15),
            ("TW-JP-LA", 0.15),
            ("TW-SG-LA", 0.15),
            ("TW-SH-LA", 0.15),
        ],
    },
    Scenario {
        title: "Military exercises near the Taiwan Strait",
        primary: RiskProfile::new(0.88, 0.50, 0.45, 0.96),
        bumps: &[("TW-SH-LA", 0.40), ("TW-JP-LA", 0.20), ("TW-VN-LA", 0.10)],
    },
];

/// A scenario that has been applied, with the reroute it caused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disruption {
    pub scenario: String,
    pub primary_risk: f64,
    pub rerouted_to: String,
    pub rerouted_risk: f64,
}

// =============================================================================
// STATE
// =============================================================================

/// Route plus its current risk, as shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteView {
    #[serde(flatten)]
    pub route: Route,
    pub transit_days: i64,
    pub cost_usd: i64,
    pub path: Vec<[f64; 2]>,
    pub risk: RiskProfile,
    pub active: bool,
}

/// Serializable snapshot of the whole dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub shipment: Shipment,
    pub ports: Vec<Port>,
    pub routes: Vec<RouteView>,
    pub active_route_id: String,
    pub disruption: Option<Disruption>,
    pub monitoring: bool,
    pub events: Vec<DashboardEvent>,
}

/// Mutable demo state.
#[derive(Debug, Clone)]
pub struct Dashboard {
    routes: Vec<Route>,
    profiles: BTreeMap<String, RiskProfile>,
    shipment: Shipment,
    active_route_id: String,
    disruption: Option<Disruption>,
    monitoring: bool,
    events: Vec<DashboardEvent>,
}

impl Dashboard {
    /// Fresh dashboard at baseline.
    pub fn new(rng: &mut impl Rng, now: DateTime<Utc>) -> Self {
        let mut dashboard = Self {
            routes: demo_routes(),
            profiles: BTreeMap::new(),
            shipment: Shipment::default(),
            active_route_id: PRIMARY_ROUTE_ID.to_string(),
            disruption: None,
            monitoring: false,
            events: Vec::new(),
        };
        dashboard.reset(rng, now);
        dashboard
    }

    pub fn shipment(&self) -> &Shipment {
        &self.shipment
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn active_route_id(&self) -> &str {
        &self.active_route_id
    }

    pub fn disruption(&self) -> Option<&Disruption> {
        self.disruption.as_ref()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn events(&self) -> &[DashboardEvent] {
        &self.events
    }

    pub fn profile(&self, route_id: &str) -> Option<RiskProfile> {
        self.profiles.get(route_id).copied()
    }

    pub fn route(&self, route_id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == route_id)
    }

    fn log(&mut self, now: DateTime<Utc>, message: impl Into<String>) {
        self.events.push(DashboardEvent {
            timestamp: now,
            message: message.into(),
        });
    }

    fn route_name(&self, route_id: &str) -> String {
        self.route(route_id)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| route_id.to_string())
    }

    /// Back to baseline: primary route active, no disruption, fresh profiles.
    ///
    /// Keeps the configured shipment identity and the monitoring flag.
    pub fn reset(&mut self, rng: &mut impl Rng, now: DateTime<Utc>) {
        self.profiles = self
            .routes
            .iter()
            .enumerate()
            .map(|(i, route)| {
                let i = i as f64;
                let base = RiskProfile::new(
                    0.20 + 0.05 * i,
                    0.30 + 0.04 * i,
                    0.25 + 0.03 * i,
                    0.20 + 0.05 * i,
                );
                (route.id.clone(), base.jittered(rng, BASELINE_JITTER))
            })
            .collect();

        self.disruption = None;
        self.move_shipment(PRIMARY_ROUTE_ID);
        self.events.clear();
        let message = format!(
            "Dashboard initialized: shipment {} on {}",
            self.shipment.id,
            self.route_name(PRIMARY_ROUTE_ID)
        );
        self.log(now, message);
    }

    /// Update the shipment's identity and endpoints.
    pub fn configure_shipment(
        &mut self,
        id: &str,
        contents: &str,
        origin: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) {
        self.shipment.id = id.to_string();
        self.shipment.contents = contents.to_string();
        self.shipment.origin = origin.to_string();
        self.shipment.destination = destination.to_string();
        self.log(
            now,
            format!("Shipment {id} configured: {contents} from {origin} to {destination}"),
        );
    }

    pub fn set_monitoring(&mut self, enabled: bool, now: DateTime<Utc>) {
        if self.monitoring != enabled {
            self.monitoring = enabled;
            self.log(now, if enabled { "Monitoring enabled" } else { "Monitoring paused" });
        }
    }

    fn move_shipment(&mut self, route_id: &str) {
        let delta = self.route(route_id).map(|r| r.time_delta_days).unwrap_or(0);
        self.active_route_id = route_id.to_string();
        self.shipment.route_id = route_id.to_string();
        self.shipment.eta_days = PRIMARY_TRANSIT_DAYS + delta;
    }

    /// Non-primary route with the lowest overall risk; first in catalog order
    /// on ties.
    pub fn safest_alternative(&self) -> Option<(&Route, RiskProfile)> {
        let mut best: Option<(&Route, RiskProfile)> = None;
        for route in self.routes.iter().filter(|r| !r.is_primary()) {
            let Some(profile) = self.profile(&route.id) else {
                continue;
            };
            if best.is_none_or(|(_, b)| profile.overall < b.overall) {
                best = Some((route, profile));
            }
        }
        best
    }

    /// Apply `scenario` and reroute to the safest alternative.
    pub fn apply_scenario(
        &mut self,
        scenario: &Scenario,
        rng: &mut impl Rng,
        now: DateTime<Utc>,
    ) -> Disruption {
        let mut primary = scenario.primary.jittered(rng, SCENARIO_JITTER);
        primary.overall = primary.overall.max(DISRUPTED_FLOOR);
        self.profiles.insert(PRIMARY_ROUTE_ID.to_string(), primary);

        for (route_id, bump) in scenario.bumps {
            if let Some(profile) = self.profiles.get_mut(*route_id) {
                *profile = profile
                    .map(|v| clamp_unit(v + bump))
                    .jittered(rng, SCENARIO_JITTER);
            }
        }

        self.log(now, format!("Disruption detected: {}", scenario.title));
        self.log(
            now,
            format!(
                "Risk on {} rose to {}%",
                self.route_name(PRIMARY_ROUTE_ID),
                primary.percent()
            ),
        );

        let (target, target_profile) = match self.safest_alternative() {
            Some((route, profile)) => (route.id.clone(), profile),
            None => (PRIMARY_ROUTE_ID.to_string(), primary),
        };
        self.move_shipment(&target);
        let message = format!(
            "Rerouted shipment {} via {} (risk {}%, ETA {} days)",
            self.shipment.id,
            self.route_name(&target),
            target_profile.percent(),
            self.shipment.eta_days
        );
        self.log(now, message);

        let disruption = Disruption {
            scenario: scenario.title.to_string(),
            primary_risk: primary.overall,
            rerouted_to: target,
            rerouted_risk: target_profile.overall,
        };
        self.disruption = Some(disruption.clone());
        disruption
    }

    /// Pick a scenario at random and apply it.
    pub fn trigger_disruption(&mut self, rng: &mut impl Rng, now: DateTime<Utc>) -> Disruption {
        let scenario = SCENARIOS[rng.gen_range(0..SCENARIOS.len())];
        self.apply_scenario(&scenario, rng, now)
    }

    /// One polling tick: jitter every profile and, while disrupted, keep the
    /// shipment on the safest alternative.
    pub fn refresh(&mut self, rng: &mut impl Rng, now: DateTime<Utc>) {
        for profile in self.profiles.values_mut() {
            *profile = profile.jittered(rng, REFRESH_JITTER);
        }

        if self.disruption.is_none() {
            return;
        }

        if let Some(primary) = self.profiles.get_mut(PRIMARY_ROUTE_ID) {
            primary.overall = primary.overall.max(DISRUPTED_FLOOR);
        }

        let Some((route, profile)) = self.safest_alternative() else {
            return;
        };
        let (next, risk) = (route.id.clone(), profile.overall);
        if next != self.active_route_id {
            self.move_shipment(&next);
            let message = format!(
                "Active route changed to {} (risk {}%)",
                self.route_name(&next),
                (risk * 100.0).round() as i64
            );
            self.log(now, message);
        }
        if let Some(d) = self.disruption.as_mut() {
            d.rerouted_to = next;
            d.rerouted_risk = risk;
        }
    }

    /// Canned recommendation for the current disruption.
    pub fn canned_recommendation(&self) -> String {
        let primary = self.profile(PRIMARY_ROUTE_ID).unwrap_or_default();
        let active = self.profile(&self.active_route_id).unwrap_or_default();
        format!(
            "Reroute shipment {} via {} to reduce risk from {}% to {}%.",
            self.shipment.id,
            self.route_name(&self.active_route_id),
            primary.percent(),
            active.percent()
        )
    }

    /// Append the recommendation that was shown for the current disruption.
    pub fn record_recommendation(&mut self, now: DateTime<Utc>, text: &str) {
        self.log(now, format!("Recommendation: {text}"));
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            shipment: self.shipment.clone(),
            ports: ports(),
            routes: self
                .routes
                .iter()
                .map(|route| RouteView {
                    transit_days: route.transit_days(),
                    cost_usd: route.cost_usd(),
                    path: route.path(),
                    risk: self.profile(&route.id).unwrap_or_default(),
                    active: route.id == self.active_route_id,
                    route: route.clone(),
                })
                .collect(),
            active_route_id: self.active_route_id.clone(),
            disruption: self.disruption.clone(),
            monitoring: self.monitoring,
            events: self.events.clone(),
        }
    }
}
