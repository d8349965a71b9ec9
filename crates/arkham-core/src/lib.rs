//! # Arkham Core
//!
//! The scoring and rerouting engine behind Arkham AI.
//!
//! Everything in this crate is synchronous and free of network access.
//! Functions that depend on time take a `now: DateTime<Utc>` argument and
//! functions that need randomness take an `&mut impl Rng`, so callers (and
//! tests) control both.
//!
//! ## Pipeline
//!
//! ```text
//! feeds ──► risk ──► forecast
//!             │
//!             └────► optimizer ──► execution ──► journal
//! ```
//!
//! The `dashboard` module is the scripted demo state (shipment, five routes,
//! disruption scenarios) and sits beside the pipeline.

pub mod cache;
pub mod catalog;
pub mod dashboard;
pub mod execution;
pub mod feeds;
pub mod forecast;
pub mod journal;
pub mod optimizer;
pub mod prompts;
pub mod risk;
pub mod storage;

mod error;

pub use error::{ArkhamError, Result};
pub use feeds::{RiskCategory, RiskDataPoint};
pub use risk::{RiskAssessment, RiskLevel};

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Clamp a score into the closed unit interval.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
