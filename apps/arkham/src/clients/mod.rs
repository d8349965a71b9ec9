//! HTTP clients for the upstream services.
//!
//! Each client takes its base URL from configuration so tests can point it
//! at a local mock server.

pub mod acled;
pub mod genai;
pub mod trade_gov;

pub use acled::{AcledClient, AcledToken};
pub use genai::GenAiClient;
pub use trade_gov::TradeGovClient;

use std::time::Duration;

use crate::AppResult;

/// User agent sent to every upstream.
pub const USER_AGENT: &str = concat!("ArkhamAI/", env!("CARGO_PKG_VERSION"));

fn http_client(timeout: Duration) -> AppResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

fn trim_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
