//! US trade.gov trade-leads client.

use std::time::Duration;

use arkham_core::RiskDataPoint;
use arkham_core::catalog::country_code;
use arkham_core::feeds::trade_lead_to_point;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{info, warn};

use super::{http_client, trim_base};
use crate::AppResult;

pub const DEFAULT_BASE_URL: &str = "https://data.trade.gov";

/// Query used when no region narrows the search.
pub const DEFAULT_QUERY: &str = "trade disruption OR supply chain OR shipping OR logistics";

/// Largest page the search endpoint serves.
pub const MAX_PAGE_SIZE: usize = 100;

const SEARCH_PATH: &str = "/trade_leads/v1/search";
const COUNT_PATH: &str = "/trade_leads/v1/count";
const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TradeGovClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl TradeGovClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            base_url: trim_base(base_url),
            api_key: api_key.into(),
            client: http_client(TIMEOUT)?,
        })
    }

    /// Search trade leads, mapped to trade-news data points.
    ///
    /// A missing search endpoint or any non-200 answer yields an empty
    /// list; transport failures are errors.
    pub async fn search(
        &self,
        region: Option<&str>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RiskDataPoint>> {
        let mut params = vec![
            ("subscription-key", self.api_key.clone()),
            ("size", limit.min(MAX_PAGE_SIZE).to_string()),
            ("format", "json".to_string()),
        ];
        match region {
            Some(region) => params.push(("country_codes", country_code(region))),
            None => params.push(("q", DEFAULT_QUERY.to_string())),
        }

        let response = self
            .client
            .get(format!("{}{SEARCH_PATH}", self.base_url))
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            info!("trade.gov search endpoint not found, probing count endpoint");
            let probe = self
                .client
                .get(format!("{}{COUNT_PATH}", self.base_url))
                .query(&[("format", "json")])
                .send()
                .await?;
            if probe.status().is_success() {
                info!("trade.gov count endpoint reachable; search is required for lead data");
            }
            return Ok(Vec::new());
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            warn!(status = status.as_u16(), body = %preview, "trade.gov search failed");
            return Ok(Vec::new());
        }

        let body: Value = response.json().await?;
        let points: Vec<RiskDataPoint> = body
            .get("results")
            .and_then(Value::as_array)
            .map(|leads| {
                leads
                    .iter()
                    .take(limit)
                    .map(|lead| trade_lead_to_point(now, lead))
                    .collect()
            })
            .unwrap_or_default();

        info!(count = points.len(), "fetched trade.gov leads");
        Ok(points)
    }
}
