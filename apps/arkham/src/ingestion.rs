//! Risk data ingestion.
//!
//! Each feed prefers its live source and degrades to authored mock data:
//!
//! | Feed            | Live source          | Fallback              |
//! |-----------------|----------------------|-----------------------|
//! | trade news      | trade.gov (with key) | `mock_trade_news`     |
//! | political       | ACLED (with login)   | `mock_political`      |
//! | port congestion | none                 | `mock_port_congestion`|
//!
//! Results are memoized in a [`FeedCache`], journaled as data ingestion and
//! written to the `risk_data` collection when a store is connected.

use std::collections::BTreeSet;
use std::sync::Arc;

use arkham_core::RiskDataPoint;
use arkham_core::cache::{CacheStats, Feed, FeedCache, FeedKey};
use arkham_core::catalog::{extract_port_code, extract_region};
use arkham_core::feeds::{mock_political, mock_port_congestion, mock_trade_news, sort_newest_first};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clients::{AcledClient, TradeGovClient};
use crate::ledger::Ledger;
use crate::{AppResult, Config};

/// Trade-news page size when none is requested.
pub const DEFAULT_TRADE_LIMIT: usize = 50;
/// Per-region trade-news page size for route data.
pub const ROUTE_REGION_LIMIT: usize = 20;
/// Unscoped trade-news page size for route data.
pub const ROUTE_GENERAL_LIMIT: usize = 30;

#[derive(Debug)]
pub struct Ingestion {
    trade_gov: Option<TradeGovClient>,
    acled: Arc<AcledClient>,
    cache: Mutex<FeedCache>,
    ledger: Arc<Ledger>,
}

impl Ingestion {
    pub fn new(config: &Config, acled: Arc<AcledClient>, ledger: Arc<Ledger>) -> AppResult<Self> {
        let trade_gov = match &config.trade_gov_api_key {
            Some(key) => Some(TradeGovClient::new(&config.trade_gov_base_url, key.clone())?),
            None => {
                info!("TRADE_NEWS_API_KEY not configured, trade news uses mock data");
                None
            }
        };
        if !acled.has_credentials() {
            info!("ACLED credentials not configured, political data uses mock data");
        }
        Ok(Self {
            trade_gov,
            acled,
            cache: Mutex::new(FeedCache::default()),
            ledger,
        })
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    // =========================================================================
    // FEEDS
    // =========================================================================

    pub async fn trade_news(&self, region: Option<&str>, limit: usize) -> Vec<RiskDataPoint> {
        let key = FeedKey::limited(Feed::TradeNews, region, limit);
        let now = Utc::now();
        if let Some(hit) = self.cached(&key, now).await {
            return hit;
        }

        let points = match &self.trade_gov {
            Some(client) => match client.search(region, limit, now).await {
                Ok(points) => points,
                Err(e) => {
                    warn!(error = %e, "trade.gov fetch failed, using mock data");
                    mock_trade_news(now, region, limit)
                }
            },
            None => mock_trade_news(now, region, limit),
        };
        self.land(key, points, "trade_news", region, now).await
    }

    pub async fn political(&self, region: Option<&str>) -> Vec<RiskDataPoint> {
        let key = FeedKey::new(Feed::Political, region);
        let now = Utc::now();
        if let Some(hit) = self.cached(&key, now).await {
            return hit;
        }

        let points = if self.acled.has_credentials() {
            match self.acled.political_events(region, now).await {
                Ok(points) => points,
                Err(e) => {
                    warn!(error = %e, "ACLED fetch failed, using mock data");
                    mock_political(now, region)
                }
            }
        } else {
            mock_political(now, region)
        };
        self.land(key, points, "political", region, now).await
    }

    pub async fn ports(&self, port_code: Option<&str>) -> Vec<RiskDataPoint> {
        let key = FeedKey::new(Feed::PortCongestion, port_code);
        let now = Utc::now();
        if let Some(hit) = self.cached(&key, now).await {
            return hit;
        }
        let points = mock_port_congestion(now, port_code);
        self.land(key, points, "port_congestion", port_code, now).await
    }

    /// Every feed, newest first.
    pub async fn all(&self, region: Option<&str>, port_code: Option<&str>) -> Vec<RiskDataPoint> {
        let mut points = self.trade_news(region, DEFAULT_TRADE_LIMIT).await;
        points.extend(self.political(region).await);
        points.extend(self.ports(port_code).await);
        sort_newest_first(&mut points);
        info!(count = points.len(), "fetched risk data");
        points
    }

    /// Data for a route: every region it touches, both end ports and an
    /// unscoped trade-news sweep, newest first.
    pub async fn for_route(
        &self,
        origin: &str,
        destination: &str,
        route_regions: &[String],
    ) -> Vec<RiskDataPoint> {
        let mut regions: BTreeSet<String> = [extract_region(origin), extract_region(destination)]
            .into_iter()
            .flatten()
            .collect();
        regions.extend(route_regions.iter().filter(|r| !r.is_empty()).cloned());

        let mut points = Vec::new();
        for region in &regions {
            points.extend(self.trade_news(Some(region), ROUTE_REGION_LIMIT).await);
            points.extend(self.political(Some(region)).await);
        }
        for port in [origin, destination] {
            if let Some(code) = extract_port_code(port) {
                points.extend(self.ports(Some(code)).await);
            }
        }
        points.extend(self.trade_news(None, ROUTE_GENERAL_LIMIT).await);

        sort_newest_first(&mut points);
        debug!(origin, destination, regions = regions.len(), count = points.len(), "route risk data");
        points
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn cached(&self, key: &FeedKey, now: DateTime<Utc>) -> Option<Vec<RiskDataPoint>> {
        self.cache.lock().await.get(key, now)
    }

    async fn land(
        &self,
        key: FeedKey,
        points: Vec<RiskDataPoint>,
        source: &str,
        scope: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<RiskDataPoint> {
        self.cache.lock().await.insert(key, points.clone(), now);

        if !points.is_empty() {
            if let Some(store) = self.ledger.store()
                && let Err(e) = store.store_risk_data(&points, now)
            {
                warn!(source, error = %e, "failed to store risk data");
            }
            self.ledger
                .record(|j| j.data_ingestion(now, source, points.len(), scope))
                .await;
        }
        points
    }
}
