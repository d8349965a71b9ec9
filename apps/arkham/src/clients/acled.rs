//! ACLED API client with a cached OAuth bearer token.
//!
//! Token acquisition order:
//!
//! 1. cached token, if present, unexpired and not forced
//! 2. `refresh_token` grant (skipped when forced)
//! 3. `password` grant
//! 4. JSON login, then the `password` grant again
//!
//! The cache sits behind a `tokio::sync::Mutex` held for the whole
//! acquisition, so concurrent callers wait for one token request instead of
//! each issuing their own.

use std::borrow::Cow;
use std::time::Duration;

use arkham_core::RiskDataPoint;
use arkham_core::catalog::acled_country;
use arkham_core::feeds::acled_event_to_point;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::{http_client, trim_base};
use crate::{AppError, AppResult};

pub const DEFAULT_BASE_URL: &str = "https://acleddata.com";
pub const CLIENT_ID: &str = "acled";

/// Token lifetime assumed when the server omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: i64 = 86_400;

/// How long before expiry a token counts as expiring soon.
pub const EXPIRY_BUFFER_MINUTES: i64 = 60;

/// Window of events requested for political risk.
pub const EVENT_WINDOW_DAYS: i64 = 30;

const EVENT_FIELDS: &str =
    "event_id_cnty|event_date|event_type|sub_event_type|country|admin1|location|fatalities|notes";
const EVENT_LIMIT: u32 = 100;
const TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// TOKEN
// =============================================================================

/// A cached OAuth token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcledToken {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AcledToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expiring_soon(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - chrono::Duration::minutes(EXPIRY_BUFFER_MINUTES)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    token_type: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> AcledToken {
        let requested = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        // lifetimes chrono cannot represent fall back to the default
        let (expires_in, expires_at) = match chrono::Duration::try_seconds(requested)
            .and_then(|span| now.checked_add_signed(span))
        {
            Some(at) => (requested, at),
            None => (DEFAULT_EXPIRES_IN, now + chrono::Duration::seconds(DEFAULT_EXPIRES_IN)),
        };
        AcledToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in,
            expires_at,
            created_at: now,
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct AcledClient {
    token_url: String,
    login_url: String,
    api_url: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
    token: Mutex<Option<AcledToken>>,
}

impl std::fmt::Debug for AcledClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcledClient")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl AcledClient {
    /// Client for `base_url`. The password may arrive percent-encoded and
    /// is decoded here.
    pub fn new(base_url: &str, username: Option<String>, password: Option<String>) -> AppResult<Self> {
        let base = trim_base(base_url);
        let password = password.map(|raw| decode_credential(&raw).into_owned());
        Ok(Self {
            token_url: format!("{base}/oauth/token"),
            login_url: format!("{base}/user/login?_format=json"),
            api_url: format!("{base}/api"),
            username,
            password,
            client: http_client(TIMEOUT)?,
            token: Mutex::new(None),
        })
    }

    /// Start with an already-issued token in the cache.
    #[must_use]
    pub fn with_token(mut self, token: AcledToken) -> Self {
        self.token = Mutex::new(Some(token));
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Snapshot of the cached token.
    pub async fn cached_token(&self) -> Option<AcledToken> {
        self.token.lock().await.clone()
    }

    /// A usable access token, or `None` when every method failed.
    pub async fn access_token(&self, force_refresh: bool) -> Option<String> {
        let mut cache = self.token.lock().await;
        let now = Utc::now();

        if !force_refresh
            && let Some(token) = cache.as_ref()
        {
            if !token.is_expired(now) {
                return Some(token.access_token.clone());
            }
            if !token.refresh_token.is_empty() {
                match self.refresh_grant(&token.refresh_token).await {
                    Ok(fresh) => {
                        info!(expires_at = %fresh.expires_at, "refreshed ACLED access token");
                        let access = fresh.access_token.clone();
                        *cache = Some(fresh);
                        return Some(access);
                    }
                    Err(e) => warn!(error = %e, "ACLED token refresh failed, requesting a new token"),
                }
            }
        }

        match self.new_token().await {
            Ok(fresh) => {
                info!(expires_at = %fresh.expires_at, "obtained ACLED access token");
                let access = fresh.access_token.clone();
                *cache = Some(fresh);
                Some(access)
            }
            Err(e) => {
                error!(error = %e, "failed to get ACLED access token");
                None
            }
        }
    }

    async fn new_token(&self) -> AppResult<AcledToken> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(AppError::Unavailable(
                "ACLED username and password must be configured".to_string(),
            ));
        };

        match self.password_grant(username, password).await {
            Ok(token) => return Ok(token),
            Err(e) => warn!(error = %e, "ACLED password grant failed, trying login first"),
        }

        let login = self
            .client
            .post(&self.login_url)
            .json(&json!({ "name": username, "pass": password }))
            .send()
            .await?;
        if login.status() != StatusCode::OK {
            return Err(AppError::Upstream(format!(
                "ACLED login failed: {}",
                login.status().as_u16()
            )));
        }
        info!("logged in to ACLED, retrying token request");
        self.password_grant(username, password).await
    }

    async fn password_grant(&self, username: &str, password: &str) -> AppResult<AcledToken> {
        self.token_request(&[
            ("username", username),
            ("password", password),
            ("grant_type", "password"),
            ("client_id", CLIENT_ID),
        ])
        .await
    }

    async fn refresh_grant(&self, refresh_token: &str) -> AppResult<AcledToken> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("client_id", CLIENT_ID),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> AppResult<AcledToken> {
        let response = self.client.post(&self.token_url).form(form).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(500).collect();
            return Err(AppError::Upstream(format!(
                "ACLED token request failed: {} {preview}",
                status.as_u16()
            )));
        }
        let parsed: TokenResponse = response.json().await?;
        Ok(parsed.into_token(Utc::now()))
    }

    /// Authenticated GET. A 401 forces a token refresh and retries once.
    pub async fn get(&self, endpoint: &str, params: &[(String, String)]) -> AppResult<reqwest::Response> {
        let url = format!("{}/{}", self.api_url, endpoint.trim_start_matches('/'));

        let token = self.require_token(false).await?;
        let response = self.client.get(&url).bearer_auth(token).query(params).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("ACLED token rejected, refreshing");
        let token = self.require_token(true).await?;
        Ok(self.client.get(&url).bearer_auth(token).query(params).send().await?)
    }

    async fn require_token(&self, force_refresh: bool) -> AppResult<String> {
        self.access_token(force_refresh)
            .await
            .ok_or_else(|| AppError::Upstream("Unable to obtain access token".to_string()))
    }

    /// GET an API endpoint as JSON. Adds `_format=json`.
    pub async fn fetch(&self, endpoint: &str, mut params: Vec<(String, String)>) -> AppResult<Value> {
        params.insert(0, ("_format".to_string(), "json".to_string()));
        let response = self.get(endpoint, &params).await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "ACLED API request failed: {} {body}",
                status.as_u16()
            )));
        }
        Ok(response.json().await?)
    }

    /// Political-instability events from the last 30 days.
    pub async fn political_events(
        &self,
        region: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RiskDataPoint>> {
        let start = now - chrono::Duration::days(EVENT_WINDOW_DAYS);
        let mut params = vec![
            (
                "event_date".to_string(),
                format!("{}|{}", start.format("%Y-%m-%d"), now.format("%Y-%m-%d")),
            ),
            ("event_date_where".to_string(), "BETWEEN".to_string()),
            ("fields".to_string(), EVENT_FIELDS.to_string()),
            ("limit".to_string(), EVENT_LIMIT.to_string()),
        ];
        if let Some(country) = region.and_then(acled_country) {
            params.push(("country".to_string(), country.to_string()));
        }

        let body = self.fetch("acled/read", params).await?;
        let points: Vec<RiskDataPoint> = if body.get("status").and_then(Value::as_i64) == Some(200) {
            body.get("data")
                .and_then(Value::as_array)
                .map(|events| events.iter().map(|e| acled_event_to_point(now, e)).collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        info!(count = points.len(), "fetched ACLED events");
        Ok(points)
    }
}

/// Decode a percent-encoded credential, keeping the raw text if it is not
/// valid UTF-8 once decoded.
pub fn decode_credential(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}
