//! Environment configuration.
//!
//! Read once at startup. CLI flags override individual values afterwards.

use std::path::PathBuf;

use crate::clients::{acled, genai, trade_gov};

/// Default requests per second accepted by the API.
pub const DEFAULT_RATE_LIMIT: u32 = 50;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub agent_name: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,

    pub project: String,
    pub location: String,

    pub genai_api_key: Option<String>,
    pub genai_base_url: String,
    pub trade_gov_api_key: Option<String>,
    pub trade_gov_base_url: String,
    pub acled_username: Option<String>,
    pub acled_password: Option<String>,
    pub acled_base_url: String,

    /// Document store file. The store is disconnected when unset.
    pub store_path: Option<PathBuf>,
    pub database_name: String,

    pub logs_dir: PathBuf,
    /// Bearer key required on API routes. Auth is off when unset.
    pub api_key: Option<String>,
    pub rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_name: "Arkham AI".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            debug: false,
            project: "arkham-ai-477701".to_string(),
            location: "us-central1".to_string(),
            genai_api_key: None,
            genai_base_url: genai::DEFAULT_BASE_URL.to_string(),
            trade_gov_api_key: None,
            trade_gov_base_url: trade_gov::DEFAULT_BASE_URL.to_string(),
            acled_username: None,
            acled_password: None,
            acled_base_url: acled::DEFAULT_BASE_URL.to_string(),
            store_path: None,
            database_name: "arkham_ai".to_string(),
            logs_dir: PathBuf::from("logs"),
            api_key: None,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

impl Config {
    /// Configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary variable source.
    ///
    /// Empty values count as unset. Unparseable numbers keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            agent_name: var("AGENT_NAME").unwrap_or(defaults.agent_name),
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            debug: var("DEBUG").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            project: var("GOOGLE_CLOUD_PROJECT").unwrap_or(defaults.project),
            location: var("GOOGLE_CLOUD_LOCATION").unwrap_or(defaults.location),
            genai_api_key: var("GOOGLE_API_KEY").or_else(|| var("GEMINI_API_KEY")),
            genai_base_url: var("GENAI_BASE_URL").unwrap_or(defaults.genai_base_url),
            trade_gov_api_key: var("TRADE_NEWS_API_KEY"),
            trade_gov_base_url: var("TRADE_GOV_BASE_URL").unwrap_or(defaults.trade_gov_base_url),
            acled_username: var("ACLED_USERNAME"),
            acled_password: var("ACLED_PASSWORD"),
            acled_base_url: var("ACLED_BASE_URL").unwrap_or(defaults.acled_base_url),
            store_path: var("ARKHAM_STORE_PATH").map(PathBuf::from),
            database_name: var("MONGODB_DATABASE").unwrap_or(defaults.database_name),
            logs_dir: var("ARKHAM_LOGS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.logs_dir),
            api_key: var("ARKHAM_API_KEY"),
            rate_limit: var("ARKHAM_RATE_LIMIT")
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.rate_limit),
        }
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn has_acled_credentials(&self) -> bool {
        self.acled_username.is_some() && self.acled_password.is_some()
    }
}
