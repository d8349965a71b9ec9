//! Generative-language endpoint client.

use std::time::Duration;

use arkham_core::prompts::SYSTEM_INSTRUCTION;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{http_client, trim_base};
use crate::{AppError, AppResult};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const MODEL: &str = "gemini-2.0-flash-exp";

const TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// RESPONSE TYPES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone)]
pub struct GenAiClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GenAiClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> AppResult<Self> {
        Ok(Self {
            endpoint: format!("{}/v1beta/models/{MODEL}:generateContent", trim_base(base_url)),
            api_key,
            client: http_client(TIMEOUT)?,
        })
    }

    /// Whether an API key is configured.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate text for `prompt` under the agent system instruction.
    ///
    /// # Errors
    ///
    /// [`AppError::Unavailable`] without a key, [`AppError::Upstream`] on a
    /// non-success status or an empty reply.
    pub async fn generate(&self, prompt: &str) -> AppResult<String> {
        let Some(key) = &self.api_key else {
            return Err(AppError::Unavailable("Generative AI is not configured".to_string()));
        };

        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let preview: String = text.chars().take(200).collect();
            return Err(AppError::Upstream(format!(
                "Generative AI request failed: {} {preview}",
                status.as_u16()
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::Upstream("Generative AI returned no text".to_string()));
        }
        debug!(chars = text.len(), "generated text");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_model() {
        let client = GenAiClient::new("http://localhost:9/", None).unwrap();
        assert_eq!(
            client.endpoint,
            "http://localhost:9/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn unconfigured_is_unavailable() {
        let client = GenAiClient::new(DEFAULT_BASE_URL, None).unwrap();
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));
    }
}
