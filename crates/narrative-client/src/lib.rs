pub mod error;

pub use error::{NarrativeError, NarrativeResult};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use valuation_core::{NarrativeProvider, ValuationError};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/complete";
pub const DEFAULT_MAX_TOKENS: u32 = 200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the completion endpoint
#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    pub api_url: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl NarrativeConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest {
    prompt: String,
    max_tokens: u32,
}

pub fn strategy_prompt(symbol: &str) -> String {
    format!(
        "Summarize {}'s strategic growth objectives based on recent earnings calls and filings.",
        symbol
    )
}

#[derive(Clone)]
pub struct NarrativeClient {
    client: reqwest::Client,
    config: NarrativeConfig,
}

impl NarrativeClient {
    pub fn new(config: NarrativeConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client for completions");
                reqwest::Client::new()
            });

        Self { client, config }
    }

    /// Send `prompt` and return the `completion` field, if the provider sent one.
    pub async fn complete(&self, prompt: String) -> NarrativeResult<Option<String>> {
        let request = CompletionRequest {
            prompt,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .timeout(self.config.timeout)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(NarrativeError::from_transport)?;

        if !response.status().is_success() {
            return Err(NarrativeError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(NarrativeError::from_transport)?;
        let body: Value = serde_json::from_slice(&bytes)?;

        if !body.is_object() {
            return Err(NarrativeError::InvalidResponse(
                "expected a JSON object".to_string(),
            ));
        }

        let completion = body
            .get("completion")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        if completion.is_none() {
            tracing::debug!("Completion response carried no completion text");
        }

        Ok(completion)
    }

    /// Strategic growth summary for `symbol`.
    pub async fn strategic_growth_summary(&self, symbol: &str) -> NarrativeResult<Option<String>> {
        self.complete(strategy_prompt(symbol)).await
    }
}

#[async_trait]
impl NarrativeProvider for NarrativeClient {
    async fn strategy_summary(&self, symbol: &str) -> Result<Option<String>, ValuationError> {
        Ok(self.strategic_growth_summary(symbol).await?)
    }

    fn provider_name(&self) -> &'static str {
        "completion_api"
    }
}
