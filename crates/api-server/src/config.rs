use anyhow::{Context, Result};
use narrative_client::NarrativeConfig;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Settings for the HTTP layer itself (not the outbound providers)
#[derive(Debug, Clone, Default)]
pub struct HttpSettings {
    /// Empty means any origin may call the API.
    pub cors_origins: Vec<String>,
    pub enable_hsts: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub alpha_vantage_api_key: String,
    pub alpha_vantage_base_url: String,
    pub narrative: NarrativeConfig,
    pub upstream_timeout: Duration,
    pub http: HttpSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let alpha_vantage_api_key =
            non_empty("ALPHA_VANTAGE_API_KEY").context("ALPHA_VANTAGE_API_KEY must be set")?;
        let narrative_api_key =
            non_empty("CLAUDE_API_KEY").context("CLAUDE_API_KEY must be set")?;

        let bind_addr = non_empty("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:3000")?;

        let upstream_timeout = Duration::from_secs(
            non_empty("UPSTREAM_TIMEOUT_SECS")
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("UPSTREAM_TIMEOUT_SECS must be a whole number of seconds")?
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        );

        let mut narrative = NarrativeConfig::new(narrative_api_key);
        narrative.timeout = upstream_timeout;
        if let Some(url) = non_empty("NARRATIVE_API_URL") {
            narrative.api_url = url;
        }
        if let Some(max_tokens) = non_empty("NARRATIVE_MAX_TOKENS") {
            narrative.max_tokens = max_tokens
                .parse::<u32>()
                .context("NARRATIVE_MAX_TOKENS must be a positive integer")?;
        }

        let cors_origins: Vec<String> = non_empty("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let enable_hsts = non_empty("ENABLE_HSTS")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Ok(Self {
            bind_addr,
            alpha_vantage_api_key,
            alpha_vantage_base_url: non_empty("ALPHA_VANTAGE_BASE_URL")
                .unwrap_or_else(|| alpha_vantage_client::BASE_URL.to_string()),
            narrative,
            upstream_timeout,
            http: HttpSettings {
                cors_origins,
                enable_hsts,
            },
        })
    }
}
