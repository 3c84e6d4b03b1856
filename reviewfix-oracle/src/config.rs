use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MODEL_ID: &str = "meta.llama3-70b-instruct-v1:0";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_API_KEY_ENV: &str = "AWS_BEARER_TOKEN_BEDROCK";

/// Oracle settings, passed through from the `[oracle]` table of `reviewfix.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub model_id: String,
    pub region: String,
    /// Overrides the regional Bedrock runtime endpoint.
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token. Read by the binary, never by this crate.
    pub api_key_env: String,
    pub max_output_length: u32,
    pub temperature: f32,
    /// Maximum attempts per batched call, including the first.
    pub retry_budget: u32,
    pub timeout_secs: u64,
    pub max_concurrent_calls: usize,
    /// Process-wide cap on oracle calls.
    pub max_total_calls: Option<u64>,
    pub backoff: BackoffConfig,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_output_length: 1024,
            temperature: 0.5,
            retry_budget: 3,
            timeout_secs: 60,
            max_concurrent_calls: 2,
            max_total_calls: None,
            backoff: BackoffConfig::default(),
        }
    }
}

impl OracleConfig {
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(e) => e.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }

    pub fn invoke_url(&self) -> String {
        format!("{}/model/{}/invoke", self.endpoint_url(), self.model_id)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Attempts actually made; a budget of zero still allows one call.
    pub fn attempts(&self) -> u32 {
        self.retry_budget.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub multiplier: u32,
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            multiplier: 2,
            max_delay_ms: 30_000,
        }
    }
}

impl BackoffConfig {
    /// Delay before retry `retry` (1-based): `min(base * multiplier^(retry-1), max)`.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = u64::from(self.multiplier).saturating_pow(retry.saturating_sub(1));
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}
