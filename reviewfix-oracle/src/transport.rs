use crate::config::OracleConfig;
use crate::error::{OracleError, classify_status};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bedrock `invoke` body for Llama-family models.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleRequest {
    pub prompt: String,
    pub max_gen_len: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    generation: Option<String>,
}

/// One oracle attempt. Retry, timeout and budget live in [`crate::OracleClient`].
#[async_trait]
pub trait OracleTransport: Send + Sync {
    /// Send `request` once and return the generated text.
    async fn invoke(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// HTTP transport for the Bedrock runtime `invoke` API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &OracleConfig, api_key: Option<String>) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| OracleError::permanent(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.invoke_url(),
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl OracleTransport for HttpTransport {
    async fn invoke(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        let text = response.text().await.map_err(network_error)?;
        debug!(status = status.as_u16(), bytes = text.len(), "oracle reply");

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &text));
        }
        decode_generation(&text)
    }
}

fn decode_generation(text: &str) -> Result<String, OracleError> {
    let body: InvokeResponse = serde_json::from_str(text)
        .map_err(|e| OracleError::transient(format!("undecodable oracle reply: {e}")))?;
    match body.generation {
        Some(g) if !g.trim().is_empty() => Ok(g),
        _ => Err(OracleError::transient("empty oracle reply")),
    }
}

fn network_error(err: reqwest::Error) -> OracleError {
    if err.is_builder() {
        OracleError::permanent(format!("invalid oracle request: {err}"))
    } else if err.is_timeout() {
        OracleError::transient(format!("oracle request timed out: {err}"))
    } else {
        OracleError::transient(format!("oracle request failed: {err}"))
    }
}
