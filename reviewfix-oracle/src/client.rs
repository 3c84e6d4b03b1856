use crate::budget::OracleBudget;
use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::parse::parse_corrections;
use crate::prompt::build_prompt;
use crate::transport::{HttpTransport, OracleRequest, OracleTransport};
use reviewfix_types::{Finding, FindingId, SourceBuffer};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

pub const NO_CORRECTION: &str = "no correction available";

/// Result of one batched `propose` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proposals {
    pub corrections: BTreeMap<FindingId, String>,
    /// Requested findings left without text, with the reason.
    pub unresolved: BTreeMap<FindingId, String>,
    /// Transport attempts made.
    pub attempts: u32,
}

impl Proposals {
    fn unresolved(requested: BTreeSet<FindingId>, reason: &str, attempts: u32) -> Self {
        Self {
            corrections: BTreeMap::new(),
            unresolved: requested
                .into_iter()
                .map(|id| (id, reason.to_string()))
                .collect(),
            attempts,
        }
    }

    fn resolved(
        requested: BTreeSet<FindingId>,
        corrections: BTreeMap<FindingId, String>,
        attempts: u32,
    ) -> Self {
        let unresolved = requested
            .into_iter()
            .filter(|id| !corrections.contains_key(id))
            .map(|id| (id, NO_CORRECTION.to_string()))
            .collect();
        Self {
            corrections,
            unresolved,
            attempts,
        }
    }
}

/// Correction oracle client.
///
/// Owns the retry policy: each `propose` issues one batched request, retried with exponential
/// backoff on transient failures up to `retry_budget` attempts, each attempt bounded by the
/// configured timeout. Exhausting retries is not an error; the findings come back unresolved.
#[derive(Clone)]
pub struct OracleClient {
    transport: Arc<dyn OracleTransport>,
    config: OracleConfig,
    budget: OracleBudget,
}

impl std::fmt::Debug for OracleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleClient")
            .field("config", &self.config)
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl OracleClient {
    pub fn new(
        transport: Arc<dyn OracleTransport>,
        config: OracleConfig,
        budget: OracleBudget,
    ) -> Self {
        Self {
            transport,
            config,
            budget,
        }
    }

    /// Client over the Bedrock HTTP transport.
    pub fn http(
        config: OracleConfig,
        api_key: Option<String>,
        budget: OracleBudget,
    ) -> Result<Self, OracleError> {
        let transport = HttpTransport::new(&config, api_key)?;
        Ok(Self::new(Arc::new(transport), config, budget))
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn budget(&self) -> &OracleBudget {
        &self.budget
    }

    /// Propose replacement text for `findings` against `buffer`.
    ///
    /// Only a permanent failure is returned as an error.
    pub async fn propose(
        &self,
        buffer: &SourceBuffer,
        findings: &[Finding],
    ) -> Result<Proposals, OracleError> {
        let requested: BTreeSet<FindingId> = findings.iter().map(|f| f.id.clone()).collect();
        if requested.is_empty() {
            return Ok(Proposals::default());
        }

        let request = OracleRequest {
            prompt: build_prompt(buffer, findings),
            max_gen_len: self.config.max_output_length,
            temperature: self.config.temperature,
        };
        let attempts = self.config.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let result = {
                let Some(_permit) = self.budget.acquire().await else {
                    warn!(attempt, "oracle call budget exhausted");
                    return Ok(Proposals::unresolved(
                        requested,
                        "oracle call budget exhausted",
                        attempt - 1,
                    ));
                };
                debug!(attempt, findings = requested.len(), "calling oracle");
                match timeout(self.config.timeout(), self.transport.invoke(&request)).await {
                    Ok(r) => r,
                    Err(_) => Err(OracleError::transient(format!(
                        "no reply within {}s",
                        self.config.timeout_secs
                    ))),
                }
            };

            match result.and_then(|reply| parse_corrections(&reply, &requested)) {
                Ok(corrections) => {
                    info!(
                        attempt,
                        resolved = corrections.len(),
                        requested = requested.len(),
                        "oracle proposals received"
                    );
                    return Ok(Proposals::resolved(requested, corrections, attempt));
                }
                Err(err) if err.is_transient() => {
                    warn!(attempt, attempts, error = %err, "transient oracle failure");
                    last_error = err.message().to_string();
                    if attempt < attempts {
                        sleep(self.config.backoff.delay(attempt)).await;
                    }
                }
                Err(err) => {
                    warn!(attempt, error = %err, "permanent oracle failure");
                    return Err(err);
                }
            }
        }

        let reason = format!("oracle retries exhausted after {attempts} attempts: {last_error}");
        Ok(Proposals::unresolved(requested, &reason, attempts))
    }
}
