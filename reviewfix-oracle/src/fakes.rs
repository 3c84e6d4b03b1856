//! Scripted oracle transport for offline tests.

use crate::error::OracleError;
use crate::transport::{OracleRequest, OracleTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct Step {
    delay: Duration,
    outcome: Result<String, OracleError>,
}

/// Replays a fixed sequence of replies, one per call, and records every request.
///
/// Calls beyond the script fail transiently.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Duration::ZERO, Ok(text.into()))
    }

    pub fn fail(self, err: OracleError) -> Self {
        self.push(Duration::ZERO, Err(err))
    }

    /// Reply only after `delay`, to exercise timeouts under a paused clock.
    pub fn reply_after(self, delay: Duration, text: impl Into<String>) -> Self {
        self.push(delay, Ok(text.into()))
    }

    fn push(self, delay: Duration, outcome: Result<String, OracleError>) -> Self {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Step { delay, outcome });
        self
    }

    pub fn calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl OracleTransport for ScriptedTransport {
    async fn invoke(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let step = self
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match step {
            Some(Step { delay, outcome }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                outcome
            }
            None => Err(OracleError::transient("scripted transport has no more replies")),
        }
    }
}

/// Builds a `{"corrections":[...]}` reply.
pub fn corrections_reply<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let corrections: Vec<serde_json::Value> = pairs
        .into_iter()
        .map(|(id, text)| serde_json::json!({ "id": id, "replacement": text }))
        .collect();
    serde_json::json!({ "corrections": corrections }).to_string()
}
