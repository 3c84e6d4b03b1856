use crate::config::OracleConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Process-wide limit on oracle traffic, shared by cloning.
///
/// Bounds concurrent calls with a semaphore and, optionally, the total number of calls.
#[derive(Debug, Clone)]
pub struct OracleBudget {
    permits: Arc<Semaphore>,
    calls: Arc<AtomicU64>,
    max_total_calls: Option<u64>,
}

impl OracleBudget {
    pub fn new(max_concurrent_calls: usize, max_total_calls: Option<u64>) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            calls: Arc::new(AtomicU64::new(0)),
            max_total_calls,
        }
    }

    pub fn from_config(config: &OracleConfig) -> Self {
        Self::new(config.max_concurrent_calls, config.max_total_calls)
    }

    /// Wait for a concurrency slot and count one call against the total cap.
    ///
    /// Returns `None` once the cap is used up.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        let permit = self.permits.clone().acquire_owned().await.ok()?;
        self.calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match self.max_total_calls {
                Some(max) if n >= max => None,
                _ => Some(n + 1),
            })
            .ok()
            .map(|_| permit)
    }

    pub fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for OracleBudget {
    fn default() -> Self {
        Self::from_config(&OracleConfig::default())
    }
}
