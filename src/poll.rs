use std::collections::HashSet;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::domain::{ResultRow, SearchHandle};
use crate::error::HarvestError;
use crate::pubchem::{PollOutcome, PubchemClient};

/// Wait schedule for redeeming a running PubChem search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_wait: Duration,
    pub max_attempts: u32,
    pub backoff_factor: f64,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(2),
            max_attempts: 5,
            backoff_factor: 2.0,
            max_wait: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    /// Wait before redemption attempt `attempt` (zero based).
    pub fn wait_before(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt as i32);
        let wait = self.initial_wait.as_secs_f64() * factor;
        Duration::from_secs_f64(wait.min(self.max_wait.as_secs_f64()))
    }
}

/// Redeems search handles. Each handle is redeemed at most once: `redeem` takes
/// the handle by value, and ListKeys seen before are refused.
pub struct PollController<'a, P: PubchemClient> {
    pubchem: &'a P,
    policy: PollPolicy,
    consumed: Mutex<HashSet<String>>,
}

impl<'a, P: PubchemClient> PollController<'a, P> {
    pub fn new(pubchem: &'a P, policy: PollPolicy) -> Self {
        Self {
            pubchem,
            policy,
            consumed: Mutex::new(HashSet::new()),
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn redeem(&self, handle: SearchHandle) -> Result<Vec<ResultRow>, HarvestError> {
        self.consume(&handle)?;

        let attempts = self.policy.max_attempts.max(1);
        for attempt in 0..attempts {
            let wait = self.policy.wait_before(attempt);
            tracing::debug!(
                list_key = %handle,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "waiting for search"
            );
            thread::sleep(wait);

            match self.pubchem.redeem_list_key(&handle) {
                Ok(PollOutcome::Ready(rows)) => {
                    tracing::info!(list_key = %handle, rows = rows.len(), "search completed");
                    return Ok(rows);
                }
                Ok(PollOutcome::Pending) => {
                    tracing::debug!(list_key = %handle, attempt, "search still running");
                }
                Ok(PollOutcome::Failed(reason)) => {
                    return Err(HarvestError::SearchUnavailable(reason));
                }
                Err(err) => return Err(HarvestError::SearchUnavailable(err.to_string())),
            }
        }

        Err(HarvestError::SearchTimedOut { attempts })
    }

    fn consume(&self, handle: &SearchHandle) -> Result<(), HarvestError> {
        let mut consumed = self
            .consumed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !consumed.insert(handle.as_str().to_string()) {
            return Err(HarvestError::HandleConsumed(handle.to_string()));
        }
        Ok(())
    }
}
