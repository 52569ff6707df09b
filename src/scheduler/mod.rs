//! Retry scheduler - backoff polling and named locks
//!
//! Polling state lives in the caller's persisted record, so a stopped
//! scheduler loses nothing: the next process picks the same checks up again.

use crate::config::PollConfig;
use crate::error::SwapResult;

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Exponential backoff between polls
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    /// `None` polls until a result, a fatal error or shutdown
    pub max_attempts: Option<u32>,
}

impl BackoffPolicy {
    /// Delay after the given number of failed attempts (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl From<&PollConfig> for BackoffPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            max_attempts: config.max_attempts,
        }
    }
}

/// Removes the in-flight marker when a polling cycle ends
struct InFlight<'a> {
    keys: &'a DashMap<String, ()>,
    key: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}

/// Shared polling and locking helpers
pub struct RetryScheduler {
    policy: BackoffPolicy,
    /// Keys with a polling cycle in progress
    in_flight: DashMap<String, ()>,
    /// Named locks, created on first use
    locks: DashMap<String, Arc<Mutex<()>>>,
    /// Shutdown flag
    shutdown: Arc<RwLock<bool>>,
}

impl RetryScheduler {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            in_flight: DashMap::new(),
            locks: DashMap::new(),
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Run `check` until it yields a value. `Ok(None)` and retryable errors
    /// schedule another attempt after the backoff delay; any other error
    /// ends the cycle.
    ///
    /// Returns `Ok(None)` without calling `check` when a cycle for `key` is
    /// already running, and when attempts run out or the scheduler stops.
    pub async fn with_interval<T, F, Fut>(&self, key: &str, mut check: F) -> SwapResult<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SwapResult<Option<T>>>,
    {
        if self.in_flight.insert(key.to_string(), ()).is_some() {
            debug!("Polling for {} already in flight", key);
            return Ok(None);
        }
        let _guard = InFlight {
            keys: &self.in_flight,
            key: key.to_string(),
        };

        let mut attempts = 0u32;
        loop {
            if self.is_stopped().await {
                debug!("Scheduler stopped, leaving {} for later", key);
                return Ok(None);
            }

            attempts += 1;
            crate::metrics::record_poll_attempt();

            match check().await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => debug!("{} not ready (attempt {})", key, attempts),
                Err(e) if e.is_retryable() => {
                    warn!("Transient failure polling {} (attempt {}): {}", key, attempts, e)
                }
                Err(e) => return Err(e),
            }

            if self.policy.max_attempts.map_or(false, |max| attempts >= max) {
                debug!("Giving up on {} after {} attempts", key, attempts);
                return Ok(None);
            }

            sleep(self.policy.delay(attempts)).await;
        }
    }

    /// Acquire the named lock; released when the guard drops
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }

    pub async fn is_stopped(&self) -> bool {
        *self.shutdown.read().await
    }

    /// Stop all polling cycles at their next attempt
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
    }
}
