//! Retry decisions and backoff delays.
//!
//! The attempt budget counts the first attempt, so `attempts = 3` means one
//! initial try plus at most two retries. Without a custom predicate only
//! network failures and timeouts are retried; a predicate replaces that
//! classification but never the budget.

use std::sync::Arc;
use std::time::Duration;

use tether_core::{Backoff, Error, ErrorKind, RetrySettings};

/// Custom retry predicate: `(error, attempt index) -> retry?`.
pub type RetryPredicate = Arc<dyn Fn(&Error, u32) -> bool + Send + Sync>;

/// Retry policy for one client.
#[derive(Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Backoff,
    pub initial_delay: Duration,
    pub max_delay: Option<Duration>,
    pub predicate: Option<RetryPredicate>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            attempts: settings.attempts.max(1),
            backoff: settings.backoff,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: settings.max_delay_ms.map(Duration::from_millis),
            predicate: None,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self { attempts: 1, ..Self::default() }
    }

    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Error, u32) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Whether a failure on attempt `attempt` (0-based) should be retried.
    pub fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        if attempt.saturating_add(1) >= self.attempts {
            return false;
        }
        if error.kind() == ErrorKind::Cancelled {
            return false;
        }

        match &self.predicate {
            Some(predicate) => predicate(error, attempt),
            None => error.is_transient(),
        }
    }

    /// Delay to wait after attempt `attempt` (0-based) fails.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Exponential => {
                let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                self.initial_delay.saturating_mul(factor)
            }
            Backoff::Linear => self.initial_delay.saturating_mul(attempt.saturating_add(1)),
        };

        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("attempts", &self.attempts)
            .field("backoff", &self.backoff)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}
