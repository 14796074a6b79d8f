//! Bounded polling policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Default number of status checks before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default pause between status checks, in seconds.
pub const DEFAULT_POLL_DELAY_SECS: u64 = 5;

/// Fixed-interval retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Maximum number of attempts, at least one.
    pub max_attempts: u32,
    /// Pause between attempts, in seconds.
    pub delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_secs: DEFAULT_POLL_DELAY_SECS,
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, delay_secs: u64) -> Self {
        Self {
            max_attempts,
            delay_secs,
        }
    }

    /// The pause between attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    /// Longest time spent sleeping when every attempt fails.
    ///
    /// Saturates instead of overflowing for very large delays.
    #[must_use]
    pub fn worst_case_wait(&self) -> Duration {
        let pauses = u64::from(self.max_attempts.saturating_sub(1));
        Duration::from_secs(self.delay_secs.saturating_mul(pauses))
    }

    /// Check that the policy allows at least one attempt.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidRetryPolicy` when `max_attempts` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CoreError::InvalidRetryPolicy(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
