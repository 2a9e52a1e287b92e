//! Retry policy for transient engine failures.
//!
//! Session creation and per-frame polling can fail transiently (init races,
//! internal engine errors, momentary tracking loss). The lifecycle manager
//! retries those with exponential backoff and escalates to a terminal failure
//! once the attempt budget is spent.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use geoverify::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(250)));
//! assert_eq!(policy.delay_for_attempt(5), None);
//! ```

use std::time::Duration;

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Default initial delay for exponential backoff (250ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 250;

/// Default maximum delay for exponential backoff (4 seconds).
pub const DEFAULT_MAX_DELAY_MS: u64 = 4000;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default attempt budget, including the initial attempt.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How an operation handles transient failures.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// No retries - fail immediately on error.
    None,

    /// Exponential backoff with configurable parameters.
    ///
    /// The delay is multiplied after each failed attempt, up to a maximum delay.
    ExponentialBackoff {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay after the first failure.
        initial_delay: Duration,
        /// Maximum delay cap.
        max_delay: Duration,
        /// Multiplier applied to delay after each failure.
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Exponential backoff with the default base (250ms), cap (4s) and multiplier.
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Calculates the delay before the next attempt.
    ///
    /// # Arguments
    ///
    /// * `attempt` - Number of attempts made so far (1 after the first failure)
    ///
    /// # Returns
    ///
    /// The delay to wait before retrying, or `None` if the budget is spent.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt == 0 || attempt >= *max_attempts {
                    return None;
                }
                let factor = multiplier.powi((attempt - 1) as i32);
                let delay_ms = initial_delay.as_millis() as f64 * factor;
                let capped = delay_ms.min(max_delay.as_millis() as f64);
                Some(Duration::from_millis(capped as u64))
            }
        }
    }

    /// Returns the maximum number of attempts for this policy.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }
}
