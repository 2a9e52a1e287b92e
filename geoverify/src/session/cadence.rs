//! Poll cadence.
//!
//! Polls are spaced 1s apart for the first 10, 2s apart up to poll 30 and
//! 3s apart afterwards. Poll `n` is scheduled `interval_for(n)` after the
//! previous poll, or after activation for the first one.

use std::time::Duration;

/// Default interval for the opening polls.
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(1000);

/// Last poll number that uses the initial interval.
pub const DEFAULT_INITIAL_POLLS: u32 = 10;

/// Default interval for the middle polls.
pub const DEFAULT_MIDDLE_INTERVAL: Duration = Duration::from_millis(2000);

/// Last poll number that uses the middle interval.
pub const DEFAULT_MIDDLE_POLLS: u32 = 30;

/// Default interval once the session has settled.
pub const DEFAULT_STEADY_INTERVAL: Duration = Duration::from_millis(3000);

/// Default poll ceiling for one verification attempt.
pub const DEFAULT_MAX_POLLS: u32 = 60;

/// Cadence tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CadenceConfig {
    pub initial_interval: Duration,
    pub initial_polls: u32,
    pub middle_interval: Duration,
    pub middle_polls: u32,
    pub steady_interval: Duration,
    /// Polls after which an undecided attempt times out.
    pub max_polls: u32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            initial_polls: DEFAULT_INITIAL_POLLS,
            middle_interval: DEFAULT_MIDDLE_INTERVAL,
            middle_polls: DEFAULT_MIDDLE_POLLS,
            steady_interval: DEFAULT_STEADY_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

impl CadenceConfig {
    /// Interval preceding poll number `poll` (1-based).
    pub fn interval_for(&self, poll: u32) -> Duration {
        if poll <= self.initial_polls {
            self.initial_interval
        } else if poll <= self.middle_polls {
            self.middle_interval
        } else {
            self.steady_interval
        }
    }
}

/// Counts polls and yields the wait before the next one.
#[derive(Debug, Clone)]
pub struct PollCadence {
    config: CadenceConfig,
    polls: u32,
}

impl PollCadence {
    pub fn new(config: CadenceConfig) -> Self {
        Self { config, polls: 0 }
    }

    /// Polls completed so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Record a completed poll and return its number.
    pub fn record_poll(&mut self) -> u32 {
        self.polls = self.polls.saturating_add(1);
        self.polls
    }

    /// Wait before the next poll.
    pub fn next_interval(&self) -> Duration {
        self.config.interval_for(self.polls.saturating_add(1))
    }

    /// Whether the poll ceiling has been reached.
    pub fn ceiling_reached(&self) -> bool {
        self.polls >= self.config.max_polls
    }
}

impl Default for PollCadence {
    fn default() -> Self {
        Self::new(CadenceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_bands() {
        let config = CadenceConfig::default();
        assert_eq!(config.interval_for(1), Duration::from_millis(1000));
        assert_eq!(config.interval_for(10), Duration::from_millis(1000));
        assert_eq!(config.interval_for(11), Duration::from_millis(2000));
        assert_eq!(config.interval_for(30), Duration::from_millis(2000));
        assert_eq!(config.interval_for(31), Duration::from_millis(3000));
        assert_eq!(config.interval_for(60), Duration::from_millis(3000));
    }

    #[test]
    fn test_full_attempt_duration() {
        let config = CadenceConfig::default();
        let total: Duration = (1..=config.max_polls).map(|n| config.interval_for(n)).sum();
        assert_eq!(total, Duration::from_secs(10 + 40 + 90));
    }

    #[test]
    fn test_cadence_counts_to_ceiling() {
        let mut cadence = PollCadence::default();
        assert_eq!(cadence.next_interval(), DEFAULT_INITIAL_INTERVAL);
        for _ in 0..10 {
            cadence.record_poll();
        }
        assert_eq!(cadence.next_interval(), DEFAULT_MIDDLE_INTERVAL);
        assert!(!cadence.ceiling_reached());

        for _ in 10..60 {
            cadence.record_poll();
        }
        assert_eq!(cadence.polls(), 60);
        assert!(cadence.ceiling_reached());
    }
}
