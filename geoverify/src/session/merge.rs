//! Fallback merge policy.
//!
//! Fallback readings flow into the unified stream while the session is not
//! yet Running, and again once the Primary source has gone quiet for
//! `primary_stale_cycles` consecutive poll cycles. A single valid Primary
//! reading silences the Fallback source again.

use std::time::Duration;

use super::state::SessionState;

/// Default number of poll cycles without a valid Primary reading before
/// Fallback readings are readmitted.
pub const DEFAULT_PRIMARY_STALE_CYCLES: u32 = 5;

/// Default minimum interval requested from the location source.
pub const DEFAULT_FALLBACK_MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Merge tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    pub primary_stale_cycles: u32,
    pub fallback_min_interval: Duration,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            primary_stale_cycles: DEFAULT_PRIMARY_STALE_CYCLES,
            fallback_min_interval: DEFAULT_FALLBACK_MIN_INTERVAL,
        }
    }
}

/// Decides whether Fallback readings reach the unified stream.
#[derive(Debug)]
pub struct FallbackMerger {
    stale_cycles: u32,
    cycles_without_primary: u32,
    primary_live: bool,
}

impl FallbackMerger {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            stale_cycles: config.primary_stale_cycles,
            cycles_without_primary: 0,
            primary_live: false,
        }
    }

    /// Record the end of a poll cycle.
    ///
    /// Errors and frames without a pose count as cycles without a valid
    /// Primary reading.
    pub fn record_cycle(&mut self, valid_primary: bool) {
        if valid_primary {
            if !self.primary_live {
                tracing::debug!("Primary readings live, fallback suppressed");
            }
            self.cycles_without_primary = 0;
            self.primary_live = true;
            return;
        }

        self.cycles_without_primary = self.cycles_without_primary.saturating_add(1);
        if self.primary_live && self.cycles_without_primary >= self.stale_cycles {
            tracing::info!(
                cycles = self.cycles_without_primary,
                "Primary readings stale, fallback resumed"
            );
            self.primary_live = false;
        }
    }

    /// Whether a Fallback reading may be published in `state`.
    pub fn admits_fallback(&self, state: SessionState) -> bool {
        state != SessionState::Running || !self.primary_live
    }

    pub fn primary_live(&self) -> bool {
        self.primary_live
    }

    /// Forget Primary liveness, e.g. when a fresh session starts.
    pub fn reset(&mut self) {
        self.cycles_without_primary = 0;
        self.primary_live = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_admitted_before_running() {
        let mut merger = FallbackMerger::new(&MergeConfig::default());
        merger.record_cycle(true);
        assert!(merger.admits_fallback(SessionState::Initializing));
        assert!(merger.admits_fallback(SessionState::InstallRequired));
        assert!(!merger.admits_fallback(SessionState::Running));
    }

    #[test]
    fn test_fallback_admitted_until_first_primary() {
        let merger = FallbackMerger::new(&MergeConfig::default());
        assert!(merger.admits_fallback(SessionState::Running));
    }

    #[test]
    fn test_fallback_resumes_after_stale_window() {
        let mut merger = FallbackMerger::new(&MergeConfig::default());
        merger.record_cycle(true);

        for _ in 0..4 {
            merger.record_cycle(false);
            assert!(!merger.admits_fallback(SessionState::Running));
        }
        merger.record_cycle(false);
        assert!(merger.admits_fallback(SessionState::Running));

        merger.record_cycle(true);
        assert!(!merger.admits_fallback(SessionState::Running));
    }

    #[test]
    fn test_intermittent_primary_keeps_fallback_suppressed() {
        let mut merger = FallbackMerger::new(&MergeConfig::default());
        for _ in 0..20 {
            merger.record_cycle(true);
            merger.record_cycle(false);
            merger.record_cycle(false);
        }
        assert!(merger.primary_live());
    }

    #[test]
    fn test_reset_forgets_primary() {
        let mut merger = FallbackMerger::new(&MergeConfig::default());
        merger.record_cycle(true);
        assert!(!merger.admits_fallback(SessionState::Running));

        merger.reset();
        assert!(!merger.primary_live());
        assert!(merger.admits_fallback(SessionState::Running));
    }
}
