//! Hysteresis over the raw classification.
//!
//! Tiers move up immediately, and move down immediately between `Excellent`,
//! `Good` and `Fair`. Only the drop into `Poor` is damped: the accuracy must
//! exceed the Fair bound by the configured margin for
//! `poor_confirmations` consecutive readings. While a demotion is pending the
//! previous tier is held and the snapshot reports `stable = false`.

use super::tier::{classify_with, ClassifierConfig, QualityTier};
use crate::reading::GeospatialReading;

/// Current tier plus whether hysteresis has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSnapshot {
    /// Reported tier.
    pub tier: QualityTier,
    /// False while a demotion to Poor is pending confirmation.
    pub stable: bool,
}

impl Default for TierSnapshot {
    fn default() -> Self {
        Self {
            tier: QualityTier::Invalid,
            stable: true,
        }
    }
}

/// Tracks the reported tier across a stream of readings.
#[derive(Debug)]
pub struct TierTracker {
    config: ClassifierConfig,
    current: QualityTier,
    /// Consecutive over-margin readings seen while above Poor.
    pending_poor: u32,
}

impl TierTracker {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            current: QualityTier::Invalid,
            pending_poor: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ClassifierConfig::default())
    }

    /// Current snapshot without consuming a reading.
    pub fn snapshot(&self) -> TierSnapshot {
        TierSnapshot {
            tier: self.current,
            stable: self.pending_poor == 0,
        }
    }

    /// Feed a reading and return the updated snapshot.
    pub fn update(&mut self, reading: &GeospatialReading) -> TierSnapshot {
        let raw = classify_with(reading, &self.config);

        if raw != QualityTier::Poor || self.current <= QualityTier::Poor {
            self.pending_poor = 0;
            self.current = raw;
            return self.snapshot();
        }

        // Above Poor and the raw tier says Poor.
        if reading.horizontal_accuracy_m > self.config.demotion_threshold_m() {
            self.pending_poor += 1;
            if self.pending_poor >= self.config.poor_confirmations {
                tracing::debug!(
                    from = %self.current,
                    accuracy_m = reading.horizontal_accuracy_m,
                    "Tier demoted to poor"
                );
                self.current = QualityTier::Poor;
                self.pending_poor = 0;
            }
        } else {
            // Inside the hysteresis band: treat as the Fair edge.
            self.pending_poor = 0;
            self.current = QualityTier::Fair;
        }

        self.snapshot()
    }
}

impl Default for TierTracker {
    fn default() -> Self {
        Self::with_defaults()
    }
}
