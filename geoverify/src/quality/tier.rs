//! Quality tiers and the pure classification function.

use std::fmt;

use crate::reading::{GeospatialReading, DEFAULT_MAX_PLAUSIBLE_ACCURACY_M};

// =============================================================================
// Classifier Constants
// =============================================================================

/// Upper accuracy bound (inclusive) for [`QualityTier::Excellent`].
pub const DEFAULT_EXCELLENT_MAX_M: f64 = 5.0;

/// Upper accuracy bound (inclusive) for [`QualityTier::Good`].
pub const DEFAULT_GOOD_MAX_M: f64 = 10.0;

/// Upper accuracy bound (inclusive) for [`QualityTier::Fair`].
pub const DEFAULT_FAIR_MAX_M: f64 = 20.0;

/// Fraction over the Fair bound a reading must exceed to count toward demotion.
pub const DEFAULT_POOR_MARGIN: f64 = 0.2;

/// Consecutive over-margin readings required before demoting to Poor.
pub const DEFAULT_POOR_CONFIRMATIONS: u32 = 2;

/// Discrete quality bucket derived from horizontal accuracy.
///
/// Ordered: `Invalid < Poor < Fair < Good < Excellent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum QualityTier {
    #[default]
    Invalid,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityTier {
    /// Whether the tier is good enough to count toward verification.
    pub fn is_verifiable(&self) -> bool {
        *self >= QualityTier::Good
    }

    /// Short label for status text.
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Invalid => "invalid",
            QualityTier::Poor => "poor",
            QualityTier::Fair => "fair",
            QualityTier::Good => "good",
            QualityTier::Excellent => "excellent",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Thresholds for classification and hysteresis.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Inclusive upper bound for Excellent (meters).
    pub excellent_max_m: f64,
    /// Inclusive upper bound for Good (meters).
    pub good_max_m: f64,
    /// Inclusive upper bound for Fair (meters).
    pub fair_max_m: f64,
    /// Demotion to Poor needs accuracy above `fair_max_m * (1 + poor_margin)`.
    pub poor_margin: f64,
    /// Consecutive over-margin readings needed to demote to Poor.
    pub poor_confirmations: u32,
    /// Accuracy above this marks a reading invalid (meters).
    pub max_plausible_accuracy_m: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            excellent_max_m: DEFAULT_EXCELLENT_MAX_M,
            good_max_m: DEFAULT_GOOD_MAX_M,
            fair_max_m: DEFAULT_FAIR_MAX_M,
            poor_margin: DEFAULT_POOR_MARGIN,
            poor_confirmations: DEFAULT_POOR_CONFIRMATIONS,
            max_plausible_accuracy_m: DEFAULT_MAX_PLAUSIBLE_ACCURACY_M,
        }
    }
}

impl ClassifierConfig {
    /// Accuracy a reading must exceed to count toward demotion to Poor.
    pub fn demotion_threshold_m(&self) -> f64 {
        self.fair_max_m * (1.0 + self.poor_margin)
    }

    /// Raw tier for an accuracy figure, ignoring validity.
    fn tier_for_accuracy(&self, accuracy_m: f64) -> QualityTier {
        if accuracy_m <= self.excellent_max_m {
            QualityTier::Excellent
        } else if accuracy_m <= self.good_max_m {
            QualityTier::Good
        } else if accuracy_m <= self.fair_max_m {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }
}

/// Classify a reading with the default thresholds.
pub fn classify(reading: &GeospatialReading) -> QualityTier {
    classify_with(reading, &ClassifierConfig::default())
}

/// Classify a reading with explicit thresholds.
pub fn classify_with(reading: &GeospatialReading, config: &ClassifierConfig) -> QualityTier {
    if !reading.valid {
        return QualityTier::Invalid;
    }
    config.tier_for_accuracy(reading.horizontal_accuracy_m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::ReadingSource;
    use proptest::prelude::*;
    use std::time::Duration;

    fn reading(accuracy: f64) -> GeospatialReading {
        GeospatialReading {
            latitude: 37.422,
            longitude: -122.084,
            altitude_m: 12.0,
            heading_deg: 90.0,
            horizontal_accuracy_m: accuracy,
            source: ReadingSource::Primary,
            captured_at: Duration::ZERO,
            valid: true,
        }
    }

    #[test]
    fn test_tier_ordering() {
        assert!(QualityTier::Invalid < QualityTier::Poor);
        assert!(QualityTier::Poor < QualityTier::Fair);
        assert!(QualityTier::Fair < QualityTier::Good);
        assert!(QualityTier::Good < QualityTier::Excellent);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert_eq!(classify(&reading(5.0)), QualityTier::Excellent);
        assert_eq!(classify(&reading(5.01)), QualityTier::Good);
        assert_eq!(classify(&reading(10.0)), QualityTier::Good);
        assert_eq!(classify(&reading(20.0)), QualityTier::Fair);
        assert_eq!(classify(&reading(20.01)), QualityTier::Poor);
    }

    #[test]
    fn test_invalid_reading_is_invalid_tier() {
        let mut r = reading(1.0);
        r.valid = false;
        assert_eq!(classify(&r), QualityTier::Invalid);
    }

    #[test]
    fn test_demotion_threshold() {
        let config = ClassifierConfig::default();
        assert!((config.demotion_threshold_m() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_verifiable_tiers() {
        assert!(QualityTier::Excellent.is_verifiable());
        assert!(QualityTier::Good.is_verifiable());
        assert!(!QualityTier::Fair.is_verifiable());
        assert!(!QualityTier::Invalid.is_verifiable());
    }

    proptest! {
        #[test]
        fn prop_excellent_at_or_below_five(accuracy in 0.001f64..=5.0) {
            prop_assert_eq!(classify(&reading(accuracy)), QualityTier::Excellent);
        }

        #[test]
        fn prop_tier_monotonic_in_accuracy(a in 0.001f64..100.0, b in 0.001f64..100.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(classify(&reading(lo)) >= classify(&reading(hi)));
        }
    }
}
