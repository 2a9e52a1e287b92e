//! Coarse fix history and derived heading.
//!
//! Keeps recent fallback positions so a heading can be derived from position
//! deltas when the platform provider reports no bearing.
//!
//! # Design
//!
//! - Stores the last 30 samples, at most one per second
//! - Heading is the initial great-circle bearing from the oldest to the newest sample
//! - Samples closer together than ~10m give no heading (too noisy)

use std::collections::VecDeque;
use std::time::Duration;

/// Default maximum samples to retain.
const DEFAULT_MAX_SAMPLES: usize = 30;

/// Default minimum interval between samples.
const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum distance (in degrees) to derive a reliable heading.
/// ~10m at the equator.
const MIN_DISTANCE_FOR_HEADING_DEG: f64 = 0.0001;

#[derive(Debug, Clone, Copy)]
struct FixSample {
    latitude: f64,
    longitude: f64,
    /// Session-relative capture time.
    at: Duration,
}

/// Configuration for fix history.
#[derive(Debug, Clone)]
pub struct FixHistoryConfig {
    /// Maximum samples to retain.
    pub max_samples: usize,
    /// Minimum interval between samples.
    pub sample_interval: Duration,
    /// Minimum distance for heading derivation.
    pub min_distance_deg: f64,
}

impl Default for FixHistoryConfig {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            min_distance_deg: MIN_DISTANCE_FOR_HEADING_DEG,
        }
    }
}

/// Recent coarse fixes, oldest first.
#[derive(Debug)]
pub struct FixHistory {
    samples: VecDeque<FixSample>,
    config: FixHistoryConfig,
}

impl Default for FixHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl FixHistory {
    pub fn new() -> Self {
        Self::with_config(FixHistoryConfig::default())
    }

    pub fn with_config(config: FixHistoryConfig) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.max_samples),
            config,
        }
    }

    /// Record a fix captured at `at`.
    ///
    /// Samples arriving faster than the sample interval are ignored.
    /// Returns true if the sample was recorded.
    pub fn record_position_at(&mut self, latitude: f64, longitude: f64, at: Duration) -> bool {
        if let Some(last) = self.samples.back() {
            if at.saturating_sub(last.at) < self.config.sample_interval {
                return false;
            }
        }

        self.samples.push_back(FixSample {
            latitude,
            longitude,
            at,
        });

        while self.samples.len() > self.config.max_samples {
            self.samples.pop_front();
        }

        true
    }

    /// Heading derived from the oldest to the newest sample.
    ///
    /// Returns `None` with fewer than two samples or when they are too close
    /// together. Degrees 0-360, 0 = North, 90 = East.
    pub fn derived_heading(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }

        let oldest = self.samples.front()?;
        let newest = self.samples.back()?;

        // Longitude degrees shrink with latitude.
        let mean_lat = ((oldest.latitude + newest.latitude) / 2.0).to_radians();
        let dlat = newest.latitude - oldest.latitude;
        let dlon = (newest.longitude - oldest.longitude) * mean_lat.cos();
        if (dlat * dlat + dlon * dlon).sqrt() < self.config.min_distance_deg {
            return None;
        }

        Some(calculate_bearing(
            oldest.latitude,
            oldest.longitude,
            newest.latitude,
            newest.longitude,
        ))
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Initial great-circle bearing from the first point to the second.
///
/// Returns degrees 0-360, where 0 = North, 90 = East.
fn calculate_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let x = dlon.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    let bearing_deg = x.atan2(y).to_degrees();

    if bearing_deg < 0.0 {
        bearing_deg + 360.0
    } else {
        bearing_deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_rate_limiting() {
        let mut history = FixHistory::new();
        assert!(history.record_position_at(53.5, 10.0, secs(0)));
        assert!(!history.record_position_at(53.6, 10.1, Duration::from_millis(500)));
        assert!(history.record_position_at(53.6, 10.1, secs(1)));
        assert_eq!(history.sample_count(), 2);
    }

    #[test]
    fn test_max_samples_trim() {
        let mut history = FixHistory::with_config(FixHistoryConfig {
            max_samples: 5,
            ..Default::default()
        });
        for i in 0..10 {
            history.record_position_at(53.0 + i as f64 * 0.01, 10.0, secs(i));
        }
        assert_eq!(history.sample_count(), 5);
        assert!((history.samples.front().map(|s| s.latitude).unwrap_or(0.0) - 53.05).abs() < 1e-9);
    }

    #[test]
    fn test_heading_north_and_southwest() {
        let mut history = FixHistory::new();
        history.record_position_at(53.0, 10.0, secs(0));
        history.record_position_at(53.01, 10.0, secs(10));
        let heading = history.derived_heading().unwrap();
        assert!(heading.abs() < 1.0, "got {}", heading);

        history.clear();
        history.record_position_at(53.0, 10.0, secs(0));
        history.record_position_at(52.99, 9.99, secs(10));
        let heading = history.derived_heading().unwrap();
        // Equal degree steps point well south of southwest at 53N.
        assert!((heading - 211.05).abs() < 0.1, "got {}", heading);
    }

    #[test]
    fn test_off_axis_heading_at_mid_latitude() {
        let mut history = FixHistory::new();
        history.record_position_at(37.42, -122.08, secs(0));
        history.record_position_at(37.421, -122.079, secs(5));
        let heading = history.derived_heading().unwrap();
        assert!((heading - 38.46).abs() < 0.05, "got {}", heading);
    }

    #[test]
    fn test_min_distance_scales_with_latitude() {
        // 0.00015 deg of longitude is ~17m at the equator but ~8m at 60N.
        let mut history = FixHistory::new();
        history.record_position_at(0.0001, 10.0, secs(0));
        history.record_position_at(0.0001, 10.00015, secs(5));
        assert!(history.derived_heading().is_some());

        history.clear();
        history.record_position_at(60.0, 10.0, secs(0));
        history.record_position_at(60.0, 10.00015, secs(5));
        assert!(history.derived_heading().is_none());
    }

    #[test]
    fn test_no_heading_when_stationary_or_sparse() {
        let mut history = FixHistory::new();
        assert!(history.derived_heading().is_none());
        history.record_position_at(53.0, 10.0, secs(0));
        assert!(history.derived_heading().is_none());
        history.record_position_at(53.0, 10.0, secs(5));
        assert!(history.derived_heading().is_none());
    }

    #[test]
    fn test_bearing_calculation() {
        assert!((calculate_bearing(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 0.1);
        assert!((calculate_bearing(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 0.1);
        assert!((calculate_bearing(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 0.1);
        assert!((calculate_bearing(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 0.1);
        assert!((calculate_bearing(53.0, 10.0, 53.01, 10.0) - 0.0).abs() < 0.1);
    }
}
