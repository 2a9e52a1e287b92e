//! Coarse location source adapter.
//!
//! Wraps platform location services (GPS, network, fused providers). Fixes are
//! pushed asynchronously on a channel, independently of the tracking engine,
//! and translated into [`GeospatialReading`]s with source
//! [`ReadingSource::Fallback`] by [`FixTranslator`].
//!
//! The subscription is started and stopped only by the session manager, so
//! platform listeners never outlive the session.

mod history;
pub mod scripted;

pub use history::{FixHistory, FixHistoryConfig};

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::EngineResult;
use crate::reading::{DataValidityError, GeospatialReading, ReadingSource};

/// Platform location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationProvider {
    Gps,
    Network,
    Fused,
}

impl fmt::Display for LocationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationProvider::Gps => write!(f, "gps"),
            LocationProvider::Network => write!(f, "network"),
            LocationProvider::Fused => write!(f, "fused"),
        }
    }
}

/// A location event from the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct CoarseFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude in meters, when the provider reports one.
    pub altitude_m: Option<f64>,
    /// Horizontal accuracy radius in meters.
    pub accuracy_m: f64,
    /// Bearing of travel, when the provider reports one.
    pub bearing_deg: Option<f64>,
    pub provider: LocationProvider,
    /// Wall-clock time the platform attached to the fix.
    pub timestamp: DateTime<Utc>,
}

impl CoarseFix {
    /// Fix stamped with the current time and no altitude or bearing.
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64, provider: LocationProvider) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m: None,
            accuracy_m,
            bearing_deg: None,
            provider,
            timestamp: Utc::now(),
        }
    }
}

/// Adapter over platform location services.
pub trait CoarseLocationSource: Send {
    /// Start receiving fixes no more often than `min_interval`.
    ///
    /// A second call replaces the previous subscription.
    fn subscribe(&mut self, min_interval: Duration) -> EngineResult<mpsc::Receiver<CoarseFix>>;

    /// Stop the current subscription, if any.
    fn unsubscribe(&mut self);

    /// Most recent cached fix for a provider.
    fn last_known(&self, provider: LocationProvider) -> Option<CoarseFix>;
}

/// Translates coarse fixes into fallback readings.
///
/// Fixes without a bearing get a heading derived from recent fix history.
#[derive(Debug)]
pub struct FixTranslator {
    history: FixHistory,
    max_accuracy_m: f64,
}

impl FixTranslator {
    pub fn new(max_accuracy_m: f64) -> Self {
        Self {
            history: FixHistory::new(),
            max_accuracy_m,
        }
    }

    /// Build a fallback reading captured at `captured_at` (session-relative).
    pub fn to_reading(
        &mut self,
        fix: &CoarseFix,
        captured_at: Duration,
    ) -> (GeospatialReading, Option<DataValidityError>) {
        self.history
            .record_position_at(fix.latitude, fix.longitude, captured_at);

        let heading_deg = fix
            .bearing_deg
            .or_else(|| self.history.derived_heading())
            .unwrap_or(0.0);

        GeospatialReading::new(
            fix.latitude,
            fix.longitude,
            fix.altitude_m.unwrap_or(0.0),
            heading_deg,
            fix.accuracy_m,
            ReadingSource::Fallback,
            captured_at,
            self.max_accuracy_m,
        )
    }

    /// Forget fix history (e.g. after a long pause).
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::DEFAULT_MAX_PLAUSIBLE_ACCURACY_M;

    #[test]
    fn test_translate_uses_bearing_when_present() {
        let mut translator = FixTranslator::new(DEFAULT_MAX_PLAUSIBLE_ACCURACY_M);
        let mut fix = CoarseFix::new(37.422, -122.084, 15.0, LocationProvider::Gps);
        fix.bearing_deg = Some(45.0);
        fix.altitude_m = Some(30.0);

        let (reading, err) = translator.to_reading(&fix, Duration::from_secs(3));
        assert!(err.is_none());
        assert!(reading.valid);
        assert_eq!(reading.source, ReadingSource::Fallback);
        assert_eq!(reading.heading_deg, 45.0);
        assert_eq!(reading.altitude_m, 30.0);
        assert_eq!(reading.captured_at, Duration::from_secs(3));
    }

    #[test]
    fn test_translate_derives_heading_from_history() {
        let mut translator = FixTranslator::new(DEFAULT_MAX_PLAUSIBLE_ACCURACY_M);
        let first = CoarseFix::new(37.4200, -122.0840, 15.0, LocationProvider::Network);
        let second = CoarseFix::new(37.4200, -122.0830, 15.0, LocationProvider::Network);

        let (r1, _) = translator.to_reading(&first, Duration::from_secs(1));
        assert_eq!(r1.heading_deg, 0.0);

        let (r2, _) = translator.to_reading(&second, Duration::from_secs(2));
        assert!((r2.heading_deg - 90.0).abs() < 1.0, "got {}", r2.heading_deg);
    }

    #[test]
    fn test_translate_marks_degenerate_fix_invalid() {
        let mut translator = FixTranslator::new(DEFAULT_MAX_PLAUSIBLE_ACCURACY_M);
        let fix = CoarseFix::new(0.0, 0.0, 15.0, LocationProvider::Network);
        let (reading, err) = translator.to_reading(&fix, Duration::ZERO);
        assert!(!reading.valid);
        assert_eq!(err, Some(DataValidityError::NullIsland));
    }

    #[test]
    fn test_reset_drops_heading_history() {
        let mut translator = FixTranslator::new(DEFAULT_MAX_PLAUSIBLE_ACCURACY_M);
        let first = CoarseFix::new(37.4200, -122.0840, 15.0, LocationProvider::Network);
        let second = CoarseFix::new(37.4210, -122.0840, 15.0, LocationProvider::Network);

        translator.to_reading(&first, Duration::from_secs(1));
        translator.reset();
        let (reading, _) = translator.to_reading(&second, Duration::from_secs(20));
        assert_eq!(reading.heading_deg, 0.0);
    }
}
