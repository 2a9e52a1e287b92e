//! Unified geospatial reading published to consumers.
//!
//! A [`GeospatialReading`] is produced once per successful engine poll
//! (source [`ReadingSource::Primary`]) or once per admitted coarse location
//! event (source [`ReadingSource::Fallback`]). Readings are immutable values;
//! degenerate data is never dropped, it is marked `valid = false` so the
//! quality classifier can report it as [`QualityTier::Invalid`].
//!
//! [`QualityTier::Invalid`]: crate::quality::QualityTier::Invalid

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Coordinates closer to (0, 0) than this are treated as "null island".
const NULL_ISLAND_EPSILON_DEG: f64 = 1e-9;

/// Default upper bound on a plausible horizontal accuracy (meters).
pub const DEFAULT_MAX_PLAUSIBLE_ACCURACY_M: f64 = 5000.0;

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingSource {
    /// The tracking engine's fused geospatial pose.
    Primary,
    /// Platform coarse location services.
    Fallback,
}

impl fmt::Display for ReadingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingSource::Primary => write!(f, "primary"),
            ReadingSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Why a reading was marked invalid.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DataValidityError {
    #[error("non-finite coordinate")]
    NonFinite,
    #[error("latitude {0} out of range")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} out of range")]
    LongitudeOutOfRange(f64),
    #[error("degenerate coordinates (0, 0)")]
    NullIsland,
    #[error("non-positive horizontal accuracy {0}")]
    NonPositiveAccuracy(f64),
    #[error("implausible horizontal accuracy {accuracy} m (limit {limit} m)")]
    ImplausibleAccuracy { accuracy: f64, limit: f64 },
}

/// Check raw position data against the validity rules.
///
/// Fails when either coordinate is non-finite or out of range, when both
/// coordinates are zero, or when the accuracy is non-positive or above
/// `max_accuracy_m`.
pub fn check_validity(
    latitude: f64,
    longitude: f64,
    horizontal_accuracy_m: f64,
    max_accuracy_m: f64,
) -> Result<(), DataValidityError> {
    if !latitude.is_finite() || !longitude.is_finite() || !horizontal_accuracy_m.is_finite() {
        return Err(DataValidityError::NonFinite);
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(DataValidityError::LatitudeOutOfRange(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(DataValidityError::LongitudeOutOfRange(longitude));
    }
    if latitude.abs() < NULL_ISLAND_EPSILON_DEG && longitude.abs() < NULL_ISLAND_EPSILON_DEG {
        return Err(DataValidityError::NullIsland);
    }
    if horizontal_accuracy_m <= 0.0 {
        return Err(DataValidityError::NonPositiveAccuracy(horizontal_accuracy_m));
    }
    if horizontal_accuracy_m > max_accuracy_m {
        return Err(DataValidityError::ImplausibleAccuracy {
            accuracy: horizontal_accuracy_m,
            limit: max_accuracy_m,
        });
    }
    Ok(())
}

/// A single position estimate on the public stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeospatialReading {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude above the WGS84 ellipsoid in meters.
    pub altitude_m: f64,
    /// Heading in degrees clockwise from true north.
    pub heading_deg: f64,
    /// Horizontal accuracy radius in meters (68% confidence).
    pub horizontal_accuracy_m: f64,
    /// Which source produced the reading.
    pub source: ReadingSource,
    /// Capture time relative to the session start.
    pub captured_at: Duration,
    /// Whether the data passed the validity rules.
    pub valid: bool,
}

impl GeospatialReading {
    /// Build a reading, applying the validity rules.
    ///
    /// Returns the reading and, when it was marked invalid, the reason.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        latitude: f64,
        longitude: f64,
        altitude_m: f64,
        heading_deg: f64,
        horizontal_accuracy_m: f64,
        source: ReadingSource,
        captured_at: Duration,
        max_accuracy_m: f64,
    ) -> (Self, Option<DataValidityError>) {
        let validity = check_validity(latitude, longitude, horizontal_accuracy_m, max_accuracy_m);
        let reading = Self {
            latitude,
            longitude,
            altitude_m,
            heading_deg,
            horizontal_accuracy_m,
            source,
            captured_at,
            valid: validity.is_ok(),
        };
        (reading, validity.err())
    }

    pub fn is_primary(&self) -> bool {
        self.source == ReadingSource::Primary
    }
}

impl fmt::Display for GeospatialReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6}, {:.6} ±{:.1}m hdg {:.0}° [{}{}]",
            self.latitude,
            self.longitude,
            self.horizontal_accuracy_m,
            self.heading_deg,
            self.source,
            if self.valid { "" } else { ", invalid" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: f64 = DEFAULT_MAX_PLAUSIBLE_ACCURACY_M;

    fn reading(lat: f64, lon: f64, accuracy: f64) -> GeospatialReading {
        GeospatialReading::new(
            lat,
            lon,
            10.0,
            0.0,
            accuracy,
            ReadingSource::Primary,
            Duration::ZERO,
            LIMIT,
        )
        .0
    }

    #[test]
    fn test_valid_reading() {
        let r = reading(37.422, -122.084, 4.0);
        assert!(r.valid);
        assert!(r.is_primary());
    }

    #[test]
    fn test_null_island_is_invalid() {
        assert_eq!(
            check_validity(0.0, 0.0, 3.0, LIMIT),
            Err(DataValidityError::NullIsland)
        );
        assert!(!reading(0.0, 0.0, 3.0).valid);
    }

    #[test]
    fn test_single_zero_coordinate_is_valid() {
        // Equator and prime meridian are real places.
        assert!(check_validity(0.0, 9.99, 3.0, LIMIT).is_ok());
        assert!(check_validity(51.48, 0.0, 3.0, LIMIT).is_ok());
    }

    #[test]
    fn test_non_positive_accuracy_is_invalid() {
        assert!(matches!(
            check_validity(37.0, -122.0, 0.0, LIMIT),
            Err(DataValidityError::NonPositiveAccuracy(_))
        ));
        assert!(matches!(
            check_validity(37.0, -122.0, -1.0, LIMIT),
            Err(DataValidityError::NonPositiveAccuracy(_))
        ));
    }

    #[test]
    fn test_implausible_accuracy_is_invalid() {
        assert!(check_validity(37.0, -122.0, LIMIT, LIMIT).is_ok());
        assert!(matches!(
            check_validity(37.0, -122.0, LIMIT + 1.0, LIMIT),
            Err(DataValidityError::ImplausibleAccuracy { .. })
        ));
    }

    #[test]
    fn test_out_of_range_and_nan() {
        assert!(matches!(
            check_validity(91.0, 0.5, 3.0, LIMIT),
            Err(DataValidityError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            check_validity(10.0, 181.0, 3.0, LIMIT),
            Err(DataValidityError::LongitudeOutOfRange(_))
        ));
        assert_eq!(
            check_validity(f64::NAN, 1.0, 3.0, LIMIT),
            Err(DataValidityError::NonFinite)
        );
    }

    #[test]
    fn test_display_marks_invalid() {
        let r = reading(0.0, 0.0, 3.0);
        assert!(r.to_string().contains("invalid"));
        assert!(r.to_string().contains("primary"));
    }
}
