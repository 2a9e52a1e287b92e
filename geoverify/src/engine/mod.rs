//! Tracking engine gateway.
//!
//! Thin, state-tagged interface over the external AR tracking engine. Each
//! call yields a small closed set of result variants; native nullability and
//! exceptions are handled inside the adapter so the session manager only ever
//! sees [`Availability`], [`InstallStatus`], [`EngineFrame`] and
//! [`EngineError`](crate::error::EngineError).
//!
//! # Lifecycle
//!
//! ```text
//! check_availability ──► Supported ─────────────────────┐
//!                    ──► NeedsInstall ─► request_install ┤
//!                    ──► Unsupported                     ▼
//!                                              create_session ──► EngineSession
//!                                                                 resume / poll* / pause / close
//! ```
//!
//! Calls return boxed futures so an adapter can hand blocking native work to a
//! dedicated thread while the session worker stays responsive.

pub mod scripted;

use std::fmt;

use futures::future::BoxFuture;
use serde::Deserialize;

use crate::error::{EngineResult, ErrorKind};

/// Result of the device capability probe run before anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceCapabilities {
    /// A back-facing camera usable for tracking.
    pub camera: bool,
    /// Gyroscope and accelerometer present.
    pub motion_sensors: bool,
    /// The OS build supports the geospatial tracking mode.
    pub geospatial_mode: bool,
}

impl DeviceCapabilities {
    /// A device with every capability present.
    pub fn full() -> Self {
        Self {
            camera: true,
            motion_sensors: true,
            geospatial_mode: true,
        }
    }

    /// Whether the hardware can run a tracking session at all.
    pub fn is_supported(&self) -> bool {
        self.camera && self.motion_sensors && self.geospatial_mode
    }

    /// Name of the first missing capability, if any.
    pub fn missing(&self) -> Option<&'static str> {
        if !self.camera {
            Some("camera")
        } else if !self.motion_sensors {
            Some("motion sensors")
        } else if !self.geospatial_mode {
            Some("geospatial mode")
        } else {
            None
        }
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self::full()
    }
}

/// Engine availability on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Supported,
    NeedsInstall,
    Unsupported,
}

/// Answer to an install request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    /// The platform install flow was launched; ask again later.
    Requested,
    /// The engine is installed and ready.
    Installed,
}

/// Earth-tracking status as reported by the engine each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarthTrackingStatus {
    #[default]
    Initializing,
    Enabled,
    ErrorInternal,
    ErrorNotAuthorized,
    ErrorResourceExhausted,
}

impl EarthTrackingStatus {
    /// Error kind for the error states, `None` for Initializing/Enabled.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            EarthTrackingStatus::Initializing | EarthTrackingStatus::Enabled => None,
            EarthTrackingStatus::ErrorInternal => Some(ErrorKind::Transient),
            EarthTrackingStatus::ErrorNotAuthorized => Some(ErrorKind::Authorization),
            EarthTrackingStatus::ErrorResourceExhausted => Some(ErrorKind::ResourceExhausted),
        }
    }

    /// User-facing status message.
    pub fn message(&self) -> &'static str {
        match self {
            EarthTrackingStatus::Initializing => "Localizing, point the camera at buildings",
            EarthTrackingStatus::Enabled => "Earth tracking active",
            EarthTrackingStatus::ErrorInternal => "Tracking engine internal error",
            EarthTrackingStatus::ErrorNotAuthorized => "Positioning service not authorized",
            EarthTrackingStatus::ErrorResourceExhausted => "Positioning quota exhausted",
        }
    }
}

impl fmt::Display for EarthTrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EarthTrackingStatus::Initializing => "initializing",
            EarthTrackingStatus::Enabled => "enabled",
            EarthTrackingStatus::ErrorInternal => "error_internal",
            EarthTrackingStatus::ErrorNotAuthorized => "error_not_authorized",
            EarthTrackingStatus::ErrorResourceExhausted => "error_resource_exhausted",
        };
        f.write_str(s)
    }
}

/// Camera tracking state for the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    Tracking,
    #[default]
    Paused,
    Stopped,
}

/// Geospatial pose as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GeospatialPose {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude_m: f64,
    #[serde(default)]
    pub heading_deg: f64,
    pub horizontal_accuracy_m: f64,
}

impl GeospatialPose {
    /// Pose at sea level facing north.
    pub fn new(latitude: f64, longitude: f64, horizontal_accuracy_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m: 0.0,
            heading_deg: 0.0,
            horizontal_accuracy_m,
        }
    }
}

/// One advanced frame from the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineFrame {
    pub tracking_state: TrackingState,
    pub earth_state: EarthTrackingStatus,
    /// Present only while tracking with earth state Enabled.
    pub pose: Option<GeospatialPose>,
}

impl EngineFrame {
    /// Frame with a tracked pose.
    pub fn enabled(pose: GeospatialPose) -> Self {
        Self {
            tracking_state: TrackingState::Tracking,
            earth_state: EarthTrackingStatus::Enabled,
            pose: Some(pose),
        }
    }

    /// Frame while earth tracking is still localizing.
    pub fn initializing() -> Self {
        Self {
            tracking_state: TrackingState::Tracking,
            earth_state: EarthTrackingStatus::Initializing,
            pose: None,
        }
    }

    /// Frame carrying an earth-state error.
    pub fn earth_error(earth_state: EarthTrackingStatus) -> Self {
        Self {
            tracking_state: TrackingState::Tracking,
            earth_state,
            pose: None,
        }
    }

    /// The pose, when the frame is usable as a Primary reading.
    pub fn usable_pose(&self) -> Option<GeospatialPose> {
        if self.tracking_state == TrackingState::Tracking
            && self.earth_state == EarthTrackingStatus::Enabled
        {
            self.pose
        } else {
            None
        }
    }
}

/// Native session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Enable the geospatial (earth) tracking mode.
    pub geospatial: bool,
    /// Horizontal plane detection, used by visual-marker placement.
    pub plane_finding: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            geospatial: true,
            plane_finding: false,
        }
    }
}

/// A native tracking session, exclusively owned by the lifecycle manager.
pub trait EngineSession: Send {
    /// Resume camera and tracking.
    fn resume(&mut self) -> BoxFuture<'_, EngineResult<()>>;

    /// Pause tracking; state is kept.
    fn pause(&mut self) -> BoxFuture<'_, ()>;

    /// Advance one frame.
    fn poll(&mut self) -> BoxFuture<'_, EngineResult<EngineFrame>>;

    /// Release native resources. The session is unusable afterwards.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Entry point to the external tracking engine.
pub trait TrackingEngineGateway: Send {
    /// Query whether the engine can run on this device.
    fn check_availability(&mut self) -> BoxFuture<'_, Availability>;

    /// Ask the platform to install or update the engine.
    fn request_install(&mut self) -> BoxFuture<'_, EngineResult<InstallStatus>>;

    /// Create and configure a native session.
    fn create_session(
        &mut self,
        config: SessionConfig,
    ) -> BoxFuture<'_, EngineResult<Box<dyn EngineSession>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert!(DeviceCapabilities::full().is_supported());
        let caps = DeviceCapabilities {
            motion_sensors: false,
            ..DeviceCapabilities::full()
        };
        assert!(!caps.is_supported());
        assert_eq!(caps.missing(), Some("motion sensors"));
    }

    #[test]
    fn test_earth_state_error_kinds() {
        assert_eq!(EarthTrackingStatus::Enabled.error_kind(), None);
        assert_eq!(EarthTrackingStatus::Initializing.error_kind(), None);
        assert_eq!(
            EarthTrackingStatus::ErrorNotAuthorized.error_kind(),
            Some(ErrorKind::Authorization)
        );
        assert_eq!(
            EarthTrackingStatus::ErrorResourceExhausted.error_kind(),
            Some(ErrorKind::ResourceExhausted)
        );
        assert_eq!(
            EarthTrackingStatus::ErrorInternal.error_kind(),
            Some(ErrorKind::Transient)
        );
    }

    #[test]
    fn test_usable_pose_requires_tracking_and_enabled() {
        let pose = GeospatialPose::new(37.422, -122.084, 4.0);
        assert_eq!(EngineFrame::enabled(pose).usable_pose(), Some(pose));

        let mut frame = EngineFrame::enabled(pose);
        frame.tracking_state = TrackingState::Paused;
        assert_eq!(frame.usable_pose(), None);

        let mut frame = EngineFrame::enabled(pose);
        frame.earth_state = EarthTrackingStatus::Initializing;
        assert_eq!(frame.usable_pose(), None);
    }

    #[test]
    fn test_earth_state_deserialize() {
        let s: EarthTrackingStatus = serde_json::from_str("\"error_not_authorized\"").unwrap();
        assert_eq!(s, EarthTrackingStatus::ErrorNotAuthorized);
    }
}
