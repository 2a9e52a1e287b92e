//! Scenario files for offline runs.
//!
//! A scenario scripts both adapters for one verification attempt:
//!
//! ```json
//! {
//!   "name": "good fix after localization",
//!   "availability": "supported",
//!   "frames": [
//!     { "earth_state": "initializing" },
//!     { "pose": { "latitude": 37.422, "longitude": -122.084, "horizontal_accuracy_m": 4.0 }, "repeat": 2 }
//!   ],
//!   "fixes": [
//!     { "after_ms": 300, "latitude": 37.421, "longitude": -122.083, "accuracy_m": 25.0, "provider": "network" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::scripted::ScriptedEngine;
use crate::engine::{
    Availability, DeviceCapabilities, EarthTrackingStatus, EngineFrame, GeospatialPose,
    InstallStatus, TrackingState,
};
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::location::scripted::{ScriptedFix, ScriptedLocationSource};
use crate::location::{CoarseFix, LocationProvider};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// A scripted engine failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorSpec {
    pub kind: ErrorKind,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorSpec {
    fn to_error(&self) -> EngineError {
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| format!("scripted {}", self.kind));
        EngineError::new(self.kind, message)
    }
}

/// One scripted poll result, optionally repeated.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameSpec {
    #[serde(default)]
    pub tracking_state: Option<TrackingState>,
    #[serde(default)]
    pub earth_state: Option<EarthTrackingStatus>,
    #[serde(default)]
    pub pose: Option<GeospatialPose>,
    /// Fail the poll instead of returning a frame.
    #[serde(default)]
    pub error: Option<ErrorSpec>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

impl FrameSpec {
    fn to_result(&self) -> EngineResult<EngineFrame> {
        if let Some(error) = &self.error {
            return Err(error.to_error());
        }
        let earth_state = self.earth_state.unwrap_or(if self.pose.is_some() {
            EarthTrackingStatus::Enabled
        } else {
            EarthTrackingStatus::Initializing
        });
        Ok(EngineFrame {
            tracking_state: self.tracking_state.unwrap_or(TrackingState::Tracking),
            earth_state,
            pose: self.pose,
        })
    }
}

/// One scripted coarse fix.
#[derive(Debug, Clone, Deserialize)]
pub struct FixSpec {
    /// Delay after the previous fix (or after subscribing).
    #[serde(default)]
    pub after_ms: u64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude_m: Option<f64>,
    pub accuracy_m: f64,
    #[serde(default)]
    pub bearing_deg: Option<f64>,
    #[serde(default = "default_provider")]
    pub provider: LocationProvider,
}

impl FixSpec {
    fn to_fix(&self) -> CoarseFix {
        let mut fix = CoarseFix::new(self.latitude, self.longitude, self.accuracy_m, self.provider);
        fix.altitude_m = self.altitude_m;
        fix.bearing_deg = self.bearing_deg;
        fix
    }
}

/// A complete scripted attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capabilities: DeviceCapabilities,
    pub availability: Availability,
    /// Answers to successive install requests.
    #[serde(default)]
    pub install: Vec<InstallStatus>,
    /// Failures for the first session-create calls.
    #[serde(default)]
    pub create_errors: Vec<ErrorSpec>,
    #[serde(default)]
    pub frame_latency_ms: u64,
    #[serde(default)]
    pub frames: Vec<FrameSpec>,
    #[serde(default)]
    pub fixes: Vec<FixSpec>,
    /// Cached fixes the location source reports before subscribing.
    #[serde(default)]
    pub last_known: Vec<FixSpec>,
}

/// Adapters and capabilities built from a [`Scenario`].
#[derive(Debug)]
pub struct ScenarioRig {
    pub engine: ScriptedEngine,
    pub location: ScriptedLocationSource,
    pub capabilities: DeviceCapabilities,
}

impl Scenario {
    pub fn load(path: &Path) -> ScenarioResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> ScenarioResult<Self> {
        let scenario: Self = serde_json::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> ScenarioResult<()> {
        if let Some(i) = self.frames.iter().position(|f| f.repeat == 0) {
            return Err(ScenarioError::Invalid(format!("frame {} has repeat 0", i)));
        }
        if let Some(i) = self
            .frames
            .iter()
            .position(|f| f.error.is_some() && f.pose.is_some())
        {
            return Err(ScenarioError::Invalid(format!(
                "frame {} has both a pose and an error",
                i
            )));
        }
        Ok(())
    }

    /// Display name, falling back to `unnamed`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    /// Build the scripted adapters.
    pub fn build(&self) -> ScenarioRig {
        let frames: Vec<_> = self
            .frames
            .iter()
            .flat_map(|spec| std::iter::repeat(spec.to_result()).take(spec.repeat as usize))
            .collect();
        let creates: Vec<EngineResult<()>> = self
            .create_errors
            .iter()
            .map(|spec| Err(spec.to_error()))
            .collect();

        let engine = ScriptedEngine::new(self.availability)
            .with_install_responses(self.install.iter().copied().map(Ok))
            .with_create_results(creates)
            .with_frames(frames)
            .with_frame_latency(Duration::from_millis(self.frame_latency_ms));

        let fixes = self.fixes.iter().map(|spec| ScriptedFix {
            after: Duration::from_millis(spec.after_ms),
            fix: spec.to_fix(),
        });
        let location = self
            .last_known
            .iter()
            .fold(ScriptedLocationSource::new(fixes), |source, spec| {
                source.with_last_known(spec.to_fix())
            });

        ScenarioRig {
            engine,
            location,
            capabilities: self.capabilities,
        }
    }
}

fn default_repeat() -> u32 {
    1
}

fn default_provider() -> LocationProvider {
    LocationProvider::Fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SessionConfig, TrackingEngineGateway};

    const SAMPLE: &str = r#"{
        "name": "sample",
        "availability": "needs_install",
        "install": ["requested", "installed"],
        "create_errors": [{ "kind": "transient", "message": "init race" }],
        "frames": [
            { "earth_state": "initializing", "repeat": 2 },
            { "pose": { "latitude": 37.422, "longitude": -122.084, "horizontal_accuracy_m": 4.0 } },
            { "error": { "kind": "authorization" } }
        ],
        "fixes": [{ "after_ms": 250, "latitude": 37.421, "longitude": -122.083, "accuracy_m": 30.0 }],
        "last_known": [{ "latitude": 37.4, "longitude": -122.0, "accuracy_m": 80.0, "provider": "network" }]
    }"#;

    #[test]
    fn test_parse_sample() {
        let scenario = Scenario::from_json(SAMPLE).unwrap();
        assert_eq!(scenario.display_name(), "sample");
        assert_eq!(scenario.availability, Availability::NeedsInstall);
        assert!(scenario.capabilities.is_supported());
        assert_eq!(scenario.frames.len(), 3);
        assert_eq!(scenario.frames[0].repeat, 2);
        assert_eq!(scenario.fixes[0].provider, LocationProvider::Fused);
        assert_eq!(scenario.frames[2].to_result().unwrap_err().kind(), ErrorKind::Authorization);
    }

    #[test]
    fn test_frame_defaults() {
        let spec: FrameSpec = serde_json::from_str(
            r#"{ "pose": { "latitude": 1.0, "longitude": 2.0, "horizontal_accuracy_m": 3.0 } }"#,
        )
        .unwrap();
        let frame = spec.to_result().unwrap();
        assert_eq!(frame.earth_state, EarthTrackingStatus::Enabled);
        assert!(frame.usable_pose().is_some());
    }

    #[test]
    fn test_rejects_zero_repeat() {
        let err = Scenario::from_json(
            r#"{ "availability": "supported", "frames": [{ "repeat": 0 }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScenarioError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_availability() {
        let err = Scenario::from_json(r#"{ "availability": "maybe" }"#).unwrap_err();
        assert!(matches!(err, ScenarioError::Parse(_)));
    }

    #[tokio::test]
    async fn test_build_expands_frames() {
        let rig = Scenario::from_json(SAMPLE).unwrap().build();
        let mut engine = rig.engine;
        assert!(engine.create_session(SessionConfig::default()).await.is_err());

        let mut session = engine
            .create_session(SessionConfig::default())
            .await
            .unwrap();
        assert!(session.poll().await.unwrap().pose.is_none());
        assert!(session.poll().await.unwrap().pose.is_none());
        assert!(session.poll().await.unwrap().pose.is_some());
        assert!(session.poll().await.is_err());
    }
}
