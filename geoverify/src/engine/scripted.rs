//! Scripted tracking engine for tests and offline simulation.
//!
//! [`ScriptedEngine`] replays a fixed script of availability answers,
//! install answers, session-create results and frames. Every call is recorded
//! in a shared [`EngineCallLog`] so tests can assert what the manager did
//! (and did not) ask of the engine.
//!
//! # Example
//!
//! ```
//! use geoverify::engine::scripted::ScriptedEngine;
//! use geoverify::engine::{Availability, EngineFrame, GeospatialPose};
//!
//! let engine = ScriptedEngine::new(Availability::Supported)
//!     .with_frames([Ok(EngineFrame::enabled(GeospatialPose::new(37.422, -122.084, 4.0)))]);
//! let log = engine.call_log();
//! assert!(log.calls().is_empty());
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;

use super::{
    Availability, EngineFrame, EngineSession, InstallStatus, SessionConfig, TrackingEngineGateway,
};
use crate::error::EngineResult;

/// A call made against the scripted engine or one of its sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CheckAvailability,
    RequestInstall,
    CreateSession,
    Resume,
    Pause,
    Poll,
    Close,
}

/// Shared, cloneable record of engine calls.
#[derive(Debug, Clone, Default)]
pub struct EngineCallLog {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl EngineCallLog {
    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    /// All calls so far, oldest first.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Number of calls matching `call`.
    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }
}

/// Frame script shared between the engine and its sessions.
#[derive(Debug, Default)]
struct FrameScript {
    frames: VecDeque<EngineResult<EngineFrame>>,
    last: Option<EngineResult<EngineFrame>>,
}

impl FrameScript {
    /// Next scripted frame; repeats the last one once the script runs out.
    fn next(&mut self) -> EngineResult<EngineFrame> {
        if let Some(frame) = self.frames.pop_front() {
            self.last = Some(frame.clone());
            return frame;
        }
        self.last
            .clone()
            .unwrap_or_else(|| Ok(EngineFrame::initializing()))
    }
}

/// Engine fake driven by a script.
#[derive(Debug)]
pub struct ScriptedEngine {
    availability: Availability,
    install_responses: VecDeque<EngineResult<InstallStatus>>,
    create_results: VecDeque<EngineResult<()>>,
    resume_results: Arc<Mutex<VecDeque<EngineResult<()>>>>,
    frames: Arc<Mutex<FrameScript>>,
    frame_latency: Duration,
    log: EngineCallLog,
}

impl ScriptedEngine {
    /// Create an engine that answers `availability` and has no frames.
    pub fn new(availability: Availability) -> Self {
        Self {
            availability,
            install_responses: VecDeque::new(),
            create_results: VecDeque::new(),
            resume_results: Arc::new(Mutex::new(VecDeque::new())),
            frames: Arc::new(Mutex::new(FrameScript::default())),
            frame_latency: Duration::ZERO,
            log: EngineCallLog::default(),
        }
    }

    /// Answers for successive install requests (default: Installed).
    pub fn with_install_responses(
        mut self,
        responses: impl IntoIterator<Item = EngineResult<InstallStatus>>,
    ) -> Self {
        self.install_responses = responses.into_iter().collect();
        self
    }

    /// Results for successive session-create calls (default: success).
    pub fn with_create_results(mut self, results: impl IntoIterator<Item = EngineResult<()>>) -> Self {
        self.create_results = results.into_iter().collect();
        self
    }

    /// Results for successive session resumes across all sessions
    /// (default: success).
    pub fn with_resume_results(mut self, results: impl IntoIterator<Item = EngineResult<()>>) -> Self {
        *self.resume_results.lock() = results.into_iter().collect();
        self
    }

    /// Frames returned by successive polls.
    pub fn with_frames(mut self, frames: impl IntoIterator<Item = EngineResult<EngineFrame>>) -> Self {
        self.frames.lock().frames = frames.into_iter().collect();
        self
    }

    /// Simulated duration of each native frame call.
    pub fn with_frame_latency(mut self, latency: Duration) -> Self {
        self.frame_latency = latency;
        self
    }

    /// Handle to the call log; stays valid after the engine is moved.
    pub fn call_log(&self) -> EngineCallLog {
        self.log.clone()
    }
}

impl TrackingEngineGateway for ScriptedEngine {
    fn check_availability(&mut self) -> BoxFuture<'_, Availability> {
        self.log.record(EngineCall::CheckAvailability);
        let availability = self.availability;
        async move { availability }.boxed()
    }

    fn request_install(&mut self) -> BoxFuture<'_, EngineResult<InstallStatus>> {
        self.log.record(EngineCall::RequestInstall);
        let response = self
            .install_responses
            .pop_front()
            .unwrap_or(Ok(InstallStatus::Installed));
        if matches!(response, Ok(InstallStatus::Installed)) {
            self.availability = Availability::Supported;
        }
        async move { response }.boxed()
    }

    fn create_session(
        &mut self,
        _config: SessionConfig,
    ) -> BoxFuture<'_, EngineResult<Box<dyn EngineSession>>> {
        self.log.record(EngineCall::CreateSession);
        let result = self.create_results.pop_front().unwrap_or(Ok(()));
        let session = ScriptedSession {
            resume_results: Arc::clone(&self.resume_results),
            frames: Arc::clone(&self.frames),
            frame_latency: self.frame_latency,
            log: self.log.clone(),
        };
        async move { result.map(|()| Box::new(session) as Box<dyn EngineSession>) }.boxed()
    }
}

/// Session created by [`ScriptedEngine`].
#[derive(Debug)]
struct ScriptedSession {
    resume_results: Arc<Mutex<VecDeque<EngineResult<()>>>>,
    frames: Arc<Mutex<FrameScript>>,
    frame_latency: Duration,
    log: EngineCallLog,
}

impl EngineSession for ScriptedSession {
    fn resume(&mut self) -> BoxFuture<'_, EngineResult<()>> {
        self.log.record(EngineCall::Resume);
        let result = self.resume_results.lock().pop_front().unwrap_or(Ok(()));
        async move { result }.boxed()
    }

    fn pause(&mut self) -> BoxFuture<'_, ()> {
        self.log.record(EngineCall::Pause);
        async {}.boxed()
    }

    fn poll(&mut self) -> BoxFuture<'_, EngineResult<EngineFrame>> {
        self.log.record(EngineCall::Poll);
        let latency = self.frame_latency;
        let frame = self.frames.lock().next();
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            frame
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        self.log.record(EngineCall::Close);
        async {}.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EarthTrackingStatus, GeospatialPose};
    use crate::error::EngineError;

    #[tokio::test]
    async fn test_frames_replay_then_repeat_last() {
        let pose = GeospatialPose::new(37.422, -122.084, 4.0);
        let mut engine = ScriptedEngine::new(Availability::Supported).with_frames([
            Ok(EngineFrame::initializing()),
            Ok(EngineFrame::enabled(pose)),
        ]);

        let mut session = engine
            .create_session(SessionConfig::default())
            .await
            .expect("session");
        assert_eq!(
            session.poll().await.unwrap().earth_state,
            EarthTrackingStatus::Initializing
        );
        assert_eq!(session.poll().await.unwrap().pose, Some(pose));
        assert_eq!(session.poll().await.unwrap().pose, Some(pose));
    }

    #[tokio::test]
    async fn test_create_results_and_log() {
        let mut engine = ScriptedEngine::new(Availability::Supported)
            .with_create_results([Err(EngineError::transient("init race"))]);
        let log = engine.call_log();

        assert!(engine.create_session(SessionConfig::default()).await.is_err());
        assert!(engine.create_session(SessionConfig::default()).await.is_ok());
        assert_eq!(log.count(&EngineCall::CreateSession), 2);
    }

    #[tokio::test]
    async fn test_install_marks_supported() {
        let mut engine = ScriptedEngine::new(Availability::NeedsInstall)
            .with_install_responses([Ok(InstallStatus::Requested), Ok(InstallStatus::Installed)]);

        assert_eq!(engine.request_install().await, Ok(InstallStatus::Requested));
        assert_eq!(engine.check_availability().await, Availability::NeedsInstall);
        assert_eq!(engine.request_install().await, Ok(InstallStatus::Installed));
        assert_eq!(engine.check_availability().await, Availability::Supported);
    }

    #[tokio::test]
    async fn test_resume_results_shared_across_sessions() {
        let mut engine = ScriptedEngine::new(Availability::Supported)
            .with_resume_results([Err(EngineError::transient("camera busy"))]);
        let log = engine.call_log();

        let mut first = engine.create_session(SessionConfig::default()).await.unwrap();
        assert!(first.resume().await.is_err());

        let mut second = engine.create_session(SessionConfig::default()).await.unwrap();
        assert!(second.resume().await.is_ok());
        assert_eq!(log.count(&EngineCall::Resume), 2);
    }
}
