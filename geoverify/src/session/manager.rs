//! Session lifecycle manager.
//!
//! Owns the native tracking session and the coarse location subscription,
//! drives the poll cadence and routes every reading through the tier
//! tracker and the verification decider before publishing it.
//!
//! The manager can be stepped directly (`start`, `activate`, `poll`, ...) or
//! run as a background worker through [`SessionHandle`](super::SessionHandle).

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::cadence::PollCadence;
use super::gate::PollGate;
use super::merge::FallbackMerger;
use super::state::{SessionState, StateTransition};
use super::streams::{Publisher, SessionStreams};
use crate::config::VerifierConfig;
use crate::engine::{
    Availability, DeviceCapabilities, EngineSession, InstallStatus, TrackingEngineGateway,
};
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::location::{CoarseFix, CoarseLocationSource, FixTranslator, LocationProvider};
use crate::quality::{TierSnapshot, TierTracker};
use crate::reading::{GeospatialReading, ReadingSource};
use crate::verification::{VerificationDecider, VerificationOutcome, VerificationProgress};

/// Why a poll produced no reading.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PollError {
    #[error("session is {0}, not running")]
    NotRunning(SessionState),

    #[error("poll ceiling reached")]
    Halted,

    #[error("frame discarded after pause or abort")]
    Discarded,

    #[error("transient poll failure: {0}")]
    Transient(EngineError),

    #[error("session failed: {0}")]
    Fatal(EngineError),
}

/// Host commands delivered to the session worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionCommand {
    Activate,
    Pause,
    Resume,
    Close,
}

enum Wake {
    Abort,
    Command(Option<SessionCommand>),
    Fix(Option<CoarseFix>),
    PollDue,
}

/// Drives one verification attempt.
pub struct SessionLifecycleManager {
    config: VerifierConfig,
    engine: Box<dyn TrackingEngineGateway>,
    location: Box<dyn CoarseLocationSource>,
    session: Option<Box<dyn EngineSession>>,
    state: SessionState,
    /// Availability answered Supported (or install completed).
    engine_ready: bool,
    cadence: PollCadence,
    merger: FallbackMerger,
    tracker: TierTracker,
    decider: VerificationDecider,
    translator: FixTranslator,
    publisher: Publisher,
    gate: PollGate,
    abort: CancellationToken,
    epoch: Instant,
    last_published_at: Option<Duration>,
    transient_polls: u32,
    polling_halted: bool,
    fixes: Option<mpsc::Receiver<CoarseFix>>,
    next_poll_at: Option<Instant>,
}

impl SessionLifecycleManager {
    pub fn new(
        engine: Box<dyn TrackingEngineGateway>,
        location: Box<dyn CoarseLocationSource>,
        config: VerifierConfig,
    ) -> (Self, SessionStreams) {
        let (publisher, streams) = Publisher::new(config.stream_capacity);
        let abort = CancellationToken::new();

        let manager = Self {
            engine,
            location,
            session: None,
            state: SessionState::Uninitialized,
            engine_ready: false,
            cadence: PollCadence::new(config.cadence.clone()),
            merger: FallbackMerger::new(&config.merge),
            tracker: TierTracker::new(config.classifier.clone()),
            decider: VerificationDecider::new(config.decision.clone(), config.classifier.clone()),
            translator: FixTranslator::new(config.classifier.max_plausible_accuracy_m),
            publisher,
            gate: PollGate::new(abort.clone()),
            abort,
            epoch: Instant::now(),
            last_published_at: None,
            transient_polls: 0,
            polling_halted: false,
            fixes: None,
            next_poll_at: None,
            config,
        };
        (manager, streams)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn tier(&self) -> TierSnapshot {
        self.tracker.snapshot()
    }

    pub fn outcome(&self) -> Option<VerificationOutcome> {
        self.decider.outcome()
    }

    pub fn progress(&self) -> VerificationProgress {
        self.decider.progress()
    }

    /// Polls completed in this attempt.
    pub fn poll_count(&self) -> u32 {
        self.cadence.polls()
    }

    /// Token that aborts the attempt when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    pub(crate) fn poll_gate(&self) -> PollGate {
        self.gate.clone()
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Probe capabilities and engine availability.
    ///
    /// Starts the coarse location subscription unless the device is
    /// unsupported; Fallback readings flow until the session is Running.
    pub async fn start(&mut self, capabilities: DeviceCapabilities) {
        if self.state != SessionState::Uninitialized {
            debug!(state = %self.state, "Start ignored");
            return;
        }
        self.transition(SessionState::CheckingAvailability);

        if let Some(missing) = capabilities.missing() {
            self.fail(EngineError::capability(format!("device lacks {}", missing)))
                .await;
            return;
        }

        match self.engine.check_availability().await {
            Availability::Unsupported => {
                self.fail(EngineError::capability(
                    "tracking engine is not supported on this device",
                ))
                .await;
                return;
            }
            Availability::NeedsInstall => self.transition(SessionState::InstallRequired),
            Availability::Supported => {
                debug!("Tracking engine available");
                self.engine_ready = true;
            }
        }

        self.start_fallback();
        self.seed_last_known();
    }

    /// Move toward a running session.
    ///
    /// Requests the engine install when one is required, otherwise creates
    /// and resumes the native session, retrying transient failures with
    /// backoff.
    pub async fn activate(&mut self) {
        match self.state {
            SessionState::InstallRequired => {
                self.transition(SessionState::Installing);
                self.request_install().await;
            }
            SessionState::Installing => self.request_install().await,
            SessionState::CheckingAvailability if self.engine_ready => self.open_session().await,
            SessionState::Suspended => self.resume().await,
            state => debug!(%state, "Activate ignored"),
        }
    }

    /// Stop polling and the location subscription; the native session is
    /// paused, not destroyed.
    pub async fn pause(&mut self) {
        if self.state != SessionState::Running {
            debug!(state = %self.state, "Pause ignored");
            return;
        }
        self.gate.close();
        self.next_poll_at = None;
        self.stop_fallback();
        // Headings must not span the gap.
        self.translator.reset();
        if let Some(session) = self.session.as_mut() {
            session.pause().await;
        }
        self.transition(SessionState::Suspended);
    }

    /// Resume a suspended session, or re-request a pending install.
    pub async fn resume(&mut self) {
        match self.state {
            SessionState::Suspended => {
                if let Some(session) = self.session.as_mut() {
                    if let Err(e) = session.resume().await {
                        if e.kind().is_retryable() {
                            warn!(error = %e, "Session resume failed; still suspended");
                        } else {
                            self.fail(e).await;
                        }
                        return;
                    }
                }
                self.gate.reopen();
                self.transition(SessionState::Running);
                if !self.polling_halted {
                    self.start_fallback();
                    self.schedule_next_poll();
                }
            }
            SessionState::Installing => self.request_install().await,
            state => debug!(%state, "Resume ignored"),
        }
    }

    /// Cancel the attempt.
    ///
    /// Emits the Aborted outcome if none was decided, releases every
    /// resource and closes the session. Nothing is published afterwards.
    pub async fn abort(&mut self) {
        self.abort.cancel();
        self.close().await;
    }

    /// Release the native session and location subscription.
    ///
    /// Closing an undecided attempt decides it as Aborted.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.gate.close();
        self.next_poll_at = None;
        self.stop_fallback();
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        if let Some(outcome) = self.decider.abort() {
            self.publish_outcome(outcome);
        }
        self.transition(SessionState::Closed);
    }

    /// Advance the native session one frame.
    ///
    /// Returns the published Primary reading, `Ok(None)` when the frame
    /// carried no usable pose, or why nothing was produced.
    pub async fn poll(&mut self) -> Result<Option<GeospatialReading>, PollError> {
        if self.polling_halted {
            return Err(PollError::Halted);
        }
        let result = self.poll_once().await;
        if matches!(result, Ok(_) | Err(PollError::Transient(_))) {
            self.check_ceiling();
        }
        result
    }

    // =========================================================================
    // Worker loop
    // =========================================================================

    /// Run the attempt until it is closed or aborted.
    pub(crate) async fn run(
        mut self,
        capabilities: DeviceCapabilities,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) {
        info!("Session worker starting");
        self.start(capabilities).await;

        let abort = self.abort.clone();
        while self.state != SessionState::Closed {
            let wake = tokio::select! {
                biased;
                _ = abort.cancelled() => Wake::Abort,
                command = commands.recv() => Wake::Command(command),
                fix = next_fix(&mut self.fixes) => Wake::Fix(fix),
                _ = poll_due(self.next_poll_at) => Wake::PollDue,
            };

            match wake {
                Wake::Abort => {
                    info!("Verification aborted");
                    self.abort().await;
                }
                Wake::Command(Some(command)) => self.handle_command(command).await,
                Wake::Command(None) => {
                    debug!("All session handles dropped");
                    self.close().await;
                }
                Wake::Fix(Some(fix)) => self.handle_fix(fix),
                Wake::Fix(None) => {
                    debug!("Coarse location stream ended");
                    self.fixes = None;
                }
                Wake::PollDue => self.poll_cycle().await,
            }
        }

        info!("Session worker stopped");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        debug!(?command, state = %self.state, "Session command");
        match command {
            SessionCommand::Activate => self.activate().await,
            SessionCommand::Pause => self.pause().await,
            SessionCommand::Resume => self.resume().await,
            SessionCommand::Close => self.close().await,
        }
    }

    async fn poll_cycle(&mut self) {
        self.next_poll_at = None;
        match self.poll().await {
            Ok(Some(reading)) => trace!(poll = self.cadence.polls(), %reading, "Poll"),
            Ok(None) | Err(PollError::Transient(_)) => {}
            Err(e) => {
                debug!(error = %e, "Poll produced nothing");
                return;
            }
        }
        if self.state == SessionState::Running && !self.polling_halted {
            self.schedule_next_poll();
        }
    }

    // =========================================================================
    // Engine plumbing
    // =========================================================================

    async fn request_install(&mut self) {
        match self.engine.request_install().await {
            Ok(InstallStatus::Installed) => {
                info!("Tracking engine installed");
                self.engine_ready = true;
                self.open_session().await;
            }
            Ok(InstallStatus::Requested) => {
                info!("Tracking engine install requested; activate again once it completes");
            }
            Err(e) if e.kind().is_retryable() => {
                warn!(error = %e, "Install request failed; retry on next activate");
            }
            Err(e) => self.fail(e).await,
        }
    }

    async fn open_session(&mut self) {
        self.transition(SessionState::Initializing);

        let mut failures = 0;
        loop {
            match self.try_open_session().await {
                Ok(session) => {
                    self.session = Some(session);
                    self.cadence = PollCadence::new(self.config.cadence.clone());
                    self.merger.reset();
                    self.transient_polls = 0;
                    self.gate.reopen();
                    self.transition(SessionState::Running);
                    self.schedule_next_poll();
                    return;
                }
                Err(e) if e.kind().is_retryable() => {
                    failures += 1;
                    let Some(delay) = self.config.retry.delay_for_attempt(failures) else {
                        self.fail(EngineError::transient(format!(
                            "session start failed after {} attempts: {}",
                            failures,
                            e.message()
                        )))
                        .await;
                        return;
                    };
                    warn!(
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Session start failed, retrying"
                    );
                    if !backoff(&self.abort, delay).await {
                        return;
                    }
                }
                Err(e) => {
                    self.fail(e).await;
                    return;
                }
            }
        }
    }

    async fn try_open_session(&mut self) -> EngineResult<Box<dyn EngineSession>> {
        let mut session = self
            .engine
            .create_session(self.config.engine.clone())
            .await?;
        if let Err(e) = session.resume().await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn poll_once(&mut self) -> Result<Option<GeospatialReading>, PollError> {
        if self.state != SessionState::Running {
            return Err(PollError::NotRunning(self.state));
        }
        let Some(session) = self.session.as_mut() else {
            return Err(PollError::NotRunning(self.state));
        };

        let gate = self.gate.token();
        let result = session.poll().await;
        if gate.is_cancelled() {
            debug!("Discarding frame completed after pause");
            return Err(PollError::Discarded);
        }

        let poll = self.cadence.record_poll();
        let frame = match result {
            Ok(frame) => frame,
            Err(e) => return self.poll_failed(poll, e).await,
        };
        if let Some(kind) = frame.earth_state.error_kind() {
            let error = EngineError::new(kind, frame.earth_state.message());
            return self.poll_failed(poll, error).await;
        }
        self.transient_polls = 0;

        let Some(pose) = frame.usable_pose() else {
            trace!(poll, earth_state = %frame.earth_state, "No usable pose");
            self.merger.record_cycle(false);
            return Ok(None);
        };

        let (reading, invalid) = GeospatialReading::new(
            pose.latitude,
            pose.longitude,
            pose.altitude_m,
            pose.heading_deg,
            pose.horizontal_accuracy_m,
            ReadingSource::Primary,
            self.epoch.elapsed(),
            self.config.classifier.max_plausible_accuracy_m,
        );
        if let Some(err) = invalid {
            debug!(poll, error = %err, "Primary reading failed validity checks");
        }
        self.merger.record_cycle(reading.valid);
        self.publish_reading(reading);
        Ok(Some(reading))
    }

    async fn poll_failed(
        &mut self,
        poll: u32,
        error: EngineError,
    ) -> Result<Option<GeospatialReading>, PollError> {
        self.merger.record_cycle(false);

        match error.kind() {
            ErrorKind::Transient => {
                self.transient_polls += 1;
                if self.transient_polls < self.config.retry.max_attempts() {
                    warn!(
                        poll,
                        consecutive = self.transient_polls,
                        error = %error,
                        "Transient poll failure"
                    );
                    return Err(PollError::Transient(error));
                }
                let error = EngineError::transient(format!(
                    "{} consecutive poll failures: {}",
                    self.transient_polls,
                    error.message()
                ));
                self.fail(error.clone()).await;
                Err(PollError::Fatal(error))
            }
            ErrorKind::DataValidity => {
                debug!(poll, error = %error, "Frame rejected");
                Ok(None)
            }
            _ => {
                self.fail(error.clone()).await;
                Err(PollError::Fatal(error))
            }
        }
    }

    fn check_ceiling(&mut self) {
        if self.state != SessionState::Running || !self.cadence.ceiling_reached() {
            return;
        }
        if let Some(outcome) = self.decider.poll_ceiling_reached() {
            self.publish_outcome(outcome);
        }
        info!(polls = self.cadence.polls(), "Poll ceiling reached, polling stopped");
        self.polling_halted = true;
        self.next_poll_at = None;
        self.stop_fallback();
    }

    fn schedule_next_poll(&mut self) {
        self.next_poll_at = Some(Instant::now() + self.cadence.next_interval());
    }

    async fn fail(&mut self, error: EngineError) {
        error!(
            kind = %error.kind(),
            from = %self.state,
            error = %error.message(),
            "Session failed"
        );
        self.gate.close();
        self.next_poll_at = None;
        self.stop_fallback();
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        let kind = error.kind();
        self.transition_with_cause(SessionState::Failed, Some(error));
        if let Some(outcome) = self.decider.session_failed(kind) {
            self.publish_outcome(outcome);
        }
    }

    fn transition(&mut self, next: SessionState) {
        self.transition_with_cause(next, None);
    }

    fn transition_with_cause(&mut self, next: SessionState, cause: Option<EngineError>) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Illegal session transition ignored");
            return;
        }
        info!(from = %self.state, to = %next, "Session state changed");
        let from = std::mem::replace(&mut self.state, next);
        self.publisher.state(StateTransition {
            from,
            to: next,
            cause,
        });
    }

    // =========================================================================
    // Fallback source and publishing
    // =========================================================================

    fn start_fallback(&mut self) {
        if self.fixes.is_some() {
            return;
        }
        match self.location.subscribe(self.config.merge.fallback_min_interval) {
            Ok(rx) => self.fixes = Some(rx),
            Err(e) => warn!(error = %e, "Coarse location unavailable, continuing without fallback"),
        }
    }

    fn stop_fallback(&mut self) {
        self.fixes = None;
        self.location.unsubscribe();
    }

    fn seed_last_known(&mut self) {
        let seed = [LocationProvider::Gps, LocationProvider::Network]
            .into_iter()
            .find_map(|provider| self.location.last_known(provider));
        if let Some(fix) = seed {
            debug!(provider = %fix.provider, "Seeding with last known fix");
            self.handle_fix(fix);
        }
    }

    fn handle_fix(&mut self, fix: CoarseFix) {
        if self.state.is_terminal() || self.state == SessionState::Suspended || self.polling_halted
        {
            return;
        }

        let (reading, invalid) = self.translator.to_reading(&fix, self.epoch.elapsed());
        if !self.merger.admits_fallback(self.state) {
            trace!(provider = %fix.provider, "Fallback reading suppressed");
            return;
        }
        if let Some(err) = invalid {
            debug!(provider = %fix.provider, error = %err, "Fallback reading failed validity checks");
        }
        self.publish_reading(reading);
    }

    fn publish_reading(&mut self, reading: GeospatialReading) {
        if self
            .last_published_at
            .is_some_and(|last| reading.captured_at < last)
        {
            debug!(source = %reading.source, "Dropping out-of-order reading");
            return;
        }
        self.last_published_at = Some(reading.captured_at);

        self.publisher.reading(reading);
        self.publisher.tier(self.tracker.update(&reading));
        if let Some(outcome) = self.decider.observe(&reading) {
            self.publisher.outcome(outcome);
        }
        self.publisher.progress(self.decider.progress());
    }

    fn publish_outcome(&mut self, outcome: VerificationOutcome) {
        self.publisher.outcome(outcome);
        self.publisher.progress(self.decider.progress());
    }
}

impl std::fmt::Debug for SessionLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycleManager")
            .field("state", &self.state)
            .field("polls", &self.cadence.polls())
            .field("halted", &self.polling_halted)
            .field("decision", &self.decider.state())
            .finish_non_exhaustive()
    }
}

/// Sleep for `delay` unless the attempt is aborted first.
async fn backoff(abort: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = abort.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

async fn next_fix(fixes: &mut Option<mpsc::Receiver<CoarseFix>>) -> Option<CoarseFix> {
    match fixes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn poll_due(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
