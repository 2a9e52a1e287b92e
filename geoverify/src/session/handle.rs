//! Host-facing handle to a session running on its own task.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::gate::PollGate;
use super::manager::{SessionCommand, SessionLifecycleManager};
use super::streams::SessionStreams;
use crate::config::VerifierConfig;
use crate::engine::{DeviceCapabilities, TrackingEngineGateway};
use crate::location::CoarseLocationSource;
use crate::quality::{QualityTier, TierSnapshot};
use crate::verification::{VerificationOutcome, VerificationProgress};

/// Controls a verification attempt running in the background.
///
/// Commands never block the caller. `pause` and `abort` take effect for any
/// frame call already in flight: its result is discarded. Dropping every
/// handle closes the session.
///
/// # Example
///
/// ```no_run
/// use geoverify::engine::scripted::ScriptedEngine;
/// use geoverify::engine::{Availability, DeviceCapabilities};
/// use geoverify::location::scripted::ScriptedLocationSource;
/// use geoverify::{SessionHandle, VerifierConfig};
///
/// # async fn run() {
/// let (handle, _streams) = SessionHandle::spawn(
///     ScriptedEngine::new(Availability::Supported),
///     ScriptedLocationSource::silent(),
///     DeviceCapabilities::full(),
///     VerifierConfig::default(),
/// );
/// handle.activate();
/// let outcome = handle.wait_for_outcome().await;
/// println!("{:?}", outcome.map(|o| o.result));
/// # }
/// ```
#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    gate: PollGate,
    abort: CancellationToken,
    streams: SessionStreams,
    worker: JoinHandle<()>,
}

impl SessionHandle {
    /// Start a session worker on the current tokio runtime.
    ///
    /// The worker probes capabilities and availability straight away;
    /// call [`activate`](Self::activate) to bring the session up.
    pub fn spawn<E, L>(
        engine: E,
        location: L,
        capabilities: DeviceCapabilities,
        config: VerifierConfig,
    ) -> (Self, SessionStreams)
    where
        E: TrackingEngineGateway + 'static,
        L: CoarseLocationSource + 'static,
    {
        let (manager, streams) =
            SessionLifecycleManager::new(Box::new(engine), Box::new(location), config);
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = manager.poll_gate();
        let abort = manager.cancellation_token();
        let kept = streams.resubscribe();

        let worker = tokio::spawn(manager.run(capabilities, rx));

        let handle = Self {
            commands: tx,
            gate,
            abort,
            streams: kept,
            worker,
        };
        (handle, streams)
    }

    pub fn activate(&self) {
        self.send(SessionCommand::Activate);
    }

    pub fn pause(&self) {
        self.gate.close();
        self.send(SessionCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(SessionCommand::Resume);
    }

    /// Cancel the attempt; the Aborted outcome follows unless one was
    /// already decided.
    pub fn abort(&self) {
        self.abort.cancel();
    }

    pub fn close(&self) {
        self.send(SessionCommand::Close);
    }

    /// Tier after hysteresis.
    pub fn current_tier(&self) -> QualityTier {
        self.streams.tier.borrow().tier
    }

    pub fn tier_snapshot(&self) -> TierSnapshot {
        *self.streams.tier.borrow()
    }

    pub fn progress(&self) -> VerificationProgress {
        *self.streams.progress.borrow()
    }

    pub fn outcome(&self) -> Option<VerificationOutcome> {
        *self.streams.outcome.borrow()
    }

    /// Wait until the attempt is decided.
    ///
    /// Returns `None` only if the worker stopped without deciding.
    pub async fn wait_for_outcome(&self) -> Option<VerificationOutcome> {
        let mut outcome = self.streams.outcome.clone();
        let decided = match outcome.wait_for(Option::is_some).await {
            Ok(decided) => *decided,
            Err(_) => None,
        };
        decided
    }

    /// Fresh receivers; broadcast streams start from the next item.
    pub fn subscribe(&self) -> SessionStreams {
        self.streams.resubscribe()
    }

    /// Token that aborts the attempt, e.g. from a signal handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Whether the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Close the session and wait for the worker to exit.
    pub async fn shutdown(self) {
        self.close();
        let Self { worker, .. } = self;
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Session worker panicked");
        }
    }

    fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!(?command, "Session worker gone, command dropped");
        }
    }
}
