//! Published session streams.
//!
//! State transitions and readings go out on broadcast channels so several
//! observers can follow them; the outcome, current tier and progress are
//! latest-value channels that late readers can sample at any time.

use tokio::sync::{broadcast, watch};

use super::state::StateTransition;
use crate::quality::TierSnapshot;
use crate::reading::GeospatialReading;
use crate::verification::{VerificationOutcome, VerificationProgress};

/// Default broadcast buffer per stream.
pub const DEFAULT_STREAM_CAPACITY: usize = 256;

/// Receiving ends handed to the host.
#[derive(Debug)]
pub struct SessionStreams {
    /// Every state transition, in order.
    pub states: broadcast::Receiver<StateTransition>,
    /// The unified Primary/Fallback reading stream.
    pub readings: broadcast::Receiver<GeospatialReading>,
    /// `None` until the attempt is decided.
    pub outcome: watch::Receiver<Option<VerificationOutcome>>,
    pub tier: watch::Receiver<TierSnapshot>,
    pub progress: watch::Receiver<VerificationProgress>,
}

impl SessionStreams {
    /// Fresh receivers on the same channels.
    ///
    /// Broadcast receivers only see items sent after the call.
    pub fn resubscribe(&self) -> Self {
        Self {
            states: self.states.resubscribe(),
            readings: self.readings.resubscribe(),
            outcome: self.outcome.clone(),
            tier: self.tier.clone(),
            progress: self.progress.clone(),
        }
    }
}

/// Sending ends, owned by the session manager.
#[derive(Debug)]
pub(crate) struct Publisher {
    states: broadcast::Sender<StateTransition>,
    readings: broadcast::Sender<GeospatialReading>,
    outcome: watch::Sender<Option<VerificationOutcome>>,
    tier: watch::Sender<TierSnapshot>,
    progress: watch::Sender<VerificationProgress>,
}

impl Publisher {
    pub(crate) fn new(capacity: usize) -> (Self, SessionStreams) {
        let capacity = capacity.max(1);
        let (states_tx, states_rx) = broadcast::channel(capacity);
        let (readings_tx, readings_rx) = broadcast::channel(capacity);
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let (tier_tx, tier_rx) = watch::channel(TierSnapshot::default());
        let (progress_tx, progress_rx) = watch::channel(VerificationProgress::default());

        let publisher = Self {
            states: states_tx,
            readings: readings_tx,
            outcome: outcome_tx,
            tier: tier_tx,
            progress: progress_tx,
        };
        let streams = SessionStreams {
            states: states_rx,
            readings: readings_rx,
            outcome: outcome_rx,
            tier: tier_rx,
            progress: progress_rx,
        };
        (publisher, streams)
    }

    // Send errors only mean nobody is listening right now.

    pub(crate) fn state(&self, transition: StateTransition) {
        let _ = self.states.send(transition);
    }

    pub(crate) fn reading(&self, reading: GeospatialReading) {
        let _ = self.readings.send(reading);
    }

    pub(crate) fn outcome(&self, outcome: VerificationOutcome) {
        self.outcome.send_replace(Some(outcome));
    }

    pub(crate) fn tier(&self, snapshot: TierSnapshot) {
        self.tier.send_replace(snapshot);
    }

    pub(crate) fn progress(&self, progress: VerificationProgress) {
        self.progress.send_replace(progress);
    }
}
