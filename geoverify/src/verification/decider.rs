//! Verification decider and its outcome types.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ErrorKind;
use crate::quality::{classify_with, ClassifierConfig};
use crate::reading::GeospatialReading;

/// Default number of consecutive qualifying readings required to verify.
pub const DEFAULT_DEBOUNCE: u32 = 2;

/// Terminal result of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationResult {
    Verified,
    TimedOut,
    Unsupported,
    Aborted,
    /// The session failed for a reason other than unsupported hardware.
    Failed(ErrorKind),
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationResult::Verified => write!(f, "verified"),
            VerificationResult::TimedOut => write!(f, "timed out"),
            VerificationResult::Unsupported => write!(f, "unsupported"),
            VerificationResult::Aborted => write!(f, "aborted"),
            VerificationResult::Failed(kind) => write!(f, "failed ({})", kind),
        }
    }
}

/// Terminal, immutable result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationOutcome {
    pub result: VerificationResult,
    /// The qualifying reading for Verified, otherwise the best reading seen.
    pub final_reading: Option<GeospatialReading>,
    /// Time from attempt start to the decision.
    pub elapsed: Duration,
}

/// Decider state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecisionState {
    #[default]
    Pending,
    Decided(VerificationResult),
}

/// Partial state for progressive UI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VerificationProgress {
    pub state: DecisionState,
    /// Valid reading with the smallest accuracy radius so far.
    pub best_reading: Option<GeospatialReading>,
    pub elapsed: Duration,
    /// Readings evaluated so far.
    pub attempts: u32,
    /// Current run of Good-or-better readings.
    pub consecutive_qualifying: u32,
}

/// Decider tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionConfig {
    /// Consecutive Good-or-better readings required.
    pub debounce: u32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Settles the outcome of one verification attempt.
#[derive(Debug)]
pub struct VerificationDecider {
    config: DecisionConfig,
    classifier: ClassifierConfig,
    started_at: Instant,
    consecutive: u32,
    attempts: u32,
    best: Option<GeospatialReading>,
    outcome: Option<VerificationOutcome>,
}

impl VerificationDecider {
    pub fn new(config: DecisionConfig, classifier: ClassifierConfig) -> Self {
        Self {
            config,
            classifier,
            started_at: Instant::now(),
            consecutive: 0,
            attempts: 0,
            best: None,
            outcome: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DecisionConfig::default(), ClassifierConfig::default())
    }

    pub fn state(&self) -> DecisionState {
        match self.outcome {
            Some(outcome) => DecisionState::Decided(outcome.result),
            None => DecisionState::Pending,
        }
    }

    pub fn is_decided(&self) -> bool {
        self.outcome.is_some()
    }

    /// The outcome, once decided.
    pub fn outcome(&self) -> Option<VerificationOutcome> {
        self.outcome
    }

    pub fn progress(&self) -> VerificationProgress {
        VerificationProgress {
            state: self.state(),
            best_reading: self.best,
            elapsed: self
                .outcome
                .map(|o| o.elapsed)
                .unwrap_or_else(|| self.started_at.elapsed()),
            attempts: self.attempts,
            consecutive_qualifying: self.consecutive,
        }
    }

    /// Evaluate a published reading.
    ///
    /// Returns the outcome the first time the Verified condition is met.
    pub fn observe(&mut self, reading: &GeospatialReading) -> Option<VerificationOutcome> {
        if self.is_decided() {
            return None;
        }

        self.attempts += 1;
        if reading.valid
            && self
                .best
                .map_or(true, |b| reading.horizontal_accuracy_m < b.horizontal_accuracy_m)
        {
            self.best = Some(*reading);
        }

        if classify_with(reading, &self.classifier).is_verifiable() {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }

        if self.consecutive >= self.config.debounce {
            return self.decide(VerificationResult::Verified, Some(*reading));
        }
        None
    }

    /// The manager's poll ceiling was reached.
    pub fn poll_ceiling_reached(&mut self) -> Option<VerificationOutcome> {
        self.decide(VerificationResult::TimedOut, self.best)
    }

    /// The session reached terminal `Failed`.
    pub fn session_failed(&mut self, kind: ErrorKind) -> Option<VerificationOutcome> {
        let result = if kind == ErrorKind::Capability {
            VerificationResult::Unsupported
        } else {
            VerificationResult::Failed(kind)
        };
        self.decide(result, self.best)
    }

    /// The host cancelled the attempt.
    pub fn abort(&mut self) -> Option<VerificationOutcome> {
        self.decide(VerificationResult::Aborted, self.best)
    }

    fn decide(
        &mut self,
        result: VerificationResult,
        final_reading: Option<GeospatialReading>,
    ) -> Option<VerificationOutcome> {
        if self.outcome.is_some() {
            return None;
        }
        let outcome = VerificationOutcome {
            result,
            final_reading,
            elapsed: self.started_at.elapsed(),
        };
        tracing::info!(
            result = %result,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            attempts = self.attempts,
            "Verification decided"
        );
        self.outcome = Some(outcome);
        Some(outcome)
    }
}
