//! Error taxonomy shared by the adapters and the session manager.
//!
//! Every native failure raised by the tracking engine or the platform location
//! services is translated into an [`EngineError`] before it reaches the
//! lifecycle manager. The [`ErrorKind`] decides how the manager reacts:
//!
//! ```text
//! Capability         ──► terminal, outcome Unsupported
//! Authorization      ──► terminal, outcome Failed
//! ResourceExhausted  ──► terminal for this attempt, outcome Failed
//! Transient          ──► retried with backoff, escalates when the budget is spent
//! DataValidity       ──► non-fatal, reading is published with valid = false
//! ```

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Result type for adapter operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Classification of a failure reported by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Device or OS does not support the tracking mode.
    Capability,
    /// The positioning service denied access.
    Authorization,
    /// Quota or rate limits were hit.
    ResourceExhausted,
    /// Internal engine error, init race or momentary tracking loss.
    Transient,
    /// Degenerate coordinates or implausible accuracy.
    DataValidity,
}

impl ErrorKind {
    /// Whether this kind ends the current attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ErrorKind::Capability | ErrorKind::Authorization | ErrorKind::ResourceExhausted
        )
    }

    /// Whether this kind is retried within the current attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    /// Short user-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Capability => "device unsupported",
            ErrorKind::Authorization => "not authorized",
            ErrorKind::ResourceExhausted => "resource exhausted",
            ErrorKind::Transient => "transient engine error",
            ErrorKind::DataValidity => "invalid data",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure reported by the tracking engine or the coarse location source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    kind: ErrorKind,
    message: String,
}

impl EngineError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn capability(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Capability, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceExhausted, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// The taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Diagnostic message from the adapter.
    pub fn message(&self) -> &str {
        &self.message
    }
}
