//! Session lifecycle states and the legal transition table.
//!
//! # State Machine
//!
//! ```text
//! Uninitialized ─► CheckingAvailability ─┬─► InstallRequired ─► Installing ─┐
//!                                        └──────────────────────────────────┴─► Initializing ─► Running ⇄ Suspended
//!
//! any non-terminal ──► Failed
//! any              ──► Closed
//! ```
//!
//! `Suspended → Running` is the only edge that moves back in declaration
//! order; it is the foreground/background resume.

use std::fmt;

use crate::error::EngineError;

/// Lifecycle state of the tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    CheckingAvailability,
    InstallRequired,
    Installing,
    Initializing,
    Running,
    Suspended,
    Failed,
    Closed,
}

impl SessionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Failed, _) => false,
            (_, Failed) => true,
            (Uninitialized, CheckingAvailability) => true,
            (CheckingAvailability, InstallRequired) => true,
            (CheckingAvailability, Initializing) => true,
            (InstallRequired, Installing) => true,
            (Installing, Initializing) => true,
            (Initializing, Running) => true,
            (Running, Suspended) => true,
            (Suspended, Running) => true,
            _ => false,
        }
    }

    /// Failed and Closed admit no further progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Closed)
    }

    /// Status line for the UI.
    pub fn status_text(self) -> &'static str {
        match self {
            SessionState::Uninitialized => "Starting",
            SessionState::CheckingAvailability => "Checking device support",
            SessionState::InstallRequired => "Tracking engine must be installed",
            SessionState::Installing => "Installing tracking engine",
            SessionState::Initializing => "Starting tracking session",
            SessionState::Running => "Locating",
            SessionState::Suspended => "Paused",
            SessionState::Failed => "Location check failed",
            SessionState::Closed => "Closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::CheckingAvailability => "checking_availability",
            SessionState::InstallRequired => "install_required",
            SessionState::Installing => "installing",
            SessionState::Initializing => "initializing",
            SessionState::Running => "running",
            SessionState::Suspended => "suspended",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// One entry on the session state stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    /// Diagnostic cause, set when `to` is Failed.
    pub cause: Option<EngineError>,
}
