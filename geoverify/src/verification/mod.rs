//! Verification decision state machine.
//!
//! Watches the unified reading stream and settles one terminal outcome per
//! attempt:
//!
//! ```text
//! Pending --[debounce consecutive Good/Excellent readings]--> Verified
//! Pending --[poll ceiling reached]---------------------------> TimedOut
//! Pending --[session failed: capability]---------------------> Unsupported
//! Pending --[session failed: other terminal kind]------------> Failed(kind)
//! Pending --[host cancelled]---------------------------------> Aborted
//! ```
//!
//! Terminal states absorb every later signal; the outcome is returned
//! exactly once.

mod decider;

pub use decider::{
    DecisionConfig, DecisionState, VerificationDecider, VerificationOutcome, VerificationProgress,
    VerificationResult, DEFAULT_DEBOUNCE,
};
