//! Session lifecycle management.
//!
//! The [`SessionLifecycleManager`] owns the native tracking session and the
//! coarse location subscription for one verification attempt. It walks the
//! [`SessionState`] machine, polls the engine on a stepped cadence, merges
//! Fallback readings according to [`FallbackMerger`] and publishes every
//! result on the [`SessionStreams`].
//!
//! Hosts normally use [`SessionHandle::spawn`], which runs the manager on
//! its own task and keeps the host thread free of engine calls.

mod cadence;
mod gate;
mod handle;
mod manager;
mod merge;
mod state;
mod streams;

pub use cadence::{
    CadenceConfig, PollCadence, DEFAULT_INITIAL_INTERVAL, DEFAULT_INITIAL_POLLS,
    DEFAULT_MAX_POLLS, DEFAULT_MIDDLE_INTERVAL, DEFAULT_MIDDLE_POLLS, DEFAULT_STEADY_INTERVAL,
};
pub use handle::SessionHandle;
pub use manager::{PollError, SessionLifecycleManager};
pub use merge::{
    FallbackMerger, MergeConfig, DEFAULT_FALLBACK_MIN_INTERVAL, DEFAULT_PRIMARY_STALE_CYCLES,
};
pub use state::{SessionState, StateTransition};
pub use streams::{SessionStreams, DEFAULT_STREAM_CAPACITY};
