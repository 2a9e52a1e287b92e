//! geoverify - on-site location verification from AR geospatial tracking
//!
//! This library drives an AR tracking engine through its session lifecycle,
//! classifies each geospatial pose by horizontal accuracy, merges in coarse
//! platform location fixes while the engine localizes, and settles a single
//! debounced verdict per attempt: Verified, TimedOut, Unsupported, Aborted
//! or Failed.
//!
//! # Overview
//!
//! ```text
//! TrackingEngineGateway ──poll──► SessionLifecycleManager ──► readings ──► TierTracker
//! CoarseLocationSource ──fixes──►   (FallbackMerger)                   └─► VerificationDecider ──► outcome
//! ```
//!
//! Hosts start an attempt with [`SessionHandle::spawn`] and follow the
//! [`SessionStreams`].

pub mod config;
pub mod engine;
pub mod error;
pub mod location;
pub mod logging;
pub mod quality;
pub mod reading;
pub mod retry;
pub mod scenario;
pub mod session;
pub mod verification;

pub use config::{ConfigError, VerifierConfig};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use quality::{classify, QualityTier, TierSnapshot};
pub use reading::{GeospatialReading, ReadingSource};
pub use session::{
    SessionHandle, SessionLifecycleManager, SessionState, SessionStreams, StateTransition,
};
pub use verification::{VerificationOutcome, VerificationProgress, VerificationResult};
