//! Accuracy classification for geospatial readings.
//!
//! Maps a reading's horizontal accuracy to a discrete [`QualityTier`] and
//! smooths the result with a hysteresis band at the `Poor` boundary so a
//! single noisy sample cannot flip the reported tier.
//!
//! # Tiers
//!
//! ```text
//! Invalid    valid == false
//! Excellent  accuracy <= 5.0 m
//! Good       accuracy <= 10.0 m
//! Fair       accuracy <= 20.0 m
//! Poor       accuracy >  20.0 m
//! ```

mod tier;
mod tracker;

pub use tier::{classify, classify_with, ClassifierConfig, QualityTier};
pub use tracker::{TierSnapshot, TierTracker};
