//! # VEBOX Denoise Subsystem
//!
//! Statistics decoding and the cross-frame adaptive noise estimator.
//!
//! ```text
//!   statistics surface ──▶ StatisticsReader ──▶ FrameStatistics
//!                                                     │
//!                          NoiseState (per pipeline) ─┤
//!                                                     ▼
//!                                              NoiseEstimator ──▶ NoiseParameters
//! ```
//!
//! The estimator runs once per frame, before any engine's command stream is
//! generated, because its output is baked into every stream.

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(test)]
extern crate alloc;

pub mod estimator;
pub mod params;
pub mod state;
pub mod stats;

pub use estimator::{normalize, round_up_shift_average, BlockThresholdPolicy, NoiseEstimator};
pub use params::{ChannelNoise, ChromaNoise, DenoiseMode, HvsControl, NoiseParameters};
pub use state::{NoiseRegime, NoiseState, NO_HISTORY};
pub use stats::{Channel, FrameStatistics, SliceMode, SliceRecord, StatLayout, StatisticsReader};
