//! # Noise Parameters
//!
//! Output of one estimator update, consumed by the hardware-state populator
//! when the next frame's command streams are generated.

use crate::state::{NoiseRegime, NO_HISTORY};

/// Adaptive denoise policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DenoiseMode {
    /// Tuned for rate-distortion in a following encoder
    AutoBdrate,
    /// Tuned for perceived quality
    AutoSubjective,
    /// Fixed thresholds, adaptive levels only
    #[default]
    Manual,
}

/// Per-channel estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelNoise {
    /// Smoothed global noise level
    pub global_level: u32,
    /// Spatial noise level of this frame
    pub sgne_level: u32,
    /// Spatial sample count of this frame
    pub sgne_count: u32,
    /// Previous temporal level, `-1` without history
    pub prev_temporal_level: i32,
}

impl Default for ChannelNoise {
    fn default() -> Self {
        Self {
            global_level: 0,
            sgne_level: 0,
            sgne_count: 0,
            prev_temporal_level: NO_HISTORY,
        }
    }
}

/// Chroma group estimate, present when chroma denoise is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChromaNoise {
    /// U channel
    pub u: ChannelNoise,
    /// V channel
    pub v: ChannelNoise,
    /// Chroma STAD threshold
    pub stad_threshold: u32,
    /// UV history delta
    pub history_delta: u32,
    /// UV history maximum
    pub history_max: u32,
}

/// Perceptual-quality controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HvsControl {
    /// Bd-rate tuning active
    pub bdrate_enabled: bool,
    /// Subjective tuning active
    pub subjective_enabled: bool,
    /// BSD threshold, only meaningful in subjective mode
    pub bsd_threshold: u32,
}

/// Everything the populator needs from the estimator for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoiseParameters {
    /// Regime that produced these values
    pub regime: NoiseRegime,
    /// Luma estimate
    pub luma: ChannelNoise,
    /// Chroma estimates
    pub chroma: Option<ChromaNoise>,
    /// Temporal statistics dropped out mid-stream
    pub fallback: bool,
    /// First frame of the pipeline
    pub first_frame: bool,
    /// Temporal history being seeded this frame
    pub temporal_first_frame: bool,
    /// Temporal GNE requested by configuration
    pub temporal_gne_enabled: bool,
    /// Temporal block processing enabled in hardware
    pub temporal_block_enable: bool,
    /// Luma STAD threshold
    pub luma_stad_threshold: u32,
    /// History init
    pub history_init: u32,
    /// 4x4 TGNE threshold count
    pub block_threshold_count: u32,
    /// Perceptual-quality controls
    pub hvs: HvsControl,
}

impl NoiseParameters {
    /// Parameters for a frame without adaptive update
    ///
    /// Used when statistics could not be read and nothing earlier is
    /// available.
    pub fn non_adaptive(chroma_enabled: bool) -> Self {
        Self {
            regime: NoiseRegime::Default,
            luma: ChannelNoise::default(),
            chroma: chroma_enabled.then(ChromaNoise::default),
            fallback: false,
            first_frame: true,
            temporal_first_frame: false,
            temporal_gne_enabled: false,
            temporal_block_enable: false,
            luma_stad_threshold: 0,
            history_init: 0,
            block_threshold_count: 0,
            hvs: HvsControl::default(),
        }
    }
}
