//! # Pipeline Configuration
//!
//! Per-pipeline switches. Device-wide overrides (forced engine mask, forced
//! scalability) come through [`vebox_hal::DeviceInfo`] instead.

use vebox_denoise::{DenoiseMode, SliceMode};
use vebox_hal::{Dimensions, SubmissionPolicy};

/// Configuration of one [`crate::VeboxPipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineConfig {
    /// Run the adaptive noise estimator
    pub denoise_enabled: bool,
    /// Adaptive policy
    pub denoise_mode: DenoiseMode,
    /// Estimate and denoise chroma as well as luma
    pub chroma_enabled: bool,
    /// Use temporal GNE statistics when the hardware provides them
    pub temporal_gne: bool,
    /// How multi-engine groups reach the device layer
    pub submission_policy: SubmissionPolicy,
    /// Hand phased buffers back one by one, submit once with the last
    pub parallel_submission: bool,
    /// Packet type, which decides the statistics slice bases
    pub slice_mode: SliceMode,
    /// Per-block statistics region in front of the frame blocks
    pub statistics_block: Dimensions,
}

impl PipelineConfig {
    /// Default configuration
    pub const fn new() -> Self {
        Self {
            denoise_enabled: true,
            denoise_mode: DenoiseMode::Manual,
            chroma_enabled: false,
            temporal_gne: true,
            submission_policy: SubmissionPolicy::Synchronous,
            parallel_submission: false,
            slice_mode: SliceMode::Denoise,
            statistics_block: Dimensions::new(0, 0),
        }
    }

    /// Enable or disable the noise estimator
    pub const fn with_denoise(mut self, enabled: bool) -> Self {
        self.denoise_enabled = enabled;
        self
    }

    /// Set the adaptive policy
    pub const fn with_denoise_mode(mut self, mode: DenoiseMode) -> Self {
        self.denoise_mode = mode;
        self
    }

    /// Enable or disable chroma denoise
    pub const fn with_chroma(mut self, enabled: bool) -> Self {
        self.chroma_enabled = enabled;
        self
    }

    /// Enable or disable temporal GNE
    pub const fn with_temporal_gne(mut self, enabled: bool) -> Self {
        self.temporal_gne = enabled;
        self
    }

    /// Set the submission policy
    pub const fn with_submission_policy(mut self, policy: SubmissionPolicy) -> Self {
        self.submission_policy = policy;
        self
    }

    /// Enable or disable parallel submission
    pub const fn with_parallel_submission(mut self, enabled: bool) -> Self {
        self.parallel_submission = enabled;
        self
    }

    /// Set the statistics slice layout
    pub const fn with_slice_mode(mut self, mode: SliceMode, statistics_block: Dimensions) -> Self {
        self.slice_mode = mode;
        self.statistics_block = statistics_block;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let c = PipelineConfig::new()
            .with_denoise_mode(DenoiseMode::AutoBdrate)
            .with_chroma(true)
            .with_temporal_gne(false)
            .with_submission_policy(SubmissionPolicy::Phased)
            .with_parallel_submission(true)
            .with_slice_mode(SliceMode::Deinterlace, Dimensions::new(16, 4));

        assert!(c.denoise_enabled);
        assert_eq!(c.denoise_mode, DenoiseMode::AutoBdrate);
        assert!(c.chroma_enabled && !c.temporal_gne);
        assert_eq!(c.submission_policy, SubmissionPolicy::Phased);
        assert!(c.parallel_submission);
        assert_eq!(c.slice_mode, SliceMode::Deinterlace);
        assert_eq!(c.statistics_block, Dimensions::new(16, 4));
    }

    #[test]
    fn test_defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c, PipelineConfig::new());
        assert!(c.temporal_gne);
        assert_eq!(c.submission_policy, SubmissionPolicy::Synchronous);
    }
}
