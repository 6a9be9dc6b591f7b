//! # Pipeline Driver
//!
//! One [`VeboxPipeline`] per video-processing context. It owns the noise
//! history and the engine group, and runs the per-frame sequence:
//!
//! ```text
//!   rebind ─▶ decide ─▶ engine resources ─▶ lock/read/unlock ─▶ update ─▶ run
//!                                                  │                │
//!                                      InvalidBuffer│   InvalidStatistics
//!                                                  ▼                ▼
//!                                            non-adaptive     previous params
//! ```
//!
//! An engine hang aborts the frame and latches [`VeboxPipeline::needs_reset`]
//! until [`VeboxPipeline::reset`] is called.

use alloc::vec::Vec;
use core::fmt;

use vebox_denoise::{NoiseEstimator, NoiseParameters, NoiseState, StatLayout, StatisticsReader};
use vebox_hal::{
    CommandBuffer, CommandBufferHandle, CommandSubmitter, DeviceInfo, EngineResources, Error,
    HardwareProfile, Result, StatisticsSource, SurfaceDesc,
};
use vebox_scalability::{EngineTopology, FrameStage, SchedulingDecision, SubmissionCoordinator};

use crate::config::PipelineConfig;
use crate::populate::{FramePopulator, HardwareStatePopulator};

// =============================================================================
// FRAME
// =============================================================================

/// Source and target of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Input surface
    pub source: SurfaceDesc,
    /// Output surface
    pub target: SurfaceDesc,
}

impl Frame {
    /// Create a frame description
    pub const fn new(source: SurfaceDesc, target: SurfaceDesc) -> Self {
        Self { source, target }
    }
}

/// External collaborators for one frame
pub struct FrameContext<'a> {
    /// Hardware-written statistics surface
    pub statistics: &'a mut dyn StatisticsSource,
    /// Device and registry properties
    pub device: &'a dyn DeviceInfo,
    /// Per-engine buffer and semaphore allocator
    pub resources: &'a mut dyn EngineResources,
    /// Writer of the hardware-state region
    pub populator: &'a mut dyn HardwareStatePopulator,
    /// Device-layer submission
    pub submitter: &'a dyn CommandSubmitter,
}

impl fmt::Debug for FrameContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameContext").finish_non_exhaustive()
    }
}

/// Where a frame's noise parameters came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimateSource {
    /// Fresh adaptive update
    Adaptive,
    /// Statistics rejected; last good parameters reused
    Previous,
    /// No usable statistics and no history
    NonAdaptive,
    /// Denoise disabled in the configuration
    Disabled,
}

/// Outcome of [`VeboxPipeline::process_frame`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// Scheduling decision for the frame
    pub decision: SchedulingDecision,
    /// Parameters baked into the streams
    pub parameters: NoiseParameters,
    /// Origin of `parameters`
    pub estimate: EstimateSource,
    /// Generated streams in engine order
    pub buffers: Vec<CommandBuffer>,
}

/// Per-pipeline counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PipelineStats {
    /// Frames that reached submission
    pub frames: u64,
    /// Frames split across engines
    pub scalable_frames: u64,
    /// Successful noise updates
    pub adaptive_updates: u64,
    /// Frames that fell back to previous or non-adaptive parameters
    pub estimate_fallbacks: u64,
    /// Engine hangs reported by the device layer
    pub hangs: u64,
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Per-context driver
#[derive(Debug)]
pub struct VeboxPipeline {
    profile: HardwareProfile,
    config: PipelineConfig,
    topology: EngineTopology,
    reader: StatisticsReader,
    estimator: Option<NoiseEstimator>,
    state: NoiseState,
    last_params: Option<NoiseParameters>,
    coordinator: SubmissionCoordinator,
    geometry: Option<SurfaceDesc>,
    needs_reset: bool,
    stats: PipelineStats,
}

impl VeboxPipeline {
    /// Create a pipeline; `primary` backs the single-engine path
    pub fn new(profile: HardwareProfile, config: PipelineConfig, primary: CommandBufferHandle) -> Self {
        let layout = StatLayout::resolve(
            &profile,
            config.slice_mode,
            config.statistics_block.width,
            config.statistics_block.height,
        );
        let coordinator = SubmissionCoordinator::new(profile, config.submission_policy, primary)
            .with_parallel_submission(config.parallel_submission);

        log::info!(
            "vebox: pipeline on {} ({:?}, chroma {}, tgne {})",
            profile.name,
            config.denoise_mode,
            config.chroma_enabled,
            config.temporal_gne
        );

        Self {
            profile,
            config,
            topology: EngineTopology::new(&profile),
            reader: StatisticsReader::new(layout),
            estimator: None,
            state: NoiseState::new(config.temporal_gne),
            last_params: None,
            coordinator,
            geometry: None,
            needs_reset: false,
            stats: PipelineStats::default(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Hardware profile in use
    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }

    /// Noise history
    pub fn noise_state(&self) -> &NoiseState {
        &self.state
    }

    /// Counters
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Stage the submission state machine stopped in
    pub fn frame_stage(&self) -> FrameStage {
        self.coordinator.stage()
    }

    /// An engine hang was reported; the device context must be reset
    pub fn needs_reset(&self) -> bool {
        self.needs_reset
    }

    /// Process one frame
    ///
    /// The noise state is committed before submission, so a frame that
    /// fails in the coordinator still advances the estimator regime.
    pub fn process_frame(&mut self, frame: &Frame, ctx: &mut FrameContext<'_>) -> Result<FrameReport> {
        if self.needs_reset {
            log::error!("vebox: frame rejected, pipeline awaits reset after engine hang");
            return Err(Error::InvalidState);
        }

        self.rebind(&frame.source);

        let decision = self.topology.decide(&frame.source, &frame.target, ctx.device);
        self.update_resources(&decision, &mut *ctx.resources)?;

        let (parameters, estimate) = self.estimate(&frame.source, &mut *ctx.statistics)?;

        let mut populator = FramePopulator::new(&mut *ctx.populator, &parameters);
        let buffers = match self
            .coordinator
            .run(&decision, frame.target.dimensions(), &mut populator, ctx.submitter)
        {
            Ok(buffers) => buffers,
            Err(e) => {
                if let Error::EngineHang { engine } = e {
                    log::error!("vebox: engine {} hung, device context reset required", engine);
                    self.needs_reset = true;
                    self.stats.hangs += 1;
                }
                return Err(e);
            }
        };

        self.stats.frames += 1;
        if decision.scalable {
            self.stats.scalable_frames += 1;
        }

        Ok(FrameReport {
            decision,
            parameters,
            estimate,
            buffers,
        })
    }

    /// Recover after an engine hang
    ///
    /// Frees the engine group so the next scalable frame gets zeroed
    /// semaphores, and restarts the noise history.
    pub fn reset(&mut self, resources: &mut dyn EngineResources) -> Result<()> {
        self.coordinator.release(resources)?;
        self.state.reset();
        self.last_params = None;
        self.needs_reset = false;
        log::info!("vebox: pipeline reset");
        Ok(())
    }

    /// Free every engine resource
    pub fn teardown(&mut self, resources: &mut dyn EngineResources) -> Result<()> {
        self.coordinator.release(resources)?;
        self.geometry = None;
        self.last_params = None;
        self.state.reset();
        Ok(())
    }

    /// New geometry or format restarts the noise history
    fn rebind(&mut self, source: &SurfaceDesc) {
        if self.geometry.as_ref() == Some(source) {
            return;
        }

        match self.estimator.as_mut() {
            Some(estimator) => estimator.set_surface(&self.profile, source),
            None => self.estimator = Some(NoiseEstimator::new(&self.profile, source)),
        }
        if self.geometry.is_some() {
            log::info!(
                "vebox: source now {}x{} {:?}, noise history reset",
                source.width,
                source.height,
                source.color_pack
            );
        }
        self.state.reset();
        self.last_params = None;
        self.geometry = Some(*source);
    }

    fn update_resources(&mut self, decision: &SchedulingDecision, resources: &mut dyn EngineResources) -> Result<()> {
        if decision.scalable {
            self.coordinator.prepare(decision, resources)
        } else if !self.coordinator.group().is_empty() {
            self.coordinator.release(resources)
        } else {
            Ok(())
        }
    }

    fn estimate(
        &mut self,
        source: &SurfaceDesc,
        statistics: &mut dyn StatisticsSource,
    ) -> Result<(NoiseParameters, EstimateSource)> {
        let chroma = self.config.chroma_enabled;
        if !self.config.denoise_enabled {
            return Ok((NoiseParameters::non_adaptive(chroma), EstimateSource::Disabled));
        }
        let estimator = self.estimator.ok_or(Error::InvalidState)?;

        let read = match statistics.lock_statistics() {
            Ok(buffer) => {
                let read = self.reader.read(buffer);
                statistics.unlock_statistics()?;
                read
            }
            Err(e) => Err(e),
        };

        let resolution = u32::try_from(source.dimensions().pixels()).unwrap_or(u32::MAX);
        let mode = self.config.denoise_mode;
        let state = &mut self.state;
        match read.and_then(|stats| estimator.update(&stats, state, mode, chroma, resolution)) {
            Ok(params) => {
                self.last_params = Some(params);
                self.stats.adaptive_updates += 1;
                Ok((params, EstimateSource::Adaptive))
            }
            Err(Error::InvalidStatistics) => {
                self.stats.estimate_fallbacks += 1;
                Ok(match self.last_params {
                    Some(params) => (params, EstimateSource::Previous),
                    None => (NoiseParameters::non_adaptive(chroma), EstimateSource::NonAdaptive),
                })
            }
            Err(Error::InvalidBuffer) => {
                log::warn!("vebox: statistics unavailable, frame runs non-adaptive");
                self.stats.estimate_fallbacks += 1;
                Ok((NoiseParameters::non_adaptive(chroma), EstimateSource::NonAdaptive))
            }
            Err(e) => Err(e),
        }
    }
}

static_assertions::assert_impl_all!(VeboxPipeline: Send, Sync);
