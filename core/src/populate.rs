//! # Hardware-State Population
//!
//! The VEBOX state, surface, SFC and DI/IECP commands are written by an
//! external collaborator. This module is the seam between that collaborator
//! and the per-engine stream generator.

use vebox_denoise::NoiseParameters;
use vebox_hal::{CommandBuffer, MiCommand, Result};
use vebox_scalability::{SchedulingDecision, StreamPopulator};

/// Writes the hardware-state region of one engine's stream
pub trait HardwareStatePopulator {
    /// Append the state for `engine`, parameterized by this frame's noise
    /// estimate, to `cb`
    fn populate(
        &mut self,
        engine: u32,
        params: &NoiseParameters,
        decision: &SchedulingDecision,
        cb: &mut CommandBuffer,
    ) -> Result<()>;
}

impl<F> HardwareStatePopulator for F
where
    F: FnMut(u32, &NoiseParameters, &SchedulingDecision, &mut CommandBuffer) -> Result<()>,
{
    fn populate(
        &mut self,
        engine: u32,
        params: &NoiseParameters,
        decision: &SchedulingDecision,
        cb: &mut CommandBuffer,
    ) -> Result<()> {
        self(engine, params, decision, cb)
    }
}

/// Emits an opaque state region of fixed size (null-hardware mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaqueStatePopulator {
    dwords: u32,
}

impl OpaqueStatePopulator {
    /// Region of `dwords` dwords per engine
    pub const fn new(dwords: u32) -> Self {
        Self { dwords }
    }
}

impl HardwareStatePopulator for OpaqueStatePopulator {
    fn populate(
        &mut self,
        engine: u32,
        _params: &NoiseParameters,
        _decision: &SchedulingDecision,
        cb: &mut CommandBuffer,
    ) -> Result<()> {
        cb.push(MiCommand::HardwareState {
            engine,
            dwords: self.dwords,
        })
    }
}

/// Binds one frame's noise parameters to a hardware-state populator
pub(crate) struct FramePopulator<'a, H: ?Sized> {
    inner: &'a mut H,
    params: &'a NoiseParameters,
}

impl<'a, H: HardwareStatePopulator + ?Sized> FramePopulator<'a, H> {
    pub(crate) fn new(inner: &'a mut H, params: &'a NoiseParameters) -> Self {
        Self { inner, params }
    }
}

impl<H: HardwareStatePopulator + ?Sized> StreamPopulator for FramePopulator<'_, H> {
    fn populate(&mut self, engine: u32, decision: &SchedulingDecision, cb: &mut CommandBuffer) -> Result<()> {
        self.inner.populate(engine, self.params, decision, cb)
    }
}
