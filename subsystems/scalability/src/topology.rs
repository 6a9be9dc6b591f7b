//! # Engine Topology
//!
//! Per-frame decision on whether a frame is split across engines, and across
//! how many.

use vebox_hal::{DeviceInfo, Dimensions, Error, HardwareProfile, Result, SurfaceDesc};

/// Outcome of [`EngineTopology::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchedulingDecision {
    /// Frame is split across engines
    pub scalable: bool,
    /// Participating engines; 1 when not scalable
    pub engine_count: u32,
}

impl SchedulingDecision {
    /// Legacy single-engine path
    pub const SINGLE: Self = Self {
        scalable: false,
        engine_count: 1,
    };

    /// Split across `engine_count` engines
    pub const fn scalable(engine_count: u32) -> Self {
        Self {
            scalable: true,
            engine_count,
        }
    }
}

impl Default for SchedulingDecision {
    fn default() -> Self {
        Self::SINGLE
    }
}

/// Why an otherwise eligible frame stays on one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Degenerate {
    /// No engine enabled or forced
    NoEngines,
    /// A surface is too narrow to give every engine a slice
    SliceTooNarrow {
        /// Engines that would have participated
        engines: u32,
    },
}

/// Scalability policy of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTopology {
    max_engines: u32,
    min_slice_width: u32,
    threshold: Dimensions,
}

impl EngineTopology {
    /// Policy from a hardware profile
    pub const fn new(profile: &HardwareProfile) -> Self {
        Self {
            max_engines: profile.max_engines,
            min_slice_width: profile.min_slice_width,
            threshold: profile.scalability_threshold,
        }
    }

    /// Decide for one frame; degenerate cases fall back to one engine
    pub fn decide<D: DeviceInfo + ?Sized>(
        &self,
        source: &SurfaceDesc,
        target: &SurfaceDesc,
        device: &D,
    ) -> SchedulingDecision {
        match self.evaluate(source, target, device) {
            Ok(decision) => decision,
            Err(reason) => {
                log::debug!("vebox: single engine fallback: {:?}", reason);
                SchedulingDecision::SINGLE
            }
        }
    }

    /// Like [`EngineTopology::decide`] but reports degenerate cases
    pub fn decide_strict<D: DeviceInfo + ?Sized>(
        &self,
        source: &SurfaceDesc,
        target: &SurfaceDesc,
        device: &D,
    ) -> Result<SchedulingDecision> {
        self.evaluate(source, target, device)
            .map_err(|_| Error::SchedulingDegenerate)
    }

    /// Engines the device offers, forced mask first, clamped to the profile
    pub fn engine_count<D: DeviceInfo + ?Sized>(&self, device: &D) -> u32 {
        let forced = device.forced_engine_mask();
        let count = if forced.is_empty() {
            device.enabled_engine_count()
        } else {
            forced.engine_count()
        };
        count.min(self.max_engines)
    }

    fn exceeds_threshold(&self, surface: &SurfaceDesc) -> bool {
        surface.effective_width() > self.threshold.width
            && surface.effective_height() > self.threshold.height
    }

    fn evaluate<D: DeviceInfo + ?Sized>(
        &self,
        source: &SurfaceDesc,
        target: &SurfaceDesc,
        device: &D,
    ) -> core::result::Result<SchedulingDecision, Degenerate> {
        if !device.scalability_supported() {
            return Ok(SchedulingDecision::SINGLE);
        }

        let wanted = device.scalability_forced()
            || self.exceeds_threshold(source)
            || self.exceeds_threshold(target);
        if !wanted {
            return Ok(SchedulingDecision::SINGLE);
        }

        let engines = self.engine_count(device);
        if engines == 0 {
            return Err(Degenerate::NoEngines);
        }

        let min_width = engines.saturating_mul(self.min_slice_width);
        if source.width <= min_width || target.width <= min_width {
            return Err(Degenerate::SliceTooNarrow { engines });
        }

        log::info!(
            "vebox: scalable mode on {} engines ({}x{} -> {}x{})",
            engines,
            source.width,
            source.height,
            target.width,
            target.height
        );
        Ok(SchedulingDecision::scalable(engines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vebox_hal::{ColorPack, EngineMask, Rect};

    struct Device {
        supported: bool,
        enabled: u32,
        mask: EngineMask,
        forced: bool,
    }

    impl DeviceInfo for Device {
        fn scalability_supported(&self) -> bool {
            self.supported
        }
        fn enabled_engine_count(&self) -> u32 {
            self.enabled
        }
        fn forced_engine_mask(&self) -> EngineMask {
            self.mask
        }
        fn scalability_forced(&self) -> bool {
            self.forced
        }
    }

    fn device(enabled: u32) -> Device {
        Device {
            supported: true,
            enabled,
            mask: EngineMask::empty(),
            forced: false,
        }
    }

    fn surface(w: u32, h: u32) -> SurfaceDesc {
        SurfaceDesc::new(w, h, ColorPack::Yuv420)
    }

    fn topology() -> EngineTopology {
        EngineTopology::new(&HardwareProfile::gen12())
    }

    #[test]
    fn test_exactly_4k_is_not_scalable() {
        let t = topology();
        let uhd = surface(3840, 2160);
        assert_eq!(t.decide(&uhd, &uhd, &device(2)), SchedulingDecision::SINGLE);
    }

    #[test]
    fn test_large_source_or_target_is_scalable() {
        let t = topology();
        let big = surface(4096, 2304);
        let small = surface(1920, 1080);
        assert_eq!(t.decide(&big, &small, &device(2)), SchedulingDecision::scalable(2));
        assert_eq!(t.decide(&small, &big, &device(2)), SchedulingDecision::scalable(2));
    }

    #[test]
    fn test_crop_limits_eligibility() {
        let t = topology();
        let cropped = surface(4096, 2304).with_crop(Rect::new(0, 0, 3840, 2304));
        assert_eq!(t.decide(&cropped, &cropped, &device(2)), SchedulingDecision::SINGLE);
    }

    #[test]
    fn test_forced_mode_and_mask() {
        let t = topology();
        let hd = surface(1920, 1080);
        let mut d = device(2);
        d.forced = true;
        assert_eq!(t.decide(&hd, &hd, &d), SchedulingDecision::scalable(2));

        d.mask = EngineMask::VEBOX1 | EngineMask::VEBOX2 | EngineMask::VEBOX4;
        assert_eq!(t.decide(&hd, &hd, &d), SchedulingDecision::scalable(3));

        d.supported = false;
        assert_eq!(t.decide(&hd, &hd, &d), SchedulingDecision::SINGLE);
    }

    #[test]
    fn test_engine_count_clamped() {
        let t = topology();
        assert_eq!(t.engine_count(&device(8)), 4);
    }

    #[test]
    fn test_degenerate_cases() {
        let t = topology();
        let big = surface(4096, 2304);

        assert_eq!(t.decide(&big, &big, &device(0)), SchedulingDecision::SINGLE);
        assert_eq!(t.decide_strict(&big, &big, &device(0)), Err(Error::SchedulingDegenerate));

        let mut d = device(4);
        d.forced = true;
        for (w, expect_scalable) in [(128, false), (256, false), (257, true), (4096, true)] {
            let narrow = surface(w, 64);
            let decision = t.decide(&narrow, &big, &d);
            assert_eq!(decision.scalable, expect_scalable, "width {}", w);
            let decision = t.decide(&big, &narrow, &d);
            assert_eq!(decision.scalable, expect_scalable, "target width {}", w);
        }
        assert_eq!(t.decide_strict(&surface(256, 64), &big, &d), Err(Error::SchedulingDegenerate));
    }

    #[test]
    fn test_single_engine_device_still_scalable() {
        let t = topology();
        let big = surface(4096, 2304);
        assert_eq!(t.decide_strict(&big, &big, &device(1)), Ok(SchedulingDecision::scalable(1)));
    }
}
