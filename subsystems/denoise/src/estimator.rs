//! # Adaptive Noise Estimator
//!
//! Turns one frame of GNE statistics into the denoise parameters for the
//! next frame.
//!
//! ## Regimes
//!
//! ```text
//!   frame 1            frame 2               frame 3..n           valid bit lost
//!   ┌─────────┐       ┌────────────┐        ┌────────────┐        ┌──────────┐
//!   │ Default │ ────▶ │ Transition │ ─────▶ │   Steady   │ ─────▶ │ Default  │
//!   │ spatial │       │ seed, -1   │        │ EMA on TGNE│        │ fallback │
//!   └─────────┘       └────────────┘        └────────────┘ ◀───── └──────────┘
//!                                                         current level taken
//!                                                         as is once
//! ```
//!
//! Every update is computed on a copy of [`NoiseState`] and committed only on
//! success, so a rejected frame leaves the state untouched.

use vebox_hal::{ColorPack, Errata, Error, HardwareProfile, NoiseConstants, Result, SurfaceDesc};

use crate::params::{ChannelNoise, ChromaNoise, DenoiseMode, HvsControl, NoiseParameters};
use crate::state::{NoiseRegime, NoiseState, NO_HISTORY};
use crate::stats::{Channel, FrameStatistics, SliceRecord, NOT_COMPUTED, TEMPORAL_VALID_BIT};

// =============================================================================
// ARITHMETIC
// =============================================================================

/// Normalized noise level: `sum * 100 / (count + 1)` in 32-bit arithmetic
///
/// `None` when `count + 1` wraps to zero.
pub const fn normalize(sum: u32, count: u32) -> Option<u32> {
    sum.wrapping_mul(100).checked_div(count.wrapping_add(1))
}

/// Exponential moving average step: `(a + b + 1) >> 1`
pub const fn round_up_shift_average(a: u32, b: u32) -> u32 {
    ((a as u64 + b as u64 + 1) >> 1) as u32
}

fn combined(region: &[SliceRecord; 2], channel: Channel) -> Result<(u32, u32)> {
    let sum = region[0].sum(channel).wrapping_add(region[1].sum(channel));
    let count = region[0].count(channel).wrapping_add(region[1].count(channel));
    if sum == NOT_COMPUTED || count == NOT_COMPUTED {
        return Err(Error::InvalidStatistics);
    }
    Ok((sum, count))
}

fn masked_count(region: &[SliceRecord; 2], channel: Channel) -> Result<u32> {
    let mask = !TEMPORAL_VALID_BIT;
    let count = (region[0].count(channel) & mask).wrapping_add(region[1].count(channel) & mask);
    if count == 0 {
        return Err(Error::InvalidStatistics);
    }
    Ok(count)
}

fn as_history(level: u32) -> i32 {
    i32::try_from(level).unwrap_or(i32::MAX)
}

// =============================================================================
// BLOCK THRESHOLD
// =============================================================================

/// 4x4 TGNE threshold count for one surface
///
/// `((width - bx) * (height - by)) / divisor`, where `bx` is widened on 4:4:4
/// surfaces of devices with [`Errata::WA_1609102037`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockThresholdPolicy {
    width: u32,
    height: u32,
    border_x: u32,
    border_y: u32,
    divisor: u32,
}

impl BlockThresholdPolicy {
    /// Policy for `surface` on `profile`
    pub fn for_surface(profile: &HardwareProfile, surface: &SurfaceDesc) -> Self {
        let n = &profile.noise;
        let wide = profile.has_erratum(Errata::WA_1609102037) && surface.color_pack == ColorPack::Yuv444;
        Self {
            width: surface.width,
            height: surface.height,
            border_x: if wide { n.block_border_wide } else { n.block_border },
            border_y: n.block_border,
            divisor: n.block_threshold_divisor.max(1),
        }
    }

    /// Threshold count
    pub fn count(&self) -> u32 {
        let w = u64::from(self.width.saturating_sub(self.border_x));
        let h = u64::from(self.height.saturating_sub(self.border_y));
        (w * h / u64::from(self.divisor)) as u32
    }
}

// =============================================================================
// ESTIMATOR
// =============================================================================

/// Stateless estimator bound to one profile and one surface geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseEstimator {
    constants: NoiseConstants,
    blocks: BlockThresholdPolicy,
}

impl NoiseEstimator {
    /// Create an estimator for frames of `surface`
    pub fn new(profile: &HardwareProfile, surface: &SurfaceDesc) -> Self {
        Self {
            constants: profile.noise,
            blocks: BlockThresholdPolicy::for_surface(profile, surface),
        }
    }

    /// Rebind to a new surface geometry or format
    pub fn set_surface(&mut self, profile: &HardwareProfile, surface: &SurfaceDesc) {
        *self = Self::new(profile, surface);
    }

    /// 4x4 TGNE threshold count for the bound surface
    pub fn block_threshold_count(&self) -> u32 {
        self.blocks.count()
    }

    /// Run one frame's update
    ///
    /// On error `state` is left exactly as it was.
    pub fn update(
        &self,
        stats: &FrameStatistics,
        state: &mut NoiseState,
        mode: DenoiseMode,
        chroma_enabled: bool,
        resolution_pixels: u32,
    ) -> Result<NoiseParameters> {
        let mut next = *state;
        match self.compute(stats, &mut next, mode, chroma_enabled, resolution_pixels) {
            Ok(params) => {
                *state = next;
                Ok(params)
            }
            Err(e) => {
                log::warn!("vebox: noise update skipped: {}", e);
                Err(e)
            }
        }
    }

    fn compute(
        &self,
        stats: &FrameStatistics,
        s: &mut NoiseState,
        mode: DenoiseMode,
        chroma_enabled: bool,
        resolution_pixels: u32,
    ) -> Result<NoiseParameters> {
        let c = &self.constants;

        if s.temporal_enabled {
            s.temporal_valid = stats.temporal_flag();
        } else {
            s.temporal_valid = false;
            s.temporal_first_frame = true;
        }
        if s.pipeline_first_frame {
            s.temporal_first_frame = true;
        }

        let regime = s.regime();
        let fallback = !s.temporal_valid && !s.pipeline_first_frame && !s.temporal_first_frame;
        let bdrate = mode == DenoiseMode::AutoBdrate;
        log::debug!(
            "vebox: gne regime {:?} (tgne {}, valid {}, tfirst {}, first {}, fallback {})",
            regime,
            s.temporal_enabled,
            s.temporal_valid,
            s.temporal_first_frame,
            s.pipeline_first_frame,
            fallback
        );

        let channels: &[Channel] = if chroma_enabled {
            &Channel::ALL
        } else {
            &[Channel::Y]
        };
        let mut out = [ChannelNoise::default(); 3];

        match regime {
            NoiseRegime::Transition => {
                for &ch in channels {
                    let (level, count) = self.spatial_level(stats, ch, chroma_enabled && bdrate)?;
                    let i = ch.index();
                    if bdrate {
                        s.global_level[i] = level.saturating_add(50) / 100;
                    }
                    s.prev_temporal_level[i] = NO_HISTORY;
                    out[i] = Self::channel(s, ch, level, count);
                }

                s.temporal_block_enable = true;
                s.block_threshold_count = self.blocks.count();
                if bdrate {
                    s.luma_stad_threshold = c.bdrate_stad;
                    s.history_init = c.bdrate_history_init;
                    s.chroma_stad_threshold = c.bdrate_stad;
                } else {
                    s.luma_stad_threshold = c.luma_stad_default;
                    s.chroma_stad_threshold = c.chroma_stad_default;
                }
            }
            NoiseRegime::Steady => {
                let mut current = [0u32; 3];
                for &ch in channels {
                    let (level, cur) = Self::smooth(stats, s, ch)?;
                    current[ch.index()] = cur;
                    out[ch.index()] = level;
                }

                s.temporal_block_enable = true;
                s.block_threshold_count = self.blocks.count();
                if bdrate {
                    s.luma_stad_threshold = c.bdrate_stad;
                    s.history_init = c.bdrate_history_init;
                    s.chroma_stad_threshold = c.bdrate_stad;
                } else {
                    s.luma_stad_threshold = if s.global_level[0] <= 1 {
                        c.luma_stad_default
                    } else {
                        ((u64::from(s.luma_stad_threshold) + (u64::from(current[0]) << 1) + 1) >> 1) as u32
                    };
                    if chroma_enabled {
                        s.chroma_stad_threshold = if s.global_level[1] <= 1 || s.global_level[2] <= 1 {
                            c.chroma_stad_default
                        } else {
                            ((u64::from(s.chroma_stad_threshold)
                                + u64::from(current[1])
                                + u64::from(current[2])
                                + 1)
                                >> 1) as u32
                        };
                    }
                }
            }
            NoiseRegime::Default => {
                for &ch in channels {
                    let (level, count) = self.spatial_level(stats, ch, chroma_enabled)?;
                    let i = ch.index();
                    s.global_level[i] = level;
                    s.prev_temporal_level[i] = NO_HISTORY;
                    if fallback {
                        s.fallback[i] = true;
                    }
                    out[i] = Self::channel(s, ch, level, count);
                }

                if fallback {
                    s.history_init = c.reset_history_init;
                } else {
                    if bdrate {
                        s.history_init = c.reset_history_init;
                    }
                    s.temporal_block_enable = false;
                    s.luma_stad_threshold = 0;
                    s.block_threshold_count = 0;
                    s.chroma_stad_threshold = 0;
                }
            }
        }

        log::debug!(
            "vebox: gne Y global {} sgne {}/{}",
            out[0].global_level,
            out[0].sgne_level,
            out[0].sgne_count
        );

        let subjective = mode == DenoiseMode::AutoSubjective;
        let hvs = HvsControl {
            bdrate_enabled: bdrate,
            subjective_enabled: subjective,
            bsd_threshold: if !subjective {
                0
            } else if resolution_pixels < c.resolution_threshold {
                c.bsd_threshold_low_res
            } else {
                c.bsd_threshold_high_res
            },
        };

        let params = NoiseParameters {
            regime,
            luma: out[0],
            chroma: chroma_enabled.then(|| ChromaNoise {
                u: out[1],
                v: out[2],
                stad_threshold: s.chroma_stad_threshold,
                history_delta: c.history_delta,
                history_max: c.history_max,
            }),
            fallback,
            first_frame: s.pipeline_first_frame,
            temporal_first_frame: !s.pipeline_first_frame && s.temporal_first_frame,
            temporal_gne_enabled: s.temporal_enabled,
            temporal_block_enable: s.temporal_block_enable,
            luma_stad_threshold: s.luma_stad_threshold,
            history_init: s.history_init,
            block_threshold_count: s.block_threshold_count,
            hvs,
        };

        if regime == NoiseRegime::Transition {
            s.temporal_first_frame = false;
        }
        s.pipeline_first_frame = false;
        Ok(params)
    }

    /// Normalized spatial level and raw count; luma gets the chroma
    /// consistency correction when `consistency` is set
    fn spatial_level(&self, stats: &FrameStatistics, ch: Channel, consistency: bool) -> Result<(u32, u32)> {
        let region = stats.region(false);
        let (sum, count) = combined(region, ch)?;
        let mut level = normalize(sum, count).ok_or(Error::InvalidStatistics)?;

        if ch == Channel::Y && consistency {
            let (us, uc) = combined(region, Channel::U)?;
            let (vs, vc) = combined(region, Channel::V)?;
            let u = normalize(us, uc).ok_or(Error::InvalidStatistics)?;
            let v = normalize(vs, vc).ok_or(Error::InvalidStatistics)?;
            level = self.consistent_luma(level, u, v);
        }
        Ok((level, count))
    }

    /// Luma is over-estimated when both chroma levels are small but present
    fn consistent_luma(&self, luma: u32, u: u32, v: u32) -> u32 {
        let c = &self.constants;
        if u < c.chroma_threshold && v < c.chroma_threshold && u != 0 && v != 0 && luma > c.luma_threshold {
            log::debug!("vebox: luma gne {} corrected against chroma {}/{}", luma, u, v);
            luma >> 2
        } else {
            luma
        }
    }

    /// Steady-state update of one channel; returns the output and the
    /// current temporal level
    fn smooth(stats: &FrameStatistics, s: &mut NoiseState, ch: Channel) -> Result<(ChannelNoise, u32)> {
        let temporal = stats.region(true);
        let (sum, _) = combined(temporal, ch)?;
        let count = masked_count(temporal, ch)?;
        let current = sum / count;

        let i = ch.index();
        s.global_level[i] = if s.fallback[i] {
            s.fallback[i] = false;
            current
        } else {
            round_up_shift_average(s.global_level[i], current)
        };
        s.prev_temporal_level[i] = as_history(current);

        let (ssum, scount) = combined(stats.region(false), ch)?;
        let sgne = normalize(ssum, scount).ok_or(Error::InvalidStatistics)?;
        Ok((Self::channel(s, ch, sgne, scount), current))
    }

    fn channel(s: &NoiseState, ch: Channel, sgne_level: u32, sgne_count: u32) -> ChannelNoise {
        let i = ch.index();
        ChannelNoise {
            global_level: s.global_level[i],
            sgne_level,
            sgne_count,
            prev_temporal_level: s.prev_temporal_level[i],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UHD: SurfaceDesc = SurfaceDesc::new(3840, 2160, ColorPack::Yuv420);

    fn estimator() -> NoiseEstimator {
        NoiseEstimator::new(&HardwareProfile::gen12(), &UHD)
    }

    fn record(sum: u32, count: u32) -> SliceRecord {
        SliceRecord {
            luma_sum: sum,
            luma_count: count,
            ..SliceRecord::default()
        }
    }

    /// Luma-only statistics; `temporal` is `None` when the valid bit is clear
    fn frame(spatial: (u32, u32), temporal: Option<(u32, u32)>) -> FrameStatistics {
        let mut f = FrameStatistics {
            spatial: [record(spatial.0, spatial.1), SliceRecord::default()],
            ..FrameStatistics::default()
        };
        if let Some((sum, count)) = temporal {
            f.temporal[0] = record(sum, count | TEMPORAL_VALID_BIT);
        }
        f
    }

    fn with_chroma(mut f: FrameStatistics, u: (u32, u32), v: (u32, u32)) -> FrameStatistics {
        for region in [&mut f.spatial, &mut f.temporal] {
            region[0].u_sum = u.0;
            region[0].u_count = u.1;
            region[0].v_sum = v.0;
            region[0].v_count = v.1;
        }
        f
    }

    #[test]
    fn test_normalize_is_exact() {
        assert_eq!(normalize(1000, 9), Some(10000));
        assert_eq!(normalize(1000, 10), Some(9090));
        assert_eq!(normalize(0, 0), Some(0));
        assert_eq!(normalize(7, 0), Some(700));
        assert_eq!(normalize(5, u32::MAX), None);
    }

    #[test]
    fn test_round_up_shift_average() {
        assert_eq!(round_up_shift_average(4, 4), 4);
        assert_eq!(round_up_shift_average(4, 5), 5);
        assert_eq!(round_up_shift_average(0, 1), 1);
        assert_eq!(round_up_shift_average(u32::MAX, u32::MAX), u32::MAX);
        assert_eq!(round_up_shift_average(5000, 42), 2521);
    }

    #[test]
    fn test_chroma_consistency_divides_by_four() {
        let e = estimator();
        assert_eq!(e.consistent_luma(40_000, 1000, 1000), 10_000);
        // boundaries are strict
        assert_eq!(e.consistent_luma(32_000, 1000, 1000), 32_000);
        assert_eq!(e.consistent_luma(40_000, 1850, 1000), 40_000);
        assert_eq!(e.consistent_luma(40_000, 0, 1000), 40_000);
    }

    #[test]
    fn test_consistency_only_with_chroma_enabled() {
        let e = estimator();
        // luma 400 * 100 / 1 = 40000, chroma 10 * 100 / 1 = 1000
        let f = with_chroma(frame((400, 0), None), (10, 0), (10, 0));

        let mut s = NoiseState::new(true);
        let p = e.update(&f, &mut s, DenoiseMode::Manual, true, 0).unwrap();
        assert_eq!(p.luma.global_level, 10_000);

        let mut s = NoiseState::new(true);
        let p = e.update(&f, &mut s, DenoiseMode::Manual, false, 0).unwrap();
        assert_eq!(p.luma.global_level, 40_000);
        assert!(p.chroma.is_none());
    }

    #[test]
    fn test_transition_consistency_only_in_bdrate() {
        let e = estimator();
        // luma 40000, chroma 1000 on both frames
        let first = with_chroma(frame((400, 0), None), (10, 0), (10, 0));
        let second = with_chroma(frame((400, 0), Some((10, 1))), (10, 0), (10, 0));

        for mode in [DenoiseMode::Manual, DenoiseMode::AutoSubjective] {
            let mut s = NoiseState::new(true);
            let p = e.update(&first, &mut s, mode, true, 0).unwrap();
            assert_eq!(p.regime, NoiseRegime::Default);
            assert_eq!(p.luma.global_level, 10_000);

            let p = e.update(&second, &mut s, mode, true, 0).unwrap();
            assert_eq!(p.regime, NoiseRegime::Transition, "{:?}", mode);
            assert_eq!(p.luma.sgne_level, 40_000, "{:?}", mode);
            assert_eq!(p.luma.global_level, 10_000);
            assert_eq!(p.luma_stad_threshold, 3200);

            let chroma = p.chroma.unwrap();
            assert_eq!(chroma.u.global_level, 1000);
            assert_eq!(chroma.v.global_level, 1000);
            assert_eq!(chroma.u.sgne_level, 1000);
            assert_eq!(chroma.u.prev_temporal_level, -1);
            assert_eq!(chroma.stad_threshold, 1600);
            assert_eq!(s.chroma_stad_threshold, 1600);
        }

        let mut s = NoiseState::new(true);
        e.update(&first, &mut s, DenoiseMode::AutoBdrate, true, 0).unwrap();
        let p = e.update(&second, &mut s, DenoiseMode::AutoBdrate, true, 0).unwrap();
        assert_eq!(p.luma.sgne_level, 10_000);
        // (10000 + 50) / 100
        assert_eq!(p.luma.global_level, 100);
        assert_eq!(p.chroma.unwrap().u.global_level, 10);
    }

    #[test]
    fn test_subjective_transition_outputs() {
        let e = estimator();
        let mut s = NoiseState::new(true);
        e.update(&frame((5000, 99), None), &mut s, DenoiseMode::AutoSubjective, false, 1920 * 1080)
            .unwrap();
        let p = e
            .update(&frame((6000, 99), Some((3000, 10))), &mut s, DenoiseMode::AutoSubjective, false, 1920 * 1080)
            .unwrap();
        assert_eq!(p.regime, NoiseRegime::Transition);
        assert_eq!(p.luma.global_level, 5000);
        assert_eq!(p.luma.sgne_level, 6000);
        assert_eq!(p.luma_stad_threshold, 3200);
        assert_eq!(p.history_init, 0);
        assert!(p.hvs.subjective_enabled);
        assert!(!p.hvs.bdrate_enabled);
        assert_eq!(p.hvs.bsd_threshold, 135);
    }

    #[test]
    fn test_three_frame_sequence() {
        let e = estimator();
        let mut s = NoiseState::new(true);

        // frame 1: spatial only
        let p = e.update(&frame((5000, 99), None), &mut s, DenoiseMode::Manual, false, 0).unwrap();
        assert_eq!(p.regime, NoiseRegime::Default);
        assert_eq!(p.luma.global_level, 5000);
        assert_eq!(p.luma.prev_temporal_level, -1);
        assert!(p.first_frame);
        assert!(!s.pipeline_first_frame);
        assert!(s.temporal_first_frame);

        // frame 2: temporal statistics appear
        let p = e
            .update(&frame((6000, 99), Some((3000, 10))), &mut s, DenoiseMode::Manual, false, 0)
            .unwrap();
        assert_eq!(p.regime, NoiseRegime::Transition);
        assert_eq!(p.luma.prev_temporal_level, -1);
        assert_eq!(p.luma.sgne_level, 6000);
        // manual mode keeps the level from frame 1
        assert_eq!(p.luma.global_level, 5000);
        assert_eq!(p.luma_stad_threshold, 3200);
        assert_eq!(p.block_threshold_count, 5154);
        assert!(p.temporal_first_frame);
        assert!(!s.temporal_first_frame);

        // frame 3: steady state
        let p = e
            .update(&frame((6000, 99), Some((4200, 100))), &mut s, DenoiseMode::Manual, false, 0)
            .unwrap();
        assert_eq!(p.regime, NoiseRegime::Steady);
        assert_eq!(p.luma.global_level, 2521);
        assert_eq!(p.luma.prev_temporal_level, 42);
        assert_eq!((p.luma.sgne_level, p.luma.sgne_count), (6000, 99));
        assert_eq!(p.luma_stad_threshold, (3200 + 84 + 1) >> 1);
        assert!(p.temporal_block_enable);
    }

    #[test]
    fn test_bdrate_transition_seeds_levels() {
        let e = estimator();
        let mut s = NoiseState::new(true);
        let f = with_chroma(frame((5000, 99), None), (1200, 99), (1249, 99));
        e.update(&f, &mut s, DenoiseMode::AutoBdrate, true, 0).unwrap();
        assert_eq!(s.history_init, 32);

        let f = with_chroma(frame((5049, 99), Some((10, 1))), (1200, 99), (1249, 99));
        let p = e.update(&f, &mut s, DenoiseMode::AutoBdrate, true, 0).unwrap();
        assert_eq!(p.regime, NoiseRegime::Transition);
        // (5049 + 50) / 100
        assert_eq!(p.luma.global_level, 50);
        assert_eq!(p.luma_stad_threshold, 250);
        assert_eq!(p.history_init, 27);

        let chroma = p.chroma.unwrap();
        assert_eq!(chroma.u.global_level, 12);
        assert_eq!(chroma.v.global_level, 12);
        assert_eq!(chroma.stad_threshold, 250);
        assert_eq!(chroma.u.prev_temporal_level, -1);
        assert_eq!((chroma.history_delta, chroma.history_max), (8, 192));
    }

    #[test]
    fn test_corrupt_statistics_leave_state_unchanged() {
        let e = estimator();
        let mut s = NoiseState::new(true);
        let before = s.snapshot();
        let corrupt = frame((5000, u32::MAX), None);
        assert_eq!(
            e.update(&corrupt, &mut s, DenoiseMode::Manual, false, 0),
            Err(Error::InvalidStatistics)
        );
        assert_eq!(s.snapshot(), before);

        // same in steady state, with the sentinel on the temporal sum
        e.update(&frame((5000, 99), None), &mut s, DenoiseMode::Manual, false, 0).unwrap();
        e.update(&frame((5000, 99), Some((100, 10))), &mut s, DenoiseMode::Manual, false, 0)
            .unwrap();
        let before = s.snapshot();
        let corrupt = frame((5000, 99), Some((u32::MAX, 10)));
        assert_eq!(
            e.update(&corrupt, &mut s, DenoiseMode::Manual, false, 0),
            Err(Error::InvalidStatistics)
        );
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn test_steady_zero_count_rejected() {
        let e = estimator();
        let mut s = NoiseState::new(true);
        e.update(&frame((5000, 99), None), &mut s, DenoiseMode::Manual, false, 0).unwrap();
        e.update(&frame((5000, 99), Some((100, 10))), &mut s, DenoiseMode::Manual, false, 0)
            .unwrap();

        let before = s;
        // only the validity bit is set
        let f = frame((5000, 99), Some((100, 0)));
        assert_eq!(
            e.update(&f, &mut s, DenoiseMode::Manual, false, 0),
            Err(Error::InvalidStatistics)
        );
        assert_eq!(s, before);
    }

    #[test]
    fn test_fallback_then_recovery() {
        let e = estimator();
        let mut s = NoiseState::new(true);
        e.update(&frame((5000, 99), None), &mut s, DenoiseMode::Manual, false, 0).unwrap();
        e.update(&frame((5000, 99), Some((100, 10))), &mut s, DenoiseMode::Manual, false, 0)
            .unwrap();
        e.update(&frame((5000, 99), Some((100, 10))), &mut s, DenoiseMode::Manual, false, 0)
            .unwrap();

        // temporal statistics drop out
        let p = e.update(&frame((3000, 99), None), &mut s, DenoiseMode::Manual, false, 0).unwrap();
        assert_eq!(p.regime, NoiseRegime::Default);
        assert!(p.fallback);
        assert!(s.fallback[0]);
        assert_eq!(p.history_init, 32);
        assert_eq!(p.luma.global_level, 3000);
        // temporal block processing stays on during fallback
        assert!(p.temporal_block_enable);

        // back: the current level is taken as is, once
        let p = e
            .update(&frame((3000, 99), Some((700, 10))), &mut s, DenoiseMode::Manual, false, 0)
            .unwrap();
        assert_eq!(p.regime, NoiseRegime::Steady);
        assert_eq!(p.luma.global_level, 70);
        assert!(!s.fallback[0]);

        let p = e
            .update(&frame((3000, 99), Some((500, 10))), &mut s, DenoiseMode::Manual, false, 0)
            .unwrap();
        assert_eq!(p.luma.global_level, 60);
    }

    #[test]
    fn test_temporal_disabled_stays_default() {
        let e = estimator();
        let mut s = NoiseState::new(false);
        for _ in 0..3 {
            let p = e
                .update(&frame((5000, 99), Some((100, 10))), &mut s, DenoiseMode::Manual, false, 0)
                .unwrap();
            assert_eq!(p.regime, NoiseRegime::Default);
            assert!(!p.fallback);
            assert!(!s.temporal_valid);
            assert!(s.temporal_first_frame);
            assert_eq!(p.luma_stad_threshold, 0);
        }
    }

    #[test]
    fn test_steady_chroma_thresholds() {
        let e = estimator();
        let mut s = NoiseState::new(true);
        let f = with_chroma(frame((5000, 99), Some((100, 10))), (300, 10), (500, 10));
        e.update(&with_chroma(frame((5000, 99), None), (300, 10), (500, 10)), &mut s, DenoiseMode::Manual, true, 0)
            .unwrap();
        e.update(&f, &mut s, DenoiseMode::Manual, true, 0).unwrap();
        assert_eq!(s.chroma_stad_threshold, 1600);

        let p = e.update(&f, &mut s, DenoiseMode::Manual, true, 0).unwrap();
        let chroma = p.chroma.unwrap();
        // U: spatial 300*100/11 = 2727 from frame 1, current 30
        assert_eq!(chroma.u.global_level, (2727 + 30 + 1) >> 1);
        assert_eq!(chroma.v.global_level, (4545 + 50 + 1) >> 1);
        assert_eq!(chroma.u.prev_temporal_level, 30);
        assert_eq!(chroma.stad_threshold, (1600 + 30 + 50 + 1) >> 1);
    }

    #[test]
    fn test_bsd_threshold_by_resolution() {
        let e = estimator();
        let f = frame((5000, 99), None);

        let mut s = NoiseState::new(true);
        let p = e.update(&f, &mut s, DenoiseMode::AutoSubjective, false, 1920 * 1080 - 1).unwrap();
        assert_eq!(p.hvs.bsd_threshold, 240);
        assert!(p.hvs.subjective_enabled);

        let mut s = NoiseState::new(true);
        let p = e.update(&f, &mut s, DenoiseMode::AutoSubjective, false, 1920 * 1080).unwrap();
        assert_eq!(p.hvs.bsd_threshold, 135);

        let mut s = NoiseState::new(true);
        let p = e.update(&f, &mut s, DenoiseMode::AutoBdrate, false, 0).unwrap();
        assert_eq!(p.hvs.bsd_threshold, 0);
        assert!(p.hvs.bdrate_enabled);
    }

    #[test]
    fn test_block_threshold_policy() {
        let p = HardwareProfile::gen12();
        assert_eq!(BlockThresholdPolicy::for_surface(&p, &UHD).count(), 5154);

        let ayuv = SurfaceDesc::new(3840, 2160, ColorPack::Yuv444);
        // no erratum: the narrow border applies even to 4:4:4
        assert_eq!(BlockThresholdPolicy::for_surface(&p, &ayuv).count(), 5154);
        let wa = p.with_errata(Errata::WA_1609102037);
        assert_eq!(BlockThresholdPolicy::for_surface(&wa, &ayuv).count(), 5121);
        assert_eq!(BlockThresholdPolicy::for_surface(&wa, &UHD).count(), 5154);

        let tiny = SurfaceDesc::new(4, 4, ColorPack::Yuv420);
        assert_eq!(BlockThresholdPolicy::for_surface(&p, &tiny).count(), 0);
    }
}
