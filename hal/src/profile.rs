//! # Hardware Profiles
//!
//! Per-generation constant tables.
//!
//! The barrier protocol and the noise estimator are generic over one
//! [`HardwareProfile`] value instead of a type per silicon generation. Every
//! threshold, register offset and erratum flag they consume lives here, so the
//! tables can be tested on their own and a new generation is a new `const fn`.

use crate::types::Dimensions;

// =============================================================================
// ERRATA
// =============================================================================

bitflags::bitflags! {
    /// Hardware errata that change numeric policy
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Errata: u32 {
        /// 4:4:4 surfaces need a 32 pixel horizontal border for the 4x4 TGNE count
        const WA_1609102037 = 1 << 0;
    }
}

// =============================================================================
// WATCHDOG
// =============================================================================

/// Watchdog register block of the video-enhancement engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchdogRegisters {
    /// Counter control register offset
    pub control: u32,
    /// Counter threshold register offset
    pub threshold: u32,
    /// Control value that starts the counter
    pub enable_value: u32,
    /// Control value that stops the counter
    pub disable_value: u32,
}

// =============================================================================
// STATISTICS LAYOUT
// =============================================================================

/// Platform-dependent layout of the per-frame statistics block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatisticsGeometry {
    /// Byte offset of the spatial GNE record inside a slice block
    pub gne_offset: u32,
    /// Byte offset of the temporal GNE record inside a slice block
    pub tgne_offset: u32,
    /// Size in bytes of one per-frame slice block (the slice pitch)
    pub per_frame_size: u32,
}


// =============================================================================
// NOISE CONSTANTS
// =============================================================================

/// Thresholds used by the adaptive noise estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoiseConstants {
    /// Chroma GNE below which luma is considered over-estimated
    pub chroma_threshold: u32,
    /// Luma GNE above which the chroma consistency check may apply
    pub luma_threshold: u32,
    /// Pixel count of 1080p, boundary for the subjective BSD threshold
    pub resolution_threshold: u32,
    /// Chroma denoise history maximum
    pub history_max: u32,
    /// Chroma denoise history delta
    pub history_delta: u32,
    /// Luma STAD threshold with no usable temporal noise
    pub luma_stad_default: u32,
    /// Chroma STAD threshold with no usable temporal noise
    pub chroma_stad_default: u32,
    /// STAD threshold for both groups in bd-rate mode
    pub bdrate_stad: u32,
    /// History init in bd-rate mode once temporal data is flowing
    pub bdrate_history_init: u32,
    /// History init on the first frame and on fallback
    pub reset_history_init: u32,
    /// BSD threshold below `resolution_threshold`
    pub bsd_threshold_low_res: u32,
    /// BSD threshold at or above `resolution_threshold`
    pub bsd_threshold_high_res: u32,
    /// Divisor of the 4x4 TGNE threshold count
    pub block_threshold_divisor: u32,
    /// Border removed from each axis for the 4x4 TGNE count
    pub block_border: u32,
    /// Horizontal border with [`Errata::WA_1609102037`] on 4:4:4
    pub block_border_wide: u32,
}

impl NoiseConstants {
    /// Gen12 noise constants
    pub const fn gen12() -> Self {
        Self {
            chroma_threshold: 1850,
            luma_threshold: 32000,
            resolution_threshold: 2_073_600,
            history_max: 192,
            history_delta: 8,
            luma_stad_default: 3200,
            chroma_stad_default: 1600,
            bdrate_stad: 250,
            bdrate_history_init: 27,
            reset_history_init: 32,
            bsd_threshold_low_res: 240,
            bsd_threshold_high_res: 135,
            block_threshold_divisor: 1600,
            block_border: 8,
            block_border_wide: 32,
        }
    }
}

// =============================================================================
// HARDWARE PROFILE
// =============================================================================

/// Complete constant table for one hardware generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareProfile {
    /// Generation name, for logs
    pub name: &'static str,
    /// Number of semaphore slots, and so the maximum engine count
    pub max_engines: u32,
    /// Minimum width each engine must receive
    pub min_slice_width: u32,
    /// Per-axis size above which scalable mode is worth it
    pub scalability_threshold: Dimensions,
    /// Timestamp counter frequency
    pub timestamp_counts_per_sec: u64,
    /// Watchdog deadline
    pub watchdog_timeout_ms: u64,
    /// Watchdog register block
    pub watchdog: WatchdogRegisters,
    /// Size in bytes of one per-engine batch buffer
    pub command_buffer_size: u32,
    /// Statistics block layout
    pub statistics: StatisticsGeometry,
    /// Noise estimator constants
    pub noise: NoiseConstants,
    /// Errata present on this device
    pub errata: Errata,
}

/// Largest engine count any profile may declare
pub const MAX_ENGINES_LIMIT: u32 = 8;

/// Divisor applied to the watchdog deadline for very large scalable frames
const WATCHDOG_LARGE_FRAME_DIVISOR: u64 = 333;
/// Divisor applied to the watchdog deadline otherwise (ms to s)
const WATCHDOG_DEFAULT_DIVISOR: u64 = 1000;

static_assertions::const_assert!(HardwareProfile::gen12().max_engines <= MAX_ENGINES_LIMIT);
static_assertions::const_assert!(
    HardwareProfile::gen12().statistics.tgne_offset > HardwareProfile::gen12().statistics.gne_offset
);

impl HardwareProfile {
    /// Gen12 (Xe) video-enhancement engine
    pub const fn gen12() -> Self {
        Self {
            name: "gen12",
            max_engines: 4,
            min_slice_width: 64,
            scalability_threshold: Dimensions::new(3840, 2160),
            timestamp_counts_per_sec: 12_000_048,
            watchdog_timeout_ms: 60,
            watchdog: WatchdogRegisters {
                control: 0x1C_8178,
                threshold: 0x1C_817C,
                enable_value: 0x0,
                disable_value: 0xFFFF_FFFF,
            },
            command_buffer_size: 4096,
            statistics: StatisticsGeometry {
                gne_offset: 0x2C,
                tgne_offset: 0x5C,
                per_frame_size: 32 * 4,
            },
            noise: NoiseConstants::gen12(),
            errata: Errata::empty(),
        }
    }

    /// Same profile with additional errata
    pub const fn with_errata(mut self, errata: Errata) -> Self {
        self.errata = self.errata.union(errata);
        self
    }

    /// Check for an erratum
    pub const fn has_erratum(&self, erratum: Errata) -> bool {
        self.errata.contains(erratum)
    }

    /// Watchdog threshold in timestamp ticks for a frame split over `engines`
    ///
    /// Frames whose target covers more than one 4K picture per engine get the
    /// larger budget (`/333`), everything else gets `/1000`.
    pub const fn watchdog_threshold(&self, target: Dimensions, engines: u32) -> u32 {
        let per_engine_limit = self.scalability_threshold.pixels() * engines as u64;
        let budget = self.timestamp_counts_per_sec * self.watchdog_timeout_ms;
        let ticks = if target.pixels() > per_engine_limit {
            budget / WATCHDOG_LARGE_FRAME_DIVISOR
        } else {
            budget / WATCHDOG_DEFAULT_DIVISOR
        };
        ticks as u32
    }
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self::gen12()
    }
}
