//! # Noise State
//!
//! Cross-frame state of the adaptive noise estimator.
//!
//! One instance lives per pipeline. It is created when the pipeline starts,
//! replaced when the source geometry or format changes, and otherwise only
//! ever written by [`crate::NoiseEstimator::update`].

/// Sentinel for "no temporal history"
pub const NO_HISTORY: i32 = -1;

/// Length of [`NoiseState::snapshot`]
pub const SNAPSHOT_LEN: usize = 48;

/// Estimator regime for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseRegime {
    /// Second frame of a temporal sequence; seeds the temporal history
    Transition,
    /// Temporal statistics flowing; exponential moving average
    Steady,
    /// First frame, temporal disabled, or temporal fallback
    Default,
}

impl NoiseRegime {
    /// Pick the regime from the four state flags
    ///
    /// Transition wins over steady state, which wins over the default.
    pub const fn select(
        temporal_enabled: bool,
        temporal_valid: bool,
        temporal_first_frame: bool,
        pipeline_first_frame: bool,
    ) -> Self {
        if temporal_enabled && temporal_first_frame && !pipeline_first_frame {
            NoiseRegime::Transition
        } else if temporal_enabled && temporal_valid && !pipeline_first_frame {
            NoiseRegime::Steady
        } else {
            NoiseRegime::Default
        }
    }
}

/// Persistent estimator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoiseState {
    /// Temporal GNE requested by configuration
    pub temporal_enabled: bool,
    /// Hardware reported usable temporal statistics for the last frame
    pub temporal_valid: bool,
    /// Temporal history not seeded yet
    pub temporal_first_frame: bool,
    /// No frame processed since (re)initialization
    pub pipeline_first_frame: bool,
    /// Smoothed noise level per channel (Y, U, V)
    pub global_level: [u32; 3],
    /// Last frame's temporal level per channel, [`NO_HISTORY`] when unseeded
    pub prev_temporal_level: [i32; 3],
    /// Per-channel fallback: next steady frame takes the current level as is
    pub fallback: [bool; 3],
    /// Luma STAD threshold programmed last
    pub luma_stad_threshold: u32,
    /// Chroma STAD threshold programmed last
    pub chroma_stad_threshold: u32,
    /// History init programmed last
    pub history_init: u32,
    /// 4x4 TGNE threshold count programmed last
    pub block_threshold_count: u32,
    /// Temporal block processing enabled in hardware
    pub temporal_block_enable: bool,
}

impl NoiseState {
    /// Fresh state for a new pipeline
    pub const fn new(temporal_enabled: bool) -> Self {
        Self {
            temporal_enabled,
            temporal_valid: false,
            temporal_first_frame: true,
            pipeline_first_frame: true,
            global_level: [0; 3],
            prev_temporal_level: [NO_HISTORY; 3],
            fallback: [false; 3],
            luma_stad_threshold: 0,
            chroma_stad_threshold: 0,
            history_init: 0,
            block_threshold_count: 0,
            temporal_block_enable: false,
        }
    }

    /// Return to the fresh state, keeping the temporal configuration
    pub fn reset(&mut self) {
        *self = Self::new(self.temporal_enabled);
    }

    /// Regime the current flags select
    pub const fn regime(&self) -> NoiseRegime {
        NoiseRegime::select(
            self.temporal_enabled,
            self.temporal_valid,
            self.temporal_first_frame,
            self.pipeline_first_frame,
        )
    }

    /// Fixed-size little-endian dump of every field
    pub fn snapshot(&self) -> [u8; SNAPSHOT_LEN] {
        let mut out = [0u8; SNAPSHOT_LEN];
        let flags = [
            self.temporal_enabled,
            self.temporal_valid,
            self.temporal_first_frame,
            self.pipeline_first_frame,
            self.fallback[0],
            self.fallback[1],
            self.fallback[2],
            self.temporal_block_enable,
        ];
        for (b, f) in out.iter_mut().zip(flags) {
            *b = u8::from(f);
        }

        let words = self
            .global_level
            .iter()
            .copied()
            .chain(self.prev_temporal_level.iter().map(|&p| p as u32))
            .chain([
                self.luma_stad_threshold,
                self.chroma_stad_threshold,
                self.history_init,
                self.block_threshold_count,
            ]);
        for (chunk, w) in out[flags.len()..].chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&w.to_le_bytes());
        }
        out
    }
}

impl Default for NoiseState {
    fn default() -> Self {
        Self::new(true)
    }
}

static_assertions::assert_impl_all!(NoiseState: Send, Sync, Copy);
static_assertions::const_assert_eq!(SNAPSHOT_LEN, 8 + 10 * 4);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state() {
        let s = NoiseState::new(true);
        assert!(s.pipeline_first_frame);
        assert!(s.temporal_first_frame);
        assert_eq!(s.prev_temporal_level, [NO_HISTORY; 3]);
        assert_eq!(s.regime(), NoiseRegime::Default);
    }

    #[test]
    fn test_regime_all_flag_combinations() {
        use NoiseRegime::{Default as D, Steady as S, Transition as T};

        // (enabled, valid, temporal first, pipeline first) -> regime
        let table = [
            ((false, false, false, false), D),
            ((false, false, false, true), D),
            ((false, false, true, false), D),
            ((false, false, true, true), D),
            ((false, true, false, false), D),
            ((false, true, false, true), D),
            ((false, true, true, false), D),
            ((false, true, true, true), D),
            ((true, false, false, false), D),
            ((true, false, false, true), D),
            ((true, false, true, false), T),
            ((true, false, true, true), D),
            ((true, true, false, false), S),
            ((true, true, false, true), D),
            ((true, true, true, false), T),
            ((true, true, true, true), D),
        ];
        for ((enabled, valid, tfirst, pfirst), expected) in table {
            assert_eq!(
                NoiseRegime::select(enabled, valid, tfirst, pfirst),
                expected,
                "flags {} {} {} {}",
                enabled,
                valid,
                tfirst,
                pfirst
            );
        }
    }

    #[test]
    fn test_snapshot_tracks_every_field() {
        let base = NoiseState::new(true);
        let mut changed = base;
        changed.chroma_stad_threshold = 1;
        assert_ne!(base.snapshot(), changed.snapshot());

        let mut changed = base;
        changed.prev_temporal_level[2] = 5;
        assert_ne!(base.snapshot(), changed.snapshot());

        let mut changed = base;
        changed.fallback[1] = true;
        assert_ne!(base.snapshot(), changed.snapshot());
        assert_eq!(base.snapshot(), NoiseState::new(true).snapshot());
    }

    #[test]
    fn test_reset_keeps_temporal_config() {
        let mut s = NoiseState::new(false);
        s.pipeline_first_frame = false;
        s.global_level = [4, 5, 6];
        s.reset();
        assert_eq!(s, NoiseState::new(false));
    }
}
