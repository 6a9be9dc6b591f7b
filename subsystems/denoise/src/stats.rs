//! # Statistics Reader
//!
//! Decodes the per-slice noise counters the hardware writes at the end of a
//! frame. No policy lives here: values are copied out exactly as written,
//! validity bits included.
//!
//! ## Surface Layout
//!
//! ```text
//!   0                wh            wh+pitch       wh+2*pitch     wh+3*pitch
//!   ├── per-block ───┼── block 0 ──┼── block 1 ───┼── block 2 ───┼── block 3 ──┤
//!   │  encoder stats │             │              │              │             │
//!
//!   inside one block:  +gne_offset   [luma_sum u_sum v_sum luma_cnt u_cnt v_cnt]
//!                      +tgne_offset  [luma_sum u_sum v_sum luma_cnt u_cnt v_cnt]
//! ```
//!
//! Which two blocks hold slice 0 and slice 1 depends on the packet type; see
//! [`SliceMode`].

use vebox_hal::{Error, HardwareProfile, Result, StatisticsBuffer};

/// Dwords in one GNE record
pub const RECORD_DWORDS: usize = 6;
const RECORD_BYTES: usize = RECORD_DWORDS * 4;

/// Bit 31 of a temporal count marks the temporal estimate as usable
pub const TEMPORAL_VALID_BIT: u32 = 0x8000_0000;
/// Hardware sentinel for "not computed"
pub const NOT_COMPUTED: u32 = 0xFFFF_FFFF;

// =============================================================================
// CHANNELS
// =============================================================================

/// Colour channel of a noise estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Channel {
    /// Luma
    Y = 0,
    /// Chroma blue-difference
    U = 1,
    /// Chroma red-difference
    V = 2,
}

impl Channel {
    /// Every channel, in storage order
    pub const ALL: [Channel; 3] = [Channel::Y, Channel::U, Channel::V];

    /// Storage index
    pub const fn index(self) -> usize {
        self as usize
    }
}

// =============================================================================
// LAYOUT
// =============================================================================

/// Packet type, which decides where the frame-based blocks start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SliceMode {
    /// Deinterlace (with or without IECP): current-frame blocks 1 and 3
    Deinterlace,
    /// Denoise, denoise + IECP or spatial DI: input-frame blocks 0 and 1
    #[default]
    Denoise,
    /// IECP only: no per-block region in front
    IecpOnly,
}

/// Byte offsets of both GNE records of both slices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatLayout {
    /// Base of the slice 0 block
    pub slice0_base: u32,
    /// Base of the slice 1 block
    pub slice1_base: u32,
    /// Spatial record offset inside a block
    pub gne_offset: u32,
    /// Temporal record offset inside a block
    pub tgne_offset: u32,
}

impl StatLayout {
    /// Explicit layout
    pub const fn new(slice0_base: u32, slice1_base: u32, gne_offset: u32, tgne_offset: u32) -> Self {
        Self {
            slice0_base,
            slice1_base,
            gne_offset,
            tgne_offset,
        }
    }

    /// Resolve slice bases for a packet type and per-block statistics size
    pub fn resolve(
        profile: &HardwareProfile,
        mode: SliceMode,
        per_block_width: u32,
        per_block_height: u32,
    ) -> Self {
        let geometry = profile.statistics;
        let pitch = geometry.per_frame_size;
        let wh = per_block_width.saturating_mul(per_block_height);

        let (slice0_base, slice1_base) = match mode {
            SliceMode::Deinterlace => (
                wh.saturating_add(pitch),
                wh.saturating_add(pitch.saturating_mul(3)),
            ),
            SliceMode::Denoise => (wh, wh.saturating_add(pitch)),
            SliceMode::IecpOnly => (0, pitch),
        };

        Self::new(slice0_base, slice1_base, geometry.gne_offset, geometry.tgne_offset)
    }

    /// Smallest buffer length covering every record
    pub fn required_len(&self) -> Option<usize> {
        let base = self.slice0_base.max(self.slice1_base) as usize;
        let offset = self.gne_offset.max(self.tgne_offset) as usize;
        base.checked_add(offset)?.checked_add(RECORD_BYTES)
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// One slice's GNE record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SliceRecord {
    /// Luma noise sum
    pub luma_sum: u32,
    /// Chroma U noise sum
    pub u_sum: u32,
    /// Chroma V noise sum
    pub v_sum: u32,
    /// Luma sample count (bit 31 is the temporal validity flag)
    pub luma_count: u32,
    /// Chroma U sample count
    pub u_count: u32,
    /// Chroma V sample count
    pub v_count: u32,
}

impl SliceRecord {
    /// Decode six little-endian dwords
    fn decode(bytes: &[u8]) -> Option<Self> {
        let mut words = [0u32; RECORD_DWORDS];
        let raw = bytes.get(..RECORD_BYTES)?;
        for (w, chunk) in words.iter_mut().zip(raw.chunks_exact(4)) {
            *w = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Some(Self {
            luma_sum: words[0],
            u_sum: words[1],
            v_sum: words[2],
            luma_count: words[3],
            u_count: words[4],
            v_count: words[5],
        })
    }

    /// Noise sum of a channel
    pub const fn sum(&self, channel: Channel) -> u32 {
        match channel {
            Channel::Y => self.luma_sum,
            Channel::U => self.u_sum,
            Channel::V => self.v_sum,
        }
    }

    /// Sample count of a channel
    pub const fn count(&self, channel: Channel) -> u32 {
        match channel {
            Channel::Y => self.luma_count,
            Channel::U => self.u_count,
            Channel::V => self.v_count,
        }
    }
}

/// Both regions of both slices for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameStatistics {
    /// Spatial GNE records, slice 0 and slice 1
    pub spatial: [SliceRecord; 2],
    /// Temporal GNE records, slice 0 and slice 1
    pub temporal: [SliceRecord; 2],
}

impl FrameStatistics {
    /// Temporal region when `temporal` is set, spatial region otherwise
    pub const fn region(&self, temporal: bool) -> &[SliceRecord; 2] {
        if temporal {
            &self.temporal
        } else {
            &self.spatial
        }
    }

    /// Slice 0 record of the region picked by `temporal`
    pub const fn slice0(&self, temporal: bool) -> &SliceRecord {
        &self.region(temporal)[0]
    }

    /// Slice 1 record of the region picked by `temporal`
    pub const fn slice1(&self, temporal: bool) -> &SliceRecord {
        &self.region(temporal)[1]
    }

    /// Check the hardware validity bit on either slice's temporal luma count
    pub const fn temporal_flag(&self) -> bool {
        (self.temporal[0].luma_count | self.temporal[1].luma_count) & TEMPORAL_VALID_BIT != 0
    }
}

// =============================================================================
// READER
// =============================================================================

/// Decoder bound to one statistics layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsReader {
    layout: StatLayout,
}

impl StatisticsReader {
    /// Create a reader for `layout`
    pub const fn new(layout: StatLayout) -> Self {
        Self { layout }
    }

    /// Layout in use
    pub const fn layout(&self) -> &StatLayout {
        &self.layout
    }

    /// Decode both records of both slices
    pub fn read(&self, buffer: StatisticsBuffer<'_>) -> Result<FrameStatistics> {
        let bytes = buffer.bytes().ok_or(Error::InvalidBuffer)?;
        let needed = self.layout.required_len().ok_or(Error::InvalidBuffer)?;
        if bytes.len() < needed {
            log::warn!(
                "vebox: statistics buffer too short ({} bytes, need {})",
                bytes.len(),
                needed
            );
            return Err(Error::InvalidBuffer);
        }

        let record = |base: u32, offset: u32| {
            let start = base as usize + offset as usize;
            bytes
                .get(start..)
                .and_then(SliceRecord::decode)
                .ok_or(Error::InvalidBuffer)
        };

        let l = &self.layout;
        Ok(FrameStatistics {
            spatial: [
                record(l.slice0_base, l.gne_offset)?,
                record(l.slice1_base, l.gne_offset)?,
            ],
            temporal: [
                record(l.slice0_base, l.tgne_offset)?,
                record(l.slice1_base, l.tgne_offset)?,
            ],
        })
    }
}
