//! # Device Collaborators
//!
//! Interfaces the pipeline consumes from the surrounding driver. Each trait
//! is small on purpose: the pipeline never needs to know how a statistics
//! surface is mapped or how semaphore memory is allocated.

use alloc::vec::Vec;

use crate::error::Result;
use crate::types::{CommandBufferHandle, SemaphoreHandle};

// =============================================================================
// STATISTICS BUFFER
// =============================================================================

/// Read-only view of a locked statistics surface
///
/// A null view models a lock that returned no mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsBuffer<'a> {
    bytes: Option<&'a [u8]>,
}

impl<'a> StatisticsBuffer<'a> {
    /// View over mapped bytes
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes: Some(bytes) }
    }

    /// View with no mapping behind it
    pub const fn null() -> Self {
        Self { bytes: None }
    }

    /// Mapped bytes, if any
    pub const fn bytes(&self) -> Option<&'a [u8]> {
        self.bytes
    }

    /// Check for a missing mapping
    pub const fn is_null(&self) -> bool {
        self.bytes.is_none()
    }
}

/// Access to the hardware-written statistics surface
pub trait StatisticsSource {
    /// Lock the surface for CPU reads
    fn lock_statistics(&mut self) -> Result<StatisticsBuffer<'_>>;

    /// Release the lock taken by [`StatisticsSource::lock_statistics`]
    fn unlock_statistics(&mut self) -> Result<()>;
}

// =============================================================================
// DEVICE INFO
// =============================================================================

bitflags::bitflags! {
    /// Registry-forced engine selection
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EngineMask: u32 {
        /// First video-enhancement engine
        const VEBOX1 = 1 << 0;
        /// Second video-enhancement engine
        const VEBOX2 = 1 << 1;
        /// Third video-enhancement engine
        const VEBOX3 = 1 << 2;
        /// Fourth video-enhancement engine
        const VEBOX4 = 1 << 3;
    }
}

impl EngineMask {
    /// Number of engines selected
    pub const fn engine_count(self) -> u32 {
        self.bits().count_ones()
    }
}

/// Static and registry-level device properties
pub trait DeviceInfo {
    /// Whether the device can split a frame across engines at all
    fn scalability_supported(&self) -> bool;

    /// Number of enabled video-enhancement engines
    fn enabled_engine_count(&self) -> u32;

    /// Registry-forced engine mask; empty when nothing is forced
    fn forced_engine_mask(&self) -> EngineMask {
        EngineMask::empty()
    }

    /// Registry override that forces scalable mode regardless of size
    fn scalability_forced(&self) -> bool {
        false
    }
}

// =============================================================================
// ENGINE RESOURCES
// =============================================================================

/// Resources backing a batch of engine slots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineAllocation {
    /// One batch buffer per engine
    pub command_buffers: Vec<CommandBufferHandle>,
    /// One zero-initialized entry-barrier dword per engine
    pub entry_semaphores: Vec<SemaphoreHandle>,
    /// One zero-initialized exit-barrier dword per engine
    pub exit_semaphores: Vec<SemaphoreHandle>,
}

impl EngineAllocation {
    /// Number of complete engine slots in this allocation
    pub fn len(&self) -> usize {
        self.command_buffers
            .len()
            .min(self.entry_semaphores.len())
            .min(self.exit_semaphores.len())
    }

    /// Check for an empty allocation
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Allocation of per-engine batch buffers and semaphore memory
pub trait EngineResources {
    /// Allocate resources for `count` more engine slots
    ///
    /// Semaphore memory must be zeroed before it is returned.
    fn allocate_engine_resources(&mut self, count: u32) -> Result<EngineAllocation>;

    /// Free every engine resource handed out so far
    fn free_engine_resources(&mut self) -> Result<()>;
}
