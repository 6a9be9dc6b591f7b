//! # Command Streams
//!
//! Symbolic model of the memory-interface (MI) commands the pipeline emits
//! around the hardware-specific VEBOX state.
//!
//! Only the commands that take part in cross-engine ordering are spelled
//! out. The opaque VEBOX/SFC/DI-IECP state written by the external populator
//! is represented by [`MiCommand::HardwareState`] with its dword footprint.

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::submit::SubmissionType;
use crate::types::{CommandBufferHandle, SemaphoreHandle};

// =============================================================================
// COMMANDS
// =============================================================================

/// Semaphore-wait comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Memory value equals the inline value
    Equal,
    /// Memory value is greater than or equal to the inline value
    GreaterOrEqual,
}

impl CompareOp {
    /// Evaluate the comparison against a memory value
    pub const fn holds(self, memory: u32, value: u32) -> bool {
        match self {
            CompareOp::Equal => memory == value,
            CompareOp::GreaterOrEqual => memory >= value,
        }
    }
}

/// One command in a per-engine stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiCommand {
    /// Generic prolog carrying the virtual-engine hint
    Prolog {
        /// Engine the stream is bound to
        engine: u32,
    },
    /// Atomic `+= 1` on a semaphore dword
    AtomicIncrement {
        /// Target semaphore
        semaphore: SemaphoreHandle,
    },
    /// Polling wait until the semaphore satisfies `compare` against `value`
    SemaphoreWait {
        /// Semaphore to poll
        semaphore: SemaphoreHandle,
        /// Inline comparison value
        value: u32,
        /// Comparison
        compare: CompareOp,
    },
    /// Write an immediate into an MMIO register
    LoadRegisterImm {
        /// Register offset
        register: u32,
        /// Value
        value: u32,
    },
    /// Write an immediate into a semaphore dword
    StoreDataImm {
        /// Target semaphore
        semaphore: SemaphoreHandle,
        /// Value
        value: u32,
    },
    /// Opaque VEBOX state, surfaces, SFC and DI/IECP commands
    HardwareState {
        /// Engine the state was written for
        engine: u32,
        /// Dword footprint of the region
        dwords: u32,
    },
    /// Flush with an optional post-sync tag write
    FlushDw {
        /// Tag written on completion
        sync_tag: Option<u32>,
    },
    /// GPU status tag for tag-based completion tracking
    StatusTag,
    /// No operation
    Noop,
    /// End of the batch
    BatchBufferEnd,
}

impl MiCommand {
    /// Dword footprint used for capacity accounting
    pub const fn dwords(&self) -> u32 {
        match self {
            MiCommand::Prolog { .. } => 16,
            MiCommand::AtomicIncrement { .. } => 11,
            MiCommand::SemaphoreWait { .. } => 5,
            MiCommand::LoadRegisterImm { .. } => 3,
            MiCommand::StoreDataImm { .. } => 4,
            MiCommand::HardwareState { dwords, .. } => *dwords,
            MiCommand::FlushDw { .. } => 5,
            MiCommand::StatusTag => 5,
            MiCommand::Noop => 1,
            MiCommand::BatchBufferEnd => 1,
        }
    }

    /// Semaphore touched by this command, if any
    pub const fn semaphore(&self) -> Option<SemaphoreHandle> {
        match self {
            MiCommand::AtomicIncrement { semaphore }
            | MiCommand::SemaphoreWait { semaphore, .. }
            | MiCommand::StoreDataImm { semaphore, .. } => Some(*semaphore),
            _ => None,
        }
    }
}

// =============================================================================
// COMMAND BUFFER
// =============================================================================

/// A per-engine command buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuffer {
    handle: CommandBufferHandle,
    engine: u32,
    capacity_dwords: u32,
    used_dwords: u32,
    commands: Vec<MiCommand>,
    submission: SubmissionType,
}

impl CommandBuffer {
    /// Create an empty buffer of `capacity_bytes`
    pub fn new(handle: CommandBufferHandle, engine: u32, capacity_bytes: u32) -> Self {
        Self {
            handle,
            engine,
            capacity_dwords: capacity_bytes / 4,
            used_dwords: 0,
            commands: Vec::new(),
            submission: SubmissionType::empty(),
        }
    }

    /// Append a command
    pub fn push(&mut self, cmd: MiCommand) -> Result<()> {
        let needed = cmd.dwords();
        if u64::from(needed) * 4 > u64::from(self.remaining_bytes()) {
            log::warn!(
                "vebox: command buffer for engine {} full ({} bytes left, {} needed)",
                self.engine,
                self.remaining_bytes(),
                u64::from(needed) * 4
            );
            return Err(Error::CommandBufferFull);
        }

        #[cfg(feature = "debug")]
        log::trace!("vebox: engine {} <- {:?}", self.engine, cmd);

        self.used_dwords += needed;
        self.commands.push(cmd);
        Ok(())
    }

    /// Drop all recorded commands, keep the allocation
    pub fn reset(&mut self) {
        self.commands.clear();
        self.used_dwords = 0;
        self.submission = SubmissionType::empty();
    }

    /// Buffer handle
    pub fn handle(&self) -> CommandBufferHandle {
        self.handle
    }

    /// Engine this buffer executes on
    pub fn engine(&self) -> u32 {
        self.engine
    }

    /// Recorded commands
    pub fn commands(&self) -> &[MiCommand] {
        &self.commands
    }

    /// Remaining space in bytes
    pub fn remaining_bytes(&self) -> u32 {
        (self.capacity_dwords - self.used_dwords) * 4
    }

    /// Submission tag
    pub fn submission_type(&self) -> SubmissionType {
        self.submission
    }

    /// Set the submission tag
    pub fn set_submission_type(&mut self, submission: SubmissionType) {
        self.submission = submission;
    }

    /// Check whether the last command ends the batch
    pub fn is_terminated(&self) -> bool {
        matches!(self.commands.last(), Some(MiCommand::BatchBufferEnd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_enforced() {
        let mut cb = CommandBuffer::new(CommandBufferHandle::new(1), 0, 64);
        cb.push(MiCommand::Prolog { engine: 0 }).unwrap();
        assert_eq!(cb.remaining_bytes(), 0);
        assert_eq!(cb.push(MiCommand::Noop), Err(Error::CommandBufferFull));
        assert_eq!(cb.commands().len(), 1);
    }

    #[test]
    fn test_reset_keeps_identity() {
        let mut cb = CommandBuffer::new(CommandBufferHandle::new(9), 2, 4096);
        cb.push(MiCommand::BatchBufferEnd).unwrap();
        cb.set_submission_type(SubmissionType::SINGLE_PIPE);
        assert!(cb.is_terminated());
        cb.reset();
        assert!(cb.commands().is_empty());
        assert!(cb.submission_type().is_empty());
        assert_eq!(cb.engine(), 2);
        assert_eq!(cb.handle(), CommandBufferHandle::new(9));
    }

    #[test]
    fn test_compare_ops() {
        assert!(CompareOp::Equal.holds(4, 4));
        assert!(!CompareOp::Equal.holds(5, 4));
        assert!(CompareOp::GreaterOrEqual.holds(5, 4));
    }
}
