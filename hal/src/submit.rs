//! # Submission
//!
//! Submission tags, policies and the device-layer submit interface.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use spin::Mutex;

use crate::command::CommandBuffer;
use crate::error::{Error, Result};

// =============================================================================
// SUBMISSION TYPE
// =============================================================================

bitflags::bitflags! {
    /// Position of a buffer inside a multi-engine submission
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SubmissionType: u32 {
        /// Legacy single-engine buffer
        const SINGLE_PIPE = 1 << 0;
        /// First buffer of a multi-engine group
        const MULTI_PIPE_MASTER = 1 << 1;
        /// Any following buffer of a multi-engine group
        const MULTI_PIPE_SLAVE = 1 << 2;
        /// Last buffer; the device layer may release the batch
        const LAST_PIPE = 1 << 3;
    }
}

impl SubmissionType {
    /// Tag for engine `index` out of `count`
    pub fn for_engine(index: u32, count: u32) -> Self {
        let mut tag = if index == 0 {
            SubmissionType::MULTI_PIPE_MASTER
        } else {
            SubmissionType::MULTI_PIPE_SLAVE
        };
        if index + 1 == count {
            tag |= SubmissionType::LAST_PIPE;
        }
        tag
    }
}

/// How a multi-engine group reaches the device layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubmissionPolicy {
    /// Populate every buffer, then submit all of them as one unit
    #[default]
    Synchronous,
    /// Hand each buffer over as soon as it is populated
    Phased,
}

// =============================================================================
// SUBMITTER TRAIT
// =============================================================================

/// Device-layer submission interface
pub trait CommandSubmitter {
    /// Submit buffers; under [`SubmissionPolicy::Synchronous`] the slice is the
    /// whole group, under [`SubmissionPolicy::Phased`] it holds one buffer
    fn submit(&self, buffers: &[CommandBuffer], policy: SubmissionPolicy) -> Result<()>;

    /// Return a populated buffer without submitting it (parallel submission)
    fn return_buffer(&self, buffer: &CommandBuffer) -> Result<()> {
        let _ = buffer;
        Ok(())
    }
}

// =============================================================================
// NULL SUBMITTER
// =============================================================================

/// One recorded submit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Policy the call was made with
    pub policy: SubmissionPolicy,
    /// Buffers handed over
    pub buffers: Vec<CommandBuffer>,
}

/// Null-hardware submitter: records everything, executes nothing
#[derive(Debug, Default)]
pub struct NullSubmitter {
    submissions: Mutex<Vec<Submission>>,
    returned: Mutex<Vec<CommandBuffer>>,
    calls: AtomicU64,
    fail_next: AtomicBool,
}

impl NullSubmitter {
    /// Create a new null submitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next submit call fail with [`Error::SubmissionFailed`]
    pub fn fail_next_submit(&self) {
        self.fail_next.store(true, Ordering::Release);
    }

    /// Number of submit calls, failed ones included
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }

    /// Copy of all accepted submissions
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    /// Copy of all returned buffers
    pub fn returned(&self) -> Vec<CommandBuffer> {
        self.returned.lock().clone()
    }

    /// Every buffer that reached the device, in arrival order
    pub fn submitted_buffers(&self) -> Vec<CommandBuffer> {
        self.submissions
            .lock()
            .iter()
            .flat_map(|s| s.buffers.iter().cloned())
            .collect()
    }
}

impl CommandSubmitter for NullSubmitter {
    fn submit(&self, buffers: &[CommandBuffer], policy: SubmissionPolicy) -> Result<()> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        if self.fail_next.swap(false, Ordering::AcqRel) {
            return Err(Error::SubmissionFailed);
        }
        self.submissions.lock().push(Submission {
            policy,
            buffers: buffers.to_vec(),
        });
        Ok(())
    }

    fn return_buffer(&self, buffer: &CommandBuffer) -> Result<()> {
        self.returned.lock().push(buffer.clone());
        Ok(())
    }
}

static_assertions::assert_impl_all!(NullSubmitter: Send, Sync);
