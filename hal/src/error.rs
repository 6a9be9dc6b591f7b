//! # Error Handling
//!
//! One error type for the whole pipeline stack.
//!
//! Errors are split in two classes:
//! - **Recoverable**: the frame is still produced, with a degraded policy
//!   (previous noise parameters, non-adaptive denoise, single engine)
//! - **Fatal**: the frame is aborted and the device context must be reset
//!
//! Nothing in this stack retries on its own; the class only tells the owner
//! of the pipeline what the nearest safe fallback is.

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// Pipeline result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// SEVERITY
// =============================================================================

/// How the owner of a pipeline must react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Fall back to a safe default and keep processing frames
    Recoverable,
    /// Abort the frame; the device context needs a reset
    Fatal,
}

// =============================================================================
// ERROR ENUM
// =============================================================================

/// Unified pipeline error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Noise Statistics
    // =========================================================================
    /// The hardware reported a "not computed" sentinel or an empty temporal count
    InvalidStatistics,
    /// The statistics buffer is missing or shorter than the layout requires
    InvalidBuffer,

    // =========================================================================
    // Scheduling
    // =========================================================================
    /// A watchdog expired on the given engine
    EngineHang {
        /// Index of the engine whose watchdog fired
        engine: u32,
    },
    /// Multi-engine mode was requested for a frame that cannot be split
    SchedulingDegenerate,

    // =========================================================================
    // Generic
    // =========================================================================
    /// A parameter is out of range
    InvalidParameter,
    /// The call is not valid in the current state
    InvalidState,
    /// Engine resources could not be allocated
    ResourceAllocation,
    /// A command buffer ran out of space
    CommandBufferFull,
    /// The device layer rejected a submission
    SubmissionFailed,
}

impl Error {
    /// Classify this error
    pub const fn severity(self) -> Severity {
        match self {
            Error::InvalidStatistics
            | Error::InvalidBuffer
            | Error::SchedulingDegenerate
            | Error::InvalidParameter => Severity::Recoverable,
            Error::EngineHang { .. }
            | Error::InvalidState
            | Error::ResourceAllocation
            | Error::CommandBufferFull
            | Error::SubmissionFailed => Severity::Fatal,
        }
    }

    /// Check whether the frame can still be produced
    pub const fn is_recoverable(self) -> bool {
        matches!(self.severity(), Severity::Recoverable)
    }

    /// Numeric code for device error reports
    pub const fn code(self) -> u32 {
        match self {
            Error::InvalidStatistics => 0x0101,
            Error::InvalidBuffer => 0x0102,
            Error::EngineHang { .. } => 0x0201,
            Error::SchedulingDegenerate => 0x0202,
            Error::InvalidParameter => 0x0301,
            Error::InvalidState => 0x0302,
            Error::ResourceAllocation => 0x0303,
            Error::CommandBufferFull => 0x0304,
            Error::SubmissionFailed => 0x0305,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidStatistics => write!(f, "invalid noise statistics"),
            Error::InvalidBuffer => write!(f, "invalid statistics buffer"),
            Error::EngineHang { engine } => write!(f, "engine {} hang (watchdog expired)", engine),
            Error::SchedulingDegenerate => write!(f, "degenerate multi-engine split"),
            Error::InvalidParameter => write!(f, "invalid parameter"),
            Error::InvalidState => write!(f, "invalid state"),
            Error::ResourceAllocation => write!(f, "engine resource allocation failed"),
            Error::CommandBufferFull => write!(f, "command buffer full"),
            Error::SubmissionFailed => write!(f, "command buffer submission failed"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
