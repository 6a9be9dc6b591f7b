//! # VEBOX Hardware Abstraction Layer
//!
//! Shared foundations for the scalable video-enhancement pipeline: the error
//! taxonomy, per-generation constant tables, typed resource handles, the
//! command-stream model and the traits through which the pipeline talks to the
//! outside world (statistics buffers, device information, resource allocation
//! and submission).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          vebox-hal                               │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌────────────┐  │
//! │  │   Error    │  │  Profile   │  │  Command   │  │   Device   │  │
//! │  │ (taxonomy) │  │ (Gen12...) │  │  (MI cmds) │  │  (traits)  │  │
//! │  └────────────┘  └────────────┘  └────────────┘  └────────────┘  │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────────────────────┐  │
//! │  │   Types    │  │   Submit   │  │  Exec (device-side model)  │  │
//! │  └────────────┘  └────────────┘  └────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate encodes real opcodes. Commands are kept symbolic so
//! that the synchronization protocol can be generated, inspected and executed
//! against [`exec::DeviceModel`] without hardware.

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod command;
pub mod device;
pub mod error;
pub mod exec;
pub mod profile;
pub mod submit;
pub mod types;

// Re-exports for convenience
pub use command::{CommandBuffer, CompareOp, MiCommand};
pub use device::{
    DeviceInfo, EngineAllocation, EngineMask, EngineResources, StatisticsBuffer, StatisticsSource,
};
pub use error::{Error, Result, Severity};
pub use exec::{DeviceModel, EngineStatus, SemaphoreMemory, TraceEvent, WaitObservation};
pub use profile::{Errata, HardwareProfile, NoiseConstants, StatisticsGeometry, WatchdogRegisters};
pub use submit::{CommandSubmitter, NullSubmitter, SubmissionPolicy, SubmissionType};
pub use types::*;
