//! # VEBOX Scalability Subsystem
//!
//! Splits one frame across several video-enhancement engines.
//!
//! ## Architecture
//!
//! ```text
//!   SurfaceDesc x2 + DeviceInfo
//!            │
//!            ▼
//!   ┌──────────────────┐     ┌──────────────────────┐
//!   │  EngineTopology  │────▶│ SubmissionCoordinator│──▶ CommandSubmitter
//!   │  (how many)      │     │  (order, tags)       │
//!   └──────────────────┘     └──────────┬───────────┘
//!                                       │ per engine
//!                                       ▼
//!                            ┌──────────────────────┐
//!                            │ BarrierSynchronizer  │
//!                            │ (entry/exit fences)  │
//!                            └──────────────────────┘
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod barrier;
pub mod coordinator;
pub mod topology;

pub use barrier::BarrierSynchronizer;
pub use coordinator::{EngineGroup, EngineSlot, FrameStage, StreamPopulator, SubmissionCoordinator};
pub use topology::{Degenerate, EngineTopology, SchedulingDecision};
