//! # VEBOX Pipeline Core
//!
//! The per-context driver that ties the scalability and denoise subsystems to
//! the device layer. It holds no policy of its own: topology, noise estimation
//! and stream generation live in their subsystems, and every device-facing
//! operation goes through a collaborator trait from `vebox-hal`.
//!
//! ## Components
//!
//! - **VeboxPipeline**: per-frame sequencing and recovery
//! - **PipelineConfig**: per-pipeline switches
//! - **HardwareStatePopulator**: seam to the state/surface command writer
//!
//! ## Per-Frame Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          VeboxPipeline                              │
//! │                                                                     │
//! │  EngineTopology ──▶ EngineGroup ──▶ NoiseEstimator ──▶ Coordinator  │
//! │     (decide)        (allocate)       (update)          (run)        │
//! │        ▲                ▲               ▲                 │         │
//! └────────┼────────────────┼───────────────┼─────────────────┼─────────┘
//!          │                │               │                 ▼
//!      DeviceInfo    EngineResources  StatisticsSource  CommandSubmitter
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod config;
pub mod pipeline;
pub mod populate;

pub use config::PipelineConfig;
pub use pipeline::{EstimateSource, Frame, FrameContext, FrameReport, PipelineStats, VeboxPipeline};
pub use populate::{HardwareStatePopulator, OpaqueStatePopulator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
