//! # Barrier Synchronizer
//!
//! Generates the per-engine command stream that keeps N independently
//! executing engines in lock-step around the shared hardware state.
//!
//! ## Protocol
//!
//! ```text
//!   engine i                                   semaphore memory
//!   ─────────────────────────────────          ─────────────────────
//!   prolog
//!   LRI watchdog threshold, enable
//!   for k in 0..N: S[k] += 1          ───────▶ S[0..N]     (entry)
//!   wait S[i] == N
//!   ── hardware state (populator) ──
//!   flush
//!   for k in 0..N: SAdd[k] += 1       ───────▶ SAdd[0..N]  (exit)
//!   wait SAdd[i] == N
//!   status tag, sync flush
//!   LRI watchdog disable
//!   S[i] = 0, SAdd[i] = 0             ───────▶ own slots only
//!   batch buffer end
//! ```
//!
//! Every engine adds one to every slot, so an engine's own slot reaches N
//! exactly when all N engines have arrived. An engine's slots receive no
//! further increments once it has passed the exit wait, which makes the
//! self-reset race free. Nothing here runs on the host; the protocol only
//! exists as commands inside the streams.

use alloc::vec::Vec;

use vebox_hal::{
    CommandBuffer, CompareOp, Dimensions, Error, HardwareProfile, MiCommand, Result, SemaphoreHandle,
    WatchdogRegisters,
};

/// Barrier for one frame over a fixed set of engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierSynchronizer {
    entry: Vec<SemaphoreHandle>,
    exit: Vec<SemaphoreHandle>,
    registers: WatchdogRegisters,
    threshold: u32,
}

impl BarrierSynchronizer {
    /// Barrier over `entry.len()` engines for a frame rendered to `target`
    pub fn new(
        profile: &HardwareProfile,
        target: Dimensions,
        entry: &[SemaphoreHandle],
        exit: &[SemaphoreHandle],
    ) -> Result<Self> {
        let engines = entry.len();
        if engines == 0 || engines != exit.len() || engines > profile.max_engines as usize {
            log::warn!(
                "vebox: barrier over {} entry / {} exit slots rejected",
                engines,
                exit.len()
            );
            return Err(Error::InvalidParameter);
        }

        let threshold = profile.watchdog_threshold(target, engines as u32);
        log::debug!(
            "vebox: barrier over {} engines, watchdog threshold {} ticks",
            engines,
            threshold
        );

        Ok(Self {
            entry: entry.to_vec(),
            exit: exit.to_vec(),
            registers: profile.watchdog,
            threshold,
        })
    }

    /// Participating engines
    pub fn engine_count(&self) -> u32 {
        self.entry.len() as u32
    }

    /// Watchdog threshold programmed into every stream
    pub fn watchdog_threshold(&self) -> u32 {
        self.threshold
    }

    fn check_engine(&self, engine: u32) -> Result<usize> {
        let index = engine as usize;
        if index >= self.entry.len() {
            return Err(Error::InvalidParameter);
        }
        Ok(index)
    }

    /// Program and start the watchdog
    pub fn arm_watchdog(&self, cb: &mut CommandBuffer) -> Result<()> {
        cb.push(MiCommand::LoadRegisterImm {
            register: self.registers.threshold,
            value: self.threshold,
        })?;
        cb.push(MiCommand::LoadRegisterImm {
            register: self.registers.control,
            value: self.registers.enable_value,
        })
    }

    /// Stop the watchdog
    pub fn disarm_watchdog(&self, cb: &mut CommandBuffer) -> Result<()> {
        cb.push(MiCommand::LoadRegisterImm {
            register: self.registers.control,
            value: self.registers.disable_value,
        })
    }

    fn rendezvous(&self, slots: &[SemaphoreHandle], index: usize, cb: &mut CommandBuffer) -> Result<()> {
        for &semaphore in slots {
            cb.push(MiCommand::AtomicIncrement { semaphore })?;
        }
        cb.push(MiCommand::SemaphoreWait {
            semaphore: slots[index],
            value: self.engine_count(),
            compare: CompareOp::Equal,
        })
    }

    /// Entry barrier for `engine`
    pub fn enter(&self, engine: u32, cb: &mut CommandBuffer) -> Result<()> {
        let index = self.check_engine(engine)?;
        self.rendezvous(&self.entry, index, cb)
    }

    /// Exit barrier for `engine`
    pub fn exit(&self, engine: u32, cb: &mut CommandBuffer) -> Result<()> {
        let index = self.check_engine(engine)?;
        self.rendezvous(&self.exit, index, cb)
    }

    /// Zero `engine`'s own entry and exit slots
    ///
    /// Must only be emitted after [`BarrierSynchronizer::exit`].
    pub fn reset_own_slots(&self, engine: u32, cb: &mut CommandBuffer) -> Result<()> {
        let index = self.check_engine(engine)?;
        cb.push(MiCommand::StoreDataImm {
            semaphore: self.entry[index],
            value: 0,
        })?;
        cb.push(MiCommand::StoreDataImm {
            semaphore: self.exit[index],
            value: 0,
        })
    }

    /// Complete stream for `engine`, with `populate` writing the shared state
    pub fn build_stream<F>(
        &self,
        engine: u32,
        sync_tag: u32,
        cb: &mut CommandBuffer,
        populate: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut CommandBuffer) -> Result<()>,
    {
        self.check_engine(engine)?;

        cb.push(MiCommand::Prolog { engine })?;
        self.arm_watchdog(cb)?;
        self.enter(engine, cb)?;

        populate(cb)?;
        cb.push(MiCommand::FlushDw { sync_tag: None })?;

        self.exit(engine, cb)?;
        cb.push(MiCommand::StatusTag)?;
        cb.push(MiCommand::FlushDw {
            sync_tag: Some(sync_tag),
        })?;
        self.disarm_watchdog(cb)?;
        self.reset_own_slots(engine, cb)?;
        cb.push(MiCommand::BatchBufferEnd)
    }
}
