//! # Device-Side Execution Model
//!
//! Executes generated command streams against simulated semaphore memory.
//!
//! On real hardware every engine walks its own batch buffer and the only
//! shared state is a handful of semaphore dwords. The model reproduces
//! exactly that: one cursor per engine, one atomic counter per semaphore,
//! and a scheduler callback that decides which engine runs the next command.
//! Any interleaving a device could produce is reachable through the callback.
//!
//! ```text
//!   engine 0: [prolog][inc S0][inc S1][wait S0==2][state]...[bb end]
//!   engine 1: [prolog][inc S0][inc S1][wait S1==2][state]...[bb end]
//!                 │       │       │        │
//!                 └───────┴───┬───┴────────┘
//!                             ▼
//!                  SemaphoreMemory { S0, S1, SAdd0, SAdd1 }
//! ```
//!
//! The watchdog is modelled per engine: polls that fail while it is armed
//! accumulate ticks, and crossing the programmed threshold hangs the engine.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::command::{CommandBuffer, MiCommand};
use crate::error::{Error, Result};
use crate::profile::WatchdogRegisters;
use crate::types::SemaphoreHandle;

/// Consecutive failed polls tolerated with no watchdog armed anywhere
const MAX_IDLE_POLLS: u64 = 1 << 20;

// =============================================================================
// SEMAPHORE MEMORY
// =============================================================================

/// Fixed set of semaphore dwords
#[derive(Debug)]
pub struct SemaphoreMemory {
    slots: Vec<(SemaphoreHandle, AtomicU32)>,
}

impl SemaphoreMemory {
    /// Zero-initialized memory for the given semaphores
    pub fn new<I: IntoIterator<Item = SemaphoreHandle>>(handles: I) -> Self {
        Self {
            slots: handles.into_iter().map(|h| (h, AtomicU32::new(0))).collect(),
        }
    }

    /// Add a zeroed semaphore; returns `false` if it was already present
    pub fn insert(&mut self, handle: SemaphoreHandle) -> bool {
        if self.slots.iter().any(|(h, _)| *h == handle) {
            return false;
        }
        self.slots.push((handle, AtomicU32::new(0)));
        true
    }

    fn slot(&self, handle: SemaphoreHandle) -> Result<&AtomicU32> {
        self.slots
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, v)| v)
            .ok_or(Error::InvalidParameter)
    }

    /// Atomic `+= 1`, returns the new value
    pub fn increment(&self, handle: SemaphoreHandle) -> Result<u32> {
        Ok(self.slot(handle)?.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
    }

    /// Current value
    pub fn load(&self, handle: SemaphoreHandle) -> Result<u32> {
        Ok(self.slot(handle)?.load(Ordering::Acquire))
    }

    /// Overwrite a value
    pub fn store(&self, handle: SemaphoreHandle, value: u32) -> Result<()> {
        self.slot(handle)?.store(value, Ordering::Release);
        Ok(())
    }

    /// Every value, in registration order
    pub fn values(&self) -> Vec<u32> {
        self.slots.iter().map(|(_, v)| v.load(Ordering::Acquire)).collect()
    }

    /// Check that every semaphore is back to zero
    pub fn all_zero(&self) -> bool {
        self.slots.iter().all(|(_, v)| v.load(Ordering::Acquire) == 0)
    }
}

// =============================================================================
// ENGINE CURSOR
// =============================================================================

/// Execution status of one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStatus {
    /// Next command can be attempted
    Ready,
    /// Last attempt was a semaphore wait that did not hold
    Blocked,
    /// Batch buffer end reached
    Finished,
    /// Watchdog expired
    Hung,
}

impl EngineStatus {
    /// Check whether the engine can still run commands
    pub const fn is_live(self) -> bool {
        matches!(self, EngineStatus::Ready | EngineStatus::Blocked)
    }
}

/// Value seen by a semaphore wait at the moment it was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitObservation {
    /// Semaphore that was polled
    pub semaphore: SemaphoreHandle,
    /// Value read when the wait passed
    pub value: u32,
}

/// One executed command, in global execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    /// Engine that executed the command
    pub engine: u32,
    /// Command executed
    pub command: MiCommand,
}

#[derive(Debug, Clone, Copy, Default)]
struct Watchdog {
    threshold: u32,
    armed: bool,
    elapsed: u64,
}

#[derive(Debug)]
struct EngineCursor {
    engine: u32,
    commands: Vec<MiCommand>,
    pc: usize,
    status: EngineStatus,
    watchdog: Watchdog,
    observations: Vec<WaitObservation>,
}

// =============================================================================
// DEVICE MODEL
// =============================================================================

/// Multi-engine command executor
#[derive(Debug)]
pub struct DeviceModel {
    memory: SemaphoreMemory,
    registers: WatchdogRegisters,
    poll_cost_ticks: u64,
    engines: Vec<EngineCursor>,
    trace: Vec<TraceEvent>,
    idle_polls: u64,
}

impl DeviceModel {
    /// Create a model over the given semaphores
    pub fn new<I: IntoIterator<Item = SemaphoreHandle>>(
        registers: WatchdogRegisters,
        semaphores: I,
    ) -> Self {
        Self {
            memory: SemaphoreMemory::new(semaphores),
            registers,
            poll_cost_ticks: 1,
            engines: Vec::new(),
            trace: Vec::new(),
            idle_polls: 0,
        }
    }

    /// Timestamp ticks charged to the watchdog per failed poll
    pub fn with_poll_cost(mut self, ticks: u64) -> Self {
        self.poll_cost_ticks = ticks.max(1);
        self
    }

    /// Queue a batch buffer on the engine it was built for
    pub fn load(&mut self, buffer: &CommandBuffer) {
        self.engines.push(EngineCursor {
            engine: buffer.engine(),
            commands: buffer.commands().to_vec(),
            pc: 0,
            status: EngineStatus::Ready,
            watchdog: Watchdog::default(),
            observations: Vec::new(),
        });
    }

    /// Drop all queued engines; semaphore memory is kept
    pub fn clear_engines(&mut self) {
        self.engines.clear();
        self.trace.clear();
        self.idle_polls = 0;
    }

    /// Make sure every semaphore touched by `buffer` exists in memory
    pub fn register_semaphores(&mut self, buffer: &CommandBuffer) {
        for sem in buffer.commands().iter().filter_map(MiCommand::semaphore) {
            self.memory.insert(sem);
        }
    }

    /// Semaphore memory
    pub fn memory(&self) -> &SemaphoreMemory {
        &self.memory
    }

    /// Executed commands in order
    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    /// Number of queued engines
    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    /// Status of the engine queued at `slot`
    pub fn status(&self, slot: usize) -> Option<EngineStatus> {
        self.engines.get(slot).map(|e| e.status)
    }

    /// Satisfied waits of the engine queued at `slot`
    pub fn observations(&self, slot: usize) -> &[WaitObservation] {
        self.engines
            .get(slot)
            .map(|e| e.observations.as_slice())
            .unwrap_or(&[])
    }

    /// Execute at most one command on the engine queued at `slot`
    pub fn step(&mut self, slot: usize) -> Result<EngineStatus> {
        let registers = self.registers;
        let poll_cost = self.poll_cost_ticks;
        let cursor = self.engines.get_mut(slot).ok_or(Error::InvalidParameter)?;
        if !cursor.status.is_live() {
            return Ok(cursor.status);
        }

        let Some(cmd) = cursor.commands.get(cursor.pc).copied() else {
            cursor.status = EngineStatus::Finished;
            return Ok(cursor.status);
        };

        match cmd {
            MiCommand::AtomicIncrement { semaphore } => {
                self.memory.increment(semaphore)?;
            }
            MiCommand::StoreDataImm { semaphore, value } => {
                self.memory.store(semaphore, value)?;
            }
            MiCommand::LoadRegisterImm { register, value } => {
                if register == registers.threshold {
                    cursor.watchdog.threshold = value;
                } else if register == registers.control {
                    if value == registers.enable_value {
                        cursor.watchdog.armed = true;
                        cursor.watchdog.elapsed = 0;
                    } else if value == registers.disable_value {
                        cursor.watchdog.armed = false;
                    }
                }
            }
            MiCommand::SemaphoreWait { semaphore, value, compare } => {
                let current = self.memory.load(semaphore)?;
                if !compare.holds(current, value) {
                    cursor.status = EngineStatus::Blocked;
                    if cursor.watchdog.armed {
                        cursor.watchdog.elapsed += poll_cost;
                        if cursor.watchdog.elapsed > u64::from(cursor.watchdog.threshold) {
                            cursor.status = EngineStatus::Hung;
                            log::error!(
                                "vebox: watchdog expired on engine {} waiting for {:?} (value {}, want {})",
                                cursor.engine,
                                semaphore,
                                current,
                                value
                            );
                            return Err(Error::EngineHang { engine: cursor.engine });
                        }
                    }
                    return Ok(cursor.status);
                }
                cursor.observations.push(WaitObservation { semaphore, value: current });
            }
            MiCommand::BatchBufferEnd => {
                cursor.status = EngineStatus::Finished;
            }
            MiCommand::Prolog { .. }
            | MiCommand::HardwareState { .. }
            | MiCommand::FlushDw { .. }
            | MiCommand::StatusTag
            | MiCommand::Noop => {}
        }

        self.trace.push(TraceEvent { engine: cursor.engine, command: cmd });
        cursor.pc += 1;
        if cursor.status == EngineStatus::Blocked {
            cursor.status = EngineStatus::Ready;
        }
        Ok(cursor.status)
    }

    /// Run every queued engine to completion
    ///
    /// `pick(n)` chooses which of the `n` live engines executes next; the
    /// returned index is taken modulo `n`.
    pub fn run<F: FnMut(usize) -> usize>(&mut self, mut pick: F) -> Result<()> {
        loop {
            let live: Vec<usize> = self
                .engines
                .iter()
                .enumerate()
                .filter(|(_, e)| e.status.is_live())
                .map(|(i, _)| i)
                .collect();
            if live.is_empty() {
                return Ok(());
            }

            let slot = live[pick(live.len()) % live.len()];
            match self.step(slot)? {
                EngineStatus::Blocked => {
                    self.idle_polls += 1;
                    let any_armed = self.engines.iter().any(|e| e.watchdog.armed);
                    if !any_armed && self.idle_polls > MAX_IDLE_POLLS {
                        let engine = self.engines[slot].engine;
                        log::error!(
                            "vebox: engines deadlocked with no watchdog armed, semaphores {:?}",
                            self.memory.values()
                        );
                        return Err(Error::EngineHang { engine });
                    }
                }
                _ => self.idle_polls = 0,
            }
        }
    }

    /// Run with a fixed rotation over live engines
    pub fn run_round_robin(&mut self) -> Result<()> {
        let mut turn = 0usize;
        self.run(|n| {
            turn = turn.wrapping_add(1);
            turn % n
        })
    }

    /// Run with a reproducible pseudo-random interleaving
    pub fn run_shuffled(&mut self, seed: u64) -> Result<()> {
        // xorshift64; zero is a fixed point
        let mut state = seed | 1;
        self.run(|n| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % n as u64) as usize
        })
    }
}
