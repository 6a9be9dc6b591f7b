//! # Submission Coordinator
//!
//! Sequences per-engine stream generation and hands the streams to the
//! device layer.
//!
//! ```text
//!   Idle ──▶ Scheduled ──▶ Populating ──▶ Submitting ──▶ Completed
//!                              ▲   │  (phased: per engine)
//!                              └───┘
//!                    any error ──────────────────────▶ Failed
//! ```

use alloc::vec::Vec;
use core::slice;

use vebox_hal::{
    CommandBuffer, CommandBufferHandle, CommandSubmitter, Dimensions, EngineResources, Error,
    HardwareProfile, MiCommand, Result, SemaphoreHandle, SubmissionPolicy, SubmissionType,
};

use crate::barrier::BarrierSynchronizer;
use crate::topology::SchedulingDecision;

// =============================================================================
// ENGINE GROUP
// =============================================================================

/// Resources of one engine slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineSlot {
    /// Engine index
    pub index: u32,
    /// Batch buffer for this engine
    pub command_buffer: CommandBufferHandle,
    /// Entry-barrier semaphore
    pub semaphore_entry: SemaphoreHandle,
    /// Exit-barrier semaphore
    pub semaphore_exit: SemaphoreHandle,
}

/// Engine slots of one pipeline; grows on demand, never shrinks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineGroup {
    slots: Vec<EngineSlot>,
}

impl EngineGroup {
    /// Empty group
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check for an empty group
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots in index order
    pub fn slots(&self) -> &[EngineSlot] {
        &self.slots
    }

    /// Grow to at least `count` slots
    pub fn ensure_capacity<R: EngineResources + ?Sized>(&mut self, count: u32, resources: &mut R) -> Result<()> {
        let have = self.slots.len() as u32;
        if have >= count {
            return Ok(());
        }

        let more = count - have;
        let allocation = resources.allocate_engine_resources(more)?;
        if allocation.len() < more as usize {
            log::error!(
                "vebox: allocator returned {} engine slots, {} requested",
                allocation.len(),
                more
            );
            return Err(Error::ResourceAllocation);
        }

        let fresh = allocation
            .command_buffers
            .iter()
            .zip(&allocation.entry_semaphores)
            .zip(&allocation.exit_semaphores)
            .take(more as usize)
            .enumerate()
            .map(|(i, ((&cb, &entry), &exit))| EngineSlot {
                index: have + i as u32,
                command_buffer: cb,
                semaphore_entry: entry,
                semaphore_exit: exit,
            });
        self.slots.extend(fresh);
        log::info!("vebox: engine group grown from {} to {} slots", have, count);
        Ok(())
    }

    /// Free every slot
    pub fn release<R: EngineResources + ?Sized>(&mut self, resources: &mut R) -> Result<()> {
        if self.slots.is_empty() {
            return Ok(());
        }
        resources.free_engine_resources()?;
        log::info!("vebox: engine group of {} slots released", self.slots.len());
        self.slots.clear();
        Ok(())
    }
}

// =============================================================================
// POPULATION
// =============================================================================

/// Writes the hardware-specific state region of one engine's stream
pub trait StreamPopulator {
    /// Append the state for `engine` to `cb`
    fn populate(&mut self, engine: u32, decision: &SchedulingDecision, cb: &mut CommandBuffer) -> Result<()>;
}

impl<F> StreamPopulator for F
where
    F: FnMut(u32, &SchedulingDecision, &mut CommandBuffer) -> Result<()>,
{
    fn populate(&mut self, engine: u32, decision: &SchedulingDecision, cb: &mut CommandBuffer) -> Result<()> {
        self(engine, decision, cb)
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Observable position in the per-frame state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameStage {
    /// No frame in flight
    #[default]
    Idle,
    /// Decision taken, nothing generated yet
    Scheduled,
    /// Streams being generated
    Populating,
    /// Streams being handed to the device layer
    Submitting,
    /// Every stream reached the device layer
    Completed,
    /// Generation or submission failed
    Failed,
}

/// Per-pipeline submission sequencing
#[derive(Debug)]
pub struct SubmissionCoordinator {
    profile: HardwareProfile,
    policy: SubmissionPolicy,
    parallel_submission: bool,
    primary: CommandBufferHandle,
    group: EngineGroup,
    stage: FrameStage,
    next_tag: u32,
}

impl SubmissionCoordinator {
    /// Create a coordinator; `primary` backs the single-engine path
    pub fn new(profile: HardwareProfile, policy: SubmissionPolicy, primary: CommandBufferHandle) -> Self {
        Self {
            profile,
            policy,
            parallel_submission: false,
            primary,
            group: EngineGroup::new(),
            stage: FrameStage::Idle,
            next_tag: 1,
        }
    }

    /// Hand buffers back one by one and submit once with the last
    pub fn with_parallel_submission(mut self, enabled: bool) -> Self {
        self.parallel_submission = enabled;
        self
    }

    /// Submission policy
    pub fn policy(&self) -> SubmissionPolicy {
        self.policy
    }

    /// Stage of the last or current frame
    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Engine slots allocated so far
    pub fn group(&self) -> &EngineGroup {
        &self.group
    }

    /// Make sure the group can serve `decision`
    pub fn prepare<R: EngineResources + ?Sized>(
        &mut self,
        decision: &SchedulingDecision,
        resources: &mut R,
    ) -> Result<()> {
        if decision.scalable {
            self.group.ensure_capacity(decision.engine_count, resources)?;
        }
        Ok(())
    }

    /// Free the engine group
    pub fn release<R: EngineResources + ?Sized>(&mut self, resources: &mut R) -> Result<()> {
        self.group.release(resources)
    }

    fn take_sync_tag(&mut self) -> u32 {
        let tag = self.next_tag;
        self.next_tag = self.next_tag.wrapping_add(1).max(1);
        tag
    }

    /// Generate and submit one frame
    ///
    /// Returns the generated buffers in engine order.
    pub fn run<P, S>(
        &mut self,
        decision: &SchedulingDecision,
        target: Dimensions,
        populator: &mut P,
        submitter: &S,
    ) -> Result<Vec<CommandBuffer>>
    where
        P: StreamPopulator + ?Sized,
        S: CommandSubmitter + ?Sized,
    {
        self.stage = FrameStage::Scheduled;
        let result = if decision.scalable {
            self.run_scalable(decision, target, populator, submitter)
        } else {
            self.run_single(decision, populator, submitter)
        };

        self.stage = match result {
            Ok(_) => FrameStage::Completed,
            Err(e) if e.is_recoverable() => {
                log::warn!("vebox: frame submission failed: {} ({:#06x})", e, e.code());
                FrameStage::Failed
            }
            Err(e) => {
                log::error!("vebox: frame submission failed: {} ({:#06x})", e, e.code());
                FrameStage::Failed
            }
        };
        result
    }

    fn run_scalable<P, S>(
        &mut self,
        decision: &SchedulingDecision,
        target: Dimensions,
        populator: &mut P,
        submitter: &S,
    ) -> Result<Vec<CommandBuffer>>
    where
        P: StreamPopulator + ?Sized,
        S: CommandSubmitter + ?Sized,
    {
        let count = decision.engine_count;
        if self.group.len() < count as usize {
            log::error!(
                "vebox: {} engines scheduled but only {} slots prepared",
                count,
                self.group.len()
            );
            return Err(Error::InvalidState);
        }

        let slots: Vec<EngineSlot> = self.group.slots()[..count as usize].to_vec();
        let entry: Vec<SemaphoreHandle> = slots.iter().map(|s| s.semaphore_entry).collect();
        let exit: Vec<SemaphoreHandle> = slots.iter().map(|s| s.semaphore_exit).collect();
        let barrier = BarrierSynchronizer::new(&self.profile, target, &entry, &exit)?;
        let tag = self.take_sync_tag();
        let phased = self.policy == SubmissionPolicy::Phased;

        let mut buffers = Vec::with_capacity(slots.len());
        for slot in &slots {
            self.stage = FrameStage::Populating;
            let mut cb = CommandBuffer::new(slot.command_buffer, slot.index, self.profile.command_buffer_size);
            barrier.build_stream(slot.index, tag, &mut cb, |cb| {
                populator.populate(slot.index, decision, cb)
            })?;

            if phased {
                let tag = SubmissionType::for_engine(slot.index, count);
                cb.set_submission_type(tag);
                log::debug!("vebox: engine {} tagged {:?}", slot.index, tag);

                self.stage = FrameStage::Submitting;
                let last = slot.index + 1 == count;
                if self.parallel_submission {
                    submitter.return_buffer(&cb)?;
                    if last {
                        submitter.submit(slice::from_ref(&cb), SubmissionPolicy::Phased)?;
                    }
                } else {
                    submitter.submit(slice::from_ref(&cb), SubmissionPolicy::Phased)?;
                }
            }
            buffers.push(cb);
        }

        if !phased {
            self.stage = FrameStage::Submitting;
            submitter.submit(&buffers, SubmissionPolicy::Synchronous)?;
        }
        Ok(buffers)
    }

    fn run_single<P, S>(
        &mut self,
        decision: &SchedulingDecision,
        populator: &mut P,
        submitter: &S,
    ) -> Result<Vec<CommandBuffer>>
    where
        P: StreamPopulator + ?Sized,
        S: CommandSubmitter + ?Sized,
    {
        let tag = self.take_sync_tag();
        self.stage = FrameStage::Populating;

        let mut cb = CommandBuffer::new(self.primary, 0, self.profile.command_buffer_size);
        cb.push(MiCommand::Prolog { engine: 0 })?;
        populator.populate(0, decision, &mut cb)?;
        cb.push(MiCommand::FlushDw { sync_tag: None })?;
        cb.push(MiCommand::StatusTag)?;
        cb.push(MiCommand::FlushDw { sync_tag: Some(tag) })?;
        cb.push(MiCommand::BatchBufferEnd)?;
        cb.set_submission_type(SubmissionType::SINGLE_PIPE);

        self.stage = FrameStage::Submitting;
        submitter.submit(slice::from_ref(&cb), SubmissionPolicy::Synchronous)?;
        Ok(alloc::vec![cb])
    }
}

static_assertions::assert_impl_all!(SubmissionCoordinator: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use vebox_hal::{EngineAllocation, NullSubmitter, SemaphoreHandle};

    #[derive(Default)]
    struct Allocator {
        next: u64,
        calls: Vec<u32>,
        freed: u32,
    }

    impl EngineResources for Allocator {
        fn allocate_engine_resources(&mut self, count: u32) -> Result<EngineAllocation> {
            self.calls.push(count);
            let mut a = EngineAllocation::default();
            for _ in 0..count {
                self.next += 3;
                a.command_buffers.push(CommandBufferHandle::new(self.next));
                a.entry_semaphores.push(SemaphoreHandle::new(self.next + 1));
                a.exit_semaphores.push(SemaphoreHandle::new(self.next + 2));
            }
            Ok(a)
        }

        fn free_engine_resources(&mut self) -> Result<()> {
            self.freed += 1;
            Ok(())
        }
    }

    fn state(engine: u32, _: &SchedulingDecision, cb: &mut CommandBuffer) -> Result<()> {
        cb.push(MiCommand::HardwareState { engine, dwords: 32 })
    }

    fn coordinator(policy: SubmissionPolicy) -> SubmissionCoordinator {
        SubmissionCoordinator::new(HardwareProfile::gen12(), policy, CommandBufferHandle::new(0xF00))
    }

    const TARGET: Dimensions = Dimensions::new(4096, 2304);

    #[test]
    fn test_group_grows_lazily_and_never_shrinks() {
        let mut res = Allocator::default();
        let mut g = EngineGroup::new();
        g.ensure_capacity(2, &mut res).unwrap();
        g.ensure_capacity(1, &mut res).unwrap();
        g.ensure_capacity(4, &mut res).unwrap();
        g.ensure_capacity(3, &mut res).unwrap();

        assert_eq!(res.calls, [2, 2]);
        assert_eq!(g.len(), 4);
        let indices: Vec<u32> = g.slots().iter().map(|s| s.index).collect();
        assert_eq!(indices, [0, 1, 2, 3]);

        g.release(&mut res).unwrap();
        assert!(g.is_empty());
        assert_eq!(res.freed, 1);
        // nothing left to free
        g.release(&mut res).unwrap();
        assert_eq!(res.freed, 1);
    }

    #[test]
    fn test_short_allocation_rejected() {
        struct Stingy;
        impl EngineResources for Stingy {
            fn allocate_engine_resources(&mut self, _: u32) -> Result<EngineAllocation> {
                Ok(EngineAllocation::default())
            }
            fn free_engine_resources(&mut self) -> Result<()> {
                Ok(())
            }
        }
        let mut g = EngineGroup::new();
        assert_eq!(g.ensure_capacity(2, &mut Stingy), Err(Error::ResourceAllocation));
        assert!(g.is_empty());
    }

    #[test]
    fn test_phased_tags() {
        let mut res = Allocator::default();
        let sub = NullSubmitter::new();
        let mut c = coordinator(SubmissionPolicy::Phased);
        let d = SchedulingDecision::scalable(3);
        c.prepare(&d, &mut res).unwrap();
        c.run(&d, TARGET, &mut state, &sub).unwrap();

        let subs = sub.submissions();
        assert_eq!(subs.len(), 3);
        assert!(subs.iter().all(|s| s.policy == SubmissionPolicy::Phased && s.buffers.len() == 1));
        let tags: Vec<SubmissionType> = sub.submitted_buffers().iter().map(|b| b.submission_type()).collect();
        assert_eq!(
            tags,
            [
                SubmissionType::MULTI_PIPE_MASTER,
                SubmissionType::MULTI_PIPE_SLAVE,
                SubmissionType::MULTI_PIPE_SLAVE | SubmissionType::LAST_PIPE,
            ]
        );
        assert_eq!(c.stage(), FrameStage::Completed);
    }

    #[test]
    fn test_parallel_submission_submits_once() {
        let mut res = Allocator::default();
        let sub = NullSubmitter::new();
        let mut c = coordinator(SubmissionPolicy::Phased).with_parallel_submission(true);
        let d = SchedulingDecision::scalable(2);
        c.prepare(&d, &mut res).unwrap();
        let buffers = c.run(&d, TARGET, &mut state, &sub).unwrap();

        assert_eq!(sub.returned().len(), 2);
        assert_eq!(sub.call_count(), 1);
        let submitted = sub.submitted_buffers();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].submission_type().contains(SubmissionType::LAST_PIPE));
        assert_eq!(submitted[0], buffers[1]);
    }

    #[test]
    fn test_synchronous_submits_group() {
        let mut res = Allocator::default();
        let sub = NullSubmitter::new();
        let mut c = coordinator(SubmissionPolicy::Synchronous);
        let d = SchedulingDecision::scalable(2);
        c.prepare(&d, &mut res).unwrap();
        let buffers = c.run(&d, TARGET, &mut state, &sub).unwrap();

        let subs = sub.submissions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].policy, SubmissionPolicy::Synchronous);
        assert_eq!(subs[0].buffers, buffers);
        assert!(buffers.iter().all(|b| b.is_terminated()));
    }

    #[test]
    fn test_single_pipe_has_no_barrier() {
        let sub = NullSubmitter::new();
        let mut c = coordinator(SubmissionPolicy::Phased);
        let buffers = c.run(&SchedulingDecision::SINGLE, TARGET, &mut state, &sub).unwrap();

        assert_eq!(buffers.len(), 1);
        let cb = &buffers[0];
        assert_eq!(cb.handle(), CommandBufferHandle::new(0xF00));
        assert_eq!(cb.submission_type(), SubmissionType::SINGLE_PIPE);
        assert!(cb.commands().iter().all(|cmd| cmd.semaphore().is_none()));
        assert!(!cb
            .commands()
            .iter()
            .any(|cmd| matches!(cmd, MiCommand::LoadRegisterImm { .. })));
        assert_eq!(sub.submissions()[0].policy, SubmissionPolicy::Synchronous);
    }

    #[test]
    fn test_unprepared_group_is_invalid_state() {
        let sub = NullSubmitter::new();
        let mut c = coordinator(SubmissionPolicy::Synchronous);
        assert_eq!(
            c.run(&SchedulingDecision::scalable(2), TARGET, &mut state, &sub),
            Err(Error::InvalidState)
        );
        assert_eq!(c.stage(), FrameStage::Failed);
        assert_eq!(sub.call_count(), 0);
    }

    #[test]
    fn test_submit_failure_marks_failed() {
        let mut res = Allocator::default();
        let sub = NullSubmitter::new();
        let mut c = coordinator(SubmissionPolicy::Synchronous);
        let d = SchedulingDecision::scalable(2);
        c.prepare(&d, &mut res).unwrap();
        sub.fail_next_submit();
        assert_eq!(c.run(&d, TARGET, &mut state, &sub), Err(Error::SubmissionFailed));
        assert_eq!(c.stage(), FrameStage::Failed);

        // the next frame goes through with a new sync tag
        let first = c.run(&d, TARGET, &mut state, &sub).unwrap();
        let second = c.run(&d, TARGET, &mut state, &sub).unwrap();
        let tag_of = |cb: &CommandBuffer| {
            cb.commands().iter().find_map(|c| match c {
                MiCommand::FlushDw { sync_tag: Some(t) } => Some(*t),
                _ => None,
            })
        };
        assert_ne!(tag_of(&first[0]), tag_of(&second[0]));
    }

    #[test]
    fn test_populator_error_aborts_before_submit() {
        let mut res = Allocator::default();
        let sub = NullSubmitter::new();
        let mut c = coordinator(SubmissionPolicy::Phased);
        let d = SchedulingDecision::scalable(2);
        c.prepare(&d, &mut res).unwrap();
        let mut failing = |engine: u32, _: &SchedulingDecision, _: &mut CommandBuffer| {
            if engine == 1 {
                Err(Error::InvalidParameter)
            } else {
                Ok(())
            }
        };
        assert_eq!(c.run(&d, TARGET, &mut failing, &sub), Err(Error::InvalidParameter));
        // engine 0 was already handed over
        assert_eq!(sub.submitted_buffers().len(), 1);
        assert_eq!(c.stage(), FrameStage::Failed);
    }
}
