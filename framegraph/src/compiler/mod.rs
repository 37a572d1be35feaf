//! Frame compilation: setup, dead-pass culling and barrier resolution.
//!
//! # Algorithm
//!
//! 1. **Setup.** Every pass's setup callback runs once, in declaration
//!    order, filling in its resource accesses.
//! 2. **Culling.** Resources nobody reads start on a work stack. Popping one
//!    releases a reference on its producer and on every other live pass that
//!    writes it; a pass that drops to zero is culled and releases a reference
//!    on every resource it reads, which may push those in turn. Culled passes
//!    stay in the list.
//! 3. **Barriers.** Live passes are walked in order while tracking each
//!    physical resource's state and last queue. Accesses that need a
//!    different state get a transition; consecutive compute writes to an
//!    unordered-access resource get a hazard barrier; touching a resource
//!    last used on the other queue sets the pass's cross-queue wait. Before
//!    an async compute pass that needs resources moved out of a
//!    graphics-only state, a hand-off pass carrying those transitions is
//!    inserted on the graphics queue.

use std::collections::HashMap;
use std::sync::Arc;

use redlilium_core::{BoundedVec, FrameArena};

use crate::backend::RawResource;
use crate::error::FrameGraphError;
use crate::graph::{
    AccessFlags, Blackboard, PassBuilder, PassHandle, RenderPass, ResourceAccess,
};
use crate::resource::{PassResource, PhysicalResource, ResourcePool};
use crate::types::{CrossQueueSync, QueueKind, ResourceState};

/// Summary of one compiled frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Passes added by the caller.
    pub declared_passes: usize,
    pub culled_passes: usize,
    /// Queue hand-off passes inserted before async compute passes.
    pub synthesized_passes: usize,
    pub resources: usize,
    pub transitions: usize,
    pub uav_barriers: usize,
    /// Passes that wait on the other queue before submission.
    pub cross_queue_waits: usize,
}

/// Run every pass's setup callback in declaration order.
///
/// A device failure does not stop later setups from running; the first error
/// is returned once all of them have run.
pub(crate) fn run_setup(
    passes: &mut FrameArena<RenderPass>,
    resources: &mut FrameArena<PassResource>,
    pool: &mut ResourcePool,
    blackboard: &mut Blackboard,
    frame: u32,
) -> Result<(), FrameGraphError> {
    redlilium_core::profile_scope!("framegraph: setup");

    let mut error = None;
    for (index, pass) in passes.iter_mut().enumerate() {
        let Some(mut callbacks) = pass.callbacks.take() else {
            continue;
        };
        {
            let mut builder = PassBuilder {
                handle: PassHandle::new(index),
                pass: &mut *pass,
                resources: &mut *resources,
                pool: &mut *pool,
                blackboard: &mut *blackboard,
                frame,
                error: &mut error,
            };
            callbacks.setup(&mut builder);
        }
        pass.callbacks = Some(callbacks);
    }

    match error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Cull passes whose outputs are never read. Returns the number culled.
pub(crate) fn cull(passes: &mut [RenderPass], resources: &mut [PassResource]) -> usize {
    redlilium_core::profile_scope!("framegraph: cull");

    let mut stack: Vec<usize> = resources
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.imported && r.ref_count == 0)
        .map(|(index, _)| index)
        .collect();

    let mut culled = 0;
    while let Some(unread) = stack.pop() {
        let handle = resources[unread].handle;
        let producer = resources[unread].producer;
        for (index, pass) in passes.iter_mut().enumerate() {
            if pass.is_culled() {
                continue;
            }
            let writes = pass.access(handle).is_some_and(ResourceAccess::writes);
            let created = producer.is_some_and(|p| p.index() == index);
            if !writes && !created {
                continue;
            }

            pass.ref_count -= 1;
            debug_assert!(pass.ref_count >= 0, "pass '{}' released twice", pass.tag);
            if pass.ref_count > 0 {
                continue;
            }

            log::debug!("Culling pass '{}'", pass.tag);
            culled += 1;
            for access in pass.accesses.iter().filter(|a| a.reads()) {
                let input = &mut resources[access.resource.index()];
                if input.imported {
                    continue;
                }
                input.ref_count -= 1;
                debug_assert!(input.ref_count >= 0, "{:?} released twice", input.handle);
                if input.ref_count == 0 {
                    stack.push(access.resource.index());
                }
            }
        }
    }
    culled
}

/// Tracked state of one physical resource during barrier resolution.
struct Tracked {
    physical: Arc<PhysicalResource>,
    state: ResourceState,
    queue: QueueKind,
    /// The last access was a compute-queue unordered-access write.
    compute_uav_write: bool,
}

/// Physical resources paired with the state the frame leaves them in.
pub(crate) type FinalStates = Vec<(Arc<PhysicalResource>, ResourceState)>;

/// Barrier resolution result.
#[derive(Debug, Default)]
pub(crate) struct ResolvedBarriers {
    pub synthesized_passes: usize,
    pub transitions: usize,
    pub uav_barriers: usize,
    pub cross_queue_waits: usize,
    /// Applied with [`commit_states`] once the frame has been submitted.
    pub final_states: FinalStates,
}

/// Resolve barriers and cross-queue sync for the live passes in `order`.
///
/// Hand-off passes are appended to `passes` and spliced into `order` just
/// before the compute pass they serve. The physical resources keep their
/// states; the frame's final states are returned for [`commit_states`].
///
/// # Panics
///
/// Panics if a hand-off pass does not fit in the pass arena.
pub(crate) fn resolve_barriers(
    passes: &mut FrameArena<RenderPass>,
    order: &mut Vec<PassHandle>,
    resources: &[PassResource],
    max_usages: usize,
) -> ResolvedBarriers {
    redlilium_core::profile_scope!("framegraph: barriers");

    let mut tracker: HashMap<RawResource, Tracked> = HashMap::new();
    let mut stats = ResolvedBarriers::default();
    let mut resolved = Vec::with_capacity(order.len());

    for &handle in order.iter() {
        if passes[handle.index()].is_culled() {
            resolved.push(handle);
            continue;
        }

        if passes[handle.index()].queue == QueueKind::Compute
            && let Some(handoff) = queue_handoff(
                &passes[handle.index()],
                resources,
                &mut tracker,
                max_usages,
            )
        {
            let tag = format!("{}::queue-handoff", passes[handle.index()].tag);
            stats.transitions += handoff.len();
            let index = passes
                .alloc(RenderPass::queue_handoff(tag, handoff))
                .unwrap_or_else(|_| {
                    panic!(
                        "Frame graph pass capacity ({}) exceeded while inserting a queue hand-off before '{}'",
                        passes.capacity(),
                        passes[handle.index()].tag
                    )
                });
            log::debug!(
                "Inserted queue hand-off before compute pass '{}'",
                passes[handle.index()].tag
            );
            stats.synthesized_passes += 1;
            resolved.push(PassHandle::new(index));
        }

        let pass = &mut passes[handle.index()];
        let queue = pass.queue;
        let mut sync = CrossQueueSync::None;
        for access in pass.accesses.iter_mut() {
            if !access.flags.intersects(AccessFlags::READ | AccessFlags::WRITE) {
                continue;
            }
            let record = &resources[access.resource.index()];
            let tracked = track(&mut tracker, record);
            let writes = access.writes();
            let target = ResourceState::for_access(record.descriptor.usage, writes, queue);

            sync = sync.merge(CrossQueueSync::between(tracked.queue, queue));

            if tracked.state != target {
                access.flags |= AccessFlags::BARRIER;
                access.before = tracked.state;
                stats.transitions += 1;
            } else if target == ResourceState::UnorderedAccess
                && writes
                && queue == QueueKind::Compute
                && tracked.compute_uav_write
            {
                access.flags |= AccessFlags::UAV_BARRIER;
                access.before = tracked.state;
                stats.uav_barriers += 1;
            }
            access.after = target;

            tracked.state = target;
            tracked.queue = queue;
            tracked.compute_uav_write =
                writes && queue == QueueKind::Compute && target == ResourceState::UnorderedAccess;
        }

        pass.sync = sync;
        if sync.wait_queue().is_some() {
            stats.cross_queue_waits += 1;
        }
        resolved.push(handle);
    }

    stats.final_states = tracker
        .into_values()
        .map(|tracked| (tracked.physical, tracked.state))
        .collect();
    *order = resolved;
    stats
}

/// Record the states a submitted frame left its resources in, so the next
/// frame's barriers start from them.
pub(crate) fn commit_states(states: &mut FinalStates) {
    for (physical, state) in states.drain(..) {
        physical.set_state(state);
    }
}

fn track<'t>(
    tracker: &'t mut HashMap<RawResource, Tracked>,
    record: &PassResource,
) -> &'t mut Tracked {
    tracker.entry(record.raw()).or_insert_with(|| Tracked {
        physical: Arc::clone(&record.physical),
        state: record.physical.state(),
        // Every frame ends with graphics joined on compute.
        queue: QueueKind::Graphics,
        compute_uav_write: false,
    })
}

/// Transitions a compute pass needs on resources that graphics left in a
/// graphics-only state.
fn queue_handoff(
    pass: &RenderPass,
    resources: &[PassResource],
    tracker: &mut HashMap<RawResource, Tracked>,
    max_usages: usize,
) -> Option<BoundedVec<ResourceAccess>> {
    let mut handoff = BoundedVec::new(max_usages);
    for access in pass.accesses.iter() {
        if !access.flags.intersects(AccessFlags::READ | AccessFlags::WRITE) {
            continue;
        }
        let record = &resources[access.resource.index()];
        let tracked = track(tracker, record);
        let target =
            ResourceState::for_access(record.descriptor.usage, access.writes(), QueueKind::Compute);
        if tracked.queue != QueueKind::Graphics || tracked.state.is_compute_compatible() {
            continue;
        }

        let mut transition = ResourceAccess::new(access.resource, AccessFlags::BARRIER);
        transition.before = tracked.state;
        transition.after = target;
        // Bounded by the compute pass's own access count.
        if handoff.try_push(transition).is_err() {
            break;
        }
        tracked.state = target;
        tracked.compute_uav_write = false;
    }
    (!handoff.is_empty()).then_some(handoff)
}
