//! Pass records.

use std::fmt;

use bitflags::bitflags;
use redlilium_core::BoundedVec;

use super::{PassBuilder, PassContext};
use crate::resource::ResourceHandle;
use crate::types::{ClearValue, CrossQueueSync, QueueKind, ResourceState};

/// Handle to a pass in the frame graph.
///
/// `PassHandle` is `Copy` and cheap to pass around. It is only valid for the
/// frame it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassHandle(u32);

impl PassHandle {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// How a pass touches one of its resources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        /// A state transition is recorded before the pass.
        const BARRIER = 1 << 2;
        /// An unordered-access hazard barrier is recorded before the pass.
        const UAV_BARRIER = 1 << 3;
    }
}

/// One resource usage of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceAccess {
    pub resource: ResourceHandle,
    pub flags: AccessFlags,
    /// State before the barrier. Only meaningful with [`AccessFlags::BARRIER`].
    pub before: ResourceState,
    /// State the pass uses the resource in, set during compile.
    pub after: ResourceState,
}

impl ResourceAccess {
    pub(crate) fn new(resource: ResourceHandle, flags: AccessFlags) -> Self {
        Self {
            resource,
            flags,
            before: ResourceState::Common,
            after: ResourceState::Common,
        }
    }

    pub fn reads(&self) -> bool {
        self.flags.contains(AccessFlags::READ)
    }

    pub fn writes(&self) -> bool {
        self.flags.contains(AccessFlags::WRITE)
    }

    pub fn has_barrier(&self) -> bool {
        self.flags
            .intersects(AccessFlags::BARRIER | AccessFlags::UAV_BARRIER)
    }
}

/// A clear recorded before a pass runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearRequest {
    pub resource: ResourceHandle,
    pub value: ClearValue,
}

/// Origin of a pass record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Added with [`FrameGraph::add_pass`](super::FrameGraph::add_pass).
    Declared,
    /// Inserted by the compiler on the graphics queue to move resources into
    /// a compute-compatible state before an async compute pass.
    QueueHandoff,
}

/// Type-erased setup and execute callbacks.
pub(crate) trait PassCallbacks: Send {
    fn setup(&mut self, builder: &mut PassBuilder<'_>);
    fn execute(self: Box<Self>, context: &mut PassContext<'_>);
}

/// Closure-backed callbacks. Setup's return value is handed to execute.
pub(crate) struct ClosurePass<T, S, E> {
    setup: Option<S>,
    execute: E,
    data: Option<T>,
}

impl<T, S, E> ClosurePass<T, S, E> {
    pub(crate) fn new(setup: S, execute: E) -> Self {
        Self {
            setup: Some(setup),
            execute,
            data: None,
        }
    }
}

impl<T, S, E> PassCallbacks for ClosurePass<T, S, E>
where
    T: Send + 'static,
    S: FnOnce(&mut PassBuilder<'_>) -> T + Send + 'static,
    E: FnOnce(&T, &mut PassContext<'_>) + Send + 'static,
{
    fn setup(&mut self, builder: &mut PassBuilder<'_>) {
        if let Some(setup) = self.setup.take() {
            self.data = Some(setup(builder));
        }
    }

    fn execute(self: Box<Self>, context: &mut PassContext<'_>) {
        let Self { execute, data, .. } = *self;
        if let Some(data) = data {
            execute(&data, context);
        }
    }
}

/// One scheduled unit of GPU work.
pub struct RenderPass {
    pub(crate) tag: String,
    pub(crate) kind: PassKind,
    pub(crate) callbacks: Option<Box<dyn PassCallbacks>>,
    pub(crate) queue: QueueKind,
    pub(crate) sync: CrossQueueSync,
    pub(crate) ref_count: i32,
    /// Set once the pass's own reference has been handed to an output.
    pub(crate) has_outputs: bool,
    pub(crate) accesses: BoundedVec<ResourceAccess>,
    pub(crate) clears: BoundedVec<ClearRequest>,
}

impl RenderPass {
    pub(crate) fn new(
        tag: String,
        callbacks: Box<dyn PassCallbacks>,
        max_accesses: usize,
        max_clears: usize,
    ) -> Self {
        Self {
            tag,
            kind: PassKind::Declared,
            callbacks: Some(callbacks),
            queue: QueueKind::Graphics,
            sync: CrossQueueSync::None,
            // The pass's own reference, standing for its side effects.
            ref_count: 1,
            has_outputs: false,
            accesses: BoundedVec::new(max_accesses),
            clears: BoundedVec::new(max_clears),
        }
    }

    /// Count a resource the pass creates or writes.
    ///
    /// The first output takes over the pass's own reference; every further
    /// one adds a reference that culling releases when the output goes unread.
    pub(crate) fn add_output(&mut self) {
        if self.has_outputs {
            self.ref_count += 1;
        } else {
            self.has_outputs = true;
        }
    }

    /// A graphics-queue pass that only records the given transitions.
    pub(crate) fn queue_handoff(tag: String, accesses: BoundedVec<ResourceAccess>) -> Self {
        Self {
            tag,
            kind: PassKind::QueueHandoff,
            callbacks: None,
            queue: QueueKind::Graphics,
            sync: CrossQueueSync::None,
            ref_count: 1,
            has_outputs: false,
            accesses,
            clears: BoundedVec::new(0),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    pub fn is_synthesized(&self) -> bool {
        self.kind == PassKind::QueueHandoff
    }

    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    pub fn is_async_compute(&self) -> bool {
        self.queue == QueueKind::Compute
    }

    /// Queue-level wait required before this pass is submitted.
    pub fn sync(&self) -> CrossQueueSync {
        self.sync
    }

    pub fn ref_count(&self) -> i32 {
        self.ref_count
    }

    /// A culled pass is kept in the pass list but never recorded.
    pub fn is_culled(&self) -> bool {
        self.ref_count == 0
    }

    pub fn accesses(&self) -> &[ResourceAccess] {
        &self.accesses
    }

    pub fn access(&self, resource: ResourceHandle) -> Option<&ResourceAccess> {
        self.accesses.iter().find(|a| a.resource == resource)
    }

    pub fn clears(&self) -> &[ClearRequest] {
        &self.clears
    }

    /// Number of accesses carrying a transition or hazard barrier.
    pub fn barrier_count(&self) -> usize {
        self.accesses.iter().filter(|a| a.has_barrier()).count()
    }
}

impl fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPass")
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .field("queue", &self.queue)
            .field("sync", &self.sync)
            .field("ref_count", &self.ref_count)
            .field("accesses", &self.accesses.as_slice())
            .field("clears", &self.clears.as_slice())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_flags() {
        let handle = crate::resource::ResourceHandle::new(0, 0);
        let mut access = ResourceAccess::new(handle, AccessFlags::READ);
        assert!(access.reads());
        assert!(!access.writes());
        assert!(!access.has_barrier());

        access.flags |= AccessFlags::WRITE | AccessFlags::UAV_BARRIER;
        assert!(access.writes());
        assert!(access.has_barrier());
    }

    #[test]
    fn test_queue_handoff_pass() {
        let pass = RenderPass::queue_handoff("blur::queue-handoff".into(), BoundedVec::new(4));
        assert!(pass.is_synthesized());
        assert_eq!(pass.queue(), QueueKind::Graphics);
        assert!(!pass.is_culled());
        assert!(pass.clears().is_empty());
    }
}
