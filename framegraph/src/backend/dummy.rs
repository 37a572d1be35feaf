//! Dummy device for testing and tooling.
//!
//! This device doesn't touch a GPU. It hands out fake resource handles,
//! allocates views from an in-memory descriptor heap, and records every
//! command and queue operation so tests can inspect what the frame graph
//! produced. Queues complete work instantly: a signal is reached as soon as it
//! is issued.

use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{
    Barrier, CommandList, DeviceError, RawResource, RenderDevice, ViewHandle, ViewKind, WaitPoint,
};
use crate::types::{QueueKind, ResourceDescriptor};

/// Error code returned by calls the device was told to fail.
pub const DUMMY_OUT_OF_MEMORY: i32 = -2;
/// Error code for submitting a list that was never closed.
pub const DUMMY_LIST_NOT_CLOSED: i32 = -3;
/// Error code for waiting on a point that was never signalled.
pub const DUMMY_INVALID_WAIT: i32 = -4;
/// Error code returned by queue submissions the device was told to fail.
pub const DUMMY_DEVICE_LOST: i32 = -5;

/// A command captured by [`DummyCommandList`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    Marker(String),
    Barrier(Barrier),
    ClearRenderTarget {
        view: ViewHandle,
        color: [f32; 4],
    },
    ClearDepthStencil {
        view: ViewHandle,
        depth: Option<f32>,
        stencil: Option<u32>,
    },
    ClearUnorderedAccess {
        view: ViewHandle,
        values: [f32; 4],
    },
}

/// A queue operation captured by [`DummyDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueueOp {
    /// One `execute` call: the commands of every submitted list, in order.
    Execute {
        queue: QueueKind,
        lists: Vec<Vec<RecordedCommand>>,
    },
    Signal(WaitPoint),
    Wait {
        queue: QueueKind,
        point: WaitPoint,
    },
    /// CPU-side wait.
    HostWait(WaitPoint),
}

/// Command list that stores commands in memory.
#[derive(Debug)]
pub struct DummyCommandList {
    queue: QueueKind,
    commands: Vec<RecordedCommand>,
    closed: bool,
}

impl DummyCommandList {
    pub fn new(queue: QueueKind) -> Self {
        Self {
            queue,
            commands: Vec::new(),
            closed: true,
        }
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn push(&mut self, command: RecordedCommand) {
        debug_assert!(!self.closed, "recording into a closed command list");
        self.commands.push(command);
    }
}

impl CommandList for DummyCommandList {
    fn queue(&self) -> QueueKind {
        self.queue
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        self.commands.clear();
        self.closed = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.closed = true;
        Ok(())
    }

    fn debug_marker(&mut self, label: &str) {
        self.push(RecordedCommand::Marker(label.to_string()));
    }

    fn barriers(&mut self, barriers: &[Barrier]) {
        for barrier in barriers {
            self.push(RecordedCommand::Barrier(*barrier));
        }
    }

    fn clear_render_target(&mut self, view: ViewHandle, color: [f32; 4]) {
        self.push(RecordedCommand::ClearRenderTarget { view, color });
    }

    fn clear_depth_stencil(&mut self, view: ViewHandle, depth: Option<f32>, stencil: Option<u32>) {
        self.push(RecordedCommand::ClearDepthStencil {
            view,
            depth,
            stencil,
        });
    }

    fn clear_unordered_access(&mut self, view: ViewHandle, values: [f32; 4]) {
        self.push(RecordedCommand::ClearUnorderedAccess { view, values });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Shared descriptor heap. Slots are recycled through a free list.
#[derive(Debug, Default)]
struct DescriptorAllocator {
    next: u32,
    free: Vec<u32>,
    live: usize,
}

impl DescriptorAllocator {
    fn allocate(&mut self) -> ViewHandle {
        self.live += 1;
        let index = self.free.pop().unwrap_or_else(|| {
            self.next += 1;
            self.next - 1
        });
        ViewHandle::new(index)
    }

    fn free(&mut self, view: ViewHandle) {
        debug_assert!(!self.free.contains(&view.index()), "view {view:?} freed twice");
        self.live -= 1;
        self.free.push(view.index());
    }
}

#[derive(Debug, Default)]
struct Timeline {
    signalled: [u64; 2],
    ops: Vec<QueueOp>,
}

/// In-memory [`RenderDevice`].
#[derive(Debug, Default)]
pub struct DummyDevice {
    next_resource: AtomicU64,
    live_resources: Mutex<HashSet<RawResource>>,
    created_resources: AtomicU64,
    descriptors: Mutex<DescriptorAllocator>,
    timeline: Mutex<Timeline>,
    fail_resources: AtomicBool,
    fail_command_lists: AtomicBool,
    fail_submissions: AtomicBool,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `create_resource` call fail.
    pub fn set_fail_resource_creation(&self, fail: bool) {
        self.fail_resources.store(fail, Ordering::Relaxed);
    }

    /// Make every following `create_command_list` call fail.
    pub fn set_fail_command_lists(&self, fail: bool) {
        self.fail_command_lists.store(fail, Ordering::Relaxed);
    }

    /// Make every following queue `execute` call fail.
    pub fn set_fail_submission(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::Relaxed);
    }

    /// Number of resources created and not yet destroyed.
    pub fn live_resources(&self) -> usize {
        self.live_resources.lock().len()
    }

    /// Total number of successful `create_resource` calls.
    pub fn created_resources(&self) -> u64 {
        self.created_resources.load(Ordering::Relaxed)
    }

    /// Number of allocated descriptor slots.
    pub fn live_views(&self) -> usize {
        self.descriptors.lock().live
    }

    /// Snapshot of every queue operation so far.
    pub fn queue_ops(&self) -> Vec<QueueOp> {
        self.timeline.lock().ops.clone()
    }

    /// Forget recorded queue operations.
    pub fn clear_queue_ops(&self) {
        self.timeline.lock().ops.clear();
    }

    /// Debug markers of every list submitted to `queue`, in submission order.
    ///
    /// The frame graph opens each pass with a marker carrying the pass tag, so
    /// this lists the passes a queue ran.
    pub fn submitted_markers(&self, queue: QueueKind) -> Vec<String> {
        self.timeline
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                QueueOp::Execute { queue: q, lists } if *q == queue => Some(lists),
                _ => None,
            })
            .flatten()
            .flatten()
            .filter_map(|cmd| match cmd {
                RecordedCommand::Marker(label) => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: QueueOp) {
        self.timeline.lock().ops.push(op);
    }
}

impl RenderDevice for DummyDevice {
    fn name(&self) -> &'static str {
        "Dummy Device"
    }

    fn create_resource(&self, descriptor: &ResourceDescriptor) -> Result<RawResource, DeviceError> {
        if self.fail_resources.load(Ordering::Relaxed) {
            return Err(DeviceError::new("create_resource", DUMMY_OUT_OF_MEMORY));
        }
        let resource = RawResource::new(self.next_resource.fetch_add(1, Ordering::Relaxed) + 1);
        log::trace!(
            "DummyDevice: creating {:?} {:?} ({}x{}x{}) as {:?}",
            descriptor.dimension,
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth,
            resource
        );
        self.live_resources.lock().insert(resource);
        self.created_resources.fetch_add(1, Ordering::Relaxed);
        Ok(resource)
    }

    fn destroy_resource(&self, resource: RawResource) {
        log::trace!("DummyDevice: destroying {:?}", resource);
        let removed = self.live_resources.lock().remove(&resource);
        debug_assert!(removed, "{resource:?} destroyed twice or never created");
    }

    fn create_view(
        &self,
        resource: RawResource,
        _descriptor: &ResourceDescriptor,
        kind: ViewKind,
        slice: u32,
    ) -> Result<ViewHandle, DeviceError> {
        let view = self.descriptors.lock().allocate();
        log::trace!(
            "DummyDevice: {:?} view {:?} (slice {}) for {:?}",
            kind,
            view,
            slice,
            resource
        );
        Ok(view)
    }

    fn free_view(&self, view: ViewHandle) {
        self.descriptors.lock().free(view);
    }

    fn create_command_list(&self, queue: QueueKind) -> Result<Box<dyn CommandList>, DeviceError> {
        if self.fail_command_lists.load(Ordering::Relaxed) {
            return Err(DeviceError::new("create_command_list", DUMMY_OUT_OF_MEMORY));
        }
        Ok(Box::new(DummyCommandList::new(queue)))
    }

    fn execute(&self, queue: QueueKind, lists: &[&dyn CommandList]) -> Result<(), DeviceError> {
        if self.fail_submissions.load(Ordering::Relaxed) {
            return Err(DeviceError::new("execute", DUMMY_DEVICE_LOST));
        }
        let mut recorded = Vec::with_capacity(lists.len());
        for list in lists {
            let Some(list) = list.as_any().downcast_ref::<DummyCommandList>() else {
                return Err(DeviceError::new("execute", DUMMY_LIST_NOT_CLOSED));
            };
            if !list.is_closed() {
                return Err(DeviceError::new("execute", DUMMY_LIST_NOT_CLOSED));
            }
            recorded.push(list.commands().to_vec());
        }
        log::trace!("DummyDevice: executing {} lists on {:?}", lists.len(), queue);
        self.record(QueueOp::Execute {
            queue,
            lists: recorded,
        });
        Ok(())
    }

    fn signal(&self, queue: QueueKind) -> Result<WaitPoint, DeviceError> {
        let mut timeline = self.timeline.lock();
        timeline.signalled[queue.index()] += 1;
        let point = WaitPoint::new(queue, timeline.signalled[queue.index()]);
        timeline.ops.push(QueueOp::Signal(point));
        Ok(point)
    }

    fn wait(&self, queue: QueueKind, point: WaitPoint) -> Result<(), DeviceError> {
        let mut timeline = self.timeline.lock();
        if point.value > timeline.signalled[point.queue.index()] {
            return Err(DeviceError::new("wait", DUMMY_INVALID_WAIT));
        }
        timeline.ops.push(QueueOp::Wait { queue, point });
        Ok(())
    }

    fn wait_for(&self, point: WaitPoint) {
        let mut timeline = self.timeline.lock();
        debug_assert!(
            point.value <= timeline.signalled[point.queue.index()],
            "host wait on {point:?}, which was never signalled"
        );
        timeline.ops.push(QueueOp::HostWait(point));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Format, ResourceUsage};

    fn target() -> ResourceDescriptor {
        ResourceDescriptor::texture_2d(16, 16, Format::Rgba8Unorm, ResourceUsage::RENDER_TARGET)
    }

    #[test]
    fn test_resources_are_tracked() {
        let device = DummyDevice::new();
        let a = device.create_resource(&target()).unwrap();
        let b = device.create_resource(&target()).unwrap();
        assert_ne!(a, b);
        assert!(!a.is_null());
        assert_eq!(device.live_resources(), 2);

        device.destroy_resource(a);
        assert_eq!(device.live_resources(), 1);
        assert_eq!(device.created_resources(), 2);
    }

    #[test]
    fn test_failing_resource_creation() {
        let device = DummyDevice::new();
        device.set_fail_resource_creation(true);
        let err = device.create_resource(&target()).unwrap_err();
        assert_eq!(err, DeviceError::new("create_resource", DUMMY_OUT_OF_MEMORY));
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn test_descriptor_slots_are_recycled() {
        let device = DummyDevice::new();
        let r = device.create_resource(&target()).unwrap();
        let v0 = device.create_view(r, &target(), ViewKind::RenderTarget, 0).unwrap();
        let v1 = device.create_view(r, &target(), ViewKind::ShaderResource, 0).unwrap();
        assert_ne!(v0, v1);
        assert_eq!(device.live_views(), 2);

        device.free_view(v0);
        let v2 = device.create_view(r, &target(), ViewKind::ShaderResource, 0).unwrap();
        assert_eq!(v2, v0);
        assert_eq!(device.live_views(), 2);
    }

    #[test]
    fn test_execute_requires_closed_list() {
        let device = DummyDevice::new();
        let mut list = device.create_command_list(QueueKind::Graphics).unwrap();
        list.reset().unwrap();
        list.debug_marker("pass");

        let err = device.execute(QueueKind::Graphics, &[list.as_ref()]).unwrap_err();
        assert_eq!(err.code, DUMMY_LIST_NOT_CLOSED);

        list.close().unwrap();
        device.execute(QueueKind::Graphics, &[list.as_ref()]).unwrap();
        assert_eq!(device.submitted_markers(QueueKind::Graphics), vec!["pass"]);
        assert!(device.submitted_markers(QueueKind::Compute).is_empty());
    }

    #[test]
    fn test_signal_and_wait() {
        let device = DummyDevice::new();
        let point = device.signal(QueueKind::Compute).unwrap();
        assert_eq!(point, WaitPoint::new(QueueKind::Compute, 1));

        device.wait(QueueKind::Graphics, point).unwrap();
        let bogus = WaitPoint::new(QueueKind::Graphics, 5);
        assert_eq!(
            device.wait(QueueKind::Compute, bogus).unwrap_err().code,
            DUMMY_INVALID_WAIT
        );

        assert_eq!(
            device.queue_ops(),
            vec![
                QueueOp::Signal(point),
                QueueOp::Wait {
                    queue: QueueKind::Graphics,
                    point
                },
            ]
        );
    }

    #[test]
    fn test_reset_clears_commands() {
        let mut list = DummyCommandList::new(QueueKind::Compute);
        list.reset().unwrap();
        list.clear_unordered_access(ViewHandle::new(0), [0.0; 4]);
        assert_eq!(list.commands().len(), 1);
        list.reset().unwrap();
        assert!(list.commands().is_empty());
        assert!(!list.is_closed());
    }
}
