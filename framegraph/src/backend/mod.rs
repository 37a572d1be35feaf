//! Device abstraction layer.
//!
//! The frame graph never talks to a GPU API directly. Resource and view
//! creation, command recording and queue submission go through the
//! [`RenderDevice`] and [`CommandList`] traits, passed in explicitly when the
//! graph is constructed.
//!
//! # Available Backends
//!
//! - `dummy` (default feature): records every command and queue operation in
//!   memory, for tests and tooling.

mod barrier;
#[cfg(feature = "dummy")]
pub mod dummy;

use std::any::Any;
use std::fmt;

pub use barrier::{Barrier, BarrierBatch};

use crate::types::{QueueKind, ResourceDescriptor};

/// Opaque handle to a GPU resource owned by a device.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawResource(u64);

impl RawResource {
    /// The null resource.
    pub const NULL: Self = Self(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for RawResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "RawResource(null)")
        } else {
            write!(f, "RawResource({:#x})", self.0)
        }
    }
}

/// Slot in the device's shared descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle(u32);

impl ViewHandle {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

/// Kind of view created over a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    RenderTarget,
    DepthStencil,
    UnorderedAccess,
    ShaderResource,
}

/// A point on a queue's completion timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitPoint {
    pub queue: QueueKind,
    pub value: u64,
}

impl WaitPoint {
    pub fn new(queue: QueueKind, value: u64) -> Self {
        Self { queue, value }
    }
}

/// A failed device call and the code the device returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceError {
    /// Name of the failing call.
    pub call: &'static str,
    pub code: i32,
}

impl DeviceError {
    pub fn new(call: &'static str, code: i32) -> Self {
        Self { call, code }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed with code {}", self.call, self.code)
    }
}

impl std::error::Error for DeviceError {}

/// A recording target bound to one queue.
///
/// Each pass records into its own list, possibly on a worker thread, so
/// implementations must be [`Send`].
pub trait CommandList: Send {
    /// Queue this list is submitted to.
    fn queue(&self) -> QueueKind;

    /// Reopen the list for recording. Called once per frame before any pass
    /// records into it.
    fn reset(&mut self) -> Result<(), DeviceError>;

    /// Finish recording.
    fn close(&mut self) -> Result<(), DeviceError>;

    /// Label the commands that follow.
    fn debug_marker(&mut self, label: &str);

    fn barriers(&mut self, barriers: &[Barrier]);

    fn clear_render_target(&mut self, view: ViewHandle, color: [f32; 4]);

    fn clear_depth_stencil(&mut self, view: ViewHandle, depth: Option<f32>, stencil: Option<u32>);

    fn clear_unordered_access(&mut self, view: ViewHandle, values: [f32; 4]);

    /// Backend-specific access for pass callbacks.
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// GPU device used by the frame graph.
///
/// All methods take `&self`; implementations synchronize internally.
pub trait RenderDevice: Send + Sync + 'static {
    /// Get the device name.
    fn name(&self) -> &'static str;

    fn create_resource(&self, descriptor: &ResourceDescriptor) -> Result<RawResource, DeviceError>;

    fn destroy_resource(&self, resource: RawResource);

    /// Create a view. `slice` selects the array slice for render-target and
    /// depth-stencil views and is ignored otherwise.
    fn create_view(
        &self,
        resource: RawResource,
        descriptor: &ResourceDescriptor,
        kind: ViewKind,
        slice: u32,
    ) -> Result<ViewHandle, DeviceError>;

    fn free_view(&self, view: ViewHandle);

    fn create_command_list(&self, queue: QueueKind) -> Result<Box<dyn CommandList>, DeviceError>;

    /// Submit closed command lists to a queue, in order.
    fn execute(&self, queue: QueueKind, lists: &[&dyn CommandList]) -> Result<(), DeviceError>;

    /// Append a signal to `queue` and return the point it marks.
    fn signal(&self, queue: QueueKind) -> Result<WaitPoint, DeviceError>;

    /// Make `queue` wait for `point` before running later submissions.
    fn wait(&self, queue: QueueKind, point: WaitPoint) -> Result<(), DeviceError>;

    /// Block the calling thread until `point` is reached.
    fn wait_for(&self, point: WaitPoint);
}
