//! Physical GPU resources and their per-frame records.
//!
//! A [`PhysicalResource`] is a device allocation plus its views. Pool-created
//! resources are owned by the [`ResourcePool`]; frame records hold `Arc`
//! clones, which keeps an evicted resource alive until the frame that used it
//! has been retired. Imported resources wrap externally owned objects and are
//! never destroyed by the graph.
//!
//! A [`PassResource`] is the per-frame record a pass refers to through a
//! [`ResourceHandle`]. It lives in the frame arena.

mod pool;

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

pub use pool::{DEFERRED_FRAMES, DeferredRelease, PoolOutcome, ResourcePool};

use crate::backend::{RawResource, RenderDevice, ViewHandle, ViewKind};
use crate::error::FrameGraphError;
use crate::graph::PassHandle;
use crate::types::{ResourceDescriptor, ResourceDimension, ResourceState, ResourceUsage};

/// Handle to a resource declared in the current frame.
///
/// Handles are only valid for the frame they were issued in.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: u32,
    frame: u32,
}

impl ResourceHandle {
    /// Handle returned when a resource could not be created or imported.
    pub const NULL: Self = Self {
        index: u32::MAX,
        frame: u32::MAX,
    };

    pub(crate) fn new(index: usize, frame: u32) -> Self {
        Self {
            index: index as u32,
            frame,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }

    pub(crate) fn frame(&self) -> u32 {
        self.frame
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "ResourceHandle(null)")
        } else {
            write!(f, "ResourceHandle({}@{})", self.index, self.frame)
        }
    }
}

/// Views of a resource, indexed by array slice where applicable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceViews {
    pub render_targets: Vec<ViewHandle>,
    pub depth_stencils: Vec<ViewHandle>,
    pub unordered_access: Option<ViewHandle>,
    pub shader_resource: Option<ViewHandle>,
}

impl ResourceViews {
    /// Create every view the descriptor's usage calls for.
    fn create(
        device: &dyn RenderDevice,
        raw: RawResource,
        descriptor: &ResourceDescriptor,
    ) -> Result<Self, FrameGraphError> {
        let readable = match descriptor.dimension {
            ResourceDimension::Buffer => descriptor.size_in_bytes() > 0,
            _ => true,
        };
        Self::create_for(device, raw, descriptor, descriptor.usage, readable)
    }

    /// Create the views for `usage`, plus a shader-resource view if asked.
    ///
    /// On failure the views created so far are freed again.
    fn create_for(
        device: &dyn RenderDevice,
        raw: RawResource,
        descriptor: &ResourceDescriptor,
        usage: ResourceUsage,
        shader_resource: bool,
    ) -> Result<Self, FrameGraphError> {
        let mut views = Self::default();
        if let Err(err) = views.populate(device, raw, descriptor, usage, shader_resource) {
            views.free(device);
            log::error!(
                "Failed to create views for {:?} ({:?}): {}",
                raw,
                descriptor.label,
                err
            );
            return Err(FrameGraphError::ViewCreationFailed(err));
        }
        Ok(views)
    }

    fn populate(
        &mut self,
        device: &dyn RenderDevice,
        raw: RawResource,
        descriptor: &ResourceDescriptor,
        usage: ResourceUsage,
        shader_resource: bool,
    ) -> Result<(), crate::backend::DeviceError> {
        let slices = descriptor.array_layers();
        if usage.contains(ResourceUsage::RENDER_TARGET) {
            for slice in 0..slices {
                self.render_targets.push(device.create_view(
                    raw,
                    descriptor,
                    ViewKind::RenderTarget,
                    slice,
                )?);
            }
        }
        if usage.contains(ResourceUsage::DEPTH_STENCIL) {
            for slice in 0..slices {
                self.depth_stencils.push(device.create_view(
                    raw,
                    descriptor,
                    ViewKind::DepthStencil,
                    slice,
                )?);
            }
        }
        if usage.contains(ResourceUsage::UNORDERED_ACCESS) {
            self.unordered_access =
                Some(device.create_view(raw, descriptor, ViewKind::UnorderedAccess, 0)?);
        }
        if shader_resource {
            self.shader_resource =
                Some(device.create_view(raw, descriptor, ViewKind::ShaderResource, 0)?);
        }
        Ok(())
    }

    /// Usage bits of `usage` that have no views yet.
    fn missing(&self, usage: ResourceUsage) -> ResourceUsage {
        let mut missing = ResourceUsage::empty();
        if usage.contains(ResourceUsage::RENDER_TARGET) && self.render_targets.is_empty() {
            missing |= ResourceUsage::RENDER_TARGET;
        }
        if usage.contains(ResourceUsage::DEPTH_STENCIL) && self.depth_stencils.is_empty() {
            missing |= ResourceUsage::DEPTH_STENCIL;
        }
        if usage.contains(ResourceUsage::UNORDERED_ACCESS) && self.unordered_access.is_none() {
            missing |= ResourceUsage::UNORDERED_ACCESS;
        }
        missing
    }

    fn merge(&mut self, added: Self) {
        self.render_targets.extend(added.render_targets);
        self.depth_stencils.extend(added.depth_stencils);
        self.unordered_access = self.unordered_access.or(added.unordered_access);
        self.shader_resource = self.shader_resource.or(added.shader_resource);
    }

    fn free(&mut self, device: &dyn RenderDevice) {
        for view in self
            .render_targets
            .drain(..)
            .chain(self.depth_stencils.drain(..))
            .chain(self.unordered_access.take())
            .chain(self.shader_resource.take())
        {
            device.free_view(view);
        }
    }
}

/// An externally owned resource brought into the graph with
/// [`PassBuilder::import`](crate::graph::PassBuilder::import).
#[derive(Debug, Clone)]
pub struct ExternalResource {
    pub raw: RawResource,
    pub descriptor: ResourceDescriptor,
    /// State the resource is in when the frame starts.
    pub state: ResourceState,
    pub views: ResourceViews,
}

/// A device allocation and its views.
pub struct PhysicalResource {
    raw: RawResource,
    descriptor: ResourceDescriptor,
    /// Grows when a pooled resource is reused for a usage it was not
    /// created with.
    views: RwLock<ResourceViews>,
    /// Set for resources the graph created and must destroy.
    owner: Option<Arc<dyn RenderDevice>>,
    /// State after the last compiled frame that used this resource.
    state: Mutex<ResourceState>,
}

impl PhysicalResource {
    /// Allocate a resource and its views on `device`.
    pub(crate) fn create(
        device: &Arc<dyn RenderDevice>,
        descriptor: &ResourceDescriptor,
    ) -> Result<Self, FrameGraphError> {
        let raw = device.create_resource(descriptor).map_err(|err| {
            log::error!(
                "Failed to create resource {:?} ({:?} {}x{}x{}): {}",
                descriptor.label,
                descriptor.dimension,
                descriptor.size.width,
                descriptor.size.height,
                descriptor.size.depth,
                err
            );
            FrameGraphError::ResourceCreationFailed(err)
        })?;

        let views = match ResourceViews::create(device.as_ref(), raw, descriptor) {
            Ok(views) => views,
            Err(err) => {
                device.destroy_resource(raw);
                return Err(err);
            }
        };

        Ok(Self {
            raw,
            descriptor: descriptor.clone(),
            views: RwLock::new(views),
            owner: Some(Arc::clone(device)),
            state: Mutex::new(ResourceState::Common),
        })
    }

    /// Wrap an externally owned resource. Returns `None` for a null resource.
    pub(crate) fn import(external: ExternalResource) -> Option<Self> {
        if external.raw.is_null() {
            return None;
        }
        Some(Self {
            raw: external.raw,
            descriptor: external.descriptor,
            views: RwLock::new(external.views),
            owner: None,
            state: Mutex::new(external.state),
        })
    }

    pub fn raw(&self) -> RawResource {
        self.raw
    }

    /// Descriptor the resource was created with.
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Snapshot of the current views.
    pub fn views(&self) -> ResourceViews {
        self.views.read().clone()
    }

    pub fn is_imported(&self) -> bool {
        self.owner.is_none()
    }

    /// Last state recorded by the compiler.
    pub fn state(&self) -> ResourceState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ResourceState) {
        *self.state.lock() = state;
    }

    /// Add the views `descriptor.usage` needs that this resource lacks.
    ///
    /// Pool entries are matched on shape alone, so a reused resource may be
    /// asked for a binding it was never viewed as. Returns the usage bits
    /// that were added.
    pub(crate) fn cover_usage(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<ResourceUsage, FrameGraphError> {
        let Some(device) = self.owner.as_deref() else {
            return Ok(ResourceUsage::empty());
        };
        let mut views = self.views.write();
        let missing = views.missing(descriptor.usage);
        if missing.is_empty() {
            return Ok(missing);
        }
        let added = ResourceViews::create_for(device, self.raw, &self.descriptor, missing, false)?;
        views.merge(added);
        log::debug!(
            "Added {:?} views to {:?} ({:?})",
            missing,
            self.raw,
            self.descriptor.label
        );
        Ok(missing)
    }
}

impl fmt::Debug for PhysicalResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalResource")
            .field("raw", &self.raw)
            .field("label", &self.descriptor.label)
            .field("imported", &self.is_imported())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for PhysicalResource {
    fn drop(&mut self) {
        if let Some(device) = self.owner.take() {
            log::trace!(
                "Destroying resource {:?} ({:?})",
                self.raw,
                self.descriptor.label
            );
            self.views.get_mut().free(device.as_ref());
            device.destroy_resource(self.raw);
        }
    }
}

/// Per-frame record of a resource used by passes.
#[derive(Debug)]
pub struct PassResource {
    pub(crate) handle: ResourceHandle,
    pub(crate) physical: Arc<PhysicalResource>,
    /// Descriptor as requested by the creating pass.
    pub(crate) descriptor: ResourceDescriptor,
    /// Views as of setup, read without locking while passes record.
    pub(crate) views: ResourceViews,
    /// Liveness counter maintained by the compiler.
    pub(crate) ref_count: i32,
    pub(crate) producer: Option<PassHandle>,
    pub(crate) imported: bool,
}

impl PassResource {
    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    pub fn physical(&self) -> &Arc<PhysicalResource> {
        &self.physical
    }

    pub fn raw(&self) -> RawResource {
        self.physical.raw()
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn views(&self) -> &ResourceViews {
        &self.views
    }

    pub fn ref_count(&self) -> i32 {
        self.ref_count
    }

    /// The pass that created this resource, `None` for imports.
    pub fn producer(&self) -> Option<PassHandle> {
        self.producer
    }

    pub fn is_imported(&self) -> bool {
        self.imported
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyDevice;
    use crate::types::Format;

    fn device() -> (Arc<DummyDevice>, Arc<dyn RenderDevice>) {
        let dummy = Arc::new(DummyDevice::new());
        let device: Arc<dyn RenderDevice> = dummy.clone();
        (dummy, device)
    }

    #[test]
    fn test_views_follow_usage() {
        let (_, device) = device();
        let desc = ResourceDescriptor::texture_2d_array(
            64,
            64,
            3,
            Format::Rgba16Float,
            ResourceUsage::RENDER_TARGET | ResourceUsage::UNORDERED_ACCESS,
        );
        let resource = PhysicalResource::create(&device, &desc).unwrap();
        let views = resource.views();
        assert_eq!(views.render_targets.len(), 3);
        assert!(views.depth_stencils.is_empty());
        assert!(views.unordered_access.is_some());
        assert!(views.shader_resource.is_some());
    }

    #[test]
    fn test_drop_releases_device_objects() {
        let (dummy, device) = device();
        let desc = ResourceDescriptor::texture_2d(8, 8, Format::Depth32Float, ResourceUsage::DEPTH_STENCIL);
        let resource = PhysicalResource::create(&device, &desc).unwrap();
        assert_eq!(dummy.live_resources(), 1);
        assert_eq!(dummy.live_views(), 2);

        drop(resource);
        assert_eq!(dummy.live_resources(), 0);
        assert_eq!(dummy.live_views(), 0);
    }

    #[test]
    fn test_creation_failure_is_reported() {
        let (dummy, device) = device();
        dummy.set_fail_resource_creation(true);
        let desc = ResourceDescriptor::buffer(16, 4, ResourceUsage::UNORDERED_ACCESS);
        let err = PhysicalResource::create(&device, &desc).unwrap_err();
        assert!(matches!(err, FrameGraphError::ResourceCreationFailed(_)));
    }

    #[test]
    fn test_import_is_not_destroyed() {
        let (dummy, device) = device();
        let desc = ResourceDescriptor::texture_2d(8, 8, Format::Bgra8Unorm, ResourceUsage::RENDER_TARGET);
        let raw = device.create_resource(&desc).unwrap();
        let imported = PhysicalResource::import(ExternalResource {
            raw,
            descriptor: desc,
            state: ResourceState::Common,
            views: ResourceViews::default(),
        })
        .unwrap();
        assert!(imported.is_imported());
        drop(imported);
        assert_eq!(dummy.live_resources(), 1);
    }

    #[test]
    fn test_import_null_is_rejected() {
        let desc = ResourceDescriptor::texture_2d(8, 8, Format::Bgra8Unorm, ResourceUsage::RENDER_TARGET);
        assert!(
            PhysicalResource::import(ExternalResource {
                raw: RawResource::NULL,
                descriptor: desc,
                state: ResourceState::Common,
                views: ResourceViews::default(),
            })
            .is_none()
        );
    }

    #[test]
    fn test_cover_usage_adds_missing_views_once() {
        let (dummy, device) = device();
        let desc = ResourceDescriptor::texture_2d_array(
            16,
            16,
            2,
            Format::Rgba8Unorm,
            ResourceUsage::RENDER_TARGET,
        );
        let resource = PhysicalResource::create(&device, &desc).unwrap();
        assert!(resource.views().unordered_access.is_none());
        assert_eq!(dummy.live_views(), 3);

        let wider = desc.clone().with_usage(ResourceUsage::UNORDERED_ACCESS);
        assert_eq!(resource.cover_usage(&wider).unwrap(), ResourceUsage::UNORDERED_ACCESS);
        assert!(resource.views().unordered_access.is_some());
        assert_eq!(resource.views().render_targets.len(), 2);
        assert_eq!(dummy.live_views(), 4);

        assert!(resource.cover_usage(&wider).unwrap().is_empty());
        assert!(resource.cover_usage(&desc).unwrap().is_empty());
        assert_eq!(dummy.live_views(), 4);

        drop(resource);
        assert_eq!(dummy.live_views(), 0);
    }

    #[test]
    fn test_null_handle() {
        assert!(ResourceHandle::NULL.is_null());
        assert!(!ResourceHandle::new(0, 0).is_null());
        assert_eq!(format!("{:?}", ResourceHandle::new(2, 5)), "ResourceHandle(2@5)");
    }
}
