//! Setup-phase API handed to a pass's setup callback.

use std::sync::Arc;

use redlilium_core::FrameArena;

use super::pass::{AccessFlags, ClearRequest, ResourceAccess};
use super::{Blackboard, PassHandle, RenderPass};
use crate::error::FrameGraphError;
use crate::resource::{
    ExternalResource, PassResource, PhysicalResource, PoolOutcome, ResourceHandle, ResourcePool,
};
use crate::types::{QueueKind, ResourceDescriptor};

/// Declares what a pass creates, reads and writes.
///
/// Setup callbacks run on the thread calling
/// [`FrameGraph::compile`](super::FrameGraph::compile), one pass at a time in
/// declaration order.
///
/// # Panics
///
/// Exceeding the configured resource count or per-pass usage count panics,
/// as does using a resource handle from another frame.
pub struct PassBuilder<'a> {
    pub(crate) handle: PassHandle,
    pub(crate) pass: &'a mut RenderPass,
    pub(crate) resources: &'a mut FrameArena<PassResource>,
    pub(crate) pool: &'a mut ResourcePool,
    pub(crate) blackboard: &'a mut Blackboard,
    pub(crate) frame: u32,
    /// First device error of the frame, reported by compile.
    pub(crate) error: &'a mut Option<FrameGraphError>,
}

impl PassBuilder<'_> {
    /// Handle of the pass being set up.
    pub fn pass(&self) -> PassHandle {
        self.handle
    }

    pub fn tag(&self) -> &str {
        &self.pass.tag
    }

    /// Get a resource from the pool for this pass.
    ///
    /// The resource counts as an output of this pass: if nothing reads it,
    /// the pass is culled like one whose writes go unread. If the descriptor
    /// asks for a clear on first use, the clear is recorded before this pass
    /// runs and the pass is registered as writing the resource. Returns
    /// [`ResourceHandle::NULL`] if the device fails; the error is reported by
    /// `compile`.
    pub fn create(&mut self, descriptor: ResourceDescriptor) -> ResourceHandle {
        let physical = match self.pool.get_or_create(&descriptor) {
            Ok((physical, outcome)) => {
                if outcome == PoolOutcome::CreatedWithEviction {
                    log::debug!(
                        "Pass '{}': pool full, evicted an entry for {:?}",
                        self.pass.tag,
                        descriptor.label
                    );
                }
                physical
            }
            Err(err) => {
                log::error!(
                    "Pass '{}': could not create {:?}: {}",
                    self.pass.tag,
                    descriptor.label,
                    err
                );
                self.error.get_or_insert(err);
                return ResourceHandle::NULL;
            }
        };

        let clear = descriptor
            .clear_on_first_use
            .then_some(descriptor.clear_value);
        let handle = self.alloc(PassResource {
            handle: ResourceHandle::NULL,
            views: physical.views(),
            physical,
            descriptor,
            ref_count: 0,
            producer: Some(self.handle),
            imported: false,
        });
        self.pass.add_output();

        match clear {
            Some(value) => {
                self.record_access(handle, AccessFlags::WRITE);
                if self
                    .pass
                    .clears
                    .try_push(ClearRequest {
                        resource: handle,
                        value,
                    })
                    .is_err()
                {
                    panic!(
                        "Pass '{}' exceeded the maximum of {} clear requests",
                        self.pass.tag,
                        self.pass.clears.limit()
                    );
                }
            }
            None => {
                self.record_access(handle, AccessFlags::empty());
            }
        }
        handle
    }

    /// Declare a read. Reads keep the resource, and so its producer, alive.
    pub fn read(&mut self, resource: ResourceHandle) -> ResourceHandle {
        if !self.validate(resource, "read") {
            return ResourceHandle::NULL;
        }
        let added = self.record_access(resource, AccessFlags::READ);
        let record = &mut self.resources[resource.index()];
        if added.contains(AccessFlags::READ) && !record.imported {
            record.ref_count += 1;
        }
        resource
    }

    /// Declare a write. The pass stays alive while anything reads what it writes.
    pub fn write(&mut self, resource: ResourceHandle) -> ResourceHandle {
        if !self.validate(resource, "write") {
            return ResourceHandle::NULL;
        }
        let added = self.record_access(resource, AccessFlags::WRITE);
        // Resources this pass created are already counted as its outputs.
        let created_here = self.resources[resource.index()].producer == Some(self.handle);
        if added.contains(AccessFlags::WRITE) && !created_here {
            self.pass.add_output();
        }
        resource
    }

    /// Bring an externally owned resource into this frame.
    ///
    /// Imported resources have no producer, are never culled and are never
    /// destroyed by the graph. Importing a null resource logs an error and
    /// returns [`ResourceHandle::NULL`].
    pub fn import(&mut self, external: ExternalResource) -> ResourceHandle {
        let label = external.descriptor.label.clone();
        let Some(physical) = PhysicalResource::import(external) else {
            log::error!(
                "Pass '{}': cannot import null resource {:?}",
                self.pass.tag,
                label
            );
            return ResourceHandle::NULL;
        };
        let descriptor = physical.descriptor().clone();
        self.alloc(PassResource {
            handle: ResourceHandle::NULL,
            views: physical.views(),
            physical: Arc::new(physical),
            descriptor,
            ref_count: 1,
            producer: None,
            imported: true,
        })
    }

    /// Schedule this pass on the compute queue.
    pub fn async_compute_enable(&mut self, enable: bool) {
        self.pass.queue = if enable {
            QueueKind::Compute
        } else {
            QueueKind::Graphics
        };
    }

    pub fn is_async_compute(&self) -> bool {
        self.pass.queue == QueueKind::Compute
    }

    pub fn blackboard(&mut self) -> &mut Blackboard {
        &mut *self.blackboard
    }

    /// Descriptor of a resource declared this frame.
    pub fn descriptor(&self, resource: ResourceHandle) -> &ResourceDescriptor {
        self.assert_current(resource);
        &self.resources[resource.index()].descriptor
    }

    fn alloc(&mut self, mut record: PassResource) -> ResourceHandle {
        let index = self.resources.len();
        let handle = ResourceHandle::new(index, self.frame);
        record.handle = handle;
        if self.resources.alloc(record).is_err() {
            panic!(
                "Pass '{}' exceeded the frame graph resource capacity of {}",
                self.pass.tag,
                self.resources.capacity()
            );
        }
        handle
    }

    /// Merge `flags` into the pass's access for `resource` and return the
    /// flags that were not set before.
    fn record_access(&mut self, resource: ResourceHandle, flags: AccessFlags) -> AccessFlags {
        if let Some(existing) = self.pass.accesses.iter_mut().find(|a| a.resource == resource) {
            let added = flags - existing.flags;
            existing.flags |= flags;
            return added;
        }
        if self
            .pass
            .accesses
            .try_push(ResourceAccess::new(resource, flags))
            .is_err()
        {
            panic!(
                "Pass '{}' exceeded the maximum of {} resource usages",
                self.pass.tag,
                self.pass.accesses.limit()
            );
        }
        flags
    }

    fn validate(&self, resource: ResourceHandle, what: &str) -> bool {
        if resource.is_null() {
            log::warn!("Pass '{}': {} of a null resource ignored", self.pass.tag, what);
            return false;
        }
        self.assert_current(resource);
        true
    }

    fn assert_current(&self, resource: ResourceHandle) {
        assert!(
            resource.frame() == self.frame && resource.index() < self.resources.len(),
            "Pass '{}' used {:?}, which was not declared in this frame",
            self.pass.tag,
            resource
        );
    }
}
