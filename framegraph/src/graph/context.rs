//! Execute-phase API handed to a pass's execute callback.

use super::{Blackboard, RenderPass};
use crate::backend::{CommandList, RawResource, ViewHandle};
use crate::resource::{PassResource, ResourceHandle, ResourceViews};
use crate::types::{QueueKind, ResourceDescriptor, ResourceState};

/// Read-only view of the frame plus the command list assigned to the pass.
///
/// Execute callbacks may run on worker threads. Everything reachable from
/// the context except the command list is shared and immutable.
///
/// # Panics
///
/// Resource accessors panic for resources the pass did not declare in setup.
pub struct PassContext<'a> {
    pass: &'a RenderPass,
    resources: &'a [PassResource],
    blackboard: &'a Blackboard,
    command_list: &'a mut dyn CommandList,
}

impl<'a> PassContext<'a> {
    pub(crate) fn new(
        pass: &'a RenderPass,
        resources: &'a [PassResource],
        blackboard: &'a Blackboard,
        command_list: &'a mut dyn CommandList,
    ) -> Self {
        Self {
            pass,
            resources,
            blackboard,
            command_list,
        }
    }

    pub fn tag(&self) -> &str {
        &self.pass.tag
    }

    pub fn queue(&self) -> QueueKind {
        self.pass.queue
    }

    pub fn blackboard(&self) -> &Blackboard {
        self.blackboard
    }

    /// Command list to record into. Barriers and clears are already recorded.
    pub fn command_list(&mut self) -> &mut dyn CommandList {
        &mut *self.command_list
    }

    pub fn descriptor(&self, resource: ResourceHandle) -> &ResourceDescriptor {
        &self.resource(resource).descriptor
    }

    pub fn raw(&self, resource: ResourceHandle) -> RawResource {
        self.resource(resource).raw()
    }

    pub fn views(&self, resource: ResourceHandle) -> &ResourceViews {
        self.resource(resource).views()
    }

    /// Render-target view of one array slice.
    pub fn render_target_view(&self, resource: ResourceHandle, slice: u32) -> Option<ViewHandle> {
        self.views(resource)
            .render_targets
            .get(slice as usize)
            .copied()
    }

    /// Depth-stencil view of one array slice.
    pub fn depth_stencil_view(&self, resource: ResourceHandle, slice: u32) -> Option<ViewHandle> {
        self.views(resource)
            .depth_stencils
            .get(slice as usize)
            .copied()
    }

    pub fn unordered_access_view(&self, resource: ResourceHandle) -> Option<ViewHandle> {
        self.views(resource).unordered_access
    }

    pub fn shader_resource_view(&self, resource: ResourceHandle) -> Option<ViewHandle> {
        self.views(resource).shader_resource
    }

    /// State the resource is in while this pass runs.
    pub fn state(&self, resource: ResourceHandle) -> ResourceState {
        self.declared(resource);
        self.pass
            .access(resource)
            .map_or(ResourceState::Common, |access| access.after)
    }

    fn resource(&self, resource: ResourceHandle) -> &'a PassResource {
        self.declared(resource);
        &self.resources[resource.index()]
    }

    fn declared(&self, resource: ResourceHandle) {
        assert!(
            self.pass.access(resource).is_some(),
            "Pass '{}' accessed {:?} without declaring it in setup",
            self.pass.tag,
            resource
        );
    }
}
