//! Value types shared across the frame graph.
//!
//! Formats, descriptors, usage flags, barrier states and queue kinds.

mod descriptor;
mod format;
mod state;

pub use descriptor::{
    ClearValue, DescriptorKey, Extent3d, ResourceDescriptor, ResourceDimension, ResourceUsage,
};
pub use format::Format;
pub use state::{CrossQueueSync, QueueKind, ResourceState};
