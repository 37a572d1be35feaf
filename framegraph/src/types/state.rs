//! Barrier states, queues and cross-queue synchronization flags.

use super::ResourceUsage;

/// Tracked state of a resource between passes.
///
/// A closed set: the common state, one write state per binding category and a
/// single readable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    #[default]
    Common,
    RenderTarget,
    DepthWrite,
    UnorderedAccess,
    Read,
}

impl ResourceState {
    /// State a resource must be in for a usage.
    ///
    /// Reads always target [`ResourceState::Read`]. Writes on the compute
    /// queue always target [`ResourceState::UnorderedAccess`]; writes on the
    /// graphics queue pick the write state matching the resource's usage.
    pub fn for_access(usage: ResourceUsage, writes: bool, queue: QueueKind) -> Self {
        if !writes {
            return Self::Read;
        }
        if queue == QueueKind::Compute {
            return Self::UnorderedAccess;
        }
        if usage.contains(ResourceUsage::DEPTH_STENCIL) {
            Self::DepthWrite
        } else if usage.contains(ResourceUsage::RENDER_TARGET) {
            Self::RenderTarget
        } else if usage.contains(ResourceUsage::UNORDERED_ACCESS) {
            Self::UnorderedAccess
        } else {
            Self::Common
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::RenderTarget | Self::DepthWrite | Self::UnorderedAccess
        )
    }

    /// States the compute queue can consume without a graphics-only transition.
    pub fn is_compute_compatible(&self) -> bool {
        matches!(self, Self::Common | Self::UnorderedAccess | Self::Read)
    }
}

/// Hardware queue a pass is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueKind {
    #[default]
    Graphics,
    Compute,
}

impl QueueKind {
    pub const ALL: [QueueKind; 2] = [QueueKind::Graphics, QueueKind::Compute];

    pub fn other(&self) -> Self {
        match self {
            Self::Graphics => Self::Compute,
            Self::Compute => Self::Graphics,
        }
    }

    /// Dense index for per-queue arrays.
    pub fn index(&self) -> usize {
        match self {
            Self::Graphics => 0,
            Self::Compute => 1,
        }
    }
}

/// Queue-level wait a pass needs before it is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrossQueueSync {
    #[default]
    None,
    GraphicsWaitsCompute,
    ComputeWaitsGraphics,
    /// Compute work following compute work. Queue order already covers it,
    /// so no fence is submitted.
    ComputeWaitsCompute,
}

impl CrossQueueSync {
    /// Sync flag for a pass on `queue` touching a resource last used on `previous`.
    pub fn between(previous: QueueKind, queue: QueueKind) -> Self {
        match (previous, queue) {
            (QueueKind::Compute, QueueKind::Graphics) => Self::GraphicsWaitsCompute,
            (QueueKind::Graphics, QueueKind::Compute) => Self::ComputeWaitsGraphics,
            (QueueKind::Compute, QueueKind::Compute) => Self::ComputeWaitsCompute,
            (QueueKind::Graphics, QueueKind::Graphics) => Self::None,
        }
    }

    /// The queue whose signal must be waited on, if any.
    pub fn wait_queue(&self) -> Option<QueueKind> {
        match self {
            Self::GraphicsWaitsCompute => Some(QueueKind::Compute),
            Self::ComputeWaitsGraphics => Some(QueueKind::Graphics),
            Self::None | Self::ComputeWaitsCompute => None,
        }
    }

    /// Combine two requirements, keeping the one that actually waits.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, other) => other,
            (current, Self::None) => current,
            (Self::ComputeWaitsCompute, other) => other,
            (current, _) => current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_targets_read_state() {
        for queue in QueueKind::ALL {
            assert_eq!(
                ResourceState::for_access(ResourceUsage::RENDER_TARGET, false, queue),
                ResourceState::Read
            );
        }
    }

    #[test]
    fn test_graphics_write_state_follows_usage() {
        let g = QueueKind::Graphics;
        assert_eq!(
            ResourceState::for_access(ResourceUsage::RENDER_TARGET, true, g),
            ResourceState::RenderTarget
        );
        assert_eq!(
            ResourceState::for_access(ResourceUsage::DEPTH_STENCIL, true, g),
            ResourceState::DepthWrite
        );
        assert_eq!(
            ResourceState::for_access(ResourceUsage::UNORDERED_ACCESS, true, g),
            ResourceState::UnorderedAccess
        );
        assert_eq!(
            ResourceState::for_access(ResourceUsage::SHADER_ONLY, true, g),
            ResourceState::Common
        );
    }

    #[test]
    fn test_compute_write_is_unordered_access() {
        assert_eq!(
            ResourceState::for_access(ResourceUsage::RENDER_TARGET, true, QueueKind::Compute),
            ResourceState::UnorderedAccess
        );
    }

    #[test]
    fn test_compute_compatible_states() {
        assert!(ResourceState::Read.is_compute_compatible());
        assert!(ResourceState::UnorderedAccess.is_compute_compatible());
        assert!(!ResourceState::RenderTarget.is_compute_compatible());
        assert!(!ResourceState::DepthWrite.is_compute_compatible());
    }

    #[test]
    fn test_sync_between_queues() {
        use QueueKind::*;
        assert_eq!(CrossQueueSync::between(Graphics, Graphics), CrossQueueSync::None);
        assert_eq!(
            CrossQueueSync::between(Graphics, Compute),
            CrossQueueSync::ComputeWaitsGraphics
        );
        assert_eq!(
            CrossQueueSync::between(Compute, Graphics),
            CrossQueueSync::GraphicsWaitsCompute
        );
        assert_eq!(
            CrossQueueSync::between(Compute, Compute),
            CrossQueueSync::ComputeWaitsCompute
        );
    }

    #[test]
    fn test_sync_merge_prefers_real_waits() {
        let waits = CrossQueueSync::ComputeWaitsGraphics;
        assert_eq!(CrossQueueSync::None.merge(waits), waits);
        assert_eq!(CrossQueueSync::ComputeWaitsCompute.merge(waits), waits);
        assert_eq!(waits.merge(CrossQueueSync::ComputeWaitsCompute), waits);
        assert_eq!(
            CrossQueueSync::ComputeWaitsCompute.merge(CrossQueueSync::None),
            CrossQueueSync::ComputeWaitsCompute
        );
        assert_eq!(CrossQueueSync::ComputeWaitsCompute.wait_queue(), None);
        assert_eq!(waits.wait_queue(), Some(QueueKind::Graphics));
    }

    #[test]
    fn test_queue_other() {
        assert_eq!(QueueKind::Graphics.other(), QueueKind::Compute);
        assert_eq!(QueueKind::Compute.index(), 1);
    }
}
