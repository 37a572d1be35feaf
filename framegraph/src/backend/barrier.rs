//! Barrier records and per-pass barrier batching.
//!
//! The executor collects every barrier a pass needs into a [`BarrierBatch`]
//! and hands them to the command list in a single call.

use smallvec::SmallVec;

use super::RawResource;
use crate::types::ResourceState;

/// A synchronization command recorded before a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Barrier {
    /// Full state transition.
    Transition {
        resource: RawResource,
        before: ResourceState,
        after: ResourceState,
    },
    /// Orders two unordered-access writes without changing state.
    UnorderedAccess { resource: RawResource },
}

impl Barrier {
    pub fn resource(&self) -> RawResource {
        match self {
            Self::Transition { resource, .. } | Self::UnorderedAccess { resource } => *resource,
        }
    }
}

/// Barriers for one pass, at most one per physical resource.
#[derive(Debug, Default, Clone)]
pub struct BarrierBatch {
    barriers: SmallVec<[Barrier; 8]>,
}

impl BarrierBatch {
    /// Create a new empty barrier batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state transition.
    ///
    /// Transitions where `before == after` are skipped. A second transition
    /// for the same resource extends the first one to the new target state.
    pub fn add_transition(
        &mut self,
        resource: RawResource,
        before: ResourceState,
        after: ResourceState,
    ) {
        if before == after {
            return;
        }

        if let Some(existing) = self.find_mut(resource) {
            *existing = match *existing {
                Barrier::Transition { before, .. } => Barrier::Transition {
                    resource,
                    before,
                    after,
                },
                Barrier::UnorderedAccess { .. } => Barrier::Transition {
                    resource,
                    before,
                    after,
                },
            };
            return;
        }

        self.barriers.push(Barrier::Transition {
            resource,
            before,
            after,
        });
    }

    /// Add an unordered-access hazard barrier.
    ///
    /// Skipped if the resource already has a barrier in this batch.
    pub fn add_unordered_access(&mut self, resource: RawResource) {
        if self.find_mut(resource).is_none() {
            self.barriers.push(Barrier::UnorderedAccess { resource });
        }
    }

    fn find_mut(&mut self, resource: RawResource) -> Option<&mut Barrier> {
        self.barriers.iter_mut().find(|b| b.resource() == resource)
    }

    /// Check if the batch has any barriers.
    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    /// Get the number of barriers in the batch.
    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    pub fn as_slice(&self) -> &[Barrier] {
        &self.barriers
    }

    /// Clear all barriers from the batch.
    pub fn clear(&mut self) {
        self.barriers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_state_is_skipped() {
        let mut batch = BarrierBatch::new();
        batch.add_transition(RawResource::new(1), ResourceState::Read, ResourceState::Read);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_duplicate_transition_is_merged() {
        let mut batch = BarrierBatch::new();
        let r = RawResource::new(7);
        batch.add_transition(r, ResourceState::Common, ResourceState::RenderTarget);
        batch.add_transition(r, ResourceState::RenderTarget, ResourceState::Read);
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch.as_slice()[0],
            Barrier::Transition {
                resource: r,
                before: ResourceState::Common,
                after: ResourceState::Read,
            }
        );
    }

    #[test]
    fn test_transition_replaces_uav_barrier() {
        let mut batch = BarrierBatch::new();
        let r = RawResource::new(3);
        batch.add_unordered_access(r);
        batch.add_unordered_access(r);
        assert_eq!(batch.len(), 1);

        batch.add_transition(r, ResourceState::UnorderedAccess, ResourceState::Read);
        assert!(matches!(batch.as_slice()[0], Barrier::Transition { .. }));
    }

    #[test]
    fn test_clear() {
        let mut batch = BarrierBatch::new();
        batch.add_unordered_access(RawResource::new(1));
        batch.add_unordered_access(RawResource::new(2));
        assert_eq!(batch.len(), 2);
        batch.clear();
        assert!(batch.is_empty());
    }
}
