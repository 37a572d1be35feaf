//! LRU pool of physical resources with deferred destruction.
//!
//! GPU work runs behind the CPU, so a resource evicted from the pool may still
//! be referenced by command lists of frames in flight. Evicted resources are
//! parked in a [`DeferredRelease`] queue and dropped only after
//! [`DEFERRED_FRAMES`] further frame boundaries.
//!
//! ```text
//!  get_or_create(desc)
//!    ├─ equivalent entry?       → add missing views, move to MRU end, reuse
//!    ├─ below capacity?         → create, insert at MRU end
//!    └─ full                    → evict LRU entry → DeferredRelease
//!                                 create, insert at MRU end
//!
//!  frame_sync()
//!    └─ advance DeferredRelease, dropping resources queued two frames ago
//! ```

use std::sync::Arc;

use super::PhysicalResource;
use crate::backend::RenderDevice;
use crate::error::FrameGraphError;
use crate::types::ResourceDescriptor;

/// Frame boundaries a released resource survives before it is dropped.
pub const DEFERRED_FRAMES: usize = 2;

/// Frame-indexed queue of resources waiting for the GPU to finish with them.
#[derive(Debug, Default)]
pub struct DeferredRelease {
    frame_queues: [Vec<Arc<PhysicalResource>>; DEFERRED_FRAMES],
    current_frame: u64,
}

impl DeferredRelease {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a resource for release in the current frame's slot.
    pub fn queue(&mut self, resource: Arc<PhysicalResource>) {
        let slot = (self.current_frame % DEFERRED_FRAMES as u64) as usize;
        self.frame_queues[slot].push(resource);
    }

    /// Advance to the next frame and drop the resources queued
    /// [`DEFERRED_FRAMES`] frames ago.
    pub fn advance_frame(&mut self) {
        self.current_frame += 1;
        let slot = (self.current_frame % DEFERRED_FRAMES as u64) as usize;
        let released = self.frame_queues[slot].len();
        if released > 0 {
            log::debug!(
                "Releasing {} pooled resources (frame {})",
                released,
                self.current_frame
            );
        }
        self.frame_queues[slot].clear();
    }

    /// Drop everything immediately. The GPU must be idle.
    pub fn flush_all(&mut self) {
        for queue in &mut self.frame_queues {
            queue.clear();
        }
    }

    /// Number of resources waiting for release.
    pub fn pending_count(&self) -> usize {
        self.frame_queues.iter().map(Vec::len).sum()
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }
}

/// What [`ResourcePool::get_or_create`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOutcome {
    Reused,
    Created,
    /// Created after evicting the least recently used entry.
    CreatedWithEviction,
}

/// Bounded LRU cache of physical resources keyed by descriptor.
pub struct ResourcePool {
    device: Arc<dyn RenderDevice>,
    /// Least recently used first.
    entries: Vec<Arc<PhysicalResource>>,
    capacity: usize,
    deferred: DeferredRelease,
}

impl ResourcePool {
    pub fn new(device: Arc<dyn RenderDevice>, capacity: usize) -> Self {
        Self {
            device,
            entries: Vec::with_capacity(capacity),
            capacity,
            deferred: DeferredRelease::new(),
        }
    }

    /// Return a resource equivalent to `descriptor`, creating one if needed.
    ///
    /// Equivalence ignores usage and clear value. A reused entry gains the
    /// views its new usage needs. A reused resource's contents are undefined.
    pub fn get_or_create(
        &mut self,
        descriptor: &ResourceDescriptor,
    ) -> Result<(Arc<PhysicalResource>, PoolOutcome), FrameGraphError> {
        if let Some(position) = self
            .entries
            .iter()
            .position(|e| e.descriptor().is_equivalent(descriptor))
        {
            self.entries[position].cover_usage(descriptor)?;
            let entry = self.entries.remove(position);
            self.entries.push(Arc::clone(&entry));
            log::trace!("Pool: reusing {:?} for {:?}", entry.raw(), descriptor.label);
            return Ok((entry, PoolOutcome::Reused));
        }

        let resource = Arc::new(PhysicalResource::create(&self.device, descriptor)?);

        let outcome = if self.entries.len() >= self.capacity && !self.entries.is_empty() {
            let evicted = self.entries.remove(0);
            log::debug!(
                "Pool: evicting {:?} ({:?}) to make room for {:?}",
                evicted.raw(),
                evicted.descriptor().label,
                descriptor.label
            );
            self.deferred.queue(evicted);
            PoolOutcome::CreatedWithEviction
        } else {
            PoolOutcome::Created
        };

        log::debug!(
            "Pool: created {:?} ({:?}), {} of {} entries",
            resource.raw(),
            descriptor.label,
            self.entries.len() + 1,
            self.capacity
        );
        self.entries.push(Arc::clone(&resource));
        Ok((resource, outcome))
    }

    /// Advance the deferred-release queue by one frame.
    pub fn frame_sync(&mut self) {
        self.deferred.advance_frame();
        log::trace!(
            "Pool: frame {} ({} entries, {} pending release)",
            self.deferred.current_frame(),
            self.entries.len(),
            self.deferred.pending_count()
        );
    }

    /// Drop every entry and every pending release. The GPU must be idle.
    pub fn clear(&mut self) {
        log::debug!(
            "Pool: clearing {} entries and {} pending releases",
            self.entries.len(),
            self.deferred.pending_count()
        );
        self.entries.clear();
        self.deferred.flush_all();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pending_release(&self) -> usize {
        self.deferred.pending_count()
    }

    /// Frame counter of the deferred-release queue, advanced by `frame_sync`.
    pub fn deferred_frame(&self) -> u64 {
        self.deferred.current_frame()
    }

    /// Pool entries, least recently used first.
    pub fn entries(&self) -> impl Iterator<Item = &Arc<PhysicalResource>> {
        self.entries.iter()
    }
}

impl std::fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("device", &self.device.name())
            .field("entries", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("pending_release", &self.deferred.pending_count())
            .finish()
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyDevice;
    use crate::types::{Format, ResourceUsage};

    fn pool(capacity: usize) -> (Arc<DummyDevice>, ResourcePool) {
        let dummy = Arc::new(DummyDevice::new());
        let pool = ResourcePool::new(dummy.clone(), capacity);
        (dummy, pool)
    }

    fn target(size: u32) -> ResourceDescriptor {
        ResourceDescriptor::texture_2d(size, size, Format::Rgba8Unorm, ResourceUsage::RENDER_TARGET)
    }

    #[test]
    fn test_equivalent_request_is_reused() {
        let (dummy, mut pool) = pool(2);
        let (first, outcome) = pool.get_or_create(&target(256)).unwrap();
        assert_eq!(outcome, PoolOutcome::Created);

        let (second, outcome) = pool.get_or_create(&target(256)).unwrap();
        assert_eq!(outcome, PoolOutcome::Reused);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.pending_release(), 0);
        assert_eq!(dummy.created_resources(), 1);
    }

    #[test]
    fn test_usage_is_not_part_of_the_key() {
        let (dummy, mut pool) = pool(2);
        let (first, _) = pool.get_or_create(&target(256)).unwrap();
        let storage = target(256).with_usage(ResourceUsage::UNORDERED_ACCESS);

        let (second, outcome) = pool.get_or_create(&storage).unwrap();
        assert_eq!(outcome, PoolOutcome::Reused);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(dummy.created_resources(), 1);
        assert_eq!(pool.len(), 1);

        let views = second.views();
        assert_eq!(views.render_targets.len(), 1);
        assert!(views.unordered_access.is_some());
    }

    #[test]
    fn test_reuse_moves_entry_to_mru() {
        let (_, mut pool) = pool(2);
        let (a, _) = pool.get_or_create(&target(1)).unwrap();
        let (b, _) = pool.get_or_create(&target(2)).unwrap();
        pool.get_or_create(&target(1)).unwrap();

        // `b` is now least recently used and gets evicted.
        let (_, outcome) = pool.get_or_create(&target(3)).unwrap();
        assert_eq!(outcome, PoolOutcome::CreatedWithEviction);
        assert!(pool.entries().any(|e| Arc::ptr_eq(e, &a)));
        assert!(!pool.entries().any(|e| Arc::ptr_eq(e, &b)));
    }

    #[test]
    fn test_eviction_is_deferred_two_frames() {
        let (dummy, mut pool) = pool(1);
        let (first, _) = pool.get_or_create(&target(64)).unwrap();
        let first_raw = first.raw();
        drop(first);

        let (_, outcome) = pool.get_or_create(&target(32)).unwrap();
        assert_eq!(outcome, PoolOutcome::CreatedWithEviction);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pending_release(), 1);
        assert_eq!(dummy.live_resources(), 2);

        pool.frame_sync();
        assert_eq!(pool.pending_release(), 1);
        assert_eq!(dummy.live_resources(), 2);

        pool.frame_sync();
        assert_eq!(pool.pending_release(), 0);
        assert_eq!(dummy.live_resources(), 1);
        assert_eq!(pool.deferred_frame(), 2);
        assert!(pool.entries().all(|e| e.raw() != first_raw));
    }

    #[test]
    fn test_frame_records_keep_evicted_resource_alive() {
        let (dummy, mut pool) = pool(1);
        let (held, _) = pool.get_or_create(&target(64)).unwrap();
        pool.get_or_create(&target(32)).unwrap();
        pool.frame_sync();
        pool.frame_sync();
        assert_eq!(dummy.live_resources(), 2);

        drop(held);
        assert_eq!(dummy.live_resources(), 1);
    }

    #[test]
    fn test_clear_flushes_everything() {
        let (dummy, mut pool) = pool(1);
        pool.get_or_create(&target(8)).unwrap();
        pool.get_or_create(&target(16)).unwrap();
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.pending_release(), 0);
        assert_eq!(dummy.live_resources(), 0);
        assert_eq!(dummy.live_views(), 0);
    }

    #[test]
    fn test_creation_failure_leaves_pool_untouched() {
        let (dummy, mut pool) = pool(1);
        pool.get_or_create(&target(8)).unwrap();
        dummy.set_fail_resource_creation(true);
        assert!(pool.get_or_create(&target(16)).is_err());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pending_release(), 0);
    }

    #[test]
    fn test_deferred_release_slots() {
        let mut deferred = DeferredRelease::new();
        assert_eq!(deferred.current_frame(), 0);
        deferred.advance_frame();
        assert_eq!(deferred.current_frame(), 1);
        assert_eq!(deferred.pending_count(), 0);
    }
}
