//! Per-frame allocation utilities.
//!
//! Frame-based systems rebuild the same shape of data every frame. The types
//! here keep those allocations alive across frames instead of dropping and
//! reallocating them:
//!
//! - [`Poolable`]: a value that can be cleared in place, keeping its capacity.
//! - [`FrameArena`]: an index-addressed bump allocator with a hard slot limit,
//!   reset in one step.
//! - [`DoubleBuffered`]: two [`Poolable`] values that alternate each frame, so
//!   the previous frame's contents stay valid while its GPU work may still be
//!   in flight.
//!
//! # Example
//!
//! ```
//! use redlilium_core::arena::{DoubleBuffered, FrameArena};
//!
//! let mut frames = DoubleBuffered::new(FrameArena::<u32>::with_capacity(4), FrameArena::with_capacity(4));
//! let slot = frames.active_mut().alloc(7).unwrap();
//! assert_eq!(frames.active()[slot], 7);
//!
//! frames.flip();
//! assert!(frames.active().is_empty());
//! assert_eq!(frames.previous()[slot], 7);
//! ```

use std::ops::{Index, IndexMut};

use crate::bounded::CapacityError;

/// Trait for types that can be cleared and reused.
///
/// Implementors must be able to create an empty instance and clear their
/// contents while preserving allocated capacity.
pub trait Poolable {
    /// Create a new empty instance.
    fn new_empty() -> Self;

    /// Reset the value to an empty state, preserving allocated capacity.
    fn reset(&mut self);
}

/// A bump allocator of at most `capacity` slots.
///
/// Slots are addressed by the index returned from [`alloc`](Self::alloc) and
/// stay valid until the next [`reset`](Poolable::reset).
#[derive(Debug)]
pub struct FrameArena<T> {
    slots: Vec<T>,
    capacity: usize,
}

impl<T> FrameArena<T> {
    /// Creates an arena holding up to `capacity` values.
    ///
    /// The backing storage is reserved up front and never grows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Moves `value` into the next free slot and returns its index.
    pub fn alloc(&mut self, value: T) -> Result<usize, CapacityError> {
        if self.slots.len() >= self.capacity {
            return Err(CapacityError {
                limit: self.capacity,
            });
        }
        let index = self.slots.len();
        self.slots.push(value);
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remaining free slots.
    pub fn remaining(&self) -> usize {
        self.capacity - self.slots.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.slots.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.slots
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.slots
    }
}

impl<T> Index<usize> for FrameArena<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.slots[index]
    }
}

impl<T> IndexMut<usize> for FrameArena<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.slots[index]
    }
}

impl<T> Poolable for FrameArena<T> {
    /// An arena with no slots. Use [`FrameArena::with_capacity`] for a usable one.
    fn new_empty() -> Self {
        Self::with_capacity(0)
    }

    fn reset(&mut self) {
        // Drops every value; the reservation is kept.
        self.slots.clear();
    }
}

/// Two buffers that alternate once per frame.
///
/// [`flip`](Self::flip) makes the older buffer active and resets it. The
/// buffer that was active before the flip is left untouched and reachable
/// through [`previous`](Self::previous) until the following flip.
#[derive(Debug)]
pub struct DoubleBuffered<T: Poolable> {
    buffers: [T; 2],
    active: usize,
}

impl<T: Poolable> DoubleBuffered<T> {
    pub fn new(first: T, second: T) -> Self {
        Self {
            buffers: [first, second],
            active: 0,
        }
    }

    /// Builds both buffers with the same constructor.
    pub fn from_fn(mut make: impl FnMut() -> T) -> Self {
        Self::new(make(), make())
    }

    pub fn active(&self) -> &T {
        &self.buffers[self.active]
    }

    pub fn active_mut(&mut self) -> &mut T {
        &mut self.buffers[self.active]
    }

    pub fn previous(&self) -> &T {
        &self.buffers[self.active ^ 1]
    }

    /// Index (0 or 1) of the active buffer.
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Switches to the other buffer and resets it.
    pub fn flip(&mut self) {
        self.active ^= 1;
        self.buffers[self.active].reset();
    }

    /// Resets the active buffer without switching.
    pub fn reset_active(&mut self) {
        self.buffers[self.active].reset();
    }
}

impl<T: Poolable> Default for DoubleBuffered<T> {
    fn default() -> Self {
        Self::from_fn(T::new_empty)
    }
}
