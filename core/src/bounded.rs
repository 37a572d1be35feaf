//! Fixed-capacity sequences.
//!
//! [`BoundedVec`] is a small vector with a hard element limit chosen at
//! construction time. Pushing past the limit is reported as a
//! [`CapacityError`] instead of growing, which lets callers treat
//! over-subscription as a configuration bug rather than silently allocating.
//!
//! # Example
//!
//! ```
//! use redlilium_core::bounded::BoundedVec;
//!
//! let mut usages = BoundedVec::new(2);
//! usages.try_push(1u32).unwrap();
//! usages.try_push(2u32).unwrap();
//! assert!(usages.try_push(3u32).is_err());
//! assert_eq!(usages.as_slice(), &[1, 2]);
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};

use smallvec::SmallVec;

/// Number of elements stored inline before spilling to the heap.
const INLINE_CAPACITY: usize = 8;

/// Error returned when a fixed-capacity container is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError {
    /// The configured limit that was hit.
    pub limit: usize,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capacity of {} elements exceeded", self.limit)
    }
}

impl std::error::Error for CapacityError {}

/// A vector that never holds more than `limit` elements.
#[derive(Clone)]
pub struct BoundedVec<T> {
    items: SmallVec<[T; INLINE_CAPACITY]>,
    limit: usize,
}

impl<T> BoundedVec<T> {
    /// Creates an empty vector that accepts at most `limit` elements.
    pub fn new(limit: usize) -> Self {
        Self {
            items: SmallVec::new(),
            limit,
        }
    }

    /// Appends an element, failing if the vector is already full.
    pub fn try_push(&mut self, value: T) -> Result<(), CapacityError> {
        if self.items.len() >= self.limit {
            return Err(CapacityError { limit: self.limit });
        }
        self.items.push(value);
        Ok(())
    }

    /// Maximum number of elements.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns `true` when no more elements can be pushed.
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    /// Removes all elements, keeping the limit and any spilled allocation.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<T> Deref for BoundedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> DerefMut for BoundedVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<'a, T> IntoIterator for &'a BoundedVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for BoundedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedVec")
            .field("items", &self.items.as_slice())
            .field("limit", &self.limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_limit() {
        let mut v = BoundedVec::new(3);
        for i in 0..3 {
            v.try_push(i).unwrap();
        }
        assert_eq!(v.len(), 3);
        assert!(v.is_full());
    }

    #[test]
    fn test_push_past_limit_fails() {
        let mut v = BoundedVec::new(1);
        v.try_push("a").unwrap();
        let err = v.try_push("b").unwrap_err();
        assert_eq!(err, CapacityError { limit: 1 });
        assert_eq!(v.as_slice(), &["a"]);
    }

    #[test]
    fn test_zero_limit_rejects_everything() {
        let mut v = BoundedVec::<u8>::new(0);
        assert!(v.try_push(1).is_err());
        assert!(v.is_empty());
    }

    #[test]
    fn test_spills_past_inline_capacity() {
        let mut v = BoundedVec::new(32);
        for i in 0..20u32 {
            v.try_push(i).unwrap();
        }
        assert_eq!(v.iter().copied().sum::<u32>(), (0..20).sum());
    }

    #[test]
    fn test_clear_keeps_limit() {
        let mut v = BoundedVec::new(2);
        v.try_push(1).unwrap();
        v.try_push(2).unwrap();
        v.clear();
        assert!(v.is_empty());
        assert_eq!(v.limit(), 2);
        v.try_push(3).unwrap();
    }

    #[test]
    fn test_deref_mut_allows_in_place_edit() {
        let mut v = BoundedVec::new(2);
        v.try_push(1).unwrap();
        v[0] = 5;
        assert_eq!(v[0], 5);
    }

    #[test]
    fn test_capacity_error_display() {
        let err = CapacityError { limit: 16 };
        assert_eq!(err.to_string(), "capacity of 16 elements exceeded");
    }
}
