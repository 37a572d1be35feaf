//! Typed key-value side channel between passes.
//!
//! Passes use the blackboard for data that does not fit the resource model:
//! camera parameters, culling results, handles that later passes need to look
//! up by name. Setup callbacks get mutable access; execute callbacks read it.
//!
//! ```
//! use redlilium_framegraph::graph::{Blackboard, BlackboardKey};
//!
//! let mut board = Blackboard::new();
//! board.set("exposure", 1.5f32);
//! assert_eq!(board.get::<f32>("exposure"), Some(&1.5));
//! assert_eq!(board.get::<u32>("exposure"), None);
//! assert!(board.contains(BlackboardKey::from_str("exposure")));
//! ```

use std::any::Any;
use std::collections::HashMap;

/// 32-bit blackboard key, either given directly or hashed from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlackboardKey(u32);

impl BlackboardKey {
    pub const fn from_raw(hash: u32) -> Self {
        Self(hash)
    }

    /// FNV-1a hash of `name`.
    #[allow(clippy::should_implement_trait)]
    pub const fn from_str(name: &str) -> Self {
        const OFFSET: u32 = 0x811c_9dc5;
        const PRIME: u32 = 0x0100_0193;
        let bytes = name.as_bytes();
        let mut hash = OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(PRIME);
            i += 1;
        }
        Self(hash)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl From<u32> for BlackboardKey {
    fn from(hash: u32) -> Self {
        Self::from_raw(hash)
    }
}

impl From<&str> for BlackboardKey {
    fn from(name: &str) -> Self {
        Self::from_str(name)
    }
}

struct Entry {
    value: Box<dyn Any + Send + Sync>,
    size: usize,
}

/// Map from [`BlackboardKey`] to a value of any `Send + Sync` type.
///
/// A second `set` with the same key replaces the first, whatever its type.
/// Entries persist across frames until removed or the graph is dropped.
#[derive(Default)]
pub struct Blackboard {
    entries: HashMap<BlackboardKey, Entry>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<BlackboardKey>, value: T) {
        let key = key.into();
        let entry = Entry {
            value: Box::new(value),
            size: std::mem::size_of::<T>(),
        };
        if self.entries.insert(key, entry).is_some() {
            log::trace!("Blackboard: replaced {:?}", key);
        }
    }

    /// Typed lookup. `None` if the key is absent or holds another type.
    pub fn get<T: Any>(&self, key: impl Into<BlackboardKey>) -> Option<&T> {
        self.entries
            .get(&key.into())
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: impl Into<BlackboardKey>) -> Option<&mut T> {
        self.entries
            .get_mut(&key.into())
            .and_then(|entry| entry.value.downcast_mut::<T>())
    }

    /// Untyped lookup returning the value and its size in bytes.
    pub fn get_raw(&self, key: impl Into<BlackboardKey>) -> Option<(&dyn Any, usize)> {
        self.entries
            .get(&key.into())
            .map(|entry| (entry.value.as_ref() as &dyn Any, entry.size))
    }

    pub fn contains(&self, key: impl Into<BlackboardKey>) -> bool {
        self.entries.contains_key(&key.into())
    }

    /// Remove an entry, returning whether it existed.
    pub fn remove(&mut self, key: impl Into<BlackboardKey>) -> bool {
        self.entries.remove(&key.into()).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blackboard")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Camera {
        fov: f32,
        near: f32,
    }

    #[test]
    fn test_string_keys_hash_with_fnv1a() {
        assert_eq!(BlackboardKey::from_str("").raw(), 0x811c_9dc5);
        assert_eq!(BlackboardKey::from_str("a").raw(), 0xe40c_292c);
        assert_eq!(BlackboardKey::from("a"), BlackboardKey::from_raw(0xe40c_292c));
    }

    #[test]
    fn test_set_and_get() {
        let mut board = Blackboard::new();
        board.set("camera", Camera { fov: 60.0, near: 0.1 });
        assert_eq!(
            board.get::<Camera>("camera"),
            Some(&Camera { fov: 60.0, near: 0.1 })
        );
        assert!(board.contains("camera"));
        assert!(!board.contains("light"));
    }

    #[test]
    fn test_last_write_wins() {
        let mut board = Blackboard::new();
        board.set(7u32, 1u64);
        board.set(7u32, "seven");
        assert_eq!(board.len(), 1);
        assert_eq!(board.get::<u64>(7u32), None);
        assert_eq!(board.get::<&str>(7u32), Some(&"seven"));
    }

    #[test]
    fn test_get_raw_reports_size() {
        let mut board = Blackboard::new();
        board.set("matrix", [0.0f32; 16]);
        let (value, size) = board.get_raw("matrix").unwrap();
        assert_eq!(size, 64);
        assert!(value.is::<[f32; 16]>());
    }

    #[test]
    fn test_get_mut_and_remove() {
        let mut board = Blackboard::new();
        board.set("frame", 1u32);
        *board.get_mut::<u32>("frame").unwrap() += 1;
        assert_eq!(board.get::<u32>("frame"), Some(&2));
        assert!(board.remove("frame"));
        assert!(!board.remove("frame"));
        assert!(board.is_empty());
    }
}
