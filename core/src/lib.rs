//! # RedLilium Core
//!
//! Engine-agnostic building blocks shared by the frame graph:
//!
//! - [`arena`]: frame arenas and double buffering
//! - [`bounded`]: fixed-capacity vectors
//! - [`thread_pool`]: fork-join worker pool
//! - [`profiling`]: optional Tracy instrumentation

pub mod arena;
pub mod bounded;
pub mod profiling;
pub mod thread_pool;

pub use arena::{DoubleBuffered, FrameArena, Poolable};
pub use bounded::{BoundedVec, CapacityError};
pub use thread_pool::{Scope, ThreadPool};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Logs the crate version. Safe to call more than once.
pub fn init() {
    log::info!("RedLilium Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
