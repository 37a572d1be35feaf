//! # RedLilium Frame Graph
//!
//! Per-frame scheduler that turns declared GPU passes into recorded and
//! submitted work.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`FrameGraph`] - Declare passes, compile, execute, once per frame
//! - [`PassBuilder`] / [`PassContext`] - Setup-phase and execute-phase pass APIs
//! - [`ResourcePool`] - LRU pool of transient GPU resources reused across frames
//! - [`backend`] - Device traits plus a recording `dummy` device for tests
//!
//! Passes that produce nothing anyone reads are culled. Barriers and
//! graphics/async-compute synchronization are derived from the declared
//! reads and writes.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use redlilium_framegraph::backend::dummy::DummyDevice;
//! use redlilium_framegraph::types::{ClearValue, Format, ResourceDescriptor, ResourceUsage};
//! use redlilium_framegraph::{FrameGraph, FrameGraphConfig, ResourceHandle};
//!
//! let device = Arc::new(DummyDevice::new());
//! let mut graph = FrameGraph::new(device, FrameGraphConfig::default()).unwrap();
//! let mut previous = None;
//!
//! for _ in 0..3 {
//!     graph.add_pass(
//!         "gbuffer",
//!         |b| {
//!             let desc = ResourceDescriptor::texture_2d(64, 64, Format::Rgba8Unorm, ResourceUsage::RENDER_TARGET)
//!                 .with_clear(ClearValue::color(0.0, 0.0, 0.0, 1.0));
//!             let albedo = b.create(desc);
//!             b.blackboard().set("albedo", albedo);
//!         },
//!         |_, _| {},
//!     );
//!     graph.add_pass(
//!         "present",
//!         |b| {
//!             let albedo = *b.blackboard().get::<ResourceHandle>("albedo").unwrap();
//!             b.read(albedo);
//!             // Presentation is a side effect, so the pass keeps itself alive.
//!         },
//!         |_, _| {},
//!     );
//!
//!     graph.compile().unwrap();
//!     previous = Some(graph.execute(previous).unwrap());
//! }
//! assert_eq!(graph.pool().len(), 1);
//! ```

pub mod backend;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod resource;
pub mod types;

pub use backend::{CommandList, DeviceError, RawResource, RenderDevice, ViewHandle, WaitPoint};
pub use compiler::CompileStats;
pub use config::FrameGraphConfig;
pub use error::FrameGraphError;
pub use executor::ExecuteStats;
pub use graph::{
    AccessFlags, Blackboard, BlackboardKey, FrameGraph, PassBuilder, PassContext, PassHandle,
    RenderPass, ResourceAccess,
};
pub use resource::{ExternalResource, PassResource, PhysicalResource, ResourceHandle, ResourcePool};
pub use types::{
    ClearValue, CrossQueueSync, Format, QueueKind, ResourceDescriptor, ResourceState,
    ResourceUsage,
};

/// Frame graph library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the frame graph subsystem.
pub fn init() {
    redlilium_core::init();
    log::info!("RedLilium Frame Graph v{} initialized", VERSION);
}
