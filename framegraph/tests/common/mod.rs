//! Shared helpers for frame graph integration tests.

use std::sync::Arc;

use redlilium_framegraph::backend::dummy::{DummyDevice, QueueOp, RecordedCommand};
use redlilium_framegraph::types::{Format, ResourceDescriptor, ResourceUsage};
use redlilium_framegraph::{CompileStats, FrameGraph, FrameGraphConfig, QueueKind, WaitPoint};

/// How passes are recorded during execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recording {
    Sequential,
    Parallel,
}

impl Recording {
    pub fn config(self) -> FrameGraphConfig {
        FrameGraphConfig::default()
            .with_worker_threads(4)
            .with_parallel_recording(self == Recording::Parallel)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A dummy device plus a graph running on it.
pub struct TestContext {
    pub device: Arc<DummyDevice>,
    pub graph: FrameGraph,
    pub previous: Option<WaitPoint>,
}

impl TestContext {
    pub fn new(recording: Recording) -> Self {
        Self::with_config(recording.config())
    }

    pub fn with_config(config: FrameGraphConfig) -> Self {
        init_logging();
        let device = Arc::new(DummyDevice::new());
        let graph = FrameGraph::new(device.clone(), config).expect("graph creation failed");
        Self {
            device,
            graph,
            previous: None,
        }
    }

    /// Compile the declared passes and keep the stats.
    pub fn compile(&mut self) -> CompileStats {
        self.graph.compile().expect("compile failed")
    }

    /// Execute a compiled frame, chaining wait points between frames.
    pub fn execute(&mut self) -> WaitPoint {
        let point = self.graph.execute(self.previous).expect("execute failed");
        self.previous = Some(point);
        point
    }

    pub fn run_frame(&mut self) -> CompileStats {
        let stats = self.compile();
        self.execute();
        stats
    }

    /// Lists of every execute call on `queue`, flattened in submission order.
    pub fn executed_lists(&self, queue: QueueKind) -> Vec<Vec<RecordedCommand>> {
        self.device
            .queue_ops()
            .into_iter()
            .filter_map(|op| match op {
                QueueOp::Execute { queue: q, lists } if q == queue => Some(lists),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

pub fn color_target(size: u32) -> ResourceDescriptor {
    ResourceDescriptor::texture_2d(size, size, Format::Rgba8Unorm, ResourceUsage::RENDER_TARGET)
        .with_label(format!("color {size}"))
}

pub fn depth_target(size: u32) -> ResourceDescriptor {
    ResourceDescriptor::texture_2d(
        size,
        size,
        Format::Depth32Float,
        ResourceUsage::DEPTH_STENCIL,
    )
    .with_label("depth")
}

pub fn storage_buffer(elements: u32) -> ResourceDescriptor {
    ResourceDescriptor::buffer(elements, 16, ResourceUsage::UNORDERED_ACCESS).with_label("storage")
}
