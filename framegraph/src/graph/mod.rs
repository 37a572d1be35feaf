//! The per-frame pass graph.
//!
//! # Frame lifecycle
//!
//! ```text
//!  add_pass × N ──► compile ──► execute ──► (next frame)
//!   declare          setup        record (parallel)
//!                    cull         submit (two queues)
//!                    barriers     retire frame records
//! ```
//!
//! Every frame's graph is declared, compiled, executed and discarded anew.
//! Only the resource pool, the blackboard and the previous frame's records
//! survive a frame boundary.

mod blackboard;
mod builder;
mod context;
mod pass;

use std::sync::Arc;

use redlilium_core::{DoubleBuffered, FrameArena, Poolable};

pub use blackboard::{Blackboard, BlackboardKey};
pub use builder::PassBuilder;
pub use context::PassContext;
pub(crate) use pass::ClosurePass;
pub use pass::{AccessFlags, ClearRequest, PassHandle, PassKind, RenderPass, ResourceAccess};

use crate::backend::{RenderDevice, WaitPoint};
use crate::compiler::{self, CompileStats, FinalStates};
use crate::config::FrameGraphConfig;
use crate::error::FrameGraphError;
use crate::executor::{ExecuteStats, Executor};
use crate::resource::{PassResource, ResourceHandle, ResourcePool};

/// Pass and resource records of one frame.
pub(crate) struct FrameRecords {
    pub(crate) passes: FrameArena<RenderPass>,
    pub(crate) resources: FrameArena<PassResource>,
}

impl FrameRecords {
    fn with_capacity(max_passes: usize, max_resources: usize) -> Self {
        Self {
            passes: FrameArena::with_capacity(max_passes),
            resources: FrameArena::with_capacity(max_resources),
        }
    }
}

impl Poolable for FrameRecords {
    fn new_empty() -> Self {
        Self::with_capacity(0, 0)
    }

    fn reset(&mut self) {
        self.passes.reset();
        self.resources.reset();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Recording,
    Compiled,
}

/// Per-frame scheduler of GPU passes.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use redlilium_framegraph::backend::dummy::DummyDevice;
/// use redlilium_framegraph::types::{Format, ResourceDescriptor, ResourceUsage};
/// use redlilium_framegraph::{FrameGraph, FrameGraphConfig};
///
/// let device = Arc::new(DummyDevice::new());
/// let mut graph = FrameGraph::new(device, FrameGraphConfig::default()).unwrap();
///
/// graph.add_pass(
///     "scene",
///     |b| {
///         let desc = ResourceDescriptor::texture_2d(256, 256, Format::Rgba8Unorm, ResourceUsage::RENDER_TARGET);
///         let color = b.create(desc);
///         b.write(color)
///     },
///     |color, ctx| {
///         let _view = ctx.render_target_view(*color, 0);
///     },
/// );
///
/// let stats = graph.compile().unwrap();
/// assert_eq!(stats.culled_passes, 1); // nothing reads the target
/// let done = graph.execute(None).unwrap();
/// # let _ = done;
/// ```
pub struct FrameGraph {
    device: Arc<dyn RenderDevice>,
    config: FrameGraphConfig,
    records: DoubleBuffered<FrameRecords>,
    order: Vec<PassHandle>,
    pool: ResourcePool,
    blackboard: Blackboard,
    executor: Executor,
    frame: u32,
    phase: Phase,
    /// Resource states the compiled frame ends in, committed once it is submitted.
    final_states: FinalStates,
    compile_stats: CompileStats,
    execute_stats: ExecuteStats,
}

impl FrameGraph {
    /// Create a graph, pre-allocating `config.max_passes` command lists per queue.
    pub fn new(
        device: Arc<dyn RenderDevice>,
        config: FrameGraphConfig,
    ) -> Result<Self, FrameGraphError> {
        config.validate()?;
        let executor = Executor::new(device.as_ref(), &config)?;
        let pool = ResourcePool::new(Arc::clone(&device), config.pool_capacity);
        let records = DoubleBuffered::from_fn(|| {
            FrameRecords::with_capacity(config.max_passes, config.max_resources)
        });

        log::info!(
            "Frame graph created on {} ({} passes, {} resources, pool of {}, {} recording threads)",
            device.name(),
            config.max_passes,
            config.max_resources,
            config.pool_capacity,
            if config.parallel_recording {
                config.worker_threads
            } else {
                1
            }
        );

        Ok(Self {
            device,
            order: Vec::with_capacity(config.max_passes),
            config,
            records,
            pool,
            blackboard: Blackboard::new(),
            executor,
            frame: 0,
            phase: Phase::Recording,
            final_states: Vec::new(),
            compile_stats: CompileStats::default(),
            execute_stats: ExecuteStats::default(),
        })
    }

    /// Declare a pass.
    ///
    /// `setup` runs during [`compile`](Self::compile) and declares the pass's
    /// resources; its return value is handed to `execute`, which runs during
    /// [`execute`](Self::execute) unless the pass is culled.
    ///
    /// # Panics
    ///
    /// Panics if the pass capacity is exhausted or the frame is already
    /// compiled.
    pub fn add_pass<T, S, E>(&mut self, tag: impl Into<String>, setup: S, execute: E) -> PassHandle
    where
        T: Send + 'static,
        S: FnOnce(&mut PassBuilder<'_>) -> T + Send + 'static,
        E: FnOnce(&T, &mut PassContext<'_>) + Send + 'static,
    {
        let tag = tag.into();
        assert!(
            self.phase == Phase::Recording,
            "Cannot add pass '{tag}' after the frame was compiled"
        );

        let pass = RenderPass::new(
            tag,
            Box::new(ClosurePass::<T, S, E>::new(setup, execute)),
            self.config.max_resource_usages,
            self.config.max_clears,
        );
        let passes = &mut self.records.active_mut().passes;
        let index = match passes.alloc(pass) {
            Ok(index) => index,
            Err(err) => panic!("Frame graph pass capacity exceeded: {err}"),
        };
        let handle = PassHandle::new(index);
        self.order.push(handle);
        handle
    }

    /// Run setup, culling and barrier resolution for the declared passes.
    ///
    /// On a device error the frame is discarded and the graph is ready for
    /// new passes.
    ///
    /// # Panics
    ///
    /// Panics if called twice for one frame.
    pub fn compile(&mut self) -> Result<CompileStats, FrameGraphError> {
        redlilium_core::profile_function!();
        assert!(
            self.phase == Phase::Recording,
            "Frame {} is already compiled",
            self.frame
        );

        let records = self.records.active_mut();
        let declared_passes = records.passes.len();

        if let Err(err) = compiler::run_setup(
            &mut records.passes,
            &mut records.resources,
            &mut self.pool,
            &mut self.blackboard,
            self.frame,
        ) {
            log::error!("Discarding frame {}: {}", self.frame, err);
            self.order.clear();
            self.records.reset_active();
            return Err(err);
        }

        let culled_passes = compiler::cull(
            records.passes.as_mut_slice(),
            records.resources.as_mut_slice(),
        );
        let barriers = compiler::resolve_barriers(
            &mut records.passes,
            &mut self.order,
            records.resources.as_slice(),
            self.config.max_resource_usages,
        );

        self.compile_stats = CompileStats {
            declared_passes,
            culled_passes,
            synthesized_passes: barriers.synthesized_passes,
            resources: records.resources.len(),
            transitions: barriers.transitions,
            uav_barriers: barriers.uav_barriers,
            cross_queue_waits: barriers.cross_queue_waits,
        };
        self.final_states = barriers.final_states;

        if log::log_enabled!(log::Level::Debug) {
            for &handle in &self.order {
                let pass = &records.passes[handle.index()];
                log::debug!(
                    "  {:<24} {:?}{}{} refs={} barriers={} sync={:?}",
                    pass.tag,
                    pass.queue,
                    if pass.is_culled() { " culled" } else { "" },
                    if pass.is_synthesized() { " synthesized" } else { "" },
                    pass.ref_count,
                    pass.barrier_count(),
                    pass.sync
                );
            }
        }
        log::trace!("Frame {} compiled: {:?}", self.frame, self.compile_stats);
        redlilium_core::profile_plot!("framegraph passes", declared_passes);

        self.phase = Phase::Compiled;
        Ok(self.compile_stats)
    }

    /// Record and submit the compiled frame, then advance to the next one.
    ///
    /// `previous` is the completion point returned by the previous call; it is
    /// waited on before anything is submitted. Returns this frame's completion
    /// point on the graphics queue.
    ///
    /// The frame's records are retired even if recording or submission fails.
    /// Resource states are only carried into the next frame after a
    /// successful submission.
    ///
    /// # Panics
    ///
    /// Panics if the frame has not been compiled.
    pub fn execute(&mut self, previous: Option<WaitPoint>) -> Result<WaitPoint, FrameGraphError> {
        redlilium_core::profile_function!();
        assert!(
            self.phase == Phase::Compiled,
            "Frame {} must be compiled before it is executed",
            self.frame
        );

        let records = self.records.active_mut();
        let result = self.executor.execute(
            self.device.as_ref(),
            &mut records.passes,
            &records.resources,
            &self.order,
            &self.blackboard,
            previous,
        );

        if result.is_ok() {
            compiler::commit_states(&mut self.final_states);
        } else {
            log::warn!(
                "Frame {} failed to execute, keeping resource states from the last submitted frame",
                self.frame
            );
            self.final_states.clear();
        }
        self.end_frame();
        let (point, stats) = result?;
        self.execute_stats = stats;
        log::trace!("Frame executed: {:?}, completion {:?}", stats, point);
        Ok(point)
    }

    fn end_frame(&mut self) {
        self.order.clear();
        self.records.flip();
        self.pool.frame_sync();
        self.frame = self.frame.wrapping_add(1);
        self.phase = Phase::Recording;
        redlilium_core::frame_mark!();
    }

    /// Release every pooled resource. Wait on the last completion point first.
    pub fn shutdown(&mut self) {
        log::info!("Frame graph shutting down after {} frames", self.frame);
        self.order.clear();
        self.final_states.clear();
        self.records.reset_active();
        self.records.flip();
        self.pool.clear();
        self.blackboard.clear();
        self.phase = Phase::Recording;
    }

    /// Passes of the current frame in submission order, including hand-off
    /// passes once compiled.
    pub fn passes(&self) -> impl Iterator<Item = (PassHandle, &RenderPass)> {
        let passes = &self.records.active().passes;
        self.order.iter().map(move |&h| (h, &passes[h.index()]))
    }

    pub fn pass(&self, handle: PassHandle) -> &RenderPass {
        &self.records.active().passes[handle.index()]
    }

    /// Resource record of the current frame.
    ///
    /// # Panics
    ///
    /// Panics for null handles and handles from another frame.
    pub fn resource(&self, handle: ResourceHandle) -> &PassResource {
        assert!(
            !handle.is_null() && handle.frame() == self.frame,
            "{handle:?} is not a resource of frame {}",
            self.frame
        );
        &self.records.active().resources[handle.index()]
    }

    pub fn device(&self) -> &Arc<dyn RenderDevice> {
        &self.device
    }

    pub fn config(&self) -> &FrameGraphConfig {
        &self.config
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    /// Index of the frame being declared.
    pub fn frame_index(&self) -> u32 {
        self.frame
    }

    pub fn is_compiled(&self) -> bool {
        self.phase == Phase::Compiled
    }

    /// Statistics of the last successful compile.
    pub fn compile_stats(&self) -> &CompileStats {
        &self.compile_stats
    }

    /// Statistics of the last successful execute.
    pub fn execute_stats(&self) -> &ExecuteStats {
        &self.execute_stats
    }
}

impl Drop for FrameGraph {
    fn drop(&mut self) {
        self.pool.clear();
    }
}

impl std::fmt::Debug for FrameGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGraph")
            .field("device", &self.device.name())
            .field("frame", &self.frame)
            .field("phase", &self.phase)
            .field("passes", &self.order.len())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(FrameGraph: Send);
static_assertions::assert_impl_all!(RenderPass: Send);
static_assertions::assert_impl_all!(PassResource: Send, Sync);
