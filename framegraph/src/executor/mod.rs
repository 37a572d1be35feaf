//! Command recording and queue submission.
//!
//! Recording is a fork-join region: one task per live pass, each writing only
//! its own pass record and command list. Submission runs afterwards on the
//! calling thread, in pass order.

use redlilium_core::{FrameArena, ThreadPool};

use crate::backend::{BarrierBatch, CommandList, DeviceError, RenderDevice, WaitPoint};
use crate::config::FrameGraphConfig;
use crate::error::FrameGraphError;
use crate::graph::{AccessFlags, Blackboard, ClearRequest, PassContext, PassHandle, RenderPass};
use crate::resource::PassResource;
use crate::types::{ClearValue, QueueKind};

/// Counters of the last executed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteStats {
    /// Passes recorded and submitted, hand-off passes included.
    pub recorded_passes: usize,
    /// Culled passes, never recorded.
    pub skipped_passes: usize,
    /// Queue-level waits submitted.
    pub queue_waits: usize,
    /// Signals submitted, the frame's completion signal included.
    pub signals: usize,
    /// Execute calls, one per batch of consecutive same-queue passes.
    pub execute_calls: usize,
}

/// Owns the command lists and the recording thread pool.
pub(crate) struct Executor {
    /// Pre-allocated command lists, indexed by [`QueueKind::index`].
    lists: [Vec<Box<dyn CommandList>>; 2],
    pool: ThreadPool,
    parallel: bool,
}

/// A live pass paired with the command list it records into.
struct RecordJob<'a> {
    pass: &'a mut RenderPass,
    list: &'a mut dyn CommandList,
    result: Result<(), FrameGraphError>,
}

impl Executor {
    pub(crate) fn new(
        device: &dyn RenderDevice,
        config: &FrameGraphConfig,
    ) -> Result<Self, FrameGraphError> {
        let mut lists: [Vec<Box<dyn CommandList>>; 2] = [Vec::new(), Vec::new()];
        for queue in QueueKind::ALL {
            let queue_lists = &mut lists[queue.index()];
            queue_lists.reserve_exact(config.max_passes);
            for _ in 0..config.max_passes {
                let list = device
                    .create_command_list(queue)
                    .map_err(FrameGraphError::CommandListCreationFailed)?;
                queue_lists.push(list);
            }
        }

        Ok(Self {
            lists,
            pool: ThreadPool::new(config.worker_threads),
            parallel: config.parallel_recording,
        })
    }

    /// Record and submit one compiled frame.
    ///
    /// Returns the graphics-queue point at which the whole frame is complete.
    pub(crate) fn execute(
        &mut self,
        device: &dyn RenderDevice,
        passes: &mut FrameArena<RenderPass>,
        resources: &FrameArena<PassResource>,
        order: &[PassHandle],
        blackboard: &Blackboard,
        previous: Option<WaitPoint>,
    ) -> Result<(WaitPoint, ExecuteStats), FrameGraphError> {
        // Command lists are shared between frames.
        if let Some(point) = previous {
            device.wait_for(point);
        }

        for list in self.lists.iter_mut().flatten() {
            list.reset()
                .map_err(|error| FrameGraphError::RecordingFailed {
                    pass: String::from("<reset>"),
                    error,
                })?;
        }

        let mut stats = ExecuteStats::default();
        let mut jobs = assign(&mut self.lists, passes, order, &mut stats);

        {
            redlilium_core::profile_scope!("framegraph record");
            let resources = resources.as_slice();
            if self.parallel {
                self.pool.scope(|scope| {
                    for job in jobs.iter_mut() {
                        scope.push(move || job.record(resources, blackboard));
                    }
                });
            } else {
                for job in jobs.iter_mut() {
                    job.record(resources, blackboard);
                }
            }
        }

        for job in jobs.iter_mut() {
            std::mem::replace(&mut job.result, Ok(()))?;
        }

        redlilium_core::profile_scope!("framegraph submit");
        let mut submitter = Submitter::new(device, &mut stats);
        for job in &jobs {
            submitter.submit(job)?;
        }
        let point = submitter.finish()?;
        Ok((point, stats))
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("graphics_lists", &self.lists[QueueKind::Graphics.index()].len())
            .field("compute_lists", &self.lists[QueueKind::Compute.index()].len())
            .field("threads", &self.pool.num_threads())
            .field("parallel", &self.parallel)
            .finish()
    }
}

/// Pair every live pass with the next free list of its queue.
fn assign<'a>(
    lists: &'a mut [Vec<Box<dyn CommandList>>; 2],
    passes: &'a mut FrameArena<RenderPass>,
    order: &[PassHandle],
    stats: &mut ExecuteStats,
) -> Vec<RecordJob<'a>> {
    let mut slots: Vec<Option<&'a mut RenderPass>> = passes.iter_mut().map(Some).collect();
    let [graphics, compute] = lists;
    let mut free = [graphics.iter_mut(), compute.iter_mut()];

    let mut jobs = Vec::with_capacity(order.len());
    for handle in order {
        let Some(pass) = slots[handle.index()].take() else {
            continue;
        };
        if pass.is_culled() {
            log::trace!("Skipping culled pass '{}'", pass.tag);
            stats.skipped_passes += 1;
            continue;
        }
        let Some(list) = free[pass.queue.index()].next() else {
            panic!(
                "No free {:?} command list for pass '{}'",
                pass.queue, pass.tag
            );
        };
        jobs.push(RecordJob {
            pass,
            list: list.as_mut(),
            result: Ok(()),
        });
    }
    stats.recorded_passes = jobs.len();
    jobs
}

impl RecordJob<'_> {
    fn record(&mut self, resources: &[PassResource], blackboard: &Blackboard) {
        redlilium_core::profile_scope_dynamic!(self.pass.tag.as_str());
        let result = record_pass(&mut *self.pass, &mut *self.list, resources, blackboard);
        self.result = result.map_err(|error| FrameGraphError::RecordingFailed {
            pass: self.pass.tag.clone(),
            error,
        });
    }
}

fn record_pass(
    pass: &mut RenderPass,
    list: &mut dyn CommandList,
    resources: &[PassResource],
    blackboard: &Blackboard,
) -> Result<(), DeviceError> {
    list.debug_marker(&pass.tag);

    let mut batch = BarrierBatch::new();
    for access in pass.accesses.iter() {
        let raw = resources[access.resource.index()].raw();
        if access.flags.contains(AccessFlags::BARRIER) {
            batch.add_transition(raw, access.before, access.after);
        } else if access.flags.contains(AccessFlags::UAV_BARRIER) {
            batch.add_unordered_access(raw);
        }
    }
    if !batch.is_empty() {
        list.barriers(batch.as_slice());
    }

    for clear in pass.clears.iter() {
        record_clear(list, &resources[clear.resource.index()], clear);
    }

    if let Some(callbacks) = pass.callbacks.take() {
        let mut context = PassContext::new(pass, resources, blackboard, &mut *list);
        callbacks.execute(&mut context);
    }

    list.close()
}

fn record_clear(list: &mut dyn CommandList, resource: &PassResource, clear: &ClearRequest) {
    let views = resource.views();
    match clear.value {
        ClearValue::None => {}
        ClearValue::Color { r, g, b, a } => {
            let color = [r, g, b, a];
            if !views.render_targets.is_empty() {
                for &view in &views.render_targets {
                    list.clear_render_target(view, color);
                }
            } else if let Some(view) = views.unordered_access {
                list.clear_unordered_access(view, color);
            } else {
                log::warn!("No clearable view for {:?}", clear.resource);
            }
        }
        ClearValue::Depth(_) | ClearValue::Stencil(_) | ClearValue::DepthStencil { .. } => {
            let (depth, stencil) = match clear.value {
                ClearValue::Depth(depth) => (Some(depth), None),
                ClearValue::Stencil(stencil) => (None, Some(stencil)),
                ClearValue::DepthStencil { depth, stencil } => (Some(depth), Some(stencil)),
                _ => (None, None),
            };
            if views.depth_stencils.is_empty() {
                log::warn!("No depth-stencil view for {:?}", clear.resource);
            }
            for &view in &views.depth_stencils {
                list.clear_depth_stencil(view, depth, stencil);
            }
        }
    }
}

/// Batches recorded lists per queue and inserts cross-queue waits.
struct Submitter<'a, 'd> {
    device: &'d dyn RenderDevice,
    stats: &'a mut ExecuteStats,
    batch: Vec<&'a dyn CommandList>,
    batch_queue: QueueKind,
    /// Work executed on a queue since its last signal.
    unsignalled: [bool; 2],
    last_signal: [Option<WaitPoint>; 2],
    /// Latest value of the other queue's timeline each queue has waited on.
    waited: [u64; 2],
}

impl<'a, 'd> Submitter<'a, 'd> {
    fn new(device: &'d dyn RenderDevice, stats: &'a mut ExecuteStats) -> Self {
        Self {
            device,
            stats,
            batch: Vec::new(),
            batch_queue: QueueKind::Graphics,
            unsignalled: [false; 2],
            last_signal: [None; 2],
            waited: [0; 2],
        }
    }

    fn submit(&mut self, job: &'a RecordJob<'_>) -> Result<(), FrameGraphError> {
        let queue = job.pass.queue;
        if let Some(other) = job.pass.sync.wait_queue() {
            self.flush()?;
            self.wait_on(queue, other)?;
        }
        if queue != self.batch_queue {
            self.flush()?;
            self.batch_queue = queue;
        }
        self.batch.push(&*job.list);
        Ok(())
    }

    /// Make `queue` wait for everything submitted to `other` so far.
    fn wait_on(&mut self, queue: QueueKind, other: QueueKind) -> Result<(), FrameGraphError> {
        if self.unsignalled[other.index()] {
            self.signal(other)?;
        }
        let Some(point) = self.last_signal[other.index()] else {
            return Ok(());
        };
        if self.waited[queue.index()] >= point.value {
            return Ok(());
        }
        self.device
            .wait(queue, point)
            .map_err(FrameGraphError::SubmissionFailed)?;
        self.waited[queue.index()] = point.value;
        self.stats.queue_waits += 1;
        log::trace!("{:?} queue waits on {:?}", queue, point);
        Ok(())
    }

    fn signal(&mut self, queue: QueueKind) -> Result<WaitPoint, FrameGraphError> {
        let point = self
            .device
            .signal(queue)
            .map_err(FrameGraphError::SubmissionFailed)?;
        self.last_signal[queue.index()] = Some(point);
        self.unsignalled[queue.index()] = false;
        self.stats.signals += 1;
        Ok(point)
    }

    fn flush(&mut self) -> Result<(), FrameGraphError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.device
            .execute(self.batch_queue, &self.batch)
            .map_err(FrameGraphError::SubmissionFailed)?;
        self.unsignalled[self.batch_queue.index()] = true;
        self.stats.execute_calls += 1;
        self.batch.clear();
        Ok(())
    }

    /// Join outstanding compute work into graphics and signal the frame's end.
    fn finish(mut self) -> Result<WaitPoint, FrameGraphError> {
        self.flush()?;
        self.wait_on(QueueKind::Graphics, QueueKind::Compute)?;
        self.signal(QueueKind::Graphics)
    }
}
