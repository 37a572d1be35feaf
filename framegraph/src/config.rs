//! Frame graph configuration.

use crate::error::FrameGraphError;

/// Fixed capacities and execution options, set once at graph construction.
///
/// Capacities are hard limits: exceeding one while declaring a frame panics.
///
/// # Example
///
/// ```
/// use redlilium_framegraph::FrameGraphConfig;
///
/// let config = FrameGraphConfig::default()
///     .with_max_passes(32)
///     .with_pool_capacity(16)
///     .with_parallel_recording(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGraphConfig {
    /// Passes per frame, including compiler-inserted queue hand-off passes.
    /// Also the number of command lists created per queue.
    pub max_passes: usize,
    /// Resource records (created and imported) per frame.
    pub max_resources: usize,
    /// Resource usages per pass.
    pub max_resource_usages: usize,
    /// Clear requests per pass.
    pub max_clears: usize,
    /// Physical resources kept alive by the pool across frames.
    pub pool_capacity: usize,
    /// Worker threads used to record passes.
    pub worker_threads: usize,
    /// Record passes on the worker pool instead of the calling thread.
    pub parallel_recording: bool,
}

impl Default for FrameGraphConfig {
    fn default() -> Self {
        Self {
            max_passes: 64,
            max_resources: 256,
            max_resource_usages: 16,
            max_clears: 8,
            pool_capacity: 64,
            worker_threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            parallel_recording: true,
        }
    }
}

impl FrameGraphConfig {
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn with_max_resources(mut self, max_resources: usize) -> Self {
        self.max_resources = max_resources;
        self
    }

    pub fn with_max_resource_usages(mut self, max_resource_usages: usize) -> Self {
        self.max_resource_usages = max_resource_usages;
        self
    }

    pub fn with_max_clears(mut self, max_clears: usize) -> Self {
        self.max_clears = max_clears;
        self
    }

    pub fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = pool_capacity;
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_parallel_recording(mut self, parallel_recording: bool) -> Self {
        self.parallel_recording = parallel_recording;
        self
    }

    /// Check that every capacity is usable.
    pub fn validate(&self) -> Result<(), FrameGraphError> {
        let checks = [
            (self.max_passes, "max_passes"),
            (self.max_resources, "max_resources"),
            (self.max_resource_usages, "max_resource_usages"),
            (self.pool_capacity, "pool_capacity"),
            (self.worker_threads, "worker_threads"),
        ];
        for (value, name) in checks {
            if value == 0 {
                return Err(FrameGraphError::InvalidConfig(format!(
                    "{name} must be non-zero"
                )));
            }
        }
        if self.max_passes > u32::MAX as usize || self.max_resources >= u32::MAX as usize {
            return Err(FrameGraphError::InvalidConfig(format!(
                "capacities must fit in 32 bits (max_passes {}, max_resources {})",
                self.max_passes, self.max_resources
            )));
        }
        Ok(())
    }
}
