//! Fork-join thread pool for per-frame parallel work.

#[cfg(not(target_arch = "wasm32"))]
use parking_lot::Mutex;

type Task<'env> = Box<dyn FnOnce() + Send + 'env>;

/// A fork-join pool that runs a batch of tasks on a bounded number of
/// worker threads.
///
/// Tasks are collected with [`Scope::push`] inside [`ThreadPool::scope`];
/// returning from `scope` is the join point. Workers are scoped threads, so
/// tasks can borrow from the caller's stack.
///
/// On WASM, tasks run sequentially on the calling thread.
///
/// # Example
///
/// ```
/// use redlilium_core::thread_pool::ThreadPool;
///
/// let workers = ThreadPool::new(4);
///
/// let mut recorded = [0usize; 6];
/// workers.scope(|s| {
///     for (pass, out) in recorded.iter_mut().enumerate() {
///         s.push(move || *out = pass * pass);
///     }
/// });
/// assert_eq!(recorded, [0, 1, 4, 9, 16, 25]);
/// ```
#[derive(Debug)]
pub struct ThreadPool {
    num_threads: usize,
}

impl ThreadPool {
    /// Creates a pool that uses at most `num_threads` workers (minimum one).
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    /// Creates a pool sized to the number of available CPU cores.
    pub fn default_threads() -> Self {
        Self::new(std::thread::available_parallelism().map_or(1, |n| n.get()))
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Collects tasks pushed by `f`, runs them, and waits for all of them.
    ///
    /// A panic inside a task is propagated to the caller after every worker
    /// has stopped.
    pub fn scope<'env, F>(&self, f: F)
    where
        F: FnOnce(&mut Scope<'env>),
    {
        let mut scope = Scope { tasks: Vec::new() };
        f(&mut scope);
        self.run(scope.tasks);
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn run(&self, tasks: Vec<Task<'_>>) {
        let workers = self.num_threads.min(tasks.len());
        if workers <= 1 {
            tasks.into_iter().for_each(|task| task());
            return;
        }

        log::trace!(
            "ThreadPool: running {} tasks on {} workers",
            tasks.len(),
            workers
        );

        // Tasks are taken front to back so submission order is roughly kept.
        let queue = Mutex::new(tasks.into_iter());
        std::thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| {
                    loop {
                        let next = queue.lock().next();
                        match next {
                            Some(task) => task(),
                            None => break,
                        }
                    }
                });
            }
        });
    }

    #[cfg(target_arch = "wasm32")]
    fn run(&self, tasks: Vec<Task<'_>>) {
        tasks.into_iter().for_each(|task| task());
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::default_threads()
    }
}

/// Task collector handed to the closure passed to [`ThreadPool::scope`].
pub struct Scope<'env> {
    tasks: Vec<Task<'env>>,
}

impl<'env> Scope<'env> {
    /// Queues a task. It starts running once the scope closure returns.
    pub fn push<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'env,
    {
        self.tasks.push(Box::new(f));
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
