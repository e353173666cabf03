//! A futures-returning facade over a thread pool.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tracing::error;

use crate::{
    error::BoxError,
    pool::ThreadPool,
    task::{FutureTask, Task},
    Result,
};

type RunFn = Box<dyn FnOnce() -> std::result::Result<(), BoxError> + Send + 'static>;
type AbortFn = Box<dyn Fn() -> bool + Send + Sync + 'static>;

/// An executor that submits tasks to an owned [`ThreadPool`] and hands back
/// [`FutureTask`] handles for observing their completion.
///
/// # Examples
///
/// ```
/// use taskpool::TaskExecutor;
///
/// let executor = TaskExecutor::create("demo", 0, 2)?;
///
/// let future = executor.submit_run(|| {
///     // some fallible background work
///     Ok(())
/// })?;
///
/// future.wait();
/// assert!(future.is_done());
/// # Ok::<(), taskpool::Error>(())
/// ```
pub struct TaskExecutor {
    pool: ThreadPool,
}

impl TaskExecutor {
    /// Wrap an existing thread pool.
    pub fn new(pool: ThreadPool) -> Self {
        Self { pool }
    }

    /// Build a pool with the given name and thread bounds and return an
    /// executor that owns it.
    pub fn create<T: Into<String>>(
        name: T,
        min_threads: usize,
        max_threads: usize,
    ) -> Result<Self> {
        let name = name.into();

        match ThreadPool::builder(name.clone())
            .min_threads(min_threads)
            .max_threads(max_threads)
            .build()
        {
            Ok(pool) => Ok(Self::new(pool)),
            Err(e) => {
                error!(
                    executor = %name,
                    error = %e,
                    "unable to initialize the executor thread pool"
                );
                Err(e)
            }
        }
    }

    /// Build an executor with no permanent workers. Equivalent to
    /// [`create`](TaskExecutor::create) with `min_threads = 0`.
    pub fn create_max<T: Into<String>>(name: T, max_threads: usize) -> Result<Self> {
        Self::create(name, 0, max_threads)
    }

    /// Submit a task and return a future handle observing its completion.
    ///
    /// Callers that do not care about completion may drop the returned
    /// future; the task still runs.
    pub fn submit(&self, task: Arc<dyn Task>) -> Result<Arc<FutureTask>> {
        let future = Arc::new(FutureTask::new(task));

        self.pool.submit(future.clone())?;

        Ok(future)
    }

    /// Submit a fallible closure as a task. The resulting task refuses
    /// aborts.
    pub fn submit_run<F>(&self, run: F) -> Result<Arc<FutureTask>>
    where
        F: FnOnce() -> std::result::Result<(), BoxError> + Send + 'static,
    {
        self.submit(Arc::new(BoundTask {
            run: Mutex::new(Some(Box::new(run))),
            abort: None,
        }))
    }

    /// Submit a fallible closure together with an abort callback consulted
    /// by [`FutureTask::abort`].
    pub fn submit_abortable<F, A>(&self, run: F, abort: A) -> Result<Arc<FutureTask>>
    where
        F: FnOnce() -> std::result::Result<(), BoxError> + Send + 'static,
        A: Fn() -> bool + Send + Sync + 'static,
    {
        self.submit(Arc::new(BoundTask {
            run: Mutex::new(Some(Box::new(run))),
            abort: Some(Box::new(abort)),
        }))
    }

    /// Enqueue an already constructed future task, for callers that need to
    /// hold the handle before submission.
    pub fn submit_future_task(&self, future: &Arc<FutureTask>) -> Result<()> {
        self.pool.submit(future.clone())
    }

    /// Block until the pool is idle. See [`ThreadPool::wait`].
    pub fn wait(&self) {
        self.pool.wait();
    }

    /// Block until the pool is idle or the timeout elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.pool.wait_timeout(timeout)
    }

    /// Block until the pool is idle or the deadline passes.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        self.pool.wait_deadline(deadline)
    }

    /// Shut down the underlying pool. See [`ThreadPool::shutdown`].
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Access the underlying pool, for introspection.
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }
}

/// A [`Task`] bound to a pair of closures.
struct BoundTask {
    run: Mutex<Option<RunFn>>,
    abort: Option<AbortFn>,
}

impl Task for BoundTask {
    fn run(&self) -> std::result::Result<(), BoxError> {
        match self.run.lock().unwrap().take() {
            Some(run) => run(),
            None => Ok(()),
        }
    }

    fn abort(&self) -> bool {
        match &self.abort {
            Some(abort) => abort(),
            None => false,
        }
    }
}
