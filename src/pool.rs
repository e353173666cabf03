use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Condvar, Mutex},
    thread,
    time::{Duration, Instant},
};

use tracing::warn;

use crate::{
    task::{FnRunnable, Runnable},
    trace::Trace,
    worker::Worker,
    Error, Result,
};

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// A builder for constructing a customized thread pool.
#[derive(Debug)]
pub struct Builder {
    name: String,
    min_threads: usize,
    max_threads: usize,
    max_queue_size: usize,
    idle_timeout: Duration,
}

impl Builder {
    /// Create a builder for a pool with the given name.
    ///
    /// The name is attached to every worker thread spawned by the pool.
    ///
    /// # Panics
    ///
    /// Panics if the name contains null bytes (`\0`).
    pub fn new<T: Into<String>>(name: T) -> Self {
        let name = name.into();

        if name.as_bytes().contains(&0) {
            panic!("thread pool name must not contain null bytes");
        }

        Self {
            name,
            min_threads: 0,
            max_threads: num_cpus::get().max(1),
            max_queue_size: usize::MAX,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Set the number of permanent worker threads.
    ///
    /// Permanent workers are spawned when the pool is built and never time
    /// out. Defaults to 0.
    pub fn min_threads(mut self, min_threads: usize) -> Self {
        self.min_threads = min_threads;
        self
    }

    /// Set the maximum number of worker threads the pool may grow to.
    ///
    /// Defaults to the number of CPU cores on the current system.
    ///
    /// # Panics
    ///
    /// Panics if `max_threads` is 0.
    pub fn max_threads(mut self, max_threads: usize) -> Self {
        if max_threads == 0 {
            panic!("thread pool maximum size must be non-zero");
        }

        self.max_threads = max_threads;
        self
    }

    /// Set the maximum number of pending tasks allowed in the queue.
    ///
    /// Submissions beyond this limit fail with [`Error::QueueFull`]. If not
    /// set, no limit is enforced in practice.
    ///
    /// # Panics
    ///
    /// Panics if `max_queue_size` is 0.
    pub fn max_queue_size(mut self, max_queue_size: usize) -> Self {
        if max_queue_size == 0 {
            panic!("thread pool queue capacity must be non-zero");
        }

        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the timeout after which idle non-permanent workers exit.
    ///
    /// Defaults to 500 ms. This bounds only how long surplus workers stick
    /// around; it is not a task deadline.
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Create a thread pool according to the configuration set with this
    /// builder and spawn its permanent workers.
    ///
    /// # Panics
    ///
    /// Panics if `min_threads` is larger than `max_threads`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpawnFailed`] if a permanent worker thread could not
    /// be created; the partially built pool is torn down first.
    pub fn build(self) -> Result<ThreadPool> {
        if self.min_threads > self.max_threads {
            panic!("thread pool minimum size cannot be larger than maximum size");
        }

        let pool = ThreadPool {
            shared: Arc::new(Shared {
                name: self.name,
                min_threads: self.min_threads,
                max_threads: self.max_threads,
                max_queue_size: self.max_queue_size,
                idle_timeout: self.idle_timeout,
                state: Mutex::new(PoolState {
                    status: PoolStatus::Uninitialized,
                    queue: VecDeque::new(),
                    queue_size: 0,
                    num_threads: 0,
                    active_threads: 0,
                }),
                not_empty: Condvar::new(),
                idle_cond: Condvar::new(),
                no_threads_cond: Condvar::new(),
            }),
        };

        pool.init()?;

        Ok(pool)
    }
}

/// A queued thread pool with an elastically-sized worker population.
///
/// The pool keeps between `min_threads` permanent and `max_threads` total
/// workers. Extra workers are spawned when submissions outpace the idle
/// worker count and exit again after [`idle_timeout`](Builder::idle_timeout)
/// without work.
///
/// Dropping the pool shuts it down: queued-but-unstarted tasks are discarded,
/// tasks already running complete, and the drop blocks until every worker has
/// exited.
///
/// # Examples
///
/// ```
/// use taskpool::ThreadPool;
///
/// let pool = ThreadPool::builder("example").max_threads(2).build()?;
///
/// pool.submit_func(|| {
///     // some background work
/// })?;
///
/// pool.wait();
/// # Ok::<(), taskpool::Error>(())
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,
}

impl ThreadPool {
    /// Get a builder for creating a customized thread pool.
    #[inline]
    pub fn builder<T: Into<String>>(name: T) -> Builder {
        Builder::new(name)
    }

    /// Spawn the permanent workers and open the pool for submissions.
    fn init(&self) -> Result<()> {
        let mut state = self.shared.state.lock().unwrap();

        if state.status != PoolStatus::Uninitialized {
            return Err(Error::NotSupported(
                "the thread pool is already initialized".into(),
            ));
        }

        state.status = PoolStatus::Running;

        for _ in 0..self.shared.min_threads {
            if let Err(error) = self.shared.spawn_worker(&mut state) {
                drop(state);
                self.shutdown();
                return Err(error);
            }
        }

        Ok(())
    }

    /// Submit a runnable for execution.
    ///
    /// The submitting thread's current [`Trace`] is captured with the queue
    /// entry and installed on the worker for the duration of the run.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolNotRunning`] if the pool has been shut down.
    /// - [`Error::QueueFull`] if the queue is at capacity.
    /// - [`Error::SpawnFailed`] if a worker thread could not be created and
    ///   no worker exists to pick the task up. If at least one worker exists
    ///   a spawn failure is only logged and the submission succeeds.
    pub fn submit(&self, runnable: Arc<dyn Runnable>) -> Result<()> {
        let mut state = self.shared.state.lock().unwrap();

        match state.status {
            PoolStatus::Running => {}
            PoolStatus::Uninitialized => return Err(Error::Uninitialized),
            PoolStatus::ShutDown => return Err(Error::PoolNotRunning),
        }

        if state.queue_size == self.shared.max_queue_size {
            return Err(Error::QueueFull {
                items: state.queue_size,
            });
        }

        // Each inactive worker is assumed to grab one queued item. An active
        // worker may go idle between this check and the spawn; the surplus
        // worker is harmless, while a missing one would stall the queue.
        let inactive_threads = state.num_threads - state.active_threads;
        if state.queue_size + 1 > inactive_threads && state.num_threads < self.shared.max_threads {
            if let Err(error) = self.shared.spawn_worker(&mut state) {
                if state.num_threads == 0 {
                    return Err(error);
                }

                warn!(
                    pool = %self.shared.name,
                    error = %error,
                    "failed to spawn additional worker thread"
                );
            }
        }

        state.queue.push_back(QueueEntry {
            runnable,
            trace: Trace::current(),
        });
        state.queue_size += 1;

        self.shared.not_empty.notify_one();

        Ok(())
    }

    /// Submit a closure for execution. See [`submit`](ThreadPool::submit).
    pub fn submit_func<F>(&self, func: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Arc::new(FnRunnable::new(func)))
    }

    /// Block until the queue is empty and no task is executing.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock().unwrap();

        while !state.queue.is_empty() || state.active_threads > 0 {
            state = self.shared.idle_cond.wait(state).unwrap();
        }
    }

    /// Block until the pool is idle or the timeout elapses. Returns `true`
    /// if the pool became idle.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_deadline(Instant::now() + timeout)
    }

    /// Block until the pool is idle or the deadline passes. Returns `true`
    /// if the pool became idle.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        let mut state = self.shared.state.lock().unwrap();

        while !state.queue.is_empty() || state.active_threads > 0 {
            if let Some(timeout) = deadline.checked_duration_since(Instant::now()) {
                state = self.shared.idle_cond.wait_timeout(state, timeout).unwrap().0;
            } else {
                return false;
            }
        }

        true
    }

    /// Shut down the pool and block until every worker has exited.
    ///
    /// Tasks already being executed run to completion. Queued-but-unstarted
    /// tasks are discarded silently, releasing any trace handles they carry.
    /// Subsequent submissions fail with [`Error::PoolNotRunning`]. Calling
    /// `shutdown` more than once is harmless.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock().unwrap();

        state.status = PoolStatus::ShutDown;
        state.clear_queue();
        self.shared.not_empty.notify_all();

        while state.num_threads > 0 {
            state = self.shared.no_threads_cond.wait(state).unwrap();
        }
    }

    /// Get the number of worker threads currently alive.
    pub fn threads(&self) -> usize {
        self.shared.state.lock().unwrap().num_threads
    }

    /// Get the number of tasks currently being executed.
    pub fn active_tasks(&self) -> usize {
        self.shared.state.lock().unwrap().active_threads
    }

    /// Get the number of tasks queued for execution, but not yet started.
    pub fn queued_tasks(&self) -> usize {
        self.shared.state.lock().unwrap().queue_size
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock().unwrap();

        f.debug_struct("ThreadPool")
            .field("name", &self.shared.name)
            .field("threads", &state.num_threads)
            .field("active_tasks", &state.active_threads)
            .field("queued_tasks", &state.queue_size)
            .finish()
    }
}

/// Pool state shared by the owner and the worker threads.
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) min_threads: usize,
    pub(crate) max_threads: usize,
    pub(crate) max_queue_size: usize,
    pub(crate) idle_timeout: Duration,
    pub(crate) state: Mutex<PoolState>,
    pub(crate) not_empty: Condvar,
    pub(crate) idle_cond: Condvar,
    pub(crate) no_threads_cond: Condvar,
}

impl Shared {
    /// Spawn one worker thread. Must be called with the state lock held; the
    /// thread count is only bumped once the spawn succeeded.
    fn spawn_worker(self: &Arc<Self>, state: &mut PoolState) -> Result<()> {
        // Workers below the minimum count are permanent and never time out.
        let permanent = state.num_threads < self.min_threads;
        let worker = Worker::new(self.clone(), permanent);

        thread::Builder::new()
            .name(format!("{} [worker]", self.name))
            .spawn(move || worker.run())?;

        state.num_threads += 1;

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PoolStatus {
    Uninitialized,
    Running,
    ShutDown,
}

pub(crate) struct PoolState {
    pub(crate) status: PoolStatus,
    pub(crate) queue: VecDeque<QueueEntry>,
    pub(crate) queue_size: usize,
    pub(crate) num_threads: usize,
    pub(crate) active_threads: usize,
}

impl PoolState {
    /// Discard all queued entries. Dropping an entry drops the trace handle
    /// captured at submission time.
    fn clear_queue(&mut self) {
        self.queue.clear();
        self.queue_size = 0;
    }
}

pub(crate) struct QueueEntry {
    pub(crate) runnable: Arc<dyn Runnable>,
    pub(crate) trace: Option<Trace>,
}
