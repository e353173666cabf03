//! Task and runnable traits, plus the future wrapper that makes a task's
//! completion observable.

use std::{
    any::Any,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::{error::BoxError, latch::CountDownLatch, Error};

/// A unit of work that reports success or failure and supports cooperative
/// cancellation.
///
/// Both the submitter and the pool hold references to a task, so `run` takes
/// `&self`; implementations that consume state should keep it behind interior
/// mutability.
pub trait Task: Send + Sync {
    /// Perform the work once.
    fn run(&self) -> Result<(), BoxError>;

    /// Request early cancellation. Returns `true` if the task accepted the
    /// abort and its `run` can be skipped or cut short.
    ///
    /// The default implementation refuses all aborts.
    fn abort(&self) -> bool {
        false
    }
}

/// A void-returning unit of work, used directly by the thread pool when no
/// completion handle is needed.
pub trait Runnable: Send + Sync {
    /// Perform the work once.
    fn run(&self);
}

/// Adapts a zero-argument closure into a [`Runnable`].
///
/// The closure is taken out of its slot on the first `run`; a second `run`
/// is a no-op.
pub(crate) struct FnRunnable {
    func: Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>,
}

impl FnRunnable {
    pub(crate) fn new<F>(func: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            func: Mutex::new(Some(Box::new(func))),
        }
    }
}

impl Runnable for FnRunnable {
    fn run(&self) {
        let func = self.func.lock().unwrap().take();

        if let Some(func) = func {
            func();
        }
    }
}

/// A completion callback that can be registered on a [`FutureTask`].
///
/// Callbacks may be invoked from the worker thread that ran the task or, for
/// registrations made after completion, from the registering thread. Callers
/// must not assume which.
pub trait FutureCallback: Send + Sync {
    /// The task ran to completion successfully.
    fn on_success(&self);

    /// The task failed or was aborted.
    fn on_failure(&self, error: &Error);
}

/// Lifecycle state of a [`FutureTask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Queued, not yet picked up by a worker.
    Pending,
    /// A worker is executing the task.
    Running,
    /// The task ran to completion. Terminal.
    Finished,
    /// The task accepted an abort request. Terminal.
    Aborted,
}

/// An observable handle around a [`Task`].
///
/// A future task is submitted to a thread pool like any other runnable, but
/// additionally tracks a lifecycle state, fires registered listeners on
/// completion, and releases a completion latch that
/// [`wait`](FutureTask::wait) blocks on.
///
/// # Examples
///
/// ```
/// use taskpool::{TaskExecutor, Result};
///
/// # fn main() -> Result<()> {
/// let executor = TaskExecutor::create("demo", 0, 2)?;
///
/// let future = executor.submit_run(|| Ok(()))?;
/// future.wait();
///
/// assert!(future.is_done());
/// assert!(!future.is_aborted());
/// # Ok(())
/// # }
/// ```
pub struct FutureTask {
    task: Arc<dyn Task>,
    inner: Mutex<Inner>,
    latch: CountDownLatch,
}

struct Inner {
    state: TaskState,
    result: Option<Result<(), Error>>,
    listeners: Vec<Arc<dyn FutureCallback>>,
}

impl FutureTask {
    /// Wrap a task in a new future with state [`TaskState::Pending`].
    pub fn new(task: Arc<dyn Task>) -> Self {
        Self {
            task,
            inner: Mutex::new(Inner {
                state: TaskState::Pending,
                result: None,
                listeners: Vec::new(),
            }),
            latch: CountDownLatch::new(1),
        }
    }

    /// Request cancellation of the task.
    ///
    /// Returns `false` if the task already finished. Otherwise the abort is
    /// delegated to the inner task; if it accepts, the future moves to
    /// [`TaskState::Aborted`] and `true` is returned.
    ///
    /// Aborting does not release the completion latch. If the task was still
    /// queued, the worker that eventually dequeues it observes the aborted
    /// state, notifies listeners, and releases the latch without invoking the
    /// task; if the task was already running, the worker's normal completion
    /// path does so.
    pub fn abort(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if inner.state == TaskState::Finished {
            return false;
        }

        if self.task.abort() {
            inner.state = TaskState::Aborted;
            true
        } else {
            false
        }
    }

    /// Register a completion callback.
    ///
    /// Listeners registered before the task terminates fire exactly once, in
    /// registration order, when it does. Registering on an already-terminated
    /// future dispatches the callback immediately on the calling thread.
    ///
    /// Callbacks run under the future's internal lock; a callback that calls
    /// back into its own future will deadlock.
    pub fn add_listener(&self, listener: Arc<dyn FutureCallback>) {
        let mut inner = self.inner.lock().unwrap();

        match inner.state {
            TaskState::Finished | TaskState::Aborted => match &inner.result {
                Some(Ok(())) => listener.on_success(),
                Some(Err(error)) => listener.on_failure(error),
                None => listener.on_failure(&Error::Aborted),
            },
            _ => inner.listeners.push(listener),
        }
    }

    /// Whether a worker is currently executing the task.
    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().state == TaskState::Running
    }

    /// Whether the future reached a terminal state.
    pub fn is_done(&self) -> bool {
        matches!(
            self.inner.lock().unwrap().state,
            TaskState::Finished | TaskState::Aborted
        )
    }

    /// Whether the task accepted an abort request.
    pub fn is_aborted(&self) -> bool {
        self.inner.lock().unwrap().state == TaskState::Aborted
    }

    /// Block the current thread until the future completes.
    pub fn wait(&self) {
        self.latch.wait();
    }

    /// Block until the future completes or the timeout elapses. Returns
    /// `true` if the future completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.latch.wait_timeout(timeout)
    }

    /// Block until the future completes or the deadline passes. Returns
    /// `true` if the future completed.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        self.latch.wait_deadline(deadline)
    }

    /// Attempt a state transition. Fails if the future was aborted, in which
    /// case the state is left untouched.
    fn set_state(&self, state: TaskState) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if inner.state == TaskState::Aborted {
            return false;
        }

        inner.state = state;
        true
    }
}

impl Runnable for FutureTask {
    fn run(&self) {
        if !self.set_state(TaskState::Running) {
            // Aborted while still in the queue. Report the failure without
            // ever invoking the task.
            let inner = self.inner.lock().unwrap();
            for listener in inner.listeners.iter() {
                listener.on_failure(&Error::Aborted);
            }
            drop(inner);

            self.latch.count_down();
            return;
        }

        let result = match catch_unwind(AssertUnwindSafe(|| self.task.run())) {
            Ok(result) => result.map_err(Error::TaskFailure),
            Err(panic) => Err(Error::TaskFailure(panic_message(panic).into())),
        };

        let mut inner = self.inner.lock().unwrap();

        // An abort that landed mid-run wins: the state stays Aborted.
        if inner.state != TaskState::Aborted {
            inner.state = TaskState::Finished;
        }

        match &result {
            Ok(()) => {
                for listener in inner.listeners.iter() {
                    listener.on_success();
                }
            }
            Err(error) => {
                for listener in inner.listeners.iter() {
                    listener.on_failure(error);
                }
            }
        }

        inner.result = Some(result);
        drop(inner);

        self.latch.count_down();
    }
}

impl fmt::Debug for FutureTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureTask")
            .field("state", &self.inner.lock().unwrap().state)
            .finish()
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
