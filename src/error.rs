use std::io;

use thiserror::Error;

/// A type-erased error produced by a user-supplied task.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A specialized `Result` type for pool and executor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by thread pool, executor, and future operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The pool was observed before initialization completed.
    #[error("the thread pool has not been initialized")]
    Uninitialized,

    /// The requested operation is not valid in the current state, such as
    /// initializing a component twice.
    #[error("{0}")]
    NotSupported(String),

    /// A task was submitted after the pool was shut down.
    #[error("the thread pool has been shut down")]
    PoolNotRunning,

    /// A task was submitted while the queue was at capacity.
    #[error("thread pool queue is full ({items} items)")]
    QueueFull {
        /// Number of entries in the queue at the time of the rejection.
        items: usize,
    },

    /// The operating system failed to create a worker thread and no worker
    /// exists to pick up the submitted task.
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(#[from] io::Error),

    /// The task was aborted before it ran.
    #[error("task was aborted before it ran")]
    Aborted,

    /// The user task's `run` returned an error.
    #[error("task failed: {0}")]
    TaskFailure(BoxError),
}
