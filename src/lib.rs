//! A queued, elastically-sized thread pool with future task handles.
//!
//! The pool keeps between a minimum number of permanent workers and a
//! configurable maximum. Extra workers are spawned when submissions outpace
//! the idle worker count and exit again after an idle timeout. Submissions
//! are dispatched in FIFO order from a bounded queue, and the submitting
//! thread's [`Trace`] context rides along with each entry.
//!
//! Plain fire-and-forget closures go straight to a [`ThreadPool`]. When the
//! submitter needs to observe completion, wait on it, cancel the work, or
//! register callbacks, a [`TaskExecutor`] wraps the submission in a
//! [`FutureTask`] handle.
//!
//! # Examples
//!
//! Fire-and-forget submission to a pool:
//!
//! ```
//! use taskpool::ThreadPool;
//!
//! let pool = ThreadPool::builder("worker").max_threads(4).build()?;
//!
//! for i in 0..8 {
//!     pool.submit_func(move || {
//!         let _ = i * i;
//!     })?;
//! }
//!
//! // Block until every submitted task has run.
//! pool.wait();
//! # Ok::<(), taskpool::Error>(())
//! ```
//!
//! Observable submission through an executor:
//!
//! ```
//! use taskpool::TaskExecutor;
//!
//! let executor = TaskExecutor::create("worker", 1, 4)?;
//!
//! let future = executor.submit_run(|| {
//!     // fallible work
//!     Ok(())
//! })?;
//!
//! future.wait();
//! assert!(future.is_done());
//! # Ok::<(), taskpool::Error>(())
//! ```

mod common;
mod error;
mod executor;
mod latch;
mod pool;
mod task;
mod trace;
mod worker;

pub use common::{common, configure_common};
pub use error::{BoxError, Error, Result};
pub use executor::TaskExecutor;
pub use latch::CountDownLatch;
pub use pool::{Builder, ThreadPool};
pub use task::{FutureCallback, FutureTask, Runnable, Task, TaskState};
pub use trace::{Trace, TraceGuard};
