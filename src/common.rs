use once_cell::sync::OnceCell;

use crate::{executor::TaskExecutor, pool::Builder, Error, Result, ThreadPool};

static COMMON: OnceCell<TaskExecutor> = OnceCell::new();

/// Get a shared reference to a common executor for the entire process.
///
/// The executor is created lazily on first use, with no permanent workers
/// and up to one worker per CPU core unless configured otherwise with
/// [`configure_common`].
///
/// # Examples
///
/// ```
/// let future = taskpool::common()?.submit_run(|| Ok(()))?;
/// future.wait();
/// # Ok::<(), taskpool::Error>(())
/// ```
pub fn common() -> Result<&'static TaskExecutor> {
    COMMON.get_or_try_init(|| common_builder().build().map(TaskExecutor::new))
}

/// Configure the common executor's thread pool.
///
/// This should be done near the start of your program before any other code
/// uses the common executor; once the executor exists this function fails
/// with [`Error::NotSupported`].
///
/// Only programs should use this function. Libraries should leave the common
/// executor alone and build their own pool when they need a customized one.
pub fn configure_common<F>(f: F) -> Result<()>
where
    F: FnOnce(Builder) -> Builder,
{
    let mut was_initialized = true;

    let result = COMMON.get_or_try_init(|| {
        was_initialized = false;
        f(common_builder()).build().map(TaskExecutor::new)
    });

    result?;

    if was_initialized {
        Err(Error::NotSupported(
            "the common executor is already configured".into(),
        ))
    } else {
        Ok(())
    }
}

fn common_builder() -> Builder {
    ThreadPool::builder("common-executor")
}
