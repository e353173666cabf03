//! An opaque diagnostic context that rides along with submitted work.

use std::{
    cell::RefCell,
    fmt,
    fmt::Write,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

thread_local! {
    static CURRENT: RefCell<Option<Trace>> = RefCell::new(None);
}

/// A cheaply cloneable diagnostic context.
///
/// A trace collects timestamped messages from whatever code happens to run
/// while it is installed as the current trace of a thread. The thread pool
/// captures the submitter's current trace at submission time and installs it
/// on the worker thread for the duration of the task, so messages recorded by
/// the task land in the submitter's context.
///
/// Cloning a trace is cheap and produces another handle to the same buffer.
///
/// # Examples
///
/// ```
/// use taskpool::Trace;
///
/// let trace = Trace::new();
///
/// {
///     let _guard = Trace::adopt(Some(trace.clone()));
///     if let Some(current) = Trace::current() {
///         current.message("inside the scope");
///     }
/// }
///
/// assert!(trace.dump().contains("inside the scope"));
/// assert!(Trace::current().is_none());
/// ```
#[derive(Clone)]
pub struct Trace {
    inner: Arc<Inner>,
}

struct Inner {
    start: Instant,
    entries: Mutex<Vec<Entry>>,
}

struct Entry {
    offset: Duration,
    message: String,
}

impl Trace {
    /// Create a new, empty trace.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                start: Instant::now(),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Append a message to this trace.
    pub fn message<T: Into<String>>(&self, message: T) {
        let offset = self.inner.start.elapsed();

        self.inner.entries.lock().unwrap().push(Entry {
            offset,
            message: message.into(),
        });
    }

    /// Render the collected messages, one per line, each prefixed with its
    /// offset from the creation of the trace.
    pub fn dump(&self) -> String {
        let entries = self.inner.entries.lock().unwrap();
        let mut out = String::new();

        for entry in entries.iter() {
            let _ = writeln!(
                out,
                "{:>10.3}ms  {}",
                entry.offset.as_secs_f64() * 1000.0,
                entry.message
            );
        }

        out
    }

    /// Get a handle to the calling thread's current trace, if one is
    /// installed.
    pub fn current() -> Option<Trace> {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Install a trace as the calling thread's current trace for the lifetime
    /// of the returned guard.
    ///
    /// Passing `None` clears the current trace for the scope. The previously
    /// installed trace, if any, is restored when the guard is dropped, and
    /// the adopted handle is dropped along with the guard.
    pub fn adopt(trace: Option<Trace>) -> TraceGuard {
        let previous = CURRENT.with(|current| current.replace(trace));

        TraceGuard { previous }
    }

    /// Number of live handles to this trace's buffer.
    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace")
            .field("entries", &self.inner.entries.lock().unwrap().len())
            .finish()
    }
}

/// Guard returned by [`Trace::adopt`] that restores the previously installed
/// trace when dropped.
#[must_use = "dropping the guard immediately restores the previous trace"]
pub struct TraceGuard {
    previous: Option<Trace>,
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| {
            *current.borrow_mut() = self.previous.take();
        });
    }
}
