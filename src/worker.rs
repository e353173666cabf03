use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{
    pool::{PoolStatus, QueueEntry, Shared},
    trace::Trace,
};

/// A worker thread belonging to a thread pool.
///
/// Permanent workers wait for work indefinitely; non-permanent workers exit
/// after the pool's idle timeout passes without work.
pub(crate) struct Worker {
    shared: Arc<Shared>,
    permanent: bool,
}

impl Worker {
    pub(crate) fn new(shared: Arc<Shared>, permanent: bool) -> Self {
        Self { shared, permanent }
    }

    pub(crate) fn run(self) {
        let mut state = self.shared.state.lock().unwrap();

        loop {
            if state.status != PoolStatus::Running {
                debug!(pool = %self.shared.name, "worker exiting: pool is shutting down");
                break;
            }

            let entry = match state.queue.pop_front() {
                Some(entry) => entry,
                None => {
                    if self.permanent {
                        state = self.shared.not_empty.wait(state).unwrap();
                    } else {
                        let (guard, timeout) = self
                            .shared
                            .not_empty
                            .wait_timeout(state, self.shared.idle_timeout)
                            .unwrap();
                        state = guard;

                        // A timed wait may report a timeout even though
                        // another thread pushed work and signalled between
                        // the wakeup and this lock reacquisition. Trust the
                        // queue, not the timeout flag.
                        if timeout.timed_out() && state.queue.is_empty() {
                            debug!(
                                pool = %self.shared.name,
                                timeout_ms = self.shared.idle_timeout.as_millis() as u64,
                                "idle worker timed out"
                            );
                            break;
                        }
                    }

                    continue;
                }
            };

            state.queue_size -= 1;
            state.active_threads += 1;
            drop(state);

            let QueueEntry { runnable, trace } = entry;

            {
                // The trace handle captured at submission time is dropped
                // with this guard, exactly once per dequeued entry.
                let _trace = Trace::adopt(trace);

                if catch_unwind(AssertUnwindSafe(|| runnable.run())).is_err() {
                    warn!(pool = %self.shared.name, "task panicked");
                }
            }

            state = self.shared.state.lock().unwrap();

            state.active_threads -= 1;
            if state.active_threads == 0 {
                self.shared.idle_cond.notify_all();
            }
        }

        // Still holding the lock here: nobody may enqueue between the status
        // check above and this count reaching zero.
        state.num_threads -= 1;
        if state.num_threads == 0 {
            self.shared.no_threads_cond.notify_all();

            // Last worker out: anything still queued would never run.
            debug_assert!(state.queue.is_empty());
            debug_assert_eq!(state.queue_size, 0);
        }
    }
}
