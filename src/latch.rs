use std::{
    sync::{Condvar, Mutex},
    time::{Duration, Instant},
};

/// A synchronization aid that allows threads to wait until a count of events
/// has occurred.
///
/// The latch starts with an initial count. Each call to
/// [`count_down`](CountDownLatch::count_down) decrements the count; once it
/// reaches zero all current and future waiters are released. The count never
/// goes below zero and cannot be reset.
pub struct CountDownLatch {
    count: Mutex<usize>,
    cond: Condvar,
}

impl CountDownLatch {
    /// Create a latch with the given initial count.
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            cond: Condvar::new(),
        }
    }

    /// Decrement the count, releasing all waiters if it reaches zero.
    ///
    /// Calling this on a latch that already reached zero has no effect.
    pub fn count_down(&self) {
        let mut count = self.count.lock().unwrap();

        if *count == 0 {
            return;
        }

        *count -= 1;

        if *count == 0 {
            self.cond.notify_all();
        }
    }

    /// Get the current count.
    pub fn count(&self) -> usize {
        *self.count.lock().unwrap()
    }

    /// Block the current thread until the count reaches zero.
    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap();

        while *count > 0 {
            count = self.cond.wait(count).unwrap();
        }
    }

    /// Block the current thread until the count reaches zero or the timeout
    /// elapses. Returns `true` if the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_deadline(Instant::now() + timeout)
    }

    /// Block the current thread until the count reaches zero or the deadline
    /// passes. Returns `true` if the count reached zero.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        let mut count = self.count.lock().unwrap();

        while *count > 0 {
            if let Some(timeout) = deadline.checked_duration_since(Instant::now()) {
                count = self.cond.wait_timeout(count, timeout).unwrap().0;
            } else {
                return false;
            }
        }

        true
    }
}
