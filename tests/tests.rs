use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::bounded;
use taskpool::{
    BoxError, Error, FutureCallback, FutureTask, Task, TaskExecutor, ThreadPool,
};

fn single_thread(name: &str) -> ThreadPool {
    ThreadPool::builder(name).max_threads(1).build().unwrap()
}

/// Submit a closure, retrying while the queue is at capacity.
fn submit_with_retry<F>(pool: &ThreadPool, func: F)
where
    F: FnOnce() + Clone + Send + 'static,
{
    loop {
        match pool.submit_func(func.clone()) {
            Ok(()) => return,
            Err(Error::QueueFull { .. }) => thread::yield_now(),
            Err(e) => panic!("submission failed: {e}"),
        }
    }
}

struct RecordingCallback {
    name: &'static str,
    events: Arc<Mutex<Vec<String>>>,
}

impl FutureCallback for RecordingCallback {
    fn on_success(&self) {
        self.events.lock().unwrap().push(format!("{}: success", self.name));
    }

    fn on_failure(&self, error: &Error) {
        self.events.lock().unwrap().push(format!("{}: {}", self.name, error));
    }
}

#[test]
#[should_panic(expected = "thread pool name must not contain null bytes")]
fn name_with_null_bytes_panics() {
    let _ = ThreadPool::builder("uh\0oh");
}

#[test]
#[should_panic(expected = "thread pool minimum size cannot be larger than maximum size")]
fn min_larger_than_max_panics() {
    let _ = ThreadPool::builder("test")
        .min_threads(2)
        .max_threads(1)
        .build();
}

#[test]
#[should_panic(expected = "thread pool maximum size must be non-zero")]
fn zero_max_threads_panics() {
    let _ = ThreadPool::builder("test").max_threads(0);
}

#[test]
#[should_panic(expected = "thread pool queue capacity must be non-zero")]
fn zero_queue_capacity_panics() {
    let _ = ThreadPool::builder("test").max_queue_size(0);
}

#[test]
fn worker_threads_carry_the_pool_name() {
    let pool = single_thread("naming");
    let (tx, rx) = bounded(1);

    pool.submit_func(move || {
        let _ = tx.send(thread::current().name().map(str::to_owned));
    })
    .unwrap();

    assert_eq!(rx.recv().unwrap().as_deref(), Some("naming [worker]"));
}

#[test]
fn hundred_submissions_all_run() {
    let pool = ThreadPool::builder("s1")
        .min_threads(2)
        .max_threads(4)
        .max_queue_size(10)
        .build()
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));

    for i in 0..100 {
        let seen = seen.clone();
        submit_with_retry(&pool, move || {
            seen.lock().unwrap().push(i);
        });
    }

    pool.wait();

    let mut seen = seen.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..100).collect::<Vec<_>>());
}

#[test]
fn fifo_dispatch_under_single_worker() {
    let pool = single_thread("fifo");
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..50 {
        let order = order.clone();
        pool.submit_func(move || {
            order.lock().unwrap().push(i);
        })
        .unwrap();
    }

    pool.wait();

    assert_eq!(*order.lock().unwrap(), (0..50).collect::<Vec<_>>());
}

#[test]
fn elastic_growth_spawns_one_worker_per_stalled_submission() {
    let pool = ThreadPool::builder("growth")
        .max_threads(4)
        .idle_timeout(Duration::from_secs(10))
        .build()
        .unwrap();

    let (gate_tx, gate_rx) = bounded::<()>(0);

    for _ in 0..4 {
        let gate_rx = gate_rx.clone();
        pool.submit_func(move || {
            gate_rx.recv().unwrap();
        })
        .unwrap();
    }

    // Every submission found all existing workers busy, so each spawned one.
    assert_eq!(pool.threads(), 4);

    // A fifth submission queues instead of growing past the maximum.
    pool.submit_func(|| {}).unwrap();
    assert_eq!(pool.threads(), 4);

    for _ in 0..4 {
        gate_tx.send(()).unwrap();
    }

    pool.wait();
    assert_eq!(pool.threads(), 4);
}

#[test]
fn idle_transients_reaped_back_to_minimum() {
    let pool = ThreadPool::builder("reaping")
        .min_threads(1)
        .max_threads(4)
        .idle_timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let (gate_tx, gate_rx) = bounded::<()>(0);

    for _ in 0..4 {
        let gate_rx = gate_rx.clone();
        pool.submit_func(move || {
            gate_rx.recv().unwrap();
        })
        .unwrap();
    }

    assert_eq!(pool.threads(), 4);

    for _ in 0..4 {
        gate_tx.send(()).unwrap();
    }

    pool.wait();

    let deadline = Instant::now() + Duration::from_secs(2);
    while pool.threads() > 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(pool.threads(), 1, "transient workers were not reaped");
}

#[test]
fn saturated_queue_rejects_submission() {
    let pool = ThreadPool::builder("s2")
        .max_threads(1)
        .max_queue_size(1)
        .build()
        .unwrap();

    let executed = Arc::new(AtomicUsize::new(0));
    let (gate_tx, gate_rx) = bounded::<()>(0);

    let executed_clone = executed.clone();
    pool.submit_func(move || {
        gate_rx.recv().unwrap();
        executed_clone.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    // Wait for the single worker to pull the blocker off the queue.
    while pool.active_tasks() == 0 {
        thread::yield_now();
    }

    let executed_clone = executed.clone();
    pool.submit_func(move || {
        executed_clone.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    assert!(matches!(
        pool.submit_func(|| {}),
        Err(Error::QueueFull { items: 1 })
    ));

    gate_tx.send(()).unwrap();
    pool.wait();

    assert_eq!(executed.load(Ordering::SeqCst), 2);
}

#[test]
fn wait_timeout_expires_while_a_task_runs() {
    let pool = single_thread("waiting");
    let (gate_tx, gate_rx) = bounded::<()>(0);

    pool.submit_func(move || {
        gate_rx.recv().unwrap();
    })
    .unwrap();

    assert!(!pool.wait_timeout(Duration::from_millis(50)));

    gate_tx.send(()).unwrap();
    pool.wait();
}

#[test]
fn shutdown_drains_in_flight_and_discards_queued() {
    let pool = ThreadPool::builder("s5")
        .min_threads(1)
        .max_threads(1)
        .max_queue_size(100)
        .build()
        .unwrap();

    let executed = Arc::new(Mutex::new(Vec::new()));
    let (gate_tx, gate_rx) = bounded::<()>(0);

    let executed_clone = executed.clone();
    pool.submit_func(move || {
        gate_rx.recv().unwrap();
        executed_clone.lock().unwrap().push(0usize);
    })
    .unwrap();

    for i in 1..50 {
        let executed = executed.clone();
        pool.submit_func(move || {
            executed.lock().unwrap().push(i);
        })
        .unwrap();
    }

    gate_tx.send(()).unwrap();
    pool.shutdown();

    assert_eq!(pool.threads(), 0);
    assert!(matches!(
        pool.submit_func(|| {}),
        Err(Error::PoolNotRunning)
    ));

    // The single worker dispatches in FIFO order, so whatever ran before the
    // shutdown cleared the queue is a prefix of the submission order.
    let executed = executed.lock().unwrap();
    assert!(executed.len() <= 50);
    assert_eq!(*executed, (0..executed.len()).collect::<Vec<_>>());
}

#[test]
fn panicking_task_does_not_take_down_the_worker() {
    let pool = ThreadPool::builder("panics")
        .min_threads(1)
        .max_threads(1)
        .build()
        .unwrap();

    pool.submit_func(|| panic!("oh no!")).unwrap();
    pool.wait();

    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    pool.submit_func(move || {
        counter_clone.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    pool.wait();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(pool.threads(), 1);
}

#[test]
fn listeners_observe_failure_in_registration_order() {
    let executor = TaskExecutor::create("s3", 0, 2).unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let (gate_tx, gate_rx) = bounded::<()>(0);

    let future = executor
        .submit_run(move || {
            gate_rx.recv().unwrap();
            Err("boom".into())
        })
        .unwrap();

    future.add_listener(Arc::new(RecordingCallback {
        name: "first",
        events: events.clone(),
    }));
    future.add_listener(Arc::new(RecordingCallback {
        name: "second",
        events: events.clone(),
    }));

    gate_tx.send(()).unwrap();
    future.wait();
    assert!(future.is_done());

    // Registered after termination: dispatched synchronously, right here.
    future.add_listener(Arc::new(RecordingCallback {
        name: "third",
        events: events.clone(),
    }));

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            "first: task failed: boom".to_string(),
            "second: task failed: boom".to_string(),
            "third: task failed: boom".to_string(),
        ]
    );
}

#[test]
fn successful_task_notifies_listeners() {
    let executor = TaskExecutor::create_max("success", 1).unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));

    let future = executor.submit_run(|| Ok(())).unwrap();
    future.wait();

    future.add_listener(Arc::new(RecordingCallback {
        name: "late",
        events: events.clone(),
    }));

    assert_eq!(*events.lock().unwrap(), vec!["late: success".to_string()]);
    assert!(future.is_done());
    assert!(!future.is_aborted());
}

#[test]
fn abort_while_queued_skips_the_task() {
    let executor = TaskExecutor::create("s4", 0, 1).unwrap();
    let (gate_tx, gate_rx) = bounded::<()>(0);

    // Occupy the only worker so the next submission stays queued.
    let blocker = executor
        .submit_run(move || {
            gate_rx.recv().unwrap();
            Ok(())
        })
        .unwrap();

    while executor.pool().active_tasks() == 0 {
        thread::yield_now();
    }

    let ran = Arc::new(AtomicBool::new(false));
    let ran_clone = ran.clone();
    let events = Arc::new(Mutex::new(Vec::new()));

    let future = executor
        .submit_abortable(
            move || {
                ran_clone.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_secs(10));
                Ok(())
            },
            || true,
        )
        .unwrap();

    future.add_listener(Arc::new(RecordingCallback {
        name: "observer",
        events: events.clone(),
    }));

    assert!(future.abort());
    assert!(future.is_aborted());

    gate_tx.send(()).unwrap();

    assert!(future.wait_timeout(Duration::from_secs(1)));
    assert!(future.is_aborted());
    assert!(!ran.load(Ordering::SeqCst), "aborted task must never run");
    assert_eq!(
        *events.lock().unwrap(),
        vec!["observer: task was aborted before it ran".to_string()]
    );

    blocker.wait();
    executor.shutdown();
}

#[test]
fn abort_refused_when_task_disallows_it() {
    let executor = TaskExecutor::create("no-abort", 0, 1).unwrap();
    let (gate_tx, gate_rx) = bounded::<()>(0);

    let future = executor
        .submit_run(move || {
            gate_rx.recv().unwrap();
            Ok(())
        })
        .unwrap();

    assert!(!future.abort());

    gate_tx.send(()).unwrap();
    future.wait();
    assert!(future.is_done());
    assert!(!future.is_aborted());
}

#[test]
fn premade_future_task_can_be_submitted() {
    struct FlagTask {
        ran: AtomicBool,
    }

    impl Task for FlagTask {
        fn run(&self) -> Result<(), BoxError> {
            self.ran.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    let executor = TaskExecutor::create("premade", 0, 1).unwrap();
    let task = Arc::new(FlagTask {
        ran: AtomicBool::new(false),
    });

    let future = Arc::new(FutureTask::new(task.clone()));
    executor.submit_future_task(&future).unwrap();

    future.wait();
    assert!(future.is_done());
    assert!(task.ran.load(Ordering::SeqCst));
}

#[test]
fn common_executor_configure_after_use_fails() {
    let future = taskpool::common().unwrap().submit_run(|| Ok(())).unwrap();
    future.wait();

    assert!(matches!(
        taskpool::configure_common(|builder| builder),
        Err(Error::NotSupported(_))
    ));
}

#[test]
fn submission_storm_respects_thread_ceiling() {
    let pool = Arc::new(
        ThreadPool::builder("s6")
            .max_threads(8)
            .max_queue_size(1000)
            .build()
            .unwrap(),
    );

    let running = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            let running = running.clone();
            let high_water = high_water.clone();
            let completed = completed.clone();

            thread::spawn(move || {
                for _ in 0..625 {
                    let running = running.clone();
                    let high_water = high_water.clone();
                    let completed = completed.clone();

                    submit_with_retry(&pool, move || {
                        let current = running.fetch_add(1, Ordering::SeqCst) + 1;
                        high_water.fetch_max(current, Ordering::SeqCst);
                        running.fetch_sub(1, Ordering::SeqCst);
                        completed.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        })
        .collect();

    for submitter in submitters {
        submitter.join().unwrap();
    }

    pool.wait();

    assert_eq!(completed.load(Ordering::SeqCst), 16 * 625);
    assert!(high_water.load(Ordering::SeqCst) <= 8);
    assert!(pool.threads() <= 8);
}
