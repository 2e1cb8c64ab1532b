//! Bounded worker pool running ledger operations off the caller's thread.

use crate::config::DispatchConfig;
use crate::error::{Result, SubmitError};
use crossbeam_queue::ArrayQueue;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;
use tracing::{debug, error, info, warn};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Upper bound on how long an idle worker sleeps before looking at the queue again.
const IDLE_PARK: Duration = Duration::from_millis(50);

struct Shared {
    tasks: ArrayQueue<Task>,
    idle: ArrayQueue<Thread>,
    closed: AtomicBool,
    busy: AtomicUsize,
    /// Accepted tasks that have not finished yet, queued or running.
    in_flight: AtomicUsize,
    /// `workers + queue_capacity`.
    capacity: usize,
}

/// Fixed-size pool of worker threads fed by a bounded FIFO queue.
///
/// [`WorkerPool::submit`] never blocks. Admission is counted against
/// `workers + queue_capacity` accepted-but-unfinished tasks, so a burst on an
/// idle pool is accepted even before the parked workers wake up. Past that
/// bound every worker is busy and `queue_capacity` tasks are already waiting:
/// the task is rejected with [`SubmitError::Saturated`] and dropped without
/// running.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        config.validate()?;

        let capacity = config.workers + config.queue_capacity;
        let shared = Arc::new(Shared {
            tasks: ArrayQueue::new(capacity),
            idle: ArrayQueue::new(config.workers),
            closed: AtomicBool::new(false),
            busy: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            capacity,
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(config.workers),
        };
        for index in 0..config.workers {
            let shared = Arc::clone(&pool.shared);
            // On error `pool` is dropped here, which stops the workers spawned so far.
            let handle = thread::Builder::new()
                .name(format!("ledger-worker-{}", index))
                .spawn(move || run_worker(index, &shared))?;
            pool.workers.push(handle);
        }

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );
        Ok(pool)
    }

    /// Queues `task` for execution on a worker thread.
    pub fn submit<F>(&self, task: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(SubmitError::ShutDown);
        }
        let admitted = self
            .shared
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.shared.capacity).then_some(n + 1)
            });
        // `tasks` holds at most `in_flight` entries, so an admitted push fits.
        if admitted.is_err() || self.shared.tasks.push(Box::new(task)).is_err() {
            if admitted.is_ok() {
                self.shared.in_flight.fetch_sub(1, Ordering::AcqRel);
            }
            warn!(
                queued = self.shared.tasks.len(),
                busy = self.busy(),
                "dispatch queue saturated, task rejected"
            );
            return Err(SubmitError::Saturated);
        }
        if let Some(worker) = self.shared.idle.pop() {
            worker.unpark();
        }
        Ok(())
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.tasks.len()
    }

    /// Workers currently running a task.
    pub fn busy(&self) -> usize {
        self.shared.busy.load(Ordering::Acquire)
    }

    /// Stops accepting tasks, runs every task already queued, then joins the workers.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shared.closed.store(true, Ordering::Release);
        for worker in &self.workers {
            worker.thread().unpark();
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("worker thread panicked");
            }
        }

        // A submit racing with `closed` may land after the workers exited.
        // Dropping the task closes its outcome channel.
        let mut dropped = 0usize;
        while let Some(task) = self.shared.tasks.pop() {
            drop(task);
            self.shared.in_flight.fetch_sub(1, Ordering::AcqRel);
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "tasks submitted during shutdown were dropped");
        }
        info!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(index: usize, shared: &Shared) {
    debug!(worker = index, "worker started");
    loop {
        if let Some(task) = shared.tasks.pop() {
            run_task(index, shared, task);
            continue;
        }
        if shared.closed.load(Ordering::Acquire) {
            break;
        }

        // Register as idle before the second look at the queue, so a task
        // pushed after that look always finds a worker to unpark. A full
        // `idle` queue only holds stale registrations; the timed park covers it.
        let _ = shared.idle.push(thread::current());
        if let Some(task) = shared.tasks.pop() {
            run_task(index, shared, task);
            continue;
        }
        thread::park_timeout(IDLE_PARK);
    }
    debug!(worker = index, "worker stopped");
}

fn run_task(index: usize, shared: &Shared, task: Task) {
    shared.busy.fetch_add(1, Ordering::AcqRel);
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        error!(worker = index, "task panicked");
    }
    shared.busy.fetch_sub(1, Ordering::AcqRel);
    shared.in_flight.fetch_sub(1, Ordering::AcqRel);
}
