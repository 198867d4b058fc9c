//! Thread pool implementation

use crate::core::{Result, SchedulerError};
use crate::pool::worker::Worker;
use crate::pool::Task;
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A bounded, restartable pool of worker threads for poll tasks.
///
/// # Capacity Semantics
///
/// Spare capacity is tracked by an explicit slot counter: `start` arms one
/// slot per worker, [`try_submit`](ThreadPool::try_submit) reserves a slot
/// before handing the task off, and the worker releases the slot when the
/// task finishes. A freshly started pool therefore accepts `max_threads`
/// submissions immediately, whether or not its workers have reached their
/// receive loop yet, and "no spare capacity" is exact at the moment of the
/// call.
///
/// # Shutdown Mechanism
///
/// Shutdown first marks the pool not-running so concurrent submissions are
/// refused, then drops the hand-off sender so idle workers disconnect, then
/// joins workers up to a deadline. Tasks already handed off still run;
/// a worker still busy past the deadline is detached and logged, never
/// panicked over.
pub struct ThreadPool {
    name: String,
    max_threads: usize,
    poll_interval: Duration,
    workers: RwLock<Vec<Worker>>,
    sender: RwLock<Option<Sender<Task>>>,
    running: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    // Free capacity: decremented on submit, incremented when a task ends.
    slots: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.name)
            .field("max_threads", &self.max_threads)
            .field("active_threads", &self.active.load(Ordering::Relaxed))
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

impl ThreadPool {
    /// Create a new pool.
    ///
    /// `max_threads` of zero is legal and yields a pool that refuses every
    /// submission. The pool is created stopped; call
    /// [`start`](ThreadPool::start).
    pub fn new<S: Into<String>>(name: S, max_threads: usize, poll_interval: Duration) -> Self {
        Self {
            name: name.into(),
            max_threads,
            poll_interval,
            workers: RwLock::new(Vec::new()),
            sender: RwLock::new(None),
            running: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
            slots: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start the pool.
    ///
    /// # Restart Support
    ///
    /// The pool can be started again after shutdown; workers are recreated
    /// with a fresh hand-off channel and a full set of capacity slots.
    ///
    /// # Thread Safety
    ///
    /// Uses interior mutability and can be called from `&self`. Concurrent
    /// calls are safe: only the first succeeds, others receive an
    /// `AlreadyRunning` error.
    pub fn start(&self) -> Result<()> {
        // Atomically check and set running flag to prevent race condition
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SchedulerError::already_running(
                &self.name,
                self.max_threads,
            ));
        }

        let (sender, receiver) = bounded::<Task>(self.max_threads);

        let mut workers = Vec::with_capacity(self.max_threads);
        for id in 0..self.max_threads {
            let worker = Worker::new(
                id,
                format!("{}-{}", self.name, id),
                receiver.clone(),
                Arc::clone(&self.running),
                Arc::clone(&self.active),
                Arc::clone(&self.slots),
                self.poll_interval,
            );
            match worker {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    // Roll back: stop whatever was spawned and report.
                    self.running.store(false, Ordering::Release);
                    drop(sender);
                    drop(receiver);
                    let deadline = Instant::now() + Duration::from_secs(1);
                    for worker in workers {
                        let _ = worker.join_by(deadline);
                    }
                    return Err(e);
                }
            }
        }

        *self.workers.write() = workers;
        *self.sender.write() = Some(sender);
        self.slots.store(self.max_threads, Ordering::SeqCst);

        log::debug!(
            "thread pool '{}' started with {} workers",
            self.name,
            self.max_threads
        );
        Ok(())
    }

    /// Hand a task to a worker without blocking.
    ///
    /// Succeeds exactly when the pool is running and a capacity slot is
    /// free, reserving the slot until the task finishes. Returns `false`
    /// when the pool is not running, is shutting down, or every slot is
    /// taken.
    pub fn try_submit<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let sender_guard = self.sender.read();
        let Some(sender) = sender_guard.as_ref() else {
            return false;
        };
        // Checked under the guard so a concurrent shutdown is observed
        // before the send, not after.
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        if self
            .slots
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return false;
        }
        // The channel holds one task per reserved slot, so this send cannot
        // fail on a live channel.
        if sender.try_send(Box::new(task)).is_err() {
            self.slots.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Shutdown the pool and wait up to `timeout` for workers to finish.
    ///
    /// In-flight tasks are allowed to complete; a worker exceeding the
    /// deadline is logged and detached. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::JoinError`] if a worker panicked.
    pub fn shutdown(&self, timeout: Duration) -> Result<()> {
        // Mark as not running first to refuse new submissions
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        // Disconnect the hand-off channel to release idle workers
        *self.sender.write() = None;
        self.slots.store(0, Ordering::SeqCst);

        let workers = std::mem::take(&mut *self.workers.write());
        let deadline = Instant::now() + timeout;
        let mut first_error = None;
        for worker in workers {
            let id = worker.id();
            match worker.join_by(deadline) {
                Ok(true) => {}
                Ok(false) => {
                    log::warn!(
                        "thread pool '{}': worker #{} did not stop within the shutdown timeout, detaching",
                        self.name,
                        id
                    );
                }
                Err(e) => {
                    log::error!("thread pool '{}': {}", self.name, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        log::debug!("thread pool '{}' stopped", self.name);
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Check if the pool is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Maximum number of worker threads
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Number of workers currently running a task
    pub fn active_threads(&self) -> usize {
        self.active.load(Ordering::SeqCst).min(self.max_threads)
    }

    /// Pool name, used as the worker thread-name prefix
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Only attempt shutdown if still running to avoid redundant work
        if self.running.load(Ordering::Acquire) {
            if let Err(e) = self.shutdown(Duration::from_secs(5)) {
                log::error!(
                    "failed to shutdown thread pool '{}' during drop: {}",
                    self.name,
                    e
                );
            }
        }
    }
}
