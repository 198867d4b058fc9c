//! Worker thread implementation

use crate::core::{Result, SchedulerError};
use crate::pool::Task;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A worker thread that runs poll tasks handed to it over the pool's
/// task channel.
///
/// Workers share two counters with their pool: `active` is incremented for
/// exactly the span of one task (what `Scheduler::stats()` reports as
/// `active_threads`), and `slots` is the pool's free-capacity count, which
/// the worker returns when a task ends. The slot is released before the
/// active count drops, so a zero `active` reading implies the capacity is
/// already reusable.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    /// Create and start a new worker.
    ///
    /// # Shutdown Behavior
    ///
    /// Workers exit when the task channel disconnects, or when they observe
    /// the pool's running flag cleared while idle. Tasks already in the
    /// channel at disconnect time are still run before the worker exits.
    pub fn new(
        id: usize,
        thread_name: String,
        receiver: Receiver<Task>,
        running: Arc<AtomicBool>,
        active: Arc<AtomicUsize>,
        slots: Arc<AtomicUsize>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                Self::run(id, receiver, running, active, slots, poll_interval);
            })
            .map_err(|e| {
                SchedulerError::spawn_with_source(thread_name, "cannot spawn worker thread", e)
            })?;

        Ok(Self {
            id,
            thread: Some(thread),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Join the worker thread, waiting no longer than `deadline`.
    ///
    /// Returns `Ok(true)` on a clean join and `Ok(false)` when the deadline
    /// passed first; in that case the handle is dropped and the thread is
    /// left to finish on its own.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::JoinError`] if the worker panicked.
    pub fn join_by(mut self, deadline: Instant) -> Result<bool> {
        if let Some(thread) = self.thread.take() {
            while !thread.is_finished() {
                if Instant::now() >= deadline {
                    return Ok(false);
                }
                thread::sleep(Duration::from_millis(5));
            }
            thread
                .join()
                .map_err(|_| SchedulerError::join(self.id, "worker panicked"))?;
        }
        Ok(true)
    }

    /// Main worker loop
    fn run(
        id: usize,
        receiver: Receiver<Task>,
        running: Arc<AtomicBool>,
        active: Arc<AtomicUsize>,
        slots: Arc<AtomicUsize>,
        poll_interval: Duration,
    ) {
        log::debug!("worker #{} started", id);

        loop {
            match receiver.recv_timeout(poll_interval) {
                Ok(task) => {
                    active.fetch_add(1, Ordering::SeqCst);
                    let outcome = catch_unwind(AssertUnwindSafe(task));
                    slots.fetch_add(1, Ordering::SeqCst);
                    active.fetch_sub(1, Ordering::SeqCst);

                    if let Err(panic_info) = outcome {
                        // The task panicked; the worker itself survives.
                        let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                            s.to_string()
                        } else if let Some(s) = panic_info.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            "Unknown panic".to_string()
                        };
                        log::error!("worker #{}: poll task panicked: {}", id, panic_msg);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Pool dropped the sender, shutdown.
                    break;
                }
            }
        }

        log::debug!("worker #{} stopped", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn spawn_worker(
        receiver: Receiver<Task>,
        running: Arc<AtomicBool>,
        active: Arc<AtomicUsize>,
        slots: Arc<AtomicUsize>,
    ) -> Worker {
        Worker::new(
            0,
            "test-worker-0".to_string(),
            receiver,
            running,
            active,
            slots,
            Duration::from_millis(10),
        )
        .expect("Failed to create worker")
    }

    #[test]
    fn test_worker_runs_task() {
        let (tx, rx) = bounded::<Task>(1);
        let running = Arc::new(AtomicBool::new(true));
        let active = Arc::new(AtomicUsize::new(0));
        let slots = Arc::new(AtomicUsize::new(0));
        let worker = spawn_worker(rx, Arc::clone(&running), Arc::clone(&active), Arc::clone(&slots));

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        tx.send(Box::new(move || {
            ran_clone.store(true, Ordering::SeqCst);
        }))
        .expect("Failed to send task");

        thread::sleep(Duration::from_millis(50));
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(active.load(Ordering::SeqCst), 0);
        // Task completion returned its capacity slot.
        assert_eq!(slots.load(Ordering::SeqCst), 1);

        drop(tx);
        assert!(worker
            .join_by(Instant::now() + Duration::from_secs(1))
            .expect("Failed to join worker"));
    }

    #[test]
    fn test_worker_survives_panicking_task() {
        let (tx, rx) = bounded::<Task>(1);
        let running = Arc::new(AtomicBool::new(true));
        let active = Arc::new(AtomicUsize::new(0));
        let slots = Arc::new(AtomicUsize::new(0));
        let worker = spawn_worker(rx, Arc::clone(&running), Arc::clone(&active), Arc::clone(&slots));

        tx.send(Box::new(|| panic!("Intentional panic for testing")))
            .expect("Failed to send panicking task");

        // Worker must stay alive and take another task.
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        tx.send(Box::new(move || {
            ran_clone.store(true, Ordering::SeqCst);
        }))
        .expect("Failed to send task after panic");

        thread::sleep(Duration::from_millis(50));
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(active.load(Ordering::SeqCst), 0);
        // A panicking task releases its slot like any other.
        assert_eq!(slots.load(Ordering::SeqCst), 2);

        drop(tx);
        assert!(worker
            .join_by(Instant::now() + Duration::from_secs(1))
            .expect("Failed to join worker"));
    }

    #[test]
    fn test_worker_exits_when_running_cleared() {
        let (tx, rx) = bounded::<Task>(1);
        let running = Arc::new(AtomicBool::new(true));
        let active = Arc::new(AtomicUsize::new(0));
        let slots = Arc::new(AtomicUsize::new(0));
        let worker = spawn_worker(rx, Arc::clone(&running), active, slots);

        running.store(false, Ordering::Release);
        assert!(worker
            .join_by(Instant::now() + Duration::from_secs(1))
            .expect("Failed to join worker"));
        drop(tx);
    }
}
