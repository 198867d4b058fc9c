//! Scheduler: one queue group's thread pool, wakeup timers, and poll loop

mod multi;
pub mod registry;

pub use multi::MultiScheduler;

use crate::config::{QueueGroup, QueueNames};
use crate::core::{ErrorHook, Performer, Result};
use crate::pool::ThreadPool;
use crate::timer::{TimerCache, TimerTarget};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Configuration for a scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum worker threads (0 yields a scheduler that never runs
    /// tasks)
    pub max_threads: usize,
    /// Maximum pending wakeup timers
    pub max_cache: usize,
    /// Worker poll interval for observing shutdown while idle.
    /// Default: 100ms
    pub poll_interval: Duration,
    /// How long `shutdown` waits for in-flight tasks when no explicit
    /// timeout is given. Default: 30s
    pub shutdown_timeout: Duration,
    /// Thread name prefix for this scheduler's workers
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_threads: num_cpus::get(),
            max_cache: 5,
            poll_interval: Duration::from_millis(100),
            shutdown_timeout: Duration::from_secs(30),
            thread_name_prefix: "worker".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with the given thread capacity
    #[must_use]
    pub fn new(max_threads: usize) -> Self {
        Self {
            max_threads,
            ..Default::default()
        }
    }

    /// Set the thread capacity
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the wakeup-timer cache bound
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_cache(mut self, max_cache: usize) -> Self {
        self.max_cache = max_cache;
        self
    }

    /// Set the worker poll interval.
    ///
    /// # Panics
    ///
    /// Panics if interval is zero.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "poll interval must be non-zero");
        self.poll_interval = interval;
        self
    }

    /// Set the default shutdown timeout
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the worker thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

/// Point-in-time snapshot of one scheduler.
///
/// `active_threads + inactive_threads == max_threads` and
/// `cache_count + cache_remaining == max_cache` hold in every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Rendered queue-name set, e.g. `"mice,ferrets"` or `"*"`
    pub name: String,
    /// Thread capacity
    pub max_threads: usize,
    /// Workers currently running a poll task
    pub active_threads: usize,
    /// Idle workers
    pub inactive_threads: usize,
    /// Wakeup-timer cache bound
    pub max_cache: usize,
    /// Pending wakeup timers
    pub cache_count: usize,
    /// Free wakeup-timer slots
    pub cache_remaining: usize,
}

struct SchedulerCore {
    names: QueueNames,
    performer: Arc<dyn Performer>,
    pool: ThreadPool,
    timers: TimerCache,
    hook: ErrorHook,
    shutdown_timeout: Duration,
    weak_self: Weak<SchedulerCore>,
}

impl SchedulerCore {
    fn create_thread(&self, queue_name: Option<&str>) -> Option<bool> {
        if let Some(name) = queue_name {
            if !self.names.matches(name) {
                return Some(false);
            }
        }

        let weak = self.weak_self.clone();
        let submitted = self.pool.try_submit(move || {
            if let Some(core) = weak.upgrade() {
                core.poll();
            }
        });

        if submitted {
            Some(true)
        } else {
            // Not running, shutting down, or every worker busy. An already
            // running poll task drains the backlog either way.
            None
        }
    }

    /// One poll task: drain available jobs, then cache the performer's
    /// future wake times and end, returning the thread to the idle set.
    fn poll(&self) {
        loop {
            // Observed shutdown: finish without starting another drain
            // iteration.
            if !self.pool.is_running() {
                return;
            }

            match self.performer.next() {
                Ok(Some(job)) => {
                    log::debug!(
                        "performer '{}' ran a job from queue '{}'",
                        self.performer.name(),
                        job.queue
                    );
                }
                Ok(None) => {
                    if self.pool.is_running() {
                        let now = Utc::now();
                        for timestamp in self.performer.next_wake_times() {
                            // A non-future time means work the next explicit
                            // poll will find anyway; caching it would fire an
                            // immediate re-poll loop.
                            if timestamp > now {
                                self.timers.register(timestamp);
                            }
                        }
                    }
                    return;
                }
                Err(error) => {
                    // Contained at the task boundary: forward once to the
                    // hook, end the task normally.
                    self.hook.invoke(&error);
                    return;
                }
            }
        }
    }

    fn stats(&self) -> SchedulerStats {
        let max_threads = self.pool.max_threads();
        let active_threads = self.pool.active_threads();
        let max_cache = self.timers.max_cache();
        let cache_count = self.timers.count().min(max_cache);
        SchedulerStats {
            name: self.performer.name().to_string(),
            max_threads,
            active_threads,
            inactive_threads: max_threads - active_threads,
            max_cache,
            cache_count,
            cache_remaining: max_cache - cache_count,
        }
    }
}

impl TimerTarget for SchedulerCore {
    fn wake(&self) {
        let _ = self.create_thread(None);
    }
}

/// The per-queue-group scheduler.
///
/// Owns exactly one [`Performer`], one [`ThreadPool`], and one
/// [`TimerCache`]. Cheaply cloneable handle; construction registers the
/// instance in the process-wide [`registry`].
///
/// # Example
///
/// ```rust,ignore
/// use queue_scheduler::prelude::*;
/// use std::sync::Arc;
///
/// let scheduler = Scheduler::new(
///     QueueNames::Explicit(vec!["mice".to_string()]),
///     Arc::new(my_performer),
///     SchedulerConfig::new(2),
///     ErrorHook::noop(),
/// )?;
///
/// // A job was enqueued for "mice": ask the scheduler to poll.
/// match scheduler.create_thread(Some("mice")) {
///     Some(true) => {}       // poll task submitted
///     Some(false) => {}      // not this scheduler's queue
///     None => {}             // no spare capacity right now
/// }
/// ```
#[derive(Clone)]
pub struct Scheduler {
    core: Arc<SchedulerCore>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.core.performer.name())
            .field("running", &self.core.pool.is_running())
            .finish()
    }
}

impl Scheduler {
    /// Create a running scheduler and register it.
    ///
    /// # Errors
    ///
    /// Returns a spawn error when worker or timer threads cannot be
    /// created.
    pub fn new(
        names: QueueNames,
        performer: Arc<dyn Performer>,
        config: SchedulerConfig,
        hook: ErrorHook,
    ) -> Result<Self> {
        let display = performer.name().to_string();
        let pool_name = format!("{}-{}", config.thread_name_prefix, display);

        let core = Arc::new_cyclic(|weak: &Weak<SchedulerCore>| SchedulerCore {
            names,
            performer,
            pool: ThreadPool::new(pool_name, config.max_threads, config.poll_interval),
            timers: TimerCache::new(config.max_cache),
            hook,
            shutdown_timeout: config.shutdown_timeout,
            weak_self: weak.clone(),
        });

        core.pool.start()?;
        let weak = Arc::downgrade(&core);
        let target: Weak<dyn TimerTarget> = weak;
        if let Err(e) = core.timers.start(format!("timer-{}", display), target) {
            let _ = core.pool.shutdown(Duration::from_secs(1));
            return Err(e);
        }

        let scheduler = Self { core };
        registry::register(&scheduler);
        log::debug!("scheduler '{}' created", scheduler.name());
        Ok(scheduler)
    }

    /// Create a scheduler for a parsed queue group, taking the group's
    /// thread capacity over the configured one.
    pub fn from_group(
        group: &QueueGroup,
        performer: Arc<dyn Performer>,
        config: SchedulerConfig,
        hook: ErrorHook,
    ) -> Result<Self> {
        Self::new(
            group.names.clone(),
            performer,
            config.with_max_threads(group.max_threads),
            hook,
        )
    }

    /// Ask the scheduler to poll its backend.
    ///
    /// - `Some(false)`: `queue_name` is set and this scheduler does not own
    ///   that queue; the pool was not touched.
    /// - `None`: the name matched (or none was given) but no worker was
    ///   free, or the scheduler is shut down. Not an error: a running poll
    ///   task will drain the backlog, or a later call rediscovers it.
    /// - `Some(true)`: a poll task was submitted.
    ///
    /// Never blocks.
    pub fn create_thread(&self, queue_name: Option<&str>) -> Option<bool> {
        self.core.create_thread(queue_name)
    }

    /// Stop the scheduler: cancel pending wakeup timers, refuse new poll
    /// tasks, and wait up to `timeout` (default from the config) for
    /// in-flight tasks. Idempotent; safe against concurrent
    /// [`create_thread`](Scheduler::create_thread) calls, which observe
    /// not-running and resolve to `None`.
    ///
    /// Closing the timer cache (not just clearing it) covers the poll task
    /// that passed its running check before shutdown began: wake times it
    /// reports afterwards are refused, not cached.
    ///
    /// # Errors
    ///
    /// Returns a join error if a worker panicked while stopping.
    pub fn shutdown(&self, timeout: Option<Duration>) -> Result<()> {
        self.core.timers.close();
        self.core
            .pool
            .shutdown(timeout.unwrap_or(self.core.shutdown_timeout))
    }

    /// Bring a stopped scheduler back up with a fresh pool and an empty
    /// timer cache. A no-op on a running scheduler.
    ///
    /// # Errors
    ///
    /// Returns a spawn error when worker threads cannot be recreated.
    pub fn restart(&self) -> Result<()> {
        if self.core.pool.is_running() {
            return Ok(());
        }
        self.core.timers.open();
        self.core.pool.start()
    }

    /// Whether the scheduler accepts poll tasks
    pub fn is_running(&self) -> bool {
        self.core.pool.is_running()
    }

    /// Rendered queue-name set of this scheduler's performer
    pub fn name(&self) -> &str {
        self.core.performer.name()
    }

    /// The queue names this scheduler owns
    pub fn queue_names(&self) -> &QueueNames {
        &self.core.names
    }

    /// Point-in-time snapshot of pool and timer-cache accounting
    pub fn stats(&self) -> SchedulerStats {
        self.core.stats()
    }

    /// Every scheduler constructed in this process, in construction order.
    ///
    /// Shutdown never removes an instance; see [`registry`].
    pub fn instances() -> Vec<Scheduler> {
        registry::instances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PerformedJob, SchedulerError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubPerformer {
        name: String,
        polls: AtomicUsize,
    }

    impl StubPerformer {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                polls: AtomicUsize::new(0),
            })
        }
    }

    impl Performer for StubPerformer {
        fn next(&self) -> Result<Option<PerformedJob>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn next_wake_times(&self) -> Vec<chrono::DateTime<Utc>> {
            Vec::new()
        }
    }

    fn quick_config(max_threads: usize) -> SchedulerConfig {
        SchedulerConfig::new(max_threads)
            .with_poll_interval(Duration::from_millis(10))
            .with_shutdown_timeout(Duration::from_secs(1))
    }

    fn explicit(names: &[&str]) -> QueueNames {
        QueueNames::Explicit(names.iter().map(|n| n.to_string()).collect())
    }

    #[test]
    fn test_unroutable_queue_returns_false() {
        let scheduler = Scheduler::new(
            explicit(&["mice"]),
            StubPerformer::new("mice"),
            quick_config(1),
            ErrorHook::noop(),
        )
        .expect("Failed to create scheduler");

        assert_eq!(scheduler.create_thread(Some("elephant")), Some(false));
        scheduler.shutdown(None).expect("Failed to shutdown");
    }

    #[test]
    fn test_fresh_scheduler_accepts_first_poll() {
        let scheduler = Scheduler::new(
            explicit(&["mice"]),
            StubPerformer::new("mice"),
            quick_config(1),
            ErrorHook::noop(),
        )
        .expect("Failed to create scheduler");

        // Full capacity is available from the first call, with no grace
        // period for workers to spin up.
        assert_eq!(scheduler.create_thread(Some("mice")), Some(true));
        scheduler.shutdown(None).expect("Failed to shutdown");
    }

    #[test]
    fn test_stats_invariants() {
        let scheduler = Scheduler::new(
            explicit(&["mice", "ferrets"]),
            StubPerformer::new("mice,ferrets"),
            quick_config(3).with_max_cache(7),
            ErrorHook::noop(),
        )
        .expect("Failed to create scheduler");

        let stats = scheduler.stats();
        assert_eq!(stats.name, "mice,ferrets");
        assert_eq!(stats.max_threads, 3);
        assert_eq!(stats.active_threads + stats.inactive_threads, 3);
        assert_eq!(stats.max_cache, 7);
        assert_eq!(stats.cache_count + stats.cache_remaining, 7);

        scheduler.shutdown(None).expect("Failed to shutdown");
    }

    #[test]
    fn test_zero_capacity_scheduler_never_submits() {
        let scheduler = Scheduler::new(
            explicit(&["mice"]),
            StubPerformer::new("mice"),
            quick_config(0),
            ErrorHook::noop(),
        )
        .expect("Failed to create scheduler");

        assert_eq!(scheduler.create_thread(Some("mice")), None);
        assert_eq!(scheduler.create_thread(None), None);
        scheduler.shutdown(None).expect("Failed to shutdown");
    }

    #[test]
    fn test_shutdown_then_restart() {
        let performer = StubPerformer::new("mice");
        let scheduler = Scheduler::new(
            explicit(&["mice"]),
            Arc::clone(&performer) as Arc<dyn Performer>,
            quick_config(1),
            ErrorHook::noop(),
        )
        .expect("Failed to create scheduler");

        assert!(scheduler.is_running());
        scheduler.shutdown(None).expect("Failed to shutdown");
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.create_thread(Some("mice")), None);

        scheduler.restart().expect("Failed to restart");
        assert!(scheduler.is_running());
        assert_eq!(scheduler.stats().cache_count, 0);

        scheduler.shutdown(None).expect("Failed to shutdown again");
    }

    #[test]
    fn test_restart_on_running_scheduler_is_noop() {
        let scheduler = Scheduler::new(
            explicit(&["mice"]),
            StubPerformer::new("mice"),
            quick_config(1),
            ErrorHook::noop(),
        )
        .expect("Failed to create scheduler");

        scheduler.restart().expect("Restart should be a no-op");
        assert!(scheduler.is_running());
        scheduler.shutdown(None).expect("Failed to shutdown");
    }

    #[test]
    fn test_shutdown_idempotent() {
        let scheduler = Scheduler::new(
            explicit(&["mice"]),
            StubPerformer::new("mice"),
            quick_config(1),
            ErrorHook::noop(),
        )
        .expect("Failed to create scheduler");

        scheduler.shutdown(None).expect("Failed to shutdown");
        scheduler.shutdown(None).expect("Second shutdown failed");
    }

    #[test]
    fn test_hook_receives_performer_error() {
        struct FailingPerformer;

        impl Performer for FailingPerformer {
            fn next(&self) -> Result<Option<PerformedJob>> {
                Err(SchedulerError::performer("mice", "backend gone"))
            }
            fn name(&self) -> &str {
                "mice"
            }
            fn next_wake_times(&self) -> Vec<chrono::DateTime<Utc>> {
                Vec::new()
            }
        }

        let errors = Arc::new(AtomicUsize::new(0));
        let errors_clone = Arc::clone(&errors);
        let scheduler = Scheduler::new(
            explicit(&["mice"]),
            Arc::new(FailingPerformer),
            quick_config(1),
            ErrorHook::new(move |_| {
                errors_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .expect("Failed to create scheduler");

        let mut submitted = 0;
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while submitted < 3 {
            assert!(std::time::Instant::now() < deadline, "submissions starved");
            if scheduler.create_thread(Some("mice")) == Some(true) {
                submitted += 1;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while errors.load(Ordering::SeqCst) < 3 {
            assert!(std::time::Instant::now() < deadline, "hook never invoked");
            std::thread::sleep(Duration::from_millis(10));
        }

        // One invocation per raised call, and the pool survived throughout.
        assert_eq!(errors.load(Ordering::SeqCst), 3);
        assert!(scheduler.is_running());
        scheduler.shutdown(None).expect("Failed to shutdown");
    }
}
