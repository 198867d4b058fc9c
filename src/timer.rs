//! Bounded cache of future wakeup timers.
//!
//! Without this cache, a scheduler whose jobs are all scheduled for the
//! future would either poll continuously (wasteful) or never wake again
//! until something is enqueued (stale). Each scheduler registers the wake
//! times its performer reports, and a timer thread fires a re-poll when one
//! comes due. The cache is bounded so a backlog of far-future jobs cannot
//! create unbounded timer load; an entry dropped at capacity is only a
//! delayed rediscovery, never lost work, because any later
//! `create_thread` call polls the backend again.

use crate::core::{Result, SchedulerError};
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

/// Upper bound on how long the timer thread sleeps with nothing due, so it
/// periodically re-checks whether its scheduler is still alive.
const IDLE_TICK: Duration = Duration::from_secs(1);

/// Something a due timer can wake. Implemented by the scheduler core as a
/// `create_thread(None)` call.
pub(crate) trait TimerTarget: Send + Sync {
    fn wake(&self);
}

struct TimerState {
    deadlines: BTreeSet<DateTime<Utc>>,
    closed: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

/// Bounded, deduplicated set of pending future-wakeup timestamps.
///
/// All mutation (`register`, firing, `clear`) is mutually exclusive: calls
/// arrive from arbitrary worker threads and from the timer thread
/// concurrently. A closed cache refuses every registration: a poll task
/// that outlives its scheduler's shutdown cannot re-arm a timer.
pub struct TimerCache {
    max_cache: usize,
    shared: Arc<TimerShared>,
}

impl std::fmt::Debug for TimerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerCache")
            .field("max_cache", &self.max_cache)
            .field("count", &self.count())
            .finish()
    }
}

impl TimerCache {
    /// Create an empty, open cache holding at most `max_cache` entries
    pub fn new(max_cache: usize) -> Self {
        Self {
            max_cache,
            shared: Arc::new(TimerShared {
                state: Mutex::new(TimerState {
                    deadlines: BTreeSet::new(),
                    closed: false,
                }),
                wakeup: Condvar::new(),
            }),
        }
    }

    /// Spawn the timer thread serving this cache.
    ///
    /// The thread holds only a weak reference to its target and exits once
    /// the target is gone. Called once, at scheduler construction; restart
    /// reuses the same thread.
    pub(crate) fn start(&self, thread_name: String, target: Weak<dyn TimerTarget>) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let name = thread_name.clone();
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || Self::run(shared, target, name))
            .map_err(|e| {
                SchedulerError::spawn_with_source(thread_name, "cannot spawn timer thread", e)
            })?;
        Ok(())
    }

    /// Register a wakeup at `timestamp`.
    ///
    /// Returns `false` without effect when the cache is closed, when an
    /// entry for that exact timestamp already exists, or when the cache is
    /// at capacity (the candidate is silently dropped). Otherwise the entry
    /// is added and the timer thread re-armed.
    pub fn register(&self, timestamp: DateTime<Utc>) -> bool {
        let mut state = self.shared.state.lock();
        if state.closed
            || state.deadlines.contains(&timestamp)
            || state.deadlines.len() >= self.max_cache
        {
            return false;
        }
        state.deadlines.insert(timestamp);
        self.shared.wakeup.notify_one();
        true
    }

    /// Cancel all pending entries
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        state.deadlines.clear();
        self.shared.wakeup.notify_one();
    }

    /// Cancel all pending entries and refuse registrations until
    /// [`open`](TimerCache::open). Clearing and closing happen under one
    /// lock, so an entry can neither survive the close nor sneak in behind
    /// it from a still-running poll task.
    pub(crate) fn close(&self) {
        let mut state = self.shared.state.lock();
        state.deadlines.clear();
        state.closed = true;
        self.shared.wakeup.notify_one();
    }

    /// Accept registrations again after a close
    pub(crate) fn open(&self) {
        self.shared.state.lock().closed = false;
    }

    /// Number of pending entries
    pub fn count(&self) -> usize {
        self.shared.state.lock().deadlines.len()
    }

    /// Maximum number of entries
    pub fn max_cache(&self) -> usize {
        self.max_cache
    }

    /// Timer thread loop: sleep until the earliest deadline, remove due
    /// entries, then fire them. Entries are removed before the wake runs so
    /// capacity is free by the time the re-poll happens.
    fn run(shared: Arc<TimerShared>, target: Weak<dyn TimerTarget>, name: String) {
        log::debug!("timer thread '{}' started", name);

        loop {
            if target.strong_count() == 0 {
                break;
            }

            let due: Vec<DateTime<Utc>> = {
                let mut state = shared.state.lock();
                let now = Utc::now();
                let due: Vec<DateTime<Utc>> = state
                    .deadlines
                    .iter()
                    .take_while(|t| **t <= now)
                    .copied()
                    .collect();

                if due.is_empty() {
                    let wait = match state.deadlines.iter().next() {
                        Some(next) => (*next - now)
                            .to_std()
                            .unwrap_or(Duration::ZERO)
                            .min(IDLE_TICK),
                        None => IDLE_TICK,
                    };
                    shared.wakeup.wait_for(&mut state, wait);
                    continue;
                }

                for timestamp in &due {
                    state.deadlines.remove(timestamp);
                }
                due
            };

            match target.upgrade() {
                Some(target) => {
                    for _ in due {
                        target.wake();
                    }
                }
                None => break,
            }
        }

        log::debug!("timer thread '{}' stopped", name);
    }
}
