//! Routing facade over one scheduler per queue group

use crate::config::{self, QueueGroup};
use crate::core::{ErrorHook, Performer, Result, SchedulerError};
use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerStats};
use std::sync::Arc;
use std::time::Duration;

/// Routes poll requests across the schedulers built from one
/// configuration string.
///
/// A queue listed explicitly by any scheduler routes only to the
/// schedulers that list it; wildcard schedulers are the fallback for
/// everything else, regardless of declaration order.
///
/// # Example
///
/// ```rust,ignore
/// use queue_scheduler::prelude::*;
/// use std::sync::Arc;
///
/// let multi = MultiScheduler::from_spec(
///     "*:1;mice,ferrets:2;elephant:4",
///     |group| Arc::new(my_performer_for(group)),
///     SchedulerConfig::default(),
///     ErrorHook::noop(),
/// )?;
///
/// multi.create_thread(Some("elephant"));
/// ```
#[derive(Debug)]
pub struct MultiScheduler {
    schedulers: Vec<Scheduler>,
}

impl MultiScheduler {
    /// Wrap an existing set of schedulers
    #[must_use]
    pub fn new(schedulers: Vec<Scheduler>) -> Self {
        Self { schedulers }
    }

    /// Build one scheduler per queue group. The factory supplies each
    /// group's performer; each group's capacity overrides the configured
    /// `max_threads`.
    ///
    /// # Errors
    ///
    /// Returns the first scheduler construction error. Schedulers already
    /// built stay registered and running.
    pub fn from_groups<F>(
        groups: &[QueueGroup],
        mut performer_factory: F,
        config: SchedulerConfig,
        hook: ErrorHook,
    ) -> Result<Self>
    where
        F: FnMut(&QueueGroup) -> Arc<dyn Performer>,
    {
        let mut schedulers = Vec::with_capacity(groups.len());
        for group in groups {
            let performer = performer_factory(group);
            schedulers.push(Scheduler::from_group(
                group,
                performer,
                config.clone(),
                hook.clone(),
            )?);
        }
        Ok(Self::new(schedulers))
    }

    /// Parse a configuration string and build one scheduler per group.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for a malformed string, or the first
    /// scheduler construction error.
    pub fn from_spec<F>(
        configuration: &str,
        performer_factory: F,
        config: SchedulerConfig,
        hook: ErrorHook,
    ) -> Result<Self>
    where
        F: FnMut(&QueueGroup) -> Arc<dyn Performer>,
    {
        let groups = config::parse(configuration)?;
        Self::from_groups(&groups, performer_factory, config, hook)
    }

    /// Route a poll request.
    ///
    /// With a queue name: schedulers explicitly listing that queue are
    /// offered the request first; only if none lists it do wildcard
    /// schedulers see it. The first `Some(true)` wins. If every candidate
    /// declines, the result is `None` when at least one was out of
    /// capacity and `Some(false)` when no scheduler owns the queue.
    ///
    /// Without a queue name, every scheduler is a candidate in
    /// construction order.
    pub fn create_thread(&self, queue_name: Option<&str>) -> Option<bool> {
        match queue_name {
            Some(name) => {
                let listed: Vec<&Scheduler> = self
                    .schedulers
                    .iter()
                    .filter(|s| s.queue_names().lists(name))
                    .collect();
                if listed.is_empty() {
                    let wildcards: Vec<&Scheduler> = self
                        .schedulers
                        .iter()
                        .filter(|s| s.queue_names().is_wildcard())
                        .collect();
                    Self::offer(&wildcards, queue_name)
                } else {
                    Self::offer(&listed, queue_name)
                }
            }
            None => {
                let all: Vec<&Scheduler> = self.schedulers.iter().collect();
                Self::offer(&all, None)
            }
        }
    }

    fn offer(candidates: &[&Scheduler], queue_name: Option<&str>) -> Option<bool> {
        let mut saw_exhausted = false;
        for scheduler in candidates {
            match scheduler.create_thread(queue_name) {
                Some(true) => return Some(true),
                None => saw_exhausted = true,
                Some(false) => {}
            }
        }
        if saw_exhausted {
            None
        } else {
            Some(false)
        }
    }

    /// Shut down every scheduler, waiting up to `timeout` each.
    ///
    /// # Errors
    ///
    /// All schedulers are shut down even on failure; the first error is
    /// returned.
    pub fn shutdown(&self, timeout: Option<Duration>) -> Result<()> {
        let mut first_error: Option<SchedulerError> = None;
        for scheduler in &self.schedulers {
            if let Err(error) = scheduler.shutdown(timeout) {
                log::warn!("scheduler '{}' failed to shut down: {}", scheduler.name(), error);
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Restart every stopped scheduler.
    ///
    /// # Errors
    ///
    /// Returns the first restart error; remaining schedulers are still
    /// attempted.
    pub fn restart(&self) -> Result<()> {
        let mut first_error: Option<SchedulerError> = None;
        for scheduler in &self.schedulers {
            if let Err(error) = scheduler.restart() {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Snapshot of every scheduler, in construction order
    pub fn stats(&self) -> Vec<SchedulerStats> {
        self.schedulers.iter().map(Scheduler::stats).collect()
    }

    /// The routed schedulers
    pub fn schedulers(&self) -> &[Scheduler] {
        &self.schedulers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PerformedJob;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPerformer {
        name: String,
        polls: Arc<AtomicUsize>,
    }

    impl Performer for CountingPerformer {
        fn next(&self) -> Result<Option<PerformedJob>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn next_wake_times(&self) -> Vec<chrono::DateTime<chrono::Utc>> {
            Vec::new()
        }
    }

    fn quick_config() -> SchedulerConfig {
        SchedulerConfig::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_shutdown_timeout(Duration::from_secs(1))
    }

    fn build_multi(spec: &str) -> (MultiScheduler, Vec<Arc<AtomicUsize>>) {
        let mut counters = Vec::new();
        let multi = MultiScheduler::from_spec(
            spec,
            |group| {
                let polls = Arc::new(AtomicUsize::new(0));
                counters.push(Arc::clone(&polls));
                Arc::new(CountingPerformer {
                    name: group.names.to_string(),
                    polls,
                })
            },
            quick_config(),
            ErrorHook::noop(),
        )
        .expect("Failed to build multi scheduler");
        (multi, counters)
    }

    fn wait_for_polls(counter: &AtomicUsize) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) == 0 {
            assert!(std::time::Instant::now() < deadline, "poll never happened");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_explicit_listing_beats_wildcard() {
        let (multi, counters) = build_multi("*:1;mice,ferrets:2");

        assert_eq!(multi.create_thread(Some("mice")), Some(true));
        wait_for_polls(&counters[1]);
        assert_eq!(counters[0].load(Ordering::SeqCst), 0);

        multi.shutdown(None).expect("Failed to shutdown");
    }

    #[test]
    fn test_unlisted_queue_falls_back_to_wildcard() {
        let (multi, counters) = build_multi("*:1;mice,ferrets:2");

        assert_eq!(multi.create_thread(Some("elephant")), Some(true));
        wait_for_polls(&counters[0]);
        assert_eq!(counters[1].load(Ordering::SeqCst), 0);

        multi.shutdown(None).expect("Failed to shutdown");
    }

    #[test]
    fn test_unroutable_queue_without_wildcard() {
        let (multi, _counters) = build_multi("mice:1;elephant:1");

        assert_eq!(multi.create_thread(Some("giraffe")), Some(false));

        multi.shutdown(None).expect("Failed to shutdown");
    }

    #[test]
    fn test_wildcard_precedence_ignores_declaration_order() {
        // Wildcard declared last must still lose to the explicit listing.
        let (multi, counters) = build_multi("mice:1;*:1");

        assert_eq!(multi.create_thread(Some("mice")), Some(true));
        wait_for_polls(&counters[0]);
        assert_eq!(counters[1].load(Ordering::SeqCst), 0);

        multi.shutdown(None).expect("Failed to shutdown");
    }

    #[test]
    fn test_anonymous_request_offered_to_all() {
        let (multi, _counters) = build_multi("mice:1;elephant:1");

        assert_eq!(multi.create_thread(None), Some(true));

        multi.shutdown(None).expect("Failed to shutdown");
    }

    #[test]
    fn test_shutdown_and_restart_fan_out() {
        let (multi, _counters) = build_multi("mice:1;elephant:1");

        multi.shutdown(None).expect("Failed to shutdown");
        assert!(multi.schedulers().iter().all(|s| !s.is_running()));

        multi.restart().expect("Failed to restart");
        assert!(multi.schedulers().iter().all(|s| s.is_running()));

        multi.shutdown(None).expect("Failed to shutdown again");
    }

    #[test]
    fn test_stats_cover_every_group() {
        let (multi, _counters) = build_multi("*:1;mice,ferrets:2;elephant:4");

        let stats = multi.stats();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].name, "*");
        assert_eq!(stats[1].name, "mice,ferrets");
        assert_eq!(stats[1].max_threads, 2);
        assert_eq!(stats[2].max_threads, 4);

        multi.shutdown(None).expect("Failed to shutdown");
    }
}
