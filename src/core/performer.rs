//! Performer trait and related types

use crate::core::error::Result;
use chrono::{DateTime, Utc};
use std::fmt;

/// Receipt for a single job performed by a [`Performer`].
///
/// The scheduler never inspects job payloads; this carries just enough for
/// logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformedJob {
    /// Queue the job was pulled from
    pub queue: String,
    /// Backend identifier of the job, when the performer has one
    pub job_id: Option<String>,
}

impl PerformedJob {
    /// Create a receipt for a job from the given queue
    pub fn new<S: Into<String>>(queue: S) -> Self {
        Self {
            queue: queue.into(),
            job_id: None,
        }
    }

    /// Attach the backend's job identifier
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_job_id<S: Into<String>>(mut self, job_id: S) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}

/// The external job-fetching and execution collaborator.
///
/// A performer owns persistence, row locking, and actually running job code.
/// The scheduler only decides *when* to call it and on how many threads.
/// Each [`Scheduler`](crate::scheduler::Scheduler) holds exactly one
/// performer, scoped to that scheduler's queue names.
///
/// # Contract
///
/// - [`next()`](Performer::next) may block for as long as one job takes to
///   run; the scheduler imposes no timeout on it.
/// - Errors returned from `next()` are contained at the poll-task boundary
///   and forwarded to the configured [`ErrorHook`](crate::core::ErrorHook);
///   they never crash the pool.
pub trait Performer: Send + Sync {
    /// Fetch, lock, and run the next available job.
    ///
    /// Returns `Ok(Some(_))` when a job was performed, `Ok(None)` when no
    /// job was available.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails (for example, a lost
    /// database connection). Job-level failures are the performer's own
    /// concern and must not surface here.
    fn next(&self) -> Result<Option<PerformedJob>>;

    /// Display name of this performer's queue scope, e.g. `"mice,ferrets"`
    /// or `"*"`.
    fn name(&self) -> &str;

    /// Timestamps at which future work may become available.
    ///
    /// Called after `next()` returns `Ok(None)` so the scheduler can wake
    /// itself instead of polling continuously. May return an empty vec.
    fn next_wake_times(&self) -> Vec<DateTime<Utc>>;
}

impl fmt::Debug for dyn Performer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Performer({})", self.name())
    }
}
