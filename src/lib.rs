//! # Queue Scheduler
//!
//! An in-process worker scheduler for background-job queue backends: thread pools,
//! bounded wakeup timers, and queue-name routing.
//!
//! ## Features
//!
//! - **Scheduler**: One queue group's thread pool plus a bounded cache of future wakeup timers
//! - **Multi Scheduler**: Routes poll requests across queue groups, explicit listings before wildcards
//! - **Configuration Grammar**: Parse `"*:1;mice,ferrets:2;elephant:4"` into queue groups
//! - **Pluggable Backend**: Bring your own job store through the [`Performer`] trait
//! - **Failure Isolation**: Performer errors flow to an [`ErrorHook`], never across threads
//! - **Graceful Shutdown**: Bounded waits for in-flight polls, idempotent, restartable
//!
//! ## Quick Start
//!
//! ```rust
//! use queue_scheduler::prelude::*;
//! use std::sync::Arc;
//!
//! // A performer that drains your job backend, one job per call.
//! struct Drained;
//!
//! impl Performer for Drained {
//!     fn next(&self) -> Result<Option<PerformedJob>> {
//!         Ok(None) // nothing queued right now
//!     }
//!
//!     fn name(&self) -> &str {
//!         "*"
//!     }
//!
//!     fn next_wake_times(&self) -> Vec<chrono::DateTime<chrono::Utc>> {
//!         Vec::new()
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let scheduler = Scheduler::new(
//!     QueueNames::Wildcard,
//!     Arc::new(Drained),
//!     SchedulerConfig::new(2),
//!     ErrorHook::noop(),
//! )?;
//!
//! // A job was enqueued: ask for a poll. Never blocks.
//! scheduler.create_thread(Some("mice"));
//!
//! scheduler.shutdown(None)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Routing Across Queue Groups
//!
//! ```rust
//! use queue_scheduler::prelude::*;
//! use std::sync::Arc;
//!
//! # struct Drained(String);
//! # impl Performer for Drained {
//! #     fn next(&self) -> Result<Option<PerformedJob>> { Ok(None) }
//! #     fn name(&self) -> &str { &self.0 }
//! #     fn next_wake_times(&self) -> Vec<chrono::DateTime<chrono::Utc>> { Vec::new() }
//! # }
//! # fn main() -> Result<()> {
//! let multi = MultiScheduler::from_spec(
//!     "*:1;mice,ferrets:2;elephant:4",
//!     |group| Arc::new(Drained(group.names.to_string())) as Arc<dyn Performer>,
//!     SchedulerConfig::default(),
//!     ErrorHook::noop(),
//! )?;
//!
//! // "mice" routes to its explicit group, "giraffe" to the wildcard.
//! multi.create_thread(Some("mice"));
//! multi.create_thread(Some("giraffe"));
//!
//! multi.shutdown(None)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! ```rust
//! # use queue_scheduler::prelude::*;
//! # use std::sync::Arc;
//! # struct Drained;
//! # impl Performer for Drained {
//! #     fn next(&self) -> Result<Option<PerformedJob>> { Ok(None) }
//! #     fn name(&self) -> &str { "*" }
//! #     fn next_wake_times(&self) -> Vec<chrono::DateTime<chrono::Utc>> { Vec::new() }
//! # }
//! # fn main() -> Result<()> {
//! # let scheduler = Scheduler::new(
//! #     QueueNames::Wildcard,
//! #     Arc::new(Drained),
//! #     SchedulerConfig::new(2),
//! #     ErrorHook::noop(),
//! # )?;
//! let stats = scheduler.stats();
//! println!(
//!     "{}: {}/{} threads busy, {} timers cached",
//!     stats.name, stats.active_threads, stats.max_threads, stats.cache_count
//! );
//! # scheduler.shutdown(None)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod pool;
pub mod prelude;
pub mod scheduler;
pub mod timer;

pub use crate::core::{ErrorHook, PerformedJob, Performer, Result, SchedulerError};
pub use config::{QueueGroup, QueueNames};
pub use scheduler::{MultiScheduler, Scheduler, SchedulerConfig, SchedulerStats};
