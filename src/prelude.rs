//! Convenient re-exports for common types and traits

pub use crate::config::{QueueGroup, QueueNames};
pub use crate::core::{ErrorHook, PerformedJob, Performer, Result, SchedulerError};
pub use crate::scheduler::{
    MultiScheduler, Scheduler, SchedulerConfig, SchedulerStats,
};
