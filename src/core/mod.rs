//! Core types and traits for the scheduler

pub mod error;
pub mod hook;
pub mod performer;

pub use error::{Result, SchedulerError};
pub use hook::ErrorHook;
pub use performer::{PerformedJob, Performer};
