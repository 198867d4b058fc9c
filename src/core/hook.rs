//! Error hook invoked when a performer fails inside a poll task

use crate::core::error::SchedulerError;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Callback invoked synchronously, on the failing worker thread, whenever
/// `performer.next()` returns an error inside a poll task.
///
/// The hook is an explicit constructor dependency of every
/// [`Scheduler`](crate::scheduler::Scheduler) rather than mutable global
/// state, so scheduler behavior stays deterministic and testable. Hosts that
/// want a process-wide default can build one `ErrorHook` at startup and
/// clone it into each scheduler.
///
/// A panicking hook is caught and logged; it can never take the pool down
/// with it.
///
/// # Example
///
/// ```rust
/// use queue_scheduler::prelude::*;
///
/// let hook = ErrorHook::new(|error| {
///     eprintln!("background job polling failed: {}", error);
/// });
/// ```
#[derive(Clone)]
pub struct ErrorHook {
    callback: Arc<dyn Fn(&SchedulerError) + Send + Sync>,
}

impl ErrorHook {
    /// Create a hook from a callback
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&SchedulerError) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// A hook that does nothing
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Invoke the hook with a contained error.
    ///
    /// A panic raised by the callback is swallowed and logged.
    pub fn invoke(&self, error: &SchedulerError) {
        let callback = &self.callback;
        if catch_unwind(AssertUnwindSafe(|| callback(error))).is_err() {
            log::error!("error hook panicked while handling: {}", error);
        }
    }
}

impl Default for ErrorHook {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for ErrorHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHook").finish_non_exhaustive()
    }
}
