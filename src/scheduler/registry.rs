//! Process-wide registry of live schedulers.
//!
//! Every [`Scheduler`](crate::scheduler::Scheduler) registers itself on
//! construction. The registry is append-only for the life of the process:
//! shutdown stops a scheduler's pool but never unregisters the instance, so
//! introspection keeps seeing it. The registry is initialized lazily on the
//! first construction and has no implicit teardown; [`clear`] exists for
//! test isolation only.

use crate::core::Result;
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use std::time::Duration;

static INSTANCES: Mutex<Vec<Scheduler>> = parking_lot::const_mutex(Vec::new());

/// Record a newly constructed scheduler
pub(crate) fn register(scheduler: &Scheduler) {
    INSTANCES.lock().push(scheduler.clone());
}

/// Snapshot of every scheduler constructed in this process, in
/// construction order
pub fn instances() -> Vec<Scheduler> {
    INSTANCES.lock().clone()
}

/// Shut down every registered scheduler, waiting up to `timeout` each.
///
/// # Errors
///
/// Returns the first join failure encountered; remaining schedulers are
/// still shut down.
pub fn shutdown_all(timeout: Duration) -> Result<()> {
    let mut first_error = None;
    for scheduler in instances() {
        if let Err(e) = scheduler.shutdown(Some(timeout)) {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Forget all registered schedulers.
///
/// Intended for test isolation; production code never unregisters.
pub fn clear() {
    INSTANCES.lock().clear();
}
