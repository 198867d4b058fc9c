//! Worker thread pool for poll tasks

mod thread_pool;
mod worker;

pub use thread_pool::ThreadPool;
pub use worker::Worker;

/// A poll task handed to a worker thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;
