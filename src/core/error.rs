//! Error types for the scheduler

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur in the scheduler
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SchedulerError {
    /// Malformed queue-configuration string
    #[error("Invalid queue specification '{spec}': {message}")]
    ConfigSyntax {
        /// The offending specification string
        spec: String,
        /// What was wrong with it
        message: String,
    },

    /// Thread pool is already running with details
    #[error("Thread pool '{pool_name}' is already running with {worker_count} workers")]
    AlreadyRunning {
        /// Name of the thread pool
        pool_name: String,
        /// Number of worker threads
        worker_count: usize,
    },

    /// Failed to spawn a worker or timer thread with details
    #[error("Failed to spawn thread '{thread_name}': {message}")]
    SpawnError {
        /// Name of the thread that failed to spawn
        thread_name: String,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{thread_id}: {message}")]
    JoinError {
        /// ID of the thread that failed to join
        thread_id: usize,
        /// Error message
        message: String,
    },

    /// A performer raised while fetching or running a job.
    ///
    /// Always caught at the poll-task boundary and forwarded to the
    /// [`ErrorHook`](crate::core::ErrorHook); never propagated to the pool.
    #[error("Performer '{performer}' failed: {message}")]
    Performer {
        /// Name of the failing performer
        performer: String,
        /// Error message
        message: String,
        /// Underlying error, when the performer supplied one
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl SchedulerError {
    /// Create a config syntax error
    pub fn config_syntax(spec: impl Into<String>, message: impl Into<String>) -> Self {
        SchedulerError::ConfigSyntax {
            spec: spec.into(),
            message: message.into(),
        }
    }

    /// Create an already running error
    pub fn already_running(pool_name: impl Into<String>, worker_count: usize) -> Self {
        SchedulerError::AlreadyRunning {
            pool_name: pool_name.into(),
            worker_count,
        }
    }

    /// Create a spawn error
    pub fn spawn(thread_name: impl Into<String>, message: impl Into<String>) -> Self {
        SchedulerError::SpawnError {
            thread_name: thread_name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_name: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        SchedulerError::SpawnError {
            thread_name: thread_name.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_id: usize, message: impl Into<String>) -> Self {
        SchedulerError::JoinError {
            thread_id,
            message: message.into(),
        }
    }

    /// Create a performer error
    pub fn performer(performer: impl Into<String>, message: impl Into<String>) -> Self {
        SchedulerError::Performer {
            performer: performer.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a performer error wrapping an underlying error
    pub fn performer_with_source(
        performer: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SchedulerError::Performer {
            performer: performer.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        SchedulerError::Other(msg.into())
    }
}
