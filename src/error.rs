//! Error types for the job tracker.

use std::path::PathBuf;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors reported to callers of the job store.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Job {id} not found")]
    NotFound { id: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The backing document could not be read or written.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed document {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Job {id} already exists in the document")]
    DuplicateId { id: String },

    #[error("Write queue error: {0}")]
    Queue(#[from] WriteQueueError),
}

/// Failures of the serial write queue itself, as opposed to the task it ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteQueueError {
    #[error("write queue worker is gone")]
    Closed,

    #[error("write task panicked: {0}")]
    Panicked(String),
}

/// Scheduler errors. Ticks log these, they never stop the loop.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid schedule '{expr}': {reason}")]
    InvalidSchedule { expr: String, reason: String },

    #[error("Batch completion failed: {0}")]
    Store(#[from] JobError),

    #[error("Audit log write failed: {0}")]
    Audit(#[source] StorageError),
}

/// Result type alias for the job tracker.
pub type Result<T> = std::result::Result<T, Error>;
