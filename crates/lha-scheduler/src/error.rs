use thiserror::Error;

use lha_core::TaskInterval;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A record or queue payload could not be (de)serialised.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store cannot serve requests (lock poisoned, connection lost, …).
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// No task with the given ID exists in the store.
    #[error("Task not found: {id}")]
    TaskNotFound { id: String },

    /// A stored row holds a value the scheduler cannot interpret.
    #[error("Invalid record in {table}: {reason}")]
    InvalidRecord { table: &'static str, reason: String },

    /// The queue refused or could not accept a job.
    #[error("Queue submission failed: {0}")]
    QueueSubmission(String),

    /// A previous batch of the same cadence is still running.
    #[error("Batch already running for {interval}")]
    BatchInProgress { interval: TaskInterval },

    /// The given name does not match any cadence.
    #[error("Unknown cadence: {0}")]
    UnknownCadence(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
