//! Persistence seams used by the cadence triggers and the fan-out.
//!
//! Each trait is object-safe so the orchestrator can hold `Arc<dyn …>` and
//! tests can swap in fakes. [`crate::sqlite::SqliteStore`] implements all three.

use async_trait::async_trait;

use lha_core::{ExecutionId, FormFactor, TaskId, TaskInterval};

use crate::error::Result;
use crate::types::{Execution, Report, Task};

/// Read-only view of the task definitions.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All enabled tasks with the given interval, oldest first.
    ///
    /// An empty result is valid. Implementations must never return disabled tasks.
    async fn find_due_tasks(&self, interval: TaskInterval) -> Result<Vec<Task>>;
}

/// Creates the record marking one firing of a task.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist and return a new execution referencing `task.id`.
    async fn create_execution(&self, task: &Task) -> Result<Execution>;
}

/// Creates measurement shells.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist and return a report with exactly these fields and no result.
    async fn create_report(
        &self,
        task_id: &TaskId,
        execution_id: &ExecutionId,
        url: &str,
        form_factor: FormFactor,
    ) -> Result<Report>;
}
