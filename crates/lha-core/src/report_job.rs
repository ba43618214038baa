//! Queue job payload shared between the scheduler and the report workers.

use serde::{Deserialize, Serialize};

use crate::types::{ExecutionId, FormFactor, JobId, ReportId, TaskId};

/// Default name of the queue report jobs are submitted to.
pub const REPORT_QUEUE: &str = "report-generate-lighthouse-lhr";

/// Stored as a JSON string in the `queue_jobs.payload` column (or sent as-is
/// over the in-process channel).
///
/// Carries the report's back-references so a worker can attach results
/// without looking the report up first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportJob {
    pub job_id: JobId,
    pub report_id: ReportId,
    pub task_id: TaskId,
    pub execution_id: ExecutionId,
    pub url: String,
    pub form_factor: FormFactor,
    /// RFC3339 timestamp of the submission.
    pub enqueued_at: String,
}
