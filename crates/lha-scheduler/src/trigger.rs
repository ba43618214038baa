use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    error::{Result, SchedulerError},
    fanout::{FanOut, FanOutSummary},
    store::TaskStore,
    types::{Cadence, Task},
};

/// Runs one cadence's batch: select the due tasks, then fan them out.
///
/// At most one batch per trigger is in flight; a firing that overlaps a
/// running batch is rejected with [`SchedulerError::BatchInProgress`].
pub struct CadenceTrigger {
    cadence: Cadence,
    tasks: Arc<dyn TaskStore>,
    fan_out: FanOut,
    running: Mutex<()>,
}

impl CadenceTrigger {
    pub fn new(cadence: Cadence, tasks: Arc<dyn TaskStore>, fan_out: FanOut) -> Self {
        Self {
            cadence,
            tasks,
            fan_out,
            running: Mutex::new(()),
        }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Fire once. Returns after every unit of the batch has finished.
    ///
    /// Start and finish are always logged, whatever the outcome. Per-task and
    /// per-URL failures are absorbed into the summary; only a skipped firing
    /// or a failed task query surfaces as an error.
    pub async fn fire(&self) -> Result<FanOutSummary> {
        let interval = self.cadence.interval();
        info!(cadence = %self.cadence, %interval, "cadence batch started");

        let outcome = self.run_batch().await;
        match &outcome {
            Ok(summary) => info!(
                cadence = %self.cadence,
                tasks = summary.tasks,
                executions = summary.executions,
                reports = summary.reports,
                jobs = summary.jobs_enqueued,
                failures = summary.failures(),
                "cadence batch finished"
            ),
            Err(e @ SchedulerError::BatchInProgress { .. }) => {
                warn!(cadence = %self.cadence, "{e}; firing skipped");
                info!(cadence = %self.cadence, outcome = "skipped", "cadence batch finished");
            }
            Err(e) => {
                error!(cadence = %self.cadence, error = %e, "due task query failed; no task processed");
                info!(cadence = %self.cadence, outcome = "failed", "cadence batch finished");
            }
        }
        outcome
    }

    async fn run_batch(&self) -> Result<FanOutSummary> {
        let interval = self.cadence.interval();
        let _batch = self
            .running
            .try_lock()
            .map_err(|_| SchedulerError::BatchInProgress { interval })?;

        let due = self.tasks.find_due_tasks(interval).await?;
        let due = self.drop_misclassified(due);
        Ok(self.fan_out.run(due).await)
    }

    /// Keep only enabled tasks of this cadence's interval.
    ///
    /// The store is expected to filter already; anything else reaching this
    /// point is a store defect and is never fanned out.
    fn drop_misclassified(&self, tasks: Vec<Task>) -> Vec<Task> {
        let interval = self.cadence.interval();
        tasks
            .into_iter()
            .filter(|task| {
                let selected = task.enabled && task.interval == interval;
                if !selected {
                    error!(
                        cadence = %self.cadence,
                        task_id = %task.id,
                        task_interval = %task.interval,
                        enabled = task.enabled,
                        "task store returned a task outside this cadence; dropped"
                    );
                }
                selected
            })
            .collect()
    }
}
