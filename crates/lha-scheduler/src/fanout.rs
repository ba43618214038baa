//! Fan-out of due tasks into executions, report shells and queue jobs.
//!
//! Every task is an independent unit, and so is every URL of a task. Units
//! run concurrently and are joined before [`FanOut::run`] returns, so the
//! returned [`FanOutSummary`] accounts for every unit. A failing unit is
//! logged and counted; it never cancels its siblings.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use lha_core::{ExecutionId, FormFactor, TaskId};

use crate::{
    queue::JobSubmitter,
    store::{ExecutionStore, ReportStore},
    types::{Report, Task},
};

/// What one fan-out run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutSummary {
    /// Tasks handed to the run.
    pub tasks: usize,
    pub executions: usize,
    /// Report shells persisted (including orphans).
    pub reports: usize,
    pub jobs_enqueued: usize,
    pub execution_failures: usize,
    pub report_failures: usize,
    /// Reports persisted without a successful queue submission.
    pub orphaned_reports: usize,
    /// Units that panicked and were caught at the join barrier.
    pub panicked_units: usize,
}

impl FanOutSummary {
    fn merge(&mut self, other: FanOutSummary) {
        self.tasks += other.tasks;
        self.executions += other.executions;
        self.reports += other.reports;
        self.jobs_enqueued += other.jobs_enqueued;
        self.execution_failures += other.execution_failures;
        self.report_failures += other.report_failures;
        self.orphaned_reports += other.orphaned_reports;
        self.panicked_units += other.panicked_units;
    }

    /// Total failed units of any kind.
    pub fn failures(&self) -> usize {
        self.execution_failures + self.report_failures + self.orphaned_reports + self.panicked_units
    }
}

/// The fan-out pipeline. Cheap to clone; clones share stores and the concurrency budget.
#[derive(Clone)]
pub struct FanOut {
    executions: Arc<dyn ExecutionStore>,
    reports: Arc<dyn ReportStore>,
    submitter: Arc<dyn JobSubmitter>,
    /// Bounds URL units in flight across every batch using this pipeline.
    permits: Arc<Semaphore>,
}

impl FanOut {
    /// `concurrency` is clamped to at least one unit.
    pub fn new(
        executions: Arc<dyn ExecutionStore>,
        reports: Arc<dyn ReportStore>,
        submitter: Arc<dyn JobSubmitter>,
        concurrency: usize,
    ) -> Self {
        Self {
            executions,
            reports,
            submitter,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Fan out every task and wait for all units to finish.
    pub async fn run(&self, tasks: Vec<Task>) -> FanOutSummary {
        let mut units = JoinSet::new();
        for task in tasks {
            let fan_out = self.clone();
            units.spawn(async move { fan_out.run_task(task).await });
        }

        let mut summary = FanOutSummary::default();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(task_summary) => summary.merge(task_summary),
                Err(e) => {
                    error!(error = %e, "task fan-out unit aborted");
                    summary.tasks += 1;
                    summary.panicked_units += 1;
                }
            }
        }
        summary
    }

    /// One task: create its execution, then fan out its URLs.
    ///
    /// A failed execution aborts only this task.
    pub async fn run_task(&self, task: Task) -> FanOutSummary {
        let mut summary = FanOutSummary {
            tasks: 1,
            ..FanOutSummary::default()
        };

        let execution = match self.executions.create_execution(&task).await {
            Ok(execution) => execution,
            Err(e) => {
                error!(task_id = %task.id, task = %task.name, error = %e, "execution creation failed; task skipped");
                summary.execution_failures = 1;
                return summary;
            }
        };
        summary.executions = 1;

        let mut units = JoinSet::new();
        for url in distinct_urls(&task) {
            let fan_out = self.clone();
            let task_id = task.id.clone();
            let execution_id = execution.id.clone();
            units.spawn(async move { fan_out.run_url(task_id, execution_id, url).await });
        }

        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(url_summary) => summary.merge(url_summary),
                Err(e) => {
                    error!(task_id = %task.id, execution_id = %execution.id, error = %e, "url unit aborted");
                    summary.panicked_units += 1;
                }
            }
        }

        debug!(
            task_id = %task.id,
            execution_id = %execution.id,
            reports = summary.reports,
            jobs = summary.jobs_enqueued,
            "task fan-out finished"
        );
        summary
    }

    /// One URL: create a report per form factor, then submit each.
    ///
    /// No job is submitted unless every shell exists; shells created before
    /// a failed sibling are left as orphans. Once all exist, the submissions
    /// are independent.
    async fn run_url(&self, task_id: TaskId, execution_id: ExecutionId, url: String) -> FanOutSummary {
        let mut summary = FanOutSummary::default();
        // Never closed, so acquisition only waits for a free slot.
        let _permit = self.permits.acquire().await.ok();

        let mut pair = Vec::with_capacity(FormFactor::ALL.len());
        for form_factor in FormFactor::ALL {
            match self
                .reports
                .create_report(&task_id, &execution_id, &url, form_factor)
                .await
            {
                Ok(report) => {
                    summary.reports += 1;
                    pair.push(report);
                }
                Err(e) => {
                    error!(%task_id, %execution_id, %url, %form_factor, error = %e, "report creation failed; url skipped");
                    for orphan in &pair {
                        warn!(
                            %task_id,
                            %execution_id,
                            report_id = %orphan.id,
                            form_factor = %orphan.form_factor,
                            orphan = true,
                            "report orphaned: sibling report could not be created"
                        );
                    }
                    summary.report_failures += 1;
                    summary.orphaned_reports += pair.len();
                    return summary;
                }
            }
        }

        for report in &pair {
            if self.submit(report).await {
                summary.jobs_enqueued += 1;
            } else {
                summary.orphaned_reports += 1;
            }
        }

        info!(
            %task_id,
            %execution_id,
            report_mobile = report_id(&pair, FormFactor::Mobile),
            report_desktop = report_id(&pair, FormFactor::Desktop),
            %url,
            "report pair dispatched"
        );
        summary
    }

    /// Submit one report; failures are logged as orphans.
    async fn submit(&self, report: &Report) -> bool {
        match self.submitter.enqueue(report).await {
            Ok(job_id) => {
                debug!(report_id = %report.id, %job_id, "report queued");
                true
            }
            Err(e) => {
                error!(
                    task_id = %report.task_id,
                    execution_id = %report.execution_id,
                    report_id = %report.id,
                    url = %report.url,
                    form_factor = %report.form_factor,
                    orphan = true,
                    error = %e,
                    "report orphaned: queue submission failed"
                );
                false
            }
        }
    }
}

fn report_id(pair: &[Report], form_factor: FormFactor) -> &str {
    pair.iter()
        .find(|r| r.form_factor == form_factor)
        .map_or("", |r| r.id.as_str())
}

/// URLs of `task` in configured order with repeats removed.
///
/// Keeps `(url, form factor)` unique within an execution.
fn distinct_urls(task: &Task) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::with_capacity(task.url_list.len());
    for url in &task.url_list {
        if seen.insert(url.as_str()) {
            urls.push(url.clone());
        } else {
            warn!(task_id = %task.id, %url, "duplicate url ignored");
        }
    }
    urls
}
