use serde::{Deserialize, Serialize};

use lha_core::{ExecutionId, FormFactor, JobId, ReportId, ReportJob, TaskId, TaskInterval};

use crate::error::SchedulerError;

/// A persisted monitoring configuration.
///
/// Owned by the task CRUD service; the scheduler only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Human-readable label shown in logs.
    pub name: String,
    /// Disabled tasks are never selected by a cadence trigger.
    pub enabled: bool,
    pub interval: TaskInterval,
    /// Target URLs in configured order. An empty list produces an execution
    /// with no reports.
    pub url_list: Vec<String>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 timestamp of the last edit.
    pub updated_at: String,
}

/// Fields needed to register a task; IDs and timestamps are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub enabled: bool,
    pub interval: TaskInterval,
    pub url_list: Vec<String>,
}

impl NewTask {
    pub fn new(name: impl Into<String>, interval: TaskInterval, url_list: Vec<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            interval,
            url_list,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One firing of a task. Groups the reports produced by that firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub task_id: TaskId,
    /// RFC3339 timestamp assigned at creation.
    pub created_at: String,
}

/// Measurement shell for one URL under one form factor within one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub task_id: TaskId,
    pub execution_id: ExecutionId,
    pub url: String,
    pub form_factor: FormFactor,
    /// Attached later by the report worker; always `None` when the scheduler creates it.
    pub result: Option<serde_json::Value>,
    pub created_at: String,
}

impl Report {
    /// Build the queue payload announcing this report.
    pub fn to_job(&self, enqueued_at: &str) -> ReportJob {
        ReportJob {
            job_id: JobId::new(),
            report_id: self.id.clone(),
            task_id: self.task_id.clone(),
            execution_id: self.execution_id.clone(),
            url: self.url.clone(),
            form_factor: self.form_factor,
            enqueued_at: enqueued_at.to_string(),
        }
    }
}

/// Fixed wall-clock recurrence class; each one selects exactly one [`TaskInterval`].
///
/// | Cadence      | Fires                                   | Interval           |
/// |--------------|-----------------------------------------|--------------------|
/// | `TenMinutes` | :00, :10, … :50 of every hour           | `EVERY_10_MINUTES` |
/// | `Hourly`     | top of every hour                       | `EVERY_HOUR`       |
/// | `Daily`      | 00:00 every day                         | `EVERY_DAY`        |
/// | `Weekend`    | 00:00 on Saturday and on Sunday         | `EVERY_WEEKEND`    |
/// | `Monthly`    | 00:00 on the 1st of the month           | `EVERY_MONTH`      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cadence {
    TenMinutes,
    Hourly,
    Daily,
    Weekend,
    Monthly,
}

impl Cadence {
    pub const ALL: [Cadence; 5] = [
        Cadence::TenMinutes,
        Cadence::Hourly,
        Cadence::Daily,
        Cadence::Weekend,
        Cadence::Monthly,
    ];

    /// The only interval this cadence ever selects.
    pub fn interval(&self) -> TaskInterval {
        match self {
            Cadence::TenMinutes => TaskInterval::Every10Minutes,
            Cadence::Hourly => TaskInterval::EveryHour,
            Cadence::Daily => TaskInterval::EveryDay,
            Cadence::Weekend => TaskInterval::EveryWeekend,
            Cadence::Monthly => TaskInterval::EveryMonth,
        }
    }

    pub fn for_interval(interval: TaskInterval) -> Self {
        match interval {
            TaskInterval::Every10Minutes => Cadence::TenMinutes,
            TaskInterval::EveryHour => Cadence::Hourly,
            TaskInterval::EveryDay => Cadence::Daily,
            TaskInterval::EveryWeekend => Cadence::Weekend,
            TaskInterval::EveryMonth => Cadence::Monthly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::TenMinutes => "ten-minutes",
            Cadence::Hourly => "hourly",
            Cadence::Daily => "daily",
            Cadence::Weekend => "weekend",
            Cadence::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Cadence {
    type Err = SchedulerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Cadence::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SchedulerError::UnknownCadence(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadences_partition_the_intervals() {
        for interval in TaskInterval::ALL {
            let claimed: Vec<_> = Cadence::ALL
                .into_iter()
                .filter(|c| c.interval() == interval)
                .collect();
            assert_eq!(claimed, vec![Cadence::for_interval(interval)]);
        }
    }

    #[test]
    fn cadence_names_round_trip() {
        for cadence in Cadence::ALL {
            assert_eq!(cadence.as_str().parse::<Cadence>().unwrap(), cadence);
        }
        assert!(matches!(
            "yearly".parse::<Cadence>(),
            Err(SchedulerError::UnknownCadence(_))
        ));
    }

    #[test]
    fn report_job_carries_back_references() {
        let report = Report {
            id: ReportId::from("r-1"),
            task_id: TaskId::from("t-1"),
            execution_id: ExecutionId::from("e-1"),
            url: "https://x".to_string(),
            form_factor: FormFactor::Desktop,
            result: None,
            created_at: "now".to_string(),
        };
        let job = report.to_job("later");
        assert_eq!(job.report_id, report.id);
        assert_eq!(job.task_id, report.task_id);
        assert_eq!(job.execution_id, report.execution_id);
        assert_eq!(job.form_factor, FormFactor::Desktop);
        assert_eq!(job.enqueued_at, "later");
    }
}
