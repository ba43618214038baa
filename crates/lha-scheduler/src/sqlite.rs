use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::{info, instrument, warn};

use lha_core::{ExecutionId, FormFactor, ReportId, TaskId, TaskInterval};

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    queue::SqliteJobQueue,
    store::{ExecutionStore, ReportStore, TaskStore},
    types::{Execution, NewTask, Report, Task},
};

const TASK_COLUMNS: &str = "id, name, enabled, interval, url_list, created_at, updated_at";
const REPORT_COLUMNS: &str =
    "id, task_id, execution_id, url, form_factor, result, created_at";

/// SQLite-backed task, execution and report store.
///
/// Wraps a single connection in a `Mutex`; every method holds the lock only
/// for the duration of one statement, never across an await point.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Wrap an open connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A job queue writing to this store's `queue_jobs` table over the same connection.
    pub fn job_queue(&self, queue: impl Into<String>) -> SqliteJobQueue {
        SqliteJobQueue::shared(Arc::clone(&self.conn), queue.into())
    }

    /// Register a task. Normally done by the task CRUD service; exposed for
    /// seeding and tests.
    pub fn insert_task(&self, task: NewTask) -> Result<Task> {
        let id = TaskId::new();
        let now = now_rfc3339();
        let url_json = serde_json::to_string(&task.url_list)?;

        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO tasks (id, name, enabled, interval, url_list, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            rusqlite::params![
                id.as_str(),
                task.name,
                task.enabled,
                task.interval.as_str(),
                url_json,
                now
            ],
        )?;
        info!(task_id = %id, name = %task.name, interval = %task.interval, "task registered");

        Ok(Task {
            id,
            name: task.name,
            enabled: task.enabled,
            interval: task.interval,
            url_list: task.url_list,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Enable or disable a task. Returns `TaskNotFound` if no row is updated.
    pub fn set_task_enabled(&self, id: &TaskId, enabled: bool) -> Result<()> {
        let conn = lock(&self.conn)?;
        let n = conn.execute(
            "UPDATE tasks SET enabled = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![enabled, now_rfc3339(), id.as_str()],
        )?;
        if n == 0 {
            return Err(SchedulerError::TaskNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// All executions of a task, oldest first.
    pub fn executions_for_task(&self, task_id: &TaskId) -> Result<Vec<Execution>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, task_id, created_at FROM executions
             WHERE task_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([task_id.as_str()], |row| {
            Ok(Execution {
                id: ExecutionId(row.get(0)?),
                task_id: TaskId(row.get(1)?),
                created_at: row.get(2)?,
            })
        })?;
        let executions = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(executions)
    }

    /// All reports grouped under an execution.
    pub fn reports_for_execution(&self, execution_id: &ExecutionId) -> Result<Vec<Report>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports
             WHERE execution_id = ?1 ORDER BY url, form_factor"
        ))?;
        let rows = stmt.query_map([execution_id.as_str()], ReportRow::from_row)?;
        let reports = rows
            .map(|r| r.map_err(SchedulerError::from).and_then(ReportRow::into_report))
            .collect::<Result<Vec<_>>>()?;
        Ok(reports)
    }

    /// Reports without a result that were never handed to any queue.
    ///
    /// These are left behind when a submission fails after the shell was
    /// persisted; reconciliation tooling uses this list to re-submit them.
    pub fn orphaned_reports(&self) -> Result<Vec<Report>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT r.id, r.task_id, r.execution_id, r.url, r.form_factor, r.result, r.created_at
             FROM reports r
             WHERE r.result IS NULL
               AND NOT EXISTS (SELECT 1 FROM queue_jobs q WHERE q.report_id = r.id)
             ORDER BY r.created_at, r.id",
        )?;
        let rows = stmt.query_map([], ReportRow::from_row)?;
        let reports = rows
            .map(|r| r.map_err(SchedulerError::from).and_then(ReportRow::into_report))
            .collect::<Result<Vec<_>>>()?;
        Ok(reports)
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    #[instrument(skip(self))]
    async fn find_due_tasks(&self, interval: TaskInterval) -> Result<Vec<Task>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE interval = ?1 AND enabled = 1
             ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([interval.as_str()], TaskRow::from_row)?;

        let mut tasks = Vec::new();
        for row in rows {
            // A single unreadable row must not hide every other task of the cadence.
            match row.map_err(SchedulerError::from).and_then(TaskRow::into_task) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(%interval, error = %e, "skipping unreadable task row"),
            }
        }
        Ok(tasks)
    }
}

#[async_trait]
impl ExecutionStore for SqliteStore {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn create_execution(&self, task: &Task) -> Result<Execution> {
        let execution = Execution {
            id: ExecutionId::new(),
            task_id: task.id.clone(),
            created_at: now_rfc3339(),
        };
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO executions (id, task_id, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                execution.id.as_str(),
                execution.task_id.as_str(),
                execution.created_at
            ],
        )?;
        Ok(execution)
    }
}

#[async_trait]
impl ReportStore for SqliteStore {
    #[instrument(skip(self, task_id, execution_id), fields(task_id = %task_id, execution_id = %execution_id))]
    async fn create_report(
        &self,
        task_id: &TaskId,
        execution_id: &ExecutionId,
        url: &str,
        form_factor: FormFactor,
    ) -> Result<Report> {
        let report = Report {
            id: ReportId::new(),
            task_id: task_id.clone(),
            execution_id: execution_id.clone(),
            url: url.to_string(),
            form_factor,
            result: None,
            created_at: now_rfc3339(),
        };
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO reports (id, task_id, execution_id, url, form_factor, result, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
            rusqlite::params![
                report.id.as_str(),
                report.task_id.as_str(),
                report.execution_id.as_str(),
                report.url,
                report.form_factor.as_str(),
                report.created_at
            ],
        )?;
        Ok(report)
    }
}

/// Lock a shared connection, turning a poisoned mutex into a store error.
pub(crate) fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| SchedulerError::StoreUnavailable("connection lock poisoned".to_string()))
}

/// Fixed-width UTC timestamp so `ORDER BY created_at` sorts chronologically.
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Raw `tasks` row before the interval and URL list are decoded.
struct TaskRow {
    id: String,
    name: String,
    enabled: bool,
    interval: String,
    url_list: String,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            enabled: row.get(2)?,
            interval: row.get(3)?,
            url_list: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_task(self) -> Result<Task> {
        let interval = self
            .interval
            .parse()
            .map_err(|reason| SchedulerError::InvalidRecord { table: "tasks", reason })?;
        let url_list = serde_json::from_str(&self.url_list).map_err(|e| {
            SchedulerError::InvalidRecord {
                table: "tasks",
                reason: format!("url_list of {}: {e}", self.id),
            }
        })?;
        Ok(Task {
            id: TaskId(self.id),
            name: self.name,
            enabled: self.enabled,
            interval,
            url_list,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Raw `reports` row before the form factor and result are decoded.
struct ReportRow {
    id: String,
    task_id: String,
    execution_id: String,
    url: String,
    form_factor: String,
    result: Option<String>,
    created_at: String,
}

impl ReportRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            execution_id: row.get(2)?,
            url: row.get(3)?,
            form_factor: row.get(4)?,
            result: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_report(self) -> Result<Report> {
        let form_factor = self
            .form_factor
            .parse()
            .map_err(|reason| SchedulerError::InvalidRecord { table: "reports", reason })?;
        let result = self
            .result
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()?;
        Ok(Report {
            id: ReportId(self.id),
            task_id: TaskId(self.task_id),
            execution_id: ExecutionId(self.execution_id),
            url: self.url,
            form_factor,
            result,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::JobSubmitter;

    fn store() -> SqliteStore {
        SqliteStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[tokio::test]
    async fn due_tasks_exclude_disabled_for_every_interval() {
        let store = store();
        for interval in TaskInterval::ALL {
            store
                .insert_task(NewTask::new("on", interval, urls(&["https://on"])))
                .unwrap();
            store
                .insert_task(NewTask::new("off", interval, urls(&["https://off"])).disabled())
                .unwrap();
        }

        for interval in TaskInterval::ALL {
            let due = store.find_due_tasks(interval).await.unwrap();
            assert_eq!(due.len(), 1, "{interval}");
            assert!(due.iter().all(|t| t.enabled && t.interval == interval));
            assert_eq!(due[0].name, "on");
        }
    }

    #[tokio::test]
    async fn disabling_a_task_removes_it_from_the_cadence() {
        let store = store();
        let task = store
            .insert_task(NewTask::new("a", TaskInterval::EveryHour, urls(&["https://x"])))
            .unwrap();
        store.set_task_enabled(&task.id, false).unwrap();

        assert!(store
            .find_due_tasks(TaskInterval::EveryHour)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn enabling_unknown_task_is_not_found() {
        let err = store()
            .set_task_enabled(&TaskId::from("missing"), true)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn due_tasks_keep_url_order_and_creation_order() {
        let store = store();
        let first = store
            .insert_task(NewTask::new(
                "first",
                TaskInterval::EveryDay,
                urls(&["https://b", "https://a"]),
            ))
            .unwrap();
        let second = store
            .insert_task(NewTask::new("second", TaskInterval::EveryDay, vec![]))
            .unwrap();

        let due = store.find_due_tasks(TaskInterval::EveryDay).await.unwrap();
        assert_eq!(due, vec![first, second]);
        assert_eq!(due[0].url_list, urls(&["https://b", "https://a"]));
    }

    #[tokio::test]
    async fn corrupt_task_row_is_skipped() {
        let store = store();
        store
            .insert_task(NewTask::new("good", TaskInterval::EveryMonth, urls(&["https://x"])))
            .unwrap();
        {
            let conn = lock(&store.conn).unwrap();
            conn.execute(
                "INSERT INTO tasks (id, name, enabled, interval, url_list, created_at, updated_at)
                 VALUES ('bad', 'bad', 1, 'EVERY_MONTH', 'not json', 'x', 'x')",
                [],
            )
            .unwrap();
        }

        let due = store.find_due_tasks(TaskInterval::EveryMonth).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "good");
    }

    #[tokio::test]
    async fn report_shell_has_exact_fields_and_no_result() {
        let store = store();
        let task = store
            .insert_task(NewTask::new("a", TaskInterval::EveryHour, urls(&["https://x"])))
            .unwrap();
        let execution = store.create_execution(&task).await.unwrap();
        assert_eq!(execution.task_id, task.id);

        let report = store
            .create_report(&task.id, &execution.id, "https://x", FormFactor::Desktop)
            .await
            .unwrap();
        assert_eq!(report.task_id, task.id);
        assert_eq!(report.execution_id, execution.id);
        assert_eq!(report.url, "https://x");
        assert_eq!(report.form_factor, FormFactor::Desktop);
        assert!(report.result.is_none());

        assert_eq!(store.reports_for_execution(&execution.id).unwrap(), vec![report]);
        assert_eq!(store.executions_for_task(&task.id).unwrap(), vec![execution]);
    }

    #[tokio::test]
    async fn unqueued_reports_are_orphans() {
        let store = store();
        let queue = store.job_queue("test");
        let task = store
            .insert_task(NewTask::new("a", TaskInterval::EveryHour, urls(&["https://x"])))
            .unwrap();
        let execution = store.create_execution(&task).await.unwrap();
        let queued = store
            .create_report(&task.id, &execution.id, "https://x", FormFactor::Mobile)
            .await
            .unwrap();
        let orphan = store
            .create_report(&task.id, &execution.id, "https://x", FormFactor::Desktop)
            .await
            .unwrap();

        queue.enqueue(&queued).await.unwrap();

        let orphans = store.orphaned_reports().unwrap();
        assert_eq!(orphans, vec![orphan]);
    }
}
