use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use lha_core::{config::QueueConfig, JobId, ReportJob};

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    sqlite::{lock, now_rfc3339},
    types::Report,
};

/// Hands created reports to the asynchronous work queue.
///
/// Returns once the submission itself is accepted, never once the job is
/// processed. A failed submission leaves the report persisted but unqueued.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn enqueue(&self, report: &Report) -> Result<JobId>;
}

/// Durable queue backed by the `queue_jobs` table.
///
/// Report workers poll `status = 'waiting'` rows of their queue; everything
/// past `waiting` belongs to them.
pub struct SqliteJobQueue {
    conn: Arc<Mutex<Connection>>,
    queue: String,
}

impl SqliteJobQueue {
    /// Open a queue on its own connection, initialising the schema if needed.
    pub fn new(conn: Connection, queue: impl Into<String>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self::shared(Arc::new(Mutex::new(conn)), queue.into()))
    }

    pub(crate) fn shared(conn: Arc<Mutex<Connection>>, queue: String) -> Self {
        Self { conn, queue }
    }

    pub fn name(&self) -> &str {
        &self.queue
    }

    /// Jobs not yet picked up by a worker, oldest first.
    pub fn waiting_jobs(&self) -> Result<Vec<ReportJob>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT payload FROM queue_jobs
             WHERE queue = ?1 AND status = 'waiting'
             ORDER BY enqueued_at, id",
        )?;
        let payloads = stmt
            .query_map([&self.queue], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let jobs = payloads
            .iter()
            .map(|p| serde_json::from_str(p))
            .collect::<serde_json::Result<Vec<ReportJob>>>()?;
        Ok(jobs)
    }
}

#[async_trait]
impl JobSubmitter for SqliteJobQueue {
    async fn enqueue(&self, report: &Report) -> Result<JobId> {
        let job = report.to_job(&now_rfc3339());
        let payload = serde_json::to_string(&job)?;

        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO queue_jobs (id, queue, report_id, payload, status, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, 'waiting', ?5)",
            rusqlite::params![
                job.job_id.as_str(),
                self.queue,
                job.report_id.as_str(),
                payload,
                job.enqueued_at
            ],
        )?;
        debug!(job_id = %job.job_id, report_id = %job.report_id, queue = %self.queue, "job enqueued");
        Ok(job.job_id)
    }
}

/// In-process queue: jobs go to a bounded tokio channel read by a co-located worker.
///
/// Uses `try_send` so a slow consumer never stalls the fan-out; a full or
/// closed channel is reported as a failed submission.
#[derive(Clone)]
pub struct ChannelJobQueue {
    tx: mpsc::Sender<ReportJob>,
}

impl ChannelJobQueue {
    /// Create a queue and the receiver the worker should drain.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ReportJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Sized from `[queue] channel_capacity`.
    pub fn from_config(config: &QueueConfig) -> (Self, mpsc::Receiver<ReportJob>) {
        Self::new(config.channel_capacity.max(1))
    }
}

#[async_trait]
impl JobSubmitter for ChannelJobQueue {
    async fn enqueue(&self, report: &Report) -> Result<JobId> {
        let job = report.to_job(&now_rfc3339());
        let job_id = job.job_id.clone();
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => SchedulerError::QueueSubmission("channel full".to_string()),
            TrySendError::Closed(_) => {
                SchedulerError::QueueSubmission("channel closed".to_string())
            }
        })?;
        Ok(job_id)
    }
}
