use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `tasks`, `executions`, `reports` and `queue_jobs` tables
/// (idempotent). Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT    NOT NULL PRIMARY KEY,
            name        TEXT    NOT NULL,
            enabled     INTEGER NOT NULL DEFAULT 1,
            interval    TEXT    NOT NULL,   -- EVERY_10_MINUTES | EVERY_HOUR | …
            url_list    TEXT    NOT NULL,   -- JSON array of URLs, in order
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        ) STRICT;

        -- Cadence query: WHERE interval = ? AND enabled = 1
        CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks (interval, enabled);

        CREATE TABLE IF NOT EXISTS executions (
            id          TEXT NOT NULL PRIMARY KEY,
            task_id     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_executions_task ON executions (task_id, created_at);

        CREATE TABLE IF NOT EXISTS reports (
            id            TEXT NOT NULL PRIMARY KEY,
            task_id       TEXT NOT NULL,
            execution_id  TEXT NOT NULL,
            url           TEXT NOT NULL,
            form_factor   TEXT NOT NULL,   -- MOBILE | DESKTOP
            result        TEXT,            -- JSON written by the report worker
            created_at    TEXT NOT NULL,
            UNIQUE (execution_id, url, form_factor)
        ) STRICT;

        CREATE TABLE IF NOT EXISTS queue_jobs (
            id           TEXT NOT NULL PRIMARY KEY,
            queue        TEXT NOT NULL,
            report_id    TEXT NOT NULL,
            payload      TEXT NOT NULL,   -- JSON-encoded ReportJob
            status       TEXT NOT NULL DEFAULT 'waiting',
            enqueued_at  TEXT NOT NULL
        ) STRICT;

        -- Worker polling: WHERE queue = ? AND status = 'waiting' ORDER BY enqueued_at
        CREATE INDEX IF NOT EXISTS idx_queue_jobs_status ON queue_jobs (queue, status, enqueued_at);
        CREATE INDEX IF NOT EXISTS idx_queue_jobs_report ON queue_jobs (report_id);
        ",
    )?;
    Ok(())
}
