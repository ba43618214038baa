use std::sync::Arc;

use clap::Parser;
use tracing::info;

use lha_core::LhaConfig;
use lha_scheduler::{FanOut, SchedulerEngine, SqliteStore};

mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lha_daemon=info,lha_scheduler=info".into()),
        )
        .init();

    let cli = Cli::parse();
    info!(version = cli::VERSION, "lha-daemon starting");

    // load config: --config > LHA_CONFIG env > ~/.lha/lha.toml
    let config_path = cli.config_path();
    let config = LhaConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        LhaConfig::default()
    });

    let store = open_store(&config)?;
    let engine = build_engine(&config, &store);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => commands::run(engine).await,
        Command::Fire { cadence } => commands::fire(&engine, cadence).await,
        Command::Next => commands::next(&engine),
        Command::Orphans => commands::orphans(&store),
    }
}

/// Open the SQLite database and run the (idempotent) schema setup.
fn open_store(config: &LhaConfig) -> anyhow::Result<SqliteStore> {
    let db_path = &config.database.path;
    config.database.ensure_parent_dir()?;
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(SqliteStore::new(db)?)
}

/// Wire the store and the durable queue into the engine.
///
/// Stores and queue share one connection; the queue writes its jobs to the
/// same database the report workers poll.
fn build_engine(config: &LhaConfig, store: &SqliteStore) -> SchedulerEngine {
    let shared = Arc::new(store.clone());
    let queue = Arc::new(store.job_queue(config.queue.name.clone()));
    let fan_out = FanOut::new(
        shared.clone(),
        shared.clone(),
        queue,
        config.scheduler.fan_out_concurrency,
    );
    SchedulerEngine::from_config(&config.scheduler, shared, fan_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lha_core::TaskInterval;
    use lha_scheduler::{Cadence, NewTask};

    fn temp_config() -> LhaConfig {
        let mut config = LhaConfig::default();
        config.database.path = std::env::temp_dir()
            .join(format!("lha-daemon-{}", std::process::id()))
            .join(format!("{}.db", lha_core::JobId::new()))
            .to_string_lossy()
            .into_owned();
        config
    }

    #[test]
    fn open_store_creates_parent_dir_and_schema() {
        let config = temp_config();
        let store = open_store(&config).unwrap();
        assert!(std::path::Path::new(&config.database.path).exists());
        assert!(store.orphaned_reports().unwrap().is_empty());
    }

    #[tokio::test]
    async fn built_engine_queues_jobs_under_the_configured_name() {
        let mut config = temp_config();
        config.queue.name = "audits-test".to_string();
        let store = open_store(&config).unwrap();
        store
            .insert_task(NewTask::new(
                "A",
                TaskInterval::EveryDay,
                vec!["https://x".to_string()],
            ))
            .unwrap();

        let engine = build_engine(&config, &store);
        let summary = engine.trigger(Cadence::Daily).unwrap().fire().await.unwrap();

        assert_eq!(summary.jobs_enqueued, 2);
        assert_eq!(store.job_queue("audits-test").waiting_jobs().unwrap().len(), 2);
        assert!(store
            .job_queue(lha_core::REPORT_QUEUE)
            .waiting_jobs()
            .unwrap()
            .is_empty());
    }
}
