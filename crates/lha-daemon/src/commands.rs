use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use lha_scheduler::{Cadence, Report, SchedulerEngine, SqliteStore};

/// Run the engine until Ctrl-C, then let running batches finish.
pub async fn run(engine: SchedulerEngine) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, stopping scheduler");

    // signal engine to stop, then wait for its drain
    let _ = shutdown_tx.send(true);
    engine_task.await?;
    Ok(())
}

/// One batch of `cadence`, bypassing the clock.
pub async fn fire(engine: &SchedulerEngine, cadence: Cadence) -> anyhow::Result<()> {
    let Some(trigger) = engine.trigger(cadence) else {
        anyhow::bail!("cadence {cadence} is not armed in [scheduler] intervals");
    };
    let summary = trigger.fire().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct NextFire {
    cadence: Cadence,
    next_fire: Option<String>,
}

pub fn next(engine: &SchedulerEngine) -> anyhow::Result<()> {
    let fires: Vec<NextFire> = engine
        .next_fires(Utc::now())
        .into_iter()
        .map(|(cadence, at)| NextFire {
            cadence,
            next_fire: at.map(|t| t.to_rfc3339()),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&fires)?);
    Ok(())
}

pub fn orphans(store: &SqliteStore) -> anyhow::Result<()> {
    let orphans: Vec<Report> = store.orphaned_reports()?;
    if !orphans.is_empty() {
        warn!(count = orphans.len(), "reports without a queue job");
    }
    println!("{}", serde_json::to_string_pretty(&orphans)?);
    Ok(())
}
