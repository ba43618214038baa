use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use lha_core::config::{ScheduleTimezone, SchedulerConfig};

use crate::{
    fanout::FanOut,
    schedule::next_fire_utc,
    store::TaskStore,
    trigger::CadenceTrigger,
    types::Cadence,
};

/// Drives the armed cadence triggers off the wall clock.
///
/// Each tick checks every armed cadence against its planned fire time and
/// spawns the due ones on their own task, so a long batch never delays
/// another cadence. Fire times missed while the process was down are not
/// replayed.
pub struct SchedulerEngine {
    triggers: Vec<Arc<CadenceTrigger>>,
    timezone: ScheduleTimezone,
    tick: Duration,
}

impl SchedulerEngine {
    pub fn new(triggers: Vec<CadenceTrigger>, timezone: ScheduleTimezone, tick: Duration) -> Self {
        Self {
            triggers: triggers.into_iter().map(Arc::new).collect(),
            timezone,
            tick,
        }
    }

    /// Arm one trigger per configured interval, all sharing `fan_out`.
    pub fn from_config(config: &SchedulerConfig, tasks: Arc<dyn TaskStore>, fan_out: FanOut) -> Self {
        let mut cadences: Vec<Cadence> = Vec::with_capacity(config.intervals.len());
        for interval in &config.intervals {
            let cadence = Cadence::for_interval(*interval);
            if !cadences.contains(&cadence) {
                cadences.push(cadence);
            }
        }
        if cadences.is_empty() {
            warn!("no interval configured; scheduler will never fire");
        }

        let triggers = cadences
            .into_iter()
            .map(|cadence| CadenceTrigger::new(cadence, Arc::clone(&tasks), fan_out.clone()))
            .collect();
        Self::new(triggers, config.timezone, Duration::from_millis(config.tick_ms.max(1)))
    }

    /// The armed trigger for `cadence`, if any.
    pub fn trigger(&self, cadence: Cadence) -> Option<Arc<CadenceTrigger>> {
        self.triggers.iter().find(|t| t.cadence() == cadence).cloned()
    }

    /// Next fire time of every armed cadence after `now`.
    pub fn next_fires(&self, now: DateTime<Utc>) -> Vec<(Cadence, Option<DateTime<Utc>>)> {
        self.triggers
            .iter()
            .map(|t| (t.cadence(), next_fire_utc(self.timezone, t.cadence(), now)))
            .collect()
    }

    /// Main loop. Ticks until `shutdown` broadcasts `true` (or its sender is
    /// dropped), then waits for batches already running.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(cadences = self.triggers.len(), timezone = ?self.timezone, "scheduler engine started");

        let mut plan: Vec<Option<DateTime<Utc>>> =
            self.next_fires(Utc::now()).into_iter().map(|(_, next)| next).collect();
        for (trigger, next) in self.triggers.iter().zip(&plan) {
            info!(cadence = %trigger.cadence(), next_fire = %describe(*next), "cadence armed");
        }

        let mut batches = JoinSet::new();
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(Utc::now(), &mut plan, &mut batches),
                Some(joined) = batches.join_next() => {
                    if let Err(e) = joined {
                        error!("cadence batch aborted: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }

        if !batches.is_empty() {
            info!(in_flight = batches.len(), "waiting for running batches");
        }
        while let Some(joined) = batches.join_next().await {
            if let Err(e) = joined {
                error!("cadence batch aborted: {e}");
            }
        }
        info!("scheduler engine stopped");
    }

    /// Spawn every cadence whose planned time has arrived and plan its next fire.
    fn tick(&self, now: DateTime<Utc>, plan: &mut [Option<DateTime<Utc>>], batches: &mut JoinSet<()>) {
        for (trigger, next) in self.triggers.iter().zip(plan.iter_mut()) {
            let Some(due) = *next else { continue };
            if due > now {
                continue;
            }

            let cadence = trigger.cadence();
            let trigger = Arc::clone(trigger);
            // Outcome is logged by the trigger itself.
            batches.spawn(async move {
                let _ = trigger.fire().await;
            });

            *next = next_fire_utc(self.timezone, cadence, now);
            match next {
                Some(at) => info!(%cadence, scheduled_for = %due, next_fire = %at, "cadence fired"),
                None => warn!(%cadence, "no further fire time; cadence disarmed"),
            }
        }
    }
}

fn describe(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lha_core::TaskInterval;
    use rusqlite::Connection;

    use crate::{queue::ChannelJobQueue, sqlite::SqliteStore, types::NewTask};

    fn engine(config: &SchedulerConfig) -> (SchedulerEngine, SqliteStore) {
        let store = SqliteStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let shared = Arc::new(store.clone());
        let (queue, _rx) = ChannelJobQueue::new(64);
        let fan_out = FanOut::new(shared.clone(), shared.clone(), Arc::new(queue), 4);
        (SchedulerEngine::from_config(config, shared, fan_out), store)
    }

    #[test]
    fn from_config_arms_each_configured_interval_once() {
        let config = SchedulerConfig {
            intervals: vec![TaskInterval::EveryDay, TaskInterval::EveryHour, TaskInterval::EveryDay],
            ..SchedulerConfig::default()
        };
        let (engine, _) = engine(&config);
        let armed: Vec<_> = engine.triggers.iter().map(|t| t.cadence()).collect();
        assert_eq!(armed, vec![Cadence::Daily, Cadence::Hourly]);
        assert!(engine.trigger(Cadence::Monthly).is_none());
    }

    #[test]
    fn next_fires_covers_every_armed_cadence() {
        let config = SchedulerConfig {
            timezone: ScheduleTimezone::Utc,
            ..SchedulerConfig::default()
        };
        let (engine, _) = engine(&config);
        let now = Utc.with_ymd_and_hms(2026, 10, 21, 9, 5, 0).unwrap();

        let fires = engine.next_fires(now);
        assert_eq!(fires.len(), Cadence::ALL.len());
        let ten = fires.iter().find(|(c, _)| *c == Cadence::TenMinutes).unwrap().1;
        assert_eq!(ten, Some(Utc.with_ymd_and_hms(2026, 10, 21, 9, 10, 0).unwrap()));
    }

    #[tokio::test]
    async fn tick_spawns_due_cadences_and_advances_the_plan() {
        let config = SchedulerConfig {
            timezone: ScheduleTimezone::Utc,
            intervals: vec![TaskInterval::EveryHour, TaskInterval::EveryDay],
            ..SchedulerConfig::default()
        };
        let (engine, store) = engine(&config);
        let hourly = store
            .insert_task(NewTask::new("h", TaskInterval::EveryHour, vec!["https://x".into()]))
            .unwrap();
        let daily = store
            .insert_task(NewTask::new("d", TaskInterval::EveryDay, vec!["https://y".into()]))
            .unwrap();

        let now = Utc.with_ymd_and_hms(2026, 10, 21, 10, 0, 0).unwrap();
        let mut plan = vec![Some(now), Some(now + chrono::Duration::hours(14))];
        let mut batches = JoinSet::new();

        engine.tick(now, &mut plan, &mut batches);
        assert_eq!(batches.len(), 1);
        while let Some(joined) = batches.join_next().await {
            joined.unwrap();
        }

        assert_eq!(plan[0], Some(Utc.with_ymd_and_hms(2026, 10, 21, 11, 0, 0).unwrap()));
        assert_eq!(plan[1], Some(now + chrono::Duration::hours(14)));
        assert_eq!(store.executions_for_task(&hourly.id).unwrap().len(), 1);
        assert!(store.executions_for_task(&daily.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (engine, _) = engine(&SchedulerConfig {
            tick_ms: 10,
            ..SchedulerConfig::default()
        });
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(engine.run(rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn run_stops_when_shutdown_sender_is_dropped() {
        let (engine, _) = engine(&SchedulerConfig::default());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(engine.run(rx));

        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
