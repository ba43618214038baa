//! `lha-scheduler`: cadence-driven fan-out of Lighthouse audit tasks.
//!
//! # Overview
//!
//! Tasks live in a SQLite `tasks` table. The [`engine::SchedulerEngine`]
//! wakes every tick and fires each cadence whose wall-clock slot has come.
//! A firing selects the enabled tasks of the cadence's interval and, per
//! task, records one execution, a MOBILE and a DESKTOP report shell per URL,
//! and one queue job per report.
//!
//! # Cadences
//!
//! | Cadence       | Fires                              | Selects            |
//! |---------------|------------------------------------|--------------------|
//! | `ten-minutes` | every 10 minutes on the :x0 mark   | `EVERY_10_MINUTES` |
//! | `hourly`      | top of every hour                  | `EVERY_HOUR`       |
//! | `daily`       | midnight                           | `EVERY_DAY`        |
//! | `weekend`     | midnight on Saturday and Sunday    | `EVERY_WEEKEND`    |
//! | `monthly`     | midnight on the 1st                | `EVERY_MONTH`      |
//!
//! Storage and queue sit behind the traits in [`store`] and [`queue`], so the
//! fan-out runs unchanged against SQLite, the in-process channel queue, or
//! test doubles.

pub mod db;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod queue;
pub mod schedule;
pub mod sqlite;
pub mod store;
pub mod trigger;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use fanout::{FanOut, FanOutSummary};
pub use queue::{ChannelJobQueue, JobSubmitter, SqliteJobQueue};
pub use sqlite::SqliteStore;
pub use store::{ExecutionStore, ReportStore, TaskStore};
pub use trigger::CadenceTrigger;
pub use types::{Cadence, Execution, NewTask, Report, Task};
