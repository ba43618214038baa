//! `lha-core`: types and configuration shared by the scheduler and its binary.

pub mod config;
pub mod error;
pub mod report_job;
pub mod types;

pub use config::LhaConfig;
pub use error::{LhaError, Result};
pub use report_job::{ReportJob, REPORT_QUEUE};
pub use types::{ExecutionId, FormFactor, JobId, ReportId, TaskId, TaskInterval};
