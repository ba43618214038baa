use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Declares a string-backed UUIDv7 identifier (time-sortable for easier log correlation).
macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

record_id!(
    /// Identifier of a persisted monitoring task.
    TaskId
);
record_id!(
    /// Identifier of one firing of a task.
    ExecutionId
);
record_id!(
    /// Identifier of a single URL × form-factor measurement shell.
    ReportId
);
record_id!(
    /// Identifier of a queue submission.
    JobId
);

/// Recurrence class a task is configured with.
///
/// The wire/storage spelling (`EVERY_10_MINUTES`, …) is shared with the task
/// CRUD service and the report worker, so it must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskInterval {
    #[serde(rename = "EVERY_10_MINUTES")]
    Every10Minutes,
    #[serde(rename = "EVERY_HOUR")]
    EveryHour,
    #[serde(rename = "EVERY_DAY")]
    EveryDay,
    #[serde(rename = "EVERY_WEEKEND")]
    EveryWeekend,
    #[serde(rename = "EVERY_MONTH")]
    EveryMonth,
}

impl TaskInterval {
    pub const ALL: [TaskInterval; 5] = [
        TaskInterval::Every10Minutes,
        TaskInterval::EveryHour,
        TaskInterval::EveryDay,
        TaskInterval::EveryWeekend,
        TaskInterval::EveryMonth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskInterval::Every10Minutes => "EVERY_10_MINUTES",
            TaskInterval::EveryHour => "EVERY_HOUR",
            TaskInterval::EveryDay => "EVERY_DAY",
            TaskInterval::EveryWeekend => "EVERY_WEEKEND",
            TaskInterval::EveryMonth => "EVERY_MONTH",
        }
    }
}

impl fmt::Display for TaskInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskInterval::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| format!("unknown task interval: {s}"))
    }
}

/// Device class a URL is measured under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormFactor {
    Mobile,
    Desktop,
}

impl FormFactor {
    /// Order in which the reports of one URL are created.
    pub const ALL: [FormFactor; 2] = [FormFactor::Mobile, FormFactor::Desktop];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormFactor::Mobile => "MOBILE",
            FormFactor::Desktop => "DESKTOP",
        }
    }
}

impl fmt::Display for FormFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FormFactor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MOBILE" => Ok(FormFactor::Mobile),
            "DESKTOP" => Ok(FormFactor::Desktop),
            other => Err(format!("unknown form factor: {other}")),
        }
    }
}
