use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a long-running derivation recorded in the process queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessStatus {
    Queued,
    InProgress,
    Completed,
    Error,
    Interrupted,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Queued => "queued",
            ProcessStatus::InProgress => "in-progress",
            ProcessStatus::Completed => "completed",
            ProcessStatus::Error => "error",
            ProcessStatus::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ProcessStatus::Queued),
            "in-progress" => Ok(ProcessStatus::InProgress),
            "completed" => Ok(ProcessStatus::Completed),
            "error" => Ok(ProcessStatus::Error),
            "interrupted" => Ok(ProcessStatus::Interrupted),
            other => Err(format!("unknown process status: {other}")),
        }
    }
}

/// One row of the durable process queue. Unique by `file_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub file_key: String,
    pub process_type: String,
    pub total_steps: u32,
    pub current_step: u32,
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ProcessStatus::Queued,
            ProcessStatus::InProgress,
            ProcessStatus::Completed,
            ProcessStatus::Error,
            ProcessStatus::Interrupted,
        ] {
            assert_eq!(status.as_str().parse::<ProcessStatus>(), Ok(status));
        }
        assert!("running".parse::<ProcessStatus>().is_err());
    }
}
