//! Core data model shared by every crate in the workspace: `Job`,
//! `Schedule`, `Execution`, and the job `Status` state machine.
//!
//! None of these types know about HTTP, queues, or storage backends --
//! they are the wire/value objects the `Repository`, `Executor`, and
//! `Dispatcher` all agree on.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only schedule format the core recognizes.
pub const SCHEDULE_FORMAT_TIMESTAMP: &str = "timestamp";

/// A job's current place in the status state machine.
///
/// `Success` and `Canceled` are terminal: once a job reaches either, it is
/// never executed again (see [`Job::is_executable`]). `Error` and `Fail`
/// are terminal for the attempt that produced them, but the job remains
/// re-executable if a later tick still finds it in its activation bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Success,
    Error,
    Fail,
    Canceled,
}

impl Status {
    /// `true` for states that should never be dispatched again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Canceled)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Success => "success",
            Status::Error => "error",
            Status::Fail => "fail",
            Status::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// A tagged schedule, keyed by `format`. Only `timestamp` is recognized by
/// the core; any other format is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub format: String,
    pub value: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid job schedule format: '{0}'")]
    UnknownFormat(String),
    #[error("invalid timestamp value: '{0}'")]
    InvalidTimestamp(String),
}

impl Schedule {
    pub fn timestamp(epoch_seconds: i64) -> Self {
        Self {
            format: SCHEDULE_FORMAT_TIMESTAMP.to_owned(),
            value: epoch_seconds.to_string(),
        }
    }

    /// Returns the epoch second at which this schedule activates.
    ///
    /// This is a pure function of the schedule's own fields -- the core
    /// never caches the result alongside the job. The activation-time
    /// index inside the repository is the cache, populated once at insert.
    pub fn next_activation(&self) -> Result<i64, ScheduleError> {
        match self.format.as_str() {
            SCHEDULE_FORMAT_TIMESTAMP => i64::from_str(&self.value)
                .map_err(|_| ScheduleError::InvalidTimestamp(self.value.clone())),
            other => Err(ScheduleError::UnknownFormat(other.to_owned())),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.next_activation().is_ok()
    }
}

/// One recorded attempt at invoking a job's callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub timestamp: i64,
    pub status: Status,
    #[serde(default)]
    pub message: String,
}

/// A deferred HTTP callback job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "clientKey", default)]
    pub client_key: String,
    #[serde(rename = "callbackURL")]
    pub callback_url: String,
    #[serde(default)]
    pub data: Option<HashMap<String, String>>,
    pub schedule: Schedule,
    #[serde(default = "default_status")]
    pub status: Status,
    #[serde(default)]
    pub executions: Vec<Execution>,
}

fn default_status() -> Status {
    Status::Pending
}

impl Job {
    /// Whether the job's callback should still be considered for dispatch.
    ///
    /// Only the two terminal states are excluded; `error` and `fail`
    /// remain executable since the core performs no retry bookkeeping of
    /// its own.
    pub fn is_executable(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Extract the host authority (`host:port` as written) from
    /// `callback_url`, for host-based dispatch fan-out.
    pub fn callback_host(&self) -> Result<String, url::ParseError> {
        let parsed = url::Url::parse(&self.callback_url)?;
        match parsed.host_str() {
            Some(host) => match parsed.port() {
                Some(port) => Ok(format!("{host}:{port}")),
                None => Ok(host.to_owned()),
            },
            None => Err(url::ParseError::EmptyHost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_next_activation_timestamp() {
        let schedule = Schedule::timestamp(1_700_000_000);
        assert_eq!(schedule.next_activation(), Ok(1_700_000_000));
    }

    #[test]
    fn schedule_rejects_unknown_format() {
        let schedule = Schedule {
            format: "cron".to_owned(),
            value: "* * * * *".to_owned(),
        };
        assert!(!schedule.is_valid());
        assert_eq!(
            schedule.next_activation(),
            Err(ScheduleError::UnknownFormat("cron".to_owned()))
        );
    }

    #[test]
    fn schedule_rejects_non_numeric_value() {
        let schedule = Schedule {
            format: SCHEDULE_FORMAT_TIMESTAMP.to_owned(),
            value: "soon".to_owned(),
        };
        assert!(!schedule.is_valid());
    }

    #[test]
    fn job_is_executable_excludes_terminal_states() {
        let mut job = sample_job();
        assert!(job.is_executable());

        job.status = Status::Error;
        assert!(job.is_executable());

        job.status = Status::Fail;
        assert!(job.is_executable());

        job.status = Status::Success;
        assert!(!job.is_executable());

        job.status = Status::Canceled;
        assert!(!job.is_executable());
    }

    #[test]
    fn job_callback_host_includes_port() {
        let job = sample_job();
        assert_eq!(job.callback_host().unwrap(), "example.com:9090");
    }

    #[test]
    fn job_round_trip_json_defaults_missing_executions() {
        let json = r#"{
            "id": "abc",
            "clientKey": "client-1",
            "callbackURL": "http://example.com:9090/cb",
            "data": {"k": "v"},
            "schedule": {"format": "timestamp", "value": "1700000000"},
            "status": "pending"
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.executions, Vec::new());
        assert_eq!(job.id, "abc");

        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: Job = serde_json::from_str(&encoded).unwrap();
        assert_eq!(job, decoded);
    }

    fn sample_job() -> Job {
        Job {
            id: "job-1".to_owned(),
            client_key: "client-1".to_owned(),
            callback_url: "http://example.com:9090/cb".to_owned(),
            data: None,
            schedule: Schedule::timestamp(1_700_000_000),
            status: Status::Pending,
            executions: Vec::new(),
        }
    }
}
