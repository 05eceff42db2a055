use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal outcome of one task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
    HandledFailure,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failure => "failure",
            ExecutionStatus::HandledFailure => "handled_failure",
        };
        f.write_str(s)
    }
}

/// An immutable record of one attempt to run a task, keyed by a unique
/// idempotency token so retries of the same attempt never double-record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: i64,
    pub task_id: i64,
    #[serde(rename = "scheduled_task")]
    pub scheduled_task_id: Option<i64>,
    pub status: ExecutionStatus,
    pub idempotency_token: String,
    pub executed_time: DateTime<Utc>,
}
