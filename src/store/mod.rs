//! Persistence layer: tasks, steps, schedules, and executions.

mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Execution, ExecutionStatus, Schedule, StepKind, Task};

pub use sqlite::SqliteStore;

/// A step as submitted to `create_task`, before row ids are assigned.
#[derive(Debug, Clone)]
pub struct NewStep {
    pub kind: StepKind,
    pub params: std::collections::HashMap<String, String>,
    pub failure_step: Option<Box<NewStep>>,
}

/// An execution as submitted to `save_execution`, before a row id is
/// assigned.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub task_id: i64,
    pub scheduled_task_id: Option<i64>,
    pub status: ExecutionStatus,
    pub idempotency_token: String,
}

#[async_trait]
pub trait ManagementStore: Send + Sync {
    async fn create_task(&self, name: &str, steps: Vec<NewStep>) -> anyhow::Result<Task>;

    async fn get_task(&self, id: i64) -> anyhow::Result<Option<Task>>;

    async fn create_schedule(
        &self,
        name: &str,
        task_id: i64,
        cron: String,
        retries: u32,
        enabled: bool,
    ) -> anyhow::Result<Schedule>;

    async fn get_schedule(&self, id: i64) -> anyhow::Result<Option<Schedule>>;

    async fn list_enabled_schedules(&self) -> anyhow::Result<Vec<Schedule>>;

    async fn mark_schedule_ran(&self, id: i64, when: DateTime<Utc>) -> anyhow::Result<()>;

    /// Looks up a prior execution by its idempotency token. `Ok(None)`
    /// means no such execution exists yet — the caller should proceed.
    async fn get_execution_by_token(&self, token: &str) -> anyhow::Result<Option<Execution>>;

    /// Inserts an execution row. If `idempotency_token` already exists,
    /// returns the pre-existing row instead of erroring (at-most-once
    /// semantics — see `SqliteStore::save_execution`).
    async fn save_execution(&self, new: NewExecution) -> anyhow::Result<Execution>;
}
