use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cron-driven binding of a task to a recurring schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub name: String,
    pub task_id: i64,
    pub cron: String,
    pub retries: u32,
    pub enabled: bool,
    pub first_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
}
