use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{ManagementStore, NewExecution, NewStep};
use crate::model::{Execution, ExecutionStatus, Schedule, Step, StepKind, Task};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("parsing management store DSN")?
            .create_if_missing(true);

        // A single connection: sqlite doesn't support concurrent writers
        // well, and a `sqlite::memory:` URL hands each new pooled
        // connection its own independent empty database, so a pool size
        // above 1 would silently lose writes made on another connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("connecting to management store")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running management store migrations")?;
        Ok(Self { pool })
    }

    async fn insert_step(
        tx: &mut Transaction<'_, Sqlite>,
        task_id: i64,
        position: Option<i64>,
        step: &NewStep,
    ) -> anyhow::Result<i64> {
        // A failure step has no position of its own (spec.md §6) — it is
        // reached only via its owning step's `failure_step_id` column.
        let failure_step_id = match &step.failure_step {
            Some(failure) => Some(Self::insert_step(tx, task_id, None, failure).await?),
            None => None,
        };
        let params = serde_json::to_string(&step.params)?;
        let row = sqlx::query(
            "INSERT INTO step (task_id, position, kind, params, failure_step_id) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(task_id)
        .bind(position)
        .bind(step.kind.to_string())
        .bind(params)
        .bind(failure_step_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.get::<i64, _>("id"))
    }

    fn row_to_execution(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Execution> {
        let status: String = row.try_get("status")?;
        Ok(Execution {
            id: row.try_get("id")?,
            task_id: row.try_get("task_id")?,
            scheduled_task_id: row.try_get("scheduled_task_id")?,
            status: match status.as_str() {
                "success" => ExecutionStatus::Success,
                "failure" => ExecutionStatus::Failure,
                "handled_failure" => ExecutionStatus::HandledFailure,
                other => return Err(anyhow!("unknown execution status {other:?}")),
            },
            idempotency_token: row.try_get("idempotency_token")?,
            executed_time: row.try_get("executed_time")?,
        })
    }
}

#[async_trait]
impl ManagementStore for SqliteStore {
    async fn create_task(&self, name: &str, steps: Vec<NewStep>) -> anyhow::Result<Task> {
        let mut tx = self.pool.begin().await.context("beginning transaction")?;

        let task_row = sqlx::query("INSERT INTO task (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .context("inserting task")?;
        let task_id: i64 = task_row.get("id");

        for (position, step) in steps.iter().enumerate() {
            Self::insert_step(&mut tx, task_id, Some(position as i64), step).await?;
        }

        tx.commit().await.context("committing task creation")?;

        self.get_task(task_id)
            .await?
            .ok_or_else(|| anyhow!("task {task_id} vanished after creation"))
    }

    async fn get_task(&self, id: i64) -> anyhow::Result<Option<Task>> {
        let task_row = sqlx::query("SELECT id, name FROM task WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("loading task")?;
        let Some(task_row) = task_row else {
            return Ok(None);
        };

        // `position IS NOT NULL` excludes failure steps, which share the
        // same `task_id` but are reached only via their owning step's
        // `failure_step_id` column (see `insert_step`).
        let step_rows = sqlx::query(
            "SELECT id, kind, params, failure_step_id FROM step \
             WHERE task_id = ? AND position IS NOT NULL ORDER BY position ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("loading steps")?;

        let mut steps = Vec::with_capacity(step_rows.len());
        for row in &step_rows {
            steps.push(self.load_step(row).await?);
        }

        Ok(Some(Task {
            id: task_row.get("id"),
            name: task_row.get("name"),
            steps,
        }))
    }

    async fn create_schedule(
        &self,
        name: &str,
        task_id: i64,
        cron: String,
        retries: u32,
        enabled: bool,
    ) -> anyhow::Result<Schedule> {
        let row = sqlx::query(
            "INSERT INTO scheduled_task (name, task_id, cron, retries, enabled) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(task_id)
        .bind(&cron)
        .bind(retries as i64)
        .bind(enabled)
        .fetch_one(&self.pool)
        .await
        .context("inserting schedule")?;

        Ok(Schedule {
            id: row.get("id"),
            name: name.to_string(),
            task_id,
            cron,
            retries,
            enabled,
            first_run: None,
            last_run: None,
        })
    }

    async fn get_schedule(&self, id: i64) -> anyhow::Result<Option<Schedule>> {
        let row = sqlx::query(
            "SELECT id, name, task_id, cron, retries, enabled, first_run, last_run \
             FROM scheduled_task WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("loading schedule")?;
        Ok(row.map(|r| Self::row_to_schedule(&r)).transpose()?)
    }

    async fn list_enabled_schedules(&self) -> anyhow::Result<Vec<Schedule>> {
        let rows = sqlx::query(
            "SELECT id, name, task_id, cron, retries, enabled, first_run, last_run \
             FROM scheduled_task WHERE enabled = TRUE",
        )
        .fetch_all(&self.pool)
        .await
        .context("listing enabled schedules")?;
        rows.iter().map(Self::row_to_schedule).collect()
    }

    async fn mark_schedule_ran(&self, id: i64, when: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE scheduled_task SET last_run = ?, \
             first_run = COALESCE(first_run, ?) WHERE id = ?",
        )
        .bind(when)
        .bind(when)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("updating schedule last_run")?;
        Ok(())
    }

    async fn get_execution_by_token(&self, token: &str) -> anyhow::Result<Option<Execution>> {
        let row = sqlx::query(
            "SELECT id, task_id, scheduled_task_id, status, idempotency_token, executed_time \
             FROM execution WHERE idempotency_token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("looking up execution by token")?;
        row.as_ref().map(Self::row_to_execution).transpose()
    }

    async fn save_execution(&self, new: NewExecution) -> anyhow::Result<Execution> {
        let executed_time = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO execution (task_id, scheduled_task_id, status, idempotency_token, executed_time) \
             VALUES (?, ?, ?, ?, ?) RETURNING id, task_id, scheduled_task_id, status, idempotency_token, executed_time",
        )
        .bind(new.task_id)
        .bind(new.scheduled_task_id)
        .bind(new.status.to_string())
        .bind(&new.idempotency_token)
        .bind(executed_time)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Self::row_to_execution(&row),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => self
                .get_execution_by_token(&new.idempotency_token)
                .await?
                .ok_or_else(|| {
                    anyhow!("unique violation on idempotency_token but no row found on re-read")
                }),
            Err(e) => Err(e).context("inserting execution"),
        }
    }
}

impl SqliteStore {
    /// Decodes one `step` row into a leaf `Step` with no `failure_step` —
    /// used both for top-level steps and for the one permitted level of
    /// failure-step nesting.
    fn leaf_step(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Step> {
        let params_json: String = row.try_get("params")?;
        let params: HashMap<String, String> = serde_json::from_str(&params_json)?;
        let kind_str: String = row.try_get("kind")?;
        let kind = StepKind::from_str(&kind_str).map_err(|e| anyhow!(e))?;
        Ok(Step {
            id: row.try_get("id")?,
            kind,
            params,
            failure_step: None,
        })
    }

    async fn load_step(&self, row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Step> {
        let failure_step_id: Option<i64> = row.try_get("failure_step_id")?;
        let mut step = Self::leaf_step(row)?;

        if let Some(id) = failure_step_id {
            let frow = sqlx::query("SELECT id, kind, params, failure_step_id FROM step WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .context("loading failure step")?;
            step.failure_step = Some(Box::new(Self::leaf_step(&frow)?));
        }

        Ok(step)
    }

    fn row_to_schedule(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Schedule> {
        Ok(Schedule {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            task_id: row.try_get("task_id")?,
            cron: row.try_get("cron")?,
            retries: row.try_get::<i64, _>("retries")? as u32,
            enabled: row.try_get("enabled")?,
            first_run: row.try_get("first_run")?,
            last_run: row.try_get("last_run")?,
        })
    }
}
