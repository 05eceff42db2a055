//! Cron-driven scheduler: one background task per enabled schedule, each
//! firing the engine on its own cadence with a bounded retry budget.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule as CronSchedule;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::engine::{Engine, new_idempotency_token};
use crate::model::{ExecutionStatus, Schedule};
use crate::store::ManagementStore;

pub struct Scheduler {
    store: Arc<dyn ManagementStore>,
    engine: Arc<Engine>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn ManagementStore>, engine: Arc<Engine>) -> Self {
        Self { store, engine }
    }

    /// Loads all enabled schedules and runs each on its own cron cadence
    /// until `cancel` fires. Returns once every spawned tick loop has
    /// observed cancellation and exited.
    pub async fn run_scheduled_tasks(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let schedules = self.store.list_enabled_schedules().await?;
        let mut tasks = JoinSet::new();

        for schedule in schedules {
            let store = self.store.clone();
            let engine = self.engine.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { tick_loop(store, engine, schedule, cancel).await });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(join_err) = result {
                tracing::error!(error = %join_err, "schedule tick loop panicked");
            }
        }

        Ok(())
    }
}

async fn tick_loop(
    store: Arc<dyn ManagementStore>,
    engine: Arc<Engine>,
    schedule: Schedule,
    cancel: CancellationToken,
) {
    let parsed = match CronSchedule::from_str(&schedule.cron) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(schedule_id = schedule.id, error = %e, "invalid cron expression");
            return;
        }
    };

    loop {
        let Some(next) = parsed.upcoming(Utc).next() else {
            tracing::warn!(schedule_id = schedule.id, "cron schedule has no upcoming fire time");
            return;
        };
        let sleep_for = (next - Utc::now()).to_std().unwrap_or_default();

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(sleep_for) => {}
        }

        run_one_tick(&store, &engine, &schedule).await;

        if cancel.is_cancelled() {
            return;
        }
    }
}

async fn run_one_tick(store: &Arc<dyn ManagementStore>, engine: &Arc<Engine>, schedule: &Schedule) {
    let token = new_idempotency_token();
    let attempts = schedule.retries;

    // `retries` is the total attempt budget for this tick, not an
    // additional count on top of a first try — a schedule with
    // `retries: 3` makes at most three `execute_task` calls, and
    // `retries: 0` makes none. Every call shares one token, so once the
    // first attempt records an execution the idempotency gate
    // short-circuits the rest — they still count against the attempt
    // budget, they just don't re-run steps. Only a recorded `failure`
    // status is worth retrying; `success` and `handled_failure` are both
    // terminal "this tick is done" outcomes.
    for attempt in 1..=attempts {
        match engine
            .execute_task(schedule.task_id, Some(schedule.id), &token)
            .await
        {
            Ok(execution) if execution.status != ExecutionStatus::Failure => {
                tracing::info!(
                    schedule_id = schedule.id,
                    status = %execution.status,
                    attempt,
                    "scheduled tick finished"
                );
                break;
            }
            Ok(_) => {
                tracing::warn!(schedule_id = schedule.id, attempt, "scheduled tick attempt failed");
                if attempt == attempts {
                    tracing::error!(schedule_id = schedule.id, "scheduled tick exhausted retries");
                }
            }
            Err(e) => {
                tracing::warn!(schedule_id = schedule.id, error = %e, attempt, "scheduled tick attempt errored");
                if attempt == attempts {
                    tracing::error!(schedule_id = schedule.id, "scheduled tick exhausted retries");
                }
            }
        }
    }

    if let Err(e) = store.mark_schedule_ran(schedule.id, Utc::now()).await {
        tracing::warn!(schedule_id = schedule.id, error = %e, "failed to record last_run");
    }
}
