//! Linear step-graph executor: runs a task's steps in order, threading
//! `last_step_result` between them, and routing to a single failure step
//! on a `StepError`.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::EngineError;
use crate::kv::KvStore;
use crate::model::{Execution, ExecutionStatus, Step};
use crate::registry::RunnerRegistry;
use crate::steps::{LAST_STEP_RESULT_KEY, RunContext};
use crate::store::{ManagementStore, NewExecution};

pub struct Engine {
    store: Arc<dyn ManagementStore>,
    registry: Arc<RunnerRegistry>,
    ctx: RunContext,
}

impl Engine {
    pub fn new(
        store: Arc<dyn ManagementStore>,
        registry: Arc<RunnerRegistry>,
        kv: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            store,
            registry,
            ctx: RunContext {
                kv,
                http: reqwest::Client::new(),
            },
        }
    }

    /// Runs `task_id`'s steps in order under the given idempotency token.
    /// If an execution already exists for this token, it is returned
    /// unchanged and no step runs (at-most-once semantics).
    pub async fn execute_task(
        &self,
        task_id: i64,
        scheduled_task_id: Option<i64>,
        idempotency_token: &str,
    ) -> Result<Execution, EngineError> {
        if let Some(existing) = self
            .store
            .get_execution_by_token(idempotency_token)
            .await
            .map_err(EngineError::Store)?
        {
            tracing::info!(token = idempotency_token, "execution already recorded, skipping");
            return Ok(existing);
        }

        let task = self
            .store
            .get_task(task_id)
            .await
            .map_err(EngineError::Store)?
            .ok_or(EngineError::TaskNotFound(task_id))?;

        let status = self.run_steps(&task.steps).await;

        let recorded = self
            .store
            .save_execution(NewExecution {
                task_id,
                scheduled_task_id,
                status,
                idempotency_token: idempotency_token.to_string(),
            })
            .await
            .map_err(EngineError::Store)?;

        Ok(recorded)
    }

    /// Runs one task's steps in order. Never fails the call — the outcome
    /// is always one of the three `ExecutionStatus` values.
    async fn run_steps(&self, steps: &[Step]) -> ExecutionStatus {
        let mut prior_result: Option<String> = None;

        for step in steps {
            // Clone params out of the loaded task before mutation — the
            // stored Task must never be mutated by a running execution.
            let mut params = step.params.clone();
            if let Some(prior) = &prior_result {
                params.insert(LAST_STEP_RESULT_KEY.to_string(), prior.clone());
            }

            let Some(runner) = self.registry.get(step.kind) else {
                tracing::error!(kind = %step.kind, "no runner registered for step kind");
                return ExecutionStatus::Failure;
            };

            match runner.run_step(&self.ctx, &params).await {
                Ok(result) => {
                    prior_result = Some(result);
                }
                Err(err) => {
                    tracing::warn!(step_id = step.id, error = %err, "step failed");
                    let partial_result = err.partial_result().unwrap_or_default();
                    return self.run_failure_step(step, &partial_result).await;
                }
            }
        }

        ExecutionStatus::Success
    }

    /// Runs a failed step's `failure_step`, if one is configured. The
    /// failure step sees `last_step_result` set to the failed step's
    /// partial result (empty string if the runner returned none). A
    /// failure step never triggers further fallback — that invariant is
    /// enforced at task-creation time, not here.
    async fn run_failure_step(&self, failed_step: &Step, partial_result: &str) -> ExecutionStatus {
        let Some(failure_step) = &failed_step.failure_step else {
            return ExecutionStatus::Failure;
        };

        let Some(runner) = self.registry.get(failure_step.kind) else {
            tracing::error!(kind = %failure_step.kind, "no runner registered for failure step kind");
            return ExecutionStatus::Failure;
        };

        let mut params = failure_step.params.clone();
        params.insert(LAST_STEP_RESULT_KEY.to_string(), partial_result.to_string());

        match runner.run_step(&self.ctx, &params).await {
            Ok(_) => ExecutionStatus::HandledFailure,
            Err(handler_err) => {
                tracing::warn!(
                    step_id = failure_step.id,
                    handler_error = %handler_err,
                    "failure step also failed"
                );
                ExecutionStatus::Failure
            }
        }
    }
}

/// Generates a fresh idempotency token for an ad-hoc (non-scheduled) run.
pub fn new_idempotency_token() -> String {
    Uuid::new_v4().to_string()
}
