use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::model::{Execution, Schedule, StepKind, Task};
use crate::store::NewStep;

use super::AppState;

// --- Request/response DTOs ---

/// One step as submitted over the wire. Mirrors `model::Step` but carries
/// no `id` — that's assigned by the store on insert.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDto {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub failure_step: Option<Box<StepDto>>,
}

impl StepDto {
    fn validate(&self) -> Result<(), String> {
        if self.params.is_empty() {
            return Err("step params must not be empty".to_string());
        }
        if let Some(failure) = &self.failure_step {
            if failure.failure_step.is_some() {
                return Err(
                    "a failure step must not itself carry a failure step".to_string(),
                );
            }
            if failure.params.is_empty() {
                return Err("failure step params must not be empty".to_string());
            }
        }
        Ok(())
    }
}

impl From<StepDto> for NewStep {
    fn from(dto: StepDto) -> Self {
        NewStep {
            kind: dto.kind,
            params: dto.params,
            failure_step: dto.failure_step.map(|f| Box::new(NewStep::from(*f))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTaskRequest {
    pub name: String,
    pub steps: Vec<StepDto>,
}

impl CreateTaskRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("task name must not be empty".to_string());
        }
        if self.steps.is_empty() {
            return Err("task must have at least one step".to_string());
        }
        for step in &self.steps {
            step.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub msg: String,
    pub task: Task,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateScheduleRequest {
    pub name: String,
    pub cron: String,
    pub retries: u32,
    pub task_id: i64,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateScheduleResponse {
    pub msg: String,
    pub schedule: Schedule,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteTaskRequest {
    pub idempotency_token: String,
}

#[derive(Debug, Serialize)]
pub struct SchedulerStoppedResponse {
    pub msg: String,
}

fn parse_id(raw: &str, label: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("{label} must be numeric, got {raw:?}")))
}

// --- Handlers ---

/// POST /task
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<CreateTaskResponse>), AppError> {
    req.validate().map_err(AppError::BadRequest)?;

    let CreateTaskRequest { name, steps } = req;
    let new_steps: Vec<NewStep> = steps.into_iter().map(Into::into).collect();

    let task = state
        .store
        .create_task(&name, new_steps)
        .await
        .map_err(AppError::Internal)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTaskResponse {
            msg: "task saved successfully".to_string(),
            task,
        }),
    ))
}

/// GET /task/{task_id}
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let task_id = parse_id(&task_id, "task id")?;

    let task = state
        .store
        .get_task(task_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("task {task_id} not found")))?;

    Ok(Json(task))
}

/// POST /task/{task_id}/execute/{schedule_id}
pub async fn execute_task(
    State(state): State<Arc<AppState>>,
    Path((task_id, schedule_id)): Path<(String, String)>,
    Json(req): Json<ExecuteTaskRequest>,
) -> Result<Json<Execution>, AppError> {
    let task_id = parse_id(&task_id, "task id")?;
    let schedule_id = parse_id(&schedule_id, "schedule id")?;

    if req.idempotency_token.trim().is_empty() {
        return Err(AppError::BadRequest(
            "idempotency_token must not be empty".to_string(),
        ));
    }

    // schedule_id = 0 means "no schedule" (ad-hoc run), per spec.md §9 (b).
    let scheduled_task_id = (schedule_id != 0).then_some(schedule_id);

    let execution = state
        .engine
        .execute_task(task_id, scheduled_task_id, &req.idempotency_token)
        .await?;

    Ok(Json(execution))
}

/// POST /schedule
pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<CreateScheduleResponse>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "schedule name must not be empty".to_string(),
        ));
    }
    if cron::Schedule::from_str(&req.cron).is_err() {
        return Err(AppError::BadRequest(format!(
            "invalid cron expression {:?}",
            req.cron
        )));
    }

    state
        .store
        .get_task(req.task_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("task {} not found", req.task_id)))?;

    let schedule = state
        .store
        .create_schedule(&req.name, req.task_id, req.cron, req.retries, req.enabled)
        .await
        .map_err(AppError::Internal)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateScheduleResponse {
            msg: "schedule saved successfully".to_string(),
            schedule,
        }),
    ))
}

/// POST /jobs/execute-scheduled-tasks
///
/// Blocks until the process-wide cancellation token fires (on shutdown),
/// then returns 200. A scheduler-internal error maps to 500.
pub async fn execute_scheduled_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SchedulerStoppedResponse>, AppError> {
    state
        .scheduler
        .run_scheduled_tasks(state.cancel.clone())
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(SchedulerStoppedResponse {
        msg: "scheduler stopped".to_string(),
    }))
}
