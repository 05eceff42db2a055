//! Error taxonomy shared across layers.
//!
//! `StepError` drives the execution state machine and never crosses the
//! engine boundary. `EngineError` is the only error type the HTTP layer
//! sees from the engine. `AppError` maps both to HTTP responses.

use thiserror::Error;

/// Error produced by a single step runner invocation.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("missing required parameter {0:?}")]
    MissingParam(String),

    #[error("request_verb_api {0:?} is not one of GET, POST, PUT, DELETE")]
    InvalidVerb(String),

    #[error("transport error calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response. Carries the body so a failure step can inspect it.
    #[error("api_call returned status {status}")]
    BadStatus { status: u16, body: String },

    #[error("key {0:?} not found in storage")]
    KeyNotFound(String),

    #[error("storage backend error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl StepError {
    /// The partial result a failed step still produced, if any — fed to a
    /// `failure_step` as `last_step_result`. Only `BadStatus` carries one
    /// (the response body of a non-2xx `api_call`); every other variant
    /// failed before producing output.
    pub fn partial_result(&self) -> Option<String> {
        match self {
            StepError::BadStatus { body, .. } => Some(body.clone()),
            _ => None,
        }
    }
}

/// Error crossing the engine boundary to callers of `Engine::execute_task`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task {0} not found")]
    TaskNotFound(i64),

    #[error("schedule {0} not found")]
    ScheduleNotFound(i64),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Error surfaced at the HTTP boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::TaskNotFound(id) => AppError::NotFound(format!("task {id} not found")),
            EngineError::ScheduleNotFound(id) => {
                AppError::NotFound(format!("schedule {id} not found"))
            }
            EngineError::Store(e) => AppError::Internal(e),
        }
    }
}
