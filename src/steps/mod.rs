//! Step runners: the closed set of side effects a `Step` may perform.

mod api_call;
mod storage_read;
mod storage_write;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StepError;
use crate::kv::KvStore;
use crate::model::StepKind;

pub use api_call::ApiCallRunner;
pub use storage_read::StorageReadRunner;
pub use storage_write::StorageWriteRunner;

/// Reserved params key the engine injects with the prior step's result
/// before dispatching the next step (or a failure step). Runners that want
/// to reference it read it out of their own `params` map like any other
/// key — the engine never calls a runner directly, only through this
/// injected map.
pub const LAST_STEP_RESULT_KEY: &str = "last_step_result";

/// Sentinel value for `storage_write`'s `storage_key` / `storage_value`
/// params: request substitution from `params[last_step_result]`.
pub const USE_LAST_STEP_RESULT: &str = "use_last_step_result";

/// Per-execution context threaded through a task's steps. Shared state
/// only — per-step data lives in `params`, not here.
pub struct RunContext {
    pub kv: Arc<dyn KvStore>,
    pub http: reqwest::Client,
}

/// One typed unit of work a step can dispatch to.
#[async_trait]
pub trait StepRunner: Send + Sync {
    fn kind(&self) -> StepKind;

    /// Execute the step's side effect and produce the step's result string.
    async fn run_step(
        &self,
        ctx: &RunContext,
        params: &HashMap<String, String>,
    ) -> Result<String, StepError>;
}

fn required<'a>(params: &'a HashMap<String, String>, key: &str) -> Result<&'a str, StepError> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| StepError::MissingParam(key.to_string()))
}
