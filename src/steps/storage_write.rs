use std::collections::HashMap;

use async_trait::async_trait;

use super::{LAST_STEP_RESULT_KEY, RunContext, StepRunner, USE_LAST_STEP_RESULT, required};
use crate::error::StepError;
use crate::model::StepKind;

/// Writes a value into the ephemeral key-value store. `storage_key` and
/// `storage_value` are required; either may carry the literal sentinel
/// `use_last_step_result`, in which case its actual value is substituted
/// from `params[last_step_result]` (injected by the engine — see
/// `Engine::run_steps`).
pub struct StorageWriteRunner;

/// Resolves one of this runner's params, substituting `last_step_result`
/// when the sentinel literal is present.
fn resolve(params: &HashMap<String, String>, field: &str) -> Result<String, StepError> {
    let raw = required(params, field)?;
    if raw == USE_LAST_STEP_RESULT {
        params
            .get(LAST_STEP_RESULT_KEY)
            .cloned()
            .ok_or_else(|| StepError::MissingParam(LAST_STEP_RESULT_KEY.to_string()))
    } else {
        Ok(raw.to_string())
    }
}

#[async_trait]
impl StepRunner for StorageWriteRunner {
    fn kind(&self) -> StepKind {
        StepKind::StorageWrite
    }

    async fn run_step(
        &self,
        ctx: &RunContext,
        params: &HashMap<String, String>,
    ) -> Result<String, StepError> {
        let key = resolve(params, "storage_key")?;
        let value = resolve(params, "storage_value")?;

        ctx.kv
            .set(&key, value.clone())
            .await
            .map_err(StepError::Storage)?;

        Ok(value)
    }
}
