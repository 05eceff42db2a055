use std::collections::HashMap;

use async_trait::async_trait;

use super::{RunContext, StepRunner, required};
use crate::error::StepError;
use crate::kv::KvError;
use crate::model::StepKind;

/// Reads a value out of the ephemeral key-value store.
pub struct StorageReadRunner;

#[async_trait]
impl StepRunner for StorageReadRunner {
    fn kind(&self) -> StepKind {
        StepKind::StorageRead
    }

    async fn run_step(
        &self,
        ctx: &RunContext,
        params: &HashMap<String, String>,
    ) -> Result<String, StepError> {
        let key = required(params, "storage_key")?;
        match ctx.kv.get(key).await {
            Ok(value) => Ok(value),
            Err(KvError::NotFound) => Err(StepError::KeyNotFound(key.to_string())),
            Err(KvError::Other(e)) => Err(StepError::Storage(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKvStore;

    fn ctx() -> RunContext {
        RunContext {
            kv: InMemoryKvStore::new(),
            http: reqwest::Client::new(),
        }
    }

    #[tokio::test]
    async fn missing_storage_key_param_fails() {
        let runner = StorageReadRunner;
        let err = runner.run_step(&ctx(), &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, StepError::MissingParam(k) if k == "storage_key"));
    }

    #[tokio::test]
    async fn missing_value_in_store_is_key_not_found() {
        let runner = StorageReadRunner;
        let params = HashMap::from([("storage_key".to_string(), "k".to_string())]);
        let err = runner.run_step(&ctx(), &params).await.unwrap_err();
        assert!(matches!(err, StepError::KeyNotFound(k) if k == "k"));
    }

    #[tokio::test]
    async fn reads_a_stored_value() {
        let ctx = ctx();
        ctx.kv.set("k", "v".to_string()).await.unwrap();
        let runner = StorageReadRunner;
        let params = HashMap::from([("storage_key".to_string(), "k".to_string())]);
        assert_eq!(runner.run_step(&ctx, &params).await.unwrap(), "v");
    }
}
