//! Runner registry: maps each `StepKind` to its `StepRunner` and asserts
//! at startup that every kind has one.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::StepKind;
use crate::steps::{ApiCallRunner, StepRunner, StorageReadRunner, StorageWriteRunner};

pub struct RunnerRegistry {
    runners: HashMap<StepKind, Arc<dyn StepRunner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self {
            runners: HashMap::new(),
        }
    }

    pub fn register(&mut self, runner: Arc<dyn StepRunner>) {
        self.runners.insert(runner.kind(), runner);
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ApiCallRunner));
        registry.register(Arc::new(StorageReadRunner));
        registry.register(Arc::new(StorageWriteRunner));
        registry
    }

    pub fn get(&self, kind: StepKind) -> Option<Arc<dyn StepRunner>> {
        self.runners.get(&kind).cloned()
    }

    /// Panics if any `StepKind` variant has no registered runner. Called
    /// once at startup, before the HTTP server binds.
    pub fn assert_complete(&self) {
        for kind in StepKind::ALL {
            if !self.runners.contains_key(&kind) {
                panic!("no runner registered for step kind {kind}");
            }
        }
    }
}

impl Default for RunnerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
