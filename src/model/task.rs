use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of side effects a step may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ApiCall,
    StorageRead,
    StorageWrite,
}

impl StepKind {
    /// Every variant, used by the registry's startup completeness check.
    pub const ALL: [StepKind; 3] = [
        StepKind::ApiCall,
        StepKind::StorageRead,
        StepKind::StorageWrite,
    ];
}

impl std::str::FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api_call" => Ok(StepKind::ApiCall),
            "storage_read" => Ok(StepKind::StorageRead),
            "storage_write" => Ok(StepKind::StorageWrite),
            other => Err(format!("unknown step kind {other:?}")),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepKind::ApiCall => "api_call",
            StepKind::StorageRead => "storage_read",
            StepKind::StorageWrite => "storage_write",
        };
        f.write_str(s)
    }
}

/// One unit of work inside a task. `failure_step` may reference another
/// `Step`, which itself must not carry a `failure_step` (depth-1 bound).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub kind: StepKind,
    pub params: HashMap<String, String>,
    pub failure_step: Option<Box<Step>>,
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub steps: Vec<Step>,
}

impl Step {
    /// Checks this step's own invariants: non-empty params, and — if a
    /// failure step is attached — that it does not itself carry a
    /// failure step (depth-1 bound).
    pub fn validate(&self) -> Result<(), String> {
        if self.params.is_empty() {
            return Err(format!("step {} has no params", self.id));
        }
        if let Some(failure) = &self.failure_step {
            if failure.failure_step.is_some() {
                return Err(format!(
                    "step {}'s failure step must not itself have a failure step",
                    self.id
                ));
            }
            if failure.params.is_empty() {
                return Err(format!("failure step for step {} has no params", self.id));
            }
        }
        Ok(())
    }
}

impl Task {
    /// Checks the task-level invariants from the data model: non-empty
    /// name, a non-empty step sequence, and every step individually valid.
    pub fn validate(&self) -> Result<(), String> {
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
