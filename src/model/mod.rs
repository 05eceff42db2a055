//! Core domain types: Task, Step, Schedule, Execution.

mod execution;
mod schedule;
mod task;

pub use execution::{Execution, ExecutionStatus};
pub use schedule::Schedule;
pub use task::{Step, StepKind, Task};
