//! Planning module for deploy and clean operations.
//!
//! This module compares local resources with remote state, groups the result
//! into a per-kind plan and executes it against the platform.

mod diff;
mod executor;
mod plan;

pub use diff::{DiffEngine, DiffResult};
pub use executor::{ExecuteOptions, ExecutionFailure, ExecutionReport, KindCounts, PlanExecutor};
pub use plan::{
    DeploymentPlan, KindPlan, Mode, PlanItem, PlanOptions, Planner, ReadFailure, READ_BATCH,
};
