//! End-to-end runs and parallel batch evaluation.

pub mod batch;
pub mod runner;

pub use batch::{BatchOutcome, BatchRunner, BatchSummary};
pub use runner::{
    run_blocking, ImpactRunner, ResultSet, RunRequest, RunResult, RunSnapshot, Scenario,
    SensitivityRun,
};
