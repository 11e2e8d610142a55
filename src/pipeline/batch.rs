use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::runner::{ImpactRunner, RunRequest, RunResult};
use crate::config::BatchConfig;
use crate::error::{EngineError, EngineResult};

/// Outcome of one scenario in a batch. Failures never affect other scenarios.
#[derive(Debug)]
pub struct BatchOutcome {
    pub scenario_id: Uuid,
    pub scenario_name: String,
    pub result: EngineResult<RunResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn of(outcomes: &[BatchOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
        Self {
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }
}

/// Evaluates independent scenarios on a bounded worker pool.
pub struct BatchRunner {
    runner: Arc<ImpactRunner>,
    pool: rayon::ThreadPool,
}

impl BatchRunner {
    pub fn new(runner: Arc<ImpactRunner>, config: &BatchConfig) -> EngineResult<Self> {
        // num_threads(0) lets rayon pick one thread per core
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("impact-batch-{i}"))
            .build()
            .map_err(|e| EngineError::Worker(format!("failed to build batch pool: {e}")))?;
        Ok(Self { runner, pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Outcomes are returned in request order.
    pub fn run_all(&self, requests: &[RunRequest]) -> Vec<BatchOutcome> {
        let started = Instant::now();
        let outcomes: Vec<BatchOutcome> = self.pool.install(|| {
            requests
                .par_iter()
                .map(|request| {
                    let result = self.runner.run(request);
                    if let Err(e) = &result {
                        warn!(scenario_id = %request.scenario.id, error = %e, "scenario failed");
                    }
                    BatchOutcome {
                        scenario_id: request.scenario.id,
                        scenario_name: request.scenario.name.clone(),
                        result,
                    }
                })
                .collect()
        });

        let summary = BatchSummary::of(&outcomes);
        info!(
            scenarios = requests.len(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            workers = self.workers(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch complete"
        );
        outcomes
    }
}
