use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ModelSnapshot, ModelStore, ModelVersion};
use crate::error::{EngineError, EngineResult};

/// Bi-proportional (RAS) balancing of a transactions matrix to new row and
/// column totals. Structural zeros stay zero.
#[derive(Debug, Clone, Copy)]
pub struct RasBalancer {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RasBalancer {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasResult {
    pub z_balanced: Vec<Vec<f64>>,
    pub converged: bool,
    pub iterations: usize,
    pub final_error: f64,
}

impl RasBalancer {
    pub fn balance(
        &self,
        z0: &[Vec<f64>],
        row_targets: &[f64],
        col_targets: &[f64],
    ) -> EngineResult<RasResult> {
        let n = z0.len();
        if let Some(row) = z0.iter().find(|r| r.len() != n) {
            return Err(EngineError::dimension("RAS Z0 columns", n, row.len()));
        }
        if row_targets.len() != n {
            return Err(EngineError::dimension("RAS row targets", n, row_targets.len()));
        }
        if col_targets.len() != n {
            return Err(EngineError::dimension("RAS column targets", n, col_targets.len()));
        }
        if row_targets.iter().chain(col_targets).any(|v| *v < 0.0) {
            return Err(EngineError::InvalidModel(
                "RAS targets must be non-negative".into(),
            ));
        }

        let r = DVector::from_column_slice(row_targets);
        let c = DVector::from_column_slice(col_targets);
        let mut z = DMatrix::from_row_iterator(n, n, z0.iter().flatten().copied());
        let mut final_error = f64::INFINITY;

        for iteration in 1..=self.max_iterations {
            for (i, mut row) in z.row_iter_mut().enumerate() {
                let sum = row.sum();
                let factor = if sum > 0.0 { r[i] / sum } else { 0.0 };
                row *= factor;
            }
            for (j, mut column) in z.column_iter_mut().enumerate() {
                let sum = column.sum();
                let factor = if sum > 0.0 { c[j] / sum } else { 0.0 };
                column *= factor;
            }

            let row_error = z
                .row_iter()
                .zip(r.iter())
                .map(|(row, target)| (row.sum() - target).abs())
                .fold(0.0, f64::max);
            let col_error = z
                .column_iter()
                .zip(c.iter())
                .map(|(col, target)| (col.sum() - target).abs())
                .fold(0.0, f64::max);
            final_error = row_error.max(col_error);

            if final_error <= self.tolerance {
                info!(iterations = iteration, final_error, "RAS converged");
                return Ok(RasResult {
                    z_balanced: to_rows(&z),
                    converged: true,
                    iterations: iteration,
                    final_error,
                });
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            final_error, "RAS did not converge"
        );
        Ok(RasResult {
            z_balanced: to_rows(&z),
            converged: false,
            iterations: self.max_iterations,
            final_error,
        })
    }

    /// Register a balanced matrix as a new model version labelled
    /// `balanced-nowcast`.
    pub fn register_nowcast(
        &self,
        result: &RasResult,
        gross_output: Vec<f64>,
        sector_codes: Vec<String>,
        base_year: i32,
        store: &ModelStore,
    ) -> EngineResult<ModelVersion> {
        store.register(
            ModelSnapshot {
                sector_codes,
                z: result.z_balanced.clone(),
                x: gross_output,
                base_year,
                denomination: "SAR_MILLIONS".into(),
            },
            "balanced-nowcast",
        )
    }
}

fn to_rows(z: &DMatrix<f64>) -> Vec<Vec<f64>> {
    z.row_iter().map(|row| row.iter().copied().collect()).collect()
}
