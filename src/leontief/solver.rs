use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::multipliers::output_multipliers;
use super::schedule::{ShockMode, ShockSchedule, ShockVector};
use crate::config::SolverConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{LeontiefCache, RegisteredModel};
use crate::vector::SectorVector;

/// Output of one solve: Δx split into the shock itself and the ripple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub delta_x: SectorVector,
    /// The shock Δf.
    pub direct_impact: SectorVector,
    /// Δx − Δf.
    pub indirect_impact: SectorVector,
}

impl SolveResult {
    pub fn total(&self) -> f64 {
        self.delta_x.total()
    }
}

/// Year-by-year solve of a shock schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasedResult {
    pub mode: ShockMode,
    pub annual: BTreeMap<i32, SolveResult>,
    /// Sum of the annual Δx vectors.
    pub cumulative_delta_x: SectorVector,
    pub peak_year: Option<i32>,
    pub peak_total: f64,
}

/// (I − A)⁻¹ via LU. Fails when the factorization has a zero pivot or the
/// 1-norm condition number exceeds `max_condition_number`.
pub fn leontief_inverse(a: &DMatrix<f64>, max_condition_number: f64) -> EngineResult<DMatrix<f64>> {
    if !a.is_square() {
        return Err(EngineError::dimension("technical coefficients", a.nrows(), a.ncols()));
    }
    let n = a.nrows();
    let system = DMatrix::<f64>::identity(n, n) - a;

    let inverse = system
        .clone()
        .lu()
        .try_inverse()
        .ok_or_else(|| EngineError::SingularSystem {
            reason: "(I - A) has a zero pivot".into(),
        })?;

    let condition = one_norm(&system) * one_norm(&inverse);
    if !condition.is_finite() || condition > max_condition_number {
        return Err(EngineError::SingularSystem {
            reason: format!(
                "condition number {condition:.3e} exceeds limit {max_condition_number:.1e}"
            ),
        });
    }
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(EngineError::SingularSystem {
            reason: "Leontief inverse has non-finite entries".into(),
        });
    }

    debug!(n, condition, "computed Leontief inverse");
    Ok(inverse)
}

fn one_norm(m: &DMatrix<f64>) -> f64 {
    m.column_iter()
        .map(|c| c.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// Applies L to a shock already in model order.
pub fn apply_inverse(
    inverse: &DMatrix<f64>,
    sector_codes: &[String],
    delta_f: &[f64],
) -> EngineResult<SolveResult> {
    let n = inverse.nrows();
    if delta_f.len() != n {
        return Err(EngineError::dimension("shock vector", n, delta_f.len()));
    }
    let shock = DVector::from_column_slice(delta_f);
    let delta_x = inverse * &shock;
    let indirect = &delta_x - &shock;

    Ok(SolveResult {
        delta_x: SectorVector::from_aligned(sector_codes, delta_x.iter().copied().collect()),
        direct_impact: SectorVector::from_aligned(sector_codes, delta_f.to_vec()),
        indirect_impact: SectorVector::from_aligned(sector_codes, indirect.iter().copied().collect()),
    })
}

/// Leontief solver with a shared inverse cache. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LeontiefSolver {
    cache: Arc<LeontiefCache>,
    max_condition_number: f64,
}

impl LeontiefSolver {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            cache: Arc::new(LeontiefCache::new(config.cache_capacity)),
            max_condition_number: config.max_condition_number,
        }
    }

    pub fn with_cache(cache: Arc<LeontiefCache>, max_condition_number: f64) -> Self {
        Self {
            cache,
            max_condition_number,
        }
    }

    pub fn cache(&self) -> &Arc<LeontiefCache> {
        &self.cache
    }

    pub fn inverse(&self, model: &RegisteredModel) -> EngineResult<Arc<DMatrix<f64>>> {
        self.cache.get_or_try_insert(model.id(), || {
            leontief_inverse(model.model.technical_coefficients(), self.max_condition_number)
        })
    }

    /// Δx = L·Δf for a shock in model order.
    pub fn solve(&self, model: &RegisteredModel, delta_f: &[f64]) -> EngineResult<SolveResult> {
        let inverse = self.inverse(model)?;
        apply_inverse(&inverse, model.model.sector_codes(), delta_f)
    }

    pub fn solve_shock(&self, model: &RegisteredModel, shock: &ShockVector) -> EngineResult<SolveResult> {
        let delta_f = shock.resolve(model.model.sector_codes())?;
        self.solve(model, &delta_f)
    }

    pub fn solve_schedule(
        &self,
        model: &RegisteredModel,
        schedule: &ShockSchedule,
        mode: ShockMode,
    ) -> EngineResult<PhasedResult> {
        let codes = model.model.sector_codes();
        let shocks = schedule.effective_shocks(codes, mode)?;
        let inverse = self.inverse(model)?;

        let mut annual = BTreeMap::new();
        let mut cumulative = vec![0.0; codes.len()];
        let mut peak: Option<(i32, f64)> = None;

        for (year, delta_f) in shocks {
            let result = apply_inverse(&inverse, codes, &delta_f)?;
            for (acc, v) in cumulative.iter_mut().zip(result.delta_x.values()) {
                *acc += v;
            }
            let total = result.total();
            // strict comparison keeps the earliest year on ties
            if peak.map_or(true, |(_, best)| total > best) {
                peak = Some((year, total));
            }
            annual.insert(year, result);
        }

        info!(
            model_version_id = %model.id(),
            years = annual.len(),
            mode = %mode,
            "solved shock schedule"
        );

        Ok(PhasedResult {
            mode,
            annual,
            cumulative_delta_x: SectorVector::from_aligned(codes, cumulative),
            peak_year: peak.map(|(year, _)| year),
            peak_total: peak.map_or(0.0, |(_, total)| total),
        })
    }

    /// Type I output multipliers keyed by sector code.
    pub fn output_multipliers(&self, model: &RegisteredModel) -> EngineResult<SectorVector> {
        let inverse = self.inverse(model)?;
        Ok(output_multipliers(&inverse, model.model.sector_codes()))
    }
}
