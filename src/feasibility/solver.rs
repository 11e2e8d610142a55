use itertools::Itertools;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::clipping::clip;
use super::constraints::{
    resolve_constraints, ConstraintSet, ConstraintType, ResolveInputs, ResolvedConstraint,
    ResolvedDiagnostic, Sense,
};
use super::lp::{movable, solve_lp, LpFailure};
use super::result::{
    BindingConstraint, ComplianceDiagnostic, ConfidenceSummary, Enabler, FeasibilityResult,
    FeasibilityTotals, SolveMethod,
};
use crate::config::FeasibilityConfig;
use crate::error::{EngineError, EngineResult};
use crate::quality::{DataQualityWarning, WarningCode};
use crate::satellite::SatelliteCoefficients;
use crate::vector::SectorVector;

/// Optional inputs for one feasibility solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveContext<'a> {
    pub unconstrained_run_id: Option<Uuid>,
    /// Selects time-windowed constraints; `None` activates all of them.
    pub year: Option<i32>,
    /// Base-year output, required by ABSOLUTE_TOTAL and RAMP bounds.
    pub base_output: Option<&'a SectorVector>,
    /// Jobs and import ratios, required by LABOR and IMPORT bounds.
    pub coefficients: Option<&'a SatelliteCoefficients>,
    /// Known Saudi employment share per sector, checked against SAUDIZATION
    /// targets.
    pub saudi_share: Option<&'a SectorVector>,
}

/// Re-solves an unconstrained Δx under a constraint set.
///
/// The LP result is used when it solves and satisfies every hard bound;
/// otherwise the clipping heuristic is applied and `fallback_used` is set.
/// Conflicting hard bounds are an error on either path.
#[derive(Debug, Clone, Default)]
pub struct FeasibilitySolver {
    config: FeasibilityConfig,
}

impl FeasibilitySolver {
    pub fn new(config: FeasibilityConfig) -> Self {
        Self { config }
    }

    pub fn solve(
        &self,
        unconstrained: &SectorVector,
        set: &ConstraintSet,
    ) -> EngineResult<FeasibilityResult> {
        self.solve_with(unconstrained, set, SolveContext::default())
    }

    pub fn solve_with(
        &self,
        unconstrained: &SectorVector,
        set: &ConstraintSet,
        ctx: SolveContext<'_>,
    ) -> EngineResult<FeasibilityResult> {
        let order = unconstrained.codes();
        let u = unconstrained.values();
        if u.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::InvalidInput(
                "unconstrained delta_x contains non-finite values".into(),
            ));
        }

        for issue in set.validate(Some(order)) {
            warn!(constraint_set_id = %set.id, "{issue}");
        }

        let conflicts = set.hard_conflicts(ctx.year);
        if !conflicts.is_empty() {
            let conflicting: Vec<Uuid> = conflicts
                .iter()
                .flat_map(|(floor, cap)| [*floor, *cap])
                .unique()
                .collect();
            error!(constraint_set_id = %set.id, ?conflicting, "conflicting hard constraints");
            return Err(EngineError::InfeasibleConstraintSet {
                conflicting,
                reason: "hard floor exceeds hard cap on the same scope".into(),
            });
        }

        let resolution = resolve_constraints(
            set,
            order,
            ResolveInputs {
                year: ctx.year,
                base_output: ctx.base_output,
                coefficients: ctx.coefficients,
            },
        )?;
        let active = resolution.active;

        let (feasible, method, fallback_reason) = if active.is_empty() {
            (u.to_vec(), SolveMethod::Passthrough, None)
        } else if !self.config.lp_enabled {
            (
                clip(u, &active),
                SolveMethod::Clipping,
                Some("LP solve disabled by configuration".to_string()),
            )
        } else {
            match solve_lp(u, &active, self.config.soft_penalty) {
                Ok(y) => match self.hard_violations(&y, &active).first() {
                    None => (y, SolveMethod::Lp, None),
                    Some(id) => (
                        clip(u, &active),
                        SolveMethod::Clipping,
                        Some(format!("LP solution violates hard constraint {id}")),
                    ),
                },
                Err(LpFailure::Infeasible) => {
                    let conflicting: Vec<Uuid> =
                        active.iter().filter(|c| c.is_hard()).map(|c| c.id).collect();
                    error!(constraint_set_id = %set.id, ?conflicting, "hard constraints are infeasible");
                    return Err(EngineError::InfeasibleConstraintSet {
                        conflicting,
                        reason: LpFailure::Infeasible.to_string(),
                    });
                }
                Err(failure) => (clip(u, &active), SolveMethod::Clipping, Some(failure.to_string())),
            }
        };

        let feasible = self.tidy(feasible, u, &active);

        if method == SolveMethod::Clipping {
            let violated = self.hard_violations(&feasible, &active);
            if !violated.is_empty() {
                error!(constraint_set_id = %set.id, ?violated, "fallback cannot satisfy hard constraints");
                return Err(EngineError::InfeasibleConstraintSet {
                    conflicting: violated,
                    reason: "no assignment satisfies all hard constraints".into(),
                });
            }
        }

        let mut warnings = Vec::new();
        if let Some(reason) = &fallback_reason {
            warn!(constraint_set_id = %set.id, %reason, "feasibility fell back to clipping");
            warnings.push(DataQualityWarning::new(
                WarningCode::FallbackApplied,
                None,
                format!("clipping fallback applied: {reason}"),
            ));
        }

        let mut confidence_summary = ConfidenceSummary::default();
        for c in &set.constraints {
            confidence_summary.record(c.confidence);
        }

        let mut binding_constraints = Vec::new();
        let mut slack_constraint_ids = Vec::new();
        let tol = self.config.binding_tolerance;
        let mut output_gaps = Vec::new();
        for c in &active {
            let lhs = c.lhs(&feasible);
            let relaxed = !c.is_hard() && c.violation(&feasible) > tol;
            if relaxed || (lhs - c.bound).abs() <= tol {
                confidence_summary.record_binding(c.confidence);
                let unconstrained_value = c.lhs(u);
                output_gaps.push(c.sectors().map(|i| feasible[i] - u[i]).sum::<f64>());
                binding_constraints.push(BindingConstraint {
                    constraint_id: c.id,
                    constraint_type: c.constraint_type,
                    confidence: c.confidence,
                    sector_codes: c.sectors().map(|i| order[i].clone()).collect(),
                    bound: c.bound,
                    unconstrained_value,
                    feasible_value: lhs,
                    gap: lhs - unconstrained_value,
                    shadow_price: c.violation(u),
                    relaxed,
                    description: c.description.clone(),
                });
            } else {
                slack_constraint_ids.push(c.id);
            }
        }

        let enablers = self.enablers(&binding_constraints, &output_gaps);
        let compliance_diagnostics =
            compliance_diagnostics(&resolution.diagnostics, order, ctx.saudi_share);
        let totals = FeasibilityTotals::new(u, &feasible);
        let gap: Vec<f64> = feasible.iter().zip(u).map(|(y, x)| y - x).collect();

        info!(
            constraint_set_id = %set.id,
            method = %method,
            binding = binding_constraints.len(),
            total_gap = totals.total_gap,
            "feasibility solved"
        );

        Ok(FeasibilityResult {
            unconstrained_run_id: ctx.unconstrained_run_id,
            constraint_set_id: set.id,
            constraint_set_version: set.version,
            year: ctx.year,
            feasible_delta_x: SectorVector::from_aligned(order, feasible),
            unconstrained_delta_x: unconstrained.clone(),
            gap_vs_unconstrained: SectorVector::from_aligned(order, gap),
            totals,
            binding_constraints,
            slack_constraint_ids,
            inactive_constraint_ids: resolution.inactive,
            method,
            fallback_used: fallback_reason.is_some(),
            fallback_reason,
            enablers,
            compliance_diagnostics,
            confidence_summary,
            warnings,
        })
    }

    /// Accepted violation of a hard bound, relative for large bounds.
    fn violation_tolerance(&self, bound: f64) -> f64 {
        self.config.binding_tolerance * bound.abs().max(1.0)
    }

    fn hard_violations(&self, y: &[f64], active: &[ResolvedConstraint]) -> Vec<Uuid> {
        active
            .iter()
            .filter(|c| c.is_hard() && c.violation(y) > self.violation_tolerance(c.bound))
            .map(|c| c.id)
            .collect()
    }

    /// Removes solver noise: values within the binding tolerance of a
    /// single-sector bound land exactly on it, and sectors no floor covers
    /// never exceed their unconstrained value (symmetrically for caps).
    fn tidy(&self, mut y: Vec<f64>, u: &[f64], active: &[ResolvedConstraint]) -> Vec<f64> {
        for c in active {
            if let Some((i, w)) = c.single() {
                if (w * y[i] - c.bound).abs() <= self.config.binding_tolerance {
                    y[i] = c.bound / w;
                }
            }
        }
        let (can_raise, can_lower) = movable(u.len(), active);
        for i in 0..y.len() {
            if !can_raise[i] {
                y[i] = y[i].min(u[i]);
            }
            if !can_lower[i] {
                y[i] = y[i].max(u[i]);
            }
        }
        y
    }

    /// One enabler per binding upper bound that held output back, largest
    /// first. `output_gaps` runs parallel to `binding`.
    fn enablers(&self, binding: &[BindingConstraint], output_gaps: &[f64]) -> Vec<Enabler> {
        binding
            .iter()
            .zip(output_gaps)
            .filter(|(b, _)| b.constraint_type.sense() == Some(Sense::Upper))
            .filter(|(_, gap)| -**gap > self.config.binding_tolerance)
            .sorted_by(|a, b| a.1.total_cmp(b.1))
            .enumerate()
            .map(|(rank, (b, gap))| {
                let scope = b.sector_codes.join("+");
                let action = match b.constraint_type {
                    ConstraintType::Ramp => "Accelerate ramp-up of",
                    ConstraintType::Labor => "Expand labor supply for",
                    ConstraintType::Import => "Secure import supply for",
                    _ => "Expand capacity on",
                };
                Enabler {
                    priority_rank: rank + 1,
                    binding_constraint_id: b.constraint_id,
                    sector_codes: b.sector_codes.clone(),
                    output_unlocked: -gap,
                    description: format!("{action} {scope} ({:.2} held back)", -gap),
                }
            })
            .collect()
    }
}

fn compliance_diagnostics(
    diagnostics: &[ResolvedDiagnostic],
    order: &[String],
    saudi_share: Option<&SectorVector>,
) -> Vec<ComplianceDiagnostic> {
    diagnostics
        .iter()
        .flat_map(|d| {
            d.sectors.iter().map(move |&i| {
                let code = &order[i];
                let observed_share = saudi_share.and_then(|shares| shares.get(code));
                ComplianceDiagnostic {
                    constraint_id: d.id,
                    constraint_type: d.constraint_type,
                    sector_code: code.clone(),
                    target_share: d.target,
                    observed_share,
                    gap: observed_share.map(|observed| d.target - observed),
                    description: d.description.clone(),
                }
            })
        })
        .collect()
}
