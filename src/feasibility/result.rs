use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::constraints::{ConstraintConfidence, ConstraintType};
use crate::quality::DataQualityWarning;
use crate::vector::SectorVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SolveMethod {
    /// No active constraints; feasible equals unconstrained.
    Passthrough,
    Lp,
    Clipping,
}

/// A constraint active at its bound in the feasible solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConstraint {
    pub constraint_id: Uuid,
    pub constraint_type: ConstraintType,
    pub confidence: ConstraintConfidence,
    pub sector_codes: Vec<String>,
    /// Bound on Σ Δx over the scope.
    pub bound: f64,
    pub unconstrained_value: f64,
    pub feasible_value: f64,
    /// feasible − unconstrained over the scope, in the constraint's units.
    pub gap: f64,
    /// How far the unconstrained Δx overshot the bound, in the constraint's
    /// units; 0 when it only just met it. Approximates the marginal value of
    /// relaxing the bound by one unit times the relaxation needed.
    pub shadow_price: f64,
    /// Soft constraint left violated.
    pub relaxed: bool,
    pub description: String,
}

/// Check of a diagnostic-only constraint (Saudization share) for one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDiagnostic {
    pub constraint_id: Uuid,
    pub constraint_type: ConstraintType,
    pub sector_code: String,
    pub target_share: f64,
    /// `None` when no Saudi share is known for the sector.
    pub observed_share: Option<f64>,
    /// target − observed; positive means short of the target.
    pub gap: Option<f64>,
    pub description: String,
}

/// Policy action that would unlock output held back by a binding constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enabler {
    /// 1 = largest output unlocked.
    pub priority_rank: usize,
    pub binding_constraint_id: Uuid,
    pub sector_codes: Vec<String>,
    pub output_unlocked: f64,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub total_constraints: usize,
    pub hard_count: usize,
    pub estimated_count: usize,
    pub assumed_count: usize,
    pub binding_hard: usize,
    pub binding_estimated: usize,
    pub binding_assumed: usize,
}

impl ConfidenceSummary {
    pub(crate) fn record(&mut self, confidence: ConstraintConfidence) {
        self.total_constraints += 1;
        match confidence {
            ConstraintConfidence::Hard => self.hard_count += 1,
            ConstraintConfidence::Estimated => self.estimated_count += 1,
            ConstraintConfidence::Assumed => self.assumed_count += 1,
        }
    }

    pub(crate) fn record_binding(&mut self, confidence: ConstraintConfidence) {
        match confidence {
            ConstraintConfidence::Hard => self.binding_hard += 1,
            ConstraintConfidence::Estimated => self.binding_estimated += 1,
            ConstraintConfidence::Assumed => self.binding_assumed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityTotals {
    pub total_unconstrained: f64,
    pub total_feasible: f64,
    pub total_gap: f64,
    /// total_gap / total_unconstrained; 0 when the denominator is ~0.
    pub gap_pct: f64,
}

impl FeasibilityTotals {
    pub(crate) fn new(unconstrained: &[f64], feasible: &[f64]) -> Self {
        let total_unconstrained: f64 = unconstrained.iter().sum();
        let total_feasible: f64 = feasible.iter().sum();
        let total_gap = total_feasible - total_unconstrained;
        let gap_pct = if total_unconstrained.abs() < 1e-12 {
            0.0
        } else {
            total_gap / total_unconstrained
        };
        Self {
            total_unconstrained,
            total_feasible,
            total_gap,
            gap_pct,
        }
    }
}

/// Constrained re-solve of one unconstrained Δx against one constraint set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityResult {
    pub unconstrained_run_id: Option<Uuid>,
    pub constraint_set_id: Uuid,
    pub constraint_set_version: u32,
    pub year: Option<i32>,
    pub feasible_delta_x: SectorVector,
    pub unconstrained_delta_x: SectorVector,
    /// feasible − unconstrained per sector.
    pub gap_vs_unconstrained: SectorVector,
    pub totals: FeasibilityTotals,
    pub binding_constraints: Vec<BindingConstraint>,
    pub slack_constraint_ids: Vec<Uuid>,
    /// Outside their time window for this year.
    pub inactive_constraint_ids: Vec<Uuid>,
    pub method: SolveMethod,
    pub fallback_used: bool,
    pub fallback_reason: Option<String>,
    pub enablers: Vec<Enabler>,
    pub compliance_diagnostics: Vec<ComplianceDiagnostic>,
    pub confidence_summary: ConfidenceSummary,
    pub warnings: Vec<DataQualityWarning>,
}
