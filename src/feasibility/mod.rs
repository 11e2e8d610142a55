//! Constrained re-solve of Δx under capacity, ramp, labor and import caps and
//! floors, with Saudization targets reported alongside.

mod clipping;
pub mod constraints;
mod lp;
pub mod result;
pub mod solver;

pub use constraints::{
    BoundScope, Constraint, ConstraintConfidence, ConstraintScope, ConstraintSet, ConstraintType,
};
pub use result::{
    BindingConstraint, ComplianceDiagnostic, ConfidenceSummary, Enabler, FeasibilityResult,
    FeasibilityTotals, SolveMethod,
};
pub use solver::{FeasibilitySolver, SolveContext};
