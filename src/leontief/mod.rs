//! Leontief solve: Δx = (I − A)⁻¹ · Δf, single-shot and over multi-year
//! schedules.

pub mod multipliers;
pub mod schedule;
pub mod solver;

pub use multipliers::{employment_multipliers, output_multipliers};
pub use schedule::{ShockMode, ShockSchedule, ShockVector};
pub use solver::{apply_inverse, leontief_inverse, LeontiefSolver, PhasedResult, SolveResult};
