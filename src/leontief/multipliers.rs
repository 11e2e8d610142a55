use nalgebra::DMatrix;

use crate::error::{EngineError, EngineResult};
use crate::vector::SectorVector;

/// Type I output multipliers: column sums of the Leontief inverse.
pub fn output_multipliers(inverse: &DMatrix<f64>, sector_codes: &[String]) -> SectorVector {
    let sums = inverse.column_iter().map(|c| c.sum()).collect();
    SectorVector::from_aligned(sector_codes, sums)
}

/// Jobs generated across the economy per unit of final demand in each sector:
/// Σᵢ jobs_coeffᵢ · L[i][j].
pub fn employment_multipliers(
    inverse: &DMatrix<f64>,
    sector_codes: &[String],
    jobs_coeff: &[f64],
) -> EngineResult<SectorVector> {
    if jobs_coeff.len() != inverse.nrows() {
        return Err(EngineError::dimension(
            "jobs coefficients",
            inverse.nrows(),
            jobs_coeff.len(),
        ));
    }
    let values = inverse
        .column_iter()
        .map(|c| c.iter().zip(jobs_coeff).map(|(l, e)| l * e).sum())
        .collect();
    Ok(SectorVector::from_aligned(sector_codes, values))
}
