use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coefficients::SatelliteCoefficients;
use crate::error::EngineResult;
use crate::quality::DataQualityWarning;
use crate::vector::SectorVector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteTotals {
    pub employment: f64,
    pub import_leakage: f64,
    pub domestic_output: f64,
    pub value_added: f64,
}

/// Satellite impacts of one Δx.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteResult {
    pub employment: SectorVector,
    pub import_leakage: SectorVector,
    /// Δx − import leakage.
    pub domestic_output: SectorVector,
    pub value_added: SectorVector,
    pub totals: SatelliteTotals,
    pub coefficients_version_id: Uuid,
    pub warnings: Vec<DataQualityWarning>,
}

/// Element-wise application of satellite coefficients to Δx.
pub struct SatelliteAccounts;

impl SatelliteAccounts {
    /// Coefficient vectors must cover exactly the sectors of `delta_x`.
    pub fn apply(
        delta_x: &SectorVector,
        coefficients: &SatelliteCoefficients,
    ) -> EngineResult<SatelliteResult> {
        let order = delta_x.codes();
        let aligned = coefficients.align(order)?;
        let dx = delta_x.values();

        let product = |coeff: &[f64]| -> Vec<f64> {
            dx.iter().zip(coeff).map(|(x, c)| x * c).collect()
        };
        let employment = product(&aligned.jobs);
        let imports = product(&aligned.imports);
        let value_added = product(&aligned.value_added);
        let domestic: Vec<f64> = dx.iter().zip(&imports).map(|(x, m)| x - m).collect();

        let totals = SatelliteTotals {
            employment: employment.iter().sum(),
            import_leakage: imports.iter().sum(),
            domestic_output: domestic.iter().sum(),
            value_added: value_added.iter().sum(),
        };

        Ok(SatelliteResult {
            employment: SectorVector::from_aligned(order, employment),
            import_leakage: SectorVector::from_aligned(order, imports),
            domestic_output: SectorVector::from_aligned(order, domestic),
            value_added: SectorVector::from_aligned(order, value_added),
            totals,
            coefficients_version_id: coefficients.version_id,
            warnings: aligned.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::quality::WarningCode;

    fn vector(values: [f64; 2]) -> SectorVector {
        SectorVector::from_pairs([("S1", values[0]), ("S2", values[1])]).unwrap()
    }

    #[test]
    fn test_element_wise_products() {
        let coeffs = SatelliteCoefficients::new(
            vector([0.01, 0.02]),
            vector([0.3, 0.1]),
            vector([0.5, 0.4]),
        );
        let result = SatelliteAccounts::apply(&vector([100.0, 50.0]), &coeffs).unwrap();

        assert_eq!(result.employment.values(), &[1.0, 1.0]);
        assert_eq!(result.import_leakage.values(), &[30.0, 5.0]);
        assert_eq!(result.domestic_output.values(), &[70.0, 45.0]);
        assert_eq!(result.value_added.values(), &[50.0, 20.0]);
        assert_eq!(result.totals.employment, 2.0);
        assert_eq!(result.totals.import_leakage, 35.0);
        assert!(result.warnings.is_empty());
        assert_eq!(result.coefficients_version_id, coeffs.version_id);
    }

    #[test]
    fn test_coefficients_aligned_by_code() {
        let jobs = SectorVector::from_pairs([("S2", 2.0), ("S1", 1.0)]).unwrap();
        let coeffs = SatelliteCoefficients::new(jobs, vector([0.0, 0.0]), vector([0.0, 0.0]));
        let result = SatelliteAccounts::apply(&vector([10.0, 10.0]), &coeffs).unwrap();
        assert_eq!(result.employment.get("S1"), Some(10.0));
        assert_eq!(result.employment.get("S2"), Some(20.0));
    }

    #[test]
    fn test_out_of_range_ratio_is_flagged_not_rejected() {
        let coeffs = SatelliteCoefficients::new(
            vector([0.0, 0.0]),
            vector([1.2, 0.1]),
            vector([0.5, -0.1]),
        );
        let result = SatelliteAccounts::apply(&vector([10.0, 10.0]), &coeffs).unwrap();
        assert_eq!(result.import_leakage.values()[0], 12.0);
        assert_eq!(result.warnings.len(), 2);
        assert!(result
            .warnings
            .iter()
            .all(|w| w.code == WarningCode::RatioOutOfRange));
    }

    #[test]
    fn test_non_finite_coefficient_zeroed() {
        let coeffs = SatelliteCoefficients::new(
            vector([f64::NAN, 1.0]),
            vector([0.0, 0.0]),
            vector([0.0, 0.0]),
        );
        let result = SatelliteAccounts::apply(&vector([10.0, 10.0]), &coeffs).unwrap();
        assert_eq!(result.employment.values(), &[0.0, 10.0]);
        assert_eq!(result.warnings[0].code, WarningCode::NonFiniteCoefficient);
    }

    #[test]
    fn test_length_mismatch() {
        let short = SectorVector::from_pairs([("S1", 0.1)]).unwrap();
        let coeffs = SatelliteCoefficients::new(short, vector([0.0, 0.0]), vector([0.0, 0.0]));
        let err = SatelliteAccounts::apply(&vector([1.0, 1.0]), &coeffs).unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { .. }));
    }
}
