use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::identity::content_id;
use crate::quality::{DataQualityWarning, WarningCode};
use crate::vector::SectorVector;

/// Per-sector satellite ratios, versioned and attached to a run rather than to
/// the model. A missing `version_id` is derived from the ratios, so the same
/// file always loads under the same version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CoefficientsRepr")]
pub struct SatelliteCoefficients {
    pub version_id: Uuid,
    /// Jobs per unit of output.
    pub jobs_coeff: SectorVector,
    /// Imports per unit of output, expected in [0, 1].
    pub import_ratio: SectorVector,
    /// Value added per unit of output, expected in [0, 1].
    pub va_ratio: SectorVector,
}

/// Coefficients aligned to model order, with non-finite entries zeroed.
#[derive(Debug, Clone)]
pub(crate) struct AlignedCoefficients {
    pub jobs: Vec<f64>,
    pub imports: Vec<f64>,
    pub value_added: Vec<f64>,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Deserialize)]
struct CoefficientsRepr {
    #[serde(default)]
    version_id: Option<Uuid>,
    jobs_coeff: SectorVector,
    import_ratio: SectorVector,
    va_ratio: SectorVector,
}

impl From<CoefficientsRepr> for SatelliteCoefficients {
    fn from(repr: CoefficientsRepr) -> Self {
        let coefficients = Self::new(repr.jobs_coeff, repr.import_ratio, repr.va_ratio);
        match repr.version_id {
            Some(version_id) => Self {
                version_id,
                ..coefficients
            },
            None => coefficients,
        }
    }
}

impl SatelliteCoefficients {
    pub fn new(jobs_coeff: SectorVector, import_ratio: SectorVector, va_ratio: SectorVector) -> Self {
        let version_id = content_id(
            "satellite_coefficients",
            &(&jobs_coeff, &import_ratio, &va_ratio),
        );
        Self {
            version_id,
            jobs_coeff,
            import_ratio,
            va_ratio,
        }
    }

    /// All coefficients zero; runs without satellite inputs use this.
    pub fn zeros(order: &[String]) -> Self {
        Self {
            version_id: Uuid::nil(),
            jobs_coeff: SectorVector::zeros(order),
            import_ratio: SectorVector::zeros(order),
            va_ratio: SectorVector::zeros(order),
        }
    }

    pub(crate) fn align(&self, order: &[String]) -> EngineResult<AlignedCoefficients> {
        let mut warnings = Vec::new();
        let jobs = checked(
            self.jobs_coeff.align_exact(order, "jobs_coeff")?,
            order,
            "jobs_coeff",
            None,
            &mut warnings,
        );
        let imports = checked(
            self.import_ratio.align_exact(order, "import_ratio")?,
            order,
            "import_ratio",
            Some((0.0, 1.0)),
            &mut warnings,
        );
        let value_added = checked(
            self.va_ratio.align_exact(order, "va_ratio")?,
            order,
            "va_ratio",
            Some((0.0, 1.0)),
            &mut warnings,
        );
        Ok(AlignedCoefficients {
            jobs,
            imports,
            value_added,
            warnings,
        })
    }
}

fn checked(
    mut values: Vec<f64>,
    order: &[String],
    name: &str,
    range: Option<(f64, f64)>,
    warnings: &mut Vec<DataQualityWarning>,
) -> Vec<f64> {
    for (value, code) in values.iter_mut().zip(order) {
        if !value.is_finite() {
            warnings.push(DataQualityWarning::new(
                WarningCode::NonFiniteCoefficient,
                Some(code),
                format!("{name}={value} treated as 0"),
            ));
            *value = 0.0;
            continue;
        }
        if let Some((lo, hi)) = range {
            if *value < lo || *value > hi {
                warnings.push(DataQualityWarning::new(
                    WarningCode::RatioOutOfRange,
                    Some(code),
                    format!("{name}={value} outside [{lo}, {hi}]"),
                ));
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "jobs_coeff": {"S1": 0.5, "S2": 0.25},
        "import_ratio": {"S1": 0.1, "S2": 0.2},
        "va_ratio": {"S1": 0.4, "S2": 0.6}
    }"#;

    #[test]
    fn test_missing_version_is_stable_across_loads() {
        let first: SatelliteCoefficients = serde_json::from_str(BODY).unwrap();
        let second: SatelliteCoefficients = serde_json::from_str(BODY).unwrap();
        assert_eq!(first.version_id, second.version_id);
        assert!(!first.version_id.is_nil());
        assert_eq!(first, second);
    }

    #[test]
    fn test_changed_ratio_changes_version() {
        let first: SatelliteCoefficients = serde_json::from_str(BODY).unwrap();
        let edited: SatelliteCoefficients =
            serde_json::from_str(&BODY.replace("0.25", "0.3")).unwrap();
        assert_ne!(first.version_id, edited.version_id);
    }

    #[test]
    fn test_explicit_version_kept() {
        let id = Uuid::new_v4();
        let body = BODY.replacen('{', &format!("{{\"version_id\": \"{id}\","), 1);
        let loaded: SatelliteCoefficients = serde_json::from_str(&body).unwrap();
        assert_eq!(loaded.version_id, id);
    }

    #[test]
    fn test_serialized_coefficients_reload_unchanged() {
        let loaded: SatelliteCoefficients = serde_json::from_str(BODY).unwrap();
        let again: SatelliteCoefficients =
            serde_json::from_str(&serde_json::to_string(&loaded).unwrap()).unwrap();
        assert_eq!(loaded, again);
    }
}
