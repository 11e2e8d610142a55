use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::quality::{DataQualityWarning, WarningCode};
use crate::vector::SectorVector;

/// ISCO-08 major group assigned when a sector has no bridge row.
pub const DEFAULT_OCCUPATION: &str = "9";

pub fn occupation_label(code: &str) -> String {
    let label = match code {
        "0" => "Armed Forces",
        "1" => "Managers",
        "2" => "Professionals",
        "3" => "Technicians",
        "4" => "Clerical Support",
        "5" => "Service and Sales",
        "6" => "Agricultural Workers",
        "7" => "Craft Workers",
        "8" => "Plant/Machine Operators",
        "9" => "Elementary Occupations",
        other => return format!("ISCO {other}"),
    };
    label.to_string()
}

/// Sector → occupation share weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupationBridge {
    #[serde(default)]
    pub version: String,
    pub shares: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupationImpact {
    pub sector_code: String,
    pub occupation_code: String,
    pub occupation_label: String,
    pub jobs: f64,
    pub share_of_sector: f64,
    /// Share came from the default occupation rather than the bridge.
    pub assumed: bool,
}

impl OccupationBridge {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            shares: BTreeMap::new(),
        }
    }

    pub fn with_sector<S: Into<String>>(
        mut self,
        sector: impl Into<String>,
        shares: impl IntoIterator<Item = (S, f64)>,
    ) -> Self {
        self.shares.insert(
            sector.into(),
            shares.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        );
        self
    }

    /// Shares for `sector`, normalized to sum to 1. `None` when the sector has
    /// no usable row.
    fn normalized_shares(
        &self,
        sector: &str,
        tolerance: f64,
        notes: &mut Vec<DataQualityWarning>,
    ) -> Option<Vec<(String, f64)>> {
        let row = self.shares.get(sector)?;
        let usable: Vec<(String, f64)> = row
            .iter()
            .filter(|(_, w)| w.is_finite() && **w >= 0.0)
            .map(|(k, w)| (k.clone(), *w))
            .collect();
        if usable.len() != row.len() {
            notes.push(DataQualityWarning::new(
                WarningCode::BridgeNotNormalized,
                Some(sector),
                "negative or non-finite bridge weights dropped",
            ));
        }
        let sum: f64 = usable.iter().map(|(_, w)| w).sum();
        if sum <= 0.0 {
            return None;
        }
        if (sum - 1.0).abs() > tolerance {
            notes.push(DataQualityWarning::new(
                WarningCode::BridgeNotNormalized,
                Some(sector),
                format!("bridge weights sum to {sum:.6}; normalized"),
            ));
        }
        Some(usable.into_iter().map(|(k, w)| (k, w / sum)).collect())
    }

    /// Spreads each sector's jobs over its occupations.
    pub fn decompose(
        &self,
        delta_jobs: &SectorVector,
        tolerance: f64,
        notes: &mut Vec<DataQualityWarning>,
    ) -> Vec<OccupationImpact> {
        let mut impacts = Vec::new();
        for (sector, jobs) in delta_jobs.iter() {
            match self.normalized_shares(sector, tolerance, notes) {
                Some(shares) => {
                    impacts.extend(shares.into_iter().map(|(occupation, share)| OccupationImpact {
                        sector_code: sector.to_string(),
                        occupation_label: occupation_label(&occupation),
                        occupation_code: occupation,
                        jobs: jobs * share,
                        share_of_sector: share,
                        assumed: false,
                    }));
                }
                None => {
                    notes.push(DataQualityWarning::new(
                        WarningCode::MissingBridge,
                        Some(sector),
                        format!(
                            "no occupation bridge; all jobs assigned to ISCO {DEFAULT_OCCUPATION} (ASSUMED)"
                        ),
                    ));
                    impacts.push(OccupationImpact {
                        sector_code: sector.to_string(),
                        occupation_code: DEFAULT_OCCUPATION.to_string(),
                        occupation_label: occupation_label(DEFAULT_OCCUPATION),
                        jobs,
                        share_of_sector: 1.0,
                        assumed: true,
                    });
                }
            }
        }
        impacts
    }
}
