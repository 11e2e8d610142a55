use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::nationality::SaudiJobsRange;

/// Current workforce stock for a sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineWorkforce {
    pub sector_code: String,
    pub total_employment: f64,
    #[serde(default)]
    pub saudi_employment: Option<f64>,
}

/// Nitaqat-style Saudization target for a sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaudizationTarget {
    pub sector_code: String,
    pub effective_pct: f64,
    pub range_low: f64,
    pub range_high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Compliant,
    AtRisk,
    NonCompliant,
    NoTarget,
    InsufficientData,
}

/// Share range in numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PctRange {
    pub min: f64,
    pub mid: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub status: ComplianceStatus,
    pub target: Option<SaudizationTarget>,
    /// Post-impact Saudi share (baseline + projected Saudi jobs).
    pub projected_pct: Option<PctRange>,
    /// required − achieved; positive means short of target.
    pub gap_pct: Option<PctRange>,
    /// Saudi jobs missing at the mid projection, never negative.
    pub gap_jobs: Option<f64>,
}

impl ComplianceCheck {
    fn status_only(status: ComplianceStatus, target: Option<&SaudizationTarget>) -> Self {
        Self {
            status,
            target: target.cloned(),
            projected_pct: None,
            gap_pct: None,
            gap_jobs: None,
        }
    }
}

/// Diagnostic comparison of projected Saudi share against the sector target.
/// Never touches the job numbers it is given.
pub fn check_compliance(
    total_jobs: f64,
    saudi_jobs: &SaudiJobsRange,
    baseline: Option<&BaselineWorkforce>,
    target: Option<&SaudizationTarget>,
) -> ComplianceCheck {
    let Some(target) = target else {
        return ComplianceCheck::status_only(ComplianceStatus::NoTarget, None);
    };
    let Some(baseline) = baseline else {
        return ComplianceCheck::status_only(ComplianceStatus::InsufficientData, Some(target));
    };
    let post_total = baseline.total_employment + total_jobs;
    if post_total <= 0.0 {
        return ComplianceCheck::status_only(ComplianceStatus::InsufficientData, Some(target));
    }

    let base_saudi = baseline.saudi_employment.unwrap_or(0.0);
    let pct = |saudi: f64| (base_saudi + saudi) / post_total;
    let projected = PctRange {
        min: pct(saudi_jobs.min),
        mid: pct(saudi_jobs.mid),
        max: pct(saudi_jobs.max),
    };

    let status = if projected.min >= target.range_high {
        ComplianceStatus::Compliant
    } else if projected.max < target.range_low {
        ComplianceStatus::NonCompliant
    } else {
        ComplianceStatus::AtRisk
    };

    ComplianceCheck {
        status,
        target: Some(target.clone()),
        projected_pct: Some(projected),
        gap_pct: Some(PctRange {
            min: target.effective_pct - projected.max,
            mid: target.effective_pct - projected.mid,
            max: target.effective_pct - projected.min,
        }),
        gap_jobs: Some(((target.effective_pct - projected.mid) * post_total).max(0.0)),
    }
}
