use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use tracing::info;
use uuid::Uuid;

use super::bridge::{OccupationBridge, OccupationImpact};
use super::compliance::{
    check_compliance, BaselineWorkforce, ComplianceCheck, ComplianceStatus, SaudizationTarget,
};
use super::nationality::{
    NationalityClassifications, NationalitySplit, NationalityTier, SaudiJobsRange, TierRange,
};
use crate::config::WorkforceConfig;
use crate::error::EngineResult;
use crate::quality::{DataQualityWarning, WarningCode};
use crate::vector::SectorVector;

/// Which Δx the employment figures were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeltaXSource {
    Unconstrained,
    Feasible,
}

/// Identity of a workforce result; one result per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkforceKey {
    pub run_id: Uuid,
    pub coefficients_version_id: Uuid,
    pub delta_x_source: DeltaXSource,
}

impl WorkforceKey {
    pub fn idempotency_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.run_id, self.coefficients_version_id, self.delta_x_source
        )
    }
}

/// Reference data for the decomposition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkforceInputs {
    pub bridge: OccupationBridge,
    pub classifications: NationalityClassifications,
    #[serde(default)]
    pub targets: Vec<SaudizationTarget>,
    #[serde(default)]
    pub baseline: Vec<BaselineWorkforce>,
}

impl WorkforceInputs {
    /// Observed Saudi share of baseline employment, for sectors that report one.
    pub fn baseline_saudi_shares(&self) -> EngineResult<SectorVector> {
        SectorVector::from_pairs(self.baseline.iter().filter_map(|b| {
            let saudi = b.saudi_employment?;
            (b.total_employment > 0.0).then(|| (b.sector_code.as_str(), saudi / b.total_employment))
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierJobs {
    pub tier: NationalityTier,
    pub jobs: f64,
    pub saudi_jobs: SaudiJobsRange,
    /// Target share minus the tier's mid Saudi share; `None` without a target
    /// or without jobs in the tier.
    pub gap_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorWorkforce {
    pub sector_code: String,
    pub total_jobs: f64,
    pub saudi_jobs: SaudiJobsRange,
    pub tiers: Vec<TierJobs>,
    pub compliance: ComplianceCheck,
    pub training_gap_occupations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingGapEntry {
    pub sector_code: String,
    pub occupation_code: String,
    pub total_jobs: f64,
    pub gap_jobs: f64,
    pub target_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCounts {
    pub compliant: usize,
    pub at_risk: usize,
    pub non_compliant: usize,
    pub no_target: usize,
    pub insufficient_data: usize,
}

impl ComplianceCounts {
    fn record(&mut self, status: ComplianceStatus) {
        match status {
            ComplianceStatus::Compliant => self.compliant += 1,
            ComplianceStatus::AtRisk => self.at_risk += 1,
            ComplianceStatus::NonCompliant => self.non_compliant += 1,
            ComplianceStatus::NoTarget => self.no_target += 1,
            ComplianceStatus::InsufficientData => self.insufficient_data += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkforceResult {
    pub key: WorkforceKey,
    pub idempotency_key: String,
    pub bridge_version: String,
    pub classification_version: String,
    pub sectors: Vec<SectorWorkforce>,
    pub occupations: Vec<OccupationImpact>,
    pub nationality_splits: Vec<NationalitySplit>,
    pub total_jobs: f64,
    pub total_saudi_jobs: SaudiJobsRange,
    pub compliance_counts: ComplianceCounts,
    pub total_gap_jobs: f64,
    /// Sorted by gap, largest first.
    pub training_gap: Vec<TrainingGapEntry>,
    pub data_quality_notes: Vec<DataQualityWarning>,
}

/// Occupation, nationality and Saudization breakdown of Δjobs.
///
/// Purely diagnostic: per-sector totals always equal the input jobs.
#[derive(Debug, Clone, Default)]
pub struct WorkforceSatellite {
    config: WorkforceConfig,
}

const TIERS: [NationalityTier; 3] = [
    NationalityTier::SaudiReady,
    NationalityTier::SaudiTrainable,
    NationalityTier::ExpatReliant,
];

impl WorkforceSatellite {
    pub fn new(config: WorkforceConfig) -> Self {
        Self { config }
    }

    pub fn decompose(
        &self,
        delta_jobs: &SectorVector,
        inputs: &WorkforceInputs,
        key: WorkforceKey,
    ) -> EngineResult<WorkforceResult> {
        self.config.tier_ranges.validate()?;

        let mut notes = Vec::new();
        let occupations = inputs
            .bridge
            .decompose(delta_jobs, self.config.bridge_tolerance, &mut notes);
        let nationality_splits: Vec<NationalitySplit> = occupations
            .iter()
            .map(|impact| self.split(impact, inputs, &mut notes))
            .collect();

        let targets: HashMap<&str, &SaudizationTarget> = inputs
            .targets
            .iter()
            .map(|t| (t.sector_code.as_str(), t))
            .collect();
        let baseline: HashMap<&str, &BaselineWorkforce> = inputs
            .baseline
            .iter()
            .map(|b| (b.sector_code.as_str(), b))
            .collect();

        let mut sectors = Vec::with_capacity(delta_jobs.len());
        let mut training_gap = Vec::new();
        let mut compliance_counts = ComplianceCounts::default();
        let mut total_saudi_jobs = SaudiJobsRange::default();

        for (code, jobs) in delta_jobs.iter() {
            let splits: Vec<&NationalitySplit> = nationality_splits
                .iter()
                .filter(|s| s.sector_code == code)
                .collect();
            let target = targets.get(code).copied();

            let mut saudi_jobs = SaudiJobsRange::default();
            for s in &splits {
                saudi_jobs.add(&s.saudi_jobs);
            }
            total_saudi_jobs.add(&saudi_jobs);

            let tiers = TIERS
                .iter()
                .map(|tier| tier_jobs(*tier, &splits, target))
                .collect();

            let base = baseline.get(code).copied();
            if target.is_some() && base.is_none() {
                notes.push(DataQualityWarning::new(
                    WarningCode::MissingBaseline,
                    Some(code),
                    "Saudization target present but no baseline workforce",
                ));
            }
            let compliance = check_compliance(jobs, &saudi_jobs, base, target);
            compliance_counts.record(compliance.status);

            let trainable: Vec<&NationalitySplit> = splits
                .iter()
                .copied()
                .filter(|s| s.tier == NationalityTier::SaudiTrainable)
                .collect();
            // contracting sectors need no training pipeline
            if jobs >= 0.0 {
                training_gap.extend(
                    trainable
                        .iter()
                        .filter(|s| s.total_jobs > 0.0)
                        .map(|s| training_entry(s, target)),
                );
            }

            sectors.push(SectorWorkforce {
                sector_code: code.to_string(),
                total_jobs: jobs,
                saudi_jobs,
                tiers,
                compliance,
                training_gap_occupations: trainable
                    .iter()
                    .map(|s| s.occupation_code.clone())
                    .collect(),
            });
        }

        training_gap.sort_by(|a, b| b.gap_jobs.total_cmp(&a.gap_jobs));

        let total_gap_jobs: f64 = sectors
            .iter()
            .filter_map(|s| s.compliance.gap_jobs)
            .sum();

        info!(
            run_id = %key.run_id,
            sectors = sectors.len(),
            total_jobs = delta_jobs.total(),
            notes = notes.len(),
            "workforce decomposition complete"
        );

        Ok(WorkforceResult {
            idempotency_key: key.idempotency_key(),
            key,
            bridge_version: inputs.bridge.version.clone(),
            classification_version: inputs.classifications.version.clone(),
            sectors,
            occupations,
            nationality_splits,
            total_jobs: delta_jobs.total(),
            total_saudi_jobs,
            compliance_counts,
            total_gap_jobs,
            training_gap,
            data_quality_notes: notes,
        })
    }

    fn split(
        &self,
        impact: &OccupationImpact,
        inputs: &WorkforceInputs,
        notes: &mut Vec<DataQualityWarning>,
    ) -> NationalitySplit {
        let sector = impact.sector_code.as_str();
        let occupation = impact.occupation_code.as_str();

        let (tier, current, rationale, assumed) =
            match inputs.classifications.get(sector, occupation) {
                Some(c) => (c.tier, c.current_saudi_pct, c.rationale.clone(), false),
                None => {
                    notes.push(DataQualityWarning::new(
                        WarningCode::MissingClassification,
                        Some(sector),
                        format!("no nationality classification for occupation {occupation}; using expat_reliant"),
                    ));
                    (
                        NationalityTier::ExpatReliant,
                        None,
                        format!("No classification for {sector}/{occupation}"),
                        true,
                    )
                }
            };

        let share = match current {
            Some(pct) => {
                if !(0.0..=1.0).contains(&pct) {
                    notes.push(DataQualityWarning::new(
                        WarningCode::RatioOutOfRange,
                        Some(sector),
                        format!("current_saudi_pct={pct} for occupation {occupation} clamped to [0, 1]"),
                    ));
                }
                TierRange::around(pct, self.config.known_pct_sensitivity)
            }
            None => self.config.tier_ranges.get(tier),
        };

        NationalitySplit {
            sector_code: impact.sector_code.clone(),
            occupation_code: impact.occupation_code.clone(),
            tier,
            total_jobs: impact.jobs,
            saudi_jobs: SaudiJobsRange::from_share(impact.jobs, share),
            current_saudi_pct: current,
            assumed,
            rationale,
        }
    }
}

fn tier_jobs(
    tier: NationalityTier,
    splits: &[&NationalitySplit],
    target: Option<&SaudizationTarget>,
) -> TierJobs {
    let mut jobs = 0.0;
    let mut saudi_jobs = SaudiJobsRange::default();
    for s in splits.iter().filter(|s| s.tier == tier) {
        jobs += s.total_jobs;
        saudi_jobs.add(&s.saudi_jobs);
    }
    let gap_pct = match target {
        Some(t) if jobs.abs() > 0.0 => Some(t.effective_pct - saudi_jobs.mid / jobs),
        _ => None,
    };
    TierJobs {
        tier,
        jobs,
        saudi_jobs,
        gap_pct,
    }
}

fn training_entry(split: &NationalitySplit, target: Option<&SaudizationTarget>) -> TrainingGapEntry {
    let gap = match target {
        Some(t) => split.total_jobs * t.effective_pct - split.saudi_jobs.mid,
        None => split.saudi_jobs.mid,
    };
    TrainingGapEntry {
        sector_code: split.sector_code.clone(),
        occupation_code: split.occupation_code.clone(),
        total_jobs: split.total_jobs,
        gap_jobs: gap.max(0.0),
        target_pct: target.map(|t| t.effective_pct),
    }
}
