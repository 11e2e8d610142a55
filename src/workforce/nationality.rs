use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{EngineError, EngineResult};

/// Three-tier feasibility of filling an occupation with Saudi nationals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NationalityTier {
    SaudiReady,
    SaudiTrainable,
    ExpatReliant,
}

/// Saudi share band (fractions in [0, 1], min ≤ mid ≤ max).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierRange {
    pub min: f64,
    pub mid: f64,
    pub max: f64,
}

impl TierRange {
    pub const fn new(min: f64, mid: f64, max: f64) -> Self {
        Self { min, mid, max }
    }

    pub fn validate(&self) -> EngineResult<()> {
        let ordered = 0.0 <= self.min && self.min <= self.mid && self.mid <= self.max && self.max <= 1.0;
        if !ordered {
            return Err(EngineError::InvalidInput(format!(
                "tier range must satisfy 0 <= min <= mid <= max <= 1, got ({}, {}, {})",
                self.min, self.mid, self.max
            )));
        }
        Ok(())
    }

    /// Band of ±`sensitivity` around a known share, clamped to [0, 1].
    pub fn around(pct: f64, sensitivity: f64) -> Self {
        let mid = pct.clamp(0.0, 1.0);
        Self {
            min: (mid - sensitivity).max(0.0),
            mid,
            max: (mid + sensitivity).min(1.0),
        }
    }
}

/// Default Saudi share bands per tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierRanges {
    pub saudi_ready: TierRange,
    pub saudi_trainable: TierRange,
    pub expat_reliant: TierRange,
}

impl Default for TierRanges {
    fn default() -> Self {
        Self {
            saudi_ready: TierRange::new(0.70, 0.85, 1.00),
            saudi_trainable: TierRange::new(0.20, 0.40, 0.60),
            expat_reliant: TierRange::new(0.00, 0.05, 0.20),
        }
    }
}

impl TierRanges {
    pub fn get(&self, tier: NationalityTier) -> TierRange {
        match tier {
            NationalityTier::SaudiReady => self.saudi_ready,
            NationalityTier::SaudiTrainable => self.saudi_trainable,
            NationalityTier::ExpatReliant => self.expat_reliant,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.saudi_ready.validate()?;
        self.saudi_trainable.validate()?;
        self.expat_reliant.validate()
    }
}

/// Tier assignment for one sector/occupation pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub sector_code: String,
    pub occupation_code: String,
    pub tier: NationalityTier,
    /// Observed Saudi share, when known; replaces the tier band.
    #[serde(default)]
    pub current_saudi_pct: Option<f64>,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NationalityClassifications {
    #[serde(default)]
    pub version: String,
    pub entries: Vec<Classification>,
}

impl NationalityClassifications {
    pub fn get(&self, sector: &str, occupation: &str) -> Option<&Classification> {
        self.entries
            .iter()
            .find(|c| c.sector_code == sector && c.occupation_code == occupation)
    }
}

/// Saudi jobs range, always in numeric order (min ≤ mid ≤ max) even when
/// the job change is negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SaudiJobsRange {
    pub min: f64,
    pub mid: f64,
    pub max: f64,
}

impl SaudiJobsRange {
    pub fn from_share(total_jobs: f64, share: TierRange) -> Self {
        let (min, max) = if total_jobs >= 0.0 {
            (total_jobs * share.min, total_jobs * share.max)
        } else {
            (total_jobs * share.max, total_jobs * share.min)
        };
        Self {
            min,
            mid: total_jobs * share.mid,
            max,
        }
    }

    pub fn add(&mut self, other: &SaudiJobsRange) {
        self.min += other.min;
        self.mid += other.mid;
        self.max += other.max;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalitySplit {
    pub sector_code: String,
    pub occupation_code: String,
    pub tier: NationalityTier,
    pub total_jobs: f64,
    pub saudi_jobs: SaudiJobsRange,
    pub current_saudi_pct: Option<f64>,
    /// Tier defaulted because no classification existed.
    pub assumed: bool,
    pub rationale: String,
}
