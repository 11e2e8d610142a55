//! Workforce decomposition of employment impacts: occupations, nationality
//! tiers and Saudization compliance. Diagnostic only.

pub mod bridge;
pub mod compliance;
pub mod nationality;
pub mod satellite;

pub use bridge::{OccupationBridge, OccupationImpact, DEFAULT_OCCUPATION};
pub use compliance::{BaselineWorkforce, ComplianceCheck, ComplianceStatus, PctRange, SaudizationTarget};
pub use nationality::{
    Classification, NationalityClassifications, NationalitySplit, NationalityTier, SaudiJobsRange,
    TierRange, TierRanges,
};
pub use satellite::{
    DeltaXSource, SectorWorkforce, TrainingGapEntry, WorkforceInputs, WorkforceKey,
    WorkforceResult, WorkforceSatellite,
};
