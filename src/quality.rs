use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Kind of data-quality finding attached to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    RatioOutOfRange,
    NonFiniteCoefficient,
    BridgeNotNormalized,
    MissingBridge,
    MissingClassification,
    MissingBaseline,
    UnmatchedSector,
    FallbackApplied,
}

/// Data-quality issue. Never blocks computation, always travels with the
/// result it was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityWarning {
    pub code: WarningCode,
    pub sector: Option<String>,
    pub message: String,
}

impl DataQualityWarning {
    pub fn new(code: WarningCode, sector: Option<&str>, message: impl Into<String>) -> Self {
        let warning = Self {
            code,
            sector: sector.map(str::to_string),
            message: message.into(),
        };
        tracing::warn!(code = %warning.code, sector = ?warning.sector, "{}", warning.message);
        warning
    }
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sector {
            Some(sector) => write!(f, "[{}] {}: {}", self.code, sector, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}
