//! Employment, import leakage and value added derived from Δx.

pub mod accounts;
pub mod coefficients;

pub use accounts::{SatelliteAccounts, SatelliteResult, SatelliteTotals};
pub use coefficients::SatelliteCoefficients;
