//! Input-Output economic impact engine.
//!
//! Leontief propagation of final-demand shocks, satellite accounts
//! (employment, imports, value added), constrained feasibility re-solves,
//! benchmark validation of multipliers and workforce decomposition.

pub mod benchmark;
pub mod config;
pub mod error;
pub mod feasibility;
pub mod identity;
pub mod leontief;
pub mod model;
pub mod pipeline;
pub mod quality;
pub mod satellite;
pub mod telemetry;
pub mod vector;
pub mod workforce;

pub use error::{EngineError, EngineResult};
pub use vector::SectorVector;
