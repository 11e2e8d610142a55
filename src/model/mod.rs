//! Input-Output model snapshots, version registry and the Leontief inverse
//! cache.

pub mod cache;
pub mod io_model;
pub mod ras;
pub mod store;

pub use cache::{CacheStats, LeontiefCache};
pub use io_model::{technical_coefficients, IoModel, ModelSnapshot};
pub use ras::{RasBalancer, RasResult};
pub use store::{ModelStore, ModelVersion, RegisteredModel};
