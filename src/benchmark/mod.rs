pub mod validator;

pub use validator::{validate_multipliers, BenchmarkValidator, SectorComparison, ValidationReport};
