use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::leontief::ShockMode;
use crate::workforce::TierRanges;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub solver: SolverConfig,
    pub feasibility: FeasibilityConfig,
    pub benchmark: BenchmarkConfig,
    pub workforce: WorkforceConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 1-norm condition number of (I - A) above which the system is treated
    /// as singular.
    pub max_condition_number: f64,
    /// Number of Leontief inverses kept in memory.
    pub cache_capacity: usize,
    pub shock_mode: ShockMode,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_condition_number: 1e12,
            cache_capacity: 16,
            shock_mode: ShockMode::PerYear,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeasibilityConfig {
    pub binding_tolerance: f64,
    /// Objective weight per unit of soft-constraint violation.
    pub soft_penalty: f64,
    /// When false the clipping fallback is used directly.
    pub lp_enabled: bool,
}

impl Default for FeasibilityConfig {
    fn default() -> Self {
        Self {
            binding_tolerance: 1e-6,
            soft_penalty: 1000.0,
            lp_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub tolerance: f64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self { tolerance: 0.05 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkforceConfig {
    pub tier_ranges: TierRanges,
    /// Band applied around a known current Saudi share.
    pub known_pct_sensitivity: f64,
    /// Bridge weights must sum to 1.0 within this tolerance.
    pub bridge_tolerance: f64,
}

impl Default for WorkforceConfig {
    fn default() -> Self {
        Self {
            tier_ranges: TierRanges::default(),
            known_pct_sensitivity: 0.10,
            bridge_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// 0 = one worker per available core.
    pub worker_threads: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("IMPACT__").split("__"));
        figment
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.feasibility.binding_tolerance, 1e-6);
        assert_eq!(cfg.benchmark.tolerance, 0.05);
        assert_eq!(cfg.solver.shock_mode, ShockMode::PerYear);
        assert_eq!(cfg.batch.worker_threads, 0);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let cfg = Config::load_from("does/not/exist.toml").unwrap();
        assert_eq!(cfg.solver.cache_capacity, 16);
    }

    #[test]
    fn test_toml_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[solver]\nshock_mode = \"cumulative\"\ncache_capacity = 4\n\n[feasibility]\nsoft_penalty = 50.0"
        )
        .unwrap();

        let cfg = Config::load_from(file.path()).unwrap();
        assert_eq!(cfg.solver.shock_mode, ShockMode::Cumulative);
        assert_eq!(cfg.solver.cache_capacity, 4);
        assert_eq!(cfg.feasibility.soft_penalty, 50.0);
        // untouched keys keep their defaults
        assert_eq!(cfg.feasibility.binding_tolerance, 1e-6);
    }
}
