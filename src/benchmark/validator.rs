//! Multiplier benchmark validation
//!
//! Compares computed Type I multipliers against independently published
//! reference values. Read-only quality gate: nothing here feeds back into a
//! solve.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::config::BenchmarkConfig;
use crate::error::EngineResult;

/// Below this magnitude a benchmark value is treated as zero and pct_diff is 0.
const ZERO_BENCHMARK: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorComparison {
    pub sector_code: String,
    pub computed: f64,
    pub benchmark: f64,
    /// computed − benchmark
    pub absolute_diff: f64,
    /// (computed − benchmark) / benchmark
    pub pct_diff: f64,
    pub within_tolerance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Sorted by sector code.
    pub sector_comparisons: Vec<SectorComparison>,
    pub sectors_within_tolerance: usize,
    pub sectors_outside_tolerance: usize,
    pub total_sectors: usize,
    pub rmse: f64,
    pub mae: f64,
    pub max_pct_diff: f64,
    pub tolerance_used: f64,
    pub overall_pass: bool,
    pub warnings: Vec<String>,
}

/// Compare `computed` against `benchmark` over their common sectors.
///
/// Sectors present on one side only produce a warning and are left out of the
/// statistics. An empty intersection fails.
pub fn validate_multipliers(
    computed: &BTreeMap<String, f64>,
    benchmark: &BTreeMap<String, f64>,
    tolerance: f64,
) -> ValidationReport {
    let mut warnings = Vec::new();

    let computed_keys: BTreeSet<&String> = computed.keys().collect();
    let benchmark_keys: BTreeSet<&String> = benchmark.keys().collect();

    let only_computed: Vec<&str> = computed_keys
        .difference(&benchmark_keys)
        .map(|s| s.as_str())
        .collect();
    let only_benchmark: Vec<&str> = benchmark_keys
        .difference(&computed_keys)
        .map(|s| s.as_str())
        .collect();
    if !only_computed.is_empty() {
        warnings.push(format!(
            "Sectors in computed but not benchmark: {only_computed:?}"
        ));
    }
    if !only_benchmark.is_empty() {
        warnings.push(format!(
            "Sectors in benchmark but not computed: {only_benchmark:?}"
        ));
    }

    let sector_comparisons: Vec<SectorComparison> = computed_keys
        .intersection(&benchmark_keys)
        .map(|code| {
            let computed = computed[*code];
            let benchmark = benchmark[*code];
            let absolute_diff = computed - benchmark;
            let pct_diff = if benchmark.abs() < ZERO_BENCHMARK {
                0.0
            } else {
                absolute_diff / benchmark
            };
            SectorComparison {
                sector_code: (*code).clone(),
                computed,
                benchmark,
                absolute_diff,
                pct_diff,
                within_tolerance: pct_diff.abs() <= tolerance,
            }
        })
        .collect();

    let n = sector_comparisons.len();
    let within = sector_comparisons.iter().filter(|c| c.within_tolerance).count();
    let (rmse, mae) = if n > 0 {
        let sq: f64 = sector_comparisons.iter().map(|c| c.absolute_diff.powi(2)).sum();
        let abs: f64 = sector_comparisons.iter().map(|c| c.absolute_diff.abs()).sum();
        ((sq / n as f64).sqrt(), abs / n as f64)
    } else {
        (0.0, 0.0)
    };
    let max_pct_diff = sector_comparisons
        .iter()
        .map(|c| c.pct_diff.abs())
        .fold(0.0, f64::max);

    let report = ValidationReport {
        sectors_within_tolerance: within,
        sectors_outside_tolerance: n - within,
        total_sectors: n,
        rmse,
        mae,
        max_pct_diff,
        tolerance_used: tolerance,
        overall_pass: n > 0 && within == n,
        warnings,
        sector_comparisons,
    };

    if report.overall_pass {
        info!(sectors = n, rmse, "multiplier benchmark passed");
    } else {
        warn!(
            sectors = n,
            outside = report.sectors_outside_tolerance,
            max_pct_diff,
            "multiplier benchmark failed"
        );
    }
    report
}

#[derive(Debug, Deserialize)]
struct BenchmarkFile {
    #[serde(default)]
    sectors: Vec<BenchmarkEntry>,
}

#[derive(Debug, Deserialize)]
struct BenchmarkEntry {
    #[serde(default)]
    sector_code: String,
    #[serde(default)]
    output_multiplier: f64,
}

/// Benchmark validator bound to a configured tolerance.
#[derive(Debug, Clone)]
pub struct BenchmarkValidator {
    tolerance: f64,
}

impl Default for BenchmarkValidator {
    fn default() -> Self {
        Self::new(&BenchmarkConfig::default())
    }
}

impl BenchmarkValidator {
    pub fn new(config: &BenchmarkConfig) -> Self {
        Self {
            tolerance: config.tolerance,
        }
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn validate(
        &self,
        computed: &BTreeMap<String, f64>,
        benchmark: &BTreeMap<String, f64>,
    ) -> ValidationReport {
        validate_multipliers(computed, benchmark, self.tolerance)
    }

    /// Reads `{"sectors": [{"sector_code": .., "output_multiplier": ..}]}`.
    /// Entries without a sector code are skipped.
    pub fn load_benchmark_from_file(path: impl AsRef<Path>) -> EngineResult<BTreeMap<String, f64>> {
        let raw = std::fs::read_to_string(path)?;
        let file: BenchmarkFile = serde_json::from_str(&raw)?;
        Ok(file
            .sectors
            .into_iter()
            .filter(|s| !s.sector_code.is_empty())
            .map(|s| (s.sector_code, s.output_multiplier))
            .collect())
    }

    pub fn format_report(report: &ValidationReport) -> String {
        report.to_string()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Multiplier Benchmark Validation ===")?;
        writeln!(f, "Tolerance: {:.1}%", self.tolerance_used * 100.0)?;
        writeln!(f, "Sectors: {}", self.total_sectors)?;
        writeln!(
            f,
            "Pass: {} | Fail: {}",
            self.sectors_within_tolerance, self.sectors_outside_tolerance
        )?;
        writeln!(f, "RMSE: {:.4} | MAE: {:.4}", self.rmse, self.mae)?;
        writeln!(f, "Max % diff: {:.2}%", self.max_pct_diff * 100.0)?;
        writeln!(
            f,
            "Overall: {}",
            if self.overall_pass { "PASS" } else { "FAIL" }
        )?;
        writeln!(f)?;
        write!(f, "Per-sector details:")?;

        let mut by_divergence: Vec<&SectorComparison> = self.sector_comparisons.iter().collect();
        by_divergence.sort_by(|a, b| b.pct_diff.abs().total_cmp(&a.pct_diff.abs()));
        for c in by_divergence {
            write!(
                f,
                "\n  [{}] {}: computed={:.3} bench={:.3} diff={:+.2}%",
                if c.within_tolerance { "ok" } else { "!!" },
                c.sector_code,
                c.computed,
                c.benchmark,
                c.pct_diff * 100.0
            )?;
        }

        if !self.warnings.is_empty() {
            write!(f, "\n\nWarnings:")?;
            for w in &self.warnings {
                write!(f, "\n  - {w}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_identical_inputs_pass() {
        let x = map(&[("A", 1.5), ("B", 1.3)]);
        let report = validate_multipliers(&x, &x, 0.05);
        assert!(report.overall_pass);
        assert_eq!(report.rmse, 0.0);
        assert_eq!(report.mae, 0.0);
        assert_eq!(report.total_sectors, 2);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_divergent_sector_flagged() {
        let report = validate_multipliers(
            &map(&[("A", 1.50), ("B", 1.80)]),
            &map(&[("A", 1.50), ("B", 1.30)]),
            0.05,
        );
        assert!(!report.overall_pass);
        let b = &report.sector_comparisons[1];
        assert_eq!(b.sector_code, "B");
        assert!(!b.within_tolerance);
        assert!((b.pct_diff - 0.5 / 1.3).abs() < 1e-12);
        assert_eq!(report.sectors_outside_tolerance, 1);
        assert!((report.max_pct_diff - 0.3846).abs() < 1e-4);
    }

    #[test]
    fn test_empty_intersection_fails() {
        let report = validate_multipliers(&map(&[("A", 1.0)]), &map(&[("B", 1.0)]), 0.05);
        assert!(!report.overall_pass);
        assert_eq!(report.total_sectors, 0);
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.rmse, 0.0);
    }

    #[test]
    fn test_zero_benchmark_has_zero_pct_diff() {
        let report = validate_multipliers(&map(&[("A", 0.7)]), &map(&[("A", 0.0)]), 0.05);
        let a = &report.sector_comparisons[0];
        assert_eq!(a.pct_diff, 0.0);
        assert!(a.within_tolerance);
        assert!((a.absolute_diff - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let report = validate_multipliers(&map(&[("A", 1.25)]), &map(&[("A", 1.0)]), 0.25);
        assert!(report.overall_pass);
    }

    #[test]
    fn test_load_benchmark_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sectors": [{{"sector_code": "A", "output_multiplier": 1.23}}, {{"sector_code": "", "output_multiplier": 9.0}}]}}"#
        )
        .unwrap();
        let loaded = BenchmarkValidator::load_benchmark_from_file(file.path()).unwrap();
        assert_eq!(loaded, map(&[("A", 1.23)]));
    }

    #[test]
    fn test_format_report_sorted_by_divergence() {
        let report = validate_multipliers(
            &map(&[("A", 1.50), ("B", 1.80)]),
            &map(&[("A", 1.50), ("B", 1.30)]),
            0.05,
        );
        let text = BenchmarkValidator::format_report(&report);
        assert!(text.contains("Overall: FAIL"));
        let b = text.find("] B:").unwrap();
        let a = text.find("] A:").unwrap();
        assert!(b < a);
    }
}
