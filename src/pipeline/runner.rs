use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::feasibility::{ConstraintSet, FeasibilityResult, FeasibilitySolver, SolveContext};
use crate::leontief::{LeontiefSolver, ShockMode, ShockSchedule};
use crate::model::{ModelStore, RegisteredModel};
use crate::quality::DataQualityWarning;
use crate::satellite::{SatelliteAccounts, SatelliteCoefficients, SatelliteTotals};
use crate::vector::SectorVector;
use crate::workforce::{DeltaXSource, WorkforceInputs, WorkforceKey, WorkforceResult, WorkforceSatellite};

/// A named shock schedule against one model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub model_version_id: Uuid,
    pub schedule: ShockSchedule,
    /// Overrides `solver.shock_mode` for this scenario.
    #[serde(default)]
    pub shock_mode: Option<ShockMode>,
    /// Each multiplier scales every shock and produces one extra run.
    #[serde(default)]
    pub sensitivity_multipliers: Vec<f64>,
}

impl Scenario {
    pub fn new(model_version_id: Uuid, schedule: ShockSchedule) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            model_version_id,
            schedule,
            shock_mode: None,
            sensitivity_multipliers: Vec::new(),
        }
    }
}

/// Everything needed for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub scenario: Scenario,
    /// Zero coefficients are used when absent.
    #[serde(default)]
    pub coefficients: Option<SatelliteCoefficients>,
    #[serde(default)]
    pub constraints: Option<ConstraintSet>,
    #[serde(default)]
    pub workforce: Option<WorkforceInputs>,
}

impl RunRequest {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            coefficients: None,
            constraints: None,
            workforce: None,
        }
    }

    pub fn with_coefficients(mut self, coefficients: SatelliteCoefficients) -> Self {
        self.coefficients = Some(coefficients);
        self
    }

    pub fn with_constraints(mut self, constraints: ConstraintSet) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn with_workforce(mut self, workforce: WorkforceInputs) -> Self {
        self.workforce = Some(workforce);
        self
    }
}

/// Provenance of a run: the exact inputs its results were computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub scenario_id: Uuid,
    pub model_version_id: Uuid,
    pub model_checksum: String,
    pub coefficients_version_id: Uuid,
    pub constraint_set_id: Option<Uuid>,
    pub constraint_set_version: Option<u32>,
    pub shock_mode: ShockMode,
    pub created_at: DateTime<Utc>,
}

/// Output of one year of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub run_id: Uuid,
    pub year: i32,
    pub delta_x: SectorVector,
    pub direct_impact: SectorVector,
    pub indirect_impact: SectorVector,
    pub employment: SectorVector,
    pub import_leakage: SectorVector,
    pub domestic_output: SectorVector,
    pub value_added: SectorVector,
    pub totals: SatelliteTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRun {
    pub multiplier: f64,
    pub run_id: Uuid,
    pub total_output: BTreeMap<i32, f64>,
    pub total_employment: BTreeMap<i32, f64>,
    pub peak_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub snapshot: RunSnapshot,
    pub result_sets: BTreeMap<i32, ResultSet>,
    pub cumulative_delta_x: SectorVector,
    pub peak_year: Option<i32>,
    pub peak_total: f64,
    /// Per year; empty when no constraint set was given.
    pub feasibility: BTreeMap<i32, FeasibilityResult>,
    /// Decomposition of peak-year employment.
    pub workforce: Option<WorkforceResult>,
    pub sensitivity: Vec<SensitivityRun>,
    pub warnings: Vec<DataQualityWarning>,
}

/// Runs scenarios end to end: Leontief solve, satellites, feasibility and
/// workforce, in that order.
#[derive(Debug)]
pub struct ImpactRunner {
    store: Arc<ModelStore>,
    leontief: LeontiefSolver,
    feasibility: FeasibilitySolver,
    workforce: WorkforceSatellite,
    shock_mode: ShockMode,
}

impl ImpactRunner {
    pub fn new(config: &Config, store: Arc<ModelStore>) -> Self {
        Self {
            store,
            leontief: LeontiefSolver::new(&config.solver),
            feasibility: FeasibilitySolver::new(config.feasibility.clone()),
            workforce: WorkforceSatellite::new(config.workforce.clone()),
            shock_mode: config.solver.shock_mode,
        }
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    pub fn leontief(&self) -> &LeontiefSolver {
        &self.leontief
    }

    pub fn run(&self, request: &RunRequest) -> EngineResult<RunResult> {
        let scenario = &request.scenario;
        let model = self.store.get(scenario.model_version_id)?;
        let codes = model.model.sector_codes();
        let mode = scenario.shock_mode.unwrap_or(self.shock_mode);
        let run_id = Uuid::new_v4();

        let coefficients = match &request.coefficients {
            Some(c) => c.clone(),
            None => SatelliteCoefficients::zeros(codes),
        };

        let phased = self.leontief.solve_schedule(&model, &scenario.schedule, mode)?;

        let mut warnings = Vec::new();
        let mut result_sets = BTreeMap::new();
        for (year, solved) in &phased.annual {
            let satellite = SatelliteAccounts::apply(&solved.delta_x, &coefficients)?;
            // coefficients are the same every year
            if result_sets.is_empty() {
                warnings.extend(satellite.warnings);
            }
            result_sets.insert(
                *year,
                ResultSet {
                    run_id,
                    year: *year,
                    delta_x: solved.delta_x.clone(),
                    direct_impact: solved.direct_impact.clone(),
                    indirect_impact: solved.indirect_impact.clone(),
                    employment: satellite.employment,
                    import_leakage: satellite.import_leakage,
                    domestic_output: satellite.domestic_output,
                    value_added: satellite.value_added,
                    totals: satellite.totals,
                },
            );
        }

        let feasibility = match &request.constraints {
            Some(set) => self.solve_feasibility(
                &model,
                run_id,
                &result_sets,
                set,
                &coefficients,
                request.workforce.as_ref(),
            )?,
            None => BTreeMap::new(),
        };

        let workforce = match (&request.workforce, phased.peak_year) {
            (Some(inputs), Some(year)) => Some(self.decompose_workforce(
                run_id,
                year,
                &result_sets,
                &feasibility,
                &coefficients,
                inputs,
            )?),
            _ => None,
        };

        let sensitivity = scenario
            .sensitivity_multipliers
            .iter()
            .map(|m| self.sensitivity_run(&model, &scenario.schedule, mode, *m, &coefficients))
            .collect::<EngineResult<Vec<_>>>()?;

        let snapshot = RunSnapshot {
            run_id,
            scenario_id: scenario.id,
            model_version_id: model.id(),
            model_checksum: model.version.checksum.clone(),
            coefficients_version_id: coefficients.version_id,
            constraint_set_id: request.constraints.as_ref().map(|c| c.id),
            constraint_set_version: request.constraints.as_ref().map(|c| c.version),
            shock_mode: mode,
            created_at: Utc::now(),
        };

        info!(
            run_id = %run_id,
            scenario = %scenario.name,
            model_version_id = %snapshot.model_version_id,
            years = result_sets.len(),
            constrained = !feasibility.is_empty(),
            "run complete"
        );

        Ok(RunResult {
            snapshot,
            result_sets,
            cumulative_delta_x: phased.cumulative_delta_x,
            peak_year: phased.peak_year,
            peak_total: phased.peak_total,
            feasibility,
            workforce,
            sensitivity,
            warnings,
        })
    }

    fn solve_feasibility(
        &self,
        model: &RegisteredModel,
        run_id: Uuid,
        result_sets: &BTreeMap<i32, ResultSet>,
        set: &ConstraintSet,
        coefficients: &SatelliteCoefficients,
        workforce: Option<&WorkforceInputs>,
    ) -> EngineResult<BTreeMap<i32, FeasibilityResult>> {
        let codes = model.model.sector_codes();
        let base_output =
            SectorVector::from_aligned(codes, model.model.gross_output().iter().copied().collect());
        let saudi_share = workforce.map(|w| w.baseline_saudi_shares()).transpose()?;

        result_sets
            .iter()
            .map(|(year, rs)| {
                let ctx = SolveContext {
                    unconstrained_run_id: Some(run_id),
                    year: Some(*year),
                    base_output: Some(&base_output),
                    coefficients: Some(coefficients),
                    saudi_share: saudi_share.as_ref(),
                };
                self.feasibility
                    .solve_with(&rs.delta_x, set, ctx)
                    .map(|result| (*year, result))
            })
            .collect()
    }

    fn decompose_workforce(
        &self,
        run_id: Uuid,
        year: i32,
        result_sets: &BTreeMap<i32, ResultSet>,
        feasibility: &BTreeMap<i32, FeasibilityResult>,
        coefficients: &SatelliteCoefficients,
        inputs: &WorkforceInputs,
    ) -> EngineResult<WorkforceResult> {
        let (source, jobs) = match feasibility.get(&year) {
            Some(f) => (
                DeltaXSource::Feasible,
                SatelliteAccounts::apply(&f.feasible_delta_x, coefficients)?.employment,
            ),
            None => {
                let rs = result_sets.get(&year).ok_or_else(|| {
                    EngineError::InvalidInput(format!("no result set for year {year}"))
                })?;
                (DeltaXSource::Unconstrained, rs.employment.clone())
            }
        };
        debug!(run_id = %run_id, year, source = %source, "decomposing workforce");

        let key = WorkforceKey {
            run_id,
            coefficients_version_id: coefficients.version_id,
            delta_x_source: source,
        };
        self.workforce.decompose(&jobs, inputs, key)
    }

    fn sensitivity_run(
        &self,
        model: &RegisteredModel,
        schedule: &ShockSchedule,
        mode: ShockMode,
        multiplier: f64,
        coefficients: &SatelliteCoefficients,
    ) -> EngineResult<SensitivityRun> {
        if !multiplier.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "sensitivity multiplier must be finite, got {multiplier}"
            )));
        }
        let phased = self.leontief.solve_schedule(model, &schedule.scaled(multiplier), mode)?;

        let mut total_output = BTreeMap::new();
        let mut total_employment = BTreeMap::new();
        for (year, solved) in &phased.annual {
            total_output.insert(*year, solved.total());
            let satellite = SatelliteAccounts::apply(&solved.delta_x, coefficients)?;
            total_employment.insert(*year, satellite.totals.employment);
        }

        Ok(SensitivityRun {
            multiplier,
            run_id: Uuid::new_v4(),
            total_output,
            total_employment,
            peak_year: phased.peak_year,
        })
    }
}

/// Runs `request` on the blocking pool so async callers keep their executor free.
pub async fn run_blocking(runner: Arc<ImpactRunner>, request: RunRequest) -> EngineResult<RunResult> {
    tokio::task::spawn_blocking(move || runner.run(&request))
        .await
        .map_err(|e| EngineError::Worker(format!("run task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feasibility::{Constraint, ConstraintScope};
    use crate::model::io_model::tests::two_sector_snapshot;

    fn runner() -> (ImpactRunner, Uuid) {
        let store = Arc::new(ModelStore::new());
        let version = store.register(two_sector_snapshot(), "test").unwrap();
        (ImpactRunner::new(&Config::default(), store), version.model_version_id)
    }

    fn coefficients() -> SatelliteCoefficients {
        SatelliteCoefficients::new(
            SectorVector::from_pairs([("S1", 2.0), ("S2", 1.0)]).unwrap(),
            SectorVector::from_pairs([("S1", 0.1), ("S2", 0.2)]).unwrap(),
            SectorVector::from_pairs([("S1", 0.4), ("S2", 0.5)]).unwrap(),
        )
    }

    #[test]
    fn test_single_year_run() {
        let (runner, model_id) = runner();
        let schedule = ShockSchedule::new().with_year(2026, vec![50.0, 0.0]);
        let request = RunRequest::new(Scenario::new(model_id, schedule)).with_coefficients(coefficients());

        let result = runner.run(&request).unwrap();
        let rs = &result.result_sets[&2026];
        let dx = rs.delta_x.values();
        assert!((dx[0] - 47.5 / 0.7575).abs() < 1e-9);
        assert!((rs.employment.values()[0] - 2.0 * dx[0]).abs() < 1e-9);
        assert_eq!(result.peak_year, Some(2026));
        assert!(result.feasibility.is_empty());
        assert_eq!(result.snapshot.shock_mode, ShockMode::PerYear);
        assert!(result.snapshot.model_checksum.starts_with("sha256:"));
    }

    #[test]
    fn test_constrained_run_records_constraint_set() {
        let (runner, model_id) = runner();
        let schedule = ShockSchedule::new().with_year(2026, vec![50.0, 0.0]);
        let set = ConstraintSet::new(vec![Constraint::cap("S1", 40.0)]);
        let request = RunRequest::new(Scenario::new(model_id, schedule)).with_constraints(set.clone());

        let result = runner.run(&request).unwrap();
        let f = &result.feasibility[&2026];
        assert!(f.feasible_delta_x.get("S1").unwrap() <= 40.0 + 1e-6);
        assert_eq!(f.unconstrained_run_id, Some(result.snapshot.run_id));
        assert_eq!(result.snapshot.constraint_set_id, Some(set.id));
    }

    #[test]
    fn test_workforce_uses_feasible_delta_when_constrained() {
        let (runner, model_id) = runner();
        let schedule = ShockSchedule::new().with_year(2026, vec![50.0, 0.0]);
        let request = RunRequest::new(Scenario::new(model_id, schedule))
            .with_coefficients(coefficients())
            .with_constraints(ConstraintSet::new(vec![Constraint::cap("S1", 40.0)]))
            .with_workforce(WorkforceInputs::default());

        let result = runner.run(&request).unwrap();
        let workforce = result.workforce.unwrap();
        assert_eq!(workforce.key.delta_x_source, DeltaXSource::Feasible);
        let s1 = workforce.sectors.iter().find(|s| s.sector_code == "S1").unwrap();
        assert!(s1.total_jobs <= 80.0 + 1e-6);
    }

    #[test]
    fn test_reloaded_inputs_keep_provenance_ids() {
        let (runner, model_id) = runner();
        let coefficients_json = r#"{
            "jobs_coeff": {"S1": 2.0, "S2": 1.0},
            "import_ratio": {"S1": 0.1, "S2": 0.2},
            "va_ratio": {"S1": 0.4, "S2": 0.5}
        }"#;
        let constraints_json = r#"[
            {"constraint_type": "CAPACITY_CAP", "applies_to": "S1", "value": 40.0},
            {"constraint_type": "LABOR", "applies_to": "S1", "value": 60.0}
        ]"#;

        let run_once = || {
            let coefficients: SatelliteCoefficients = serde_json::from_str(coefficients_json).unwrap();
            let set: ConstraintSet = serde_json::from_str(constraints_json).unwrap();
            let schedule = ShockSchedule::new().with_year(2026, vec![50.0, 0.0]);
            let request = RunRequest::new(Scenario::new(model_id, schedule))
                .with_coefficients(coefficients)
                .with_constraints(set);
            runner.run(&request).unwrap()
        };
        let first = run_once();
        let second = run_once();

        assert_ne!(first.snapshot.coefficients_version_id, Uuid::nil());
        assert_eq!(first.snapshot.coefficients_version_id, second.snapshot.coefficients_version_id);
        assert_eq!(first.snapshot.constraint_set_id, second.snapshot.constraint_set_id);
        let binding_ids = |r: &RunResult| {
            r.feasibility[&2026]
                .binding_constraints
                .iter()
                .map(|b| b.constraint_id)
                .collect::<Vec<_>>()
        };
        assert!(!binding_ids(&first).is_empty());
        assert_eq!(binding_ids(&first), binding_ids(&second));
    }

    #[test]
    fn test_labor_cap_uses_run_coefficients() {
        let (runner, model_id) = runner();
        let schedule = ShockSchedule::new().with_year(2026, vec![50.0, 0.0]);
        let set = ConstraintSet::new(vec![Constraint::labor(ConstraintScope::Sector("S1".into()), 60.0)]);
        let request = RunRequest::new(Scenario::new(model_id, schedule))
            .with_coefficients(coefficients())
            .with_constraints(set);

        let result = runner.run(&request).unwrap();
        let s1 = result.feasibility[&2026].feasible_delta_x.get("S1").unwrap();
        assert!((s1 - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_sensitivity_scales_linearly() {
        let (runner, model_id) = runner();
        let schedule = ShockSchedule::new().with_year(2026, vec![50.0, 10.0]);
        let mut scenario = Scenario::new(model_id, schedule);
        scenario.sensitivity_multipliers = vec![0.5, 2.0];

        let result = runner.run(&RunRequest::new(scenario)).unwrap();
        let base = result.result_sets[&2026].delta_x.total();
        assert_eq!(result.sensitivity.len(), 2);
        assert!((result.sensitivity[0].total_output[&2026] - 0.5 * base).abs() < 1e-9);
        assert!((result.sensitivity[1].total_output[&2026] - 2.0 * base).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_version() {
        let (runner, _) = runner();
        let scenario = Scenario::new(Uuid::new_v4(), ShockSchedule::new().with_year(2026, vec![1.0, 0.0]));
        let err = runner.run(&RunRequest::new(scenario)).unwrap_err();
        assert!(matches!(err, EngineError::UnknownModelVersion(_)));
    }

    #[tokio::test]
    async fn test_run_blocking() {
        let (runner, model_id) = runner();
        let schedule = ShockSchedule::new().with_year(2026, vec![50.0, 0.0]);
        let result = run_blocking(Arc::new(runner), RunRequest::new(Scenario::new(model_id, schedule)))
            .await
            .unwrap();
        assert_eq!(result.result_sets.len(), 1);
    }
}
