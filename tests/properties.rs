//! Property tests over randomly generated productive models.

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

use impact_engine::benchmark::validate_multipliers;
use impact_engine::config::SolverConfig;
use impact_engine::feasibility::{Constraint, ConstraintSet, FeasibilitySolver};
use impact_engine::leontief::LeontiefSolver;
use impact_engine::model::{ModelSnapshot, ModelStore, RegisteredModel};

/// Column sums of A stay below 0.8, so every generated model is productive.
fn build_snapshot(x: Vec<f64>, raw: Vec<f64>) -> ModelSnapshot {
    let n = x.len();
    let z = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| raw[i * n + j] * 0.8 / n as f64 * x[j])
                .collect()
        })
        .collect();
    ModelSnapshot {
        sector_codes: (1..=n).map(|i| format!("S{i}")).collect(),
        z,
        x,
        base_year: 2023,
        denomination: "SAR_MILLIONS".to_string(),
    }
}

/// (model, shock a, shock b) with shocks of matching length.
fn model_and_shocks() -> impl Strategy<Value = (ModelSnapshot, Vec<f64>, Vec<f64>)> {
    (2usize..6).prop_flat_map(|n| {
        (
            prop::collection::vec(100.0f64..1000.0, n),
            prop::collection::vec(0.0f64..1.0, n * n),
            prop::collection::vec(-100.0f64..100.0, n),
            prop::collection::vec(-100.0f64..100.0, n),
        )
            .prop_map(|(x, raw, a, b)| (build_snapshot(x, raw), a, b))
    })
}

fn register(snapshot: ModelSnapshot) -> Arc<RegisteredModel> {
    let store = ModelStore::new();
    let version = store.register(snapshot, "proptest").unwrap();
    store.get(version.model_version_id).unwrap()
}

fn solver() -> LeontiefSolver {
    LeontiefSolver::new(&SolverConfig::default())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_zero_shock_gives_zero_output((snapshot, _, _) in model_and_shocks()) {
        let n = snapshot.x.len();
        let model = register(snapshot);
        let result = solver().solve(&model, &vec![0.0; n]).unwrap();
        prop_assert!(result.delta_x.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn prop_solve_is_linear((snapshot, a, b) in model_and_shocks()) {
        let model = register(snapshot);
        let solver = solver();
        let sum: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();

        let ra = solver.solve(&model, &a).unwrap();
        let rb = solver.solve(&model, &b).unwrap();
        let rs = solver.solve(&model, &sum).unwrap();

        for ((s, x), y) in rs.delta_x.values().iter().zip(ra.delta_x.values()).zip(rb.delta_x.values()) {
            let tol = 1e-9 * s.abs().max(1.0);
            prop_assert!((s - (x + y)).abs() <= tol, "{s} vs {}", x + y);
        }
    }

    #[test]
    fn prop_repeat_solve_is_identical((snapshot, a, _) in model_and_shocks()) {
        let model = register(snapshot);
        let solver = solver();
        let first = solver.solve(&model, &a).unwrap();
        let second = solver.solve(&model, &a).unwrap();
        prop_assert_eq!(&first, &second);

        // a fresh cache must reproduce the same numbers
        let third = LeontiefSolver::new(&SolverConfig::default()).solve(&model, &a).unwrap();
        prop_assert_eq!(&first.delta_x, &third.delta_x);
    }

    #[test]
    fn prop_caps_never_raise_output(
        (snapshot, a, _) in model_and_shocks(),
        caps in prop::collection::vec((0usize..5, -50.0f64..200.0), 1..4),
        group_cap in prop::option::of(-50.0f64..300.0),
    ) {
        let n = snapshot.x.len();
        let codes = snapshot.sector_codes.clone();
        let model = register(snapshot);
        let unconstrained = solver().solve(&model, &a).unwrap().delta_x;

        let mut constraints: Vec<Constraint> = caps
            .into_iter()
            .map(|(i, value)| Constraint::cap(codes[i % n].clone(), value))
            .collect();
        if let Some(value) = group_cap {
            constraints.push(Constraint::group_cap(codes.iter().take(2).cloned(), value));
        }
        let set = ConstraintSet::new(constraints);

        let result = FeasibilitySolver::default().solve(&unconstrained, &set).unwrap();
        for ((code, feasible), u) in result.feasible_delta_x.iter().zip(unconstrained.values()) {
            prop_assert!(feasible <= u + 1e-6, "{code}: {feasible} > {u}");
        }
        prop_assert!(result.totals.total_feasible <= result.totals.total_unconstrained + 1e-6);
    }

    #[test]
    fn prop_benchmark_against_itself_passes(
        values in prop::collection::btree_map("[A-Z]{1,3}", 0.5f64..3.0, 1..10)
    ) {
        let values: BTreeMap<String, f64> = values;
        let report = validate_multipliers(&values, &values, 0.05);
        prop_assert!(report.overall_pass);
        prop_assert_eq!(report.rmse, 0.0);
        prop_assert_eq!(report.mae, 0.0);
        prop_assert_eq!(report.total_sectors, values.len());
    }
}
