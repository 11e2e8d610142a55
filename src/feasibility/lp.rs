//! Deviation-minimizing LP for the feasible output vector.
//!
//! Every constraint over several sectors gets a scale variable s_g ≥ 0 that
//! moves all of its members together, in proportion to their positive
//! unconstrained output (evenly when none is positive). Each sector also has
//! its own shift variables r_i, l_i ≥ 0, so
//!
//!   y_i = u_i + r_i − l_i ± Σ_g s_g · p_gi
//!
//! A sector may only be raised if some floor covers it and only lowered if
//! some upper bound covers it. The objective is the output moved. Own shifts
//! of a sector that a single-sector bound covers cost `OWN_SHIFT_PREMIUM`
//! more than a proportional group move; own shifts of a sector covered only by
//! groups cost `MEMBER_SHIFT_COST`, so groups keep their composition unless no
//! proportional move is feasible. Soft-constraint slack costs `soft_penalty`
//! per unit.

use thiserror::Error;

use super::constraints::{ResolvedConstraint, Sense};

/// Relative surcharge on per-sector shifts over proportional group moves.
#[cfg(feature = "optimization")]
pub(crate) const OWN_SHIFT_PREMIUM: f64 = 1e-4;

/// Cost per unit of shifting one member of a group on its own.
#[cfg(feature = "optimization")]
pub(crate) const MEMBER_SHIFT_COST: f64 = 10.0;

#[derive(Debug, Error)]
pub(crate) enum LpFailure {
    #[error("hard constraints admit no feasible point")]
    Infeasible,
    #[error("LP solver failed: {0}")]
    Solver(String),
}

/// Which sectors each constraint direction may move.
pub(crate) fn movable(n: usize, constraints: &[ResolvedConstraint]) -> (Vec<bool>, Vec<bool>) {
    let mut can_raise = vec![false; n];
    let mut can_lower = vec![false; n];
    for c in constraints {
        let target = match c.sense {
            Sense::Lower => &mut can_raise,
            Sense::Upper => &mut can_lower,
        };
        for i in c.sectors() {
            target[i] = true;
        }
    }
    (can_raise, can_lower)
}

/// Share basis p_gi of each member of a multi-sector constraint.
#[cfg(feature = "optimization")]
pub(crate) fn proportional_basis(unconstrained: &[f64], c: &ResolvedConstraint) -> Vec<f64> {
    let positive: Vec<f64> = c.sectors().map(|i| unconstrained[i].max(0.0)).collect();
    if positive.iter().any(|p| *p > 0.0) {
        positive
    } else {
        vec![1.0; positive.len()]
    }
}

#[cfg(feature = "optimization")]
pub(crate) fn solve_lp(
    unconstrained: &[f64],
    constraints: &[ResolvedConstraint],
    soft_penalty: f64,
) -> Result<Vec<f64>, LpFailure> {
    use good_lp::solvers::minilp::minilp;
    use good_lp::*;

    let n = unconstrained.len();
    let (can_raise, can_lower) = movable(n, constraints);
    let singles: Vec<ResolvedConstraint> =
        constraints.iter().filter(|c| c.single().is_some()).cloned().collect();
    let (own_raise, own_lower) = movable(n, &singles);
    let cost = |own: bool| {
        if own {
            1.0 + OWN_SHIFT_PREMIUM
        } else {
            MEMBER_SHIFT_COST
        }
    };

    let mut problem = ProblemVariables::new();
    let bounded = |allowed: bool| {
        if allowed {
            variable().min(0.0)
        } else {
            variable().min(0.0).max(0.0)
        }
    };
    let raise: Vec<Variable> = can_raise.iter().map(|a| problem.add(bounded(*a))).collect();
    let lower: Vec<Variable> = can_lower.iter().map(|a| problem.add(bounded(*a))).collect();

    // (scale variable, direction, basis) per multi-sector constraint
    let groups: Vec<Option<(Variable, f64, Vec<f64>)>> = constraints
        .iter()
        .map(|c| {
            (c.single().is_none()).then(|| {
                let direction = match c.sense {
                    Sense::Upper => -1.0,
                    Sense::Lower => 1.0,
                };
                (
                    problem.add(variable().min(0.0)),
                    direction,
                    proportional_basis(unconstrained, c),
                )
            })
        })
        .collect();
    let slack: Vec<Option<Variable>> = constraints
        .iter()
        .map(|c| (!c.is_hard()).then(|| problem.add(variable().min(0.0))))
        .collect();

    let mut shift: Vec<Expression> = (0..n).map(|i| raise[i] - lower[i]).collect();
    for (c, group) in constraints.iter().zip(&groups) {
        if let Some((s, direction, basis)) = group {
            for (i, p) in c.sectors().zip(basis) {
                shift[i].add_mul(direction * p, *s);
            }
        }
    }

    let own: Expression = (0..n)
        .map(|i| cost(own_raise[i]) * raise[i] + cost(own_lower[i]) * lower[i])
        .sum();
    let grouped: Expression = groups
        .iter()
        .flatten()
        .map(|(s, _, basis)| basis.iter().sum::<f64>() * *s)
        .sum();
    let penalty: Expression = slack.iter().flatten().map(|s| soft_penalty * *s).sum();

    let mut model = problem
        .minimise(own + grouped + penalty)
        .using(minilp);

    for (c, s) in constraints.iter().zip(&slack) {
        let mut moved = Expression::default();
        for &(i, w) in &c.terms {
            moved.add_mul(w, &shift[i]);
        }
        // bound on Σ w·y over the scope, moved to the shift variables
        let rhs = c.bound - c.lhs(unconstrained);
        let row = match (c.sense, s) {
            (Sense::Upper, Some(s)) => constraint!(moved - *s <= rhs),
            (Sense::Upper, None) => constraint!(moved <= rhs),
            (Sense::Lower, Some(s)) => constraint!(moved + *s >= rhs),
            (Sense::Lower, None) => constraint!(moved >= rhs),
        };
        model = model.with(row);
    }

    let solution = model.solve().map_err(|e| match e {
        ResolutionError::Infeasible => LpFailure::Infeasible,
        other => LpFailure::Solver(other.to_string()),
    })?;

    let mut y: Vec<f64> = (0..n)
        .map(|i| {
            let up = if can_raise[i] { solution.value(raise[i]).max(0.0) } else { 0.0 };
            let down = if can_lower[i] { solution.value(lower[i]).max(0.0) } else { 0.0 };
            unconstrained[i] + up - down
        })
        .collect();
    for (c, group) in constraints.iter().zip(&groups) {
        if let Some((s, direction, basis)) = group {
            let scale = solution.value(*s).max(0.0);
            for (i, p) in c.sectors().zip(basis) {
                y[i] += direction * p * scale;
            }
        }
    }
    Ok(y)
}

#[cfg(not(feature = "optimization"))]
pub(crate) fn solve_lp(
    _unconstrained: &[f64],
    _constraints: &[ResolvedConstraint],
    _soft_penalty: f64,
) -> Result<Vec<f64>, LpFailure> {
    Err(LpFailure::Solver(
        "LP feasibility requires the 'optimization' feature to be enabled".into(),
    ))
}

#[cfg(all(test, feature = "optimization"))]
mod tests {
    use super::*;
    use crate::feasibility::constraints::{ConstraintConfidence, ConstraintType};
    use uuid::Uuid;

    fn resolved(
        sense: Sense,
        terms: Vec<(usize, f64)>,
        bound: f64,
        confidence: ConstraintConfidence,
    ) -> ResolvedConstraint {
        ResolvedConstraint {
            id: Uuid::new_v4(),
            constraint_type: match sense {
                Sense::Upper => ConstraintType::CapacityCap,
                Sense::Lower => ConstraintType::Floor,
            },
            confidence,
            sense,
            terms,
            bound,
            description: String::new(),
        }
    }

    fn unit(sectors: &[usize]) -> Vec<(usize, f64)> {
        sectors.iter().map(|&i| (i, 1.0)).collect()
    }

    #[test]
    fn test_sector_cap_matches_clipping() {
        let u = [62.706, 13.201];
        let caps = [resolved(Sense::Upper, unit(&[0]), 40.0, ConstraintConfidence::Hard)];
        let y = solve_lp(&u, &caps, 1000.0).unwrap();
        assert!((y[0] - 40.0).abs() < 1e-6);
        assert!((y[1] - 13.201).abs() < 1e-9);
    }

    #[test]
    fn test_group_cap_removes_exact_excess() {
        let u = [60.0, 40.0, 5.0];
        let cap = [resolved(Sense::Upper, unit(&[0, 1]), 80.0, ConstraintConfidence::Hard)];
        let y = solve_lp(&u, &cap, 1000.0).unwrap();
        // 20% off each member, in proportion to its output
        assert!((y[0] - 48.0).abs() < 1e-9, "{y:?}");
        assert!((y[1] - 32.0).abs() < 1e-9, "{y:?}");
        assert_eq!(y[2], 5.0);
    }

    #[test]
    fn test_group_cap_split_matches_clipping() {
        let u = [60.0, 20.0, 5.0];
        let cap = [resolved(Sense::Upper, unit(&[0, 1]), 40.0, ConstraintConfidence::Hard)];
        let lp = solve_lp(&u, &cap, 1000.0).unwrap();
        let clipped = crate::feasibility::clipping::clip(&u, &cap);
        for (a, b) in lp.iter().zip(&clipped) {
            assert!((a - b).abs() < 1e-9, "{lp:?} vs {clipped:?}");
        }
    }

    #[test]
    fn test_sector_floor_inside_group_cap() {
        // proportional alone would take S2 to 32, below its floor
        let u = [60.0, 40.0];
        let constraints = [
            resolved(Sense::Upper, unit(&[0, 1]), 80.0, ConstraintConfidence::Hard),
            resolved(Sense::Lower, unit(&[1]), 38.0, ConstraintConfidence::Hard),
        ];
        let y = solve_lp(&u, &constraints, 1000.0).unwrap();
        assert!((y[0] + y[1] - 80.0).abs() < 1e-6, "{y:?}");
        assert!(y[1] >= 38.0 - 1e-6, "{y:?}");
        assert!((y[0] - 42.0).abs() < 1e-6, "{y:?}");
    }

    #[test]
    fn test_weighted_cap_in_jobs() {
        // 2 jobs per unit in S1, 1 in S2: 140 jobs against a 100 job cap
        let u = [50.0, 40.0];
        let cap = [resolved(
            Sense::Upper,
            vec![(0, 2.0), (1, 1.0)],
            100.0,
            ConstraintConfidence::Hard,
        )];
        let y = solve_lp(&u, &cap, 1000.0).unwrap();
        assert!((2.0 * y[0] + y[1] - 100.0).abs() < 1e-6);
        // composition kept: both sectors scaled by the same factor
        assert!((y[0] / y[1] - 50.0 / 40.0).abs() < 1e-9, "{y:?}");
    }

    #[test]
    fn test_floor_raises_output() {
        let u = [10.0, 1.0];
        let floor = [resolved(Sense::Lower, unit(&[1]), 4.0, ConstraintConfidence::Hard)];
        let y = solve_lp(&u, &floor, 1000.0).unwrap();
        assert!((y[1] - 4.0).abs() < 1e-6);
        assert_eq!(y[0], 10.0);
    }

    #[test]
    fn test_conflicting_hard_bounds_infeasible() {
        let u = [45.0];
        let constraints = [
            resolved(Sense::Lower, unit(&[0]), 50.0, ConstraintConfidence::Hard),
            resolved(Sense::Upper, unit(&[0]), 40.0, ConstraintConfidence::Hard),
        ];
        assert!(matches!(
            solve_lp(&u, &constraints, 1000.0),
            Err(LpFailure::Infeasible)
        ));
    }

    #[test]
    fn test_soft_floor_yields_to_hard_cap() {
        let u = [45.0];
        let constraints = [
            resolved(Sense::Lower, unit(&[0]), 50.0, ConstraintConfidence::Estimated),
            resolved(Sense::Upper, unit(&[0]), 40.0, ConstraintConfidence::Hard),
        ];
        let y = solve_lp(&u, &constraints, 1000.0).unwrap();
        assert!((y[0] - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_basis_even_without_positive_output() {
        let c = resolved(Sense::Lower, unit(&[0, 1]), 10.0, ConstraintConfidence::Hard);
        assert_eq!(proportional_basis(&[0.0, -3.0], &c), vec![1.0, 1.0]);
        assert_eq!(proportional_basis(&[6.0, -3.0], &c), vec![6.0, 0.0]);
    }
}
