//! Heuristic fallback when the LP cannot be used.
//!
//! Sector bounds clip each sector independently; group and economy-wide bounds
//! then spread the excess (or shortfall) over their members in proportion to
//! the members' positive output. Hard bounds are applied after soft ones so a
//! hard bound wins any disagreement.
//!
//! There is no slack here: a violated soft bound is clipped to exactly like a
//! hard one and is only left violated where a later hard bound overrides it.
//! The solver reports a soft bound met this way as binding and one overridden
//! this way as relaxed, the same as on the LP path.

use super::constraints::{ResolvedConstraint, Sense};

pub(crate) fn clip(unconstrained: &[f64], constraints: &[ResolvedConstraint]) -> Vec<f64> {
    let mut y = unconstrained.to_vec();

    let (hard, soft): (Vec<_>, Vec<_>) = constraints.iter().partition(|c| c.is_hard());
    for pass in [soft, hard] {
        let (sector, group): (Vec<_>, Vec<_>) =
            pass.into_iter().partition(|c| c.single().is_some());
        for c in sector.iter().chain(group.iter()) {
            apply(&mut y, c);
        }
    }
    y
}

fn apply(y: &mut [f64], c: &ResolvedConstraint) {
    let lhs = c.lhs(y);
    let delta = match c.sense {
        Sense::Upper if lhs > c.bound => c.bound - lhs,
        Sense::Lower if lhs < c.bound => c.bound - lhs,
        _ => return,
    };

    if let Some((i, w)) = c.single() {
        y[i] = c.bound / w;
        return;
    }

    let positive: Vec<f64> = c.sectors().map(|i| y[i].max(0.0)).collect();
    let shares: Vec<f64> = if positive.iter().any(|p| *p > 0.0) {
        positive
    } else {
        vec![1.0; positive.len()]
    };
    // Σ w·Δy must equal delta with Δy proportional to the shares
    let weighted: f64 = c.terms.iter().zip(&shares).map(|((_, w), p)| w * p).sum();
    let scale = delta / weighted;
    for ((i, _), p) in c.terms.iter().zip(&shares) {
        y[*i] += scale * p;
    }
}
