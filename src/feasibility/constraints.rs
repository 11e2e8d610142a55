use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use strum::{Display, EnumString};
use tracing::warn;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::identity::content_id;
use crate::satellite::SatelliteCoefficients;
use crate::vector::SectorVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    /// Upper bound on output.
    CapacityCap,
    /// Lower bound on output.
    Floor,
    /// Growth cap: Δx ≤ value · base output, `value` being the maximum growth
    /// rate over the base year. Always measured against base output.
    Ramp,
    /// Upper bound on jobs, Σ jobs_coeff · Δx.
    Labor,
    /// Upper bound on imported inputs, Σ import_ratio · Δx.
    Import,
    /// Minimum Saudi share of employment. Reported, never enforced.
    Saudization,
}

/// Direction a resolved bound acts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sense {
    Upper,
    Lower,
}

impl ConstraintType {
    /// `None` for kinds that are diagnostics only.
    pub(crate) fn sense(self) -> Option<Sense> {
        match self {
            ConstraintType::CapacityCap
            | ConstraintType::Ramp
            | ConstraintType::Labor
            | ConstraintType::Import => Some(Sense::Upper),
            ConstraintType::Floor => Some(Sense::Lower),
            ConstraintType::Saudization => None,
        }
    }

    pub fn is_diagnostic(self) -> bool {
        self.sense().is_none()
    }

    fn default_unit(self) -> &'static str {
        match self {
            ConstraintType::CapacityCap | ConstraintType::Floor | ConstraintType::Import => {
                "SAR_MILLIONS"
            }
            ConstraintType::Ramp => "GROWTH_RATE",
            ConstraintType::Labor => "JOBS",
            ConstraintType::Saudization => "FRACTION",
        }
    }
}

/// Only `Hard` constraints are strict; the others may be relaxed at a penalty.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintConfidence {
    #[default]
    Hard,
    #[serde(alias = "SOFT")]
    Estimated,
    Assumed,
}

/// Whether the bound applies to Δx or to base output + Δx.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundScope {
    #[default]
    DeltaOnly,
    AbsoluteTotal,
}

/// What a constraint applies to. On the wire: a sector code, a list of codes
/// for a coupled group, or `"*"` for the whole economy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "ScopeRepr", into = "ScopeRepr")]
pub enum ConstraintScope {
    Sector(String),
    Group(Vec<String>),
    All,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ScopeRepr {
    One(String),
    Many(Vec<String>),
}

const ALL_SECTORS: &str = "*";

impl From<ScopeRepr> for ConstraintScope {
    fn from(repr: ScopeRepr) -> Self {
        match repr {
            ScopeRepr::One(code) if code == ALL_SECTORS => ConstraintScope::All,
            ScopeRepr::One(code) => ConstraintScope::Sector(code),
            ScopeRepr::Many(mut codes) if codes.len() == 1 => {
                ConstraintScope::Sector(codes.remove(0))
            }
            ScopeRepr::Many(codes) => ConstraintScope::Group(codes),
        }
    }
}

impl From<ConstraintScope> for ScopeRepr {
    fn from(scope: ConstraintScope) -> Self {
        match scope {
            ConstraintScope::Sector(code) => ScopeRepr::One(code),
            ConstraintScope::Group(codes) => ScopeRepr::Many(codes),
            ConstraintScope::All => ScopeRepr::One(ALL_SECTORS.to_string()),
        }
    }
}

impl ConstraintScope {
    /// Model indices covered by this scope, sorted.
    pub fn indices(&self, order: &[String]) -> EngineResult<Vec<usize>> {
        let position = |code: &str| {
            order
                .iter()
                .position(|c| c == code)
                .ok_or_else(|| EngineError::UnknownSector(code.to_string()))
        };
        let mut indices = match self {
            ConstraintScope::Sector(code) => vec![position(code)?],
            ConstraintScope::Group(codes) => codes
                .iter()
                .map(|c| position(c))
                .collect::<EngineResult<Vec<_>>>()?,
            ConstraintScope::All => (0..order.len()).collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }

    pub fn sector_codes(&self) -> Vec<String> {
        match self {
            ConstraintScope::Sector(code) => vec![code.clone()],
            ConstraintScope::Group(codes) => codes.clone(),
            ConstraintScope::All => vec![ALL_SECTORS.to_string()],
        }
    }

    fn key(&self) -> BTreeSet<String> {
        self.sector_codes().into_iter().collect()
    }
}

/// A linear bound on one sector or on a weighted sum over a group.
///
/// An `id` missing on the wire is derived from the rest of the record, so the
/// same file always yields the same ids. The `with_*` builders re-derive it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConstraintRepr")]
pub struct Constraint {
    pub id: Uuid,
    pub constraint_type: ConstraintType,
    pub applies_to: ConstraintScope,
    pub value: f64,
    pub unit: String,
    pub confidence: ConstraintConfidence,
    pub bound_scope: BoundScope,
    /// Inclusive (start, end) years; `None` applies in every year.
    pub time_window: Option<(i32, i32)>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
struct ConstraintRepr {
    #[serde(default)]
    id: Option<Uuid>,
    constraint_type: ConstraintType,
    applies_to: ConstraintScope,
    value: f64,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    confidence: ConstraintConfidence,
    #[serde(default)]
    bound_scope: BoundScope,
    #[serde(default)]
    time_window: Option<(i32, i32)>,
    #[serde(default)]
    description: Option<String>,
}

impl From<ConstraintRepr> for Constraint {
    fn from(repr: ConstraintRepr) -> Self {
        let constraint = Constraint {
            id: Uuid::nil(),
            constraint_type: repr.constraint_type,
            unit: repr
                .unit
                .unwrap_or_else(|| repr.constraint_type.default_unit().to_string()),
            applies_to: repr.applies_to,
            value: repr.value,
            confidence: repr.confidence,
            bound_scope: repr.bound_scope,
            time_window: repr.time_window,
            description: repr.description,
        };
        match repr.id {
            Some(id) => Constraint { id, ..constraint },
            None => constraint.keyed(),
        }
    }
}

impl Constraint {
    pub fn new(constraint_type: ConstraintType, applies_to: ConstraintScope, value: f64) -> Self {
        Self {
            id: Uuid::nil(),
            constraint_type,
            applies_to,
            value,
            unit: constraint_type.default_unit().to_string(),
            confidence: ConstraintConfidence::Hard,
            bound_scope: BoundScope::DeltaOnly,
            time_window: None,
            description: None,
        }
        .keyed()
    }

    pub fn cap(sector: impl Into<String>, value: f64) -> Self {
        Self::new(
            ConstraintType::CapacityCap,
            ConstraintScope::Sector(sector.into()),
            value,
        )
    }

    pub fn floor(sector: impl Into<String>, value: f64) -> Self {
        Self::new(ConstraintType::Floor, ConstraintScope::Sector(sector.into()), value)
    }

    pub fn group_cap<S: Into<String>>(sectors: impl IntoIterator<Item = S>, value: f64) -> Self {
        Self::new(
            ConstraintType::CapacityCap,
            ConstraintScope::Group(sectors.into_iter().map(Into::into).collect()),
            value,
        )
    }

    /// Output may grow at most `max_growth_rate` over base-year output.
    pub fn ramp(sector: impl Into<String>, max_growth_rate: f64) -> Self {
        Self::new(
            ConstraintType::Ramp,
            ConstraintScope::Sector(sector.into()),
            max_growth_rate,
        )
    }

    pub fn labor(applies_to: ConstraintScope, max_jobs: f64) -> Self {
        Self::new(ConstraintType::Labor, applies_to, max_jobs)
    }

    pub fn import(applies_to: ConstraintScope, max_imports: f64) -> Self {
        Self::new(ConstraintType::Import, applies_to, max_imports)
    }

    pub fn saudization(applies_to: ConstraintScope, min_share: f64) -> Self {
        Self::new(ConstraintType::Saudization, applies_to, min_share)
    }

    pub fn with_confidence(mut self, confidence: ConstraintConfidence) -> Self {
        self.confidence = confidence;
        self.keyed()
    }

    pub fn with_bound_scope(mut self, bound_scope: BoundScope) -> Self {
        self.bound_scope = bound_scope;
        self.keyed()
    }

    pub fn with_time_window(mut self, start: i32, end: i32) -> Self {
        self.time_window = Some((start, end));
        self.keyed()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self.keyed()
    }

    pub fn is_hard(&self) -> bool {
        self.confidence == ConstraintConfidence::Hard
    }

    pub fn applies_in_year(&self, year: Option<i32>) -> bool {
        match (year, self.time_window) {
            (Some(year), Some((start, end))) => start <= year && year <= end,
            _ => true,
        }
    }

    fn keyed(mut self) -> Self {
        self.id = Uuid::nil();
        self.id = content_id("constraint", &self);
        self
    }

    fn describe(&self) -> String {
        self.description.clone().unwrap_or_else(|| {
            format!(
                "{} {} on {}",
                self.constraint_type,
                self.value,
                self.applies_to.sector_codes().join("+")
            )
        })
    }
}

/// Versioned, ordered collection of constraints.
///
/// Accepts either a bare list of constraints or a record with `constraints`
/// and optional `id`, `version` and `name`. A missing id is derived from the
/// content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConstraintSetRepr")]
pub struct ConstraintSet {
    pub id: Uuid,
    pub version: u32,
    pub name: String,
    pub constraints: Vec<Constraint>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConstraintSetRepr {
    List(Vec<Constraint>),
    Record {
        #[serde(default)]
        id: Option<Uuid>,
        #[serde(default = "default_version")]
        version: u32,
        #[serde(default)]
        name: String,
        constraints: Vec<Constraint>,
    },
}

impl From<ConstraintSetRepr> for ConstraintSet {
    fn from(repr: ConstraintSetRepr) -> Self {
        match repr {
            ConstraintSetRepr::List(constraints) => ConstraintSet::new(constraints),
            ConstraintSetRepr::Record {
                id,
                version,
                name,
                constraints,
            } => {
                let set = ConstraintSet {
                    id: Uuid::nil(),
                    version,
                    name,
                    constraints,
                };
                match id {
                    Some(id) => ConstraintSet { id, ..set },
                    None => set.keyed(),
                }
            }
        }
    }
}

fn default_version() -> u32 {
    1
}

impl Default for ConstraintSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ConstraintSet {
    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self {
            id: Uuid::nil(),
            version: default_version(),
            name: String::new(),
            constraints,
        }
        .keyed()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.keyed()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    fn keyed(mut self) -> Self {
        self.id = Uuid::nil();
        self.id = content_id("constraint_set", &self);
        self
    }

    /// Issues found in the set. Empty means valid. `sector_codes`, when given,
    /// enables the unknown-sector check.
    pub fn validate(&self, sector_codes: Option<&[String]>) -> Vec<String> {
        let mut issues = Vec::new();

        for c in &self.constraints {
            if !c.value.is_finite() {
                issues.push(format!("Constraint {}: value {} is not finite", c.id, c.value));
            }
            match c.constraint_type {
                ConstraintType::Ramp if c.value < -1.0 => issues.push(format!(
                    "Constraint {}: growth rate {} is below -100%",
                    c.id, c.value
                )),
                ConstraintType::Saudization if !(0.0..=1.0).contains(&c.value) => issues.push(
                    format!("Constraint {}: Saudi share {} outside [0, 1]", c.id, c.value),
                ),
                _ => {}
            }
            if let Some((start, end)) = c.time_window {
                if start > end {
                    issues.push(format!(
                        "Constraint {}: time window start {start} after end {end}",
                        c.id
                    ));
                }
            }
            if let ConstraintScope::Group(codes) = &c.applies_to {
                if codes.is_empty() {
                    issues.push(format!("Constraint {}: empty sector group", c.id));
                }
            }
            if let Some(order) = sector_codes {
                if let Err(EngineError::UnknownSector(code)) = c.applies_to.indices(order) {
                    issues.push(format!("Constraint {}: unknown sector {code}", c.id));
                }
            }
        }

        let mut seen: HashMap<_, Vec<Uuid>> = HashMap::new();
        for c in &self.constraints {
            seen.entry((c.constraint_type, c.applies_to.key(), c.time_window))
                .or_default()
                .push(c.id);
        }
        let mut duplicates: Vec<_> = seen
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|((kind, scope, _), ids)| {
                format!(
                    "Duplicate {kind} constraints on {}: {} entries",
                    scope.into_iter().collect::<Vec<_>>().join("+"),
                    ids.len()
                )
            })
            .collect();
        duplicates.sort();
        issues.extend(duplicates);

        for (floor, cap) in self.opposing_pairs(|_| true) {
            if floor.value > cap.value {
                issues.push(format!(
                    "Floor {} ({}) exceeds cap {} ({}) on {}",
                    floor.id,
                    floor.value,
                    cap.id,
                    cap.value,
                    floor.applies_to.sector_codes().join("+")
                ));
            }
        }

        issues
    }

    /// Hard floor/cap pairs on the same scope, active in `year`, where the
    /// floor exceeds the cap.
    pub fn hard_conflicts(&self, year: Option<i32>) -> Vec<(Uuid, Uuid)> {
        self.opposing_pairs(|c| c.is_hard() && c.applies_in_year(year))
            .into_iter()
            .filter(|(floor, cap)| floor.bound_scope == cap.bound_scope && floor.value > cap.value)
            .map(|(floor, cap)| (floor.id, cap.id))
            .collect()
    }

    fn opposing_pairs(&self, keep: impl Fn(&Constraint) -> bool) -> Vec<(&Constraint, &Constraint)> {
        let kept: Vec<&Constraint> = self.constraints.iter().filter(|c| keep(c)).collect();
        let mut pairs = Vec::new();
        for floor in kept.iter().filter(|c| c.constraint_type == ConstraintType::Floor) {
            for cap in kept
                .iter()
                .filter(|c| c.constraint_type == ConstraintType::CapacityCap)
            {
                if floor.applies_to.key() == cap.applies_to.key() && windows_overlap(floor, cap) {
                    pairs.push((*floor, *cap));
                }
            }
        }
        pairs
    }
}

fn windows_overlap(a: &Constraint, b: &Constraint) -> bool {
    match (a.time_window, b.time_window) {
        (Some((s1, e1)), Some((s2, e2))) => s1 <= e2 && s2 <= e1,
        _ => true,
    }
}

/// A constraint translated into model indices: Σ wᵢ · Δxᵢ against `bound`.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConstraint {
    pub id: Uuid,
    pub constraint_type: ConstraintType,
    pub confidence: ConstraintConfidence,
    pub sense: Sense,
    /// (model index, weight) pairs; weights are positive.
    pub terms: Vec<(usize, f64)>,
    pub bound: f64,
    pub description: String,
}

impl ResolvedConstraint {
    pub fn is_hard(&self) -> bool {
        self.confidence == ConstraintConfidence::Hard
    }

    pub fn sectors(&self) -> impl Iterator<Item = usize> + '_ {
        self.terms.iter().map(|(i, _)| *i)
    }

    /// The single (index, weight) term of a one-sector constraint.
    pub fn single(&self) -> Option<(usize, f64)> {
        match self.terms.as_slice() {
            [term] => Some(*term),
            _ => None,
        }
    }

    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(i, w)| w * values[i]).sum()
    }

    /// Amount by which `values` violate this bound (0 when satisfied).
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.lhs(values);
        match self.sense {
            Sense::Upper => (lhs - self.bound).max(0.0),
            Sense::Lower => (self.bound - lhs).max(0.0),
        }
    }
}

/// A diagnostic-only constraint resolved to model indices.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedDiagnostic {
    pub id: Uuid,
    pub constraint_type: ConstraintType,
    pub sectors: Vec<usize>,
    pub target: f64,
    pub description: String,
}

/// Constraints of a set sorted for one solve.
#[derive(Debug, Default)]
pub(crate) struct Resolution {
    /// Enforced bounds, in set order.
    pub active: Vec<ResolvedConstraint>,
    /// Outside their time window, or with no sector they can act on.
    pub inactive: Vec<Uuid>,
    pub diagnostics: Vec<ResolvedDiagnostic>,
}

/// Inputs that turn constraint values into bounds on Δx.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ResolveInputs<'a> {
    pub year: Option<i32>,
    pub base_output: Option<&'a SectorVector>,
    pub coefficients: Option<&'a SatelliteCoefficients>,
}

pub(crate) fn resolve_constraints(
    set: &ConstraintSet,
    order: &[String],
    inputs: ResolveInputs<'_>,
) -> EngineResult<Resolution> {
    let base = inputs
        .base_output
        .map(|b| b.align_exact(order, "base output"))
        .transpose()?;
    let needs_coefficients = set.constraints.iter().any(|c| {
        matches!(c.constraint_type, ConstraintType::Labor | ConstraintType::Import)
    });
    let coefficients = match inputs.coefficients {
        Some(c) if needs_coefficients => Some(c.align(order)?),
        _ => None,
    };

    let mut resolution = Resolution::default();
    for c in &set.constraints {
        if !c.applies_in_year(inputs.year) {
            resolution.inactive.push(c.id);
            continue;
        }
        let invalid = |reason: String| EngineError::InvalidConstraint { id: c.id, reason };
        if !c.value.is_finite() {
            return Err(invalid(format!("value {} is not finite", c.value)));
        }
        let sectors = c.applies_to.indices(order).map_err(|e| invalid(e.to_string()))?;
        if sectors.is_empty() {
            return Err(invalid("constraint covers no sectors".into()));
        }

        let Some(sense) = c.constraint_type.sense() else {
            resolution.diagnostics.push(ResolvedDiagnostic {
                id: c.id,
                constraint_type: c.constraint_type,
                sectors,
                target: c.value,
                description: c.describe(),
            });
            continue;
        };

        let weights: Vec<f64> = match c.constraint_type {
            ConstraintType::Labor | ConstraintType::Import => {
                let aligned = coefficients.as_ref().ok_or_else(|| {
                    invalid(format!("{} bound requires satellite coefficients", c.constraint_type))
                })?;
                let per_sector = if c.constraint_type == ConstraintType::Labor {
                    &aligned.jobs
                } else {
                    &aligned.imports
                };
                sectors.iter().map(|&i| per_sector[i]).collect()
            }
            _ => vec![1.0; sectors.len()],
        };
        let terms: Vec<(usize, f64)> = sectors
            .iter()
            .copied()
            .zip(weights)
            .filter(|(_, w)| *w > 0.0)
            .collect();
        if terms.is_empty() {
            warn!(constraint_id = %c.id, kind = %c.constraint_type, "no sector with a positive coefficient; constraint skipped");
            resolution.inactive.push(c.id);
            continue;
        }

        let base_sum = |base: &[f64]| terms.iter().map(|&(i, w)| w * base[i]).sum::<f64>();
        let bound = match (c.constraint_type, c.bound_scope) {
            (ConstraintType::Ramp, _) => {
                let base = base
                    .as_ref()
                    .ok_or_else(|| invalid("RAMP bound requires base output".into()))?;
                c.value * base_sum(base)
            }
            (_, BoundScope::DeltaOnly) => c.value,
            (_, BoundScope::AbsoluteTotal) => {
                let base = base
                    .as_ref()
                    .ok_or_else(|| invalid("ABSOLUTE_TOTAL bound requires base output".into()))?;
                c.value - base_sum(base)
            }
        };

        resolution.active.push(ResolvedConstraint {
            id: c.id,
            constraint_type: c.constraint_type,
            confidence: c.confidence,
            sense,
            terms,
            bound,
            description: c.describe(),
        });
    }
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn order() -> Vec<String> {
        vec!["S1".into(), "S2".into(), "S3".into()]
    }

    #[test]
    fn test_scope_wire_format() {
        let json = r#"[
            {"constraint_type": "CAPACITY_CAP", "applies_to": "S1", "value": 40, "unit": "SAR_MILLIONS", "confidence": "HARD"},
            {"constraint_type": "FLOOR", "applies_to": ["S1", "S2"], "value": 10, "confidence": "SOFT"},
            {"constraint_type": "CAPACITY_CAP", "applies_to": "*", "value": 100}
        ]"#;
        let constraints: Vec<Constraint> = serde_json::from_str(json).unwrap();
        assert_eq!(constraints[0].applies_to, ConstraintScope::Sector("S1".into()));
        assert_eq!(constraints[1].confidence, ConstraintConfidence::Estimated);
        assert!(matches!(constraints[1].applies_to, ConstraintScope::Group(_)));
        assert_eq!(constraints[2].applies_to, ConstraintScope::All);
        assert_eq!(constraints[2].confidence, ConstraintConfidence::Hard);
        assert_eq!(constraints[2].bound_scope, BoundScope::DeltaOnly);
    }

    #[test]
    fn test_scope_indices() {
        let group = ConstraintScope::Group(vec!["S3".into(), "S1".into()]);
        assert_eq!(group.indices(&order()).unwrap(), vec![0, 2]);
        assert_eq!(ConstraintScope::All.indices(&order()).unwrap(), vec![0, 1, 2]);
        assert!(ConstraintScope::Sector("X".into()).indices(&order()).is_err());
    }

    #[test]
    fn test_time_window() {
        let c = Constraint::cap("S1", 1.0).with_time_window(2026, 2028);
        assert!(c.applies_in_year(Some(2027)));
        assert!(!c.applies_in_year(Some(2029)));
        assert!(c.applies_in_year(None));
    }

    #[test]
    fn test_validate_reports_issues() {
        let set = ConstraintSet::new(vec![
            Constraint::cap("S1", 40.0),
            Constraint::cap("S1", 30.0),
            Constraint::floor("S1", 50.0),
            Constraint::cap("S9", 1.0),
        ]);
        let issues = set.validate(Some(&order()));
        assert!(issues.iter().any(|i| i.contains("unknown sector S9")));
        assert!(issues.iter().any(|i| i.contains("Duplicate CAPACITY_CAP")));
        assert_eq!(issues.iter().filter(|i| i.contains("exceeds cap")).count(), 2);
    }

    #[test]
    fn test_validate_clean_set() {
        let set = ConstraintSet::new(vec![Constraint::cap("S1", 40.0), Constraint::floor("S2", 5.0)]);
        assert!(set.validate(Some(&order())).is_empty());
    }

    #[test]
    fn test_hard_conflicts_ignore_soft_and_disjoint_windows() {
        let floor = Constraint::floor("S1", 50.0);
        let cap = Constraint::cap("S1", 40.0);
        let set = ConstraintSet::new(vec![floor.clone(), cap.clone()]);
        assert_eq!(set.hard_conflicts(None), vec![(floor.id, cap.id)]);

        let soft = ConstraintSet::new(vec![
            floor.clone().with_confidence(ConstraintConfidence::Estimated),
            cap.clone(),
        ]);
        assert!(soft.hard_conflicts(None).is_empty());

        let windows = ConstraintSet::new(vec![
            floor.with_time_window(2026, 2026),
            cap.with_time_window(2027, 2030),
        ]);
        assert!(windows.hard_conflicts(None).is_empty());
    }

    fn base() -> SectorVector {
        SectorVector::from_pairs([("S1", 1000.0), ("S2", 2000.0), ("S3", 10.0)]).unwrap()
    }

    fn coefficients() -> SatelliteCoefficients {
        let codes = ["S1", "S2", "S3"];
        let vector = |values: [f64; 3]| SectorVector::from_pairs(codes.into_iter().zip(values)).unwrap();
        SatelliteCoefficients::new(
            vector([2.0, 0.5, 0.0]),
            vector([0.1, 0.4, 0.2]),
            vector([0.5, 0.5, 0.5]),
        )
    }

    fn resolve(set: &ConstraintSet) -> EngineResult<Resolution> {
        let base = base();
        let coefficients = coefficients();
        resolve_constraints(
            set,
            &order(),
            ResolveInputs {
                year: None,
                base_output: Some(&base),
                coefficients: Some(&coefficients),
            },
        )
    }

    #[test]
    fn test_absolute_total_bound() {
        let set = ConstraintSet::new(vec![
            Constraint::cap("S1", 1100.0).with_bound_scope(BoundScope::AbsoluteTotal)
        ]);
        assert_eq!(resolve(&set).unwrap().active[0].bound, 100.0);

        let err = resolve_constraints(&set, &order(), ResolveInputs::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConstraint { .. }));
    }

    #[test]
    fn test_inactive_constraints_listed() {
        let c = Constraint::cap("S1", 1.0).with_time_window(2030, 2031);
        let id = c.id;
        let set = ConstraintSet::new(vec![c]);
        let inputs = ResolveInputs {
            year: Some(2026),
            ..Default::default()
        };
        let resolution = resolve_constraints(&set, &order(), inputs).unwrap();
        assert!(resolution.active.is_empty());
        assert_eq!(resolution.inactive, vec![id]);
    }

    #[rstest]
    #[case::ramp_on_base_output(Constraint::ramp("S1", 0.05), 50.0)]
    #[case::labor_in_jobs(Constraint::labor(ConstraintScope::Sector("S1".into()), 30.0), 30.0)]
    #[case::labor_absolute(
        Constraint::labor(ConstraintScope::Sector("S1".into()), 2030.0)
            .with_bound_scope(BoundScope::AbsoluteTotal),
        30.0
    )]
    #[case::import_in_imports(Constraint::import(ConstraintScope::Sector("S2".into()), 12.0), 12.0)]
    fn test_bound_per_kind(#[case] constraint: Constraint, #[case] bound: f64) {
        let resolution = resolve(&ConstraintSet::new(vec![constraint])).unwrap();
        let c = &resolution.active[0];
        assert_eq!(c.sense, Sense::Upper);
        assert!((c.bound - bound).abs() < 1e-9, "{} != {bound}", c.bound);
    }

    #[test]
    fn test_labor_terms_weighted_by_jobs_coefficient() {
        let set = ConstraintSet::new(vec![Constraint::labor(ConstraintScope::All, 30.0)]);
        let c = &resolve(&set).unwrap().active[0];
        // S3 has no jobs per unit of output and drops out
        assert_eq!(c.terms, vec![(0, 2.0), (1, 0.5)]);
        assert_eq!(c.lhs(&[10.0, 20.0, 99.0]), 30.0);
        assert_eq!(c.violation(&[10.0, 30.0, 0.0]), 5.0);
    }

    #[test]
    fn test_labor_without_positive_coefficient_is_inactive() {
        let c = Constraint::labor(ConstraintScope::Sector("S3".into()), 1.0);
        let id = c.id;
        let resolution = resolve(&ConstraintSet::new(vec![c])).unwrap();
        assert!(resolution.active.is_empty());
        assert_eq!(resolution.inactive, vec![id]);
    }

    #[test]
    fn test_labor_requires_coefficients() {
        let set = ConstraintSet::new(vec![Constraint::labor(ConstraintScope::All, 30.0)]);
        let err = resolve_constraints(&set, &order(), ResolveInputs::default()).unwrap_err();
        assert!(err.to_string().contains("LABOR bound requires satellite coefficients"));
    }

    #[test]
    fn test_ramp_requires_base_output() {
        let set = ConstraintSet::new(vec![Constraint::ramp("S1", 0.1)]);
        assert!(resolve_constraints(&set, &order(), ResolveInputs::default()).is_err());
    }

    #[test]
    fn test_saudization_is_diagnostic_only() {
        let c = Constraint::saudization(ConstraintScope::Group(vec!["S1".into(), "S2".into()]), 0.3);
        assert!(c.constraint_type.is_diagnostic());
        assert_eq!(c.unit, "FRACTION");
        let resolution = resolve(&ConstraintSet::new(vec![c])).unwrap();
        assert!(resolution.active.is_empty());
        assert_eq!(resolution.diagnostics[0].sectors, vec![0, 1]);
        assert_eq!(resolution.diagnostics[0].target, 0.3);
    }

    #[test]
    fn test_validate_flags_out_of_range_kinds() {
        let set = ConstraintSet::new(vec![
            Constraint::ramp("S1", -1.5),
            Constraint::saudization(ConstraintScope::All, 1.2),
        ]);
        let issues = set.validate(Some(&order()));
        assert!(issues.iter().any(|i| i.contains("below -100%")));
        assert!(issues.iter().any(|i| i.contains("outside [0, 1]")));
    }

    #[test]
    fn test_set_accepts_bare_list() {
        let body = r#"[
            {"constraint_type": "CAPACITY_CAP", "applies_to": "S1", "value": 40.0},
            {"constraint_type": "LABOR", "applies_to": "*", "value": 500.0, "confidence": "ESTIMATED"}
        ]"#;
        let set: ConstraintSet = serde_json::from_str(body).unwrap();
        assert_eq!(set.constraints.len(), 2);
        assert_eq!(set.version, 1);
        assert_eq!(set.constraints[1].unit, "JOBS");
    }

    #[test]
    fn test_set_accepts_record() {
        let id = Uuid::new_v4();
        let body = format!(
            r#"{{"id": "{id}", "version": 3, "name": "grid limits",
                "constraints": [{{"constraint_type": "FLOOR", "applies_to": "S2", "value": 5}}]}}"#
        );
        let set: ConstraintSet = serde_json::from_str(&body).unwrap();
        assert_eq!(set.id, id);
        assert_eq!(set.version, 3);
        assert_eq!(set.name, "grid limits");
        assert_eq!(set.constraints[0].constraint_type, ConstraintType::Floor);
    }

    #[test]
    fn test_missing_ids_are_stable_across_loads() {
        let body = r#"{"constraints": [
            {"constraint_type": "CAPACITY_CAP", "applies_to": "S1", "value": 40.0},
            {"constraint_type": "CAPACITY_CAP", "applies_to": "S2", "value": 40.0}
        ]}"#;
        let first: ConstraintSet = serde_json::from_str(body).unwrap();
        let second: ConstraintSet = serde_json::from_str(body).unwrap();
        assert_eq!(first, second);
        assert_ne!(first.constraints[0].id, first.constraints[1].id);

        let reloaded: ConstraintSet =
            serde_json::from_str(&serde_json::to_string(&first).unwrap()).unwrap();
        assert_eq!(reloaded, first);
    }

    #[test]
    fn test_builders_rederive_id() {
        let cap = Constraint::cap("S1", 40.0);
        assert_eq!(cap.id, Constraint::cap("S1", 40.0).id);
        assert_ne!(cap.id, cap.clone().with_confidence(ConstraintConfidence::Assumed).id);
    }
}
