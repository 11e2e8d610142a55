use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

use crate::error::{EngineError, EngineResult};
use crate::vector::SectorVector;

/// How a multi-year schedule turns into per-year shocks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShockMode {
    /// Each year's Δf is solved as given.
    #[default]
    PerYear,
    /// Each year solves the running sum of all Δf up to and including it.
    Cumulative,
}

/// Demand shock for one year, either positional (model order, length n) or
/// keyed by sector code (missing sectors are zero).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShockVector {
    Positional(Vec<f64>),
    Keyed(SectorVector),
}

impl ShockVector {
    pub fn resolve(&self, order: &[String]) -> EngineResult<Vec<f64>> {
        let values = match self {
            ShockVector::Positional(values) => {
                if values.len() != order.len() {
                    return Err(EngineError::dimension(
                        "shock vector",
                        order.len(),
                        values.len(),
                    ));
                }
                values.clone()
            }
            ShockVector::Keyed(vector) => vector.align_sparse(order)?,
        };
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::InvalidInput(
                "shock vector contains non-finite values".into(),
            ));
        }
        Ok(values)
    }
}

impl From<SectorVector> for ShockVector {
    fn from(v: SectorVector) -> Self {
        ShockVector::Keyed(v)
    }
}

impl From<Vec<f64>> for ShockVector {
    fn from(v: Vec<f64>) -> Self {
        ShockVector::Positional(v)
    }
}

/// Year → final-demand shock. Years need not be contiguous; they are always
/// processed in ascending order.
///
/// Accepted on the wire as a bare `{year: shock}` map or as
/// `{"shocks": {...}, "deflators": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScheduleRepr")]
pub struct ShockSchedule {
    pub shocks: BTreeMap<i32, ShockVector>,
    /// Cumulative deflator per year; real shock = nominal / deflator.
    #[serde(default)]
    pub deflators: BTreeMap<i32, f64>,
}

// Year keys stay strings here: integer map keys do not survive untagged buffering.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScheduleRepr {
    Record {
        shocks: BTreeMap<String, ShockVector>,
        #[serde(default)]
        deflators: BTreeMap<String, f64>,
    },
    Bare(BTreeMap<String, ShockVector>),
}

fn year_keyed<V>(map: BTreeMap<String, V>) -> Result<BTreeMap<i32, V>, String> {
    map.into_iter()
        .map(|(key, value)| {
            key.trim()
                .parse::<i32>()
                .map(|year| (year, value))
                .map_err(|_| format!("schedule key `{key}` is not a year"))
        })
        .collect()
}

impl TryFrom<ScheduleRepr> for ShockSchedule {
    type Error = String;

    fn try_from(repr: ScheduleRepr) -> Result<Self, Self::Error> {
        match repr {
            ScheduleRepr::Record { shocks, deflators } => Ok(Self {
                shocks: year_keyed(shocks)?,
                deflators: year_keyed(deflators)?,
            }),
            ScheduleRepr::Bare(shocks) => Ok(Self {
                shocks: year_keyed(shocks)?,
                deflators: BTreeMap::new(),
            }),
        }
    }
}

impl ShockSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year(mut self, year: i32, shock: impl Into<ShockVector>) -> Self {
        self.shocks.insert(year, shock.into());
        self
    }

    pub fn with_deflator(mut self, year: i32, deflator: f64) -> Self {
        self.deflators.insert(year, deflator);
        self
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.shocks.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.shocks.is_empty()
    }

    /// Scale every shock by `factor` (sensitivity variants).
    pub fn scaled(&self, factor: f64) -> Self {
        let shocks = self
            .shocks
            .iter()
            .map(|(year, shock)| {
                let scaled = match shock {
                    ShockVector::Positional(v) => {
                        ShockVector::Positional(v.iter().map(|x| x * factor).collect())
                    }
                    ShockVector::Keyed(v) => ShockVector::Keyed(v.scale(factor)),
                };
                (*year, scaled)
            })
            .collect();
        Self {
            shocks,
            deflators: self.deflators.clone(),
        }
    }

    /// Real shocks per year in model order, with `mode` applied.
    pub fn effective_shocks(
        &self,
        order: &[String],
        mode: ShockMode,
    ) -> EngineResult<Vec<(i32, Vec<f64>)>> {
        let mut running = vec![0.0; order.len()];
        let mut out = Vec::with_capacity(self.shocks.len());

        for (year, shock) in &self.shocks {
            let deflator = self.deflators.get(year).copied().unwrap_or(1.0);
            if !(deflator.is_finite() && deflator > 0.0) {
                return Err(EngineError::InvalidInput(format!(
                    "deflator for {year} must be positive, got {deflator}"
                )));
            }
            let real: Vec<f64> = shock.resolve(order)?.into_iter().map(|v| v / deflator).collect();

            let effective = match mode {
                ShockMode::PerYear => real,
                ShockMode::Cumulative => {
                    for (acc, v) in running.iter_mut().zip(&real) {
                        *acc += v;
                    }
                    running.clone()
                }
            };
            out.push((*year, effective));
        }
        Ok(out)
    }
}
