use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

use crate::error::{EngineError, EngineResult};

/// Numeric vector keyed by sector code.
///
/// This is the boundary representation of every per-sector quantity. The
/// solvers work on plain positional slices in model order; `align_*` and
/// `from_aligned` convert between the two.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectorVector {
    codes: Vec<String>,
    values: Vec<f64>,
}

impl SectorVector {
    pub fn new(codes: Vec<String>, values: Vec<f64>) -> EngineResult<Self> {
        if codes.len() != values.len() {
            return Err(EngineError::dimension(
                "sector vector values",
                codes.len(),
                values.len(),
            ));
        }
        let mut seen = HashSet::with_capacity(codes.len());
        for code in &codes {
            if !seen.insert(code.as_str()) {
                return Err(EngineError::InvalidModel(format!(
                    "duplicate sector code in vector: {code}"
                )));
            }
        }
        Ok(Self { codes, values })
    }

    pub fn from_pairs<S: Into<String>>(
        pairs: impl IntoIterator<Item = (S, f64)>,
    ) -> EngineResult<Self> {
        let (codes, values): (Vec<String>, Vec<f64>) =
            pairs.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        Self::new(codes, values)
    }

    /// Build from values already in `order`. Lengths must match.
    pub(crate) fn from_aligned(order: &[String], values: Vec<f64>) -> Self {
        debug_assert_eq!(order.len(), values.len());
        Self {
            codes: order.to_vec(),
            values,
        }
    }

    pub fn zeros(order: &[String]) -> Self {
        Self::from_aligned(order, vec![0.0; order.len()])
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.codes
            .iter()
            .position(|c| c == code)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.codes
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Align to `order`, requiring exactly the same sector set.
    pub fn align_exact(&self, order: &[String], context: &str) -> EngineResult<Vec<f64>> {
        if self.len() != order.len() {
            return Err(EngineError::dimension(context, order.len(), self.len()));
        }
        self.align_sparse(order)
    }

    /// Align to `order`; sectors missing from this vector are zero.
    pub fn align_sparse(&self, order: &[String]) -> EngineResult<Vec<f64>> {
        let mut out = vec![0.0; order.len()];
        for (code, value) in self.iter() {
            let idx = order
                .iter()
                .position(|c| c == code)
                .ok_or_else(|| EngineError::UnknownSector(code.to_string()))?;
            out[idx] = value;
        }
        Ok(out)
    }

    /// Element-wise combination of two vectors with identical sector order.
    pub fn zip_with(&self, other: &SectorVector, f: impl Fn(f64, f64) -> f64) -> EngineResult<Self> {
        let rhs = other.align_exact(&self.codes, "sector vector operand")?;
        let values = self
            .values
            .iter()
            .zip(rhs)
            .map(|(a, b)| f(*a, b))
            .collect();
        Ok(Self::from_aligned(&self.codes, values))
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::from_aligned(
            &self.codes,
            self.values.iter().map(|v| v * factor).collect(),
        )
    }
}

impl Serialize for SectorVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (code, value) in self.iter() {
            map.serialize_entry(code, &value)?;
        }
        map.end()
    }
}

struct SectorVectorVisitor;

impl<'de> Visitor<'de> for SectorVectorVisitor {
    type Value = SectorVector;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of sector code to number")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut codes = Vec::with_capacity(access.size_hint().unwrap_or(0));
        let mut values = Vec::with_capacity(codes.capacity());
        while let Some((code, value)) = access.next_entry::<String, f64>()? {
            codes.push(code);
            values.push(value);
        }
        SectorVector::new(codes, values).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for SectorVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SectorVectorVisitor)
    }
}
