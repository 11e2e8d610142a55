use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{EngineError, EngineResult};

/// Model snapshot as it arrives at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub sector_codes: Vec<String>,
    #[serde(rename = "Z", alias = "z")]
    pub z: Vec<Vec<f64>>,
    pub x: Vec<f64>,
    pub base_year: i32,
    #[serde(default = "default_denomination")]
    pub denomination: String,
}

fn default_denomination() -> String {
    "SAR_MILLIONS".to_string()
}

/// Validated, immutable Input-Output model.
///
/// A = Z · diag(x)⁻¹ is derived once at construction.
#[derive(Debug, Clone)]
pub struct IoModel {
    sector_codes: Vec<String>,
    z: DMatrix<f64>,
    x: DVector<f64>,
    a: DMatrix<f64>,
    base_year: i32,
    denomination: String,
    max_column_sum: f64,
    spectral_radius: OnceLock<f64>,
    checksum: String,
}

impl IoModel {
    pub fn from_snapshot(snapshot: ModelSnapshot) -> EngineResult<Self> {
        let n = snapshot.x.len();
        if n == 0 {
            return Err(EngineError::InvalidModel("model has no sectors".into()));
        }
        if snapshot.sector_codes.len() != n {
            return Err(EngineError::dimension("sector_codes", n, snapshot.sector_codes.len()));
        }
        if snapshot.z.len() != n {
            return Err(EngineError::dimension("Z rows", n, snapshot.z.len()));
        }
        for row in &snapshot.z {
            if row.len() != n {
                return Err(EngineError::dimension("Z columns", n, row.len()));
            }
        }

        let mut seen = HashSet::with_capacity(n);
        for code in &snapshot.sector_codes {
            if !seen.insert(code.as_str()) {
                return Err(EngineError::InvalidModel(format!("duplicate sector code {code}")));
            }
        }

        let z = DMatrix::from_row_iterator(n, n, snapshot.z.iter().flatten().copied());
        if z.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(EngineError::InvalidModel(
                "Z must be finite and non-negative".into(),
            ));
        }

        let x = DVector::from_vec(snapshot.x);
        if let Some((j, v)) = x.iter().enumerate().find(|(_, v)| !v.is_finite() || **v <= 0.0) {
            return Err(EngineError::InvalidModel(format!(
                "gross output for {} must be positive, got {v}",
                snapshot.sector_codes[j]
            )));
        }

        let a = technical_coefficients(&z, &x);
        let max_column_sum = max_column_sum(&a);
        // ρ(A) ≤ max column sum, so the eigen solve is only needed above 1
        let spectral_radius = OnceLock::new();
        if !(max_column_sum < 1.0) {
            let rho = spectral_radius_of(&a);
            if !(rho < 1.0) {
                return Err(EngineError::SingularSystem {
                    reason: format!(
                        "spectral radius of A is {rho:.4} (must be < 1); the economy is not productive"
                    ),
                });
            }
            let _ = spectral_radius.set(rho);
        }

        let checksum = checksum(&z, &x);

        Ok(Self {
            sector_codes: snapshot.sector_codes,
            z,
            x,
            a,
            base_year: snapshot.base_year,
            denomination: snapshot.denomination,
            max_column_sum,
            spectral_radius,
            checksum,
        })
    }

    pub fn n(&self) -> usize {
        self.x.len()
    }

    pub fn sector_codes(&self) -> &[String] {
        &self.sector_codes
    }

    pub fn sector_index(&self, code: &str) -> EngineResult<usize> {
        self.sector_codes
            .iter()
            .position(|c| c == code)
            .ok_or_else(|| EngineError::UnknownSector(code.to_string()))
    }

    pub fn transactions(&self) -> &DMatrix<f64> {
        &self.z
    }

    pub fn gross_output(&self) -> &DVector<f64> {
        &self.x
    }

    pub fn technical_coefficients(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn base_year(&self) -> i32 {
        self.base_year
    }

    pub fn denomination(&self) -> &str {
        &self.denomination
    }

    /// Largest column sum of A, an upper bound on the spectral radius.
    pub fn max_column_sum(&self) -> f64 {
        self.max_column_sum
    }

    /// Computed on first use when the column-sum bound already proved the
    /// model productive.
    pub fn spectral_radius(&self) -> f64 {
        *self.spectral_radius.get_or_init(|| spectral_radius_of(&self.a))
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

/// A[i][j] = Z[i][j] / x[j]; columns with x[j] == 0 are zero.
pub fn technical_coefficients(z: &DMatrix<f64>, x: &DVector<f64>) -> DMatrix<f64> {
    let mut a = z.clone();
    for (j, mut column) in a.column_iter_mut().enumerate() {
        let output = x[j];
        if output == 0.0 {
            column.fill(0.0);
        } else {
            column /= output;
        }
    }
    a
}

fn max_column_sum(a: &DMatrix<f64>) -> f64 {
    a.column_iter().map(|c| c.sum()).fold(0.0, f64::max)
}

fn spectral_radius_of(a: &DMatrix<f64>) -> f64 {
    a.complex_eigenvalues()
        .iter()
        .map(|c| (c.re * c.re + c.im * c.im).sqrt())
        .fold(0.0, f64::max)
}

fn checksum(z: &DMatrix<f64>, x: &DVector<f64>) -> String {
    let mut hasher = Sha256::new();
    for row in z.row_iter() {
        for v in row.iter() {
            hasher.update(v.to_le_bytes());
        }
    }
    for v in x.iter() {
        hasher.update(v.to_le_bytes());
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
