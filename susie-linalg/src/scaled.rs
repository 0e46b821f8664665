//! Scaled matrix view: centered/standardized products without forming a
//! scaled copy of the underlying matrix.
//!
//! For a design matrix A with per-column center c and scale s, the scaled
//! matrix is S = (A - 1*c') * diag(1/s). The two product identities used
//! here keep all work on the raw (possibly sparse) storage:
//!
//!   S * b  = A * (b ./ s) - (sum_j c_j * b_j / s_j) * 1
//!   S' * y = (A' * y) ./ s - (c ./ s) * sum(y)
//!
//! Columns with scale 0 (zero variance) contribute nothing; no division by
//! zero ever happens. The view is read-only and reentrant, so it can be
//! shared across parallel per-variable evaluations.

use crate::dense::DenseMatrix;
use crate::sparse::SparseMatrix;

/// A raw design matrix, dense or sparse.
#[derive(Debug, Clone)]
pub enum DesignMatrix {
    Dense(DenseMatrix),
    Sparse(SparseMatrix),
}

impl DesignMatrix {
    pub fn nrows(&self) -> usize {
        match self {
            DesignMatrix::Dense(m) => m.nrows(),
            DesignMatrix::Sparse(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            DesignMatrix::Dense(m) => m.ncols(),
            DesignMatrix::Sparse(m) => m.ncols(),
        }
    }

    /// Unscaled product A * v.
    pub fn mat_vec(&self, v: &[f64]) -> Vec<f64> {
        match self {
            DesignMatrix::Dense(m) => m.mat_vec(v),
            DesignMatrix::Sparse(m) => m.mat_vec(v),
        }
    }

    /// Unscaled transposed product A' * v.
    pub fn t_mat_vec(&self, v: &[f64]) -> Vec<f64> {
        match self {
            DesignMatrix::Dense(m) => m.t_mat_vec(v),
            DesignMatrix::Sparse(m) => m.t_mat_vec(v),
        }
    }

    /// Sum of raw column j.
    pub fn col_sum(&self, j: usize) -> f64 {
        match self {
            DesignMatrix::Dense(m) => m.col_sum(j),
            DesignMatrix::Sparse(m) => m.col_sum(j),
        }
    }

    /// Sum of squares of raw column j.
    pub fn col_sq_sum(&self, j: usize) -> f64 {
        match self {
            DesignMatrix::Dense(m) => m.col_dot(j, j),
            DesignMatrix::Sparse(m) => m.col_sq_sum(j),
        }
    }

    /// Dot product of raw columns a and b.
    pub fn col_dot(&self, a: usize, b: usize) -> f64 {
        match self {
            DesignMatrix::Dense(m) => m.col_dot(a, b),
            DesignMatrix::Sparse(m) => m.col_dot(a, b),
        }
    }
}

/// A design matrix together with per-column center/scale vectors.
#[derive(Debug, Clone)]
pub struct ScaledMatrixView {
    a: DesignMatrix,
    center: Vec<f64>,
    scale: Vec<f64>,
}

impl ScaledMatrixView {
    /// Wrap a matrix with explicit center and scale vectors.
    ///
    /// `scale[j] == 0` marks a zero-variance column whose scaled entries are
    /// treated as all-zero.
    pub fn with_stats(a: DesignMatrix, center: Vec<f64>, scale: Vec<f64>) -> Self {
        assert_eq!(center.len(), a.ncols());
        assert_eq!(scale.len(), a.ncols());
        Self { a, center, scale }
    }

    /// Compute column means and (n-1 denominator) standard deviations from
    /// the matrix itself and build the view.
    ///
    /// With `standardize = false` the scale is 1 for every column and only
    /// centering is applied. With `standardize = true` zero-variance columns
    /// get scale 0 (skipped in all products).
    pub fn from_design(a: DesignMatrix, standardize: bool) -> Self {
        let n = a.nrows();
        let p = a.ncols();
        assert!(n > 1, "need at least two rows to compute column scales");
        let mut center = Vec::with_capacity(p);
        let mut scale = Vec::with_capacity(p);
        for j in 0..p {
            let sum = a.col_sum(j);
            let ssq = a.col_sq_sum(j);
            let mean = sum / n as f64;
            center.push(mean);
            if standardize {
                let var = (ssq - sum * mean).max(0.0) / (n as f64 - 1.0);
                scale.push(var.sqrt());
            } else {
                scale.push(1.0);
            }
        }
        Self { a, center, scale }
    }

    pub fn nrows(&self) -> usize {
        self.a.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.a.ncols()
    }

    pub fn center(&self) -> &[f64] {
        &self.center
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Scaled product S * b.
    pub fn mat_vec(&self, b: &[f64]) -> Vec<f64> {
        assert_eq!(b.len(), self.ncols());
        let u: Vec<f64> = b
            .iter()
            .zip(self.scale.iter())
            .map(|(&bj, &sj)| if sj != 0.0 { bj / sj } else { 0.0 })
            .collect();
        let mut out = self.a.mat_vec(&u);
        let offset: f64 = self
            .center
            .iter()
            .zip(u.iter())
            .map(|(&cj, &uj)| cj * uj)
            .sum();
        for o in out.iter_mut() {
            *o -= offset;
        }
        out
    }

    /// Scaled transposed product S' * y.
    pub fn t_mat_vec(&self, y: &[f64]) -> Vec<f64> {
        assert_eq!(y.len(), self.nrows());
        let v = self.a.t_mat_vec(y);
        let y_sum: f64 = y.iter().sum();
        v.iter()
            .zip(self.center.iter())
            .zip(self.scale.iter())
            .map(|((&vj, &cj), &sj)| {
                if sj != 0.0 {
                    (vj - cj * y_sum) / sj
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Squared norms of the scaled columns: d_j = ||S e_j||^2.
    pub fn col_sq_norms(&self) -> Vec<f64> {
        let n = self.nrows() as f64;
        (0..self.ncols())
            .map(|j| {
                let s = self.scale[j];
                if s == 0.0 {
                    return 0.0;
                }
                let c = self.center[j];
                let raw = self.a.col_sq_sum(j) - 2.0 * c * self.a.col_sum(j) + n * c * c;
                (raw / (s * s)).max(0.0)
            })
            .collect()
    }

    /// Dot product of scaled columns a and b.
    pub fn col_dot(&self, a: usize, b: usize) -> f64 {
        let (sa, sb) = (self.scale[a], self.scale[b]);
        if sa == 0.0 || sb == 0.0 {
            return 0.0;
        }
        let n = self.nrows() as f64;
        let (ca, cb) = (self.center[a], self.center[b]);
        let raw = self.a.col_dot(a, b) - ca * self.a.col_sum(b) - cb * self.a.col_sum(a)
            + n * ca * cb;
        raw / (sa * sb)
    }
}
