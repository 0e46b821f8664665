#![allow(clippy::needless_range_loop)]
//! Cholesky decomposition and the PSD check used on correlation matrices.
//!
//! A correlation matrix supplied with summary statistics may be indefinite
//! (estimated from a different sample, truncated, or rounded). The fit does
//! not require solving against R, only that D^{1/2} R D^{1/2} behaves like a
//! Gram matrix, so the repair applied here is diagonal loading:
//! R <- (1-w) * R + w * I with the smallest w that passes a jittered
//! Cholesky.

use crate::dense::DenseMatrix;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinalgError {
    #[error("Matrix is not positive definite")]
    NotPositiveDefinite,
}

/// Lower-triangular Cholesky factor L with A = L * L'.
pub struct CholeskyDecomp {
    pub l: DenseMatrix,
}

impl CholeskyDecomp {
    /// Decompose a symmetric matrix, allowing diagonal pivots down to -jitter
    /// (clamped to zero) so numerically semi-definite inputs pass. A clamped
    /// pivot must leave residuals below sqrt(jitter) in its column.
    pub fn new_with_jitter(a: &DenseMatrix, jitter: f64) -> Result<Self, LinalgError> {
        let n = a.nrows();
        assert_eq!(n, a.ncols());
        let mut l = DenseMatrix::zeros(n, n);

        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l.get(j, k) * l.get(j, k);
            }
            let diag = a.get(j, j) - sum;
            if diag < -jitter {
                return Err(LinalgError::NotPositiveDefinite);
            }
            let pivot = diag.max(0.0).sqrt();
            l.set(j, j, pivot);

            for i in (j + 1)..n {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l.get(i, k) * l.get(j, k);
                }
                let resid = a.get(i, j) - sum;
                let off = if pivot > 0.0 {
                    resid / pivot
                } else if resid.abs() > jitter.sqrt() {
                    // A collapsed pivot admits only a zero column below it;
                    // a leftover residual there means the matrix is
                    // indefinite even though every pivot stayed non-negative.
                    return Err(LinalgError::NotPositiveDefinite);
                } else {
                    0.0
                };
                l.set(i, j, off);
            }
        }

        Ok(CholeskyDecomp { l })
    }

    /// Strict decomposition (no jitter).
    pub fn new(a: &DenseMatrix) -> Result<Self, LinalgError> {
        Self::new_with_jitter(a, 0.0)
    }
}

/// Check whether a symmetric matrix is positive semi-definite within a small
/// numerical jitter.
pub fn is_semi_positive_definite(a: &DenseMatrix) -> bool {
    let n = a.nrows();
    let jitter = 1e-8 * n as f64;
    CholeskyDecomp::new_with_jitter(a, jitter).is_ok()
}

/// Shrink a correlation matrix toward the identity until it passes the PSD
/// check. Returns the shrinkage weight applied (0.0 when none was needed).
pub fn shrink_to_semi_pd(r: &mut DenseMatrix) -> f64 {
    if is_semi_positive_definite(r) {
        return 0.0;
    }
    let n = r.nrows();
    let mut w = 1e-6;
    while w < 1.0 {
        let mut candidate = DenseMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let base = (1.0 - w) * r.get(i, j);
                candidate.set(i, j, if i == j { base + w } else { base });
            }
        }
        if is_semi_positive_definite(&candidate) {
            *r = candidate;
            return w;
        }
        w = if w < 0.1 { w * 10.0 } else { w + 0.1 };
    }
    // w = 1 is the identity, always PSD.
    let mut identity = DenseMatrix::identity(n);
    std::mem::swap(r, &mut identity);
    1.0
}
