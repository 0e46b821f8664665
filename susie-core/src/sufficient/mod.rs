//! Sufficient statistics: the single internal representation every input
//! mode is normalized into.
//!
//! After this stage the engine only ever sees (XtX-equivalent, Xty-equivalent,
//! yty-equivalent, n). The XtX-equivalent is a capability operator rather
//! than a concrete matrix: summary-statistic inputs materialize a p x p
//! matrix, while individual-level inputs compose scaled matrix-vector
//! products so no O(p^2) storage is ever allocated for a large sparse design
//! matrix.
//!
//! Summary-statistic reconstruction uses the exact single-variable
//! regression identities: with z = bhat/shat and
//! adj_j = (n-1)/(z_j^2 + n - 2),
//!
//!   diag(XtX)_j = var_y * adj_j / shat_j^2
//!   XtX         = D^{1/2} R D^{1/2}
//!   Xty_j       = z_j * adj_j * var_y / shat_j
//!   yty         = (n-1) * var_y
//!
//! which make the fit numerically equivalent to individual-level regression
//! on centered data. Without var_y the standardized form is used instead and
//! coefficients come out on the standardized-X,-y scale: a documented,
//! user-visible distinction, not an approximation error.

use crate::input::{validate, DataInput, InputError};
use crate::util::math::safe_div;
use susie_linalg::{DenseMatrix, DesignMatrix, ScaledMatrixView};

/// XtX-equivalent access: materialized for summary input, matrix-free for
/// individual-level input.
pub enum XtxOperator {
    /// A materialized p x p matrix (summary-statistic paths).
    Dense(DenseMatrix),
    /// Composed scaled products over the raw design matrix.
    MatrixFree(ScaledMatrixView),
}

impl XtxOperator {
    /// Number of variables p.
    pub fn n_variables(&self) -> usize {
        match self {
            XtxOperator::Dense(m) => m.ncols(),
            XtxOperator::MatrixFree(view) => view.ncols(),
        }
    }

    /// XtX * b.
    pub fn mul(&self, b: &[f64]) -> Vec<f64> {
        match self {
            XtxOperator::Dense(m) => m.mat_vec(b),
            XtxOperator::MatrixFree(view) => view.t_mat_vec(&view.mat_vec(b)),
        }
    }

    /// diag(XtX).
    pub fn diag(&self) -> Vec<f64> {
        match self {
            XtxOperator::Dense(m) => m.diag(),
            XtxOperator::MatrixFree(view) => view.col_sq_norms(),
        }
    }

    /// Correlation between (scaled) variables i and j, given diag(XtX).
    pub fn correlation(&self, i: usize, j: usize, d: &[f64]) -> f64 {
        if i == j {
            return 1.0;
        }
        let denom = (d[i] * d[j]).sqrt();
        let cross = match self {
            XtxOperator::Dense(m) => m.get(i, j),
            XtxOperator::MatrixFree(view) => view.col_dot(i, j),
        };
        safe_div(cross, denom).clamp(-1.0, 1.0)
    }
}

/// The normalized fit input, immutable once constructed; the IBSS engine
/// borrows it read-only for the whole fit.
pub struct SufficientStats {
    /// XtX-equivalent operator.
    pub xtx: XtxOperator,
    /// Xty-equivalent vector.
    pub xty: Vec<f64>,
    /// yty-equivalent scalar.
    pub yty: f64,
    /// Sample size (effective sample size for summary inputs).
    pub n: usize,
    /// Cached diag(XtX).
    pub d: Vec<f64>,
    /// Per-column scale used to map standardized effects back to the input
    /// scale (all ones when no standardization was applied or recoverable).
    pub column_scale: Vec<f64>,
    /// Per-column centers (individual-level input only; zeros otherwise).
    pub column_center: Vec<f64>,
    /// Mean of the response (individual-level input only; 0 otherwise).
    pub y_mean: f64,
    /// Phenotype variance seed yty/(n-1).
    pub var_y: f64,
    /// When set, the residual variance is pinned to this value for the whole
    /// fit (n-free z-score mode).
    pub fixed_residual_variance: Option<f64>,
    /// Diagonal shrinkage applied to R during validation (0 when none).
    pub r_shrinkage: f64,
}

impl SufficientStats {
    /// Number of candidate variables.
    pub fn n_variables(&self) -> usize {
        self.xty.len()
    }

    /// Build sufficient statistics from a validated input variant.
    pub fn from_input(
        mut input: DataInput,
        standardize: bool,
    ) -> Result<SufficientStats, InputError> {
        let r_shrinkage = validate(&mut input)?;
        match input {
            DataInput::Individual { x, y } => Ok(Self::from_individual(x, &y, standardize)),
            DataInput::SummaryBhat {
                bhat,
                shat,
                r,
                n,
                var_y,
            } => Ok(Self::from_summary_bhat(
                &bhat,
                &shat,
                r,
                n,
                var_y,
                standardize,
                r_shrinkage,
            )),
            DataInput::SummaryZ { z, r, n } => {
                Ok(Self::from_summary_z(&z, r, n, standardize, r_shrinkage))
            }
        }
    }

    /// Individual-level path: matrix-free operator over the scaled view.
    fn from_individual(x: DesignMatrix, y: &[f64], standardize: bool) -> SufficientStats {
        let n = x.nrows();
        let y_mean = y.iter().sum::<f64>() / n as f64;
        let yc: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
        let yty: f64 = yc.iter().map(|v| v * v).sum();

        let view = ScaledMatrixView::from_design(x, standardize);
        let xty = view.t_mat_vec(&yc);
        let d = view.col_sq_norms();
        let column_scale: Vec<f64> = view
            .scale()
            .iter()
            .map(|&s| if s != 0.0 { s } else { 1.0 })
            .collect();
        let column_center = view.center().to_vec();
        let var_y = yty / (n as f64 - 1.0);

        SufficientStats {
            xtx: XtxOperator::MatrixFree(view),
            xty,
            yty,
            n,
            d,
            column_scale,
            column_center,
            y_mean,
            var_y,
            fixed_residual_variance: None,
            r_shrinkage: 0.0,
        }
    }

    /// Summary path from effect estimates and standard errors.
    fn from_summary_bhat(
        bhat: &[f64],
        shat: &[f64],
        r: DenseMatrix,
        n: usize,
        var_y: Option<f64>,
        standardize: bool,
        r_shrinkage: f64,
    ) -> SufficientStats {
        let p = bhat.len();
        let nf = n as f64;
        let z: Vec<f64> = bhat.iter().zip(shat.iter()).map(|(b, s)| b / s).collect();
        let adj: Vec<f64> = z.iter().map(|zj| (nf - 1.0) / (zj * zj + nf - 2.0)).collect();

        let (mut xtx, mut xty, yty, var_y) = match var_y {
            Some(vy) => {
                let d: Vec<f64> = adj
                    .iter()
                    .zip(shat.iter())
                    .map(|(a, s)| vy * a / (s * s))
                    .collect();
                let sqrt_d: Vec<f64> = d.iter().map(|v| v.sqrt()).collect();
                let mut xtx = DenseMatrix::zeros(p, p);
                for i in 0..p {
                    for j in 0..p {
                        xtx.set(i, j, sqrt_d[i] * sqrt_d[j] * r.get(i, j));
                    }
                }
                xtx.symmetrize();
                let xty: Vec<f64> = z
                    .iter()
                    .zip(adj.iter())
                    .zip(shat.iter())
                    .map(|((zj, aj), sj)| zj * aj * vy / sj)
                    .collect();
                (xtx, xty, (nf - 1.0) * vy, vy)
            }
            None => {
                // Standardized scale: XtX = (n-1) R, Xty = sqrt(n-1) z_adj.
                let mut xtx = DenseMatrix::zeros(p, p);
                for i in 0..p {
                    for j in 0..p {
                        xtx.set(i, j, (nf - 1.0) * r.get(i, j));
                    }
                }
                let xty: Vec<f64> = z
                    .iter()
                    .zip(adj.iter())
                    .map(|(zj, aj)| (nf - 1.0).sqrt() * aj.sqrt() * zj)
                    .collect();
                (xtx, xty, nf - 1.0, 1.0)
            }
        };

        // Standardize the reconstructed statistics so every column has unit
        // variance, mirroring the individual-level standardize flag. The
        // scale is kept so coef() can undo it.
        let mut column_scale = vec![1.0; p];
        if standardize {
            let diag = xtx.diag();
            let csd: Vec<f64> = diag
                .iter()
                .map(|&dj| {
                    let s = (dj / (nf - 1.0)).sqrt();
                    if s != 0.0 {
                        s
                    } else {
                        1.0
                    }
                })
                .collect();
            for i in 0..p {
                for j in 0..p {
                    xtx.set(i, j, xtx.get(i, j) / (csd[i] * csd[j]));
                }
            }
            for (t, s) in xty.iter_mut().zip(csd.iter()) {
                *t /= s;
            }
            column_scale = csd;
        }

        let d = xtx.diag();
        SufficientStats {
            xtx: XtxOperator::Dense(xtx),
            xty,
            yty,
            n,
            d,
            column_scale,
            column_center: vec![0.0; p],
            y_mean: 0.0,
            var_y,
            fixed_residual_variance: None,
            r_shrinkage,
        }
    }

    /// Summary path from z-scores. With n present this is the bhat path with
    /// bhat = z, shat = 1; without n the conservative mode pins the residual
    /// variance at 1 and lets prior-variance estimation absorb the unknown
    /// effective-sample-size scaling.
    fn from_summary_z(
        z: &[f64],
        r: DenseMatrix,
        n: Option<usize>,
        standardize: bool,
        r_shrinkage: f64,
    ) -> SufficientStats {
        match n {
            Some(n) => {
                let shat = vec![1.0; z.len()];
                Self::from_summary_bhat(z, &shat, r, n, None, standardize, r_shrinkage)
            }
            None => {
                let p = z.len();
                let d = r.diag();
                SufficientStats {
                    xtx: XtxOperator::Dense(r),
                    xty: z.to_vec(),
                    yty: 1.0,
                    n: 2,
                    d,
                    column_scale: vec![1.0; p],
                    column_center: vec![0.0; p],
                    y_mean: 0.0,
                    var_y: 1.0,
                    fixed_residual_variance: Some(1.0),
                    r_shrinkage,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 5 x 2 toy data used to cross-check the reconstruction identities.
    fn toy() -> (Vec<f64>, Vec<f64>) {
        let x = vec![
            1.0, 0.5, //
            2.0, 1.5, //
            0.0, 1.0, //
            3.0, 0.0, //
            1.5, 2.0, //
        ];
        let y = vec![1.2, 2.8, 0.4, 2.9, 2.1];
        (x, y)
    }

    fn centered_stats(x: &[f64], y: &[f64], n: usize, p: usize) -> (Vec<Vec<f64>>, Vec<f64>, f64) {
        // Centered cross-products S_ij, S_jy, S_yy.
        let means: Vec<f64> = (0..p)
            .map(|j| (0..n).map(|i| x[i * p + j]).sum::<f64>() / n as f64)
            .collect();
        let ym = y.iter().sum::<f64>() / n as f64;
        let mut sxx = vec![vec![0.0; p]; p];
        let mut sxy = vec![0.0; p];
        let mut syy = 0.0;
        for i in 0..n {
            let yc = y[i] - ym;
            syy += yc * yc;
            for j in 0..p {
                let xj = x[i * p + j] - means[j];
                sxy[j] += xj * yc;
                for k in 0..p {
                    sxx[j][k] += xj * (x[i * p + k] - means[k]);
                }
            }
        }
        (sxx, sxy, syy)
    }

    #[test]
    fn test_individual_path_matches_centered_products() {
        let (x, y) = toy();
        let (n, p) = (5, 2);
        let design = DesignMatrix::Dense(DenseMatrix::from_row_major(n, p, &x));
        let stats = SufficientStats::from_individual(design, &y, false);
        let (sxx, sxy, syy) = centered_stats(&x, &y, n, p);

        for j in 0..p {
            assert!((stats.xty[j] - sxy[j]).abs() < 1e-10);
            assert!((stats.d[j] - sxx[j][j]).abs() < 1e-10);
        }
        assert!((stats.yty - syy).abs() < 1e-10);

        // Operator product agrees with the materialized cross-products.
        let b = vec![0.7, -1.3];
        let got = stats.xtx.mul(&b);
        for j in 0..p {
            let want: f64 = (0..p).map(|k| sxx[j][k] * b[k]).sum();
            assert!((got[j] - want).abs() < 1e-10);
        }
    }

    #[test]
    fn test_bhat_reconstruction_is_exact() {
        // Per-variable OLS summaries from the toy data must reconstruct the
        // centered sufficient statistics exactly when var_y is supplied.
        let (x, y) = toy();
        let (n, p) = (5, 2);
        let (sxx, sxy, syy) = centered_stats(&x, &y, n, p);
        let nf = n as f64;

        let mut bhat = vec![0.0; p];
        let mut shat = vec![0.0; p];
        for j in 0..p {
            bhat[j] = sxy[j] / sxx[j][j];
            let rss = syy - bhat[j] * sxy[j];
            shat[j] = (rss / ((nf - 2.0) * sxx[j][j])).sqrt();
        }
        let mut r = DenseMatrix::identity(p);
        let r01 = sxx[0][1] / (sxx[0][0] * sxx[1][1]).sqrt();
        r.set(0, 1, r01);
        r.set(1, 0, r01);

        let stats = SufficientStats::from_summary_bhat(
            &bhat,
            &shat,
            r,
            n,
            Some(syy / (nf - 1.0)),
            false,
            0.0,
        );

        for j in 0..p {
            assert!(
                (stats.d[j] - sxx[j][j]).abs() < 1e-8,
                "d[{j}]: {} vs {}",
                stats.d[j],
                sxx[j][j]
            );
            assert!((stats.xty[j] - sxy[j]).abs() < 1e-8);
        }
        assert!((stats.yty - syy).abs() < 1e-8);
        if let XtxOperator::Dense(m) = &stats.xtx {
            assert!((m.get(0, 1) - sxx[0][1]).abs() < 1e-8);
        } else {
            panic!("expected dense operator");
        }
    }

    #[test]
    fn test_z_path_with_n_equals_bhat_unit_se() {
        let z = vec![2.0, -1.0, 0.5];
        let r = DenseMatrix::identity(3);
        let a = SufficientStats::from_summary_z(&z, r.clone(), Some(50), true, 0.0);
        let b = SufficientStats::from_summary_bhat(&z, &[1.0; 3], r, 50, None, true, 0.0);
        for j in 0..3 {
            assert!((a.xty[j] - b.xty[j]).abs() < 1e-12);
            assert!((a.d[j] - b.d[j]).abs() < 1e-12);
        }
        assert!((a.yty - b.yty).abs() < 1e-12);
    }

    #[test]
    fn test_n_free_mode_pins_residual_variance() {
        let z = vec![2.0, -1.0];
        let r = DenseMatrix::identity(2);
        let stats = SufficientStats::from_summary_z(&z, r, None, true, 0.0);
        assert_eq!(stats.fixed_residual_variance, Some(1.0));
        assert_eq!(stats.n, 2);
        assert!((stats.yty - 1.0).abs() < 1e-12);
        assert_eq!(stats.xty, z);
    }

    #[test]
    fn test_correlation_from_operator() {
        let (x, y) = toy();
        let (n, p) = (5, 2);
        let design = DesignMatrix::Dense(DenseMatrix::from_row_major(n, p, &x));
        let stats = SufficientStats::from_individual(design, &y, true);
        let (sxx, _, _) = centered_stats(&x, &y, n, p);
        let want = sxx[0][1] / (sxx[0][0] * sxx[1][1]).sqrt();
        let got = stats.xtx.correlation(0, 1, &stats.d);
        assert!((got - want).abs() < 1e-10);
    }
}
