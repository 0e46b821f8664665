//! susie-core: Bayesian fine-mapping with the Sum-of-Single-Effects model.
//!
//! Implements the IBSS fitting algorithm over three interchangeable input
//! modes (individual-level data, effect estimates with standard errors and
//! an LD matrix, or z-scores and an LD matrix), posterior inclusion
//! probabilities, and purity-filtered credible sets.

pub mod ibss;
pub mod input;
pub mod ser;
pub mod sufficient;
pub mod summary;
pub mod util;

use anyhow::{bail, Result};

use susie_linalg::{DenseMatrix, DesignMatrix};

pub use ibss::{Component, IbssSession, IbssState, PriorVariance, SusieConfig};
pub use input::{DataInput, InputError};
pub use summary::{CredibleSet, Diagnostics, FitResult};

use sufficient::SufficientStats;

/// Fit from individual-level data: an n x p design matrix (dense or sparse)
/// and an n-vector response.
pub fn fit_from_data(x: DesignMatrix, y: &[f64], config: &SusieConfig) -> Result<FitResult> {
    check_config(config)?;
    let input = DataInput::Individual { x, y: y.to_vec() };
    fit_input(input, config)
}

/// Fit from per-variable effect estimates and standard errors plus an LD
/// matrix. Coefficients come out on the original data scale only when
/// `var_y` is supplied; otherwise on the standardized scale.
pub fn fit_from_bhat(
    bhat: &[f64],
    shat: &[f64],
    r: DenseMatrix,
    n: usize,
    var_y: Option<f64>,
    config: &SusieConfig,
) -> Result<FitResult> {
    check_config(config)?;
    let input = DataInput::SummaryBhat {
        bhat: bhat.to_vec(),
        shat: shat.to_vec(),
        r,
        n,
        var_y,
    };
    fit_input(input, config)
}

/// Fit from z-scores plus an LD matrix. When `n` is omitted the conservative
/// n-free mode is used: the residual variance is pinned at 1 and
/// prior-variance estimation absorbs the effective-sample-size scaling.
pub fn fit_from_z(
    z: &[f64],
    r: DenseMatrix,
    n: Option<usize>,
    config: &SusieConfig,
) -> Result<FitResult> {
    check_config(config)?;
    let input = DataInput::SummaryZ {
        z: z.to_vec(),
        r,
        n,
    };
    fit_input(input, config)
}

/// Fit a validated input: normalize to sufficient statistics, run IBSS,
/// freeze the result.
fn fit_input(input: DataInput, config: &SusieConfig) -> Result<FitResult> {
    let stats = SufficientStats::from_input(input, config.standardize)?;
    let mut session = IbssSession::new(&stats, config);
    session.run();
    Ok(summary::build_result(&session, &stats))
}

fn check_config(config: &SusieConfig) -> Result<()> {
    if config.l == 0 {
        bail!(InputError::NonPositiveL);
    }
    match &config.scaled_prior_variance {
        PriorVariance::Scalar(v) => {
            if !(*v > 0.0) || !v.is_finite() {
                bail!("scaled_prior_variance must be finite and positive, got {v}");
            }
        }
        PriorVariance::PerComponent(vs) => {
            if vs.len() != config.l {
                bail!(
                    "per-component prior variance has length {}, expected L = {}",
                    vs.len(),
                    config.l
                );
            }
            if vs.iter().any(|v| !(*v > 0.0) || !v.is_finite()) {
                bail!("per-component prior variances must be finite and positive");
            }
        }
    }
    if let Some(v) = config.residual_variance {
        if !(v > 0.0) || !v.is_finite() {
            bail!("residual_variance must be finite and positive, got {v}");
        }
    }
    if !(config.coverage > 0.0 && config.coverage <= 1.0) {
        bail!("coverage must lie in (0, 1], got {}", config.coverage);
    }
    if !(0.0..=1.0).contains(&config.min_purity) {
        bail!("min_purity must lie in [0, 1], got {}", config.min_purity);
    }
    if !(config.tol > 0.0) {
        bail!("tol must be positive, got {}", config.tol);
    }
    if config.max_iter == 0 {
        bail!("max_iter must be positive");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_l() {
        let config = SusieConfig {
            l: 0,
            ..Default::default()
        };
        let r = DenseMatrix::identity(2);
        assert!(fit_from_z(&[1.0, 2.0], r, Some(100), &config).is_err());
    }

    #[test]
    fn test_rejects_bad_prior_variance_vector() {
        let config = SusieConfig {
            l: 3,
            scaled_prior_variance: PriorVariance::PerComponent(vec![0.2, 0.2]),
            ..Default::default()
        };
        let r = DenseMatrix::identity(2);
        assert!(fit_from_z(&[1.0, 2.0], r, Some(100), &config).is_err());
    }

    #[test]
    fn test_rejects_bad_coverage() {
        let config = SusieConfig {
            coverage: 1.5,
            ..Default::default()
        };
        let r = DenseMatrix::identity(2);
        assert!(fit_from_z(&[1.0, 2.0], r, Some(100), &config).is_err());
    }

    #[test]
    fn test_constant_response_is_an_error_not_a_panic() {
        let config = SusieConfig::default();
        let n = 20;
        let x: Vec<f64> = (0..n * 2).map(|i| ((i * 7 + 3) as f64 * 0.37).sin()).collect();
        let design = DesignMatrix::Dense(DenseMatrix::from_row_major(n, 2, &x));
        let result = fit_from_data(design, &vec![3.0; n], &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_nonpositive_residual_variance() {
        let config = SusieConfig {
            residual_variance: Some(0.0),
            ..Default::default()
        };
        let r = DenseMatrix::identity(2);
        assert!(fit_from_z(&[1.0, 2.0], r, Some(100), &config).is_err());
    }

    #[test]
    fn test_small_z_fit_runs() {
        let config = SusieConfig {
            l: 2,
            ..Default::default()
        };
        let r = DenseMatrix::identity(3);
        let result = fit_from_z(&[8.0, 0.3, -0.2], r, Some(500), &config).unwrap();
        assert_eq!(result.pip.len(), 3);
        assert!(result.pip[0] > 0.9, "pip = {:?}", result.pip);
        assert!(result.n_iter > 0);
    }
}
