//! Input representations and validation.
//!
//! Three input modes are accepted and dispatched once at entry:
//! individual-level data (design matrix + response), effect estimates with
//! standard errors plus an LD/correlation matrix, and plain z-scores plus a
//! correlation matrix. Validation failures abort before any fitting;
//! indefiniteness of the correlation matrix is the one defect that is
//! repaired (by diagonal shrinkage) rather than rejected, and the applied
//! shrinkage is surfaced as a diagnostic.

use thiserror::Error;

use susie_linalg::decomposition::shrink_to_semi_pd;
use susie_linalg::{DenseMatrix, DesignMatrix};

/// Validation errors reported before a fit is attempted.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("R is not a valid correlation matrix: {reason}")]
    InvalidCorrelationMatrix { reason: String },

    #[error("standard errors must be strictly positive (shat[{index}] = {value})")]
    NonPositiveStandardError { index: usize, value: f64 },

    #[error("sample size must be at least 2, got {n}")]
    SampleSizeTooSmall { n: usize },

    #[error("number of effects L must be positive")]
    NonPositiveL,

    #[error("{what} must be finite and positive, got {value}")]
    NonPositiveScalar { what: &'static str, value: f64 },

    #[error("response vector must contain at least 2 observations, got {n}")]
    TooFewObservations { n: usize },

    #[error("response vector has zero variance; no residual variance can be estimated")]
    ConstantResponse,

    #[error("{what} contains a non-finite value")]
    NonFiniteValue { what: &'static str },
}

fn require_finite(values: &[f64], what: &'static str) -> Result<(), InputError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(InputError::NonFiniteValue { what });
    }
    Ok(())
}

/// The three accepted input modes.
pub enum DataInput {
    /// Individual-level data: n x p design matrix and n response values.
    Individual { x: DesignMatrix, y: Vec<f64> },
    /// Effect estimates, standard errors, LD matrix, sample size, optional
    /// phenotype variance.
    SummaryBhat {
        bhat: Vec<f64>,
        shat: Vec<f64>,
        r: DenseMatrix,
        n: usize,
        var_y: Option<f64>,
    },
    /// z-scores and LD matrix; the sample size is optional (its absence
    /// selects the conservative n-free mode).
    SummaryZ {
        z: Vec<f64>,
        r: DenseMatrix,
        n: Option<usize>,
    },
}

/// Check shape, symmetry, unit diagonal, and entry range of a correlation
/// matrix, then repair indefiniteness by diagonal shrinkage.
///
/// Returns the shrinkage weight applied (0.0 when R was already PSD).
pub fn validate_correlation_matrix(r: &mut DenseMatrix, p: usize) -> Result<f64, InputError> {
    if r.nrows() != p || r.ncols() != p {
        return Err(InputError::DimensionMismatch {
            what: "R",
            expected: p,
            got: r.nrows().max(r.ncols()),
        });
    }
    const TOL: f64 = 1e-8;
    for i in 0..p {
        let d = r.get(i, i);
        if !d.is_finite() || (d - 1.0).abs() > TOL {
            return Err(InputError::InvalidCorrelationMatrix {
                reason: format!("diagonal entry {i} is {d}, expected 1"),
            });
        }
        for j in (i + 1)..p {
            let a = r.get(i, j);
            let b = r.get(j, i);
            if (a - b).abs() > TOL {
                return Err(InputError::InvalidCorrelationMatrix {
                    reason: format!("asymmetric at ({i},{j}): {a} vs {b}"),
                });
            }
            if a.abs() > 1.0 + TOL || !a.is_finite() {
                return Err(InputError::InvalidCorrelationMatrix {
                    reason: format!("entry ({i},{j}) = {a} outside [-1, 1]"),
                });
            }
        }
    }
    // Exact symmetry downstream; shrink toward the identity if indefinite.
    r.symmetrize();
    Ok(shrink_to_semi_pd(r))
}

/// Validate an input variant. Returns the PSD shrinkage weight applied to R
/// (0.0 for individual-level data).
pub fn validate(input: &mut DataInput) -> Result<f64, InputError> {
    match input {
        DataInput::Individual { x, y } => {
            let n = x.nrows();
            if n < 2 {
                return Err(InputError::TooFewObservations { n });
            }
            if y.len() != n {
                return Err(InputError::DimensionMismatch {
                    what: "y",
                    expected: n,
                    got: y.len(),
                });
            }
            require_finite(y, "y")?;
            let mean = y.iter().sum::<f64>() / n as f64;
            let ss: f64 = y.iter().map(|v| (v - mean) * (v - mean)).sum();
            if !(ss > 0.0) {
                return Err(InputError::ConstantResponse);
            }
            // One pass over the stored entries: a NaN anywhere in a column
            // surfaces in that column's moments.
            for j in 0..x.ncols() {
                if !x.col_sum(j).is_finite() || !x.col_sq_sum(j).is_finite() {
                    return Err(InputError::NonFiniteValue { what: "X" });
                }
            }
            Ok(0.0)
        }
        DataInput::SummaryBhat {
            bhat,
            shat,
            r,
            n,
            var_y,
        } => {
            let p = bhat.len();
            if shat.len() != p {
                return Err(InputError::DimensionMismatch {
                    what: "shat",
                    expected: p,
                    got: shat.len(),
                });
            }
            require_finite(bhat, "bhat")?;
            for (i, &s) in shat.iter().enumerate() {
                if !(s > 0.0) || !s.is_finite() {
                    return Err(InputError::NonPositiveStandardError { index: i, value: s });
                }
            }
            if *n < 2 {
                return Err(InputError::SampleSizeTooSmall { n: *n });
            }
            if let Some(v) = var_y {
                if !(*v > 0.0) || !v.is_finite() {
                    return Err(InputError::NonPositiveScalar {
                        what: "var_y",
                        value: *v,
                    });
                }
            }
            validate_correlation_matrix(r, p)
        }
        DataInput::SummaryZ { z, r, n } => {
            let p = z.len();
            require_finite(z, "z")?;
            if let Some(n) = n {
                if *n < 2 {
                    return Err(InputError::SampleSizeTooSmall { n: *n });
                }
            }
            validate_correlation_matrix(r, p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_r(p: usize) -> DenseMatrix {
        DenseMatrix::identity(p)
    }

    #[test]
    fn test_valid_bhat_input() {
        let mut input = DataInput::SummaryBhat {
            bhat: vec![0.1, -0.2],
            shat: vec![0.05, 0.05],
            r: identity_r(2),
            n: 100,
            var_y: Some(1.0),
        };
        assert_eq!(validate(&mut input).unwrap(), 0.0);
    }

    #[test]
    fn test_rejects_mismatched_shat() {
        let mut input = DataInput::SummaryBhat {
            bhat: vec![0.1, -0.2],
            shat: vec![0.05],
            r: identity_r(2),
            n: 100,
            var_y: None,
        };
        assert!(matches!(
            validate(&mut input),
            Err(InputError::DimensionMismatch { what: "shat", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_diagonal() {
        let mut r = identity_r(2);
        r.set(0, 0, 0.9);
        let mut input = DataInput::SummaryZ {
            z: vec![1.0, 2.0],
            r,
            n: Some(50),
        };
        assert!(matches!(
            validate(&mut input),
            Err(InputError::InvalidCorrelationMatrix { .. })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_entry() {
        let mut r = identity_r(2);
        r.set(0, 1, 1.5);
        r.set(1, 0, 1.5);
        let mut input = DataInput::SummaryZ {
            z: vec![1.0, 2.0],
            r,
            n: None,
        };
        assert!(validate(&mut input).is_err());
    }

    #[test]
    fn test_rejects_small_n() {
        let mut input = DataInput::SummaryBhat {
            bhat: vec![0.1],
            shat: vec![0.05],
            r: identity_r(1),
            n: 1,
            var_y: None,
        };
        assert!(matches!(
            validate(&mut input),
            Err(InputError::SampleSizeTooSmall { n: 1 })
        ));
    }

    #[test]
    fn test_rejects_constant_response() {
        let x = DesignMatrix::Dense(DenseMatrix::from_row_major(
            3,
            2,
            &[1.0, 0.5, 2.0, 1.5, 0.0, 1.0],
        ));
        let mut input = DataInput::Individual {
            x,
            y: vec![3.0; 3],
        };
        assert!(matches!(
            validate(&mut input),
            Err(InputError::ConstantResponse)
        ));
    }

    #[test]
    fn test_rejects_non_finite_z() {
        let mut input = DataInput::SummaryZ {
            z: vec![1.0, f64::NAN],
            r: identity_r(2),
            n: Some(50),
        };
        assert!(matches!(
            validate(&mut input),
            Err(InputError::NonFiniteValue { what: "z" })
        ));
    }

    #[test]
    fn test_rejects_non_finite_bhat() {
        let mut input = DataInput::SummaryBhat {
            bhat: vec![0.1, f64::INFINITY],
            shat: vec![0.05, 0.05],
            r: identity_r(2),
            n: 100,
            var_y: None,
        };
        assert!(matches!(
            validate(&mut input),
            Err(InputError::NonFiniteValue { what: "bhat" })
        ));
    }

    #[test]
    fn test_rejects_non_finite_response_and_design() {
        let x = DesignMatrix::Dense(DenseMatrix::from_row_major(
            3,
            2,
            &[1.0, 0.5, 2.0, 1.5, 0.0, 1.0],
        ));
        let mut input = DataInput::Individual {
            x: x.clone(),
            y: vec![1.0, f64::NAN, 2.0],
        };
        assert!(matches!(
            validate(&mut input),
            Err(InputError::NonFiniteValue { what: "y" })
        ));

        let bad_x = DesignMatrix::Dense(DenseMatrix::from_row_major(
            3,
            2,
            &[1.0, 0.5, f64::NAN, 1.5, 0.0, 1.0],
        ));
        let mut input = DataInput::Individual {
            x: bad_x,
            y: vec![1.0, 0.5, 2.0],
        };
        assert!(matches!(
            validate(&mut input),
            Err(InputError::NonFiniteValue { what: "X" })
        ));
    }

    #[test]
    fn test_rejects_nan_diagonal() {
        let mut r = identity_r(2);
        r.set(1, 1, f64::NAN);
        let mut input = DataInput::SummaryZ {
            z: vec![1.0, 2.0],
            r,
            n: Some(50),
        };
        assert!(matches!(
            validate(&mut input),
            Err(InputError::InvalidCorrelationMatrix { .. })
        ));
    }

    #[test]
    fn test_shrinks_indefinite_r() {
        // |r| = 1 off-diagonals in a 3x3 pattern that cannot be a correlation
        // matrix of any real data.
        let mut r = DenseMatrix::from_row_major(
            3,
            3,
            &[1.0, 1.0, -1.0, 1.0, 1.0, 1.0, -1.0, 1.0, 1.0],
        );
        let w = validate_correlation_matrix(&mut r, 3).unwrap();
        assert!(w > 0.0);
    }
}
