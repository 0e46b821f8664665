//! Single-effect regression (SER): the Bayesian regression of a residual on
//! every candidate variable, assuming exactly one of them is causal.
//!
//! Given the residual statistic Xtr (the Xty-equivalent with every other
//! component's contribution removed), the per-variable evidence is the
//! closed-form Bayes factor of a normal-prior single-variable regression:
//!
//!   betahat_j = Xtr_j / d_j,   shat2_j = sigma2 / d_j
//!   lbf_j = ln N(betahat_j; 0, v0 + shat2_j) - ln N(betahat_j; 0, shat2_j)
//!
//! The inclusion distribution alpha is the log-sum-exp softmax of lbf over
//! uniform prior weights; posterior moments of the effect conditional on
//! inclusion follow in closed form. The per-variable loop only reads shared
//! state, so it is parallelized across variables.

use rayon::prelude::*;
use statrs::distribution::{Continuous, Normal};

use crate::util::math::{log_sum_exp, softmax_from_log};

/// Lower/upper bounds of the ln(v0) search interval.
const LN_V0_LO: f64 = -30.0;
const LN_V0_HI: f64 = 15.0;

/// Posterior of one single-effect component after an SER update.
#[derive(Debug, Clone)]
pub struct SerResult {
    /// Posterior inclusion probabilities, summing to 1.
    pub alpha: Vec<f64>,
    /// Posterior mean effect conditional on inclusion.
    pub mu: Vec<f64>,
    /// Posterior second moment conditional on inclusion.
    pub mu2: Vec<f64>,
    /// Per-variable log Bayes factors.
    pub lbf: Vec<f64>,
    /// Component-level log Bayes factor: logsumexp(lbf + ln w).
    pub lbf_model: f64,
    /// Prior effect variance used (possibly re-estimated).
    pub prior_variance: f64,
    /// Set when every log Bayes factor was non-finite and alpha fell back to
    /// uniform.
    pub degenerate: bool,
}

/// Log Bayes factor for one variable. Zero-variance columns (d = 0) and a
/// point-mass prior (v0 = 0) both carry no evidence.
fn log_bayes_factor(betahat: f64, shat2: f64, v0: f64) -> f64 {
    if !shat2.is_finite() || shat2 <= 0.0 || v0 <= 0.0 {
        return 0.0;
    }
    let alt = Normal::new(0.0, (v0 + shat2).sqrt()).unwrap();
    let null = Normal::new(0.0, shat2.sqrt()).unwrap();
    alt.ln_pdf(betahat) - null.ln_pdf(betahat)
}

/// Component-level log Bayes factor for a candidate prior variance.
fn lbf_model_for(betahat: &[f64], shat2: &[f64], v0: f64) -> f64 {
    let p = betahat.len();
    let lbf: Vec<f64> = betahat
        .iter()
        .zip(shat2.iter())
        .map(|(&b, &s2)| log_bayes_factor(b, s2, v0))
        .collect();
    log_sum_exp(&lbf) - (p as f64).ln()
}

/// Golden-section maximization of the component marginal likelihood over
/// ln(v0), with a null check that snaps v0 to 0 when the point-mass prior is
/// at least as good as the optimum.
fn optimize_prior_variance(betahat: &[f64], shat2: &[f64], v0_init: f64) -> f64 {
    const INV_PHI: f64 = 0.618_033_988_749_895;
    let (mut a, mut b) = (LN_V0_LO, LN_V0_HI);
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = lbf_model_for(betahat, shat2, c.exp());
    let mut fd = lbf_model_for(betahat, shat2, d.exp());
    while (b - a) > 1e-6 {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = lbf_model_for(betahat, shat2, c.exp());
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = lbf_model_for(betahat, shat2, d.exp());
        }
    }
    let v_opt = (0.5 * (a + b)).exp();
    let f_opt = lbf_model_for(betahat, shat2, v_opt);
    let f_init = lbf_model_for(betahat, shat2, v0_init);
    let best = if f_init > f_opt { v0_init } else { v_opt };
    let f_best = f_init.max(f_opt);
    // lbf_model(0) is exactly 0; prefer the null when nothing beats it.
    if f_best <= 0.0 {
        0.0
    } else {
        best
    }
}

/// Fit one single-effect regression on a residual statistic.
///
/// `xtr` is the Xty-equivalent of the residual, `d` is diag(XtX), `sigma2`
/// the residual variance, `v0` the prior effect variance. When
/// `estimate_prior_variance` is set, `v0` is re-estimated by maximizing the
/// component marginal likelihood before the posterior is formed.
pub fn fit_single_effect(
    xtr: &[f64],
    d: &[f64],
    sigma2: f64,
    v0: f64,
    estimate_prior_variance: bool,
) -> SerResult {
    let p = xtr.len();
    assert_eq!(d.len(), p);
    assert!(sigma2 > 0.0, "residual variance must be positive");

    let betahat: Vec<f64> = xtr
        .iter()
        .zip(d.iter())
        .map(|(&x, &dj)| if dj > 0.0 { x / dj } else { 0.0 })
        .collect();
    let shat2: Vec<f64> = d
        .iter()
        .map(|&dj| if dj > 0.0 { sigma2 / dj } else { f64::INFINITY })
        .collect();

    let v0 = if estimate_prior_variance {
        optimize_prior_variance(&betahat, &shat2, v0)
    } else {
        v0
    };

    let lbf: Vec<f64> = betahat
        .par_iter()
        .zip(shat2.par_iter())
        .map(|(&b, &s2)| log_bayes_factor(b, s2, v0))
        .collect();

    let degenerate = lbf.iter().all(|v| !v.is_finite());
    let alpha = softmax_from_log(&lbf);
    let lbf_model = log_sum_exp(&lbf) - (p as f64).ln();

    let mut mu = vec![0.0; p];
    let mut mu2 = vec![0.0; p];
    if v0 > 0.0 {
        for j in 0..p {
            let post_var = 1.0 / (1.0 / v0 + d[j] / sigma2);
            mu[j] = post_var * xtr[j] / sigma2;
            mu2[j] = mu[j] * mu[j] + post_var;
        }
    }

    SerResult {
        alpha,
        mu,
        mu2,
        lbf,
        lbf_model,
        prior_variance: v0,
        degenerate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_sums_to_one() {
        let xtr = vec![5.0, -1.0, 0.3, 12.0];
        let d = vec![10.0, 10.0, 10.0, 10.0];
        let res = fit_single_effect(&xtr, &d, 1.0, 0.2, false);
        let total: f64 = res.alpha.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_strongest_signal_dominates() {
        let xtr = vec![0.1, 30.0, -0.2];
        let d = vec![50.0, 50.0, 50.0];
        let res = fit_single_effect(&xtr, &d, 1.0, 0.2, false);
        assert!(res.alpha[1] > 0.9, "alpha = {:?}", res.alpha);
        // Posterior mean shrinks toward betahat = 0.6.
        assert!(res.mu[1] > 0.0 && res.mu[1] < 0.6 + 1e-12);
    }

    #[test]
    fn test_zero_variance_column_carries_no_evidence() {
        let xtr = vec![5.0, 0.0];
        let d = vec![10.0, 0.0];
        let res = fit_single_effect(&xtr, &d, 1.0, 0.2, false);
        assert_eq!(res.lbf[1], 0.0);
        assert!(res.alpha[0] > res.alpha[1]);
        let total: f64 = res.alpha.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_residual_gives_uniform_alpha() {
        let xtr = vec![0.0; 4];
        let d = vec![10.0; 4];
        let res = fit_single_effect(&xtr, &d, 1.0, 0.2, false);
        for &a in &res.alpha {
            assert!((a - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_prior_variance_estimation_finds_signal() {
        // betahat = 1 with tiny standard error: the optimum must be well
        // above zero and roughly match the squared effect.
        let xtr = vec![1000.0, 2.0, -3.0];
        let d = vec![1000.0, 1000.0, 1000.0];
        let res = fit_single_effect(&xtr, &d, 1.0, 0.2, true);
        assert!(res.prior_variance > 0.1, "v0 = {}", res.prior_variance);
        assert!(res.alpha[0] > 0.99);
    }

    #[test]
    fn test_prior_variance_snaps_to_null_without_signal() {
        let xtr = vec![0.01, -0.02, 0.005];
        let d = vec![1000.0, 1000.0, 1000.0];
        let res = fit_single_effect(&xtr, &d, 1.0, 0.2, true);
        assert_eq!(res.prior_variance, 0.0);
        // Null component: uniform alpha, zero posterior moments.
        for &a in &res.alpha {
            assert!((a - 1.0 / 3.0).abs() < 1e-12);
        }
        assert!(res.mu.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_lbf_model_zero_at_null() {
        let betahat = vec![0.5, -0.2];
        let shat2 = vec![0.1, 0.1];
        assert!((lbf_model_for(&betahat, &shat2, 0.0)).abs() < 1e-12);
    }
}
