//! Iterative Bayesian Stepwise Selection (IBSS) over the Sum-of-Single-Effects
//! model.
//!
//! The engine sweeps L single-effect components in order (Gauss-Seidel: each
//! update is visible to the components that follow it in the same sweep).
//! For component l the contribution of every other component is removed from
//! the Xty-equivalent by exact algebraic subtraction, the single-effect
//! regression is re-fit on the remainder, and the component's posterior is
//! overwritten in place. After a full sweep the residual variance is
//! re-estimated (single writer, once per sweep) and the evidence lower bound
//! is appended to the history; the ELBO must be non-decreasing, and a
//! decrease beyond numerical tolerance is surfaced as a fault rather than
//! ignored.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ser::fit_single_effect;
use crate::sufficient::SufficientStats;
use crate::util::math::{dot, hadamard};

/// Prior effect variance, scaled relative to the phenotype variance.
#[derive(Debug, Clone)]
pub enum PriorVariance {
    /// One value shared by all components.
    Scalar(f64),
    /// One value per component (length must equal L).
    PerComponent(Vec<f64>),
}

/// Configuration for a SuSiE fit.
#[derive(Debug, Clone)]
pub struct SusieConfig {
    /// Maximum number of causal signals modeled (L); capped at the number of
    /// variables.
    pub l: usize,
    /// Prior effect variance as a fraction of the phenotype variance.
    pub scaled_prior_variance: PriorVariance,
    /// Initial residual variance; defaults to the phenotype variance seed.
    pub residual_variance: Option<f64>,
    /// Re-estimate each component's prior variance every update.
    pub estimate_prior_variance: bool,
    /// Re-estimate the residual variance after each sweep. Ignored in the
    /// n-free z-score mode, which keeps the residual variance pinned.
    pub estimate_residual_variance: bool,
    /// Standardize columns to unit variance before fitting.
    pub standardize: bool,
    /// Credible set target coverage.
    pub coverage: f64,
    /// Minimum absolute pairwise correlation for a credible set to be kept.
    pub min_purity: f64,
    /// ELBO convergence tolerance.
    pub tol: f64,
    /// Maximum number of outer iterations.
    pub max_iter: usize,
    /// Components with prior variance at or below this are treated as null.
    pub prior_tol: f64,
}

impl Default for SusieConfig {
    fn default() -> Self {
        Self {
            l: 10,
            scaled_prior_variance: PriorVariance::Scalar(0.2),
            residual_variance: None,
            estimate_prior_variance: true,
            estimate_residual_variance: true,
            standardize: true,
            coverage: 0.95,
            min_purity: 0.5,
            tol: 1e-3,
            max_iter: 100,
            prior_tol: 1e-9,
        }
    }
}

/// One single-effect component's posterior state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// Posterior inclusion probabilities over the p variables (sums to 1).
    pub alpha: Vec<f64>,
    /// Posterior mean effect conditional on inclusion.
    pub mu: Vec<f64>,
    /// Posterior second moment conditional on inclusion.
    pub mu2: Vec<f64>,
    /// Prior effect variance for this component.
    pub prior_variance: f64,
    /// Component-level log Bayes factor from the last update.
    pub lbf_model: f64,
}

impl Component {
    fn flat(p: usize, prior_variance: f64) -> Self {
        Self {
            alpha: vec![1.0 / p as f64; p],
            mu: vec![0.0; p],
            mu2: vec![0.0; p],
            prior_variance,
            lbf_model: 0.0,
        }
    }

    /// Expected effect vector alpha .* mu.
    pub fn expected_effects(&self) -> Vec<f64> {
        hadamard(&self.alpha, &self.mu)
    }
}

/// Fit progression states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IbssState {
    Initialized,
    Iterating,
    Converged,
    MaxIterationsReached,
    /// The ELBO decreased beyond numerical tolerance: a numerical fault,
    /// surfaced on the result while the best available estimate is kept.
    Diverged,
}

/// All mutable state of one fit. Owned by the session, never process-wide,
/// so independent fits share nothing.
pub struct IbssSession<'a> {
    stats: &'a SufficientStats,
    config: &'a SusieConfig,
    /// Effective number of components: min(L, p).
    l: usize,
    pub components: Vec<Component>,
    /// Residual variance, updated once per sweep.
    pub sigma2: f64,
    /// Append-only ELBO history.
    pub elbo_history: Vec<f64>,
    pub state: IbssState,
    /// Cached XtX * (alpha_l .* mu_l) per component.
    xtx_b: Vec<Vec<f64>>,
    /// Sum of the cached products: XtX * bbar.
    xtxr: Vec<f64>,
    /// Per-component KL terms from the last sweep.
    kl: Vec<f64>,
    estimate_prior_variance: bool,
    estimate_residual_variance: bool,
    pub degenerate_ser: bool,
    pub n_iter: usize,
}

impl<'a> IbssSession<'a> {
    /// Set up a fit: flat components, seeded residual variance.
    pub fn new(stats: &'a SufficientStats, config: &'a SusieConfig) -> Self {
        let p = stats.n_variables();
        // More components than variables cannot carry distinct signals.
        let l = config.l.min(p);

        let prior: Vec<f64> = match &config.scaled_prior_variance {
            PriorVariance::Scalar(v) => vec![v * stats.var_y; l],
            PriorVariance::PerComponent(vs) => {
                assert_eq!(vs.len(), config.l, "per-component prior variance length");
                vs.iter().take(l).map(|v| v * stats.var_y).collect()
            }
        };
        let components: Vec<Component> = prior.iter().map(|&v| Component::flat(p, v)).collect();

        // The n-free z-score mode pins the residual variance and relies on
        // prior-variance estimation to absorb the unknown scaling.
        let sigma2 = stats
            .fixed_residual_variance
            .or(config.residual_variance)
            .unwrap_or(stats.var_y);
        let estimate_residual_variance =
            config.estimate_residual_variance && stats.fixed_residual_variance.is_none();
        let estimate_prior_variance =
            config.estimate_prior_variance || stats.fixed_residual_variance.is_some();

        Self {
            stats,
            config,
            l,
            components,
            sigma2,
            elbo_history: Vec::new(),
            state: IbssState::Initialized,
            xtx_b: vec![vec![0.0; p]; l],
            xtxr: vec![0.0; p],
            kl: vec![0.0; l],
            estimate_prior_variance,
            estimate_residual_variance,
            degenerate_ser: false,
            n_iter: 0,
        }
    }

    /// One outer iteration: sweep all components, evaluate the ELBO, then
    /// (single writer) update the residual variance. Returns the new state.
    pub fn step(&mut self) -> IbssState {
        match self.state {
            IbssState::Initialized | IbssState::Iterating => {}
            terminal => return terminal,
        }
        self.sweep();
        let elbo = self.compute_elbo();

        let new_state = match self.elbo_history.last() {
            Some(&prev) if elbo - prev < -1e-8 * (1.0 + elbo.abs()) => {
                warn!(
                    "ELBO decreased from {prev:.6} to {elbo:.6} at iteration {}",
                    self.n_iter + 1
                );
                IbssState::Diverged
            }
            Some(&prev) if elbo - prev < self.config.tol => IbssState::Converged,
            _ => IbssState::Iterating,
        };
        self.elbo_history.push(elbo);
        self.n_iter += 1;
        debug!("IBSS iter {}: elbo={elbo:.6}, sigma2={:.6}", self.n_iter, self.sigma2);

        if new_state == IbssState::Iterating && self.estimate_residual_variance {
            self.sigma2 = (self.erss() / self.stats.n as f64).max(1e-12);
        }
        self.state = new_state;
        new_state
    }

    /// Run to a terminal state.
    pub fn run(&mut self) -> IbssState {
        info!(
            "Starting IBSS with p={}, n={}, L={}",
            self.stats.n_variables(),
            self.stats.n,
            self.l
        );
        loop {
            let state = self.step();
            match state {
                IbssState::Converged => {
                    info!("IBSS converged after {} iterations", self.n_iter);
                    return state;
                }
                IbssState::Diverged => return state,
                IbssState::Iterating | IbssState::Initialized => {
                    if self.n_iter >= self.config.max_iter {
                        warn!("IBSS did not converge after {} iterations", self.n_iter);
                        self.state = IbssState::MaxIterationsReached;
                        return self.state;
                    }
                }
                IbssState::MaxIterationsReached => return state,
            }
        }
    }

    /// Gauss-Seidel sweep over the L components.
    fn sweep(&mut self) {
        let p = self.stats.n_variables();
        for l in 0..self.l {
            // Partial residual: remove every other component's contribution
            // by exact subtraction.
            let mut xtr = vec![0.0; p];
            for j in 0..p {
                xtr[j] = self.stats.xty[j] - self.xtxr[j] + self.xtx_b[l][j];
            }

            let ser = fit_single_effect(
                &xtr,
                &self.stats.d,
                self.sigma2,
                self.components[l].prior_variance,
                self.estimate_prior_variance,
            );
            if ser.degenerate {
                self.degenerate_ser = true;
            }

            let comp = &mut self.components[l];
            comp.alpha = ser.alpha;
            comp.mu = ser.mu;
            comp.mu2 = ser.mu2;
            comp.prior_variance = ser.prior_variance;
            comp.lbf_model = ser.lbf_model;

            let b_l = self.components[l].expected_effects();
            let e_b2 = hadamard(&self.components[l].alpha, &self.components[l].mu2);
            self.kl[l] = -ser.lbf_model
                + (2.0 * dot(&b_l, &xtr) - dot(&self.stats.d, &e_b2)) / (2.0 * self.sigma2);

            // Refresh the cached product; later components in this sweep see
            // the update immediately.
            let new_prod = self.stats.xtx.mul(&b_l);
            for j in 0..p {
                self.xtxr[j] += new_prod[j] - self.xtx_b[l][j];
            }
            self.xtx_b[l] = new_prod;
        }
    }

    /// Expected residual sum of squares under the full posterior.
    fn erss(&self) -> f64 {
        let bbar = self.overall_effects();
        let mut erss = self.stats.yty - 2.0 * dot(&bbar, &self.stats.xty) + dot(&bbar, &self.xtxr);
        for l in 0..self.l {
            let comp = &self.components[l];
            let b_l = comp.expected_effects();
            let e_b2 = hadamard(&comp.alpha, &comp.mu2);
            erss += dot(&self.stats.d, &e_b2) - dot(&b_l, &self.xtx_b[l]);
        }
        erss.max(0.0)
    }

    /// Evidence lower bound with the current posterior and residual variance.
    fn compute_elbo(&self) -> f64 {
        let n = self.stats.n as f64;
        let kl_total: f64 = self.kl.iter().sum();
        -0.5 * n * (2.0 * std::f64::consts::PI * self.sigma2).ln()
            - 0.5 * self.erss() / self.sigma2
            - kl_total
    }

    /// Sum of expected effects over all components.
    pub fn overall_effects(&self) -> Vec<f64> {
        let p = self.stats.n_variables();
        let mut b = vec![0.0; p];
        for comp in &self.components {
            for (bj, ej) in b.iter_mut().zip(comp.expected_effects()) {
                *bj += ej;
            }
        }
        b
    }

    pub fn converged(&self) -> bool {
        self.state == IbssState::Converged
    }

    pub fn config(&self) -> &SusieConfig {
        self.config
    }
}
