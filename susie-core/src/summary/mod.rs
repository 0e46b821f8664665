//! Posterior summaries: overall inclusion probabilities, credible sets with
//! the purity filter, and the immutable fit result snapshot.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ibss::{Component, IbssSession, IbssState, SusieConfig};
use crate::sufficient::SufficientStats;

/// Largest number of members over which pairwise purity is evaluated
/// exactly; bigger sets are strided down to this many members.
const PURITY_MAX_MEMBERS: usize = 200;

/// One credible set: the smallest prefix of a component's posterior that
/// reaches the target coverage, kept only if its members are mutually
/// correlated enough to represent one coherent signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibleSet {
    /// Index of the component this set came from.
    pub component: usize,
    /// Member variable indices, by descending inclusion probability.
    pub members: Vec<usize>,
    /// Inclusion probabilities of the members, same order.
    pub probs: Vec<f64>,
    /// Attained coverage (sum of member probabilities).
    pub coverage: f64,
    /// Minimum absolute pairwise correlation among members.
    pub purity: f64,
}

/// Diagnostic flags accumulated during a fit. None of these abort the fit;
/// they qualify how much to trust the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    /// A single-effect update had no finite Bayes factor and fell back to a
    /// uniform inclusion distribution.
    pub degenerate_ser: bool,
    /// The ELBO decreased beyond numerical tolerance (fit stopped early).
    pub elbo_decreased: bool,
    /// Diagonal shrinkage weight applied to repair an indefinite R.
    pub r_shrinkage: f64,
}

/// Immutable snapshot of a completed fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Final per-component posterior states.
    pub components: Vec<Component>,
    /// Overall posterior inclusion probability per variable.
    pub pip: Vec<f64>,
    /// Retained credible sets.
    pub credible_sets: Vec<CredibleSet>,
    /// ELBO history, one entry per outer iteration.
    pub elbo: Vec<f64>,
    /// Whether the ELBO stabilized within tolerance.
    pub converged: bool,
    /// Number of outer iterations performed.
    pub n_iter: usize,
    /// Terminal engine state.
    pub status: IbssState,
    /// Final residual variance.
    pub sigma2: f64,
    /// Diagnostic flags.
    pub diagnostics: Diagnostics,
    column_scale: Vec<f64>,
    column_center: Vec<f64>,
    y_mean: f64,
}

impl FitResult {
    /// Posterior mean effects on the input scale (original data scale for
    /// individual-level input or bhat/shat with known var_y; standardized
    /// scale otherwise).
    pub fn coef(&self) -> Vec<f64> {
        let p = self.pip.len();
        let mut b = vec![0.0; p];
        for comp in &self.components {
            for j in 0..p {
                b[j] += comp.alpha[j] * comp.mu[j];
            }
        }
        for (bj, s) in b.iter_mut().zip(self.column_scale.iter()) {
            *bj /= s;
        }
        b
    }

    /// Fitted intercept (meaningful for the individual-level path only).
    pub fn intercept(&self) -> f64 {
        let coef = self.coef();
        self.y_mean
            - coef
                .iter()
                .zip(self.column_center.iter())
                .map(|(b, c)| b * c)
                .sum::<f64>()
    }
}

/// Overall PIP: probability each variable is included in at least one
/// component, treating components as independent (documented approximation).
/// Components whose prior variance collapsed to null are excluded.
pub fn compute_pip(components: &[Component], prior_tol: f64) -> Vec<f64> {
    let p = match components.first() {
        Some(c) => c.alpha.len(),
        None => return Vec::new(),
    };
    let mut not_included = vec![1.0; p];
    for comp in components {
        if comp.prior_variance <= prior_tol {
            continue;
        }
        for j in 0..p {
            not_included[j] *= 1.0 - comp.alpha[j].clamp(0.0, 1.0);
        }
    }
    not_included
        .iter()
        .map(|&v| (1.0 - v).clamp(0.0, 1.0))
        .collect()
}

/// Smallest prefix of the component's posterior reaching the coverage
/// target. Returns (members, probs, attained coverage).
fn coverage_prefix(alpha: &[f64], coverage: f64) -> (Vec<usize>, Vec<f64>, f64) {
    let mut order: Vec<usize> = (0..alpha.len()).collect();
    // total_cmp keeps the sort total even if a degenerate fit left NaNs in
    // the posterior.
    order.sort_by(|&a, &b| alpha[b].total_cmp(&alpha[a]));
    let mut members = Vec::new();
    let mut probs = Vec::new();
    let mut cum = 0.0;
    for &j in &order {
        members.push(j);
        probs.push(alpha[j]);
        cum += alpha[j];
        if cum >= coverage {
            break;
        }
    }
    (members, probs, cum)
}

/// Minimum absolute pairwise correlation among the member variables.
fn set_purity(members: &[usize], stats: &SufficientStats) -> f64 {
    if members.len() < 2 {
        return 1.0;
    }
    // Deterministic stride subsample for very large candidate sets.
    let subset: Vec<usize> = if members.len() > PURITY_MAX_MEMBERS {
        let stride = members.len().div_ceil(PURITY_MAX_MEMBERS);
        members.iter().step_by(stride).copied().collect()
    } else {
        members.to_vec()
    };
    let mut min_abs = 1.0_f64;
    for (i, &a) in subset.iter().enumerate() {
        for &b in subset.iter().skip(i + 1) {
            let r = stats.xtx.correlation(a, b, &stats.d).abs();
            if r < min_abs {
                min_abs = r;
            }
        }
    }
    min_abs
}

/// Build the retained credible sets: one coverage prefix per live component
/// (null components carry no signal and are skipped), deduplicated, then
/// filtered by purity.
pub fn build_credible_sets(
    components: &[Component],
    stats: &SufficientStats,
    config: &SusieConfig,
) -> Vec<CredibleSet> {
    let mut seen: Vec<Vec<usize>> = Vec::new();
    let mut sets = Vec::new();
    for (l, comp) in components.iter().enumerate() {
        if comp.prior_variance <= config.prior_tol {
            continue;
        }
        let (members, probs, attained) = coverage_prefix(&comp.alpha, config.coverage);
        if members.is_empty() {
            continue;
        }
        let mut key = members.clone();
        key.sort_unstable();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);

        let purity = set_purity(&members, stats);
        if purity < config.min_purity {
            debug!(
                "dropping credible set from component {l}: purity {purity:.3} < {}",
                config.min_purity
            );
            continue;
        }
        sets.push(CredibleSet {
            component: l,
            members,
            probs,
            coverage: attained,
            purity,
        });
    }
    sets
}

/// Freeze a finished session into the result snapshot.
pub fn build_result(session: &IbssSession<'_>, stats: &SufficientStats) -> FitResult {
    let config = session.config();
    let pip = compute_pip(&session.components, config.prior_tol);
    let credible_sets = build_credible_sets(&session.components, stats, config);
    FitResult {
        components: session.components.clone(),
        pip,
        credible_sets,
        elbo: session.elbo_history.clone(),
        converged: session.converged(),
        n_iter: session.n_iter,
        status: session.state,
        sigma2: session.sigma2,
        diagnostics: Diagnostics {
            degenerate_ser: session.degenerate_ser,
            elbo_decreased: session.state == IbssState::Diverged,
            r_shrinkage: stats.r_shrinkage,
        },
        column_scale: stats.column_scale.clone(),
        column_center: stats.column_center.clone(),
        y_mean: stats.y_mean,
    }
}
