//! Mathematical utility functions.

/// Log-sum-exp over a slice of log-values.
///
/// Returns -infinity for an empty slice or when every entry is -infinity.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Normalize log-weights into probabilities via log-sum-exp.
///
/// When no entry is finite the result is uniform.
pub fn softmax_from_log(log_w: &[f64]) -> Vec<f64> {
    let p = log_w.len();
    let max = log_w.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![1.0 / p as f64; p];
    }
    let unnorm: Vec<f64> = log_w.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = unnorm.iter().sum();
    unnorm.iter().map(|v| v / total).collect()
}

/// Safe division: returns 0 if the denominator is near zero.
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den.abs() > 1e-300 {
        num / den
    } else {
        0.0
    }
}

/// Dot product of two slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Elementwise product of two slices.
pub fn hadamard(a: &[f64], b: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).collect()
}
