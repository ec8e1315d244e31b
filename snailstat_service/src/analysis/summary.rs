//! Descriptive statistics shared by the test engines.
//!
//! Every function here is total: empty input, single samples and
//! degenerate spreads produce zeros rather than NaN or infinities.

/// Floor below which a denominator is treated as zero.
pub const EPSILON: f64 = 1e-12;

/// Arithmetic mean; `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with the n−1 denominator; `0.0` when n < 2.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Sample standard deviation; `0.0` when n < 2.
pub fn sample_sd(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Replaces NaN and ±∞ with `0.0`.
pub fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

/// Rounds to two decimal places for presentation.
pub fn round2(x: f64) -> f64 {
    finite_or_zero((x * 100.0).round() / 100.0)
}

/// `numerator / denominator`, or `0.0` when the denominator is within
/// [`EPSILON`] of zero.
pub fn guarded_div(numerator: f64, denominator: f64) -> f64 {
    if denominator.abs() < EPSILON {
        0.0
    } else {
        finite_or_zero(numerator / denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_sample_variance_uses_n_minus_one() {
        // mean 5, squared deviations 9+1+1+9 = 20, n-1 = 3
        let v = sample_variance(&[2.0, 4.0, 6.0, 8.0]);
        assert!((v - 20.0 / 3.0).abs() < 1e-12, "got {}", v);
    }

    #[test]
    fn test_single_sample_has_zero_spread() {
        assert_eq!(sample_variance(&[10.0]), 0.0);
        assert_eq!(sample_sd(&[10.0]), 0.0);
    }

    #[test]
    fn test_round2_half_cases_and_non_finite() {
        assert_eq!(round2(20.004), 20.0);
        assert_eq!(round2(1.2345), 1.23);
        assert_eq!(round2(-3.333), -3.33);
        assert_eq!(round2(f64::NAN), 0.0);
        assert_eq!(round2(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_guarded_div_zero_denominator() {
        assert_eq!(guarded_div(5.0, 0.0), 0.0);
        assert_eq!(guarded_div(5.0, 1e-15), 0.0);
        assert_eq!(guarded_div(6.0, 3.0), 2.0);
    }
}
