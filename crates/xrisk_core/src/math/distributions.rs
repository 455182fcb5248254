//! Standard normal distribution helpers backed by statrs.

use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Standard normal CDF Φ(x).
#[inline]
pub fn cumulative_normal(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

/// Standard normal density φ(x).
#[inline]
pub fn normal_density(x: f64) -> f64 {
    Normal::standard().pdf(x)
}

/// Inverse standard normal CDF Φ⁻¹(p).
///
/// Returns `-inf`/`+inf` at `p = 0`/`p = 1`.
///
/// # Examples
///
/// ```
/// use xrisk_core::math::inverse_cumulative_normal;
///
/// assert!((inverse_cumulative_normal(0.975) - 1.959964).abs() < 1e-6);
/// ```
#[inline]
pub fn inverse_cumulative_normal(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    Normal::standard().inverse_cdf(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_cdf_inverse_roundtrip() {
        for p in [0.001, 0.05, 0.5, 0.9, 0.99] {
            assert_abs_diff_eq!(cumulative_normal(inverse_cumulative_normal(p)), p, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_density_at_zero() {
        assert_abs_diff_eq!(
            normal_density(0.0),
            1.0 / (2.0 * std::f64::consts::PI).sqrt(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_bounds() {
        assert!(inverse_cumulative_normal(0.0).is_infinite());
        assert!(inverse_cumulative_normal(1.0).is_sign_positive());
    }
}
