//! Credit curve abstractions for default probability calculations.
//!
//! This module provides:
//! - [`CreditCurve`]: Survival and default probabilities
//! - [`FlatHazardCurve`]: Constant hazard rate
//! - [`HazardRateCurve`]: Piecewise constant hazard rates

use crate::market_data::error::MarketDataError;
use num_traits::Float;

/// Generic credit curve trait.
///
/// # Invariants
///
/// - P(τ > 0) = 1
/// - P(τ > t) is non-increasing in t
pub trait CreditCurve<T: Float>: Send + Sync {
    /// Survival probability P(τ > t).
    fn survival_probability(&self, t: T) -> Result<T, MarketDataError>;

    /// Default probability P(τ ≤ t).
    fn default_probability(&self, t: T) -> Result<T, MarketDataError> {
        Ok(T::one() - self.survival_probability(t)?)
    }

    /// Conditional survival P(τ > t2 | τ > t1).
    fn forward_survival(&self, t1: T, t2: T) -> Result<T, MarketDataError> {
        let s1 = self.survival_probability(t1)?;
        if s1 <= T::zero() {
            return Ok(T::zero());
        }
        Ok(self.survival_probability(t2)? / s1)
    }
}

/// Credit curve with a constant hazard rate.
///
/// ```
/// use xrisk_core::market_data::curves::{CreditCurve, FlatHazardCurve};
///
/// let curve = FlatHazardCurve::new(0.02_f64).unwrap();
/// let s = curve.survival_probability(1.0).unwrap();
/// assert!((s - (-0.02_f64).exp()).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatHazardCurve<T: Float> {
    hazard_rate: T,
}

impl<T: Float> FlatHazardCurve<T> {
    /// Creates a flat hazard curve. The hazard rate must be non-negative.
    pub fn new(hazard_rate: T) -> Result<Self, MarketDataError> {
        if hazard_rate < T::zero() {
            return Err(MarketDataError::InvalidValue {
                index: 0,
                value: hazard_rate.to_f64().unwrap_or(f64::NAN),
            });
        }
        Ok(Self { hazard_rate })
    }

    /// Returns the hazard rate.
    #[inline]
    pub fn hazard_rate(&self) -> T {
        self.hazard_rate
    }
}

impl<T: Float + Send + Sync> CreditCurve<T> for FlatHazardCurve<T> {
    fn survival_probability(&self, t: T) -> Result<T, MarketDataError> {
        if t < T::zero() {
            return Err(MarketDataError::InvalidMaturity {
                t: t.to_f64().unwrap_or(0.0),
            });
        }
        Ok((-self.hazard_rate * t).exp())
    }
}

/// Piecewise constant hazard rate curve.
///
/// `hazard_rates[i]` applies on `(tenors[i-1], tenors[i]]` with `tenors[-1] = 0`;
/// the last rate is extended beyond the last tenor.
#[derive(Debug, Clone)]
pub struct HazardRateCurve<T: Float> {
    tenors: Vec<T>,
    hazard_rates: Vec<T>,
    cumulative: Vec<T>,
}

impl<T: Float> HazardRateCurve<T> {
    /// Builds the curve, validating sorted positive tenors and non-negative hazards.
    pub fn new(tenors: &[T], hazard_rates: &[T]) -> Result<Self, MarketDataError> {
        if tenors.is_empty() {
            return Err(MarketDataError::InsufficientData { got: 0, need: 1 });
        }
        if tenors.len() != hazard_rates.len() {
            return Err(MarketDataError::InsufficientData {
                got: hazard_rates.len(),
                need: tenors.len(),
            });
        }
        let mut cumulative = Vec::with_capacity(tenors.len());
        let mut acc = T::zero();
        let mut prev = T::zero();
        for (i, (&t, &h)) in tenors.iter().zip(hazard_rates.iter()).enumerate() {
            if t <= prev {
                return Err(MarketDataError::UnsortedPillars { index: i });
            }
            if h < T::zero() {
                return Err(MarketDataError::InvalidValue {
                    index: i,
                    value: h.to_f64().unwrap_or(f64::NAN),
                });
            }
            acc = acc + h * (t - prev);
            cumulative.push(acc);
            prev = t;
        }
        Ok(Self {
            tenors: tenors.to_vec(),
            hazard_rates: hazard_rates.to_vec(),
            cumulative,
        })
    }

    fn integrated_hazard(&self, t: T) -> T {
        let idx = self.tenors.partition_point(|&x| x < t);
        if idx == 0 {
            return self.hazard_rates[0] * t;
        }
        let k = idx.min(self.tenors.len()) - 1;
        let rate = self.hazard_rates[(k + 1).min(self.hazard_rates.len() - 1)];
        self.cumulative[k] + rate * (t - self.tenors[k])
    }
}

impl<T: Float + Send + Sync> CreditCurve<T> for HazardRateCurve<T> {
    fn survival_probability(&self, t: T) -> Result<T, MarketDataError> {
        if t < T::zero() {
            return Err(MarketDataError::InvalidMaturity {
                t: t.to_f64().unwrap_or(0.0),
            });
        }
        Ok((-self.integrated_hazard(t)).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_piecewise_integration() {
        let c = HazardRateCurve::new(&[1.0, 2.0], &[0.01, 0.03]).unwrap();
        assert_relative_eq!(
            c.survival_probability(1.0).unwrap(),
            (-0.01_f64).exp(),
            epsilon = 1e-14
        );
        assert_relative_eq!(
            c.survival_probability(1.5).unwrap(),
            (-0.01_f64 - 0.015).exp(),
            epsilon = 1e-14
        );
        // flat extension beyond the last tenor
        assert_relative_eq!(
            c.survival_probability(3.0).unwrap(),
            (-0.01_f64 - 0.03 - 0.03).exp(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_forward_survival() {
        let c = FlatHazardCurve::new(0.05_f64).unwrap();
        assert_relative_eq!(
            c.forward_survival(1.0, 3.0).unwrap(),
            (-0.1_f64).exp(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_negative_hazard_rejected() {
        assert!(FlatHazardCurve::new(-0.01_f64).is_err());
        assert!(HazardRateCurve::new(&[1.0, 2.0], &[0.01, -0.01]).is_err());
    }
}
