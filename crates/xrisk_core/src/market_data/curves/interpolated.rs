//! Interpolated yield curve implementation.

use super::YieldCurve;
use crate::market_data::error::MarketDataError;
use num_traits::Float;

/// Interpolation scheme for [`InterpolatedCurve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurveInterpolation {
    /// Linear in zero rates.
    Linear,
    /// Linear in log discount factors (piecewise flat forwards).
    #[default]
    LogLinear,
}

/// Yield curve interpolated between pillar times.
///
/// Pillars must be strictly positive and strictly increasing. The curve is
/// anchored at `P(0,0) = 1`; beyond the last pillar the zero rate is held flat.
///
/// # Example
///
/// ```
/// use xrisk_core::market_data::curves::{CurveInterpolation, InterpolatedCurve, YieldCurve};
///
/// let times = [1.0_f64, 2.0, 5.0];
/// let dfs = [0.97, 0.94, 0.85];
/// let curve = InterpolatedCurve::from_discount_factors(&times, &dfs, CurveInterpolation::LogLinear).unwrap();
/// assert!((curve.discount_factor(2.0).unwrap() - 0.94).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct InterpolatedCurve<T: Float> {
    times: Vec<T>,
    log_dfs: Vec<T>,
    method: CurveInterpolation,
}

impl<T: Float> InterpolatedCurve<T> {
    /// Builds a curve from zero rates at pillar times.
    pub fn new(
        times: &[T],
        zero_rates: &[T],
        method: CurveInterpolation,
    ) -> Result<Self, MarketDataError> {
        Self::validate(times, zero_rates.len())?;
        let log_dfs = times
            .iter()
            .zip(zero_rates.iter())
            .map(|(&t, &r)| -r * t)
            .collect();
        Ok(Self {
            times: times.to_vec(),
            log_dfs,
            method,
        })
    }

    /// Builds a curve from discount factors at pillar times.
    ///
    /// # Errors
    /// `MarketDataError::InvalidValue` for a non-positive discount factor.
    pub fn from_discount_factors(
        times: &[T],
        dfs: &[T],
        method: CurveInterpolation,
    ) -> Result<Self, MarketDataError> {
        Self::validate(times, dfs.len())?;
        let mut log_dfs = Vec::with_capacity(dfs.len());
        for (index, &df) in dfs.iter().enumerate() {
            if df <= T::zero() || !df.is_finite() {
                return Err(MarketDataError::InvalidValue {
                    index,
                    value: df.to_f64().unwrap_or(f64::NAN),
                });
            }
            log_dfs.push(df.ln());
        }
        Ok(Self {
            times: times.to_vec(),
            log_dfs,
            method,
        })
    }

    fn validate(times: &[T], values: usize) -> Result<(), MarketDataError> {
        if times.is_empty() {
            return Err(MarketDataError::InsufficientData { got: 0, need: 1 });
        }
        if times.len() != values {
            return Err(MarketDataError::InsufficientData {
                got: values,
                need: times.len(),
            });
        }
        for (i, &t) in times.iter().enumerate() {
            if t <= T::zero() {
                return Err(MarketDataError::InvalidMaturity {
                    t: t.to_f64().unwrap_or(0.0),
                });
            }
            if i > 0 && t <= times[i - 1] {
                return Err(MarketDataError::UnsortedPillars { index: i });
            }
        }
        Ok(())
    }

    /// Pillar times.
    #[inline]
    pub fn times(&self) -> &[T] {
        &self.times
    }

    /// Interpolation scheme.
    #[inline]
    pub fn method(&self) -> CurveInterpolation {
        self.method
    }

    fn zero_at_pillar(&self, i: usize) -> T {
        -self.log_dfs[i] / self.times[i]
    }

    fn log_df(&self, t: T) -> T {
        let n = self.times.len();
        let last = n - 1;
        if t >= self.times[last] {
            return self.zero_at_pillar(last) * -t;
        }
        // first index with times[idx] > t
        let idx = self.times.partition_point(|&x| x <= t);
        let (t0, t1) = if idx == 0 {
            (T::zero(), self.times[0])
        } else {
            (self.times[idx - 1], self.times[idx])
        };
        let w = (t - t0) / (t1 - t0);
        match self.method {
            CurveInterpolation::LogLinear => {
                let l0 = if idx == 0 { T::zero() } else { self.log_dfs[idx - 1] };
                let l1 = self.log_dfs[idx];
                l0 + w * (l1 - l0)
            }
            CurveInterpolation::Linear => {
                let z1 = self.zero_at_pillar(idx);
                let z0 = if idx == 0 { z1 } else { self.zero_at_pillar(idx - 1) };
                -(z0 + w * (z1 - z0)) * t
            }
        }
    }
}

impl<T: Float + Send + Sync> YieldCurve<T> for InterpolatedCurve<T> {
    fn discount_factor(&self, t: T) -> Result<T, MarketDataError> {
        if t < T::zero() {
            return Err(MarketDataError::InvalidMaturity {
                t: t.to_f64().unwrap_or(0.0),
            });
        }
        if t == T::zero() {
            return Ok(T::one());
        }
        Ok(self.log_df(t).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reprices_pillars() {
        let times = [0.5, 1.0, 3.0];
        let dfs = [0.99, 0.975, 0.91];
        for method in [CurveInterpolation::Linear, CurveInterpolation::LogLinear] {
            let c = InterpolatedCurve::from_discount_factors(&times, &dfs, method).unwrap();
            for (t, df) in times.iter().zip(dfs.iter()) {
                assert_relative_eq!(c.discount_factor(*t).unwrap(), *df, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_log_linear_flat_forward_between_pillars() {
        let c = InterpolatedCurve::new(&[1.0, 2.0], &[0.02, 0.03], CurveInterpolation::LogLinear)
            .unwrap();
        let f1 = c.forward_rate(1.1, 1.2).unwrap();
        let f2 = c.forward_rate(1.7, 1.9).unwrap();
        assert_relative_eq!(f1, f2, epsilon = 1e-10);
        assert_relative_eq!(f1, 0.04, epsilon = 1e-10);
    }

    #[test]
    fn test_flat_zero_extrapolation() {
        let c = InterpolatedCurve::new(&[1.0, 2.0], &[0.02, 0.03], CurveInterpolation::Linear)
            .unwrap();
        assert_relative_eq!(c.zero_rate(10.0).unwrap(), 0.03, epsilon = 1e-12);
        assert_relative_eq!(c.zero_rate(0.5).unwrap(), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_unsorted_and_non_positive() {
        assert!(matches!(
            InterpolatedCurve::new(&[1.0, 1.0], &[0.0, 0.0], CurveInterpolation::Linear),
            Err(MarketDataError::UnsortedPillars { index: 1 })
        ));
        assert!(InterpolatedCurve::from_discount_factors(
            &[1.0],
            &[-0.5],
            CurveInterpolation::LogLinear
        )
        .is_err());
    }
}
