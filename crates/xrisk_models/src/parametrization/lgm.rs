//! Linear Gauss Markov (LGM) interest-rate parametrizations.
//!
//! The LGM state `z` is driftless in its own measure with `dz = α(t) dW`,
//! `ζ(t) = ∫₀ᵗ α²`, and zero bonds
//!
//! ```text
//! P(t,T) = P(0,T)/P(0,t) · exp(-(H(T) - H(t)) z - ½ (H(T)² - H(t)²) ζ(t))
//! ```
//!
//! Scaling `s` and shift `c` are the model invariances
//! `H → s·H + c`, `ζ → ζ/s²`, `α → α/s`.

use std::fmt;

use super::piecewise::PiecewiseConstant;
use super::{require_non_negative, YieldTermStructure};
use crate::error::ModelError;

/// Below this absolute mean reversion `H` switches to its linear limit.
pub const ZERO_KAPPA_CUTOFF: f64 = 1.0e-6;

/// LGM parametrization of one currency.
pub trait IrLgmParametrization: Send + Sync + fmt::Debug {
    /// Currency code.
    fn currency(&self) -> &str;

    /// Initial discount curve.
    fn term_structure(&self) -> &YieldTermStructure;

    /// ζ(t) = ∫₀ᵗ α(s)² ds, non-decreasing with ζ(0) = 0.
    fn zeta(&self, t: f64) -> f64;

    /// α(t), with ζ'(t) = α(t)².
    fn alpha(&self, t: f64) -> f64;

    /// H(t).
    fn h(&self, t: f64) -> f64;

    /// H'(t).
    fn h_prime(&self, t: f64) -> f64;

    /// H''(t).
    fn h_prime2(&self, t: f64) -> f64;

    /// Scaling invariance parameter (> 0).
    fn scaling(&self) -> f64;

    /// Shift invariance parameter.
    fn shift(&self) -> f64;

    /// Times at which α or H are not smooth.
    fn breakpoints(&self) -> &[f64] {
        &[]
    }

    /// Equivalent Hull-White mean reversion `-H''/H'`.
    fn kappa(&self, t: f64) -> f64 {
        -self.h_prime2(t) / self.h_prime(t)
    }

    /// Equivalent Hull-White volatility `H'·α`.
    fn hull_white_sigma(&self, t: f64) -> f64 {
        self.h_prime(t) * self.alpha(t)
    }
}

/// Unscaled `(H, H', H'')` for constant mean reversion.
fn h_shape(kappa: f64, t: f64) -> (f64, f64, f64) {
    if kappa.abs() < ZERO_KAPPA_CUTOFF {
        (t, 1.0, 0.0)
    } else {
        let e = (-kappa * t).exp();
        ((1.0 - e) / kappa, e, -kappa * e)
    }
}

fn validate_invariances(currency: &str, kappa: f64, scaling: f64, shift: f64) -> Result<(), ModelError> {
    if !kappa.is_finite() {
        return Err(ModelError::config(currency, format!("kappa must be finite, got {kappa}")));
    }
    if !(scaling > 0.0) || !scaling.is_finite() {
        return Err(ModelError::config(
            currency,
            format!("scaling must be positive, got {scaling}"),
        ));
    }
    if !shift.is_finite() {
        return Err(ModelError::config(currency, format!("shift must be finite, got {shift}")));
    }
    Ok(())
}

/// LGM with constant α and constant mean reversion κ.
///
/// `H(t) = s·(1 - e^{-κt})/κ + c`, or `s·t + c` when
/// `|κ| < ZERO_KAPPA_CUTOFF`.
///
/// ```
/// use std::sync::Arc;
/// use xrisk_core::market_data::curves::FlatCurve;
/// use xrisk_models::parametrization::{IrLgmParametrization, LgmConstant};
///
/// let p = LgmConstant::new("USD", Arc::new(FlatCurve::new(0.03)), 0.01, 0.0).unwrap();
/// assert_eq!(p.h(2.0), 2.0);
/// assert!((p.zeta(2.0) - 2.0e-4).abs() < 1e-18);
/// ```
#[derive(Clone)]
pub struct LgmConstant {
    currency: String,
    curve: YieldTermStructure,
    sigma: f64,
    kappa: f64,
    scaling: f64,
    shift: f64,
}

impl LgmConstant {
    /// Creates the parametrization with unit scaling and zero shift.
    pub fn new(
        currency: &str,
        curve: YieldTermStructure,
        sigma: f64,
        kappa: f64,
    ) -> Result<Self, ModelError> {
        Self::with_scaling_and_shift(currency, curve, sigma, kappa, 1.0, 0.0)
    }

    /// Creates the parametrization with explicit invariance parameters.
    ///
    /// # Errors
    /// `ModelError::Configuration` for a negative sigma, a non-finite
    /// kappa or `scaling <= 0`.
    pub fn with_scaling_and_shift(
        currency: &str,
        curve: YieldTermStructure,
        sigma: f64,
        kappa: f64,
        scaling: f64,
        shift: f64,
    ) -> Result<Self, ModelError> {
        require_non_negative(currency, "sigma", sigma)?;
        validate_invariances(currency, kappa, scaling, shift)?;
        Ok(Self {
            currency: currency.to_string(),
            curve,
            sigma,
            kappa,
            scaling,
            shift,
        })
    }

    /// Unscaled volatility.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Mean reversion.
    pub fn reversion(&self) -> f64 {
        self.kappa
    }
}

impl fmt::Debug for LgmConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LgmConstant")
            .field("currency", &self.currency)
            .field("sigma", &self.sigma)
            .field("kappa", &self.kappa)
            .field("scaling", &self.scaling)
            .field("shift", &self.shift)
            .finish_non_exhaustive()
    }
}

impl IrLgmParametrization for LgmConstant {
    fn currency(&self) -> &str {
        &self.currency
    }

    fn term_structure(&self) -> &YieldTermStructure {
        &self.curve
    }

    fn zeta(&self, t: f64) -> f64 {
        self.sigma * self.sigma * t.max(0.0) / (self.scaling * self.scaling)
    }

    fn alpha(&self, _t: f64) -> f64 {
        self.sigma / self.scaling
    }

    fn h(&self, t: f64) -> f64 {
        self.scaling * h_shape(self.kappa, t).0 + self.shift
    }

    fn h_prime(&self, t: f64) -> f64 {
        self.scaling * h_shape(self.kappa, t).1
    }

    fn h_prime2(&self, t: f64) -> f64 {
        self.scaling * h_shape(self.kappa, t).2
    }

    fn scaling(&self) -> f64 {
        self.scaling
    }

    fn shift(&self) -> f64 {
        self.shift
    }
}

/// LGM with piecewise-constant α and constant mean reversion.
#[derive(Clone)]
pub struct LgmPiecewise {
    currency: String,
    curve: YieldTermStructure,
    alpha: PiecewiseConstant,
    kappa: f64,
    scaling: f64,
    shift: f64,
}

impl LgmPiecewise {
    /// Creates the parametrization from α breakpoints and values
    /// (`values.len() == times.len() + 1`).
    pub fn new(
        currency: &str,
        curve: YieldTermStructure,
        times: Vec<f64>,
        alphas: Vec<f64>,
        kappa: f64,
    ) -> Result<Self, ModelError> {
        Self::with_scaling_and_shift(currency, curve, times, alphas, kappa, 1.0, 0.0)
    }

    /// Creates the parametrization with explicit invariance parameters.
    pub fn with_scaling_and_shift(
        currency: &str,
        curve: YieldTermStructure,
        times: Vec<f64>,
        alphas: Vec<f64>,
        kappa: f64,
        scaling: f64,
        shift: f64,
    ) -> Result<Self, ModelError> {
        let alpha = PiecewiseConstant::new(currency, times, alphas)?;
        for &a in alpha.values() {
            require_non_negative(currency, "alpha", a)?;
        }
        validate_invariances(currency, kappa, scaling, shift)?;
        Ok(Self {
            currency: currency.to_string(),
            curve,
            alpha,
            kappa,
            scaling,
            shift,
        })
    }

    /// Unscaled α function.
    pub fn alpha_function(&self) -> &PiecewiseConstant {
        &self.alpha
    }
}

impl fmt::Debug for LgmPiecewise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LgmPiecewise")
            .field("currency", &self.currency)
            .field("alpha", &self.alpha)
            .field("kappa", &self.kappa)
            .finish_non_exhaustive()
    }
}

impl IrLgmParametrization for LgmPiecewise {
    fn currency(&self) -> &str {
        &self.currency
    }

    fn term_structure(&self) -> &YieldTermStructure {
        &self.curve
    }

    fn zeta(&self, t: f64) -> f64 {
        self.alpha.integral_of_square(t) / (self.scaling * self.scaling)
    }

    fn alpha(&self, t: f64) -> f64 {
        self.alpha.value(t) / self.scaling
    }

    fn h(&self, t: f64) -> f64 {
        self.scaling * h_shape(self.kappa, t).0 + self.shift
    }

    fn h_prime(&self, t: f64) -> f64 {
        self.scaling * h_shape(self.kappa, t).1
    }

    fn h_prime2(&self, t: f64) -> f64 {
        self.scaling * h_shape(self.kappa, t).2
    }

    fn scaling(&self) -> f64 {
        self.scaling
    }

    fn shift(&self) -> f64 {
        self.shift
    }

    fn breakpoints(&self) -> &[f64] {
        self.alpha.times()
    }
}
