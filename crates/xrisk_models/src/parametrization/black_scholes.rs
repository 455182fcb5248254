//! Black-Scholes parametrizations for FX and equity log-spots.

use std::fmt;

use super::piecewise::PiecewiseConstant;
use super::{require_non_negative, YieldTermStructure};
use crate::error::ModelError;

/// FX rate, domestic per unit of foreign, with lognormal dynamics.
pub trait FxBsParametrization: Send + Sync + fmt::Debug {
    /// Foreign currency code.
    fn foreign_currency(&self) -> &str;

    /// FX spot today.
    fn spot_today(&self) -> f64;

    /// Instantaneous volatility σ(t).
    fn sigma(&self, t: f64) -> f64;

    /// Integrated variance ∫₀ᵗ σ(s)² ds.
    fn variance(&self, t: f64) -> f64;

    /// Times at which σ jumps.
    fn breakpoints(&self) -> &[f64] {
        &[]
    }
}

/// Equity spot in one of the model currencies, with lognormal dynamics.
pub trait EqBsParametrization: Send + Sync + fmt::Debug {
    /// Equity name.
    fn name(&self) -> &str;

    /// Currency the equity is quoted in.
    fn currency(&self) -> &str;

    /// Spot today.
    fn spot_today(&self) -> f64;

    /// Dividend yield curve, as discount factors.
    fn dividend_curve(&self) -> &YieldTermStructure;

    /// Instantaneous volatility σ(t).
    fn sigma(&self, t: f64) -> f64;

    /// Integrated variance ∫₀ᵗ σ(s)² ds.
    fn variance(&self, t: f64) -> f64;

    /// Times at which σ jumps.
    fn breakpoints(&self) -> &[f64] {
        &[]
    }
}

fn require_positive_spot(entity: &str, spot: f64) -> Result<(), ModelError> {
    if !(spot > 0.0) || !spot.is_finite() {
        return Err(ModelError::config(entity, format!("spot must be positive, got {spot}")));
    }
    Ok(())
}

fn piecewise_sigma(entity: &str, times: Vec<f64>, sigmas: Vec<f64>) -> Result<PiecewiseConstant, ModelError> {
    let sigma = PiecewiseConstant::new(entity, times, sigmas)?;
    for &s in sigma.values() {
        require_non_negative(entity, "sigma", s)?;
    }
    Ok(sigma)
}

/// FX parametrization with constant volatility.
#[derive(Debug, Clone)]
pub struct FxBsConstant {
    foreign: String,
    spot: f64,
    sigma: f64,
}

impl FxBsConstant {
    /// Creates the parametrization.
    pub fn new(foreign: &str, spot: f64, sigma: f64) -> Result<Self, ModelError> {
        require_positive_spot(foreign, spot)?;
        require_non_negative(foreign, "sigma", sigma)?;
        Ok(Self {
            foreign: foreign.to_string(),
            spot,
            sigma,
        })
    }
}

impl FxBsParametrization for FxBsConstant {
    fn foreign_currency(&self) -> &str {
        &self.foreign
    }

    fn spot_today(&self) -> f64 {
        self.spot
    }

    fn sigma(&self, _t: f64) -> f64 {
        self.sigma
    }

    fn variance(&self, t: f64) -> f64 {
        self.sigma * self.sigma * t.max(0.0)
    }
}

/// FX parametrization with piecewise-constant volatility.
#[derive(Debug, Clone)]
pub struct FxBsPiecewise {
    foreign: String,
    spot: f64,
    sigma: PiecewiseConstant,
}

impl FxBsPiecewise {
    /// Creates the parametrization (`sigmas.len() == times.len() + 1`).
    pub fn new(foreign: &str, spot: f64, times: Vec<f64>, sigmas: Vec<f64>) -> Result<Self, ModelError> {
        require_positive_spot(foreign, spot)?;
        Ok(Self {
            foreign: foreign.to_string(),
            spot,
            sigma: piecewise_sigma(foreign, times, sigmas)?,
        })
    }

    /// Volatility function.
    pub fn sigma_function(&self) -> &PiecewiseConstant {
        &self.sigma
    }

    /// Returns a copy with the volatility of piece `k` replaced.
    pub fn with_sigma(&self, k: usize, sigma: f64) -> Result<Self, ModelError> {
        require_non_negative(&self.foreign, "sigma", sigma)?;
        Ok(Self {
            foreign: self.foreign.clone(),
            spot: self.spot,
            sigma: self.sigma.with_value(k, sigma)?,
        })
    }
}

impl FxBsParametrization for FxBsPiecewise {
    fn foreign_currency(&self) -> &str {
        &self.foreign
    }

    fn spot_today(&self) -> f64 {
        self.spot
    }

    fn sigma(&self, t: f64) -> f64 {
        self.sigma.value(t)
    }

    fn variance(&self, t: f64) -> f64 {
        self.sigma.integral_of_square(t)
    }

    fn breakpoints(&self) -> &[f64] {
        self.sigma.times()
    }
}

/// Equity parametrization with constant volatility.
#[derive(Clone)]
pub struct EqBsConstant {
    name: String,
    currency: String,
    spot: f64,
    dividends: YieldTermStructure,
    sigma: f64,
}

impl EqBsConstant {
    /// Creates the parametrization.
    pub fn new(
        name: &str,
        currency: &str,
        spot: f64,
        dividends: YieldTermStructure,
        sigma: f64,
    ) -> Result<Self, ModelError> {
        require_positive_spot(name, spot)?;
        require_non_negative(name, "sigma", sigma)?;
        Ok(Self {
            name: name.to_string(),
            currency: currency.to_string(),
            spot,
            dividends,
            sigma,
        })
    }
}

impl fmt::Debug for EqBsConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EqBsConstant")
            .field("name", &self.name)
            .field("currency", &self.currency)
            .field("spot", &self.spot)
            .field("sigma", &self.sigma)
            .finish_non_exhaustive()
    }
}

impl EqBsParametrization for EqBsConstant {
    fn name(&self) -> &str {
        &self.name
    }

    fn currency(&self) -> &str {
        &self.currency
    }

    fn spot_today(&self) -> f64 {
        self.spot
    }

    fn dividend_curve(&self) -> &YieldTermStructure {
        &self.dividends
    }

    fn sigma(&self, _t: f64) -> f64 {
        self.sigma
    }

    fn variance(&self, t: f64) -> f64 {
        self.sigma * self.sigma * t.max(0.0)
    }
}

/// Equity parametrization with piecewise-constant volatility.
#[derive(Clone)]
pub struct EqBsPiecewise {
    name: String,
    currency: String,
    spot: f64,
    dividends: YieldTermStructure,
    sigma: PiecewiseConstant,
}

impl EqBsPiecewise {
    /// Creates the parametrization (`sigmas.len() == times.len() + 1`).
    pub fn new(
        name: &str,
        currency: &str,
        spot: f64,
        dividends: YieldTermStructure,
        times: Vec<f64>,
        sigmas: Vec<f64>,
    ) -> Result<Self, ModelError> {
        require_positive_spot(name, spot)?;
        Ok(Self {
            name: name.to_string(),
            currency: currency.to_string(),
            spot,
            dividends,
            sigma: piecewise_sigma(name, times, sigmas)?,
        })
    }
}

impl fmt::Debug for EqBsPiecewise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EqBsPiecewise")
            .field("name", &self.name)
            .field("currency", &self.currency)
            .field("sigma", &self.sigma)
            .finish_non_exhaustive()
    }
}

impl EqBsParametrization for EqBsPiecewise {
    fn name(&self) -> &str {
        &self.name
    }

    fn currency(&self) -> &str {
        &self.currency
    }

    fn spot_today(&self) -> f64 {
        self.spot
    }

    fn dividend_curve(&self) -> &YieldTermStructure {
        &self.dividends
    }

    fn sigma(&self, t: f64) -> f64 {
        self.sigma.value(t)
    }

    fn variance(&self, t: f64) -> f64 {
        self.sigma.integral_of_square(t)
    }

    fn breakpoints(&self) -> &[f64] {
        self.sigma.times()
    }
}
