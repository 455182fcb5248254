//! CIR++ credit intensity.
//!
//! `λ(t) = y(t) + ψ(t)` with `dy = κ(θ - y) dt + σ √y dW` and a
//! deterministic shift `ψ` that reprices the market survival curve.

use std::fmt;

use super::{require_non_negative, SurvivalTermStructure};
use crate::error::ModelError;

/// Volatility below which the CIR bond degenerates to the deterministic limit.
const SIGMA_CUTOFF: f64 = 1.0e-12;

/// CIR++ parametrization for one credit name.
#[derive(Clone)]
pub struct CirppParametrization {
    name: String,
    currency: String,
    kappa: f64,
    theta: f64,
    sigma: f64,
    y0: f64,
    survival: SurvivalTermStructure,
}

impl CirppParametrization {
    /// Creates the parametrization.
    ///
    /// # Errors
    /// `ModelError::Configuration` unless `kappa > 0` and
    /// `theta, sigma, y0 >= 0`.
    pub fn new(
        name: &str,
        currency: &str,
        kappa: f64,
        theta: f64,
        sigma: f64,
        y0: f64,
        survival: SurvivalTermStructure,
    ) -> Result<Self, ModelError> {
        if !(kappa > 0.0) || !kappa.is_finite() {
            return Err(ModelError::config(name, format!("kappa must be positive, got {kappa}")));
        }
        require_non_negative(name, "theta", theta)?;
        require_non_negative(name, "sigma", sigma)?;
        require_non_negative(name, "y0", y0)?;
        Ok(Self {
            name: name.to_string(),
            currency: currency.to_string(),
            kappa,
            theta,
            sigma,
            y0,
            survival,
        })
    }

    /// Credit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Currency of the credit name.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Mean reversion speed.
    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    /// Long-run level.
    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Volatility.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Initial intensity.
    pub fn y0(&self) -> f64 {
        self.y0
    }

    /// Market survival curve.
    pub fn survival_curve(&self) -> &SurvivalTermStructure {
        &self.survival
    }

    /// Feller condition σ² ≤ 2κθ.
    pub fn feller(&self) -> bool {
        self.sigma * self.sigma <= 2.0 * self.kappa * self.theta
    }

    /// CIR bond coefficients `(A(τ), B(τ))` with `P = A e^{-B y}`.
    pub fn bond_coefficients(&self, tau: f64) -> (f64, f64) {
        let tau = tau.max(0.0);
        let k = self.kappa;
        if self.sigma < SIGMA_CUTOFF {
            let b = (1.0 - (-k * tau).exp()) / k;
            return ((-self.theta * (tau - b)).exp(), b);
        }
        let s2 = self.sigma * self.sigma;
        let h = (k * k + 2.0 * s2).sqrt();
        let e = (h * tau).exp() - 1.0;
        let denom = 2.0 * h + (k + h) * e;
        let a = (2.0 * h * (0.5 * (k + h) * tau).exp() / denom).powf(2.0 * k * self.theta / s2);
        (a, 2.0 * e / denom)
    }

    /// Pure CIR survival `E[exp(-∫ₜᵀ y)| y(t) = y]`.
    pub fn cir_survival(&self, t: f64, big_t: f64, y: f64) -> f64 {
        let (a, b) = self.bond_coefficients(big_t - t);
        a * (-b * y).exp()
    }

    /// CIR++ conditional survival probability `S(t, T | y(t) = y)`.
    ///
    /// Equals the market curve's forward survival for `t = 0`, `y = y0`.
    pub fn survival_probability(&self, t: f64, big_t: f64, y: f64) -> Result<f64, ModelError> {
        let market = self.survival.forward_survival(t, big_t)?;
        let shift = self.cir_survival(0.0, t, self.y0) / self.cir_survival(0.0, big_t, self.y0);
        Ok(market * shift * self.cir_survival(t, big_t, y))
    }

    /// Brigo-Alfonsi implicit step for `y` over `dt` with standard normal `z`.
    ///
    /// Non-negative for `y0 >= 0`; keeps the dynamics well behaved when the
    /// Feller condition holds.
    pub fn evolve_intensity(&self, y0: f64, dt: f64, z: f64) -> f64 {
        if dt <= 0.0 {
            return y0;
        }
        let k = self.kappa;
        let s = self.sigma;
        let dw = dt.sqrt() * z;
        let radicand = s * s * dw * dw
            + 4.0 * (y0 + (k * self.theta - 0.5 * s * s) * dt) * (1.0 + k * dt);
        let root = ((s * dw + radicand.max(0.0).sqrt()) / (2.0 * (1.0 + k * dt))).max(0.0);
        root * root
    }
}

impl fmt::Debug for CirppParametrization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CirppParametrization")
            .field("name", &self.name)
            .field("kappa", &self.kappa)
            .field("theta", &self.theta)
            .field("sigma", &self.sigma)
            .field("y0", &self.y0)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::sync::Arc;
    use xrisk_core::market_data::curves::FlatHazardCurve;

    fn cir(sigma: f64) -> CirppParametrization {
        CirppParametrization::new(
            "CPTY_A",
            "EUR",
            0.5,
            0.02,
            sigma,
            0.015,
            Arc::new(FlatHazardCurve::new(0.02).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_survival_reprices_market_curve() {
        let p = cir(0.1);
        for t in [0.5, 1.0, 5.0, 10.0] {
            let s = p.survival_probability(0.0, t, p.y0()).unwrap();
            let m = p.survival_curve().survival_probability(t).unwrap();
            assert_relative_eq!(s, m, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_deterministic_limit_matches_small_sigma() {
        let det = cir(0.0);
        let small = cir(1e-3);
        assert_relative_eq!(
            det.cir_survival(0.0, 5.0, 0.015),
            small.cir_survival(0.0, 5.0, 0.015),
            max_relative = 1e-5
        );
    }

    #[test]
    fn test_feller() {
        assert!(cir(0.1).feller());
        assert!(!cir(0.2).feller());
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let curve: SurvivalTermStructure = Arc::new(FlatHazardCurve::new(0.02).unwrap());
        assert!(CirppParametrization::new("X", "EUR", 0.0, 0.02, 0.1, 0.01, curve.clone()).is_err());
        assert!(CirppParametrization::new("X", "EUR", 0.5, 0.02, 0.1, -0.01, curve).is_err());
    }

    #[test]
    fn test_zero_step_keeps_state() {
        assert_eq!(cir(0.1).evolve_intensity(0.03, 0.0, 1.5), 0.03);
    }

    proptest! {
        #[test]
        fn prop_brigo_alfonsi_non_negative(
            y0 in 0.0f64..0.5,
            dt in 1e-4f64..1.0,
            z in -8.0f64..8.0,
            sigma in 0.0f64..0.14,
        ) {
            let p = cir(sigma);
            prop_assert!(p.feller());
            prop_assert!(p.evolve_intensity(y0, dt, z) >= 0.0);
        }
    }
}
