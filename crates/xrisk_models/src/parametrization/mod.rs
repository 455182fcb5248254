//! Parametrizations of the individual model components.
//!
//! Each parametrization exposes the time functions the cross-asset model
//! integrates: `alpha`, `zeta`, `H` for LGM, `sigma` and its variance for
//! Black-Scholes, and the constant CIR++ parameters for credit.

mod black_scholes;
mod cirpp;
mod lgm;
mod piecewise;

use std::sync::Arc;

use xrisk_core::market_data::curves::{CreditCurve, YieldCurve};

pub use black_scholes::{
    EqBsConstant, EqBsParametrization, EqBsPiecewise, FxBsConstant, FxBsParametrization,
    FxBsPiecewise,
};
pub use cirpp::CirppParametrization;
pub use lgm::{IrLgmParametrization, LgmConstant, LgmPiecewise, ZERO_KAPPA_CUTOFF};
pub use piecewise::PiecewiseConstant;

/// Shared initial yield curve.
pub type YieldTermStructure = Arc<dyn YieldCurve<f64>>;

/// Shared initial survival curve.
pub type SurvivalTermStructure = Arc<dyn CreditCurve<f64>>;

/// Tolerance below which a negative `zeta` increment is clamped to zero.
pub const ZETA_CLAMP_TOLERANCE: f64 = 1.0e-10;

pub(crate) fn require_non_negative(entity: &str, name: &str, value: f64) -> Result<(), crate::ModelError> {
    if value < 0.0 || !value.is_finite() {
        return Err(crate::ModelError::config(
            entity,
            format!("{name} must be non-negative and finite, got {value}"),
        ));
    }
    Ok(())
}
