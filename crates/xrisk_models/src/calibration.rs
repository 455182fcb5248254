//! Bootstrap of piecewise FX volatilities to market-implied variances.
//!
//! For expiries `T_1 < ... < T_n` with Black volatilities `v_k`, the FX
//! volatility is piecewise constant on `[T_{k-1}, T_k)` and piece `k` is
//! solved so that the model log-variance of the FX rate over `[0, T_k]`,
//! rate contributions included, equals `v_k² T_k`.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, info};
use xrisk_core::math::{BrentSolver, MathError};

use crate::error::ModelError;
use crate::model::{AssetType, CrossAssetModel};
use crate::parametrization::FxBsPiecewise;

/// Upper bound of the volatility search interval.
const MAX_FX_SIGMA: f64 = 5.0;

/// Calibrates FX component `fx` and returns the calibrated snapshot.
///
/// # Errors
/// - `ModelError::Configuration` for mismatched or unsorted inputs
/// - `ModelError::CalibrationFailed` naming the expiry when the target
///   variance is below what the rate components alone imply
pub fn calibrate_fx_to_variances(
    model: &CrossAssetModel,
    fx: usize,
    expiries: &[f64],
    implied_vols: &[f64],
) -> Result<CrossAssetModel, ModelError> {
    model.check_index(AssetType::Fx, fx)?;
    let ccy = model.fx(fx).foreign_currency().to_string();
    if expiries.is_empty() || expiries.len() != implied_vols.len() {
        return Err(ModelError::config(
            &ccy,
            format!("{} expiries for {} volatilities", expiries.len(), implied_vols.len()),
        ));
    }
    let times = expiries[..expiries.len() - 1].to_vec();
    let mut param = FxBsPiecewise::new(&ccy, model.fx(fx).spot_today(), times, implied_vols.to_vec())?;
    let mut current = model.with_fx_parametrization(fx, Arc::new(param.clone()))?;
    let solver = BrentSolver::with_defaults();

    for (k, (&expiry, &vol)) in expiries.iter().zip(implied_vols.iter()).enumerate() {
        let target = vol * vol * expiry;
        let failure: RefCell<Option<ModelError>> = RefCell::new(None);
        let objective = |sigma: f64| -> f64 {
            let attempt = param
                .with_sigma(k, sigma)
                .and_then(|p| current.with_fx_parametrization(fx, Arc::new(p)))
                .and_then(|m| m.fx_fx_covariance(fx, fx, 0.0, expiry));
            match attempt {
                Ok(variance) => variance - target,
                Err(e) => {
                    failure.borrow_mut().get_or_insert(e);
                    f64::NAN
                }
            }
        };
        let sigma = match solver.find_root(objective, 0.0, MAX_FX_SIGMA) {
            Ok(s) => s,
            Err(MathError::NoBracket { .. }) => {
                return Err(ModelError::CalibrationFailed {
                    entity: ccy,
                    expiry,
                    message: format!("no FX volatility in [0, {MAX_FX_SIGMA}] matches implied vol {vol}"),
                })
            }
            Err(e) => return Err(e.into()),
        };
        if let Some(e) = failure.into_inner() {
            return Err(e);
        }
        param = param.with_sigma(k, sigma)?;
        current = current.with_fx_parametrization(fx, Arc::new(param.clone()))?;
        debug!(currency = %ccy, expiry, sigma, "FX volatility piece calibrated");
    }
    info!(currency = %ccy, pieces = expiries.len(), "FX calibration done");
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::three_factor_model;
    use approx::assert_relative_eq;

    #[test]
    fn test_calibration_reprices_variances() {
        let m = three_factor_model();
        let expiries = [1.0, 2.0, 5.0];
        let vols = [0.14, 0.15, 0.13];
        let calibrated = calibrate_fx_to_variances(&m, 0, &expiries, &vols).unwrap();
        for (&t, &v) in expiries.iter().zip(vols.iter()) {
            let var = calibrated.fx_fx_covariance(0, 0, 0.0, t).unwrap();
            assert_relative_eq!(var, v * v * t, max_relative = 1e-8);
        }
        // the input snapshot is untouched
        assert_eq!(m.fx(0).sigma(1.5), 0.12);
    }

    #[test]
    fn test_calibration_fails_below_rate_variance() {
        let m = three_factor_model();
        let r = calibrate_fx_to_variances(&m, 0, &[10.0], &[0.001]);
        assert!(matches!(r, Err(ModelError::CalibrationFailed { expiry, .. }) if expiry == 10.0));
    }

    #[test]
    fn test_calibration_input_validation() {
        let m = three_factor_model();
        assert!(calibrate_fx_to_variances(&m, 0, &[1.0, 2.0], &[0.1]).is_err());
        assert!(calibrate_fx_to_variances(&m, 1, &[1.0], &[0.1]).is_err());
    }
}
