//! Delta and delta-gamma VaR of `PL = δᵀx + ½ xᵀΓx`, `x ~ N(0, Ω)`.
//!
//! All routines return the upper `p`-quantile of `PL`. Delta and gamma are
//! rescaled by their largest absolute entry before the moments are formed
//! and the result is scaled back.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use xrisk_core::math::inverse_cumulative_normal;
use xrisk_core::math::{pseudo_sqrt, SalvageMethod};
use xrisk_sim::rng::SimRng;

use super::salvage::CovarianceSalvage;
use crate::error::VarError;

const DRAWS_PER_CHUNK: usize = 4096;

pub(crate) fn check_quantile(p: f64) -> Result<(), VarError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(VarError::InvalidQuantile(p))
    }
}

fn check_delta(omega: &DMatrix<f64>, delta: &DVector<f64>) -> Result<(), VarError> {
    if omega.nrows() != omega.ncols() {
        return Err(VarError::DimensionMismatch {
            what: "covariance columns",
            expected: omega.nrows(),
            got: omega.ncols(),
        });
    }
    if delta.len() != omega.nrows() {
        return Err(VarError::DimensionMismatch {
            what: "delta",
            expected: omega.nrows(),
            got: delta.len(),
        });
    }
    Ok(())
}

fn check_gamma(omega: &DMatrix<f64>, delta: &DVector<f64>, gamma: &DMatrix<f64>) -> Result<(), VarError> {
    check_delta(omega, delta)?;
    if gamma.nrows() != omega.nrows() || gamma.ncols() != omega.ncols() {
        return Err(VarError::DimensionMismatch {
            what: "gamma",
            expected: omega.nrows(),
            got: gamma.nrows().max(gamma.ncols()),
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Moments {
    scale: f64,
    mu: f64,
    variance: f64,
    skew: f64,
    excess_kurtosis: f64,
}

fn moments(omega: &DMatrix<f64>, delta: &DVector<f64>, gamma: &DMatrix<f64>, higher: bool) -> Moments {
    let scale = delta.amax().max(gamma.amax());
    if scale == 0.0 {
        return Moments::default();
    }
    let d = delta / scale;
    let g = gamma / scale;
    let d_o_d = d.dot(&(omega * &d));
    let go = &g * omega;
    let go2 = &go * &go;
    let mu = 0.5 * go.trace();
    let variance = d_o_d + 0.5 * go2.trace();
    let mut m = Moments {
        scale,
        mu,
        variance,
        ..Moments::default()
    };
    if higher && variance > 0.0 {
        let go3 = &go2 * &go;
        let go4 = &go2 * &go2;
        let ogo = omega * &go;
        let o_go2 = omega * &go2;
        m.skew = (go3.trace() + 3.0 * d.dot(&(&ogo * &d))) / variance.powf(1.5);
        m.excess_kurtosis = (3.0 * go4.trace() + 12.0 * d.dot(&(&o_go2 * &d))) / (variance * variance);
    }
    m
}

/// Delta-normal VaR `Φ⁻¹(p) sqrt(δᵀΩδ)`.
///
/// # Examples
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use xrisk_analytics::var::{delta_var, NoSalvage};
///
/// let omega = DMatrix::from_row_slice(1, 1, &[4.0]);
/// let delta = DVector::from_vec(vec![3.0]);
/// let var = delta_var(&omega, &delta, 0.99, &NoSalvage).unwrap();
/// assert!((var - 6.0 * 2.326347874).abs() < 1e-6);
/// ```
pub fn delta_var(
    omega: &DMatrix<f64>,
    delta: &DVector<f64>,
    p: f64,
    salvage: &dyn CovarianceSalvage,
) -> Result<f64, VarError> {
    check_quantile(p)?;
    check_delta(omega, delta)?;
    let scale = delta.amax();
    if scale == 0.0 {
        return Ok(0.0);
    }
    let (omega, _) = salvage.salvage(omega)?;
    let d = delta / scale;
    Ok(d.dot(&(&omega * &d)).max(0.0).sqrt() * inverse_cumulative_normal(p) * scale)
}

/// Delta-gamma VaR assuming a normal P&L with the exact first two moments
/// `μ = ½ tr(ΓΩ)`, `σ² = δᵀΩδ + ½ tr((ΓΩ)²)`.
pub fn delta_gamma_var_normal(
    omega: &DMatrix<f64>,
    delta: &DVector<f64>,
    gamma: &DMatrix<f64>,
    p: f64,
    salvage: &dyn CovarianceSalvage,
) -> Result<f64, VarError> {
    check_quantile(p)?;
    check_gamma(omega, delta, gamma)?;
    let (omega, _) = salvage.salvage(omega)?;
    let m = moments(&omega, delta, gamma, false);
    if m.scale == 0.0 || m.variance == 0.0 {
        return Ok(0.0);
    }
    Ok((m.variance.sqrt() * inverse_cumulative_normal(p) + m.mu) * m.scale)
}

/// Delta-gamma VaR with the Cornish-Fisher expansion of the quantile in
/// skew and excess kurtosis.
pub fn delta_gamma_var_cornish_fisher(
    omega: &DMatrix<f64>,
    delta: &DVector<f64>,
    gamma: &DMatrix<f64>,
    p: f64,
    salvage: &dyn CovarianceSalvage,
) -> Result<f64, VarError> {
    check_quantile(p)?;
    check_gamma(omega, delta, gamma)?;
    let (omega, _) = salvage.salvage(omega)?;
    let m = moments(&omega, delta, gamma, true);
    if m.scale == 0.0 || m.variance == 0.0 {
        return Ok(0.0);
    }
    let s = inverse_cumulative_normal(p);
    let (tau, kappa) = (m.skew, m.excess_kurtosis);
    let x = s + tau / 6.0 * (s * s - 1.0) + kappa / 24.0 * s * (s * s - 3.0)
        - tau * tau / 36.0 * s * (2.0 * s * s - 5.0);
    Ok((x * m.variance.sqrt() + m.mu) * m.scale)
}

/// Delta-gamma VaR by simulation, one value per quantile.
///
/// Draws are split into chunks of fixed size, chunk `i` seeded with
/// `seed + i`, so the result does not depend on the thread count.
pub fn delta_gamma_var_mc(
    omega: &DMatrix<f64>,
    delta: &DVector<f64>,
    gamma: &DMatrix<f64>,
    quantiles: &[f64],
    samples: usize,
    seed: u64,
    salvage: &dyn CovarianceSalvage,
) -> Result<Vec<f64>, VarError> {
    for p in quantiles {
        check_quantile(*p)?;
    }
    check_gamma(omega, delta, gamma)?;
    if samples == 0 {
        return Err(VarError::Configuration("Monte Carlo VaR needs at least one sample".into()));
    }
    let (omega, root) = salvage.salvage(omega)?;
    let l = match root {
        Some(l) => l,
        None => pseudo_sqrt(&omega, SalvageMethod::default())?,
    };
    let n = delta.len();
    let chunks = samples.div_ceil(DRAWS_PER_CHUNK);
    let mut pnl: Vec<f64> = (0..chunks)
        .into_par_iter()
        .flat_map_iter(|c| {
            let draws = DRAWS_PER_CHUNK.min(samples - c * DRAWS_PER_CHUNK);
            let mut rng = SimRng::from_seed(seed.wrapping_add(c as u64));
            let mut z = DVector::<f64>::zeros(n);
            (0..draws)
                .map(|_| {
                    rng.fill_normal(z.as_mut_slice());
                    let x = &l * &z;
                    delta.dot(&x) + 0.5 * x.dot(&(gamma * &x))
                })
                .collect::<Vec<_>>()
        })
        .collect();
    pnl.sort_by(f64::total_cmp);
    Ok(quantiles.iter().map(|p| empirical_quantile(&pnl, *p)).collect())
}

/// Upper `p`-quantile of sorted values, `sorted[ceil(p n) - 1]`.
pub(crate) fn empirical_quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let k = ((p * n as f64).ceil() as usize).clamp(1, n);
    sorted[k - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var::NoSalvage;
    use approx::assert_relative_eq;

    fn omega() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09])
    }

    #[test]
    fn test_delta_var_two_factors() {
        let delta = DVector::from_vec(vec![100.0, -50.0]);
        let var = delta_var(&omega(), &delta, 0.95, &NoSalvage).unwrap();
        let sigma = (100.0f64 * 100.0 * 0.04 - 2.0 * 100.0 * 50.0 * 0.01 + 50.0 * 50.0 * 0.09).sqrt();
        assert_relative_eq!(var, sigma * inverse_cumulative_normal(0.95), epsilon = 1e-8);
    }

    #[test]
    fn test_zero_gamma_reduces_to_delta_var() {
        let delta = DVector::from_vec(vec![10.0, 20.0]);
        let gamma = DMatrix::zeros(2, 2);
        let dv = delta_var(&omega(), &delta, 0.99, &NoSalvage).unwrap();
        let nv = delta_gamma_var_normal(&omega(), &delta, &gamma, 0.99, &NoSalvage).unwrap();
        let cf = delta_gamma_var_cornish_fisher(&omega(), &delta, &gamma, 0.99, &NoSalvage).unwrap();
        assert_relative_eq!(dv, nv, epsilon = 1e-10);
        assert_relative_eq!(dv, cf, epsilon = 1e-10);
    }

    #[test]
    fn test_pure_gamma_moments() {
        // PL = ½ γ x², x ~ N(0, σ²): mean ½γσ², variance ½γ²σ⁴
        let omega = DMatrix::from_row_slice(1, 1, &[0.25]);
        let delta = DVector::from_vec(vec![0.0]);
        let gamma = DMatrix::from_row_slice(1, 1, &[2.0]);
        let var = delta_gamma_var_normal(&omega, &delta, &gamma, 0.5, &NoSalvage).unwrap();
        assert_relative_eq!(var, 0.25, epsilon = 1e-10);
    }

    #[test]
    fn test_cornish_fisher_shifts_positive_skew_up() {
        let omega = DMatrix::from_row_slice(1, 1, &[1.0]);
        let delta = DVector::from_vec(vec![1.0]);
        let gamma = DMatrix::from_row_slice(1, 1, &[0.5]);
        let normal = delta_gamma_var_normal(&omega, &delta, &gamma, 0.99, &NoSalvage).unwrap();
        let cf = delta_gamma_var_cornish_fisher(&omega, &delta, &gamma, 0.99, &NoSalvage).unwrap();
        assert!(cf > normal);
    }

    #[test]
    fn test_mc_close_to_delta_var() {
        let delta = DVector::from_vec(vec![100.0, -50.0]);
        let gamma = DMatrix::zeros(2, 2);
        let mc = delta_gamma_var_mc(&omega(), &delta, &gamma, &[0.95], 200_000, 7, &NoSalvage).unwrap();
        let exact = delta_var(&omega(), &delta, 0.95, &NoSalvage).unwrap();
        assert_relative_eq!(mc[0], exact, max_relative = 0.02);
    }

    #[test]
    fn test_mc_is_reproducible() {
        let delta = DVector::from_vec(vec![1.0, 1.0]);
        let gamma = DMatrix::identity(2, 2);
        let a = delta_gamma_var_mc(&omega(), &delta, &gamma, &[0.9, 0.99], 10_000, 3, &NoSalvage).unwrap();
        let b = delta_gamma_var_mc(&omega(), &delta, &gamma, &[0.9, 0.99], 10_000, 3, &NoSalvage).unwrap();
        assert_eq!(a, b);
        assert!(a[1] > a[0]);
    }

    #[test]
    fn test_validation() {
        let delta = DVector::from_vec(vec![1.0]);
        assert!(matches!(
            delta_var(&omega(), &delta, 0.99, &NoSalvage),
            Err(VarError::DimensionMismatch { what: "delta", .. })
        ));
        let delta = DVector::from_vec(vec![1.0, 1.0]);
        assert!(matches!(delta_var(&omega(), &delta, 1.5, &NoSalvage), Err(VarError::InvalidQuantile(_))));
        let gamma = DMatrix::zeros(3, 3);
        assert!(delta_gamma_var_normal(&omega(), &delta, &gamma, 0.9, &NoSalvage).is_err());
    }

    #[test]
    fn test_empirical_quantile() {
        let v: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(empirical_quantile(&v, 0.95), 95.0);
        assert_eq!(empirical_quantile(&v, 0.0), 1.0);
        assert_eq!(empirical_quantile(&v, 1.0), 100.0);
    }
}
