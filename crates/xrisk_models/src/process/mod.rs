//! Joint state process of the cross-asset model.
//!
//! Two schemes:
//!
//! - [`Discretization::Exact`]: the Gaussian state is propagated with its
//!   conditional mean and the pseudo square root of its conditional
//!   covariance; the state-independent parts are memoized per `(t0, dt)`
//! - [`Discretization::Euler`]: drift and diffusion evaluated at `t0`, with
//!   the Brigo-Alfonsi implicit step for CIR++ intensities
//!
//! The exact cache is guarded by a `RwLock`; call
//! [`CrossAssetStateProcess::warm_up`] on the simulation grid before
//! sharing the process across threads so the parallel phase only reads.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use nalgebra::DMatrix;
use tracing::debug;
use xrisk_core::math::pseudo_sqrt;

use crate::error::ModelError;
use crate::model::{AssetType, CrossAssetModel};

/// Time discretization of the state process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Discretization {
    /// Conditional moments from the model analytics.
    #[default]
    Exact,
    /// First-order scheme.
    Euler,
}

/// Memoized state-independent part of an exact step.
#[derive(Debug)]
struct ExactStep {
    drift: Vec<f64>,
    root: DMatrix<f64>,
}

/// Cross-asset state process.
#[derive(Debug)]
pub struct CrossAssetStateProcess {
    model: Arc<CrossAssetModel>,
    discretization: Discretization,
    cache: RwLock<HashMap<(u64, u64), Arc<ExactStep>>>,
}

impl CrossAssetStateProcess {
    /// Creates the process.
    ///
    /// # Errors
    /// `ModelError::Configuration` for the exact scheme on a model with
    /// CIR++ components.
    pub fn new(model: Arc<CrossAssetModel>, discretization: Discretization) -> Result<Self, ModelError> {
        if discretization == Discretization::Exact && model.n_cr() > 0 {
            return Err(ModelError::config(
                "CrossAssetStateProcess",
                "exact discretization is not available with CIR++ components, use Euler",
            ));
        }
        Ok(Self {
            model,
            discretization,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Underlying model.
    pub fn model(&self) -> &Arc<CrossAssetModel> {
        &self.model
    }

    /// Scheme in use.
    pub fn discretization(&self) -> Discretization {
        self.discretization
    }

    /// State dimension.
    pub fn size(&self) -> usize {
        self.model.state_size()
    }

    /// Number of independent normals consumed per step.
    pub fn factors(&self) -> usize {
        match self.discretization {
            Discretization::Exact => self.model.state_size(),
            Discretization::Euler => self.model.brownians(),
        }
    }

    /// State at t = 0: zero LGM states, log-spots, CIR++ `y0` and unit
    /// survival.
    pub fn initial_values(&self) -> Vec<f64> {
        let m = &self.model;
        let mut x = vec![0.0; m.state_size()];
        for i in 0..m.n_fx() {
            x[m.fx_index(i)] = m.fx(i).spot_today().ln();
        }
        for k in 0..m.n_eq() {
            x[m.eq_index(k)] = m.eq(k).spot_today().ln();
        }
        for c in 0..m.n_cr() {
            x[m.cr_index(c)] = m.cr(c).y0();
            x[m.cr_index(c) + 1] = 1.0;
        }
        x
    }

    /// Number of memoized exact steps.
    pub fn cache_size(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Pre-computes the exact steps of a time grid (with `t = 0` first).
    pub fn warm_up(&self, time_grid: &[f64]) -> Result<(), ModelError> {
        if self.discretization != Discretization::Exact {
            return Ok(());
        }
        for w in time_grid.windows(2) {
            let dt = w[1] - w[0];
            if dt > 0.0 {
                self.exact_step(w[0], dt)?;
            }
        }
        debug!(steps = self.cache_size(), "exact state process cache warmed up");
        Ok(())
    }

    /// Maps `x0` at `t0` to the state at `t0 + dt` given independent
    /// standard normals `dw` (length [`factors`](Self::factors)).
    pub fn evolve(&self, t0: f64, x0: &[f64], dt: f64, dw: &[f64]) -> Result<Vec<f64>, ModelError> {
        let mut out = vec![0.0; self.size()];
        self.evolve_into(t0, x0, dt, dw, &mut out)?;
        Ok(out)
    }

    /// As [`evolve`](Self::evolve), writing into `out`.
    pub fn evolve_into(
        &self,
        t0: f64,
        x0: &[f64],
        dt: f64,
        dw: &[f64],
        out: &mut [f64],
    ) -> Result<(), ModelError> {
        check_len("evolve state", self.size(), x0.len())?;
        check_len("evolve output", self.size(), out.len())?;
        check_len("evolve variates", self.factors(), dw.len())?;
        if dt <= 0.0 {
            out.copy_from_slice(x0);
            return Ok(());
        }
        match self.discretization {
            Discretization::Exact => self.evolve_exact(t0, x0, dt, dw, out),
            Discretization::Euler => self.evolve_euler(t0, x0, dt, dw, out),
        }
    }

    fn exact_step(&self, t0: f64, dt: f64) -> Result<Arc<ExactStep>, ModelError> {
        let key = (t0.to_bits(), dt.to_bits());
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(step) = cache.get(&key) {
                return Ok(Arc::clone(step));
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(step) = cache.get(&key) {
            return Ok(Arc::clone(step));
        }

        let m = &self.model;
        let states = m.gaussian_states();
        let n = states.len();
        let mut drift = Vec::with_capacity(n);
        for &(asset, i) in &states {
            drift.push(match asset {
                AssetType::Ir => m.ir_expectation_1(i, t0, dt)?,
                AssetType::Fx => m.fx_expectation_1(i, t0, dt)?,
                AssetType::Eq => m.eq_expectation_1(i, t0, dt)?,
                AssetType::Cr => 0.0,
            });
        }
        let mut cov = DMatrix::zeros(n, n);
        for r in 0..n {
            for s in r..n {
                let (a, i) = states[r];
                let (b, j) = states[s];
                let v = m.covariance(a, i, b, j, t0, dt)?;
                cov[(r, s)] = v;
                cov[(s, r)] = v;
            }
        }
        let root = pseudo_sqrt(&cov, m.salvage())?;
        let step = Arc::new(ExactStep { drift, root });
        cache.insert(key, Arc::clone(&step));
        Ok(step)
    }

    fn evolve_exact(&self, t0: f64, x0: &[f64], dt: f64, dw: &[f64], out: &mut [f64]) -> Result<(), ModelError> {
        let step = self.exact_step(t0, dt)?;
        let m = &self.model;
        for i in 0..m.n_ir() {
            out[m.ir_index(i)] = m.ir_expectation_2(i, x0[m.ir_index(i)]);
        }
        for i in 0..m.n_fx() {
            out[m.fx_index(i)] = m.fx_expectation_2(
                i,
                t0,
                x0[m.fx_index(i)],
                x0[m.ir_index(i + 1)],
                x0[m.ir_index(0)],
                dt,
            );
        }
        for k in 0..m.n_eq() {
            let c = m.eq_currency_index(k);
            out[m.eq_index(k)] = m.eq_expectation_2(k, t0, x0[m.eq_index(k)], x0[m.ir_index(c)], dt);
        }
        let n = step.drift.len();
        for r in 0..n {
            let mut noise = 0.0;
            for (s, w) in dw.iter().enumerate().take(n) {
                noise += step.root[(r, s)] * w;
            }
            out[r] += step.drift[r] + noise;
        }
        Ok(())
    }

    /// LGM short rate `f(0,t) + H'(t) (z + H(t) ζ(t))`, with the forward
    /// taken over the step.
    fn short_rate(&self, i: usize, t: f64, dt: f64, z: f64) -> Result<f64, ModelError> {
        let p = self.model.ir(i);
        let f = p.term_structure().forward_rate(t, t + dt)?;
        Ok(f + p.h_prime(t) * (z + p.h(t) * p.zeta(t)))
    }

    fn evolve_euler(&self, t0: f64, x0: &[f64], dt: f64, dw: &[f64], out: &mut [f64]) -> Result<(), ModelError> {
        let m = &self.model;
        let w = m.correlation_factor().transform(dw);
        let sdt = dt.sqrt();
        let h0 = m.ir(0).h(t0);
        let a0 = m.ir(0).alpha(t0);

        for i in 0..m.n_ir() {
            let p = m.ir(i);
            let a = p.alpha(t0);
            let drift = if i == 0 {
                0.0
            } else {
                -p.h(t0) * a * a + m.correlation(AssetType::Ir, 0, AssetType::Ir, i) * h0 * a0 * a
                    - m.correlation(AssetType::Ir, i, AssetType::Fx, i - 1) * m.fx(i - 1).sigma(t0) * a
            };
            let idx = m.ir_index(i);
            out[idx] = x0[idx] + drift * dt + a * sdt * w[m.component_index(AssetType::Ir, i)];
        }

        let r0 = self.short_rate(0, t0, dt, x0[m.ir_index(0)])?;
        for i in 0..m.n_fx() {
            let sigma = m.fx(i).sigma(t0);
            let rf = self.short_rate(i + 1, t0, dt, x0[m.ir_index(i + 1)])?;
            let drift = r0 - rf - 0.5 * sigma * sigma
                + m.correlation(AssetType::Ir, 0, AssetType::Fx, i) * h0 * a0 * sigma;
            let idx = m.fx_index(i);
            out[idx] = x0[idx] + drift * dt + sigma * sdt * w[m.component_index(AssetType::Fx, i)];
        }

        for k in 0..m.n_eq() {
            let p = m.eq(k);
            let c = m.eq_currency_index(k);
            let sigma = p.sigma(t0);
            let rc = self.short_rate(c, t0, dt, x0[m.ir_index(c)])?;
            let q = p.dividend_curve().forward_rate(t0, t0 + dt)?;
            let mut drift = rc - q - 0.5 * sigma * sigma
                + m.correlation(AssetType::Ir, 0, AssetType::Eq, k) * h0 * a0 * sigma;
            if c > 0 {
                drift -= m.correlation(AssetType::Fx, c - 1, AssetType::Eq, k) * m.fx(c - 1).sigma(t0) * sigma;
            }
            let idx = m.eq_index(k);
            out[idx] = x0[idx] + drift * dt + sigma * sdt * w[m.component_index(AssetType::Eq, k)];
        }

        for c in 0..m.n_cr() {
            let p = m.cr(c);
            let idx = m.cr_index(c);
            let y0 = x0[idx].max(0.0);
            let y1 = p.evolve_intensity(y0, dt, w[m.component_index(AssetType::Cr, c)]);
            let t1 = t0 + dt;
            let shift = p.survival_curve().forward_survival(t0, t1)? * p.cir_survival(0.0, t0, p.y0())
                / p.cir_survival(0.0, t1, p.y0());
            out[idx] = y1;
            out[idx + 1] = x0[idx + 1] * shift * (-0.5 * (y0 + y1) * dt).exp();
        }
        Ok(())
    }
}

fn check_len(context: &'static str, expected: usize, got: usize) -> Result<(), ModelError> {
    if expected != got {
        return Err(ModelError::DimensionMismatch { context, expected, got });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::{three_factor_model, with_credit};
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal};

    fn normals(rng: &mut StdRng, n: usize) -> Vec<f64> {
        (0..n).map(|_| StandardNormal.sample(rng)).collect()
    }

    #[test]
    fn test_zero_step_returns_initial_state() {
        let p = CrossAssetStateProcess::new(Arc::new(three_factor_model()), Discretization::Exact).unwrap();
        let x0 = p.initial_values();
        let x1 = p.evolve(0.0, &x0, 0.0, &[0.3, -1.0, 2.0, 0.1]).unwrap();
        assert_eq!(x0, x1);
    }

    #[test]
    fn test_exact_rejects_credit() {
        let r = CrossAssetStateProcess::new(Arc::new(with_credit()), Discretization::Exact);
        assert!(matches!(r, Err(ModelError::Configuration { .. })));
        assert!(CrossAssetStateProcess::new(Arc::new(with_credit()), Discretization::Euler).is_ok());
    }

    #[test]
    fn test_variate_length_checked() {
        let p = CrossAssetStateProcess::new(Arc::new(three_factor_model()), Discretization::Euler).unwrap();
        let x0 = p.initial_values();
        assert!(matches!(
            p.evolve(0.0, &x0, 0.5, &[0.0; 3]),
            Err(ModelError::DimensionMismatch { expected: 4, got: 3, .. })
        ));
    }

    #[test]
    fn test_warm_up_fills_cache() {
        let p = CrossAssetStateProcess::new(Arc::new(three_factor_model()), Discretization::Exact).unwrap();
        p.warm_up(&[0.0, 0.5, 1.0, 2.0]).unwrap();
        assert_eq!(p.cache_size(), 3);
        let x0 = p.initial_values();
        p.evolve(0.5, &x0, 0.5, &[0.0; 4]).unwrap();
        assert_eq!(p.cache_size(), 3);
    }

    #[test]
    fn test_exact_and_euler_agree_on_small_step() {
        let m = Arc::new(three_factor_model());
        let exact = CrossAssetStateProcess::new(m.clone(), Discretization::Exact).unwrap();
        let euler = CrossAssetStateProcess::new(m, Discretization::Euler).unwrap();
        let x0 = exact.initial_values();
        let dt = 1e-3;
        let a = exact.evolve(1.0, &x0, dt, &[0.0; 4]).unwrap();
        let b = euler.evolve(1.0, &x0, dt, &[0.0; 4]).unwrap();
        for (u, v) in a.iter().zip(b.iter()) {
            assert!((u - v).abs() < 1e-5, "{u} vs {v}");
        }
    }

    #[test]
    fn test_exact_deflated_fx_and_equity_are_martingales() {
        // E[X(T)/N(T)] = X(0) P_f(0,T) and E[S(T) X(T)/N(T)] = S(0) X(0) Q(T)
        let m = Arc::new(three_factor_model());
        let p = CrossAssetStateProcess::new(m.clone(), Discretization::Exact).unwrap();
        let x0 = p.initial_values();
        let big_t = 5.0;
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let (mut fx_sum, mut eq_sum) = (0.0, 0.0);
        for _ in 0..n {
            let z = normals(&mut rng, 4);
            let minus: Vec<f64> = z.iter().map(|v| -v).collect();
            for dw in [&z, &minus] {
                let x = p.evolve(0.0, &x0, big_t, dw).unwrap();
                let num = m.numeraire(big_t, x[0]).unwrap();
                let fx = x[m.fx_index(0)].exp();
                fx_sum += 0.5 * fx / num;
                eq_sum += 0.5 * x[m.eq_index(0)].exp() * fx / num;
            }
        }
        let pf = m.ir(1).term_structure().discount_factor(big_t).unwrap();
        let q = m.eq(0).dividend_curve().discount_factor(big_t).unwrap();
        assert_relative_eq!(fx_sum / n as f64, 0.9 * pf, max_relative = 1e-2);
        assert_relative_eq!(eq_sum / n as f64, 4000.0 * 0.9 * q, max_relative = 2e-2);
    }

    #[test]
    fn test_euler_survival_decreases() {
        let p = CrossAssetStateProcess::new(Arc::new(with_credit()), Discretization::Euler).unwrap();
        let mut x = p.initial_values();
        let mut rng = StdRng::seed_from_u64(3);
        for step in 0..20 {
            let before = x[2];
            x = p.evolve(step as f64 * 0.25, &x, 0.25, &normals(&mut rng, 2)).unwrap();
            assert!(x[1] >= 0.0);
            assert!(x[2] > 0.0 && x[2] <= before * 1.05);
        }
    }

    proptest! {
        #[test]
        fn prop_euler_intensity_non_negative(seed in 0u64..500, dt in 0.01f64..1.0) {
            let p = CrossAssetStateProcess::new(Arc::new(with_credit()), Discretization::Euler).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let mut x = p.initial_values();
            for step in 0..10 {
                x = p.evolve(step as f64 * dt, &x, dt, &normals(&mut rng, 2)).unwrap();
                prop_assert!(x[1] >= 0.0);
            }
        }
    }
}
