//! Conditional moments of the Gaussian part of the cross-asset state.
//!
//! Over `[t0, t0 + dt]` every IR, FX and equity state variable is a
//! deterministic function of its start value plus a Gaussian increment.
//! `*_expectation_1` is the state-independent part of the conditional
//! mean, `*_expectation_2` adds the dependence on the start state.
//!
//! Covariances are assembled from noise loadings: over the step, each
//! state variable is `Σ_p ∫ L_p(u) dW_p(u)` for deterministic `L_p`, so
//!
//! ```text
//! Cov(X, Y) = Σ_{p,q} ρ_pq ∫ L_p(u) L_q(u) du
//! ```
//!
//! with FX and equity picking up `(H(t) - H(u)) α(u)` loadings from the
//! LGM short rates of their currencies.

use super::{AssetType, CrossAssetModel};
use crate::error::ModelError;

#[derive(Debug, Clone, Copy)]
enum Loading {
    /// α_i(u)
    IrAlpha { ir: usize },
    /// sign · (H_i(t) - H_i(u)) · α_i(u)
    IrHAlpha { ir: usize, h_end: f64, sign: f64 },
    /// σ_fx(u)
    FxSigma { fx: usize },
    /// σ_eq(u)
    EqSigma { eq: usize },
}

#[derive(Debug, Clone, Copy)]
struct NoiseTerm {
    brownian: usize,
    loading: Loading,
}

impl CrossAssetModel {
    /// ∫_{t0}^{t1} f(u) du, split at the parameter breakpoints.
    pub fn integral(&self, t0: f64, t1: f64, f: &dyn Fn(f64) -> f64) -> Result<f64, ModelError> {
        if t1 <= t0 {
            return Ok(0.0);
        }
        let mut sum = 0.0;
        let mut start = t0;
        for &b in self.breakpoints().iter().filter(|&&b| b > t0 && b < t1) {
            sum += self.integrator().integrate(f, start, b)?;
            start = b;
        }
        sum += self.integrator().integrate(f, start, t1)?;
        Ok(sum)
    }

    #[inline]
    fn hz(&self, i: usize, t: f64) -> f64 {
        self.ir(i).h(t)
    }

    #[inline]
    fn az(&self, i: usize, t: f64) -> f64 {
        self.ir(i).alpha(t)
    }

    #[inline]
    fn sx(&self, i: usize, t: f64) -> f64 {
        self.fx(i).sigma(t)
    }

    #[inline]
    fn ss(&self, k: usize, t: f64) -> f64 {
        self.eq(k).sigma(t)
    }

    #[inline]
    fn rzz(&self, i: usize, j: usize) -> f64 {
        self.correlation(AssetType::Ir, i, AssetType::Ir, j)
    }

    #[inline]
    fn rzx(&self, i: usize, j: usize) -> f64 {
        self.correlation(AssetType::Ir, i, AssetType::Fx, j)
    }

    #[inline]
    fn rzs(&self, i: usize, k: usize) -> f64 {
        self.correlation(AssetType::Ir, i, AssetType::Eq, k)
    }

    #[inline]
    fn rxs(&self, i: usize, k: usize) -> f64 {
        self.correlation(AssetType::Fx, i, AssetType::Eq, k)
    }

    /// Drift of the foreign LGM state `z_i` in the domestic LGM measure,
    /// integrated as `(∫ drift, ∫ H_i · drift)` over the step.
    fn foreign_ir_drift_moments(&self, i: usize, t0: f64, t1: f64) -> Result<(f64, f64), ModelError> {
        let drift = |u: f64| {
            -self.hz(i, u) * self.az(i, u) * self.az(i, u)
                + self.rzz(0, i) * self.hz(0, u) * self.az(0, u) * self.az(i, u)
                - self.rzx(i, i - 1) * self.sx(i - 1, u) * self.az(i, u)
        };
        let plain = self.integral(t0, t1, &drift)?;
        let weighted = self.integral(t0, t1, &|u| self.hz(i, u) * drift(u))?;
        Ok((plain, weighted))
    }

    /// `½ (H(t1)² ζ(t1) - H(t0)² ζ(t0) - ∫ H² α²)` = ∫ H' H ζ.
    fn h_h_zeta(&self, i: usize, t0: f64, t1: f64) -> Result<f64, ModelError> {
        let ir = self.ir(i);
        let (ha, hb) = (ir.h(t0), ir.h(t1));
        let int = self.integral(t0, t1, &|u| {
            let h = ir.h(u);
            let a = ir.alpha(u);
            h * h * a * a
        })?;
        Ok(0.5 * (hb * hb * ir.zeta(t1) - ha * ha * ir.zeta(t0) - int))
    }

    /// State-independent part of `E[z_i(t0+dt)] - z_i(t0)`; zero for the
    /// domestic currency.
    pub fn ir_expectation_1(&self, i: usize, t0: f64, dt: f64) -> Result<f64, ModelError> {
        self.check_index(AssetType::Ir, i)?;
        if i == 0 {
            return Ok(0.0);
        }
        let (plain, _) = self.foreign_ir_drift_moments(i, t0, t0 + dt)?;
        Ok(plain)
    }

    /// State-dependent part of the IR conditional mean.
    pub fn ir_expectation_2(&self, _i: usize, zi_0: f64) -> f64 {
        zi_0
    }

    /// State-independent part of the conditional mean of FX log-spot `i`.
    pub fn fx_expectation_1(&self, i: usize, t0: f64, dt: f64) -> Result<f64, ModelError> {
        self.check_index(AssetType::Fx, i)?;
        let t1 = t0 + dt;
        let f = i + 1;
        let dom = self.ir(0).term_structure();
        let frn = self.ir(f).term_structure();
        let mut res = (frn.discount_factor(t1)? / frn.discount_factor(t0)?
            * dom.discount_factor(t0)?
            / dom.discount_factor(t1)?)
        .ln();
        res -= 0.5 * (self.fx(i).variance(t1) - self.fx(i).variance(t0));
        res += self.h_h_zeta(0, t0, t1)?;
        res -= self.h_h_zeta(f, t0, t1)?;
        res += self.rzx(0, i) * self.integral(t0, t1, &|u| self.hz(0, u) * self.az(0, u) * self.sx(i, u))?;
        let (plain, weighted) = self.foreign_ir_drift_moments(f, t0, t1)?;
        res -= self.hz(f, t1) * plain - weighted;
        Ok(res)
    }

    /// State-dependent part of the FX conditional mean.
    pub fn fx_expectation_2(
        &self,
        i: usize,
        t0: f64,
        x_0: f64,
        zi_0: f64,
        z0_0: f64,
        dt: f64,
    ) -> f64 {
        let t1 = t0 + dt;
        x_0 + (self.hz(0, t1) - self.hz(0, t0)) * z0_0 - (self.hz(i + 1, t1) - self.hz(i + 1, t0)) * zi_0
    }

    /// State-independent part of the conditional mean of equity log-spot `k`.
    pub fn eq_expectation_1(&self, k: usize, t0: f64, dt: f64) -> Result<f64, ModelError> {
        self.check_index(AssetType::Eq, k)?;
        let t1 = t0 + dt;
        let c = self.eq_currency_index(k);
        let div = self.eq(k).dividend_curve();
        let rate = self.ir(c).term_structure();
        let mut res = (div.discount_factor(t1)? / div.discount_factor(t0)? * rate.discount_factor(t0)?
            / rate.discount_factor(t1)?)
        .ln();
        res -= 0.5 * (self.eq(k).variance(t1) - self.eq(k).variance(t0));
        res += self.h_h_zeta(c, t0, t1)?;
        res += self.rzs(0, k) * self.integral(t0, t1, &|u| self.hz(0, u) * self.az(0, u) * self.ss(k, u))?;
        if c > 0 {
            res -= self.rxs(c - 1, k) * self.integral(t0, t1, &|u| self.sx(c - 1, u) * self.ss(k, u))?;
            let (plain, weighted) = self.foreign_ir_drift_moments(c, t0, t1)?;
            res += self.hz(c, t1) * plain - weighted;
        }
        Ok(res)
    }

    /// State-dependent part of the equity conditional mean.
    pub fn eq_expectation_2(&self, k: usize, t0: f64, s_0: f64, zi_0: f64, dt: f64) -> f64 {
        let c = self.eq_currency_index(k);
        s_0 + (self.hz(c, t0 + dt) - self.hz(c, t0)) * zi_0
    }

    fn noise_terms(&self, asset: AssetType, i: usize, t_end: f64) -> Vec<NoiseTerm> {
        let term = |a: AssetType, j: usize, loading: Loading| NoiseTerm {
            brownian: self.component_index(a, j),
            loading,
        };
        let h_alpha = |ir: usize, sign: f64| {
            term(AssetType::Ir, ir, Loading::IrHAlpha {
                ir,
                h_end: self.hz(ir, t_end),
                sign,
            })
        };
        match asset {
            AssetType::Ir => vec![term(AssetType::Ir, i, Loading::IrAlpha { ir: i })],
            AssetType::Fx => vec![
                h_alpha(0, 1.0),
                h_alpha(i + 1, -1.0),
                term(AssetType::Fx, i, Loading::FxSigma { fx: i }),
            ],
            AssetType::Eq => vec![
                h_alpha(self.eq_currency_index(i), 1.0),
                term(AssetType::Eq, i, Loading::EqSigma { eq: i }),
            ],
            AssetType::Cr => Vec::new(),
        }
    }

    #[inline]
    fn loading_value(&self, loading: Loading, u: f64) -> f64 {
        match loading {
            Loading::IrAlpha { ir } => self.az(ir, u),
            Loading::IrHAlpha { ir, h_end, sign } => sign * (h_end - self.hz(ir, u)) * self.az(ir, u),
            Loading::FxSigma { fx } => self.sx(fx, u),
            Loading::EqSigma { eq } => self.ss(eq, u),
        }
    }

    /// Conditional covariance of two Gaussian state variables over
    /// `[t0, t0 + dt]`.
    ///
    /// # Errors
    /// `ModelError::Configuration` for credit components, which have no
    /// Gaussian representation.
    pub fn covariance(
        &self,
        a: AssetType,
        i: usize,
        b: AssetType,
        j: usize,
        t0: f64,
        dt: f64,
    ) -> Result<f64, ModelError> {
        self.check_index(a, i)?;
        self.check_index(b, j)?;
        if a == AssetType::Cr || b == AssetType::Cr {
            return Err(ModelError::config(
                "CrossAssetModel",
                "CIR++ components have no analytic Gaussian covariance",
            ));
        }
        let t1 = t0 + dt;
        let mut sum = 0.0;
        for p in self.noise_terms(a, i, t1) {
            for q in self.noise_terms(b, j, t1) {
                let rho = self.correlation_matrix().get(p.brownian, q.brownian);
                if rho == 0.0 {
                    continue;
                }
                sum += rho
                    * self.integral(t0, t1, &|u| {
                        self.loading_value(p.loading, u) * self.loading_value(q.loading, u)
                    })?;
            }
        }
        Ok(sum)
    }

    /// Covariance of IR states `i` and `j`; `ζ_i(t0+dt) - ζ_i(t0)` for `i == j`.
    pub fn ir_ir_covariance(&self, i: usize, j: usize, t0: f64, dt: f64) -> Result<f64, ModelError> {
        self.covariance(AssetType::Ir, i, AssetType::Ir, j, t0, dt)
    }

    /// Covariance of IR state `i` and FX log-spot `j`.
    pub fn ir_fx_covariance(&self, i: usize, j: usize, t0: f64, dt: f64) -> Result<f64, ModelError> {
        self.covariance(AssetType::Ir, i, AssetType::Fx, j, t0, dt)
    }

    /// Covariance of FX log-spots `i` and `j`.
    pub fn fx_fx_covariance(&self, i: usize, j: usize, t0: f64, dt: f64) -> Result<f64, ModelError> {
        self.covariance(AssetType::Fx, i, AssetType::Fx, j, t0, dt)
    }

    /// Covariance of IR state `i` and equity log-spot `k`.
    pub fn ir_eq_covariance(&self, i: usize, k: usize, t0: f64, dt: f64) -> Result<f64, ModelError> {
        self.covariance(AssetType::Ir, i, AssetType::Eq, k, t0, dt)
    }

    /// Covariance of FX log-spot `i` and equity log-spot `k`.
    pub fn fx_eq_covariance(&self, i: usize, k: usize, t0: f64, dt: f64) -> Result<f64, ModelError> {
        self.covariance(AssetType::Fx, i, AssetType::Eq, k, t0, dt)
    }

    /// Covariance of equity log-spots `k` and `l`.
    pub fn eq_eq_covariance(&self, k: usize, l: usize, t0: f64, dt: f64) -> Result<f64, ModelError> {
        self.covariance(AssetType::Eq, k, AssetType::Eq, l, t0, dt)
    }

    /// Asset type and component index of each Gaussian state variable.
    pub fn gaussian_states(&self) -> Vec<(AssetType, usize)> {
        (0..self.n_ir())
            .map(|i| (AssetType::Ir, i))
            .chain((0..self.n_fx()).map(|i| (AssetType::Fx, i)))
            .chain((0..self.n_eq()).map(|i| (AssetType::Eq, i)))
            .collect()
    }
}
