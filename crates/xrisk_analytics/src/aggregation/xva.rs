//! Value adjustments from exposure profiles.
//!
//! # Formulas
//!
//! Over the exposure times `t_0 = 0 < t_1 < ... < t_n`, with counterparty
//! survival `S_c`, own survival `S_o` and funding factors
//! `dcf_f(j) = P_f(t_j) / P_f(t_{j+1}) - P_ois(t_j) / P_ois(t_{j+1})`:
//!
//! ```text
//! CVA = Σ_j LGD_c (S_c(t_j) - S_c(t_{j+1})) EPE(t_{j+1})
//! DVA = Σ_j LGD_o (S_o(t_j) - S_o(t_{j+1})) ENE(t_{j+1})
//! FCA = Σ_j S_c(t_j) S_o(t_j) EPE(t_{j+1}) dcf_borrow(j)
//! FBA = Σ_j S_c(t_j) S_o(t_j) ENE(t_{j+1}) dcf_lend(j)
//! ```
//!
//! EPE and ENE are deflated, so no further discounting applies. KVA uses
//! the Basel IRB capital formula on the undiscounted `ee_b` profile.

use std::fmt;
use std::sync::Arc;

use xrisk_core::market_data::curves::YieldCurve;
use xrisk_core::math::{cumulative_normal, inverse_cumulative_normal};

use super::netted::NettingSetExposure;
use super::profile::running_max;
use super::trade::TradeExposure;
use crate::error::AggregationError;
use crate::portfolio::{CreditParams, TradeId};

/// Funding curves for FCA and FBA.
#[derive(Clone)]
pub struct FundingCurves {
    /// Curve at which positive exposure is funded
    pub borrowing: Arc<dyn YieldCurve<f64>>,
    /// Curve at which negative exposure earns
    pub lending: Arc<dyn YieldCurve<f64>>,
    /// Risk-free (OIS) curve
    pub ois: Arc<dyn YieldCurve<f64>>,
}

impl fmt::Debug for FundingCurves {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FundingCurves").finish_non_exhaustive()
    }
}

impl FundingCurves {
    fn factors(curve: &dyn YieldCurve<f64>, ois: &dyn YieldCurve<f64>, t0: f64, t1: f64) -> Result<f64, AggregationError> {
        Ok(curve.discount_factor(t0)? / curve.discount_factor(t1)? - ois.discount_factor(t0)? / ois.discount_factor(t1)?)
    }
}

/// Capital valuation adjustment settings.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KvaParams {
    /// EAD multiplier on EEPE
    pub alpha: f64,
    /// Capital ratio applied to risk-weighted assets
    pub capital_ratio: f64,
    /// Annual cost of capital
    pub hurdle_rate: f64,
    /// Floor on the one-year PD
    pub pd_floor: f64,
}

impl Default for KvaParams {
    fn default() -> Self {
        Self {
            alpha: 1.4,
            capital_ratio: 0.08,
            hurdle_rate: 0.1,
            pd_floor: 0.0003,
        }
    }
}

impl KvaParams {
    /// Checks that every setting is non-negative and the PD floor below 1.
    pub fn validate(&self) -> Result<(), AggregationError> {
        for (name, v) in [
            ("alpha", self.alpha),
            ("capital_ratio", self.capital_ratio),
            ("hurdle_rate", self.hurdle_rate),
            ("pd_floor", self.pd_floor),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(AggregationError::config(name, format!("must be non-negative, got {v}")));
            }
        }
        if self.pd_floor >= 1.0 {
            return Err(AggregationError::config("pd_floor", "must be below 1"));
        }
        Ok(())
    }
}

/// Value adjustments of a netting set or trade.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XvaResult {
    /// Credit value adjustment
    pub cva: f64,
    /// Debit value adjustment
    pub dva: f64,
    /// Funding cost adjustment
    pub fca: f64,
    /// Funding benefit adjustment
    pub fba: f64,
    /// FCA without own survival
    pub fca_ex_own_sp: f64,
    /// FBA without own survival
    pub fba_ex_own_sp: f64,
    /// FCA without any survival
    pub fca_ex_all_sp: f64,
    /// FBA without any survival
    pub fba_ex_all_sp: f64,
    /// Collateral value adjustment (netting sets only)
    pub colva: f64,
    /// Collateral floor value (netting sets only)
    pub collateral_floor: f64,
    /// Capital value adjustment (netting sets only)
    pub kva: f64,
}

impl XvaResult {
    /// FCA - FBA.
    #[inline]
    pub fn fva(&self) -> f64 {
        self.fca - self.fba
    }

    /// CVA - DVA.
    #[inline]
    pub fn bilateral_cva(&self) -> f64 {
        self.cva - self.dva
    }
}

/// Stand-alone and allocated value adjustments of a trade.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TradeXva {
    /// Trade id
    pub trade_id: TradeId,
    /// Stand-alone adjustments
    pub xva: XvaResult,
    /// CVA on the allocated EPE
    pub allocated_cva: f64,
    /// DVA on the allocated ENE
    pub allocated_dva: f64,
}

/// Computes CVA, DVA, FCA, FBA and KVA from exposure profiles.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use xrisk_analytics::aggregation::ValueAdjustmentCalculator;
/// use xrisk_analytics::portfolio::CreditParams;
/// use xrisk_core::market_data::curves::FlatCurve;
///
/// let calc = ValueAdjustmentCalculator::new(Arc::new(FlatCurve::new(0.02)));
/// let cpty = CreditParams::new(0.02, 0.6).unwrap();
/// let times = [0.0, 1.0, 2.0];
/// let epe = [100.0, 100.0, 100.0];
/// let xva = calc.value_adjustments(&times, &epe, &[0.0; 3], &cpty).unwrap();
/// assert!((xva.cva - 0.6 * (1.0 - (-0.04f64).exp()) * 100.0).abs() < 1e-10);
/// assert_eq!(xva.dva, 0.0);
/// ```
#[derive(Clone)]
pub struct ValueAdjustmentCalculator {
    discount: Arc<dyn YieldCurve<f64>>,
    own_credit: Option<CreditParams>,
    funding: Option<FundingCurves>,
    kva: Option<KvaParams>,
}

impl fmt::Debug for ValueAdjustmentCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueAdjustmentCalculator")
            .field("own_credit", &self.own_credit)
            .field("funding", &self.funding)
            .field("kva", &self.kva)
            .finish_non_exhaustive()
    }
}

impl ValueAdjustmentCalculator {
    /// CVA only; `discount` is used for KVA discounting.
    pub fn new(discount: Arc<dyn YieldCurve<f64>>) -> Self {
        Self {
            discount,
            own_credit: None,
            funding: None,
            kva: None,
        }
    }

    /// Enables DVA and own survival weighting.
    pub fn with_own_credit(mut self, own_credit: CreditParams) -> Self {
        self.own_credit = Some(own_credit);
        self
    }

    /// Enables FCA and FBA.
    pub fn with_funding(mut self, funding: FundingCurves) -> Self {
        self.funding = Some(funding);
        self
    }

    /// Enables KVA.
    pub fn with_kva(mut self, kva: KvaParams) -> Result<Self, AggregationError> {
        kva.validate()?;
        self.kva = Some(kva);
        Ok(self)
    }

    fn own_survival(&self, t: f64) -> f64 {
        self.own_credit.map_or(1.0, |c| c.survival_prob(t))
    }

    /// CVA, DVA, FCA and FBA for deflated profiles on `times`.
    ///
    /// # Errors
    /// `InputMismatch` when the profile lengths differ from `times`.
    pub fn value_adjustments(
        &self,
        times: &[f64],
        epe: &[f64],
        ene: &[f64],
        counterparty: &CreditParams,
    ) -> Result<XvaResult, AggregationError> {
        if epe.len() != times.len() || ene.len() != times.len() {
            return Err(AggregationError::InputMismatch(format!(
                "profiles of length {} and {} on {} times",
                epe.len(),
                ene.len(),
                times.len()
            )));
        }
        let mut r = XvaResult::default();
        for j in 0..times.len().saturating_sub(1) {
            let (t0, t1) = (times[j], times[j + 1]);
            let sc0 = counterparty.survival_prob(t0);
            let so0 = self.own_survival(t0);
            r.cva += counterparty.lgd() * (sc0 - counterparty.survival_prob(t1)) * epe[j + 1];
            if let Some(own) = &self.own_credit {
                r.dva += own.lgd() * (so0 - own.survival_prob(t1)) * ene[j + 1];
            }
            if let Some(f) = &self.funding {
                let borrow = FundingCurves::factors(f.borrowing.as_ref(), f.ois.as_ref(), t0, t1)?;
                let lend = FundingCurves::factors(f.lending.as_ref(), f.ois.as_ref(), t0, t1)?;
                let fca = epe[j + 1] * borrow;
                let fba = ene[j + 1] * lend;
                r.fca += sc0 * so0 * fca;
                r.fba += sc0 * so0 * fba;
                r.fca_ex_own_sp += sc0 * fca;
                r.fba_ex_own_sp += sc0 * fba;
                r.fca_ex_all_sp += fca;
                r.fba_ex_all_sp += fba;
            }
        }
        Ok(r)
    }

    /// Adjustments of a netting set, including COLVA, the collateral floor
    /// and KVA when enabled.
    pub fn netting_set_xva(
        &self,
        exposure: &NettingSetExposure,
        counterparty: &CreditParams,
    ) -> Result<XvaResult, AggregationError> {
        let mut r = self.value_adjustments(&exposure.times, &exposure.epe, &exposure.ene, counterparty)?;
        r.colva = exposure.colva;
        r.collateral_floor = exposure.collateral_floor;
        if let Some(params) = &self.kva {
            r.kva = self.kva(params, &exposure.times, &exposure.ee_b, counterparty)?;
        }
        Ok(r)
    }

    /// Stand-alone and allocated adjustments of a trade.
    pub fn trade_xva(&self, trade: &TradeExposure, counterparty: &CreditParams) -> Result<TradeXva, AggregationError> {
        let xva = self.value_adjustments(&trade.times, &trade.epe, &trade.ene, counterparty)?;
        let allocated = self.value_adjustments(&trade.times, &trade.allocated_epe, &trade.allocated_ene, counterparty)?;
        Ok(TradeXva {
            trade_id: trade.trade_id.clone(),
            xva,
            allocated_cva: allocated.cva,
            allocated_dva: allocated.dva,
        })
    }

    /// Cost of holding CCR capital over the life of the profile.
    ///
    /// Capital at `t_j` is `EAD * K * 12.5 * capital_ratio` with
    /// `EAD = alpha * EEPE(t_j)`, EEPE the one-year average of the running
    /// max of `ee_b` seen from `t_j`, and `K` the IRB capital requirement
    /// for the counterparty's one-year PD with the IMM effective maturity.
    pub fn kva(
        &self,
        params: &KvaParams,
        times: &[f64],
        ee_b: &[f64],
        counterparty: &CreditParams,
    ) -> Result<f64, AggregationError> {
        if ee_b.len() != times.len() {
            return Err(AggregationError::InputMismatch(format!(
                "ee_b of length {} on {} times",
                ee_b.len(),
                times.len()
            )));
        }
        let pd = counterparty.default_prob(1.0).max(params.pd_floor);
        let r = asset_correlation(pd);
        let b = (0.11852 - 0.05478 * pd.ln()).powi(2);
        let unexpected = cumulative_normal(
            (inverse_cumulative_normal(pd) + r.sqrt() * inverse_cumulative_normal(0.999)) / (1.0 - r).sqrt(),
        ) - pd;

        let mut kva = 0.0;
        for j in 0..times.len().saturating_sub(1) {
            let (eepe, maturity) = self.effective_exposure(times, ee_b, j)?;
            let ma = (1.0 + (maturity - 2.5) * b) / (1.0 - 1.5 * b);
            let k = counterparty.lgd() * unexpected * ma;
            let capital = params.alpha * eepe * k * 12.5 * params.capital_ratio;
            let t1 = times[j + 1];
            let dt = t1 - times[j];
            kva += capital * params.hurdle_rate * dt * self.discount.discount_factor(t1)? * self.own_survival(t1);
        }
        Ok(kva)
    }

    /// One-year EEPE and IMM effective maturity seen from `times[j]`.
    fn effective_exposure(&self, times: &[f64], ee_b: &[f64], j: usize) -> Result<(f64, f64), AggregationError> {
        let horizon = times[j] + 1.0;
        let p_j = self.discount.discount_factor(times[j])?;
        let eee = running_max(&ee_b[j..]);
        let (mut sum, mut weight) = (0.0, 0.0);
        let (mut within, mut beyond) = (0.0, 0.0);
        for k in j + 1..times.len() {
            let dt = times[k] - times[k - 1];
            let df = self.discount.discount_factor(times[k])? / p_j;
            if times[k] <= horizon + 1e-9 {
                sum += eee[k - j] * dt;
                weight += dt;
                within += eee[k - j] * dt * df;
            } else {
                beyond += ee_b[k] * dt * df;
            }
        }
        let eepe = if weight > 0.0 { sum / weight } else { ee_b[j] };
        let maturity = if within > 0.0 { (1.0 + beyond / within).clamp(1.0, 5.0) } else { 1.0 };
        Ok((eepe, maturity))
    }
}

/// Basel IRB asset correlation for corporate exposures.
pub(crate) fn asset_correlation(pd: f64) -> f64 {
    let w = (1.0 - (-50.0 * pd).exp()) / (1.0 - (-50.0f64).exp());
    0.12 * w + 0.24 * (1.0 - w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use xrisk_core::market_data::curves::FlatCurve;

    fn calc() -> ValueAdjustmentCalculator {
        ValueAdjustmentCalculator::new(Arc::new(FlatCurve::new(0.0)))
    }

    #[test]
    fn test_cva_telescopes_for_flat_exposure() {
        let cpty = CreditParams::new(0.03, 0.6).unwrap();
        let times = [0.0, 0.5, 1.0, 2.0];
        let xva = calc().value_adjustments(&times, &[50.0; 4], &[0.0; 4], &cpty).unwrap();
        assert_relative_eq!(xva.cva, 0.6 * (1.0 - (-0.06f64).exp()) * 50.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dva_needs_own_credit() {
        let cpty = CreditParams::new(0.03, 0.6).unwrap();
        let own = CreditParams::new(0.01, 0.4).unwrap();
        let times = [0.0, 1.0];
        let ene = [0.0, 10.0];
        assert_eq!(calc().value_adjustments(&times, &[0.0; 2], &ene, &cpty).unwrap().dva, 0.0);
        let dva = calc()
            .with_own_credit(own)
            .value_adjustments(&times, &[0.0; 2], &ene, &cpty)
            .unwrap()
            .dva;
        assert_relative_eq!(dva, 0.4 * (1.0 - (-0.01f64).exp()) * 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_funding_variants_order() {
        let cpty = CreditParams::new(0.05, 0.6).unwrap();
        let own = CreditParams::new(0.02, 0.6).unwrap();
        let funding = FundingCurves {
            borrowing: Arc::new(FlatCurve::new(0.03)),
            lending: Arc::new(FlatCurve::new(0.02)),
            ois: Arc::new(FlatCurve::new(0.01)),
        };
        let times = [0.0, 1.0, 2.0];
        let xva = calc()
            .with_own_credit(own)
            .with_funding(funding)
            .value_adjustments(&times, &[0.0, 100.0, 100.0], &[0.0, 20.0, 20.0], &cpty)
            .unwrap();
        let dcf = 0.03f64.exp() - 0.01f64.exp();
        assert_relative_eq!(xva.fca_ex_all_sp, 200.0 * dcf, epsilon = 1e-10);
        assert!(xva.fca < xva.fca_ex_own_sp && xva.fca_ex_own_sp < xva.fca_ex_all_sp);
        assert!(xva.fba > 0.0 && xva.fba < xva.fba_ex_all_sp);
        assert_relative_eq!(xva.fva(), xva.fca - xva.fba);
    }

    #[test]
    fn test_profile_length_mismatch() {
        let cpty = CreditParams::new(0.03, 0.6).unwrap();
        assert!(calc().value_adjustments(&[0.0, 1.0], &[1.0], &[0.0, 0.0], &cpty).is_err());
    }

    #[test]
    fn test_kva_grows_with_default_risk() {
        let times: Vec<f64> = (0..=20).map(|i| i as f64 * 0.25).collect();
        let ee_b: Vec<f64> = times.iter().map(|t| 100.0 * (1.0 - t / 5.0).max(0.0) * t.sqrt()).collect();
        let c = calc().with_kva(KvaParams::default()).unwrap();
        let params = KvaParams::default();
        let low = c.kva(&params, &times, &ee_b, &CreditParams::new(0.005, 0.6).unwrap()).unwrap();
        let high = c.kva(&params, &times, &ee_b, &CreditParams::new(0.05, 0.6).unwrap()).unwrap();
        assert!(low > 0.0);
        assert!(high > low);
        let zero = c.kva(&params, &times, &vec![0.0; times.len()], &CreditParams::new(0.05, 0.6).unwrap()).unwrap();
        assert_eq!(zero, 0.0);
    }

    #[test]
    fn test_asset_correlation_bounds() {
        assert_relative_eq!(asset_correlation(0.0), 0.24, epsilon = 1e-12);
        assert!((asset_correlation(1.0) - 0.12).abs() < 1e-12);
        assert!(KvaParams { pd_floor: 1.5, ..KvaParams::default() }.validate().is_err());
    }
}
