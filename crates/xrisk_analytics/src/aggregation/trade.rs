//! Trade-level exposure and allocation of netting set exposure to trades.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use tracing::debug;
use xrisk_core::market_data::curves::YieldCurve;
use xrisk_sim::cube::NpvCube;

use super::netted::{ExposureConfig, NettingSetExposure};
use super::profile::{bank_account_profiles, potential_future_exposure};
use crate::error::AggregationError;
use crate::portfolio::{NettingSetId, PortfolioRef, TradeId};

/// How netting set exposure is split across the trades of the set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AllocationMethod {
    /// Each trade keeps its stand-alone profile.
    #[default]
    None,
    /// Pro rata to stand-alone EPE and ENE per date.
    Marginal,
    /// Pro rata to as-of NPV.
    RelativeFairValue,
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AllocationMethod::None => "None",
            AllocationMethod::Marginal => "Marginal",
            AllocationMethod::RelativeFairValue => "RelativeFairValue",
        })
    }
}

impl FromStr for AllocationMethod {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(AllocationMethod::None),
            "Marginal" => Ok(AllocationMethod::Marginal),
            "RelativeFairValue" => Ok(AllocationMethod::RelativeFairValue),
            other => Err(AggregationError::config("allocation method", format!("unknown method {other}"))),
        }
    }
}

/// Stand-alone exposure of one trade plus its allocated share.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TradeExposure {
    /// Trade id
    pub trade_id: TradeId,
    /// Netting set of the trade
    pub netting_set_id: NettingSetId,
    /// As-of NPV
    pub npv0: f64,
    /// Exposure times in years
    pub times: Vec<f64>,
    /// Expected positive exposure (deflated)
    pub epe: Vec<f64>,
    /// Expected negative exposure (deflated)
    pub ene: Vec<f64>,
    /// Potential future exposure (deflated)
    pub pfe: Vec<f64>,
    /// Expected exposure under the bank account measure
    pub ee_b: Vec<f64>,
    /// Running max of `ee_b`
    pub eee_b: Vec<f64>,
    /// One-year time average of `ee_b`
    pub epe_b: f64,
    /// One-year time average of `eee_b`
    pub eepe_b: f64,
    /// Allocated share of the netting set EPE
    pub allocated_epe: Vec<f64>,
    /// Allocated share of the netting set ENE
    pub allocated_ene: Vec<f64>,
}

/// Stand-alone trade exposures from the trade cube.
pub struct TradeExposureCalculator<'a> {
    portfolio: &'a PortfolioRef,
    cube: &'a (dyn NpvCube + Sync),
    discount: &'a dyn YieldCurve<f64>,
    config: &'a ExposureConfig,
}

impl<'a> TradeExposureCalculator<'a> {
    /// Binds the inputs.
    pub fn new(
        portfolio: &'a PortfolioRef,
        cube: &'a (dyn NpvCube + Sync),
        discount: &'a dyn YieldCurve<f64>,
        config: &'a ExposureConfig,
    ) -> Self {
        Self {
            portfolio,
            cube,
            discount,
            config,
        }
    }

    /// Exposure of every trade, in portfolio order. Allocated profiles
    /// start as the stand-alone ones; see [`allocate`].
    pub fn build(&self) -> Result<Vec<TradeExposure>, AggregationError> {
        self.config.validate(self.cube.depth())?;
        self.portfolio
            .trades()
            .par_iter()
            .map(|(trade, ns)| self.trade_exposure(trade, ns))
            .collect()
    }

    fn trade_exposure(&self, trade: &TradeId, ns: &NettingSetId) -> Result<TradeExposure, AggregationError> {
        let cube = self.cube;
        let id = cube.index_of(trade.as_str())?;
        let (num_dates, samples) = (cube.num_dates(), cube.samples());
        let depth = self.config.exposure_depth();
        let npv0 = cube.get_t0(id, self.config.npv_depth)?;

        let mut epe = vec![0.0; num_dates + 1];
        let mut ene = vec![0.0; num_dates + 1];
        let mut pfe = vec![0.0; num_dates + 1];
        epe[0] = npv0.max(0.0);
        ene[0] = (-npv0).max(0.0);
        pfe[0] = epe[0];
        let mut column = vec![0.0; samples];
        for k in 0..num_dates {
            for (s, v) in column.iter_mut().enumerate() {
                *v = cube.get(id, k, s, depth)?;
            }
            if samples > 0 {
                let n = samples as f64;
                epe[k + 1] = column.iter().map(|v| v.max(0.0)).sum::<f64>() / n;
                ene[k + 1] = column.iter().map(|v| (-v).max(0.0)).sum::<f64>() / n;
            }
            pfe[k + 1] = potential_future_exposure(&mut column, self.config.pfe_quantile);
        }

        let times = self.config.times(cube.asof(), cube.dates());
        let b = bank_account_profiles(&epe, &times, cube.asof(), cube.dates(), self.discount)?;
        debug!(trade = %trade, epe_b = b.epe_b, "trade exposure");
        Ok(TradeExposure {
            trade_id: trade.clone(),
            netting_set_id: ns.clone(),
            npv0,
            times,
            allocated_epe: epe.clone(),
            allocated_ene: ene.clone(),
            epe,
            ene,
            pfe,
            ee_b: b.ee_b,
            eee_b: b.eee_b,
            epe_b: b.epe_b,
            eepe_b: b.eepe_b,
        })
    }
}

/// Splits the netting set EPE and ENE across `trades` (all in the set).
///
/// With `Marginal` a date where the trades' stand-alone exposures sum to
/// zero allocates nothing; with `RelativeFairValue` a zero NPV sum splits
/// evenly.
pub fn allocate(method: AllocationMethod, netting_set: &NettingSetExposure, trades: &mut [&mut TradeExposure]) {
    match method {
        AllocationMethod::None => {
            for t in trades.iter_mut() {
                t.allocated_epe = t.epe.clone();
                t.allocated_ene = t.ene.clone();
            }
        }
        AllocationMethod::Marginal => {
            let n = netting_set.epe.len();
            for k in 0..n {
                let sum_epe: f64 = trades.iter().map(|t| t.epe[k]).sum();
                let sum_ene: f64 = trades.iter().map(|t| t.ene[k]).sum();
                for t in trades.iter_mut() {
                    t.allocated_epe[k] = share(netting_set.epe[k], t.epe[k], sum_epe);
                    t.allocated_ene[k] = share(netting_set.ene[k], t.ene[k], sum_ene);
                }
            }
        }
        AllocationMethod::RelativeFairValue => {
            let total: f64 = trades.iter().map(|t| t.npv0).sum();
            let count = trades.len() as f64;
            for t in trades.iter_mut() {
                let w = if total.abs() > 1e-12 { t.npv0 / total } else { 1.0 / count };
                t.allocated_epe = netting_set.epe.iter().map(|e| e * w).collect();
                t.allocated_ene = netting_set.ene.iter().map(|e| e * w).collect();
            }
        }
    }
}

#[inline]
fn share(total: f64, part: f64, sum: f64) -> f64 {
    if sum.abs() > 1e-12 {
        total * part / sum
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::{Counterparty, CreditParams, NettingSetDefinition};
    use approx::assert_relative_eq;
    use xrisk_core::market_data::curves::FlatCurve;
    use xrisk_core::types::Date;
    use xrisk_sim::cube::InMemoryCube;

    fn profile(epe: &[f64], ene: &[f64], npv0: f64) -> TradeExposure {
        TradeExposure {
            npv0,
            epe: epe.to_vec(),
            ene: ene.to_vec(),
            allocated_epe: epe.to_vec(),
            allocated_ene: ene.to_vec(),
            ..TradeExposure::default()
        }
    }

    #[test]
    fn test_trade_profiles_from_cube() {
        let asof = Date::from_ymd(2025, 1, 2).unwrap();
        let mut p = PortfolioRef::new();
        p.add_counterparty(Counterparty::new("CP".into(), CreditParams::new(0.01, 0.6).unwrap()))
            .unwrap();
        p.add_netting_set(NettingSetDefinition::new("NS".into(), "CP".into()))
            .unwrap();
        p.add_trade("T".into(), "NS".into()).unwrap();
        let dates = vec![asof.add_days(365).unwrap()];
        let mut cube = InMemoryCube::new(asof, vec!["T".into()], dates, 4, 1).unwrap();
        cube.set_t0(-1.0, 0, 0).unwrap();
        for (s, v) in [4.0, -2.0, 6.0, 0.0].iter().enumerate() {
            cube.set(*v, 0, 0, s, 0).unwrap();
        }
        let curve = FlatCurve::new(0.0);
        let config = ExposureConfig::new("EUR");
        let out = TradeExposureCalculator::new(&p, &cube, &curve, &config).build().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].epe[0], 0.0);
        assert_eq!(out[0].ene[0], 1.0);
        assert_relative_eq!(out[0].epe[1], 2.5);
        assert_relative_eq!(out[0].ene[1], 0.5);
        assert_relative_eq!(out[0].pfe[1], 6.0);
    }

    #[test]
    fn test_marginal_allocation_sums_to_netting_set() {
        let ns = NettingSetExposure {
            epe: vec![3.0, 6.0],
            ene: vec![1.0, 0.0],
            ..NettingSetExposure::default()
        };
        let mut a = profile(&[2.0, 4.0], &[1.0, 0.0], 1.0);
        let mut b = profile(&[2.0, 8.0], &[3.0, 0.0], 1.0);
        allocate(AllocationMethod::Marginal, &ns, &mut [&mut a, &mut b]);
        for k in 0..2 {
            assert_relative_eq!(a.allocated_epe[k] + b.allocated_epe[k], ns.epe[k], epsilon = 1e-12);
        }
        assert_relative_eq!(a.allocated_epe[1], 2.0);
        assert_relative_eq!(a.allocated_ene[0], 0.25);
        assert_eq!(a.allocated_ene[1], 0.0);
    }

    #[test]
    fn test_relative_fair_value_even_split_on_zero_sum() {
        let ns = NettingSetExposure {
            epe: vec![4.0],
            ene: vec![2.0],
            ..NettingSetExposure::default()
        };
        let mut a = profile(&[0.0], &[0.0], 5.0);
        let mut b = profile(&[0.0], &[0.0], -5.0);
        allocate(AllocationMethod::RelativeFairValue, &ns, &mut [&mut a, &mut b]);
        assert_relative_eq!(a.allocated_epe[0], 2.0);
        assert_relative_eq!(b.allocated_ene[0], 1.0);
    }

    #[test]
    fn test_method_names() {
        assert_eq!("Marginal".parse::<AllocationMethod>().unwrap(), AllocationMethod::Marginal);
        assert!("Pro-rata".parse::<AllocationMethod>().is_err());
    }
}
