//! End-to-end aggregation of a trade cube into exposures and XVA.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;
use xrisk_core::market_data::curves::YieldCurve;
use xrisk_sim::cube::{AggregationScenarioData, InMemoryCube, NpvCube};

use super::netted::{ExposureConfig, NettedExposureCalculator, NettingSetExposure};
use super::trade::{allocate, AllocationMethod, TradeExposure, TradeExposureCalculator};
use super::xva::{FundingCurves, KvaParams, TradeXva, ValueAdjustmentCalculator, XvaResult};
use crate::error::AggregationError;
use crate::portfolio::{CounterpartyId, CreditParams, NettingSetId, PortfolioRef, TradeId};

/// Post-processing settings.
#[derive(Clone, Debug, Default)]
pub struct PostProcessConfig {
    /// Exposure settings
    pub exposure: ExposureConfig,
    /// Allocation of netting set exposure to trades
    pub allocation: AllocationMethod,
    /// Own credit for DVA and survival weighting
    pub own_credit: Option<CreditParams>,
    /// Funding curves for FCA and FBA
    pub funding: Option<FundingCurves>,
    /// KVA settings
    pub kva: Option<KvaParams>,
}

/// Exposure and adjustments of one netting set.
#[derive(Clone, Debug, PartialEq)]
pub struct NettingSetResult {
    /// Counterparty of the netting set
    pub counterparty: CounterpartyId,
    /// Exposure profiles
    pub exposure: NettingSetExposure,
    /// Value adjustments
    pub xva: XvaResult,
}

/// Exposure and adjustments of one trade.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeResult {
    /// Stand-alone and allocated profiles
    pub exposure: TradeExposure,
    /// Stand-alone and allocated adjustments
    pub xva: TradeXva,
}

/// Output of [`PostProcess::run`].
#[derive(Clone, Debug)]
pub struct PostProcessResult {
    /// Per netting set
    pub netting_sets: BTreeMap<NettingSetId, NettingSetResult>,
    /// Per trade
    pub trades: BTreeMap<TradeId, TradeResult>,
    /// Netted exposure cube
    pub netted_cube: InMemoryCube,
}

impl PostProcessResult {
    /// Sum of the netting set adjustments.
    pub fn totals(&self) -> XvaResult {
        self.netting_sets.values().fold(XvaResult::default(), |mut acc, r| {
            let x = &r.xva;
            acc.cva += x.cva;
            acc.dva += x.dva;
            acc.fca += x.fca;
            acc.fba += x.fba;
            acc.fca_ex_own_sp += x.fca_ex_own_sp;
            acc.fba_ex_own_sp += x.fba_ex_own_sp;
            acc.fca_ex_all_sp += x.fca_ex_all_sp;
            acc.fba_ex_all_sp += x.fba_ex_all_sp;
            acc.colva += x.colva;
            acc.collateral_floor += x.collateral_floor;
            acc.kva += x.kva;
            acc
        })
    }
}

/// Validated aggregation run over a trade cube.
///
/// Construction checks that the cube holds exactly the portfolio's trades,
/// that the configured depths exist and that the scenario data has the
/// cube's shape.
pub struct PostProcess<'a> {
    portfolio: &'a PortfolioRef,
    cube: &'a (dyn NpvCube + Sync),
    scenario_data: &'a AggregationScenarioData,
    discount: Arc<dyn YieldCurve<f64>>,
    config: PostProcessConfig,
}

impl<'a> PostProcess<'a> {
    /// Validates and binds the inputs.
    ///
    /// # Errors
    /// `InputMismatch` for cube/portfolio/scenario data disagreements,
    /// `Configuration` for invalid settings.
    pub fn new(
        portfolio: &'a PortfolioRef,
        cube: &'a (dyn NpvCube + Sync),
        scenario_data: &'a AggregationScenarioData,
        discount: Arc<dyn YieldCurve<f64>>,
        config: PostProcessConfig,
    ) -> Result<Self, AggregationError> {
        let cube_ids: BTreeSet<&str> = cube.ids().iter().map(String::as_str).collect();
        let trade_ids: BTreeSet<&str> = portfolio.trades().iter().map(|(t, _)| t.as_str()).collect();
        if let Some(missing) = trade_ids.difference(&cube_ids).next() {
            return Err(AggregationError::InputMismatch(format!("trade {missing} not in cube")));
        }
        if let Some(extra) = cube_ids.difference(&trade_ids).next() {
            return Err(AggregationError::InputMismatch(format!("cube id {extra} not in portfolio")));
        }
        config.exposure.validate(cube.depth())?;
        if let Some(kva) = &config.kva {
            kva.validate()?;
        }
        if scenario_data.dim_dates() != cube.num_dates() || scenario_data.dim_samples() != cube.samples() {
            return Err(AggregationError::InputMismatch(format!(
                "scenario data is {} dates x {} samples, cube is {} x {}",
                scenario_data.dim_dates(),
                scenario_data.dim_samples(),
                cube.num_dates(),
                cube.samples()
            )));
        }
        Ok(Self {
            portfolio,
            cube,
            scenario_data,
            discount,
            config,
        })
    }

    fn xva_calculator(&self) -> Result<ValueAdjustmentCalculator, AggregationError> {
        let mut calc = ValueAdjustmentCalculator::new(Arc::clone(&self.discount));
        if let Some(own) = self.config.own_credit {
            calc = calc.with_own_credit(own);
        }
        if let Some(funding) = &self.config.funding {
            calc = calc.with_funding(funding.clone());
        }
        if let Some(kva) = self.config.kva {
            calc = calc.with_kva(kva)?;
        }
        Ok(calc)
    }

    fn counterparty_credit(&self, ns: &NettingSetId) -> Result<(CounterpartyId, CreditParams), AggregationError> {
        let id = self.portfolio.counterparty_of(ns)?;
        Ok((id.clone(), *self.portfolio.counterparty(id)?.credit()))
    }

    /// Netted exposure, trade exposure, allocation and XVA.
    pub fn run(&self) -> Result<PostProcessResult, AggregationError> {
        let discount = self.discount.as_ref();
        let exposure = &self.config.exposure;
        let netted =
            NettedExposureCalculator::new(self.portfolio, self.cube, self.scenario_data, discount, exposure).build()?;
        let mut trades = TradeExposureCalculator::new(self.portfolio, self.cube, discount, exposure).build()?;

        let mut by_netting_set: BTreeMap<NettingSetId, Vec<&mut TradeExposure>> = BTreeMap::new();
        for t in trades.iter_mut() {
            by_netting_set.entry(t.netting_set_id.clone()).or_default().push(t);
        }
        for (ns, mut list) in by_netting_set {
            let profile = netted
                .netting_sets
                .get(&ns)
                .ok_or_else(|| AggregationError::InputMismatch(format!("netting set {ns} was not aggregated")))?;
            allocate(self.config.allocation, profile, &mut list);
        }

        let calc = self.xva_calculator()?;
        let netting_sets = netted
            .netting_sets
            .par_iter()
            .map(|(ns, exposure)| {
                let (counterparty, credit) = self.counterparty_credit(ns)?;
                let xva = calc.netting_set_xva(exposure, &credit)?;
                Ok((
                    ns.clone(),
                    NettingSetResult {
                        counterparty,
                        exposure: exposure.clone(),
                        xva,
                    },
                ))
            })
            .collect::<Result<BTreeMap<_, _>, AggregationError>>()?;

        let trade_results = trades
            .into_par_iter()
            .map(|exposure| {
                let (_, credit) = self.counterparty_credit(&exposure.netting_set_id)?;
                let xva = calc.trade_xva(&exposure, &credit)?;
                Ok((exposure.trade_id.clone(), TradeResult { exposure, xva }))
            })
            .collect::<Result<BTreeMap<_, _>, AggregationError>>()?;

        let result = PostProcessResult {
            netting_sets,
            trades: trade_results,
            netted_cube: netted.cube,
        };
        let totals = result.totals();
        info!(
            netting_sets = result.netting_sets.len(),
            trades = result.trades.len(),
            cva = totals.cva,
            dva = totals.dva,
            fva = totals.fva(),
            "post-processing done"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::{Counterparty, NettingSetDefinition};
    use approx::assert_relative_eq;
    use xrisk_core::market_data::curves::FlatCurve;
    use xrisk_core::types::Date;
    use xrisk_sim::cube::AggregationScenarioDataType;

    fn setup() -> (PortfolioRef, InMemoryCube, AggregationScenarioData) {
        let asof = Date::from_ymd(2025, 1, 2).unwrap();
        let mut p = PortfolioRef::new();
        p.add_counterparty(Counterparty::new("CP".into(), CreditParams::new(0.02, 0.6).unwrap()))
            .unwrap();
        p.add_netting_set(NettingSetDefinition::new("NS".into(), "CP".into()))
            .unwrap();
        p.add_trade("A".into(), "NS".into()).unwrap();
        p.add_trade("B".into(), "NS".into()).unwrap();
        let dates = vec![asof.add_days(365).unwrap(), asof.add_days(730).unwrap()];
        let mut cube = InMemoryCube::new(asof, vec!["A".into(), "B".into()], dates, 2, 1).unwrap();
        let mut data = AggregationScenarioData::new(2, 2);
        for k in 0..2 {
            for s in 0..2 {
                cube.set(10.0, 0, k, s, 0).unwrap();
                cube.set(-4.0, 1, k, s, 0).unwrap();
                data.set(k, s, 1.0, AggregationScenarioDataType::Numeraire, "").unwrap();
            }
        }
        (p, cube, data)
    }

    #[test]
    fn test_run_produces_netting_set_and_trade_results() {
        let (p, cube, data) = setup();
        let config = PostProcessConfig {
            allocation: AllocationMethod::Marginal,
            ..PostProcessConfig::default()
        };
        let pp = PostProcess::new(&p, &cube, &data, Arc::new(FlatCurve::new(0.0)), config).unwrap();
        let out = pp.run().unwrap();
        let ns = &out.netting_sets[&NettingSetId::new("NS")];
        assert_relative_eq!(ns.exposure.epe[1], 6.0);
        let expected_cva = 0.6 * ((-0.02f64 * 0.0).exp() - (-0.04f64).exp()) * 6.0;
        assert_relative_eq!(ns.xva.cva, expected_cva, epsilon = 1e-3);
        // B has no positive exposure, so A carries all of it
        let a = &out.trades[&TradeId::new("A")];
        assert_relative_eq!(a.exposure.allocated_epe[1], 6.0);
        assert_relative_eq!(a.xva.allocated_cva, ns.xva.cva, epsilon = 1e-12);
        assert!(a.xva.xva.cva > ns.xva.cva);
        assert_eq!(out.netted_cube.num_ids(), 1);
    }

    #[test]
    fn test_rejects_unknown_cube_id() {
        let (mut p, cube, data) = setup();
        p.add_trade("C".into(), "NS".into()).unwrap();
        let err = PostProcess::new(&p, &cube, &data, Arc::new(FlatCurve::new(0.0)), PostProcessConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("trade C not in cube"));
    }

    #[test]
    fn test_rejects_scenario_shape_mismatch() {
        let (p, cube, _) = setup();
        let data = AggregationScenarioData::new(3, 2);
        assert!(PostProcess::new(&p, &cube, &data, Arc::new(FlatCurve::new(0.0)), PostProcessConfig::default()).is_err());
    }

    #[test]
    fn test_rejects_depth_out_of_range() {
        let (p, cube, data) = setup();
        let mut config = PostProcessConfig::default();
        config.exposure.npv_depth = 1;
        assert!(PostProcess::new(&p, &cube, &data, Arc::new(FlatCurve::new(0.0)), config).is_err());
    }
}
