//! LGM zero bond cube: the deflated NPV is a martingale under the LGM
//! numeraire, so its sample mean at every date matches today's price.

use std::sync::Arc;

use approx::assert_relative_eq;
use xrisk_core::market_data::curves::FlatCurve;
use xrisk_core::types::{Date, DayCountConvention, Period};
use xrisk_models::model::{CorrelationMatrix, CrossAssetModel};
use xrisk_models::parametrization::LgmConstant;
use xrisk_models::{CrossAssetStateProcess, Discretization};
use xrisk_sim::cube::{AggregationScenarioDataType, InMemoryCube, NpvCube};
use xrisk_sim::engine::products::ZeroCouponBondData;
use xrisk_sim::engine::{
    NpvCalculator, ParallelConfig, Portfolio, PricingRegistry, ProductData, RunContext, TradeSpec,
    ValuationCalculator, ValuationEngine,
};
use xrisk_sim::market::SimMarketConfig;
use xrisk_sim::scenario::{CrossAssetModelScenarioGenerator, DateGrid, GeneratorSettings, SequenceType};

const RATE: f64 = 0.02;
const SAMPLES: usize = 4000;

fn asof() -> Date {
    Date::from_ymd(2025, 1, 2).unwrap()
}

fn period(s: &str) -> Period {
    s.parse().unwrap()
}

fn setup(sequence: SequenceType) -> (ValuationEngine, Portfolio) {
    let dc = DayCountConvention::Actual365Fixed;
    let lgm = LgmConstant::new("EUR", Arc::new(FlatCurve::new(RATE)), 0.01, 0.03).unwrap();
    let model =
        CrossAssetModel::new(vec![Arc::new(lgm)], vec![], vec![], vec![], CorrelationMatrix::identity(1)).unwrap();
    let process = Arc::new(CrossAssetStateProcess::new(Arc::new(model), Discretization::Exact).unwrap());
    let config = Arc::new(SimMarketConfig::single_currency(
        "EUR",
        vec![period("1Y"), period("2Y"), period("3Y")],
    ));
    let grid = DateGrid::from_tenors(asof(), &[period("1Y"), period("2Y")], dc).unwrap();

    let registry = Arc::new(PricingRegistry::with_defaults());
    let context = Arc::new(RunContext::new(asof(), "EUR", dc, Arc::clone(&registry)));
    let settings = GeneratorSettings { sequence, seed: 7 };
    let builder = CrossAssetModelScenarioGenerator::builder(process, Arc::clone(&config), asof(), dc, settings);
    let engine = ValuationEngine::new(context, grid, builder, config).unwrap();

    let spec = TradeSpec {
        id: "ZCB_3Y".into(),
        netting_set_id: "NS".into(),
        model: Default::default(),
        engine: Default::default(),
        data: ProductData::ZeroCouponBond(ZeroCouponBondData {
            currency: "EUR".into(),
            notional: 100.0,
            maturity: Date::from_ymd(2028, 1, 2).unwrap(),
        }),
    };
    let portfolio = Portfolio::from_specs(&[spec], &registry).unwrap();
    (engine, portfolio)
}

fn mean(cube: &dyn NpvCube, date: usize) -> f64 {
    (0..cube.samples()).map(|s| cube.get(0, date, s, 0).unwrap()).sum::<f64>() / cube.samples() as f64
}

fn calculators() -> Vec<Box<dyn ValuationCalculator>> {
    vec![Box::new(NpvCalculator::new(0))]
}

#[test]
fn test_deflated_zero_bond_is_martingale() {
    let (engine, mut portfolio) = setup(SequenceType::PseudoRandom);
    let mut cube =
        InMemoryCube::new(asof(), portfolio.ids(), engine.valuation_dates().to_vec(), SAMPLES, 1).unwrap();
    let report = engine.build_cube(&mut portfolio, &mut cube, &calculators()).unwrap();
    assert!(report.failed_trades.is_empty());

    let today = 100.0 * (-RATE * 3.0).exp();
    assert_relative_eq!(cube.get_t0(0, 0).unwrap(), today, max_relative = 1e-10);
    for date in 0..2 {
        assert_relative_eq!(mean(&cube, date), today, max_relative = 1e-2);
    }
    for s in 0..SAMPLES {
        assert!(report.scenario_data.get(1, s, AggregationScenarioDataType::Numeraire, "").unwrap() > 0.0);
    }
}

#[test]
fn test_parallel_build_agrees_in_expectation() {
    let (engine, mut portfolio) = setup(SequenceType::SobolBrownianBridge);
    let mut cube =
        InMemoryCube::new(asof(), portfolio.ids(), engine.valuation_dates().to_vec(), SAMPLES, 1).unwrap();
    let parallel = ParallelConfig::new(512, 0);
    let report = engine
        .build_cube_parallel(&mut portfolio, &mut cube, &calculators(), &parallel)
        .unwrap();
    assert!(report.failed_trades.is_empty());
    let today = 100.0 * (-RATE * 3.0).exp();
    for date in 0..2 {
        assert_relative_eq!(mean(&cube, date), today, max_relative = 1e-2);
    }
}

#[test]
fn test_same_seed_reproduces_cube() {
    let build = || {
        let (engine, mut portfolio) = setup(SequenceType::PseudoRandomAntithetic);
        let mut cube =
            InMemoryCube::new(asof(), portfolio.ids(), engine.valuation_dates().to_vec(), 16, 1).unwrap();
        engine.build_cube(&mut portfolio, &mut cube, &calculators()).unwrap();
        cube
    };
    let (a, b) = (build(), build());
    for s in 0..16 {
        assert_eq!(a.get(0, 1, s, 0).unwrap(), b.get(0, 1, s, 0).unwrap());
    }
}
