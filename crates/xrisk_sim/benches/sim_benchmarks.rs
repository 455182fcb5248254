//! Criterion benchmarks for path generation and cube builds.
//!
//! Benchmarks cover:
//! - Multi-path generation for a two-currency model, pseudo-random and
//!   Sobol with Brownian bridge
//! - Sequential and sliced parallel NPV cube builds

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use xrisk_core::market_data::curves::FlatCurve;
use xrisk_core::types::{Date, DayCountConvention, Period};
use xrisk_models::model::{CorrelationMatrix, CrossAssetModel};
use xrisk_models::parametrization::{FxBsConstant, LgmConstant};
use xrisk_models::{CrossAssetStateProcess, Discretization};
use xrisk_sim::cube::InMemoryCube;
use xrisk_sim::engine::products::{FxForwardData, ZeroCouponBondData};
use xrisk_sim::engine::{
    NpvCalculator, ParallelConfig, Portfolio, PricingRegistry, ProductData, RunContext, TradeSpec,
    ValuationCalculator, ValuationEngine,
};
use xrisk_sim::market::SimMarketConfig;
use xrisk_sim::path::{
    MultiPathGeneratorBase, MultiPathGeneratorLowDiscrepancy, MultiPathGeneratorPseudoRandom,
};
use xrisk_sim::scenario::{CrossAssetModelScenarioGenerator, DateGrid, GeneratorSettings};

fn asof() -> Date {
    Date::from_ymd(2025, 1, 2).unwrap()
}

fn process() -> Arc<CrossAssetStateProcess> {
    let eur = LgmConstant::new("EUR", Arc::new(FlatCurve::new(0.02)), 0.01, 0.03).unwrap();
    let usd = LgmConstant::new("USD", Arc::new(FlatCurve::new(0.04)), 0.012, 0.01).unwrap();
    let fx = FxBsConstant::new("USD", 0.9, 0.1).unwrap();
    let corr = CorrelationMatrix::from_pairs(3, &[(0, 1, 0.3), (0, 2, 0.1)]).unwrap();
    let model = CrossAssetModel::new(
        vec![Arc::new(eur), Arc::new(usd)],
        vec![Arc::new(fx)],
        vec![],
        vec![],
        corr,
    )
    .unwrap();
    Arc::new(CrossAssetStateProcess::new(Arc::new(model), Discretization::Exact).unwrap())
}

/// Quarterly grid out to `years`.
fn time_grid(years: usize) -> Vec<f64> {
    (0..=4 * years).map(|i| i as f64 * 0.25).collect()
}

fn bench_path_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_generation");
    let process = process();
    for years in [5, 20] {
        let grid = time_grid(years);
        group.bench_with_input(BenchmarkId::new("pseudo_random", years), &grid, |b, grid| {
            let mut gen = MultiPathGeneratorPseudoRandom::new(Arc::clone(&process), grid, 42, false).unwrap();
            b.iter(|| black_box(gen.next().unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("sobol_bridge", years), &grid, |b, grid| {
            let mut gen = MultiPathGeneratorLowDiscrepancy::new(Arc::clone(&process), grid, 42, true).unwrap();
            b.iter(|| black_box(gen.next().unwrap()))
        });
    }
    group.finish();
}

fn trade_specs(n: usize) -> Vec<TradeSpec> {
    (0..n)
        .map(|i| {
            let maturity = asof().add_days(180 + 90 * i as i64).unwrap();
            let data = if i % 2 == 0 {
                ProductData::ZeroCouponBond(ZeroCouponBondData {
                    currency: "EUR".into(),
                    notional: 1.0e6,
                    maturity,
                })
            } else {
                ProductData::FxForward(FxForwardData {
                    bought_currency: "USD".into(),
                    bought_amount: 1.1e6,
                    sold_currency: "EUR".into(),
                    sold_amount: 1.0e6,
                    maturity,
                })
            };
            TradeSpec {
                id: format!("T{i}"),
                netting_set_id: "NS".into(),
                model: Default::default(),
                engine: Default::default(),
                data,
            }
        })
        .collect()
}

fn bench_cube_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("cube_build");
    group.sample_size(10);

    let dc = DayCountConvention::Actual365Fixed;
    let tenors: Vec<Period> = ["3M", "6M", "1Y", "2Y", "5Y", "10Y"].iter().map(|t| t.parse().unwrap()).collect();
    let mut config = SimMarketConfig::single_currency("EUR", tenors.clone());
    config.currencies.push("USD".into());
    let config = Arc::new(config);
    let grid = DateGrid::from_tenors(asof(), &tenors, dc).unwrap();
    let registry = Arc::new(PricingRegistry::with_defaults());
    let context = Arc::new(RunContext::new(asof(), "EUR", dc, Arc::clone(&registry)));
    let builder = CrossAssetModelScenarioGenerator::builder(
        process(),
        Arc::clone(&config),
        asof(),
        dc,
        GeneratorSettings::default(),
    );
    let engine = ValuationEngine::new(context, grid, builder, config).unwrap();
    let calculators: Vec<Box<dyn ValuationCalculator>> = vec![Box::new(NpvCalculator::new(0))];
    let specs = trade_specs(20);
    let samples = 512;

    group.bench_function("sequential_20_trades", |b| {
        b.iter(|| {
            let mut portfolio = Portfolio::from_specs(&specs, &registry).unwrap();
            let mut cube =
                InMemoryCube::new(asof(), portfolio.ids(), engine.valuation_dates().to_vec(), samples, 1).unwrap();
            black_box(engine.build_cube(&mut portfolio, &mut cube, &calculators).unwrap())
        })
    });
    let parallel = ParallelConfig::new(64, 0);
    group.bench_function("parallel_20_trades", |b| {
        b.iter(|| {
            let mut portfolio = Portfolio::from_specs(&specs, &registry).unwrap();
            let mut cube =
                InMemoryCube::new(asof(), portfolio.ids(), engine.valuation_dates().to_vec(), samples, 1).unwrap();
            black_box(
                engine
                    .build_cube_parallel(&mut portfolio, &mut cube, &calculators, &parallel)
                    .unwrap(),
            )
        })
    });
    group.finish();
}

criterion_group!(benches, bench_path_generation, bench_cube_build);
criterion_main!(benches);
