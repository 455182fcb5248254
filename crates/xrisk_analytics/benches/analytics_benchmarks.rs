//! Criterion benchmarks for the analytics layer.
//!
//! Benchmarks cover:
//! - Netted exposure and XVA over a synthetic cube
//! - Delta-gamma Monte Carlo VaR
//! - SIMM over a generated CRIF

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{DMatrix, DVector};
use xrisk_analytics::aggregation::{PostProcess, PostProcessConfig};
use xrisk_analytics::portfolio::{Counterparty, CreditParams, NettingSetDefinition, PortfolioRef};
use xrisk_analytics::simm::{CrifRecord, RiskTypeConfig, SimmCalculator, SimmConfiguration};
use xrisk_analytics::var::{delta_gamma_var_mc, NoSalvage};
use xrisk_core::market_data::curves::{FlatCurve, YieldCurve};
use xrisk_core::types::Date;
use xrisk_sim::cube::{AggregationScenarioData, AggregationScenarioDataType, InMemoryCube, NpvCube};

fn synthetic_inputs(trades: usize, samples: usize) -> (PortfolioRef, InMemoryCube, AggregationScenarioData) {
    let asof = Date::from_ymd(2025, 1, 2).unwrap();
    let dates: Vec<Date> = (1..=20).map(|q| asof.add_days(91 * q).unwrap()).collect();
    let ids: Vec<String> = (0..trades).map(|i| format!("T{i}")).collect();
    let mut cube = InMemoryCube::new(asof, ids.clone(), dates.clone(), samples, 1).unwrap();
    let mut data = AggregationScenarioData::new(dates.len(), samples);
    for k in 0..dates.len() {
        for s in 0..samples {
            data.set(k, s, 1.0 + 0.001 * k as f64, AggregationScenarioDataType::Numeraire, "")
                .unwrap();
            for i in 0..trades {
                let v = ((i * 31 + s * 17 + k * 7) % 200) as f64 - 100.0;
                cube.set(v, i, k, s, 0).unwrap();
            }
        }
    }

    let mut portfolio = PortfolioRef::new();
    portfolio
        .add_counterparty(Counterparty::new("CP".into(), CreditParams::new(0.01, 0.6).unwrap()))
        .unwrap();
    for n in 0..4 {
        portfolio
            .add_netting_set(NettingSetDefinition::new(format!("NS{n}").into(), "CP".into()))
            .unwrap();
    }
    for (i, id) in ids.iter().enumerate() {
        portfolio
            .add_trade(id.as_str().into(), format!("NS{}", i % 4).into())
            .unwrap();
    }
    (portfolio, cube, data)
}

fn bench_postprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocess");
    group.sample_size(10);
    for samples in [500, 2000] {
        let (portfolio, cube, data) = synthetic_inputs(40, samples);
        let discount: Arc<dyn YieldCurve<f64>> = Arc::new(FlatCurve::new(0.02));
        group.bench_with_input(BenchmarkId::new("netted_and_xva", samples), &samples, |b, _| {
            b.iter(|| {
                let run = PostProcess::new(&portfolio, &cube, &data, Arc::clone(&discount), PostProcessConfig::default())
                    .unwrap()
                    .run()
                    .unwrap();
                black_box(run.totals())
            })
        });
    }
    group.finish();
}

fn bench_mc_var(c: &mut Criterion) {
    let n = 20;
    let omega = DMatrix::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.3 });
    let delta = DVector::from_fn(n, |i, _| (i as f64) - 10.0);
    let gamma = DMatrix::from_fn(n, n, |i, j| if i == j { 0.5 } else { 0.0 });
    c.bench_function("delta_gamma_var_mc_20_factors", |b| {
        b.iter(|| black_box(delta_gamma_var_mc(&omega, &delta, &gamma, &[0.99], 50_000, 42, &NoSalvage).unwrap()))
    });
}

fn bench_simm(c: &mut Criterion) {
    let config = SimmConfiguration::default()
        .with_risk_type("Risk_IRCurve", RiskTypeConfig::flat("InterestRate", 50.0))
        .with_risk_type("Risk_FX", RiskTypeConfig::flat("FX", 7.4));
    let calc = SimmCalculator::new(config).unwrap();
    let tenors = ["2w", "1m", "3m", "6m", "1y", "2y", "3y", "5y", "10y", "15y", "20y", "30y"];
    let mut records = Vec::new();
    for ns in 0..10 {
        for (t, tenor) in tenors.iter().enumerate() {
            for ccy in ["EUR", "USD", "GBP"] {
                records.push(
                    CrifRecord::new(format!("NS{ns}"), "Risk_IRCurve", ccy, (t as f64 + 1.0) * 100.0)
                        .with_bucket("1")
                        .with_labels(*tenor, "OIS"),
                );
            }
        }
        records.push(CrifRecord::new(format!("NS{ns}"), "Risk_FX", "USD", 1e6));
    }
    c.bench_function("simm_10_netting_sets", |b| b.iter(|| black_box(calc.calculate(&records).unwrap())));
}

criterion_group!(benches, bench_postprocess, bench_mc_var, bench_simm);
criterion_main!(benches);
