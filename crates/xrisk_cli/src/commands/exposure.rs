//! Exposure command implementation
//!
//! Builds the cross-asset model from the configuration, simulates the NPV
//! cube in parallel slices and runs the exposure and XVA post-processing.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};
use xrisk_analytics::aggregation::{ExposureConfig, NettingSetResult, PostProcess, PostProcessConfig, PostProcessResult};
use xrisk_analytics::portfolio::{Counterparty, CreditParams, CsaDetails, NettingSetDefinition, PortfolioRef};
use xrisk_core::market_data::curves::{FlatCurve, YieldCurve};
use xrisk_core::types::Date;
use xrisk_models::model::{CorrelationMatrix, CrossAssetModel};
use xrisk_models::parametrization::{FxBsConstant, FxBsParametrization, IrLgmParametrization, LgmConstant};
use xrisk_models::{CrossAssetStateProcess, Discretization};
use xrisk_sim::cube::{InMemoryCube, NpvCube};
use xrisk_sim::engine::{
    NpvCalculator, ParallelConfig, Portfolio, PricingRegistry, RunContext, ValuationCalculator, ValuationEngine,
};
use xrisk_sim::market::SimMarketConfig;
use xrisk_sim::scenario::{
    CrossAssetModelScenarioGenerator, CsvScenarioWriter, DateGrid, GeneratorSettings, ScenarioGeneratorBuilder,
    DEFAULT_SEPARATOR,
};

use crate::config::Config;

fn build_model(config: &Config) -> Result<CrossAssetModel> {
    let irs = config
        .model
        .currencies
        .iter()
        .map(|c| {
            let lgm = LgmConstant::new(&c.currency, Arc::new(FlatCurve::new(c.rate)), c.sigma, c.kappa)
                .with_context(|| format!("LGM parameters of {}", c.currency))?;
            Ok(Arc::new(lgm) as Arc<dyn IrLgmParametrization>)
        })
        .collect::<Result<Vec<_>>>()?;
    let fxs = config
        .model
        .fx
        .iter()
        .map(|f| {
            let fx = FxBsConstant::new(&f.foreign, f.spot, f.sigma)
                .with_context(|| format!("FX parameters of {}", f.foreign))?;
            Ok(Arc::new(fx) as Arc<dyn FxBsParametrization>)
        })
        .collect::<Result<Vec<_>>>()?;
    let pairs: Vec<(usize, usize, f64)> = config
        .model
        .correlations
        .iter()
        .map(|c| (c.factor_1, c.factor_2, c.value))
        .collect();
    let correlation = CorrelationMatrix::from_pairs(irs.len() + fxs.len(), &pairs).context("factor correlation")?;
    CrossAssetModel::new(irs, fxs, vec![], vec![], correlation).context("building cross-asset model")
}

fn market_config(config: &Config) -> SimMarketConfig {
    let mut market = SimMarketConfig::single_currency(&config.run.base_currency, config.model.discount_tenors.clone());
    market.currencies = config.model.currencies.iter().map(|c| c.currency.clone()).collect();
    market.indices = config.model.indices.clone();
    market
}

fn reference_data(config: &Config, portfolio: &Portfolio) -> Result<PortfolioRef> {
    let mut reference = PortfolioRef::new();
    for c in &config.counterparties {
        let credit = CreditParams::new(c.hazard_rate, c.lgd).with_context(|| format!("credit of {}", c.id))?;
        reference.add_counterparty(Counterparty::new(c.id.as_str().into(), credit))?;
    }
    for ns in &config.netting_sets {
        let mut definition = NettingSetDefinition::new(ns.id.as_str().into(), ns.counterparty.as_str().into());
        if let Some(csa) = &ns.csa {
            let details = CsaDetails::new(&csa.currency)
                .with_thresholds(csa.threshold_pay, csa.threshold_rcv)
                .with_mta(csa.mta_pay, csa.mta_rcv)
                .with_mpor_days(csa.mpor_days)
                .with_margin_call_frequency_days(csa.margin_call_frequency_days);
            definition = definition.with_csa(details)?;
        }
        reference.add_netting_set(definition)?;
    }
    reference.add_trades_from(portfolio)?;
    Ok(reference)
}

fn write_scenarios(builder: &ScenarioGeneratorBuilder, dates: &[Date], samples: usize, path: &Path) -> Result<()> {
    let mut generator = builder(dates, 0)?;
    let mut writer = CsvScenarioWriter::create(path, DEFAULT_SEPARATOR)?;
    for sample in 0..samples {
        for &date in dates {
            let scenario = generator.next(date)?;
            writer.write(scenario.as_ref(), sample)?;
        }
    }
    writer.flush()?;
    info!(file = %path.display(), samples, dates = dates.len(), "scenarios written");
    Ok(())
}

fn print_netting_set(id: &str, result: &NettingSetResult, dates: &[Date]) {
    let e = &result.exposure;
    println!("\nNetting set {id} (counterparty {})", result.counterparty);
    println!("{:<12} {:>8} {:>16} {:>16} {:>16} {:>16}", "Date", "Time", "EPE", "ENE", "PFE", "Collateral");
    for k in 0..e.times.len() {
        let date = if k == 0 { "asof".to_string() } else { dates[k - 1].to_string() };
        println!(
            "{:<12} {:>8.4} {:>16.2} {:>16.2} {:>16.2} {:>16.2}",
            date, e.times[k], e.epe[k], e.ene[k], e.pfe[k], e.expected_collateral[k]
        );
    }
    let x = &result.xva;
    println!(
        "CVA {:.2}  DVA {:.2}  FVA {:.2}  COLVA {:.2}  EPE_B {:.2}  EEPE_B {:.2}",
        x.cva,
        x.dva,
        x.fva(),
        x.colva,
        e.epe_b,
        e.eepe_b
    );
}

fn print_report(result: &PostProcessResult, dates: &[Date]) {
    for (id, ns) in &result.netting_sets {
        print_netting_set(id.as_str(), ns, dates);
    }
    println!("\n{:<16} {:>16} {:>16} {:>16}", "Trade", "CVA", "Allocated CVA", "Allocated DVA");
    for (id, t) in &result.trades {
        println!(
            "{:<16} {:>16.2} {:>16.2} {:>16.2}",
            id.as_str(),
            t.xva.xva.cva,
            t.xva.allocated_cva,
            t.xva.allocated_dva
        );
    }
    let totals = result.totals();
    println!("\nTotal CVA {:.2}  DVA {:.2}  FVA {:.2}", totals.cva, totals.dva, totals.fva());
}

/// Run the exposure command
pub fn run(config: &Config, scenario_file: Option<&Path>) -> Result<()> {
    let run = &config.run;
    let dc = run.day_counter;
    info!(asof = %run.asof, samples = run.samples, trades = config.trades.len(), "starting exposure run");

    let model = build_model(config)?;
    let process = Arc::new(CrossAssetStateProcess::new(Arc::new(model), Discretization::Exact)?);
    let market = Arc::new(market_config(config));
    market.validate().context("simulated market layout")?;
    let grid = DateGrid::from_tenors(run.asof, &run.grid, dc).context("valuation grid")?;
    let registry = Arc::new(PricingRegistry::with_defaults());
    let context = Arc::new(RunContext::new(run.asof, &run.base_currency, dc, Arc::clone(&registry)));
    let settings = GeneratorSettings {
        sequence: run.sequence,
        seed: run.seed,
    };
    let builder = CrossAssetModelScenarioGenerator::builder(process, Arc::clone(&market), run.asof, dc, settings);

    if let Some(path) = scenario_file {
        write_scenarios(&builder, grid.dates(), run.samples, path)
            .with_context(|| format!("writing scenarios to {}", path.display()))?;
    }

    let engine = ValuationEngine::new(context, grid, builder, market)?;
    let mut portfolio = Portfolio::from_specs(&config.trades, &registry).context("building portfolio")?;
    let mut cube = InMemoryCube::new(run.asof, portfolio.ids(), engine.valuation_dates().to_vec(), run.samples, 1)?;
    let calculators: Vec<Box<dyn ValuationCalculator>> = vec![Box::new(NpvCalculator::new(0))];
    let batch = run
        .batch_size
        .unwrap_or_else(|| run.samples.div_ceil(num_cpus::get().max(1)));
    let parallel = ParallelConfig::new(batch, 2 * batch);
    let report = engine
        .build_cube_parallel(&mut portfolio, &mut cube, &calculators, &parallel)
        .context("building NPV cube")?;
    if !report.failed_trades.is_empty() {
        warn!(trades = ?report.failed_trades, "trades failed to price and were zeroed");
    }

    let reference = reference_data(config, &portfolio).context("portfolio reference data")?;
    let domestic = config
        .model
        .currencies
        .first()
        .ok_or_else(|| anyhow!("no model currencies"))?;
    let discount: Arc<dyn YieldCurve<f64>> = Arc::new(FlatCurve::new(domestic.rate));
    let own_credit = match config.exposure.own_credit {
        Some(c) => Some(CreditParams::new(c.hazard_rate, c.lgd).context("own credit")?),
        None => None,
    };
    let post_config = PostProcessConfig {
        exposure: ExposureConfig {
            pfe_quantile: config.exposure.pfe_quantile,
            day_counter: dc,
            t0_fx_spots: config.model.fx.iter().map(|f| (f.foreign.clone(), f.spot)).collect(),
            ..ExposureConfig::new(run.base_currency.as_str())
        },
        allocation: config.exposure.allocation,
        own_credit,
        ..PostProcessConfig::default()
    };
    let result = PostProcess::new(&reference, &cube, &report.scenario_data, discount, post_config)?.run()?;
    info!(netting_sets = result.netting_sets.len(), "exposure run complete");

    print_report(&result, cube.dates());
    Ok(())
}
