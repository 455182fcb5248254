//! VaR command implementation
//!
//! Parametric VaR per portfolio from a sensitivity file and a covariance
//! file, written as CSV to stdout.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;
use xrisk_analytics::sensitivity::{SensitivityCsvStream, SensitivityStream};
use xrisk_analytics::var::{read_covariance_csv, ParametricVarCalculator, ParametricVarParams, TradePortfolios};

use crate::config::Config;

/// Reads `TradeId,PortfolioId` rows; a trade may appear in several portfolios.
fn read_trade_portfolios<R: Read>(reader: R, name: &str) -> Result<TradePortfolios> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = TradePortfolios::new();
    for (i, row) in rdr.records().enumerate() {
        let row = row.with_context(|| format!("{name} line {}", i + 2))?;
        match (row.get(0), row.get(1)) {
            (Some(trade), Some(portfolio)) if !trade.is_empty() && !portfolio.is_empty() => {
                out.entry(portfolio.to_string()).or_default().insert(trade.to_string());
            }
            _ => bail!("{name} line {}: expected TradeId,PortfolioId", i + 2),
        }
    }
    Ok(out)
}

/// Each trade of the stream in a portfolio of its own.
fn one_portfolio_per_trade(stream: &mut dyn SensitivityStream) -> Result<TradePortfolios> {
    stream.reset();
    let mut out = TradePortfolios::new();
    while let Some(record) = stream.next()? {
        out.entry(record.trade_id.clone()).or_default().insert(record.trade_id);
    }
    stream.reset();
    Ok(out)
}

/// Run the var command
pub fn run(
    config: &Config,
    sensitivities: &Path,
    covariance: &Path,
    portfolios: Option<&Path>,
    filter: Option<&str>,
) -> Result<()> {
    let settings = &config.var;
    let mut stream = SensitivityCsvStream::open(sensitivities)
        .with_context(|| format!("opening sensitivities {}", sensitivities.display()))?;
    let covariance_name = covariance.display().to_string();
    let file = File::open(covariance).with_context(|| format!("opening covariance {covariance_name}"))?;
    let covariance = read_covariance_csv(file, &covariance_name)?;

    let trade_portfolios = match portfolios {
        Some(path) => {
            let name = path.display().to_string();
            let file = File::open(path).with_context(|| format!("opening portfolio mapping {name}"))?;
            read_trade_portfolios(file, &name)?
        }
        None => one_portfolio_per_trade(&mut stream)?,
    };

    let params = ParametricVarParams {
        method: settings.method.parse()?,
        samples: settings.samples,
        seed: settings.seed,
    };
    let mut calculator = ParametricVarCalculator::new(trade_portfolios, covariance, settings.quantiles.clone(), params)?
        .with_breakdown(settings.breakdown)
        .with_salvage(settings.salvage_covariance);
    if let Some(f) = filter {
        calculator = calculator.with_filter(f);
    }
    let report = calculator.calculate(&mut stream)?;
    info!(rows = report.rows.len(), method = %params.method, "VaR complete");
    report.write_csv(std::io::stdout().lock())?;
    Ok(())
}
