//! Parametric VaR over a sensitivity stream.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};
use xrisk_sim::scenario::RiskFactorKey;

use super::aggregator::{aggregate_sensitivities, PortfolioSensitivities, TradePortfolios};
use super::delta_gamma::{
    check_quantile, delta_gamma_var_cornish_fisher, delta_gamma_var_mc, delta_gamma_var_normal, delta_var,
};
use super::salvage::{check_positive_semidefinite, CovarianceSalvage, NoSalvage, SpectralSalvage};
use crate::error::VarError;
use crate::sensitivity::SensitivityStream;

/// Covariance entries keyed by factor pair.
pub type CovarianceMap = BTreeMap<(RiskFactorKey, RiskFactorKey), f64>;

/// Name of the summary portfolio in a breakdown.
pub const ALL_PORTFOLIOS: &str = "(all)";

/// Parametric VaR method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarMethod {
    /// Delta-normal
    #[default]
    Delta,
    /// Delta-gamma with normal P&L
    DeltaGammaNormal,
    /// Delta-gamma by simulation
    MonteCarlo,
    /// Delta-gamma with Cornish-Fisher quantile
    CornishFisher,
}

impl fmt::Display for VarMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VarMethod::Delta => "Delta",
            VarMethod::DeltaGammaNormal => "DeltaGammaNormal",
            VarMethod::MonteCarlo => "MonteCarlo",
            VarMethod::CornishFisher => "Cornish-Fisher",
        })
    }
}

impl FromStr for VarMethod {
    type Err = VarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Delta" => Ok(VarMethod::Delta),
            "DeltaGammaNormal" => Ok(VarMethod::DeltaGammaNormal),
            "MonteCarlo" => Ok(VarMethod::MonteCarlo),
            "Cornish-Fisher" | "CornishFisher" => Ok(VarMethod::CornishFisher),
            other => Err(VarError::Configuration(format!("unknown VaR method {other}"))),
        }
    }
}

/// Method plus Monte Carlo settings.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParametricVarParams {
    /// Method
    pub method: VarMethod,
    /// Monte Carlo draws
    pub samples: usize,
    /// Monte Carlo seed
    pub seed: u64,
}

impl Default for ParametricVarParams {
    fn default() -> Self {
        Self {
            method: VarMethod::Delta,
            samples: 100_000,
            seed: 42,
        }
    }
}

/// One VaR figure.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarRow {
    /// Portfolio id
    pub portfolio: String,
    /// Quantile
    pub quantile: f64,
    /// VaR
    pub var: f64,
}

/// VaR per portfolio and quantile.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarReport {
    /// Rows in portfolio then quantile order
    pub rows: Vec<VarRow>,
}

impl VarReport {
    /// VaR of `portfolio` at `quantile`, if reported.
    pub fn get(&self, portfolio: &str, quantile: f64) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.portfolio == portfolio && r.quantile == quantile)
            .map(|r| r.var)
    }

    pub(crate) fn push(&mut self, portfolio: &str, quantiles: &[f64], var: &[f64]) {
        for (q, v) in quantiles.iter().zip(var) {
            self.rows.push(VarRow {
                portfolio: portfolio.to_string(),
                quantile: *q,
                var: *v,
            });
        }
    }

    /// Writes `Portfolio,Quantile,VaR` rows.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut w = csv::Writer::from_writer(writer);
        w.write_record(["Portfolio", "Quantile", "VaR"])?;
        for r in &self.rows {
            w.write_record([r.portfolio.clone(), r.quantile.to_string(), format!("{:.6}", r.var)])?;
        }
        w.flush()?;
        Ok(())
    }
}

/// Reads `Factor_1,Factor_2,Covariance` rows; factors as `Type/Name/Index`.
/// Each entry is stored for both orderings of the pair.
pub fn read_covariance_csv<R: Read>(reader: R, name: &str) -> Result<CovarianceMap, VarError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = CovarianceMap::new();
    for (i, row) in rdr.records().enumerate() {
        let line = i + 2;
        let row = row.map_err(|e| VarError::Configuration(format!("{name} line {line}: {e}")))?;
        if row.len() != 3 {
            return Err(VarError::Configuration(format!("{name} line {line}: expected 3 fields, got {}", row.len())));
        }
        let parse_key = |s: &str| {
            s.parse::<RiskFactorKey>()
                .map_err(|e| VarError::Configuration(format!("{name} line {line}: {e}")))
        };
        let k1 = parse_key(&row[0])?;
        let k2 = parse_key(&row[1])?;
        let v: f64 = row[2]
            .parse()
            .map_err(|_| VarError::Configuration(format!("{name} line {line}: invalid covariance {}", &row[2])))?;
        out.insert((k2.clone(), k1.clone()), v);
        out.insert((k1, k2), v);
    }
    Ok(out)
}

/// Parametric VaR of trade portfolios from their sensitivities.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use xrisk_analytics::sensitivity::{SensitivityInMemoryStream, SensitivityRecord};
/// use xrisk_analytics::var::{CovarianceMap, ParametricVarCalculator, ParametricVarParams};
/// use xrisk_sim::scenario::{KeyType, RiskFactorKey};
///
/// let key = RiskFactorKey::new(KeyType::FxSpot, "USD", 0);
/// let mut covariance = CovarianceMap::new();
/// covariance.insert((key.clone(), key.clone()), 0.01);
/// let mut portfolios = BTreeMap::new();
/// portfolios.insert("P".to_string(), ["T".to_string()].into());
///
/// let calc = ParametricVarCalculator::new(portfolios, covariance, vec![0.99], ParametricVarParams::default()).unwrap();
/// let mut stream = SensitivityInMemoryStream::new(vec![SensitivityRecord::delta_gamma("T", key, 1000.0, 0.0)]);
/// let report = calc.calculate(&mut stream).unwrap();
/// assert!((report.get("P", 0.99).unwrap() - 232.6348).abs() < 1e-3);
/// ```
#[derive(Clone, Debug)]
pub struct ParametricVarCalculator {
    portfolios: TradePortfolios,
    portfolio_filter: Option<String>,
    covariance: CovarianceMap,
    quantiles: Vec<f64>,
    params: ParametricVarParams,
    breakdown: bool,
    salvage_covariance: bool,
}

impl ParametricVarCalculator {
    /// Validates the quantiles and Monte Carlo settings.
    pub fn new(
        portfolios: TradePortfolios,
        covariance: CovarianceMap,
        quantiles: Vec<f64>,
        params: ParametricVarParams,
    ) -> Result<Self, VarError> {
        for p in &quantiles {
            check_quantile(*p)?;
        }
        if params.method == VarMethod::MonteCarlo && params.samples == 0 {
            return Err(VarError::Configuration("MonteCarlo method needs samples > 0".into()));
        }
        Ok(Self {
            portfolios,
            portfolio_filter: None,
            covariance,
            quantiles,
            params,
            breakdown: false,
            salvage_covariance: false,
        })
    }

    /// Restricts to portfolios equal to `filter`, or starting with it when
    /// it ends in `*`.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.portfolio_filter = Some(filter.into());
        self
    }

    /// Adds an `(all)` row over the selected portfolios when there is more
    /// than one.
    pub fn with_breakdown(mut self, breakdown: bool) -> Self {
        self.breakdown = breakdown;
        self
    }

    /// Repairs an indefinite covariance instead of rejecting it.
    pub fn with_salvage(mut self, salvage: bool) -> Self {
        self.salvage_covariance = salvage;
        self
    }

    fn selected(&self, portfolio: &str) -> bool {
        match self.portfolio_filter.as_deref() {
            None => true,
            Some(f) => match f.strip_suffix('*') {
                Some(prefix) => portfolio.starts_with(prefix),
                None => portfolio == f,
            },
        }
    }

    /// VaR per selected portfolio. Portfolios whose VaR is zero at every
    /// quantile are left out.
    pub fn calculate(&self, stream: &mut dyn SensitivityStream) -> Result<VarReport, VarError> {
        let sensitivities = aggregate_sensitivities(stream, &self.portfolios)?;
        let selected: Vec<(&String, &PortfolioSensitivities)> =
            sensitivities.iter().filter(|(p, _)| self.selected(p)).collect();

        let mut report = VarReport::default();
        if self.breakdown && selected.len() > 1 {
            let mut all = PortfolioSensitivities::default();
            for (_, s) in &selected {
                all.absorb(s);
            }
            self.report_portfolio(ALL_PORTFOLIOS, &all, &mut report)?;
        }
        for (portfolio, s) in selected {
            self.report_portfolio(portfolio, s, &mut report)?;
        }
        info!(method = %self.params.method, rows = report.rows.len(), "parametric VaR done");
        Ok(report)
    }

    fn report_portfolio(&self, portfolio: &str, s: &PortfolioSensitivities, report: &mut VarReport) -> Result<(), VarError> {
        let keys = s.keys();
        if keys.is_empty() {
            return Ok(());
        }
        let omega = self.covariance_matrix(&keys);
        let (delta, gamma) = s.delta_gamma();
        let var = if self.salvage_covariance {
            self.compute_var(&omega, &delta, &gamma, &SpectralSalvage)?
        } else {
            check_positive_semidefinite(&omega)?;
            self.compute_var(&omega, &delta, &gamma, &NoSalvage)?
        };
        if var.iter().any(|v| *v != 0.0) {
            report.push(portfolio, &self.quantiles, &var);
        }
        Ok(())
    }

    fn covariance_matrix(&self, keys: &[RiskFactorKey]) -> DMatrix<f64> {
        let n = keys.len();
        let mut omega = DMatrix::zeros(n, n);
        let mut unused = 0usize;
        for ((k1, k2), v) in &self.covariance {
            match (keys.binary_search(k1), keys.binary_search(k2)) {
                (Ok(i), Ok(j)) => {
                    omega[(i, j)] = *v;
                    omega[(j, i)] = *v;
                }
                _ => unused += 1,
            }
        }
        debug!(entries = self.covariance.len(), unused, dimension = n, "covariance matrix assembled");
        for (i, k) in keys.iter().enumerate() {
            if omega[(i, i)] == 0.0 {
                warn!(key = %k, "zero variance assigned to sensitivity key");
            }
        }
        omega
    }

    /// VaR at every configured quantile with the configured method.
    pub fn compute_var(
        &self,
        omega: &DMatrix<f64>,
        delta: &DVector<f64>,
        gamma: &DMatrix<f64>,
        salvage: &dyn CovarianceSalvage,
    ) -> Result<Vec<f64>, VarError> {
        let q = &self.quantiles;
        match self.params.method {
            VarMethod::Delta => q.iter().map(|p| delta_var(omega, delta, *p, salvage)).collect(),
            VarMethod::DeltaGammaNormal => q
                .iter()
                .map(|p| delta_gamma_var_normal(omega, delta, gamma, *p, salvage))
                .collect(),
            VarMethod::CornishFisher => q
                .iter()
                .map(|p| delta_gamma_var_cornish_fisher(omega, delta, gamma, *p, salvage))
                .collect(),
            VarMethod::MonteCarlo => {
                delta_gamma_var_mc(omega, delta, gamma, q, self.params.samples, self.params.seed, salvage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensitivity::{SensitivityInMemoryStream, SensitivityRecord};
    use approx::assert_relative_eq;
    use xrisk_core::math::inverse_cumulative_normal;
    use xrisk_sim::scenario::KeyType;

    fn key(name: &str) -> RiskFactorKey {
        RiskFactorKey::new(KeyType::FxSpot, name, 0)
    }

    fn setup() -> (TradePortfolios, CovarianceMap, SensitivityInMemoryStream) {
        let mut portfolios = TradePortfolios::new();
        portfolios.insert("P1".into(), ["T1".to_string()].into());
        portfolios.insert("P2".into(), ["T2".to_string()].into());
        let mut cov = CovarianceMap::new();
        cov.insert((key("USD"), key("USD")), 0.01);
        cov.insert((key("GBP"), key("GBP")), 0.04);
        cov.insert((key("USD"), key("GBP")), 0.0);
        let stream = SensitivityInMemoryStream::new(vec![
            SensitivityRecord::delta_gamma("T1", key("USD"), 100.0, 0.0),
            SensitivityRecord::delta_gamma("T2", key("GBP"), 50.0, 0.0),
        ]);
        (portfolios, cov, stream)
    }

    #[test]
    fn test_delta_var_per_portfolio_and_total() {
        let (portfolios, cov, mut stream) = setup();
        let calc = ParametricVarCalculator::new(portfolios, cov, vec![0.99], ParametricVarParams::default())
            .unwrap()
            .with_breakdown(true);
        let report = calc.calculate(&mut stream).unwrap();
        let z = inverse_cumulative_normal(0.99);
        assert_relative_eq!(report.get("P1", 0.99).unwrap(), 10.0 * z, epsilon = 1e-9);
        assert_relative_eq!(report.get("P2", 0.99).unwrap(), 10.0 * z, epsilon = 1e-9);
        assert_relative_eq!(report.get(ALL_PORTFOLIOS, 0.99).unwrap(), 200.0f64.sqrt() * z, epsilon = 1e-9);
        assert_eq!(report.rows[0].portfolio, ALL_PORTFOLIOS);
    }

    #[test]
    fn test_filter_selects_portfolios() {
        let (portfolios, cov, mut stream) = setup();
        let calc = ParametricVarCalculator::new(portfolios, cov, vec![0.95], ParametricVarParams::default())
            .unwrap()
            .with_filter("P2");
        let report = calc.calculate(&mut stream).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].portfolio, "P2");
    }

    #[test]
    fn test_indefinite_covariance_needs_salvage() {
        let (portfolios, mut cov, mut stream) = setup();
        cov.insert((key("USD"), key("GBP")), 0.5);
        cov.insert((key("GBP"), key("USD")), 0.5);
        let calc = ParametricVarCalculator::new(portfolios.clone(), cov.clone(), vec![0.99], ParametricVarParams::default())
            .unwrap()
            .with_breakdown(true);
        assert!(matches!(calc.calculate(&mut stream), Err(VarError::Math(_))));
        let calc = calc.with_salvage(true);
        assert!(calc.calculate(&mut stream).is_ok());
    }

    #[test]
    fn test_cross_gamma_on_factors_without_delta_adds_variance() {
        let (portfolios, mut cov, _) = setup();
        cov.insert((key("EUR"), key("EUR")), 0.01);
        let mut stream = SensitivityInMemoryStream::new(vec![
            SensitivityRecord::delta_gamma("T1", key("USD"), 100.0, 0.0),
            SensitivityRecord::cross_gamma("T1", key("GBP"), key("EUR"), 1000.0),
        ]);
        let params = ParametricVarParams {
            method: VarMethod::DeltaGammaNormal,
            ..ParametricVarParams::default()
        };
        let calc = ParametricVarCalculator::new(portfolios, cov, vec![0.99], params).unwrap();
        let report = calc.calculate(&mut stream).unwrap();
        // 100^2 * 0.01 + 1000^2 * 0.04 * 0.01
        let z = inverse_cumulative_normal(0.99);
        assert_relative_eq!(report.get("P1", 0.99).unwrap(), 500.0f64.sqrt() * z, max_relative = 1e-9);
    }

    #[test]
    fn test_method_names() {
        assert_eq!("Cornish-Fisher".parse::<VarMethod>().unwrap(), VarMethod::CornishFisher);
        assert_eq!(VarMethod::CornishFisher.to_string(), "Cornish-Fisher");
        assert!("Saddle".parse::<VarMethod>().is_err());
    }

    #[test]
    fn test_covariance_csv_and_report_csv() {
        let data = "Factor_1,Factor_2,Covariance\nFxSpot/USD/0,FxSpot/USD/0,0.01\nFxSpot/USD/0,FxSpot/GBP/0,0.002\n";
        let cov = read_covariance_csv(data.as_bytes(), "cov.csv").unwrap();
        assert_eq!(cov[&(key("GBP"), key("USD"))], 0.002);
        assert_eq!(cov.len(), 3);
        assert!(read_covariance_csv("a,b,c\nFxSpot/USD/0,FxSpot/USD/0,x\n".as_bytes(), "bad.csv").is_err());

        let mut report = VarReport::default();
        report.push("P", &[0.99], &[1.5]);
        let mut out = Vec::new();
        report.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Portfolio,Quantile,VaR\nP,0.99,1.500000\n");
    }
}
