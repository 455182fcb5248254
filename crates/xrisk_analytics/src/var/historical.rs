//! Historical simulation VaR from sensitivities.
//!
//! Each historical scenario is a set of risk factor shifts. Its P&L is the
//! second-order Taylor expansion `Σ δ_k x_k + ½ Σ Γ_kk x_k² + Σ_{k<l} Γ_kl
//! x_k x_l`. VaR is the upper `p`-quantile of the scenario P&Ls, the same
//! convention as the parametric methods.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::info;
use xrisk_sim::scenario::RiskFactorKey;

use super::aggregator::{aggregate_sensitivities, PortfolioSensitivities, TradePortfolios};
use super::delta_gamma::{check_quantile, empirical_quantile};
use super::parametric::VarReport;
use crate::error::VarError;
use crate::sensitivity::SensitivityStream;

/// Risk factor shifts of one historical scenario; absent factors do not
/// move.
pub type HistoricalShifts = BTreeMap<RiskFactorKey, f64>;

/// Sensitivity P&L of one scenario: `(total, first order)`.
pub fn sensitivity_pnl(s: &PortfolioSensitivities, shifts: &HistoricalShifts) -> (f64, f64) {
    let shift = |k: &RiskFactorKey| shifts.get(k).copied().unwrap_or(0.0);
    let first: f64 = s.deltas.iter().map(|(k, d)| d * shift(k)).sum();
    let second: f64 = s
        .gammas
        .iter()
        .map(|((k1, k2), g)| {
            if k1 == k2 {
                0.5 * g * shift(k1) * shift(k1)
            } else {
                g * shift(k1) * shift(k2)
            }
        })
        .sum();
    (first + second, first)
}

/// Historical simulation VaR per portfolio.
#[derive(Clone, Debug)]
pub struct HistoricalVarCalculator {
    portfolios: TradePortfolios,
    quantiles: Vec<f64>,
}

impl HistoricalVarCalculator {
    /// Validates the quantiles.
    pub fn new(portfolios: TradePortfolios, quantiles: Vec<f64>) -> Result<Self, VarError> {
        for p in &quantiles {
            check_quantile(*p)?;
        }
        Ok(Self { portfolios, quantiles })
    }

    /// P&L per scenario for every portfolio.
    pub fn pnls(
        &self,
        stream: &mut dyn SensitivityStream,
        scenarios: &[HistoricalShifts],
    ) -> Result<BTreeMap<String, Vec<f64>>, VarError> {
        let sensitivities = aggregate_sensitivities(stream, &self.portfolios)?;
        Ok(sensitivities
            .into_iter()
            .map(|(p, s)| {
                let pnl = scenarios.par_iter().map(|x| sensitivity_pnl(&s, x).0).collect();
                (p, pnl)
            })
            .collect())
    }

    /// VaR per portfolio and quantile.
    pub fn calculate(
        &self,
        stream: &mut dyn SensitivityStream,
        scenarios: &[HistoricalShifts],
    ) -> Result<VarReport, VarError> {
        if scenarios.is_empty() {
            return Err(VarError::Configuration("historical VaR needs at least one scenario".into()));
        }
        let mut report = VarReport::default();
        for (portfolio, mut pnl) in self.pnls(stream, scenarios)? {
            pnl.sort_by(f64::total_cmp);
            let var: Vec<f64> = self.quantiles.iter().map(|p| empirical_quantile(&pnl, *p)).collect();
            report.push(&portfolio, &self.quantiles, &var);
        }
        info!(scenarios = scenarios.len(), rows = report.rows.len(), "historical VaR done");
        Ok(report)
    }
}
