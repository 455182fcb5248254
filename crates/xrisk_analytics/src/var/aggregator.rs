//! Per-portfolio aggregation of trade sensitivities.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{DMatrix, DVector};
use tracing::debug;
use xrisk_sim::scenario::RiskFactorKey;

use crate::error::VarError;
use crate::sensitivity::{SensitivityRecord, SensitivityStream};

/// Portfolio id → trades of the portfolio.
pub type TradePortfolios = BTreeMap<String, BTreeSet<String>>;

/// Deltas per factor and gammas per ordered factor pair of one portfolio.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortfolioSensitivities {
    /// Delta per factor
    pub deltas: BTreeMap<RiskFactorKey, f64>,
    /// Gamma per `(k1, k2)` with `k1 <= k2`
    pub gammas: BTreeMap<(RiskFactorKey, RiskFactorKey), f64>,
}

impl PortfolioSensitivities {
    /// Adds one trade record.
    pub fn add(&mut self, record: &SensitivityRecord) {
        match &record.key_2 {
            None => {
                *self.deltas.entry(record.key_1.clone()).or_default() += record.delta;
                *self
                    .gammas
                    .entry((record.key_1.clone(), record.key_1.clone()))
                    .or_default() += record.gamma;
            }
            Some(k2) => {
                let pair = if record.key_1 <= *k2 {
                    (record.key_1.clone(), k2.clone())
                } else {
                    (k2.clone(), record.key_1.clone())
                };
                *self.gammas.entry(pair).or_default() += record.gamma;
            }
        }
    }

    /// Merges another portfolio's sensitivities into this one.
    pub fn absorb(&mut self, other: &PortfolioSensitivities) {
        for (k, v) in &other.deltas {
            *self.deltas.entry(k.clone()).or_default() += v;
        }
        for (k, v) in &other.gammas {
            *self.gammas.entry(k.clone()).or_default() += v;
        }
    }

    /// Factors carrying a delta or a gamma, in key order.
    pub fn keys(&self) -> Vec<RiskFactorKey> {
        let mut keys: BTreeSet<&RiskFactorKey> = self.deltas.keys().collect();
        for (k1, k2) in self.gammas.keys() {
            keys.insert(k1);
            keys.insert(k2);
        }
        keys.into_iter().cloned().collect()
    }

    /// Delta vector and symmetric gamma matrix over [`keys`](Self::keys).
    /// Gamma-only factors get a zero delta.
    pub fn delta_gamma(&self) -> (DVector<f64>, DMatrix<f64>) {
        let keys = self.keys();
        let n = keys.len();
        let delta = DVector::from_iterator(n, keys.iter().map(|k| self.deltas.get(k).copied().unwrap_or(0.0)));
        let mut gamma = DMatrix::zeros(n, n);
        for ((k1, k2), g) in &self.gammas {
            if let (Ok(i), Ok(j)) = (keys.binary_search(k1), keys.binary_search(k2)) {
                gamma[(i, j)] = *g;
                gamma[(j, i)] = *g;
            }
        }
        (delta, gamma)
    }
}

/// Reads `stream` once and sums the records per portfolio. Trades in
/// several portfolios count towards each; trades in none are skipped.
pub fn aggregate_sensitivities(
    stream: &mut dyn SensitivityStream,
    portfolios: &TradePortfolios,
) -> Result<BTreeMap<String, PortfolioSensitivities>, VarError> {
    let mut by_trade: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (portfolio, trades) in portfolios {
        for t in trades {
            by_trade.entry(t.as_str()).or_default().push(portfolio.as_str());
        }
    }
    let mut out: BTreeMap<String, PortfolioSensitivities> =
        portfolios.keys().map(|p| (p.clone(), PortfolioSensitivities::default())).collect();
    let mut skipped = 0usize;
    stream.reset();
    while let Some(record) = stream.next()? {
        match by_trade.get(record.trade_id.as_str()) {
            Some(ps) => {
                for p in ps {
                    if let Some(s) = out.get_mut(*p) {
                        s.add(&record);
                    }
                }
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "sensitivity records for trades outside every portfolio");
    }
    Ok(out)
}
