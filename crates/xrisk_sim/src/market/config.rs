//! Simulated market layout.

use nalgebra::DMatrix;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use xrisk_core::math::{pseudo_sqrt, SalvageMethod};
use xrisk_core::types::Period;

use crate::error::SimError;
use crate::scenario::{KeyType, RiskFactorKey};

/// Projection index simulated on a single curve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexConfig {
    /// Index name, e.g. `EUR-EURIBOR-6M`
    pub name: String,
    /// Currency whose model drives the curve
    pub currency: String,
    /// Fixing tenor
    pub tenor: Period,
}

/// Which curves, spots and nodes the simulated market carries.
///
/// Every key this layout implies must be present in each scenario applied
/// to a [`SimMarket`](super::SimMarket).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimMarketConfig {
    /// Reporting currency; FX spots quote units of it per foreign unit
    pub base_currency: String,
    /// Currencies with a simulated discount curve
    pub currencies: Vec<String>,
    /// Discount curve node tenors
    pub discount_tenors: Vec<Period>,
    /// Projection indices
    #[cfg_attr(feature = "serde", serde(default))]
    pub indices: Vec<IndexConfig>,
    /// Simulated equity names
    #[cfg_attr(feature = "serde", serde(default))]
    pub equities: Vec<String>,
    /// Simulated credit names
    #[cfg_attr(feature = "serde", serde(default))]
    pub credit_names: Vec<String>,
    /// Survival curve node tenors
    #[cfg_attr(feature = "serde", serde(default))]
    pub survival_tenors: Vec<Period>,
    /// Number of systemic credit factors
    #[cfg_attr(feature = "serde", serde(default))]
    pub credit_state_factors: usize,
    /// Correlation of the systemic credit factors, row by row; empty for
    /// independent factors
    #[cfg_attr(feature = "serde", serde(default))]
    pub credit_state_correlation: Vec<Vec<f64>>,
}

fn increasing(tenors: &[Period]) -> bool {
    tenors.first().is_some_and(|p| p.years() > 0.0)
        && tenors.windows(2).all(|w| w[1].years() > w[0].years())
}

impl SimMarketConfig {
    /// Single-currency layout with the given discount tenors.
    pub fn single_currency(currency: &str, discount_tenors: Vec<Period>) -> Self {
        Self {
            base_currency: currency.to_string(),
            currencies: vec![currency.to_string()],
            discount_tenors,
            indices: Vec::new(),
            equities: Vec::new(),
            credit_names: Vec::new(),
            survival_tenors: Vec::new(),
            credit_state_factors: 0,
            credit_state_correlation: Vec::new(),
        }
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    /// `SimError::Configuration` naming the offending entry.
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.currencies.contains(&self.base_currency) {
            return Err(SimError::config(
                &self.base_currency,
                "base currency must have a simulated discount curve",
            ));
        }
        if !increasing(&self.discount_tenors) {
            return Err(SimError::config(
                "discount_tenors",
                "must be non-empty, positive and strictly increasing",
            ));
        }
        for index in &self.indices {
            if !self.currencies.contains(&index.currency) {
                return Err(SimError::config(
                    &index.name,
                    format!("index currency {} is not simulated", index.currency),
                ));
            }
            if index.tenor.years() <= 0.0 {
                return Err(SimError::config(&index.name, "index tenor must be positive"));
            }
        }
        if !self.credit_names.is_empty() && !increasing(&self.survival_tenors) {
            return Err(SimError::config(
                "survival_tenors",
                "must be non-empty, positive and strictly increasing when credit names are simulated",
            ));
        }
        self.credit_state_root()?;
        Ok(())
    }

    /// `S` with `S Sᵀ` the credit factor correlation, `None` when the
    /// factors are independent.
    ///
    /// # Errors
    /// `SimError::Configuration` if the matrix is not `n x n` for `n`
    /// factors, has a diagonal other than 1, or is not a correlation matrix.
    pub fn credit_state_root(&self) -> Result<Option<DMatrix<f64>>, SimError> {
        let c = &self.credit_state_correlation;
        if c.is_empty() {
            return Ok(None);
        }
        let n = self.credit_state_factors;
        if c.len() != n || c.iter().any(|row| row.len() != n) {
            return Err(SimError::config(
                "credit_state_correlation",
                format!("expected {n} x {n} for {n} credit state factors"),
            ));
        }
        let m = DMatrix::from_fn(n, n, |i, j| c[i][j]);
        for i in 0..n {
            if (m[(i, i)] - 1.0).abs() > 1.0e-12 {
                return Err(SimError::config(
                    "credit_state_correlation",
                    format!("diagonal entry {i} is {}", m[(i, i)]),
                ));
            }
        }
        pseudo_sqrt(&m, SalvageMethod::default())
            .map(Some)
            .map_err(|e| SimError::config("credit_state_correlation", e.to_string()))
    }

    /// Discount node times in years.
    pub fn discount_times(&self) -> Vec<f64> {
        self.discount_tenors.iter().map(Period::years).collect()
    }

    /// Survival node times in years.
    pub fn survival_times(&self) -> Vec<f64> {
        self.survival_tenors.iter().map(Period::years).collect()
    }

    /// Simulated currencies other than the base currency.
    pub fn fx_currencies(&self) -> impl Iterator<Item = &str> {
        self.currencies
            .iter()
            .filter(move |c| **c != self.base_currency)
            .map(String::as_str)
    }

    /// Index configuration by name.
    pub fn index(&self, name: &str) -> Option<&IndexConfig> {
        self.indices.iter().find(|i| i.name == name)
    }

    /// Every key a scenario must carry for this layout.
    pub fn required_keys(&self) -> Vec<RiskFactorKey> {
        let mut keys = Vec::new();
        let nd = self.discount_tenors.len();
        for ccy in &self.currencies {
            keys.extend((0..nd).map(|k| RiskFactorKey::new(KeyType::DiscountCurve, ccy.as_str(), k)));
        }
        for index in &self.indices {
            keys.extend((0..nd).map(|k| RiskFactorKey::new(KeyType::IndexCurve, index.name.as_str(), k)));
        }
        keys.extend(self.fx_currencies().map(|c| RiskFactorKey::new(KeyType::FxSpot, c, 0)));
        keys.extend(
            self.equities
                .iter()
                .map(|e| RiskFactorKey::new(KeyType::EquitySpot, e.as_str(), 0)),
        );
        let ns = self.survival_tenors.len();
        for name in &self.credit_names {
            keys.extend((0..ns).map(|k| RiskFactorKey::new(KeyType::SurvivalProbability, name.as_str(), k)));
        }
        keys.extend(
            (0..self.credit_state_factors)
                .map(|j| RiskFactorKey::new(KeyType::CreditState, j.to_string(), 0)),
        );
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenors(s: &[&str]) -> Vec<Period> {
        s.iter().map(|t| t.parse().unwrap()).collect()
    }

    #[test]
    fn test_required_keys() {
        let mut cfg = SimMarketConfig::single_currency("EUR", tenors(&["1Y", "5Y"]));
        cfg.currencies.push("USD".into());
        cfg.equities.push("SPX".into());
        cfg.credit_state_factors = 1;
        cfg.validate().unwrap();
        let keys = cfg.required_keys();
        assert_eq!(keys.len(), 2 + 2 + 1 + 1 + 1);
        assert!(keys.contains(&RiskFactorKey::new(KeyType::FxSpot, "USD", 0)));
        assert!(!keys.contains(&RiskFactorKey::new(KeyType::FxSpot, "EUR", 0)));
    }

    #[test]
    fn test_validation() {
        let cfg = SimMarketConfig::single_currency("EUR", tenors(&["5Y", "1Y"]));
        assert!(cfg.validate().is_err());
        let mut cfg = SimMarketConfig::single_currency("EUR", tenors(&["1Y"]));
        cfg.base_currency = "USD".into();
        assert!(cfg.validate().is_err());
        let mut cfg = SimMarketConfig::single_currency("EUR", tenors(&["1Y"]));
        cfg.credit_names.push("CPTY".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_credit_state_correlation() {
        let mut cfg = SimMarketConfig::single_currency("EUR", tenors(&["1Y"]));
        cfg.credit_state_factors = 2;
        assert!(cfg.credit_state_root().unwrap().is_none());

        cfg.credit_state_correlation = vec![vec![1.0, 0.6], vec![0.6, 1.0]];
        cfg.validate().unwrap();
        let s = cfg.credit_state_root().unwrap().unwrap();
        let back = &s * s.transpose();
        assert!((back[(0, 1)] - 0.6).abs() < 1e-12);

        cfg.credit_state_correlation = vec![vec![1.0, 0.6]];
        assert!(cfg.validate().is_err());
        cfg.credit_state_correlation = vec![vec![2.0, 0.0], vec![0.0, 1.0]];
        assert!(cfg.validate().is_err());
        cfg.credit_state_correlation = vec![vec![1.0, 1.5], vec![1.5, 1.0]];
        assert!(cfg.validate().is_err());
    }
}
