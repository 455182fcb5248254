//! Trades as seen by the valuation engine.

use std::collections::BTreeMap;
use std::fmt;

use xrisk_core::types::Date;

use crate::error::SimError;
use crate::market::SimMarket;
use crate::scenario::DateGrid;

/// Result of pricing a trade on a simulated market.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingResult {
    /// Present value at the market's evaluation date, undeflated
    pub npv: f64,
    /// Currency of `npv`
    pub currency: String,
    /// Further named results
    pub additional: BTreeMap<String, f64>,
}

impl PricingResult {
    /// NPV without additional results.
    pub fn new(npv: f64, currency: impl Into<String>) -> Self {
        Self {
            npv,
            currency: currency.into(),
            additional: BTreeMap::new(),
        }
    }

    /// Adds a named result.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.additional.insert(name.to_string(), value);
        self
    }
}

/// Amount paid on a date.
#[derive(Debug, Clone, PartialEq)]
pub struct Cashflow {
    /// Payment date
    pub date: Date,
    /// Amount, positive when received
    pub amount: f64,
    /// Payment currency
    pub currency: String,
}

/// A trade priced along simulated paths.
///
/// The engine calls, per sample: `reset`, then per date in chronological
/// order `advance` followed by `price`.
pub trait Priceable: Send + Sync + fmt::Debug {
    /// Trade id.
    fn id(&self) -> &str;

    /// Records path information at the market's evaluation date.
    fn advance(&mut self, _market: &SimMarket) -> Result<(), SimError> {
        Ok(())
    }

    /// Prices the trade on the current market.
    fn price(&self, market: &SimMarket) -> Result<PricingResult, SimError>;

    /// Clears path memory before a new sample.
    fn reset(&mut self) {}

    /// Last payment date.
    fn maturity(&self) -> Date;

    /// `(index, date)` fixings needed before the first simulation date.
    fn required_fixings(&self, _grid: &DateGrid) -> Vec<(String, Date)> {
        Vec::new()
    }

    /// Cashflows paid in `(from, to]`.
    fn cashflows(&self, _from: Date, _to: Date, _market: &SimMarket) -> Result<Vec<Cashflow>, SimError> {
        Ok(Vec::new())
    }

    /// Boxed copy.
    fn clone_box(&self) -> Box<dyn Priceable>;
}

impl Clone for Box<dyn Priceable> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
