//! FX average-rate forward.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use xrisk_core::types::Date;

use super::check_finite;
use crate::engine::priceable::{Cashflow, Priceable, PricingResult};
use crate::error::SimError;
use crate::market::{fx_fixing_name, SimMarket};
use crate::scenario::DateGrid;

/// Terms of an FX average-rate forward.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AveragingNoteData {
    /// Currency whose rate is averaged
    pub foreign_currency: String,
    /// Payment currency; rates are quoted in it per foreign unit
    pub pay_currency: String,
    /// Notional in foreign units
    pub notional: f64,
    /// Strike rate
    pub strike: f64,
    /// Averaging dates, increasing
    pub observation_dates: Vec<Date>,
    /// Payment date, not before the last observation
    pub maturity: Date,
}

/// Pays `notional * (A - strike)` at maturity, `A` being the average FX
/// rate over the observation dates.
///
/// Observed rates are path memory: they accumulate through `advance` and
/// are cleared by `reset`.
#[derive(Debug, Clone, PartialEq)]
pub struct AveragingNote {
    id: String,
    data: AveragingNoteData,
    observed_sum: f64,
    observed: usize,
}

impl AveragingNote {
    /// Creates the note.
    pub fn new(id: &str, data: AveragingNoteData) -> Result<Self, SimError> {
        check_finite(id, "notional", data.notional)?;
        check_finite(id, "strike", data.strike)?;
        let obs = &data.observation_dates;
        if obs.is_empty() || obs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::config(id, "observation dates must be non-empty and increasing"));
        }
        if obs.last().is_some_and(|last| *last > data.maturity) {
            return Err(SimError::config(id, "last observation after maturity"));
        }
        Ok(Self {
            id: id.to_string(),
            data,
            observed_sum: 0.0,
            observed: 0,
        })
    }

    /// Number of rates observed on the current path.
    pub fn observed(&self) -> usize {
        self.observed
    }

    fn fx_fixing(&self, market: &SimMarket, ccy: &str, date: Date) -> Result<f64, SimError> {
        if ccy == market.base_currency() {
            Ok(1.0)
        } else {
            market.fixing(&fx_fixing_name(ccy), date)
        }
    }

    fn average(&self, market: &SimMarket) -> Result<f64, SimError> {
        let d = &self.data;
        let spot = market.fx_rate(&d.foreign_currency, &d.pay_currency)?;
        let mut sum = self.observed_sum;
        for date in &d.observation_dates[self.observed..] {
            let t = market.time_to(*date);
            sum += if t <= 0.0 {
                spot
            } else {
                spot * market.discount(&d.foreign_currency, t)? / market.discount(&d.pay_currency, t)?
            };
        }
        Ok(sum / d.observation_dates.len() as f64)
    }
}

impl Priceable for AveragingNote {
    fn id(&self) -> &str {
        &self.id
    }

    fn advance(&mut self, market: &SimMarket) -> Result<(), SimError> {
        while let Some(date) = self.data.observation_dates.get(self.observed).copied() {
            if date > market.asof() {
                break;
            }
            let rate = self.fx_fixing(market, &self.data.foreign_currency, date)?
                / self.fx_fixing(market, &self.data.pay_currency, date)?;
            self.observed_sum += rate;
            self.observed += 1;
        }
        Ok(())
    }

    fn price(&self, market: &SimMarket) -> Result<PricingResult, SimError> {
        let d = &self.data;
        if d.maturity <= market.asof() {
            return Ok(PricingResult::new(0.0, d.pay_currency.as_str()));
        }
        let average = self.average(market)?;
        let df = market.discount(&d.pay_currency, market.time_to(d.maturity))?;
        Ok(PricingResult::new(d.notional * (average - d.strike) * df, d.pay_currency.as_str())
            .with("expectedAverage", average))
    }

    fn reset(&mut self) {
        self.observed_sum = 0.0;
        self.observed = 0;
    }

    fn maturity(&self) -> Date {
        self.data.maturity
    }

    /// Lists both currencies' FX fixings; the engine drops those of the
    /// base currency, which are identically 1.
    fn required_fixings(&self, grid: &DateGrid) -> Vec<(String, Date)> {
        let asof = grid.asof();
        let names = [
            fx_fixing_name(&self.data.foreign_currency),
            fx_fixing_name(&self.data.pay_currency),
        ];
        self.data
            .observation_dates
            .iter()
            .filter(|d| **d < asof)
            .flat_map(|d| names.iter().map(move |n| (n.clone(), *d)))
            .collect()
    }

    fn cashflows(&self, from: Date, to: Date, market: &SimMarket) -> Result<Vec<Cashflow>, SimError> {
        let d = &self.data;
        if !(from < d.maturity && d.maturity <= to) {
            return Ok(Vec::new());
        }
        Ok(vec![Cashflow {
            date: d.maturity,
            amount: d.notional * (self.average(market)? - d.strike),
            currency: d.pay_currency.clone(),
        }])
    }

    fn clone_box(&self) -> Box<dyn Priceable> {
        Box::new(self.clone())
    }
}
