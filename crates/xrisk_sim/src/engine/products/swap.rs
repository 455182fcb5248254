//! Single-curve vanilla interest rate swap.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use xrisk_core::types::{Date, DayCountConvention, Period};

use super::{check_finite, schedule};
use crate::engine::priceable::{Cashflow, Priceable, PricingResult};
use crate::error::SimError;
use crate::market::SimMarket;
use crate::scenario::DateGrid;

/// Terms of a fixed versus floating swap.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VanillaSwapData {
    /// Currency of both legs
    pub currency: String,
    /// Floating index, projected on its simulated curve
    pub index: String,
    /// Notional
    pub notional: f64,
    /// Start date
    pub start: Date,
    /// End date
    pub maturity: Date,
    /// Fixed leg period
    pub fixed_tenor: Period,
    /// Floating leg period
    pub float_tenor: Period,
    /// Fixed rate
    pub fixed_rate: f64,
    /// Spread over the index
    #[cfg_attr(feature = "serde", serde(default))]
    pub spread: f64,
    /// Pays fixed when true
    pub payer: bool,
    /// Coupon accrual day counter
    #[cfg_attr(feature = "serde", serde(default))]
    pub day_counter: DayCountConvention,
}

/// Fixed leg against a floating leg fixing at period start.
///
/// Floating coupons whose period started on or before the evaluation
/// date use the index fixing of the start date; later ones use the
/// simulated forward.
#[derive(Debug, Clone, PartialEq)]
pub struct VanillaSwap {
    id: String,
    data: VanillaSwapData,
    fixed_dates: Vec<Date>,
    float_dates: Vec<Date>,
}

impl VanillaSwap {
    /// Builds both schedules.
    pub fn new(id: &str, data: VanillaSwapData) -> Result<Self, SimError> {
        check_finite(id, "notional", data.notional)?;
        check_finite(id, "fixed rate", data.fixed_rate)?;
        check_finite(id, "spread", data.spread)?;
        let fixed_dates = schedule(data.start, data.maturity, data.fixed_tenor)
            .map_err(|e| SimError::config(id, e.to_string()))?;
        let float_dates = schedule(data.start, data.maturity, data.float_tenor)
            .map_err(|e| SimError::config(id, e.to_string()))?;
        Ok(Self {
            id: id.to_string(),
            data,
            fixed_dates,
            float_dates,
        })
    }

    fn fixed_sign(&self) -> f64 {
        if self.data.payer {
            -1.0
        } else {
            1.0
        }
    }

    fn float_rate(&self, market: &SimMarket, start: Date, end: Date) -> Result<f64, SimError> {
        let rate = if start <= market.asof() {
            market.fixing(&self.data.index, start)?
        } else {
            market.forward_rate(&self.data.index, market.time_to(start), market.time_to(end))?
        };
        Ok(rate + self.data.spread)
    }

    /// Fixed and floating leg values, both as received amounts.
    fn leg_npvs(&self, market: &SimMarket) -> Result<(f64, f64), SimError> {
        let d = &self.data;
        let asof = market.asof();
        let mut fixed = 0.0;
        for w in self.fixed_dates.windows(2).filter(|w| w[1] > asof) {
            let tau = d.day_counter.year_fraction(w[0], w[1]);
            fixed += d.fixed_rate * tau * d.notional * market.discount(&d.currency, market.time_to(w[1]))?;
        }
        let mut float = 0.0;
        for w in self.float_dates.windows(2).filter(|w| w[1] > asof) {
            let tau = d.day_counter.year_fraction(w[0], w[1]);
            let rate = self.float_rate(market, w[0], w[1])?;
            float += rate * tau * d.notional * market.discount(&d.currency, market.time_to(w[1]))?;
        }
        Ok((fixed, float))
    }
}

impl Priceable for VanillaSwap {
    fn id(&self) -> &str {
        &self.id
    }

    fn price(&self, market: &SimMarket) -> Result<PricingResult, SimError> {
        let (fixed, float) = self.leg_npvs(market)?;
        let s = self.fixed_sign();
        Ok(PricingResult::new(s * (fixed - float), self.data.currency.as_str())
            .with("fixedLegNpv", s * fixed)
            .with("floatLegNpv", -s * float))
    }

    fn maturity(&self) -> Date {
        self.data.maturity
    }

    fn required_fixings(&self, grid: &DateGrid) -> Vec<(String, Date)> {
        let asof = grid.asof();
        self.float_dates
            .windows(2)
            .filter(|w| w[0] < asof && w[1] > asof)
            .map(|w| (self.data.index.clone(), w[0]))
            .collect()
    }

    fn cashflows(&self, from: Date, to: Date, market: &SimMarket) -> Result<Vec<Cashflow>, SimError> {
        let d = &self.data;
        let s = self.fixed_sign();
        let paid = |end: Date| from < end && end <= to;
        let mut flows = Vec::new();
        for w in self.fixed_dates.windows(2).filter(|w| paid(w[1])) {
            let tau = d.day_counter.year_fraction(w[0], w[1]);
            flows.push(Cashflow {
                date: w[1],
                amount: s * d.fixed_rate * tau * d.notional,
                currency: d.currency.clone(),
            });
        }
        for w in self.float_dates.windows(2).filter(|w| paid(w[1])) {
            let tau = d.day_counter.year_fraction(w[0], w[1]);
            let rate = market.fixing(&d.index, w[0])? + d.spread;
            flows.push(Cashflow {
                date: w[1],
                amount: -s * rate * tau * d.notional,
                currency: d.currency.clone(),
            });
        }
        Ok(flows)
    }

    fn clone_box(&self) -> Box<dyn Priceable> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{asof, market_at, EUR_RATE, INDEX};
    use crate::market::Fixings;
    use approx::assert_relative_eq;
    use xrisk_core::types::TimeUnit;

    fn data(start: Date, fixed_rate: f64) -> VanillaSwapData {
        VanillaSwapData {
            currency: "EUR".into(),
            index: INDEX.into(),
            notional: 1.0e6,
            start,
            maturity: start.add_period(Period::new(5, TimeUnit::Years)).unwrap(),
            fixed_tenor: Period::new(1, TimeUnit::Years),
            float_tenor: Period::new(6, TimeUnit::Months),
            fixed_rate,
            spread: 0.0,
            payer: true,
            day_counter: DayCountConvention::Actual365Fixed,
        }
    }

    #[test]
    fn test_legs_have_opposite_signs_for_payer() {
        let swap = VanillaSwap::new("S", data(asof(), 0.02)).unwrap();
        let r = swap.price(&market_at(asof(), Fixings::new())).unwrap();
        assert!(r.additional["fixedLegNpv"] < 0.0);
        assert!(r.additional["floatLegNpv"] > 0.0);
        assert_relative_eq!(r.npv, r.additional["fixedLegNpv"] + r.additional["floatLegNpv"], epsilon = 1e-6);
    }

    #[test]
    fn test_par_rate_gives_small_npv() {
        // flat continuous 2% curve: the simple forward over each period
        // is slightly above 2%
        let swap = VanillaSwap::new("S", data(asof(), (EUR_RATE).exp() - 1.0)).unwrap();
        let r = swap.price(&market_at(asof(), Fixings::new())).unwrap();
        assert!(r.npv.abs() < 1.0e3, "npv {}", r.npv);
    }

    #[test]
    fn test_seasoned_swap_needs_fixing() {
        let start = Date::from_ymd(2024, 11, 4).unwrap();
        let swap = VanillaSwap::new("S", data(start, 0.02)).unwrap();
        let grid = DateGrid::new(
            asof(),
            vec![Date::from_ymd(2026, 1, 2).unwrap()],
            DayCountConvention::Actual365Fixed,
        )
        .unwrap();
        assert_eq!(swap.required_fixings(&grid), vec![(INDEX.to_string(), start)]);
        assert!(swap.price(&market_at(asof(), Fixings::new())).is_err());
        let mut fixings = Fixings::new();
        fixings.add(INDEX, start, 0.03);
        assert!(swap.price(&market_at(asof(), fixings)).is_ok());
    }
}
