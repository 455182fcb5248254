//! FX forward.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use xrisk_core::types::Date;

use super::check_finite;
use crate::engine::priceable::{Cashflow, Priceable, PricingResult};
use crate::error::SimError;
use crate::market::SimMarket;

/// Terms of an FX forward.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FxForwardData {
    /// Currency received
    pub bought_currency: String,
    /// Amount received
    pub bought_amount: f64,
    /// Currency paid
    pub sold_currency: String,
    /// Amount paid
    pub sold_amount: f64,
    /// Settlement date
    pub maturity: Date,
}

/// Exchanges `sold_amount` for `bought_amount` at maturity.
///
/// The NPV is reported in the sold currency.
#[derive(Debug, Clone, PartialEq)]
pub struct FxForward {
    id: String,
    data: FxForwardData,
}

impl FxForward {
    /// Creates the forward.
    pub fn new(id: &str, data: FxForwardData) -> Result<Self, SimError> {
        check_finite(id, "bought amount", data.bought_amount)?;
        check_finite(id, "sold amount", data.sold_amount)?;
        if data.bought_currency == data.sold_currency {
            return Err(SimError::config(id, "bought and sold currency are equal"));
        }
        Ok(Self {
            id: id.to_string(),
            data,
        })
    }
}

impl Priceable for FxForward {
    fn id(&self) -> &str {
        &self.id
    }

    fn price(&self, market: &SimMarket) -> Result<PricingResult, SimError> {
        let d = &self.data;
        if d.maturity <= market.asof() {
            return Ok(PricingResult::new(0.0, d.sold_currency.as_str()));
        }
        let t = market.time_to(d.maturity);
        let bought = d.bought_amount * market.discount(&d.bought_currency, t)?;
        let sold = d.sold_amount * market.discount(&d.sold_currency, t)?;
        let rate = market.fx_rate(&d.bought_currency, &d.sold_currency)?;
        Ok(PricingResult::new(bought * rate - sold, d.sold_currency.as_str()).with("fxSpot", rate))
    }

    fn maturity(&self) -> Date {
        self.data.maturity
    }

    fn cashflows(&self, from: Date, to: Date, _market: &SimMarket) -> Result<Vec<Cashflow>, SimError> {
        let d = &self.data;
        if !(from < d.maturity && d.maturity <= to) {
            return Ok(Vec::new());
        }
        Ok(vec![
            Cashflow {
                date: d.maturity,
                amount: d.bought_amount,
                currency: d.bought_currency.clone(),
            },
            Cashflow {
                date: d.maturity,
                amount: -d.sold_amount,
                currency: d.sold_currency.clone(),
            },
        ])
    }

    fn clone_box(&self) -> Box<dyn Priceable> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{asof, market_at, EUR_RATE, USD_RATE};
    use crate::market::Fixings;
    use approx::assert_relative_eq;

    fn data() -> FxForwardData {
        FxForwardData {
            bought_currency: "USD".into(),
            bought_amount: 1.1e6,
            sold_currency: "EUR".into(),
            sold_amount: 1.0e6,
            maturity: Date::from_ymd(2026, 1, 2).unwrap(),
        }
    }

    #[test]
    fn test_npv_in_sold_currency() {
        let fwd = FxForward::new("F", data()).unwrap();
        let r = fwd.price(&market_at(asof(), Fixings::new())).unwrap();
        let expected = 1.1e6 * (-USD_RATE).exp() * 0.9 - 1.0e6 * (-EUR_RATE).exp();
        assert_relative_eq!(r.npv, expected, epsilon = 1e-6);
        assert_eq!(r.currency, "EUR");
        assert_relative_eq!(r.additional["fxSpot"], 0.9);
    }

    #[test]
    fn test_same_currency_rejected() {
        let mut d = data();
        d.bought_currency = "EUR".into();
        assert!(matches!(FxForward::new("F", d), Err(SimError::Configuration { .. })));
    }
}
