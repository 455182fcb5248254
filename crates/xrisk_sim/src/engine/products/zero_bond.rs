//! Zero coupon bond.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use xrisk_core::types::Date;

use super::check_finite;
use crate::engine::priceable::{Cashflow, Priceable, PricingResult};
use crate::error::SimError;
use crate::market::SimMarket;

/// Terms of a zero coupon bond.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZeroCouponBondData {
    /// Payment currency
    pub currency: String,
    /// Amount paid at maturity; negative for a short position
    pub notional: f64,
    /// Payment date
    pub maturity: Date,
}

/// Pays `notional` at maturity.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroCouponBond {
    id: String,
    data: ZeroCouponBondData,
}

impl ZeroCouponBond {
    /// Creates the bond.
    pub fn new(id: &str, data: ZeroCouponBondData) -> Result<Self, SimError> {
        check_finite(id, "notional", data.notional)?;
        Ok(Self {
            id: id.to_string(),
            data,
        })
    }
}

impl Priceable for ZeroCouponBond {
    fn id(&self) -> &str {
        &self.id
    }

    fn price(&self, market: &SimMarket) -> Result<PricingResult, SimError> {
        let d = &self.data;
        // a payment on the evaluation date is a cashflow, not value
        let npv = if d.maturity <= market.asof() {
            0.0
        } else {
            d.notional * market.discount(&d.currency, market.time_to(d.maturity))?
        };
        Ok(PricingResult::new(npv, d.currency.as_str()))
    }

    fn maturity(&self) -> Date {
        self.data.maturity
    }

    fn cashflows(&self, from: Date, to: Date, _market: &SimMarket) -> Result<Vec<Cashflow>, SimError> {
        let d = &self.data;
        if from < d.maturity && d.maturity <= to {
            Ok(vec![Cashflow {
                date: d.maturity,
                amount: d.notional,
                currency: d.currency.clone(),
            }])
        } else {
            Ok(Vec::new())
        }
    }

    fn clone_box(&self) -> Box<dyn Priceable> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{asof, market_at, EUR_RATE};
    use crate::market::Fixings;
    use approx::assert_relative_eq;

    #[test]
    fn test_npv_and_payment() {
        let maturity = Date::from_ymd(2027, 1, 2).unwrap();
        let zcb = ZeroCouponBond::new(
            "Z",
            ZeroCouponBondData {
                currency: "EUR".into(),
                notional: -50.0,
                maturity,
            },
        )
        .unwrap();
        let m = market_at(asof(), Fixings::new());
        assert_relative_eq!(zcb.price(&m).unwrap().npv, -50.0 * (-EUR_RATE * 2.0).exp(), epsilon = 1e-12);
        assert_eq!(zcb.price(&market_at(maturity, Fixings::new())).unwrap().npv, 0.0);
        assert_eq!(zcb.cashflows(asof(), maturity, &m).unwrap().len(), 1);
        assert!(zcb.cashflows(maturity, maturity, &m).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_nan_notional() {
        let data = ZeroCouponBondData {
            currency: "EUR".into(),
            notional: f64::NAN,
            maturity: asof(),
        };
        assert!(ZeroCouponBond::new("Z", data).is_err());
    }
}
