//! Valuation calculators writing into the cube.
//!
//! A calculator turns one trade on one simulated market into cube values.
//! All values are in base currency and, except at T0, deflated by the
//! scenario numeraire.

use std::fmt;

use tracing::trace;
use xrisk_core::types::Date;

use super::priceable::Priceable;
use crate::cube::CubeWriter;
use crate::error::SimError;
use crate::market::SimMarket;

/// Position of a `calculate` call in the cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationContext {
    /// Cube id of the trade
    pub trade_index: usize,
    /// Cube date index (valuation date index)
    pub date_index: usize,
    /// Global sample index
    pub sample: usize,
    /// Evaluation date of the market
    pub date: Date,
    /// Previous valuation date, or the as-of date
    pub previous_date: Date,
    /// Whether the market is a close-out market of `date_index`
    pub is_close_out: bool,
}

/// Writes values for one trade at T0 and on each simulated market.
pub trait ValuationCalculator: Send + Sync + fmt::Debug {
    /// Writes T0 values for `trade_index`.
    fn calculate_t0(
        &self,
        trade: &dyn Priceable,
        trade_index: usize,
        market: &SimMarket,
        cube: &mut dyn CubeWriter,
    ) -> Result<(), SimError>;

    /// Writes values at the position given by `ctx`.
    fn calculate(
        &self,
        trade: &dyn Priceable,
        ctx: &CalculationContext,
        market: &SimMarket,
        cube: &mut dyn CubeWriter,
    ) -> Result<(), SimError>;
}

/// NPV in base currency, undeflated.
fn base_npv(trade: &dyn Priceable, market: &SimMarket) -> Result<f64, SimError> {
    let result = trade.price(market)?;
    let npv = result.npv * market.fx_spot(&result.currency)?;
    if !npv.is_finite() {
        return Err(SimError::pricing(trade.id(), format!("non-finite NPV at {}", market.asof())));
    }
    Ok(npv)
}

/// Deflated base-currency NPV on valuation dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NpvCalculator {
    /// Cube depth written
    pub index: usize,
}

impl NpvCalculator {
    /// Calculator writing at depth `index`.
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl ValuationCalculator for NpvCalculator {
    fn calculate_t0(
        &self,
        trade: &dyn Priceable,
        trade_index: usize,
        market: &SimMarket,
        cube: &mut dyn CubeWriter,
    ) -> Result<(), SimError> {
        let npv = base_npv(trade, market)?;
        cube.set_t0(npv / market.numeraire(), trade_index, self.index)?;
        Ok(())
    }

    fn calculate(
        &self,
        trade: &dyn Priceable,
        ctx: &CalculationContext,
        market: &SimMarket,
        cube: &mut dyn CubeWriter,
    ) -> Result<(), SimError> {
        if ctx.is_close_out {
            return Ok(());
        }
        let value = base_npv(trade, market)? / market.numeraire();
        trace!(trade = trade.id(), date = %ctx.date, sample = ctx.sample, value, "npv");
        cube.set(value, ctx.trade_index, ctx.date_index, ctx.sample, self.index)?;
        Ok(())
    }
}

/// Deflated base-currency cashflows paid in `(previous_date, date]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashflowCalculator {
    /// Cube depth written
    pub index: usize,
}

impl CashflowCalculator {
    /// Calculator writing at depth `index`.
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl ValuationCalculator for CashflowCalculator {
    fn calculate_t0(
        &self,
        _trade: &dyn Priceable,
        trade_index: usize,
        _market: &SimMarket,
        cube: &mut dyn CubeWriter,
    ) -> Result<(), SimError> {
        cube.set_t0(0.0, trade_index, self.index)?;
        Ok(())
    }

    fn calculate(
        &self,
        trade: &dyn Priceable,
        ctx: &CalculationContext,
        market: &SimMarket,
        cube: &mut dyn CubeWriter,
    ) -> Result<(), SimError> {
        if ctx.is_close_out {
            return Ok(());
        }
        let mut total = 0.0;
        for flow in trade.cashflows(ctx.previous_date, ctx.date, market)? {
            total += flow.amount * market.fx_spot(&flow.currency)?;
        }
        cube.set(total / market.numeraire(), ctx.trade_index, ctx.date_index, ctx.sample, self.index)?;
        Ok(())
    }
}

/// Deflated base-currency NPV on close-out markets, written at the depth
/// of the valuation date being closed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NpvCloseOutCalculator {
    /// Cube depth written
    pub close_out_index: usize,
}

impl NpvCloseOutCalculator {
    /// Calculator writing at depth `close_out_index`.
    pub fn new(close_out_index: usize) -> Self {
        Self { close_out_index }
    }
}

impl ValuationCalculator for NpvCloseOutCalculator {
    fn calculate_t0(
        &self,
        trade: &dyn Priceable,
        trade_index: usize,
        market: &SimMarket,
        cube: &mut dyn CubeWriter,
    ) -> Result<(), SimError> {
        let npv = base_npv(trade, market)?;
        cube.set_t0(npv / market.numeraire(), trade_index, self.close_out_index)?;
        Ok(())
    }

    fn calculate(
        &self,
        trade: &dyn Priceable,
        ctx: &CalculationContext,
        market: &SimMarket,
        cube: &mut dyn CubeWriter,
    ) -> Result<(), SimError> {
        if !ctx.is_close_out {
            return Ok(());
        }
        let value = base_npv(trade, market)? / market.numeraire();
        cube.set(value, ctx.trade_index, ctx.date_index, ctx.sample, self.close_out_index)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube::SampleBuffer;
    use crate::engine::fixtures::{asof, market_at, USD_RATE};
    use crate::engine::products::{FxForward, FxForwardData, ZeroCouponBond, ZeroCouponBondData};
    use crate::market::Fixings;
    use approx::assert_relative_eq;

    fn usd_bond() -> ZeroCouponBond {
        ZeroCouponBond::new(
            "Z",
            ZeroCouponBondData {
                currency: "USD".into(),
                notional: 100.0,
                maturity: Date::from_ymd(2026, 1, 2).unwrap(),
            },
        )
        .unwrap()
    }

    fn ctx(date: Date, previous_date: Date, is_close_out: bool) -> CalculationContext {
        CalculationContext {
            trade_index: 0,
            date_index: 1,
            sample: 2,
            date,
            previous_date,
            is_close_out,
        }
    }

    #[test]
    fn test_npv_converted_to_base() {
        let m = market_at(asof(), Fixings::new());
        let mut buf = SampleBuffer::new(1, 2, 3, 2);
        NpvCalculator::new(0).calculate_t0(&usd_bond(), 0, &m, &mut buf).unwrap();
        assert_relative_eq!(buf.get_t0(0, 0).unwrap(), 100.0 * (-USD_RATE).exp() * 0.9, epsilon = 1e-10);
        NpvCalculator::new(1)
            .calculate(&usd_bond(), &ctx(asof(), asof(), false), &m, &mut buf)
            .unwrap();
        assert_relative_eq!(buf.get(0, 1, 2, 1).unwrap(), buf.get_t0(0, 0).unwrap(), epsilon = 1e-12);
    }

    #[test]
    fn test_close_out_flags_route_values() {
        let m = market_at(asof(), Fixings::new());
        let mut buf = SampleBuffer::new(1, 2, 3, 2);
        NpvCalculator::new(0)
            .calculate(&usd_bond(), &ctx(asof(), asof(), true), &m, &mut buf)
            .unwrap();
        NpvCloseOutCalculator::new(1)
            .calculate(&usd_bond(), &ctx(asof(), asof(), false), &m, &mut buf)
            .unwrap();
        assert_eq!(buf.get(0, 1, 2, 0).unwrap(), 0.0);
        assert_eq!(buf.get(0, 1, 2, 1).unwrap(), 0.0);
        NpvCloseOutCalculator::new(1)
            .calculate(&usd_bond(), &ctx(asof(), asof(), true), &m, &mut buf)
            .unwrap();
        assert!(buf.get(0, 1, 2, 1).unwrap() > 0.0);
    }

    #[test]
    fn test_cashflows_in_period() {
        let maturity = Date::from_ymd(2026, 1, 2).unwrap();
        let fwd = FxForward::new(
            "F",
            FxForwardData {
                bought_currency: "USD".into(),
                bought_amount: 110.0,
                sold_currency: "EUR".into(),
                sold_amount: 100.0,
                maturity,
            },
        )
        .unwrap();
        let m = market_at(maturity, Fixings::new());
        let mut buf = SampleBuffer::new(1, 2, 3, 1);
        let calc = CashflowCalculator::new(0);
        calc.calculate(&fwd, &ctx(maturity, asof(), false), &m, &mut buf).unwrap();
        assert_relative_eq!(buf.get(0, 1, 2, 0).unwrap(), 110.0 * 0.9 - 100.0, epsilon = 1e-10);

        let before = maturity.add_days(-1).unwrap();
        calc.calculate(&fwd, &ctx(before, asof(), false), &m, &mut buf).unwrap();
        assert_eq!(buf.get(0, 1, 2, 0).unwrap(), 0.0);
    }
}
