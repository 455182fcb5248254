//! Built-in simulation products.
//!
//! Each product is created from its `*Data` description and implements
//! [`Priceable`](super::Priceable) against a [`SimMarket`](crate::market::SimMarket).

mod averaging;
mod fx_forward;
mod swap;
mod zero_bond;

pub use averaging::{AveragingNote, AveragingNoteData};
pub use fx_forward::{FxForward, FxForwardData};
pub use swap::{VanillaSwap, VanillaSwapData};
pub use zero_bond::{ZeroCouponBond, ZeroCouponBondData};

use xrisk_core::types::{Date, Period};

use crate::error::SimError;

/// Unadjusted schedule `start, start + tenor, start + 2 tenor, ...` ending
/// exactly at `end`; a short final period absorbs the remainder.
pub(crate) fn schedule(start: Date, end: Date, tenor: Period) -> Result<Vec<Date>, SimError> {
    if end <= start || tenor.length <= 0 {
        return Err(SimError::config(
            format!("schedule {start} to {end}"),
            format!("invalid schedule with tenor {tenor}"),
        ));
    }
    let mut dates = vec![start];
    let mut k = 1;
    loop {
        let d = start.add_period(Period::new(tenor.length * k, tenor.unit))?;
        if d >= end {
            break;
        }
        dates.push(d);
        k += 1;
    }
    dates.push(end);
    Ok(dates)
}

/// Rejects non-finite amounts.
pub(crate) fn check_finite(id: &str, what: &str, value: f64) -> Result<(), SimError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::config(id, format!("{what} must be finite, got {value}")))
    }
}
