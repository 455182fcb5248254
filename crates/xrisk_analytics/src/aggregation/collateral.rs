//! CSA margin call simulation along one scenario path.
//!
//! Amounts are in the CSA currency. Time runs in calendar days from the
//! as-of date; margin calls happen every `margin_call_frequency_days` and
//! settle after the lag given by [`CalculationType::settlement_lag`](crate::portfolio::CalculationType::settlement_lag).

use std::collections::VecDeque;

use xrisk_core::types::Date;

use crate::portfolio::CsaDetails;

/// Collateral the CSA requires for an uncollateralised value.
///
/// # Examples
///
/// ```
/// use xrisk_analytics::aggregation::credit_support_amount;
/// use xrisk_analytics::portfolio::CsaDetails;
///
/// let csa = CsaDetails::new("EUR").with_thresholds(5.0, 10.0);
/// assert_eq!(credit_support_amount(&csa, 25.0), 15.0);
/// assert_eq!(credit_support_amount(&csa, 8.0), 0.0);
/// assert_eq!(credit_support_amount(&csa, -25.0), -20.0);
/// ```
pub fn credit_support_amount(csa: &CsaDetails, uncollateralised_value: f64) -> f64 {
    let v = uncollateralised_value + csa.independent_amount_held();
    if v >= 0.0 {
        (v - csa.threshold_rcv()).max(0.0)
    } else {
        (v + csa.threshold_pay()).min(0.0)
    }
}

/// Margin to call given the required amount, the settled balance and
/// margins called but not yet settled.
///
/// Zero when the shortfall is below the minimum transfer amount of its
/// direction.
pub fn margin_requirement(csa: &CsaDetails, credit_support: f64, balance: f64, open_margins: f64) -> f64 {
    let shortfall = credit_support - balance - open_margins;
    let mta = if shortfall >= 0.0 { csa.mta_rcv() } else { csa.mta_pay() };
    if shortfall.abs() >= mta {
        shortfall
    } else {
        0.0
    }
}

/// Collateral balances along one path.
#[derive(Clone, Debug, PartialEq)]
pub struct CollateralPath {
    /// Balance at the as-of date, after the initial call
    pub t0: f64,
    /// Balance at each valuation date
    pub at_dates: Vec<f64>,
}

/// Simulates margin calls along one path.
///
/// `npv_path[k]` is the uncollateralised value at `dates[k]`. Between grid
/// dates the value is interpolated linearly (from `npv0` at the as-of
/// date) and held flat after the last date. The initial call settles
/// immediately.
pub fn collateral_balance_path(
    csa: &CsaDetails,
    asof: Date,
    dates: &[Date],
    npv0: f64,
    npv_path: &[f64],
    initial_balance: f64,
) -> CollateralPath {
    let days: Vec<i64> = dates.iter().map(|d| *d - asof).collect();
    let value_at = |day: i64| -> f64 { interpolate(day, &days, npv0, npv_path) };

    let balance0 = initial_balance
        + margin_requirement(csa, credit_support_amount(csa, npv0), initial_balance, 0.0);

    let last_day = days.last().copied().unwrap_or(0);
    let frequency = i64::from(csa.margin_call_frequency_days().max(1));
    let calculation_type = csa.calculation_type();

    // (settle day, amount); open margins share one lag so settle in order
    let mut settled: Vec<(i64, f64)> = Vec::new();
    let mut open: VecDeque<(i64, f64)> = VecDeque::new();
    let mut balance = balance0;

    let mut call_day = frequency;
    while call_day <= last_day {
        while let Some(&(day, amount)) = open.front() {
            if day > call_day {
                break;
            }
            balance += amount;
            settled.push((day, amount));
            open.pop_front();
        }
        let open_amount: f64 = open.iter().map(|(_, a)| a).sum();
        let required = credit_support_amount(csa, value_at(call_day));
        let margin = margin_requirement(csa, required, balance, open_amount);
        if margin != 0.0 {
            let lag = calculation_type.settlement_lag(margin, csa.mpor_days());
            if lag == 0 {
                balance += margin;
                settled.push((call_day, margin));
            } else {
                open.push_back((call_day + lag, margin));
            }
        }
        call_day += frequency;
    }
    settled.extend(open);

    let at_dates = days
        .iter()
        .map(|&d| {
            balance0
                + settled
                    .iter()
                    .filter(|(day, _)| *day <= d)
                    .map(|(_, amount)| amount)
                    .sum::<f64>()
        })
        .collect();
    CollateralPath { t0: balance0, at_dates }
}

fn interpolate(day: i64, days: &[i64], npv0: f64, npv_path: &[f64]) -> f64 {
    if day <= 0 || days.is_empty() {
        return npv0;
    }
    let k = days.partition_point(|&d| d < day);
    if k >= days.len() {
        return npv_path.last().copied().unwrap_or(npv0);
    }
    if days[k] == day {
        return npv_path[k];
    }
    let (d0, v0) = if k == 0 { (0, npv0) } else { (days[k - 1], npv_path[k - 1]) };
    let (d1, v1) = (days[k], npv_path[k]);
    v0 + (v1 - v0) * (day - d0) as f64 / (d1 - d0) as f64
}
