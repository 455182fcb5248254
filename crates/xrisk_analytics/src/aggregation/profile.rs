//! Exposure profile statistics shared by netting set and trade exposures.

use xrisk_core::market_data::curves::YieldCurve;
use xrisk_core::types::{Date, Period, TimeUnit};

use crate::error::AggregationError;

/// Index of the `quantile` order statistic among `n` sorted values.
#[inline]
pub(crate) fn quantile_index(quantile: f64, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let idx = (quantile * (n - 1) as f64 + 0.5).floor() as usize;
    idx.min(n - 1)
}

/// `quantile` order statistic of `values`, floored at zero. Sorts in place.
pub(crate) fn potential_future_exposure(values: &mut [f64], quantile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    values[quantile_index(quantile, values.len())].max(0.0)
}

/// EE profiles under the bank account measure.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct BankAccountProfiles {
    pub ee_b: Vec<f64>,
    pub eee_b: Vec<f64>,
    pub epe_b: f64,
    pub eepe_b: f64,
}

/// Undiscounts a deflated EPE profile and builds its one-year averages.
///
/// `epe[0]` and `times[0]` belong to the as-of date, `epe[k + 1]` and
/// `times[k + 1]` to `dates[k]`.
pub(crate) fn bank_account_profiles(
    epe: &[f64],
    times: &[f64],
    asof: Date,
    dates: &[Date],
    discount: &dyn YieldCurve<f64>,
) -> Result<BankAccountProfiles, AggregationError> {
    let ee_b = epe
        .iter()
        .zip(times)
        .map(|(e, &t)| Ok(e / discount.discount_factor(t)?))
        .collect::<Result<Vec<f64>, AggregationError>>()?;
    let eee_b = running_max(&ee_b);

    // dates up to one year plus a four day settlement buffer
    let horizon = asof
        .add_period(Period::new(1, TimeUnit::Years))
        .and_then(|d| d.add_days(4))
        .map_err(|e| AggregationError::config("as-of date", e.to_string()))?;
    let mut included = dates.iter().take_while(|d| **d <= horizon).count();
    if included == 0 && !dates.is_empty() {
        included = 1;
    }
    let epe_b = time_average(&ee_b, times, included);
    let eepe_b = time_average(&eee_b, times, included);
    Ok(BankAccountProfiles {
        ee_b,
        eee_b,
        epe_b,
        eepe_b,
    })
}

pub(crate) fn running_max(profile: &[f64]) -> Vec<f64> {
    profile
        .iter()
        .scan(f64::NEG_INFINITY, |m, &x| {
            *m = m.max(x);
            Some(*m)
        })
        .collect()
}

/// Average of `profile[1..=count]` weighted by the preceding time step.
fn time_average(profile: &[f64], times: &[f64], count: usize) -> f64 {
    let (mut sum, mut weight) = (0.0, 0.0);
    for k in 0..count {
        let w = times[k + 1] - times[k];
        sum += profile[k + 1] * w;
        weight += w;
    }
    if weight > 0.0 {
        sum / weight
    } else {
        profile.first().copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use xrisk_core::market_data::curves::FlatCurve;
    use xrisk_core::types::DayCountConvention;

    #[test]
    fn test_quantile_index_rounds_to_nearest() {
        assert_eq!(quantile_index(0.95, 100), 94);
        assert_eq!(quantile_index(0.95, 101), 95);
        assert_eq!(quantile_index(0.5, 4), 2);
        assert_eq!(quantile_index(1.0, 10), 9);
        assert_eq!(quantile_index(0.0, 10), 0);
    }

    #[test]
    fn test_pfe_floored_at_zero() {
        let mut v = vec![-3.0, -2.0, -1.0];
        assert_eq!(potential_future_exposure(&mut v, 0.9), 0.0);
        let mut v = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(potential_future_exposure(&mut v, 0.75), 4.0);
    }

    #[test]
    fn test_flat_profile_averages_to_itself() {
        let asof = Date::from_ymd(2025, 1, 2).unwrap();
        let dates: Vec<Date> = [91, 182, 273, 365, 730]
            .iter()
            .map(|d| asof.add_days(*d).unwrap())
            .collect();
        let dc = DayCountConvention::Actual365Fixed;
        let times: Vec<f64> = std::iter::once(0.0)
            .chain(dates.iter().map(|d| dc.year_fraction(asof, *d)))
            .collect();
        let curve = FlatCurve::new(0.0);
        let p = bank_account_profiles(&[10.0; 6], &times, asof, &dates, &curve).unwrap();
        assert_relative_eq!(p.epe_b, 10.0, epsilon = 1e-12);
        assert_relative_eq!(p.eepe_b, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_effective_profile_is_non_decreasing() {
        let asof = Date::from_ymd(2025, 1, 2).unwrap();
        let dates: Vec<Date> = [100, 200, 300].iter().map(|d| asof.add_days(*d).unwrap()).collect();
        let times = [0.0, 100.0 / 365.0, 200.0 / 365.0, 300.0 / 365.0];
        let curve = FlatCurve::new(0.02);
        let p = bank_account_profiles(&[0.0, 5.0, 3.0, 4.0], &times, asof, &dates, &curve).unwrap();
        assert!(p.eee_b.windows(2).all(|w| w[1] >= w[0]));
        assert!(p.eepe_b >= p.epe_b);
        assert!(p.ee_b[1] > 5.0);
    }
}
