//! Simulation date grid with valuation and close-out dates.

use xrisk_core::types::{Date, DayCountConvention, Period};

use crate::error::SimError;

/// Ordered simulation dates after the as-of date.
///
/// Each date is a valuation date, a close-out date, or both. Close-out
/// dates come from [`add_close_out_dates`](Self::add_close_out_dates) and
/// remember which valuation date they close out.
///
/// # Examples
///
/// ```
/// use xrisk_core::types::{Date, DayCountConvention};
/// use xrisk_sim::scenario::DateGrid;
///
/// let asof = Date::from_ymd(2025, 1, 15).unwrap();
/// let tenors = ["3M".parse().unwrap(), "6M".parse().unwrap()];
/// let grid = DateGrid::from_tenors(asof, &tenors, DayCountConvention::Actual365Fixed)
///     .unwrap()
///     .add_close_out_dates(14)
///     .unwrap();
/// assert_eq!(grid.valuation_dates().len(), 2);
/// assert_eq!(grid.close_out_dates().len(), 2);
/// assert_eq!(grid.time_grid().len(), grid.dates().len() + 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DateGrid {
    asof: Date,
    day_counter: DayCountConvention,
    dates: Vec<Date>,
    times: Vec<f64>,
    valuation_index: Vec<Option<usize>>,
    close_out_of: Vec<Option<usize>>,
    mpor_days: Option<i64>,
}

impl DateGrid {
    /// Creates a grid of valuation dates.
    ///
    /// # Errors
    /// `SimError::Configuration` if the dates are empty, not strictly
    /// increasing, or not after `asof`.
    pub fn new(asof: Date, dates: Vec<Date>, day_counter: DayCountConvention) -> Result<Self, SimError> {
        if dates.is_empty() {
            return Err(SimError::config("DateGrid", "no simulation dates"));
        }
        if dates[0] <= asof {
            return Err(SimError::config(
                "DateGrid",
                format!("first date {} not after asof {asof}", dates[0]),
            ));
        }
        if let Some(w) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(SimError::config(
                "DateGrid",
                format!("dates not strictly increasing at {} -> {}", w[0], w[1]),
            ));
        }
        let n = dates.len();
        let times = dates.iter().map(|d| day_counter.year_fraction(asof, *d)).collect();
        Ok(Self {
            asof,
            day_counter,
            dates,
            times,
            valuation_index: (0..n).map(Some).collect(),
            close_out_of: vec![None; n],
            mpor_days: None,
        })
    }

    /// Creates a grid of `asof + tenor` valuation dates.
    pub fn from_tenors(
        asof: Date,
        tenors: &[Period],
        day_counter: DayCountConvention,
    ) -> Result<Self, SimError> {
        let dates = tenors
            .iter()
            .map(|p| asof.add_period(*p))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(asof, dates, day_counter)
    }

    /// Adds a close-out date `mpor_days` after every valuation date.
    ///
    /// A date that is both a valuation date and a close-out date carries
    /// both flags.
    ///
    /// # Errors
    /// `SimError::Configuration` if `mpor_days <= 0` or close-out dates were
    /// already added.
    pub fn add_close_out_dates(self, mpor_days: i64) -> Result<Self, SimError> {
        if mpor_days <= 0 {
            return Err(SimError::config(
                "DateGrid",
                format!("margin period of risk must be positive, got {mpor_days} days"),
            ));
        }
        if self.mpor_days.is_some() {
            return Err(SimError::config("DateGrid", "close-out dates already added"));
        }
        let valuation = self.valuation_dates();
        let close_outs = valuation
            .iter()
            .map(|d| d.add_days(mpor_days))
            .collect::<Result<Vec<_>, _>>()?;
        let mut dates: Vec<Date> = valuation.iter().chain(close_outs.iter()).copied().collect();
        dates.sort();
        dates.dedup();
        let valuation_index = dates
            .iter()
            .map(|d| valuation.binary_search(d).ok())
            .collect();
        let close_out_of = dates
            .iter()
            .map(|d| close_outs.binary_search(d).ok())
            .collect();
        let times = dates
            .iter()
            .map(|d| self.day_counter.year_fraction(self.asof, *d))
            .collect();
        Ok(Self {
            asof: self.asof,
            day_counter: self.day_counter,
            dates,
            times,
            valuation_index,
            close_out_of,
            mpor_days: Some(mpor_days),
        })
    }

    /// As-of date.
    pub fn asof(&self) -> Date {
        self.asof
    }

    /// Day counter for the time axis.
    pub fn day_counter(&self) -> DayCountConvention {
        self.day_counter
    }

    /// All grid dates.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Number of grid dates.
    pub fn size(&self) -> usize {
        self.dates.len()
    }

    /// Year fractions of the grid dates from the as-of date.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Times with t = 0 prepended.
    pub fn time_grid(&self) -> Vec<f64> {
        std::iter::once(0.0).chain(self.times.iter().copied()).collect()
    }

    /// Valuation dates in order.
    pub fn valuation_dates(&self) -> Vec<Date> {
        self.dates
            .iter()
            .zip(&self.valuation_index)
            .filter_map(|(d, v)| v.map(|_| *d))
            .collect()
    }

    /// Close-out dates in order.
    pub fn close_out_dates(&self) -> Vec<Date> {
        self.dates
            .iter()
            .zip(&self.close_out_of)
            .filter_map(|(d, c)| c.map(|_| *d))
            .collect()
    }

    /// Whether grid date `i` is a valuation date.
    pub fn is_valuation_date(&self, i: usize) -> bool {
        self.valuation_index.get(i).is_some_and(|v| v.is_some())
    }

    /// Whether grid date `i` is a close-out date.
    pub fn is_close_out_date(&self, i: usize) -> bool {
        self.close_out_of.get(i).is_some_and(|v| v.is_some())
    }

    /// Position of grid date `i` among the valuation dates.
    pub fn valuation_index(&self, i: usize) -> Option<usize> {
        self.valuation_index.get(i).copied().flatten()
    }

    /// Valuation date index that grid date `i` closes out.
    pub fn close_out_of(&self, i: usize) -> Option<usize> {
        self.close_out_of.get(i).copied().flatten()
    }

    /// Whether close-out dates were added.
    pub fn has_close_out_dates(&self) -> bool {
        self.mpor_days.is_some()
    }

    /// Margin period of risk in calendar days, if close-out dates exist.
    pub fn mpor_days(&self) -> Option<i64> {
        self.mpor_days
    }

    /// Year fraction from the as-of date to `date`.
    pub fn time_of(&self, date: Date) -> f64 {
        self.day_counter.year_fraction(self.asof, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn asof() -> Date {
        Date::from_ymd(2025, 1, 15).unwrap()
    }

    #[test]
    fn test_rejects_dates_on_or_before_asof() {
        let dc = DayCountConvention::Actual365Fixed;
        assert!(DateGrid::new(asof(), vec![asof()], dc).is_err());
        let d = asof().add_days(10).unwrap();
        assert!(DateGrid::new(asof(), vec![d, d], dc).is_err());
        assert!(DateGrid::new(asof(), vec![], dc).is_err());
    }

    #[test]
    fn test_overlapping_close_out_carries_both_flags() {
        let dc = DayCountConvention::Actual365Fixed;
        let d1 = asof().add_days(7).unwrap();
        let d2 = asof().add_days(14).unwrap();
        let grid = DateGrid::new(asof(), vec![d1, d2], dc)
            .unwrap()
            .add_close_out_dates(7)
            .unwrap();
        // dates: d1, d2 (= close-out of d1), d2 + 7
        assert_eq!(grid.size(), 3);
        assert!(grid.is_valuation_date(1) && grid.is_close_out_date(1));
        assert_eq!(grid.close_out_of(1), Some(0));
        assert_eq!(grid.valuation_index(1), Some(1));
        assert_eq!(grid.close_out_of(2), Some(1));
        assert!(!grid.is_valuation_date(2));
    }

    #[test]
    fn test_close_out_twice_is_error() {
        let dc = DayCountConvention::Actual365Fixed;
        let g = DateGrid::from_tenors(asof(), &["1Y".parse().unwrap()], dc)
            .unwrap()
            .add_close_out_dates(10)
            .unwrap();
        assert!(g.add_close_out_dates(10).is_err());
    }

    proptest! {
        #[test]
        fn prop_grid_sorted_and_time_grid_consistent(
            offsets in proptest::collection::btree_set(1i64..4000, 1..30),
            mpor in 1i64..30,
        ) {
            let dates: Vec<Date> = offsets.iter().map(|o| asof().add_days(*o).unwrap()).collect();
            let grid = DateGrid::new(asof(), dates, DayCountConvention::Actual365Fixed)
                .unwrap()
                .add_close_out_dates(mpor)
                .unwrap();
            prop_assert!(grid.dates().windows(2).all(|w| w[0] < w[1]));
            prop_assert!(grid.times().windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(grid.time_grid().len(), grid.dates().len() + 1);
            prop_assert_eq!(grid.valuation_dates().len(), offsets.len());
            prop_assert_eq!(grid.close_out_dates().len(), offsets.len());
            for i in 0..grid.size() {
                prop_assert!(grid.is_valuation_date(i) || grid.is_close_out_date(i));
            }
        }
    }
}
