//! The NPV cube interface.

use std::collections::BTreeMap;
use std::fmt;

use xrisk_core::types::Date;

use crate::error::CubeError;

/// Checks `index < bound` for one cube dimension.
#[inline]
pub(crate) fn check_index(what: &'static str, index: usize, bound: usize) -> Result<(), CubeError> {
    if index < bound {
        Ok(())
    } else {
        Err(CubeError::IndexOutOfRange { what, index, bound })
    }
}

/// Values per (id, date, sample, depth) plus T0 values per (id, depth).
///
/// Ids are trades or netting sets; dates are the valuation dates of a
/// simulation; depth holds several results per point (NPV, close-out NPV,
/// cashflows, ...).
pub trait NpvCube: fmt::Debug {
    /// Number of ids.
    fn num_ids(&self) -> usize;

    /// Number of valuation dates.
    fn num_dates(&self) -> usize;

    /// Number of samples.
    fn samples(&self) -> usize;

    /// Number of values per point.
    fn depth(&self) -> usize;

    /// As-of date.
    fn asof(&self) -> Date;

    /// Valuation dates.
    fn dates(&self) -> &[Date];

    /// Ids in index order.
    fn ids(&self) -> &[String];

    /// T0 value.
    fn get_t0(&self, id: usize, depth: usize) -> Result<f64, CubeError>;

    /// Sets a T0 value.
    fn set_t0(&mut self, value: f64, id: usize, depth: usize) -> Result<(), CubeError>;

    /// Value at (id, date, sample, depth).
    fn get(&self, id: usize, date: usize, sample: usize, depth: usize) -> Result<f64, CubeError>;

    /// Sets the value at (id, date, sample, depth).
    fn set(
        &mut self,
        value: f64,
        id: usize,
        date: usize,
        sample: usize,
        depth: usize,
    ) -> Result<(), CubeError>;

    /// Zeroes every value of `id`, T0 included.
    fn remove(&mut self, id: usize) -> Result<(), CubeError>;

    /// Zeroes the values of `id` on one sample across dates and depths.
    fn remove_sample(&mut self, id: usize, sample: usize) -> Result<(), CubeError>;

    /// Index of an id.
    ///
    /// # Errors
    /// `CubeError::UnknownId` with the cube's `num_ids`.
    fn index_of(&self, id: &str) -> Result<usize, CubeError> {
        self.ids()
            .iter()
            .position(|x| x == id)
            .ok_or_else(|| CubeError::UnknownId {
                id: id.to_string(),
                num_ids: self.num_ids(),
            })
    }

    /// Id to index map.
    fn ids_and_indexes(&self) -> BTreeMap<String, usize> {
        self.ids()
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect()
    }

    /// Samples carrying information; all of them for a dense cube.
    fn relevant_scenarios(&self) -> Vec<usize> {
        (0..self.samples()).collect()
    }

    /// T0 value by id.
    fn get_t0_by_id(&self, id: &str, depth: usize) -> Result<f64, CubeError> {
        self.get_t0(self.index_of(id)?, depth)
    }

    /// Value by id.
    fn get_by_id(&self, id: &str, date: usize, sample: usize, depth: usize) -> Result<f64, CubeError> {
        self.get(self.index_of(id)?, date, sample, depth)
    }

    /// Sets a T0 value by id.
    fn set_t0_by_id(&mut self, value: f64, id: &str, depth: usize) -> Result<(), CubeError> {
        let i = self.index_of(id)?;
        self.set_t0(value, i, depth)
    }

    /// Sets a value by id.
    fn set_by_id(
        &mut self,
        value: f64,
        id: &str,
        date: usize,
        sample: usize,
        depth: usize,
    ) -> Result<(), CubeError> {
        let i = self.index_of(id)?;
        self.set(value, i, date, sample, depth)
    }

    /// Depth-0 values of every id at (date, sample).
    fn get_trade_npvs(&self, date: usize, sample: usize) -> Result<Vec<f64>, CubeError> {
        (0..self.num_ids())
            .map(|id| self.get(id, date, sample, 0))
            .collect()
    }
}
