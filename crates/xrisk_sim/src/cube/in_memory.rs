//! Dense in-memory cube.

use std::collections::HashMap;

use xrisk_core::types::Date;

use super::npv_cube::{check_index, NpvCube};
use crate::error::CubeError;

/// Dense cube over a single `Vec<f64>`.
///
/// # Memory Layout
///
/// ```text
/// data: [id][date][sample][depth]
/// t0:   [id][depth]
/// ```
///
/// # Examples
///
/// ```
/// use xrisk_core::types::Date;
/// use xrisk_sim::cube::{InMemoryCube, NpvCube};
///
/// let asof = Date::from_ymd(2025, 1, 2).unwrap();
/// let dates = vec![Date::from_ymd(2026, 1, 2).unwrap()];
/// let mut cube = InMemoryCube::new(asof, vec!["T1".into(), "T2".into()], dates, 100, 1).unwrap();
/// cube.set_by_id(3.5, "T2", 0, 7, 0).unwrap();
/// assert_eq!(cube.get(1, 0, 7, 0).unwrap(), 3.5);
/// assert!(cube.get_by_id("T3", 0, 0, 0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryCube {
    asof: Date,
    ids: Vec<String>,
    index: HashMap<String, usize>,
    dates: Vec<Date>,
    samples: usize,
    depth: usize,
    t0: Vec<f64>,
    data: Vec<f64>,
}

impl InMemoryCube {
    /// Creates a zero-filled cube.
    ///
    /// # Errors
    /// `CubeError::DuplicateId` for a repeated id; `CubeError::ShapeMismatch`
    /// for a zero depth.
    pub fn new(
        asof: Date,
        ids: Vec<String>,
        dates: Vec<Date>,
        samples: usize,
        depth: usize,
    ) -> Result<Self, CubeError> {
        if depth == 0 {
            return Err(CubeError::ShapeMismatch("cube depth must be at least 1".into()));
        }
        let mut index = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(CubeError::DuplicateId(id.clone()));
            }
        }
        let n = ids.len();
        Ok(Self {
            asof,
            index,
            t0: vec![0.0; n * depth],
            data: vec![0.0; n * dates.len() * samples * depth],
            ids,
            dates,
            samples,
            depth,
        })
    }

    #[inline]
    fn offset(&self, id: usize, date: usize, sample: usize, depth: usize) -> Result<usize, CubeError> {
        check_index("id", id, self.ids.len())?;
        check_index("date", date, self.dates.len())?;
        check_index("sample", sample, self.samples)?;
        check_index("depth", depth, self.depth)?;
        Ok(((id * self.dates.len() + date) * self.samples + sample) * self.depth + depth)
    }

    #[inline]
    fn t0_offset(&self, id: usize, depth: usize) -> Result<usize, CubeError> {
        check_index("id", id, self.ids.len())?;
        check_index("depth", depth, self.depth)?;
        Ok(id * self.depth + depth)
    }

    /// All values of one id and date, laid out `[sample][depth]`.
    pub fn date_slice(&self, id: usize, date: usize) -> Result<&[f64], CubeError> {
        let start = self.offset(id, date, 0, 0)?;
        Ok(&self.data[start..start + self.samples * self.depth])
    }
}

impl NpvCube for InMemoryCube {
    fn num_ids(&self) -> usize {
        self.ids.len()
    }

    fn num_dates(&self) -> usize {
        self.dates.len()
    }

    fn samples(&self) -> usize {
        self.samples
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn asof(&self) -> Date {
        self.asof
    }

    fn dates(&self) -> &[Date] {
        &self.dates
    }

    fn ids(&self) -> &[String] {
        &self.ids
    }

    fn index_of(&self, id: &str) -> Result<usize, CubeError> {
        self.index.get(id).copied().ok_or_else(|| CubeError::UnknownId {
            id: id.to_string(),
            num_ids: self.ids.len(),
        })
    }

    fn get_t0(&self, id: usize, depth: usize) -> Result<f64, CubeError> {
        Ok(self.t0[self.t0_offset(id, depth)?])
    }

    fn set_t0(&mut self, value: f64, id: usize, depth: usize) -> Result<(), CubeError> {
        let k = self.t0_offset(id, depth)?;
        self.t0[k] = value;
        Ok(())
    }

    fn get(&self, id: usize, date: usize, sample: usize, depth: usize) -> Result<f64, CubeError> {
        Ok(self.data[self.offset(id, date, sample, depth)?])
    }

    fn set(
        &mut self,
        value: f64,
        id: usize,
        date: usize,
        sample: usize,
        depth: usize,
    ) -> Result<(), CubeError> {
        let k = self.offset(id, date, sample, depth)?;
        self.data[k] = value;
        Ok(())
    }

    fn remove(&mut self, id: usize) -> Result<(), CubeError> {
        check_index("id", id, self.ids.len())?;
        let block = self.dates.len() * self.samples * self.depth;
        self.data[id * block..(id + 1) * block].fill(0.0);
        self.t0[id * self.depth..(id + 1) * self.depth].fill(0.0);
        Ok(())
    }

    fn remove_sample(&mut self, id: usize, sample: usize) -> Result<(), CubeError> {
        check_index("id", id, self.ids.len())?;
        check_index("sample", sample, self.samples)?;
        for date in 0..self.dates.len() {
            let start = self.offset(id, date, sample, 0)?;
            self.data[start..start + self.depth].fill(0.0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> InMemoryCube {
        let asof = Date::from_ymd(2025, 1, 2).unwrap();
        let dates = vec![
            Date::from_ymd(2025, 7, 2).unwrap(),
            Date::from_ymd(2026, 1, 2).unwrap(),
        ];
        InMemoryCube::new(asof, vec!["A".into(), "B".into(), "C".into()], dates, 4, 2).unwrap()
    }

    #[test]
    fn test_set_get_every_cell() {
        let mut c = cube();
        for id in 0..3 {
            for d in 0..2 {
                for s in 0..4 {
                    for k in 0..2 {
                        c.set((id * 1000 + d * 100 + s * 10 + k) as f64, id, d, s, k).unwrap();
                    }
                }
            }
        }
        assert_eq!(c.get(2, 1, 3, 1).unwrap(), 2131.0);
        assert_eq!(c.get(0, 0, 0, 0).unwrap(), 0.0);
        assert_eq!(c.get_trade_npvs(1, 2).unwrap(), vec![120.0, 1120.0, 2120.0]);
        assert_eq!(c.date_slice(1, 0).unwrap().len(), 8);
    }

    #[test]
    fn test_bounds_name_dimension() {
        let c = cube();
        assert_eq!(
            c.get(0, 2, 0, 0),
            Err(CubeError::IndexOutOfRange {
                what: "date",
                index: 2,
                bound: 2
            })
        );
        assert!(matches!(c.get_t0(0, 2), Err(CubeError::IndexOutOfRange { what: "depth", .. })));
        match c.index_of("Z") {
            Err(CubeError::UnknownId { id, num_ids }) => {
                assert_eq!(id, "Z");
                assert_eq!(num_ids, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let asof = Date::from_ymd(2025, 1, 2).unwrap();
        let r = InMemoryCube::new(asof, vec!["A".into(), "A".into()], vec![], 1, 1);
        assert_eq!(r, Err(CubeError::DuplicateId("A".into())));
    }

    #[test]
    fn test_remove_and_remove_sample() {
        let mut c = cube();
        c.set_t0(5.0, 1, 0).unwrap();
        c.set(1.0, 1, 0, 2, 1).unwrap();
        c.set(2.0, 1, 1, 3, 0).unwrap();
        c.set(3.0, 0, 1, 2, 0).unwrap();
        c.remove_sample(1, 2).unwrap();
        assert_eq!(c.get(1, 0, 2, 1).unwrap(), 0.0);
        assert_eq!(c.get(1, 1, 3, 0).unwrap(), 2.0);
        c.remove(1).unwrap();
        assert_eq!(c.get(1, 1, 3, 0).unwrap(), 0.0);
        assert_eq!(c.get_t0(1, 0).unwrap(), 0.0);
        assert_eq!(c.get(0, 1, 2, 0).unwrap(), 3.0);
        assert_eq!(c.relevant_scenarios(), vec![0, 1, 2, 3]);
    }
}
