//! Scenario quantities stored alongside the cube for aggregation.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::npv_cube::check_index;
use crate::error::CubeError;

/// Kind of stored scenario quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AggregationScenarioDataType {
    /// Numeraire; name is empty
    Numeraire,
    /// FX spot, base currency per unit of the named currency
    FxSpot,
    /// Fixing of the named index at the valuation date
    IndexFixing,
    /// Systemic credit factor, named by factor number
    CreditState,
}

impl fmt::Display for AggregationScenarioDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Numeraire => "Numeraire",
            Self::FxSpot => "FXSpot",
            Self::IndexFixing => "IndexFixing",
            Self::CreditState => "CreditState",
        };
        f.write_str(s)
    }
}

/// Values per (date, sample) keyed by type and name.
///
/// # Examples
///
/// ```
/// use xrisk_sim::cube::{AggregationScenarioData, AggregationScenarioDataType as T};
///
/// let mut data = AggregationScenarioData::new(2, 10);
/// data.set(1, 3, 1.05, T::Numeraire, "").unwrap();
/// assert_eq!(data.get(1, 3, T::Numeraire, "").unwrap(), 1.05);
/// assert!(data.get(0, 0, T::FxSpot, "USD").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AggregationScenarioData {
    dates: usize,
    samples: usize,
    data: BTreeMap<(AggregationScenarioDataType, String), Vec<f64>>,
}

impl AggregationScenarioData {
    /// Empty store of `dates x samples` values per key.
    pub fn new(dates: usize, samples: usize) -> Self {
        Self {
            dates,
            samples,
            data: BTreeMap::new(),
        }
    }

    /// Number of dates.
    pub fn dim_dates(&self) -> usize {
        self.dates
    }

    /// Number of samples.
    pub fn dim_samples(&self) -> usize {
        self.samples
    }

    fn offset(&self, date: usize, sample: usize) -> Result<usize, CubeError> {
        check_index("date", date, self.dates)?;
        check_index("sample", sample, self.samples)?;
        Ok(date * self.samples + sample)
    }

    /// Stores a value; unwritten points of a new key read as 0.
    pub fn set(
        &mut self,
        date: usize,
        sample: usize,
        value: f64,
        kind: AggregationScenarioDataType,
        name: &str,
    ) -> Result<(), CubeError> {
        let k = self.offset(date, sample)?;
        let n = self.dates * self.samples;
        self.data
            .entry((kind, name.to_string()))
            .or_insert_with(|| vec![0.0; n])[k] = value;
        Ok(())
    }

    /// Stored value.
    ///
    /// # Errors
    /// `CubeError::MissingScenarioData` for a key never written.
    pub fn get(&self, date: usize, sample: usize, kind: AggregationScenarioDataType, name: &str) -> Result<f64, CubeError> {
        let k = self.offset(date, sample)?;
        self.data
            .get(&(kind, name.to_string()))
            .map(|v| v[k])
            .ok_or_else(|| CubeError::MissingScenarioData(format!("{kind}/{name}")))
    }

    /// Whether any value was stored for the key.
    pub fn has(&self, kind: AggregationScenarioDataType, name: &str) -> bool {
        self.data.contains_key(&(kind, name.to_string()))
    }

    /// Stored keys in order.
    pub fn keys(&self) -> Vec<(AggregationScenarioDataType, String)> {
        self.data.keys().cloned().collect()
    }

    /// Names stored under one type.
    pub fn names(&self, kind: AggregationScenarioDataType) -> Vec<String> {
        self.data
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Copies `other`, whose samples are this store's samples starting at
    /// `first_sample`.
    pub fn absorb(&mut self, first_sample: usize, other: &AggregationScenarioData) -> Result<(), CubeError> {
        if other.dates != self.dates || first_sample + other.samples > self.samples {
            return Err(CubeError::ShapeMismatch(format!(
                "scenario data ({} dates, samples {}..{}) does not fit ({} dates, {} samples)",
                other.dates,
                first_sample,
                first_sample + other.samples,
                self.dates,
                self.samples
            )));
        }
        for ((kind, name), values) in &other.data {
            for date in 0..other.dates {
                for s in 0..other.samples {
                    self.set(date, first_sample + s, values[date * other.samples + s], *kind, name)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AggregationScenarioDataType as T;

    #[test]
    fn test_keys_and_names() {
        let mut d = AggregationScenarioData::new(1, 1);
        d.set(0, 0, 0.9, T::FxSpot, "USD").unwrap();
        d.set(0, 0, 1.2, T::FxSpot, "GBP").unwrap();
        d.set(0, 0, 1.0, T::Numeraire, "").unwrap();
        assert!(d.has(T::FxSpot, "USD"));
        assert_eq!(d.names(T::FxSpot), vec!["GBP".to_string(), "USD".to_string()]);
        assert_eq!(d.keys()[0], (T::Numeraire, String::new()));
        assert!(matches!(d.set(1, 0, 0.0, T::Numeraire, ""), Err(CubeError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_absorb_offsets_samples() {
        let mut all = AggregationScenarioData::new(2, 5);
        let mut part = AggregationScenarioData::new(2, 2);
        part.set(1, 1, 7.0, T::CreditState, "0").unwrap();
        all.absorb(3, &part).unwrap();
        assert_eq!(all.get(1, 4, T::CreditState, "0").unwrap(), 7.0);
        assert!(all.absorb(4, &part).is_err());
    }
}
