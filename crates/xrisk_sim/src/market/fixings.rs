//! Index fixing tables.

use std::collections::BTreeMap;

use xrisk_core::types::Date;

/// Fixings per index name and date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fixings {
    data: BTreeMap<String, BTreeMap<Date, f64>>,
}

impl Fixings {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or overwrites a fixing.
    pub fn add(&mut self, index: &str, date: Date, value: f64) {
        self.data.entry(index.to_string()).or_default().insert(date, value);
    }

    /// Fixing on exactly `date`.
    pub fn get(&self, index: &str, date: Date) -> Option<f64> {
        self.data.get(index).and_then(|m| m.get(&date)).copied()
    }

    /// Most recent fixing on or before `date`.
    pub fn latest_on_or_before(&self, index: &str, date: Date) -> Option<(Date, f64)> {
        self.data
            .get(index)
            .and_then(|m| m.range(..=date).next_back())
            .map(|(d, v)| (*d, *v))
    }

    /// Whether any fixing exists for `index`.
    pub fn has_index(&self, index: &str) -> bool {
        self.data.get(index).is_some_and(|m| !m.is_empty())
    }

    /// Copies only the requested `(index, date)` fixings.
    ///
    /// Returns the table and the requests that had no exact fixing.
    pub fn subset(&self, required: &[(String, Date)]) -> (Fixings, Vec<(String, Date)>) {
        let mut table = Fixings::new();
        let mut missing = Vec::new();
        for (index, date) in required {
            match self.get(index, *date) {
                Some(v) => table.add(index, *date, v),
                None => missing.push((index.clone(), *date)),
            }
        }
        (table, missing)
    }

    /// Total number of fixings.
    pub fn len(&self) -> usize {
        self.data.values().map(BTreeMap::len).sum()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every fixing.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
