//! Historical scenarios: market snapshots on past dates turned into
//! return shifts over a margin period and applied to today's base
//! scenario.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use xrisk_core::types::Date;

use super::csv_io::{add_key_values, check_width, parse_header, parse_required, DEFAULT_SEPARATOR};
use super::generator::ScenarioGenerator;
use super::key::{KeyType, RiskFactorKey};
use super::simple::{Scenario, ScenarioFactory, SimpleScenarioFactory};
use crate::error::SimError;

/// Reads historical market snapshots, one row per date.
///
/// Layout: header `Date,<key>…`; scenarios carry numeraire 1 and the date
/// as label.
#[derive(Debug, Clone)]
pub struct HistoricalScenarioFileReader {
    separator: u8,
    factory: Arc<dyn ScenarioFactory>,
}

impl Default for HistoricalScenarioFileReader {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            factory: Arc::new(SimpleScenarioFactory),
        }
    }
}

impl HistoricalScenarioFileReader {
    /// Reader with the default separator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the column separator.
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Reads a history file.
    pub fn read_path(&self, path: &Path) -> Result<Vec<Box<dyn Scenario>>, SimError> {
        let name = path.display().to_string();
        let file = File::open(path).map_err(|e| SimError::io(&name, e))?;
        self.read_from(file, &name)
    }

    /// Reads snapshots sorted by date.
    ///
    /// # Errors
    /// `SimError::Schema` on a bad header, a bad date, a column-count
    /// mismatch or a repeated date.
    pub fn read_from<R: Read>(&self, reader: R, name: &str) -> Result<Vec<Box<dyn Scenario>>, SimError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.separator)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers().map_err(|e| SimError::io(name, e))?.clone();
        let keys = parse_header(name, &headers, &["Date"])?;
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let line = i + 2;
            let record = record.map_err(|e| SimError::io(name, e))?;
            check_width(name, line, &record, headers.len())?;
            let date: Date = parse_required(name, line, "Date", &record[0])?;
            if !seen.insert(date) {
                return Err(SimError::schema(name, format!("line {line}: date {date} repeated")));
            }
            let mut scenario = self.factory.build_scenario(date, &date.to_string(), 1.0)?;
            add_key_values(name, line, &keys, record.iter().skip(1), scenario.as_mut());
            out.push(scenario);
        }
        out.sort_by_key(|s| s.asof());
        debug!(file = name, dates = out.len(), "historical scenarios read");
        Ok(out)
    }
}

/// How a historical move is measured and applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ReturnType {
    /// `v1 - v0`, added to the base value
    Absolute,
    /// `v1 / v0`, multiplied into the base value
    Relative,
}

impl ReturnType {
    fn measure(self, key: &RiskFactorKey, v0: f64, v1: f64) -> Result<f64, SimError> {
        match self {
            ReturnType::Absolute => Ok(v1 - v0),
            ReturnType::Relative if v0 == 0.0 => Err(SimError::config(
                key.to_string(),
                "relative return undefined for a zero start value",
            )),
            ReturnType::Relative => Ok(v1 / v0),
        }
    }

    fn apply(self, base: f64, ret: f64) -> f64 {
        match self {
            ReturnType::Absolute => base + ret,
            ReturnType::Relative => base * ret,
        }
    }
}

/// Return type per key type.
///
/// Credit states move additively; everything else relatively unless
/// overridden.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnConfig {
    overrides: BTreeMap<KeyType, ReturnType>,
}

impl ReturnConfig {
    /// Overrides the return type of one key type.
    pub fn with(mut self, keytype: KeyType, return_type: ReturnType) -> Self {
        self.overrides.insert(keytype, return_type);
        self
    }

    /// Return type used for `keytype`.
    pub fn return_type(&self, keytype: KeyType) -> ReturnType {
        self.overrides.get(&keytype).copied().unwrap_or(match keytype {
            KeyType::CreditState => ReturnType::Absolute,
            _ => ReturnType::Relative,
        })
    }
}

/// Applies historical moves over `mpor_days` to a base scenario.
///
/// Window `i` starts at history date `d0` and ends at the first history
/// date on or after `d0 + mpor_days`. Each call to `next` yields the next
/// window's scenario, labelled `d0_d1`.
#[derive(Debug)]
pub struct HistoricalScenarioGenerator {
    history: Vec<Box<dyn Scenario>>,
    base: Box<dyn Scenario>,
    windows: Vec<(usize, usize)>,
    returns: ReturnConfig,
    factory: Arc<dyn ScenarioFactory>,
    cursor: usize,
}

impl HistoricalScenarioGenerator {
    /// Pairs up the history dates.
    ///
    /// # Errors
    /// `SimError::Configuration` if `mpor_days` is not positive or the
    /// history spans no full window.
    pub fn new(
        mut history: Vec<Box<dyn Scenario>>,
        base: Box<dyn Scenario>,
        mpor_days: i64,
        returns: ReturnConfig,
    ) -> Result<Self, SimError> {
        if mpor_days <= 0 {
            return Err(SimError::config("mpor_days", "must be positive"));
        }
        history.sort_by_key(|s| s.asof());
        let mut windows = Vec::new();
        for (i, s) in history.iter().enumerate() {
            let target = s.asof().add_days(mpor_days)?;
            let j = i + history[i..].partition_point(|h| h.asof() < target);
            if j >= history.len() {
                break;
            }
            windows.push((i, j));
        }
        if windows.is_empty() {
            return Err(SimError::config(
                "HistoricalScenarioGenerator",
                format!("{} history dates span no {mpor_days}-day window", history.len()),
            ));
        }
        info!(
            windows = windows.len(),
            mpor_days,
            keys = base.keys().len(),
            "historical scenario generator ready"
        );
        Ok(Self {
            history,
            base,
            windows,
            returns,
            factory: Arc::new(SimpleScenarioFactory),
            cursor: 0,
        })
    }

    /// Uses a custom scenario factory.
    pub fn with_factory(mut self, factory: Arc<dyn ScenarioFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Number of windows.
    pub fn num_scenarios(&self) -> usize {
        self.windows.len()
    }

    /// Start and end date of window `i`.
    pub fn window(&self, i: usize) -> Option<(Date, Date)> {
        self.windows
            .get(i)
            .map(|&(a, b)| (self.history[a].asof(), self.history[b].asof()))
    }

    /// Base scenario the returns are applied to.
    pub fn base(&self) -> &dyn Scenario {
        self.base.as_ref()
    }

    fn shifted_values(&self, i: usize) -> Result<Vec<(RiskFactorKey, f64)>, SimError> {
        let &(a, b) = self.windows.get(i).ok_or_else(|| {
            SimError::config(
                "HistoricalScenarioGenerator",
                format!("window {i} out of range ({} windows)", self.windows.len()),
            )
        })?;
        let (h0, h1) = (&self.history[a], &self.history[b]);
        self.base
            .keys()
            .into_iter()
            .map(|key| {
                let rt = self.returns.return_type(key.keytype());
                let ret = rt.measure(&key, h0.get(&key)?, h1.get(&key)?)?;
                let value = rt.apply(self.base.get(&key)?, ret);
                Ok((key, value))
            })
            .collect()
    }

    /// Scenario of window `i` dated `asof`.
    pub fn scenario(&self, i: usize, asof: Date) -> Result<Box<dyn Scenario>, SimError> {
        let values = self.shifted_values(i)?;
        let label = match self.window(i) {
            Some((d0, d1)) => format!("{d0}_{d1}"),
            None => i.to_string(),
        };
        let mut scenario = self
            .factory
            .build_scenario(asof, &label, self.base.numeraire())?;
        for (key, v) in values {
            scenario.add(key, v);
        }
        Ok(scenario)
    }

    /// Shifted minus base value per key for window `i`.
    pub fn shifts(&self, i: usize) -> Result<Vec<(RiskFactorKey, f64)>, SimError> {
        self.shifted_values(i)?
            .into_iter()
            .map(|(key, v)| {
                let base = self.base.get(&key)?;
                Ok((key, v - base))
            })
            .collect()
    }
}

impl ScenarioGenerator for HistoricalScenarioGenerator {
    fn next(&mut self, date: Date) -> Result<Box<dyn Scenario>, SimError> {
        let scenario = self.scenario(self.cursor, date)?;
        self.cursor += 1;
        Ok(scenario)
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }

    fn t0_scenario(&self) -> Result<Box<dyn Scenario>, SimError> {
        Ok(self.base.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::SimpleScenario;
    use approx::assert_relative_eq;

    const HISTORY: &str = "\
Date,FxSpot/USD/0,CreditState/0/0
2025-01-02,1.00,0.0
2025-01-03,1.10,0.5
2025-01-06,1.21,0.25
2025-01-07,0.99,1.0
";

    fn base() -> Box<dyn Scenario> {
        let mut s = SimpleScenario::new(Date::from_ymd(2025, 2, 3).unwrap(), "base", 1.0).unwrap();
        s.add(RiskFactorKey::new(KeyType::FxSpot, "USD", 0), 0.9);
        s.add(RiskFactorKey::new(KeyType::CreditState, "0", 0), 0.1);
        Box::new(s)
    }

    fn generator(mpor: i64) -> HistoricalScenarioGenerator {
        let history = HistoricalScenarioFileReader::new()
            .read_from(HISTORY.as_bytes(), "hist.csv")
            .unwrap();
        HistoricalScenarioGenerator::new(history, base(), mpor, ReturnConfig::default()).unwrap()
    }

    #[test]
    fn test_windows_skip_to_first_date_after_mpor() {
        let g = generator(1);
        assert_eq!(g.num_scenarios(), 3);
        let g = generator(2);
        // 01-02 -> 01-06, 01-03 -> 01-06, 01-06 -> none
        assert_eq!(g.num_scenarios(), 2);
        assert_eq!(
            g.window(0),
            Some((Date::from_ymd(2025, 1, 2).unwrap(), Date::from_ymd(2025, 1, 6).unwrap()))
        );
    }

    #[test]
    fn test_relative_and_absolute_returns() {
        let mut g = generator(1);
        let asof = g.base().asof();
        let s = g.next(asof).unwrap();
        assert_eq!(s.label(), "2025-01-02_2025-01-03");
        let fx = s.get(&RiskFactorKey::new(KeyType::FxSpot, "USD", 0)).unwrap();
        assert_relative_eq!(fx, 0.9 * 1.1, epsilon = 1e-12);
        let cs = s.get(&RiskFactorKey::new(KeyType::CreditState, "0", 0)).unwrap();
        assert_relative_eq!(cs, 0.6, epsilon = 1e-12);

        let shifts = g.shifts(1).unwrap();
        let fx_shift = shifts.iter().find(|(k, _)| k.keytype() == KeyType::FxSpot).unwrap().1;
        assert_relative_eq!(fx_shift, 0.9 * 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_override_and_exhaustion() {
        let history = HistoricalScenarioFileReader::new()
            .read_from(HISTORY.as_bytes(), "hist.csv")
            .unwrap();
        let returns = ReturnConfig::default().with(KeyType::FxSpot, ReturnType::Absolute);
        let mut g = HistoricalScenarioGenerator::new(history, base(), 3, returns).unwrap();
        let asof = g.base().asof();
        let s = g.next(asof).unwrap();
        let fx = s.get(&RiskFactorKey::new(KeyType::FxSpot, "USD", 0)).unwrap();
        assert_relative_eq!(fx, 0.9 + 0.21, epsilon = 1e-12);
        g.next(asof).unwrap();
        assert!(g.next(asof).is_err());
        g.reset();
        assert!(g.next(asof).is_ok());
    }

    #[test]
    fn test_reader_maps_columns_after_date_to_keys() {
        let history = HistoricalScenarioFileReader::new()
            .read_from(HISTORY.as_bytes(), "hist.csv")
            .unwrap();
        assert_eq!(history.len(), 4);
        let s = &history[1];
        assert_eq!(s.asof(), Date::from_ymd(2025, 1, 3).unwrap());
        assert_relative_eq!(s.get(&RiskFactorKey::new(KeyType::FxSpot, "USD", 0)).unwrap(), 1.10);
        assert_relative_eq!(s.get(&RiskFactorKey::new(KeyType::CreditState, "0", 0)).unwrap(), 0.5);
    }

    #[test]
    fn test_reader_rejects_repeated_date_and_bad_header() {
        let text = "Date,FxSpot/USD/0\n2025-01-02,1\n2025-01-02,1\n";
        assert!(HistoricalScenarioFileReader::new()
            .read_from(text.as_bytes(), "h.csv")
            .is_err());
        let text = "When,FxSpot/USD/0\n2025-01-02,1\n";
        let err = HistoricalScenarioFileReader::new()
            .read_from(text.as_bytes(), "h.csv")
            .unwrap_err();
        assert!(err.to_string().contains("h.csv"));
    }

    #[test]
    fn test_no_window_is_an_error() {
        let history = HistoricalScenarioFileReader::new()
            .read_from(HISTORY.as_bytes(), "hist.csv")
            .unwrap();
        assert!(HistoricalScenarioGenerator::new(history, base(), 30, ReturnConfig::default()).is_err());
    }
}
