//! Scenario files.
//!
//! Layout: header `Date,Scenario,Numeraire,<key>…` with keys in
//! `Type/Name/Index` form, one row per (date, sample), values with eight
//! decimals. The separator defaults to `,`.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};
use xrisk_core::types::Date;

use super::generator::ScenarioGenerator;
use super::key::RiskFactorKey;
use super::simple::{Scenario, ScenarioFactory, SimpleScenarioFactory};
use crate::error::SimError;

/// Default column separator.
pub const DEFAULT_SEPARATOR: u8 = b',';

const DATE: &str = "Date";
const SCENARIO: &str = "Scenario";
const NUMERAIRE: &str = "Numeraire";

/// Parses the key columns after the leading required columns.
pub(crate) fn parse_header(
    file: &str,
    headers: &csv::StringRecord,
    required: &[&str],
) -> Result<Vec<RiskFactorKey>, SimError> {
    for (i, name) in required.iter().enumerate() {
        match headers.get(i) {
            Some(h) if h.trim() == *name => {}
            other => {
                return Err(SimError::schema(
                    file,
                    format!("column {} must be {name}, found {:?}", i + 1, other.unwrap_or("")),
                ))
            }
        }
    }
    headers
        .iter()
        .skip(required.len())
        .map(|h| {
            h.trim()
                .parse::<RiskFactorKey>()
                .map_err(|_| SimError::schema(file, format!("invalid key column {h}")))
        })
        .collect()
}

pub(crate) fn parse_required<T: std::str::FromStr>(
    file: &str,
    line: usize,
    column: &str,
    value: &str,
) -> Result<T, SimError> {
    value.trim().parse::<T>().map_err(|_| {
        SimError::schema(file, format!("line {line}: cannot parse {column} value {value:?}"))
    })
}

/// Adds the parsable key values of a row; unparsable ones are skipped with
/// a warning.
pub(crate) fn add_key_values<'a>(
    file: &str,
    line: usize,
    keys: &[RiskFactorKey],
    values: impl Iterator<Item = &'a str>,
    scenario: &mut dyn Scenario,
) {
    for (key, raw) in keys.iter().zip(values) {
        match raw.trim().parse::<f64>() {
            Ok(v) => scenario.add(key.clone(), v),
            Err(_) => warn!(file, line, key = %key, value = raw, "skipping unparsable scenario value"),
        }
    }
}

pub(crate) fn check_width(file: &str, line: usize, record: &csv::StringRecord, width: usize) -> Result<(), SimError> {
    if record.len() != width {
        return Err(SimError::schema(
            file,
            format!("line {line}: expected {width} columns, found {}", record.len()),
        ));
    }
    Ok(())
}

/// Writes scenarios row by row.
///
/// The key columns are fixed by the first scenario written.
pub struct CsvScenarioWriter<W: Write> {
    name: String,
    writer: csv::Writer<W>,
    keys: Option<Vec<RiskFactorKey>>,
}

impl CsvScenarioWriter<File> {
    /// Creates (truncates) a scenario file.
    pub fn create(path: &Path, separator: u8) -> Result<Self, SimError> {
        let name = path.display().to_string();
        let file = File::create(path).map_err(|e| SimError::io(&name, e))?;
        Ok(Self::from_writer(file, separator, name))
    }
}

impl<W: Write> CsvScenarioWriter<W> {
    /// Wraps an arbitrary writer; `name` appears in error messages.
    pub fn from_writer(writer: W, separator: u8, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writer: csv::WriterBuilder::new().delimiter(separator).from_writer(writer),
            keys: None,
        }
    }

    /// Appends one row for `scenario` as sample `sample`.
    ///
    /// # Errors
    /// `SimError::MissingMarketData` if the scenario lacks a key of the
    /// header; `SimError::Io` on write failure.
    pub fn write(&mut self, scenario: &dyn Scenario, sample: usize) -> Result<(), SimError> {
        if self.keys.is_none() {
            let keys = scenario.keys();
            let mut header = vec![DATE.to_string(), SCENARIO.to_string(), NUMERAIRE.to_string()];
            header.extend(keys.iter().map(ToString::to_string));
            self.writer
                .write_record(&header)
                .map_err(|e| SimError::io(&self.name, e))?;
            self.keys = Some(keys);
        }
        let keys = self.keys.as_deref().unwrap_or_default();
        let mut row = Vec::with_capacity(keys.len() + 3);
        row.push(scenario.asof().to_string());
        row.push(sample.to_string());
        row.push(format!("{:.8}", scenario.numeraire()));
        for key in keys {
            row.push(format!("{:.8}", scenario.get(key)?));
        }
        self.writer
            .write_record(&row)
            .map_err(|e| SimError::io(&self.name, e))
    }

    /// Flushes buffered rows.
    pub fn flush(&mut self) -> Result<(), SimError> {
        self.writer.flush().map_err(|e| SimError::io(&self.name, e))
    }
}

/// One row of a scenario file.
#[derive(Debug, Clone)]
pub struct ScenarioRecord {
    /// Scenario date
    pub date: Date,
    /// Sample number
    pub sample: usize,
    /// Scenario values
    pub scenario: Box<dyn Scenario>,
}

/// Reads and validates scenario files.
#[derive(Debug, Clone)]
pub struct CsvScenarioReader {
    separator: u8,
    expected_dates: Option<BTreeSet<Date>>,
    factory: Arc<dyn ScenarioFactory>,
}

impl Default for CsvScenarioReader {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            expected_dates: None,
            factory: Arc::new(SimpleScenarioFactory),
        }
    }
}

impl CsvScenarioReader {
    /// Reader with the default separator and no date check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the column separator.
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Rejects rows whose date is not one of `dates`.
    pub fn with_expected_dates(mut self, dates: &[Date]) -> Self {
        self.expected_dates = Some(dates.iter().copied().collect());
        self
    }

    /// Uses a custom scenario factory.
    pub fn with_factory(mut self, factory: Arc<dyn ScenarioFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Reads a scenario file.
    pub fn read_path(&self, path: &Path) -> Result<Vec<ScenarioRecord>, SimError> {
        let name = path.display().to_string();
        let file = File::open(path).map_err(|e| SimError::io(&name, e))?;
        self.read_from(file, &name)
    }

    /// Reads scenarios from any reader; `name` appears in error messages.
    pub fn read_from<R: Read>(&self, reader: R, name: &str) -> Result<Vec<ScenarioRecord>, SimError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.separator)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers().map_err(|e| SimError::io(name, e))?.clone();
        let keys = parse_header(name, &headers, &[DATE, SCENARIO, NUMERAIRE])?;
        let mut out = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let line = i + 2;
            let record = record.map_err(|e| SimError::io(name, e))?;
            check_width(name, line, &record, headers.len())?;
            let date: Date = parse_required(name, line, DATE, &record[0])?;
            if let Some(expected) = &self.expected_dates {
                if !expected.contains(&date) {
                    return Err(SimError::schema(
                        name,
                        format!("line {line}: date {date} is not on the simulation grid"),
                    ));
                }
            }
            let sample: usize = parse_required(name, line, SCENARIO, &record[1])?;
            let numeraire: f64 = parse_required(name, line, NUMERAIRE, &record[2])?;
            let mut scenario = self
                .factory
                .build_scenario(date, &sample.to_string(), numeraire)?;
            add_key_values(name, line, &keys, record.iter().skip(3), scenario.as_mut());
            out.push(ScenarioRecord {
                date,
                sample,
                scenario,
            });
        }
        debug!(file = name, rows = out.len(), keys = keys.len(), "scenario file read");
        Ok(out)
    }
}

/// Replays scenarios read from a file, sample by sample.
#[derive(Debug, Clone)]
pub struct CsvScenarioGenerator {
    samples: Vec<Vec<Box<dyn Scenario>>>,
    sample: usize,
    position: usize,
}

impl CsvScenarioGenerator {
    /// Groups records by sample (ascending) and date.
    pub fn new(mut records: Vec<ScenarioRecord>) -> Result<Self, SimError> {
        if records.is_empty() {
            return Err(SimError::config("CsvScenarioGenerator", "no scenarios"));
        }
        records.sort_by_key(|r| (r.sample, r.date));
        let mut samples: Vec<Vec<Box<dyn Scenario>>> = Vec::new();
        let mut last_sample = None;
        for r in records {
            if last_sample != Some(r.sample) {
                samples.push(Vec::new());
                last_sample = Some(r.sample);
            }
            if let Some(current) = samples.last_mut() {
                current.push(r.scenario);
            }
        }
        Ok(Self {
            samples,
            sample: 0,
            position: 0,
        })
    }

    /// Number of samples in the file.
    pub fn samples(&self) -> usize {
        self.samples.len()
    }
}

impl ScenarioGenerator for CsvScenarioGenerator {
    fn next(&mut self, date: Date) -> Result<Box<dyn Scenario>, SimError> {
        let path = self.samples.get(self.sample).ok_or_else(|| {
            SimError::config(
                "CsvScenarioGenerator",
                format!("file holds only {} samples", self.samples.len()),
            )
        })?;
        let scenario = path
            .get(self.position)
            .filter(|s| s.asof() == date)
            .ok_or_else(|| {
                SimError::config(
                    "CsvScenarioGenerator",
                    format!("sample {} has no scenario for {date}", self.sample),
                )
            })?
            .clone();
        self.position += 1;
        if self.position == path.len() {
            self.position = 0;
            self.sample += 1;
        }
        Ok(scenario)
    }

    fn reset(&mut self) {
        self.sample = 0;
        self.position = 0;
    }
}
