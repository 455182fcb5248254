//! Sensitivity streams.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;
use xrisk_sim::scenario::RiskFactorKey;

use super::record::SensitivityRecord;
use super::SensitivityError;

/// Source of sensitivity records that can be replayed.
pub trait SensitivityStream {
    /// Next record, `Ok(None)` at the end.
    ///
    /// # Errors
    /// A malformed record aborts the stream.
    fn next(&mut self) -> Result<Option<SensitivityRecord>, SensitivityError>;

    /// Restarts from the first record.
    fn reset(&mut self);

    /// Drains the remaining records.
    fn collect_remaining(&mut self) -> Result<Vec<SensitivityRecord>, SensitivityError> {
        let mut out = Vec::new();
        while let Some(r) = self.next()? {
            out.push(r);
        }
        Ok(out)
    }
}

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct SensitivityInMemoryStream {
    records: Vec<SensitivityRecord>,
    position: usize,
}

impl SensitivityInMemoryStream {
    /// Stream over `records` in the given order.
    pub fn new(records: Vec<SensitivityRecord>) -> Self {
        Self { records, position: 0 }
    }

    /// Appends a record.
    pub fn add(&mut self, record: SensitivityRecord) {
        self.records.push(record);
    }
}

impl SensitivityStream for SensitivityInMemoryStream {
    fn next(&mut self) -> Result<Option<SensitivityRecord>, SensitivityError> {
        let r = self.records.get(self.position).cloned();
        if r.is_some() {
            self.position += 1;
        }
        Ok(r)
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}

const COLUMNS: [&str; 12] = [
    "TradeId", "IsPar", "Factor_1", "Desc_1", "ShiftSize_1", "Factor_2", "Desc_2", "ShiftSize_2", "Currency",
    "BaseNpv", "Delta", "Gamma",
];

/// Sensitivity file reader.
///
/// Header `TradeId,IsPar,Factor_1,Desc_1,ShiftSize_1,Factor_2,Desc_2,
/// ShiftSize_2,Currency,BaseNpv,Delta,Gamma`; an empty `Factor_2` marks a
/// delta/gamma record. The file is parsed once up front, so `reset` is
/// cheap and a malformed row is reported by the first `next` that reaches
/// it.
#[derive(Debug, Clone)]
pub struct SensitivityCsvStream {
    name: String,
    rows: Vec<Result<SensitivityRecord, SensitivityError>>,
    position: usize,
}

impl SensitivityCsvStream {
    /// Opens a sensitivity file.
    pub fn open(path: &Path) -> Result<Self, SensitivityError> {
        let name = path.display().to_string();
        let file = File::open(path).map_err(|e| SensitivityError::io(&name, e))?;
        Self::from_reader(file, name)
    }

    /// Reads sensitivities from any reader; `name` appears in errors.
    pub fn from_reader<R: Read>(reader: R, name: impl Into<String>) -> Result<Self, SensitivityError> {
        let name = name.into();
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = csv.headers().map_err(|e| SensitivityError::io(&name, e))?.clone();
        for (i, expected) in COLUMNS.iter().enumerate() {
            if headers.get(i) != Some(*expected) {
                return Err(SensitivityError::parse(
                    &name,
                    1,
                    format!("column {} must be {expected}, found {:?}", i + 1, headers.get(i).unwrap_or("")),
                ));
            }
        }
        let rows: Vec<_> = csv
            .records()
            .enumerate()
            .map(|(i, rec)| {
                let line = i + 2;
                let rec = rec.map_err(|e| SensitivityError::parse(&name, line, e.to_string()))?;
                parse_row(&name, line, &rec)
            })
            .collect();
        debug!(file = %name, rows = rows.len(), "loaded sensitivity file");
        Ok(Self { name, rows, position: 0 })
    }

    /// File name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn parse_row(name: &str, line: usize, rec: &csv::StringRecord) -> Result<SensitivityRecord, SensitivityError> {
    if rec.len() != COLUMNS.len() {
        return Err(SensitivityError::parse(
            name,
            line,
            format!("expected {} columns, found {}", COLUMNS.len(), rec.len()),
        ));
    }
    let field = |i: usize| rec.get(i).unwrap_or_default();
    let number = |i: usize| -> Result<f64, SensitivityError> {
        let raw = field(i);
        if raw.is_empty() {
            return Ok(0.0);
        }
        raw.parse::<f64>()
            .map_err(|_| SensitivityError::parse(name, line, format!("cannot parse {} value {raw:?}", COLUMNS[i])))
    };
    let key = |i: usize| -> Result<RiskFactorKey, SensitivityError> {
        field(i)
            .parse::<RiskFactorKey>()
            .map_err(|e| SensitivityError::parse(name, line, e.to_string()))
    };
    let is_par = match field(1) {
        "Y" | "true" | "1" => true,
        "N" | "false" | "0" | "" => false,
        other => return Err(SensitivityError::parse(name, line, format!("cannot parse IsPar value {other:?}"))),
    };
    let key_2 = if field(5).is_empty() { None } else { Some(key(5)?) };
    Ok(SensitivityRecord {
        trade_id: field(0).to_string(),
        is_par,
        key_1: key(2)?,
        desc_1: field(3).to_string(),
        shift_1: number(4)?,
        key_2,
        desc_2: field(6).to_string(),
        shift_2: number(7)?,
        currency: field(8).to_string(),
        base_npv: number(9)?,
        delta: number(10)?,
        gamma: number(11)?,
    })
}

impl SensitivityStream for SensitivityCsvStream {
    fn next(&mut self) -> Result<Option<SensitivityRecord>, SensitivityError> {
        match self.rows.get(self.position) {
            None => Ok(None),
            Some(row) => {
                let row = row.clone()?;
                self.position += 1;
                Ok(Some(row))
            }
        }
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrisk_sim::scenario::KeyType;

    const HEADER: &str = "TradeId,IsPar,Factor_1,Desc_1,ShiftSize_1,Factor_2,Desc_2,ShiftSize_2,Currency,BaseNpv,Delta,Gamma\n";

    #[test]
    fn test_in_memory_reset_replays() {
        let key = RiskFactorKey::new(KeyType::FxSpot, "USD", 0);
        let mut s = SensitivityInMemoryStream::new(vec![SensitivityRecord::delta_gamma("T1", key, 1.0, 0.0)]);
        assert!(s.next().unwrap().is_some());
        assert!(s.next().unwrap().is_none());
        s.reset();
        assert_eq!(s.collect_remaining().unwrap().len(), 1);
    }

    #[test]
    fn test_csv_parses_delta_and_cross_gamma() {
        let data = format!(
            "{HEADER}T1,N,DiscountCurve/EUR/0,1Y,0.0001,,,0,EUR,100,5.5,0.1\n\
             T1,N,DiscountCurve/EUR/0,1Y,0.0001,DiscountCurve/EUR/1,2Y,0.0001,EUR,100,0,0.02\n"
        );
        let mut s = SensitivityCsvStream::from_reader(data.as_bytes(), "sensi.csv").unwrap();
        let all = s.collect_remaining().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].delta, 5.5);
        assert!(!all[0].is_cross_gamma());
        assert_eq!(all[1].key_2, Some(RiskFactorKey::new(KeyType::DiscountCurve, "EUR", 1)));
    }

    #[test]
    fn test_bad_record_aborts_stream() {
        let data = format!(
            "{HEADER}T1,N,DiscountCurve/EUR/0,,0,,,0,EUR,100,1,0\n\
             T2,N,DiscountCurve/EUR/0,,0,,,0,EUR,100,abc,0\n"
        );
        let mut s = SensitivityCsvStream::from_reader(data.as_bytes(), "sensi.csv").unwrap();
        assert!(s.next().unwrap().is_some());
        let err = s.next().unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_wrong_header_rejected() {
        let data = "Trade,IsPar\n";
        assert!(SensitivityCsvStream::from_reader(data.as_bytes(), "sensi.csv").is_err());
    }
}
