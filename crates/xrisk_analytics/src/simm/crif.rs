//! CRIF sensitivity records.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::SimmError;

/// One CRIF line.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrifRecord {
    /// Netting set (or portfolio) the sensitivity belongs to
    pub netting_set: String,
    /// Risk type, e.g. `Risk_IRCurve`
    pub risk_type: String,
    /// Qualifier, e.g. a currency or issuer
    pub qualifier: String,
    /// Bucket; empty for risk types without buckets
    pub bucket: String,
    /// First label, e.g. a tenor
    pub label1: String,
    /// Second label, e.g. a sub-curve
    pub label2: String,
    /// Sensitivity amount in the calculation currency
    pub amount: f64,
}

impl CrifRecord {
    /// Record with empty bucket and labels.
    pub fn new(netting_set: impl Into<String>, risk_type: impl Into<String>, qualifier: impl Into<String>, amount: f64) -> Self {
        Self {
            netting_set: netting_set.into(),
            risk_type: risk_type.into(),
            qualifier: qualifier.into(),
            bucket: String::new(),
            label1: String::new(),
            label2: String::new(),
            amount,
        }
    }

    /// Sets the bucket.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Sets both labels.
    pub fn with_labels(mut self, label1: impl Into<String>, label2: impl Into<String>) -> Self {
        self.label1 = label1.into();
        self.label2 = label2.into();
        self
    }
}

struct Columns {
    netting_set: usize,
    risk_type: usize,
    qualifier: usize,
    bucket: Option<usize>,
    label1: Option<usize>,
    label2: Option<usize>,
    amount: usize,
}

impl Columns {
    fn from_header(header: &csv::StringRecord, file: &str) -> Result<Self, SimmError> {
        let find = |names: &[&str]| header.iter().position(|h| names.contains(&h));
        let required = |names: &[&str]| {
            find(names).ok_or_else(|| SimmError::Parse {
                file: file.to_string(),
                line: 1,
                message: format!("missing column {}", names[0]),
            })
        };
        let optional = |name: &str| {
            let c = find(&[name]);
            if c.is_none() {
                warn!(file, column = name, "CRIF column absent, using empty values");
            }
            c
        };
        Ok(Self {
            netting_set: required(&["NettingSetId", "PortfolioId"])?,
            risk_type: required(&["RiskType"])?,
            qualifier: required(&["Qualifier"])?,
            bucket: optional("Bucket"),
            label1: optional("Label1"),
            label2: optional("Label2"),
            amount: required(&["Amount", "AmountUSD"])?,
        })
    }
}

/// Parses CRIF rows from `reader`. Columns are found by header name;
/// `Bucket`, `Label1` and `Label2` may be absent.
pub fn read_crif<R: Read>(reader: R, file: &str) -> Result<Vec<CrifRecord>, SimmError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let header = rdr
        .headers()
        .map_err(|e| SimmError::Io {
            file: file.to_string(),
            message: e.to_string(),
        })?
        .clone();
    let cols = Columns::from_header(&header, file)?;
    let mut out = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let line = i + 2;
        let parse_err = |message: String| SimmError::Parse {
            file: file.to_string(),
            line,
            message,
        };
        let row = row.map_err(|e| parse_err(e.to_string()))?;
        let field = |c: usize| row.get(c).unwrap_or_default().to_string();
        let opt = |c: Option<usize>| c.map(|c| field(c)).unwrap_or_default();
        let amount_text = field(cols.amount);
        let amount: f64 = amount_text
            .parse()
            .map_err(|_| parse_err(format!("invalid amount '{amount_text}'")))?;
        let risk_type = field(cols.risk_type);
        if risk_type.is_empty() {
            return Err(parse_err("empty risk type".into()));
        }
        out.push(CrifRecord {
            netting_set: field(cols.netting_set),
            risk_type,
            qualifier: field(cols.qualifier),
            bucket: opt(cols.bucket),
            label1: opt(cols.label1),
            label2: opt(cols.label2),
            amount,
        });
    }
    debug!(file, records = out.len(), "CRIF loaded");
    Ok(out)
}

/// Reads a CRIF file.
pub fn load_crif(path: &Path) -> Result<Vec<CrifRecord>, SimmError> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|e| SimmError::Io {
        file: name.clone(),
        message: e.to_string(),
    })?;
    read_crif(file, &name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_crif_by_header_name() {
        let data = "\
RiskType,NettingSetId,Qualifier,Bucket,Label1,Label2,Amount
Risk_IRCurve,NS1,USD,1,2y,OIS,1000.5
Risk_FX,NS1,EUR,,,,-20
";
        let records = read_crif(data.as_bytes(), "crif.csv").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            CrifRecord::new("NS1", "Risk_IRCurve", "USD", 1000.5)
                .with_bucket("1")
                .with_labels("2y", "OIS")
        );
        assert_eq!(records[1].bucket, "");
        assert_eq!(records[1].amount, -20.0);
    }

    #[test]
    fn test_optional_columns_may_be_absent() {
        let data = "PortfolioId,RiskType,Qualifier,AmountUSD\nP,Risk_FX,GBP,5\n";
        let records = read_crif(data.as_bytes(), "crif.csv").unwrap();
        assert_eq!(records[0].netting_set, "P");
        assert_eq!(records[0].label1, "");
    }

    #[test]
    fn test_bad_amount_names_line() {
        let data = "NettingSetId,RiskType,Qualifier,Amount\nNS,Risk_FX,GBP,abc\n";
        match read_crif(data.as_bytes(), "crif.csv") {
            Err(SimmError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_column() {
        let data = "NettingSetId,Qualifier,Amount\nNS,GBP,1\n";
        assert!(matches!(read_crif(data.as_bytes(), "crif.csv"), Err(SimmError::Parse { line: 1, .. })));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_crif(Path::new("/nonexistent/crif.csv")),
            Err(SimmError::Io { .. })
        ));
    }
}
