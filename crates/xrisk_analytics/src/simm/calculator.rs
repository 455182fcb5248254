//! SIMM per netting set.

use std::collections::BTreeMap;
use std::io::Write;

use rayon::prelude::*;
use tracing::{debug, info};

use super::configuration::SimmConfiguration;
use super::crif::CrifRecord;
use super::margin::{risk_type_margin, RiskTypeMargin};
use crate::error::SimmError;

/// Margins of one netting set.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NettingSetSimm {
    /// Per risk type
    pub risk_types: BTreeMap<String, RiskTypeMargin>,
    /// Per risk class, the sum of its risk type margins
    pub risk_classes: BTreeMap<String, f64>,
    /// `sqrt(Σ_r Σ_s ψ_rs IM_r IM_s)`
    pub total: f64,
}

/// SIMM results keyed by netting set.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimmResults {
    /// Per netting set
    pub netting_sets: BTreeMap<String, NettingSetSimm>,
}

impl SimmResults {
    /// Writes `NettingSet,RiskClass,RiskType,Margin` rows; `All` marks
    /// aggregated levels.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut w = csv::Writer::from_writer(writer);
        w.write_record(["NettingSet", "RiskClass", "RiskType", "Margin"])?;
        for (ns, s) in &self.netting_sets {
            w.write_record([ns.as_str(), "All", "All", &format!("{:.2}", s.total)])?;
            for (class, m) in &s.risk_classes {
                w.write_record([ns.as_str(), class.as_str(), "All", &format!("{m:.2}")])?;
            }
            for (rt, m) in &s.risk_types {
                w.write_record([ns.as_str(), "", rt.as_str(), &format!("{:.2}", m.margin)])?;
            }
        }
        w.flush()?;
        Ok(())
    }
}

/// Groups CRIF records by netting set, risk type and bucket and applies
/// the configured weights and correlations.
#[derive(Debug, Clone)]
pub struct SimmCalculator {
    config: SimmConfiguration,
}

impl SimmCalculator {
    /// Validates `config`.
    pub fn new(config: SimmConfiguration) -> Result<Self, SimmError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn configuration(&self) -> &SimmConfiguration {
        &self.config
    }

    /// SIMM of every netting set in `records`.
    ///
    /// # Errors
    /// `UnknownRiskType` for a risk type without configuration.
    pub fn calculate(&self, records: &[CrifRecord]) -> Result<SimmResults, SimmError> {
        let mut grouped: BTreeMap<&str, BTreeMap<&str, Vec<&CrifRecord>>> = BTreeMap::new();
        for r in records {
            grouped
                .entry(r.netting_set.as_str())
                .or_default()
                .entry(r.risk_type.as_str())
                .or_default()
                .push(r);
        }
        let netting_sets = grouped
            .par_iter()
            .map(|(ns, by_type)| Ok((ns.to_string(), self.netting_set(ns, by_type)?)))
            .collect::<Result<BTreeMap<_, _>, SimmError>>()?;
        info!(netting_sets = netting_sets.len(), records = records.len(), "SIMM done");
        Ok(SimmResults { netting_sets })
    }

    fn netting_set(&self, ns: &str, by_type: &BTreeMap<&str, Vec<&CrifRecord>>) -> Result<NettingSetSimm, SimmError> {
        let mut out = NettingSetSimm::default();
        for (risk_type, rs) in by_type {
            let rt = self.config.risk_type(risk_type)?;
            let m = risk_type_margin(rs, rt, risk_type)?;
            *out.risk_classes.entry(rt.risk_class.clone()).or_default() += m.margin;
            out.risk_types.insert(risk_type.to_string(), m);
        }
        let psi = &self.config.risk_class_correlation;
        let mut total = 0.0;
        for (r, mr) in &out.risk_classes {
            for (s, ms) in &out.risk_classes {
                total += psi.get(r, s) * mr * ms;
            }
        }
        out.total = total.max(0.0).sqrt();
        debug!(netting_set = ns, total = out.total, "netting set SIMM");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simm::{NamedCorrelation, RiskTypeConfig};
    use approx::assert_relative_eq;

    fn config() -> SimmConfiguration {
        SimmConfiguration {
            risk_class_correlation: NamedCorrelation::uniform(0.0),
            ..SimmConfiguration::default()
        }
        .with_risk_type("Risk_IRCurve", RiskTypeConfig::flat("InterestRate", 2.0))
        .with_risk_type("Risk_IRVol", RiskTypeConfig::flat("InterestRate", 1.0))
        .with_risk_type("Risk_FX", RiskTypeConfig::flat("FX", 3.0))
    }

    #[test]
    fn test_netting_set_aggregation() {
        let calc = SimmCalculator::new(config()).unwrap();
        let records = vec![
            CrifRecord::new("NS1", "Risk_IRCurve", "USD", 3.0),
            CrifRecord::new("NS1", "Risk_IRVol", "USD", 2.0),
            CrifRecord::new("NS1", "Risk_FX", "EUR", 4.0),
            CrifRecord::new("NS2", "Risk_FX", "GBP", -1.0),
        ];
        let out = calc.calculate(&records).unwrap();
        let ns1 = &out.netting_sets["NS1"];
        assert_relative_eq!(ns1.risk_classes["InterestRate"], 8.0, epsilon = 1e-12);
        assert_relative_eq!(ns1.risk_classes["FX"], 12.0, epsilon = 1e-12);
        assert_relative_eq!(ns1.total, (64.0f64 + 144.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(out.netting_sets["NS2"].total, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_risk_type() {
        let calc = SimmCalculator::new(config()).unwrap();
        let records = vec![CrifRecord::new("NS", "Risk_Equity", "X", 1.0)];
        assert!(matches!(calc.calculate(&records), Err(SimmError::UnknownRiskType(t)) if t == "Risk_Equity"));
    }

    #[test]
    fn test_write_csv() {
        let calc = SimmCalculator::new(config()).unwrap();
        let out = calc.calculate(&[CrifRecord::new("NS", "Risk_FX", "EUR", 1.0)]).unwrap();
        let mut buf = Vec::new();
        out.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("NettingSet,RiskClass,RiskType,Margin\nNS,All,All,3.00\nNS,FX,All,3.00\n"));
    }
}
