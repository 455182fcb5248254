//! SIMM weights, correlations and thresholds supplied by the caller.

use std::collections::BTreeMap;

use crate::error::SimmError;

/// Correlation between named items (labels, buckets, risk classes).
///
/// Equal names correlate at 1. Names both listed in `names` use `matrix`;
/// any other pair uses `default`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NamedCorrelation {
    /// Names indexing `matrix`
    pub names: Vec<String>,
    /// Symmetric correlation matrix, row per name
    pub matrix: Vec<Vec<f64>>,
    /// Correlation of pairs not covered by `matrix`
    pub default: f64,
}

impl Default for NamedCorrelation {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl NamedCorrelation {
    /// Same correlation for every pair of distinct names.
    pub fn uniform(rho: f64) -> Self {
        Self {
            names: Vec::new(),
            matrix: Vec::new(),
            default: rho,
        }
    }

    /// Full matrix over `names`; pairs outside use `default`.
    pub fn with_matrix(names: Vec<String>, matrix: Vec<Vec<f64>>, default: f64) -> Self {
        Self { names, matrix, default }
    }

    /// Correlation of `a` and `b`.
    pub fn get(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let idx = |n: &str| self.names.iter().position(|x| x == n);
        match (idx(a), idx(b)) {
            (Some(i), Some(j)) => self.matrix[i][j],
            _ => self.default,
        }
    }

    fn validate(&self, owner: &str, what: &str) -> Result<(), SimmError> {
        let n = self.names.len();
        let err = |m: String| SimmError::config(owner, format!("{what}: {m}"));
        if self.matrix.len() != n || self.matrix.iter().any(|r| r.len() != n) {
            return Err(err(format!("matrix must be {n}x{n}")));
        }
        if !(-1.0..=1.0).contains(&self.default) {
            return Err(err(format!("default correlation {} outside [-1, 1]", self.default)));
        }
        for i in 0..n {
            if (self.matrix[i][i] - 1.0).abs() > 1e-12 {
                return Err(err(format!("diagonal entry {i} is {}", self.matrix[i][i])));
            }
            for j in 0..i {
                let (a, b) = (self.matrix[i][j], self.matrix[j][i]);
                if (a - b).abs() > 1e-12 || !(-1.0..=1.0).contains(&a) {
                    return Err(err(format!("entry ({i}, {j}) is {a} vs {b}")));
                }
            }
        }
        Ok(())
    }
}

/// Parameters of one risk type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskTypeConfig {
    /// Risk class the risk type margin contributes to
    pub risk_class: String,
    /// Risk weight per bucket; `""` for risk types without buckets
    #[cfg_attr(feature = "serde", serde(default))]
    pub weights: BTreeMap<String, f64>,
    /// Weight of buckets missing from `weights`
    #[cfg_attr(feature = "serde", serde(default))]
    pub default_weight: Option<f64>,
    /// Correlation between `label1` values within a qualifier
    #[cfg_attr(feature = "serde", serde(default))]
    pub label1_correlation: NamedCorrelation,
    /// Correlation between `label2` values within a qualifier
    #[cfg_attr(feature = "serde", serde(default))]
    pub label2_correlation: NamedCorrelation,
    /// Correlation between distinct qualifiers of a bucket
    #[cfg_attr(feature = "serde", serde(default))]
    pub qualifier_correlation: f64,
    /// Correlation between buckets
    #[cfg_attr(feature = "serde", serde(default))]
    pub bucket_correlation: NamedCorrelation,
    /// Concentration threshold per bucket; absent means no concentration add-on
    #[cfg_attr(feature = "serde", serde(default))]
    pub concentration_thresholds: BTreeMap<String, f64>,
    /// Bucket aggregated linearly instead of through `bucket_correlation`
    #[cfg_attr(feature = "serde", serde(default))]
    pub residual_bucket: Option<String>,
}

impl RiskTypeConfig {
    /// Risk type with one weight for every bucket and full correlation.
    pub fn flat(risk_class: impl Into<String>, weight: f64) -> Self {
        Self {
            risk_class: risk_class.into(),
            weights: BTreeMap::new(),
            default_weight: Some(weight),
            label1_correlation: NamedCorrelation::default(),
            label2_correlation: NamedCorrelation::default(),
            qualifier_correlation: 1.0,
            bucket_correlation: NamedCorrelation::default(),
            concentration_thresholds: BTreeMap::new(),
            residual_bucket: None,
        }
    }

    /// Risk weight of `bucket`.
    pub fn weight(&self, risk_type: &str, bucket: &str) -> Result<f64, SimmError> {
        self.weights
            .get(bucket)
            .copied()
            .or(self.default_weight)
            .ok_or_else(|| SimmError::config(risk_type, format!("no risk weight for bucket '{bucket}'")))
    }

    /// Concentration threshold of `bucket`, if any.
    pub fn concentration_threshold(&self, bucket: &str) -> Option<f64> {
        self.concentration_thresholds.get(bucket).copied()
    }

    fn validate(&self, risk_type: &str) -> Result<(), SimmError> {
        if self.risk_class.is_empty() {
            return Err(SimmError::config(risk_type, "empty risk class"));
        }
        if let Some((b, w)) = self.weights.iter().find(|(_, w)| !(w.is_finite() && **w >= 0.0)) {
            return Err(SimmError::config(risk_type, format!("invalid weight {w} for bucket '{b}'")));
        }
        if let Some(w) = self.default_weight {
            if !(w.is_finite() && w >= 0.0) {
                return Err(SimmError::config(risk_type, format!("invalid default weight {w}")));
            }
        }
        if !(-1.0..=1.0).contains(&self.qualifier_correlation) {
            return Err(SimmError::config(
                risk_type,
                format!("qualifier correlation {} outside [-1, 1]", self.qualifier_correlation),
            ));
        }
        if let Some((b, t)) = self.concentration_thresholds.iter().find(|(_, t)| !(**t > 0.0)) {
            return Err(SimmError::config(risk_type, format!("threshold {t} for bucket '{b}' must be positive")));
        }
        self.label1_correlation.validate(risk_type, "label1 correlation")?;
        self.label2_correlation.validate(risk_type, "label2 correlation")?;
        self.bucket_correlation.validate(risk_type, "bucket correlation")
    }
}

/// Full SIMM parameter set.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimmConfiguration {
    /// Parameters per risk type name, e.g. `Risk_IRCurve`
    pub risk_types: BTreeMap<String, RiskTypeConfig>,
    /// Cross risk class correlation ψ
    #[cfg_attr(feature = "serde", serde(default))]
    pub risk_class_correlation: NamedCorrelation,
}

impl SimmConfiguration {
    /// Adds or replaces a risk type.
    pub fn with_risk_type(mut self, name: impl Into<String>, config: RiskTypeConfig) -> Self {
        self.risk_types.insert(name.into(), config);
        self
    }

    /// Parameters of `risk_type`.
    pub fn risk_type(&self, risk_type: &str) -> Result<&RiskTypeConfig, SimmError> {
        self.risk_types
            .get(risk_type)
            .ok_or_else(|| SimmError::UnknownRiskType(risk_type.to_string()))
    }

    /// Checks every risk type and correlation.
    pub fn validate(&self) -> Result<(), SimmError> {
        for (name, rt) in &self.risk_types {
            rt.validate(name)?;
        }
        self.risk_class_correlation.validate("risk classes", "risk class correlation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_correlation_lookup() {
        let c = NamedCorrelation::with_matrix(
            vec!["2y".into(), "5y".into()],
            vec![vec![1.0, 0.8], vec![0.8, 1.0]],
            0.3,
        );
        assert_eq!(c.get("2y", "5y"), 0.8);
        assert_eq!(c.get("2y", "10y"), 0.3);
        assert_eq!(c.get("10y", "10y"), 1.0);
    }

    #[test]
    fn test_validation_names_risk_type() {
        let mut rt = RiskTypeConfig::flat("IR", 50.0);
        rt.qualifier_correlation = 1.5;
        let config = SimmConfiguration::default().with_risk_type("Risk_IRCurve", rt);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Risk_IRCurve"));
    }

    #[test]
    fn test_asymmetric_matrix_rejected() {
        let mut rt = RiskTypeConfig::flat("IR", 50.0);
        rt.bucket_correlation = NamedCorrelation::with_matrix(
            vec!["1".into(), "2".into()],
            vec![vec![1.0, 0.2], vec![0.3, 1.0]],
            0.0,
        );
        assert!(SimmConfiguration::default().with_risk_type("Risk_IRCurve", rt).validate().is_err());
    }

    #[test]
    fn test_missing_weight() {
        let mut rt = RiskTypeConfig::flat("FX", 1.0);
        rt.default_weight = None;
        rt.weights.insert("1".into(), 7.4);
        assert_eq!(rt.weight("Risk_FX", "1").unwrap(), 7.4);
        assert!(rt.weight("Risk_FX", "2").is_err());
    }
}
