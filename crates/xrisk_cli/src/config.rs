//! Run configuration.
//!
//! Loaded from a TOML file, or from the embedded default when `--config`
//! is omitted, then overridden from `XRISK_*` environment variables and
//! command-line flags.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use xrisk_analytics::aggregation::AllocationMethod;
use xrisk_core::types::{Date, DayCountConvention, Period};
use xrisk_sim::engine::TradeSpec;
use xrisk_sim::market::IndexConfig;
use xrisk_sim::scenario::SequenceType;

/// Configuration shipped with the binary.
pub const DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {file}: {message}")]
    Io { file: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// As-of date
    pub asof: Date,
    /// Reporting currency
    pub base_currency: String,
    /// Monte Carlo samples
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Path generator seed
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Valuation date grid as tenors from the as-of date
    pub grid: Vec<Period>,
    /// Variate sequence
    #[serde(default)]
    pub sequence: SequenceType,
    /// Day counter for model times
    #[serde(default)]
    pub day_counter: DayCountConvention,
    /// Samples per parallel slice; derived from the CPU count when absent
    #[serde(default)]
    pub batch_size: Option<usize>,
}

fn default_samples() -> usize {
    1000
}

fn default_seed() -> u64 {
    42
}

/// LGM parameters of one currency on a flat initial curve.
#[derive(Debug, Clone, Deserialize)]
pub struct LgmConfig {
    pub currency: String,
    /// Continuously compounded flat zero rate
    pub rate: f64,
    pub sigma: f64,
    pub kappa: f64,
}

/// Black-Scholes FX parameters, base units per foreign unit.
#[derive(Debug, Clone, Deserialize)]
pub struct FxConfig {
    pub foreign: String,
    pub spot: f64,
    pub sigma: f64,
}

/// One off-diagonal entry of the factor correlation.
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationEntry {
    pub factor_1: usize,
    pub factor_2: usize,
    pub value: f64,
}

/// Cross-asset model and simulated market layout.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Currencies; the first is the domestic one and must be the base currency
    pub currencies: Vec<LgmConfig>,
    #[serde(default)]
    pub fx: Vec<FxConfig>,
    /// Factor order: IR currencies, then FX
    #[serde(default)]
    pub correlations: Vec<CorrelationEntry>,
    pub discount_tenors: Vec<Period>,
    #[serde(default)]
    pub indices: Vec<IndexConfig>,
}

/// Counterparty credit.
#[derive(Debug, Clone, Deserialize)]
pub struct CounterpartyConfig {
    pub id: String,
    pub hazard_rate: f64,
    pub lgd: f64,
}

/// Variation margin terms.
#[derive(Debug, Clone, Deserialize)]
pub struct CsaConfig {
    pub currency: String,
    #[serde(default)]
    pub threshold_pay: f64,
    #[serde(default)]
    pub threshold_rcv: f64,
    #[serde(default)]
    pub mta_pay: f64,
    #[serde(default)]
    pub mta_rcv: f64,
    #[serde(default = "default_mpor_days")]
    pub mpor_days: u32,
    #[serde(default = "default_call_frequency")]
    pub margin_call_frequency_days: u32,
}

fn default_mpor_days() -> u32 {
    14
}

fn default_call_frequency() -> u32 {
    1
}

/// Netting set and its optional CSA.
#[derive(Debug, Clone, Deserialize)]
pub struct NettingSetConfig {
    pub id: String,
    pub counterparty: String,
    #[serde(default)]
    pub csa: Option<CsaConfig>,
}

/// Own credit for DVA.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OwnCreditConfig {
    pub hazard_rate: f64,
    pub lgd: f64,
}

/// Exposure post-processing.
#[derive(Debug, Clone, Deserialize)]
pub struct ExposureSettings {
    #[serde(default = "default_pfe_quantile")]
    pub pfe_quantile: f64,
    #[serde(default)]
    pub allocation: AllocationMethod,
    #[serde(default)]
    pub own_credit: Option<OwnCreditConfig>,
}

fn default_pfe_quantile() -> f64 {
    0.95
}

impl Default for ExposureSettings {
    fn default() -> Self {
        Self {
            pfe_quantile: default_pfe_quantile(),
            allocation: AllocationMethod::default(),
            own_credit: None,
        }
    }
}

/// Parametric VaR settings.
#[derive(Debug, Clone, Deserialize)]
pub struct VarSettings {
    #[serde(default = "default_quantiles")]
    pub quantiles: Vec<f64>,
    /// `Delta`, `DeltaGammaNormal`, `MonteCarlo` or `Cornish-Fisher`
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_var_samples")]
    pub samples: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub breakdown: bool,
    #[serde(default)]
    pub salvage_covariance: bool,
}

fn default_quantiles() -> Vec<f64> {
    vec![0.99]
}

fn default_method() -> String {
    "Delta".to_string()
}

fn default_var_samples() -> usize {
    100_000
}

impl Default for VarSettings {
    fn default() -> Self {
        Self {
            quantiles: default_quantiles(),
            method: default_method(),
            samples: default_var_samples(),
            seed: default_seed(),
            breakdown: false,
            salvage_covariance: false,
        }
    }
}

/// Full run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Default tracing directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    pub run: RunConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub trades: Vec<TradeSpec>,
    #[serde(default)]
    pub counterparties: Vec<CounterpartyConfig>,
    #[serde(default)]
    pub netting_sets: Vec<NettingSetConfig>,
    #[serde(default)]
    pub exposure: ExposureSettings,
    #[serde(default)]
    pub var: VarSettings,
}

fn default_log_filter() -> String {
    "xrisk=info".to_string()
}

impl Config {
    /// Parses TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            file: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    /// The embedded default configuration.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Loads `path`, or the embedded default when `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::embedded(),
        }
    }

    /// Applies `XRISK_SAMPLES` and `XRISK_SEED`.
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        if let Ok(samples) = std::env::var("XRISK_SAMPLES") {
            self.run.samples = samples
                .parse()
                .map_err(|_| ConfigError::Validation(format!("XRISK_SAMPLES '{samples}' is not a count")))?;
        }
        if let Ok(seed) = std::env::var("XRISK_SEED") {
            self.run.seed = seed
                .parse()
                .map_err(|_| ConfigError::Validation(format!("XRISK_SEED '{seed}' is not an integer")))?;
        }
        Ok(self)
    }

    /// Checks cross references and ranges, reporting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.run.samples == 0 {
            errors.push("run.samples must be positive".to_string());
        }
        if self.run.grid.is_empty() {
            errors.push("run.grid is empty".to_string());
        }
        match self.model.currencies.first() {
            None => errors.push("model.currencies is empty".to_string()),
            Some(c) if c.currency != self.run.base_currency => errors.push(format!(
                "first model currency {} differs from base currency {}",
                c.currency, self.run.base_currency
            )),
            Some(_) => {}
        }
        let factors = self.model.currencies.len() + self.model.fx.len();
        for c in &self.model.correlations {
            if c.factor_1 >= factors || c.factor_2 >= factors {
                errors.push(format!(
                    "correlation ({}, {}) outside {factors} factors",
                    c.factor_1, c.factor_2
                ));
            }
        }
        for fx in &self.model.fx {
            if !self.model.currencies.iter().any(|c| c.currency == fx.foreign) {
                errors.push(format!("FX {} has no LGM currency", fx.foreign));
            }
        }
        if !(0.0..=1.0).contains(&self.exposure.pfe_quantile) {
            errors.push(format!("exposure.pfe_quantile {} outside [0, 1]", self.exposure.pfe_quantile));
        }
        for ns in &self.netting_sets {
            if !self.counterparties.iter().any(|c| c.id == ns.counterparty) {
                errors.push(format!("netting set {} references unknown counterparty {}", ns.id, ns.counterparty));
            }
        }
        for t in &self.trades {
            if !self.netting_sets.iter().any(|ns| ns.id == t.netting_set_id) {
                errors.push(format!("trade {} references unknown netting set {}", t.id, t.netting_set_id));
            }
        }
        if self.var.method.parse::<xrisk_analytics::var::VarMethod>().is_err() {
            errors.push(format!("unknown VaR method {}", self.var.method));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_config_is_valid() {
        let config = Config::embedded().unwrap();
        config.validate().unwrap();
        assert_eq!(config.log_filter, "xrisk=info");
        assert!(!config.trades.is_empty());
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let text = r#"
[run]
asof = "2025-01-02"
base_currency = "EUR"
grid = ["1Y"]

[model]
discount_tenors = ["1Y", "5Y"]

[[model.currencies]]
currency = "EUR"
rate = 0.02
sigma = 0.01
kappa = 0.03
"#;
        let config = Config::from_toml(text).unwrap();
        assert_eq!(config.run.samples, 1000);
        assert_eq!(config.run.seed, 42);
        assert_eq!(config.var.quantiles, vec![0.99]);
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_lists_every_problem() {
        let mut config = Config::embedded().unwrap();
        config.run.samples = 0;
        config.exposure.pfe_quantile = 1.5;
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("run.samples"));
        assert!(message.contains("pfe_quantile"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFAULT_CONFIG.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.run.base_currency, "EUR");
        assert!(matches!(
            Config::load(Path::new("/nonexistent/run.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
