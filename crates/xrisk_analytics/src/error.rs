//! Analytics error types.
//!
//! `PortfolioError` lives with the reference data in [`crate::portfolio`];
//! sensitivity file errors live in [`crate::sensitivity`].

use thiserror::Error;
use xrisk_core::market_data::MarketDataError;
use xrisk_core::math::MathError;
use xrisk_sim::CubeError;

use crate::portfolio::PortfolioError;
use crate::sensitivity::SensitivityError;

/// Errors raised by exposure aggregation, XVA and credit migration.
#[derive(Error, Debug)]
pub enum AggregationError {
    /// Invalid configuration. `entity` names the offending item.
    #[error("Configuration error for {entity}: {message}")]
    Configuration {
        /// Netting set, trade, parameter or entity name
        entity: String,
        /// Description
        message: String,
    },

    /// Cube, scenario data and portfolio disagree.
    #[error("Input mismatch: {0}")]
    InputMismatch(String),

    /// Cube or scenario data access failed.
    #[error(transparent)]
    Cube(#[from] CubeError),

    /// Reference data lookup failed.
    #[error(transparent)]
    Portfolio(#[from] PortfolioError),

    /// Curve evaluation failed.
    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    /// Numerical routine failed.
    #[error(transparent)]
    Math(#[from] MathError),
}

impl AggregationError {
    /// Shorthand for [`AggregationError::Configuration`].
    pub fn config(entity: impl Into<String>, message: impl Into<String>) -> Self {
        AggregationError::Configuration {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the VaR calculators.
#[derive(Error, Debug)]
pub enum VarError {
    /// Quantile outside [0, 1].
    #[error("Quantile {0} must be in [0, 1]")]
    InvalidQuantile(f64),

    /// Matrix or vector sizes disagree.
    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Offending input
        what: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        got: usize,
    },

    /// Invalid calculator setting.
    #[error("Invalid VaR configuration: {0}")]
    Configuration(String),

    /// Covariance repair or factorisation failed.
    #[error(transparent)]
    Math(#[from] MathError),

    /// Sensitivity input could not be read.
    #[error(transparent)]
    Sensitivity(#[from] SensitivityError),
}

/// Errors raised by SIMM.
#[derive(Error, Debug)]
pub enum SimmError {
    /// CRIF file could not be opened or read.
    #[error("I/O error on {file}: {message}")]
    Io {
        /// File name
        file: String,
        /// Underlying error message
        message: String,
    },

    /// CRIF row could not be parsed.
    #[error("Parse error in {file} line {line}: {message}")]
    Parse {
        /// File name
        file: String,
        /// One-based line number
        line: usize,
        /// Description
        message: String,
    },

    /// Risk type without configuration.
    #[error("No SIMM configuration for risk type {0}")]
    UnknownRiskType(String),

    /// Missing or invalid configuration entry.
    #[error("SIMM configuration for {risk_type}: {message}")]
    Configuration {
        /// Risk type or risk class
        risk_type: String,
        /// Description
        message: String,
    },
}

impl SimmError {
    /// Shorthand for [`SimmError::Configuration`].
    pub fn config(risk_type: impl Into<String>, message: impl Into<String>) -> Self {
        SimmError::Configuration {
            risk_type: risk_type.into(),
            message: message.into(),
        }
    }
}
