//! Model layer error types.

use thiserror::Error;
use xrisk_core::market_data::MarketDataError;
use xrisk_core::math::MathError;

use crate::model::CorrelationError;

/// Errors raised while building or evaluating the cross-asset model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Invalid parameter or inconsistent model set-up.
    #[error("Configuration error in {entity}: {message}")]
    Configuration {
        /// Offending parametrization, parameter or component
        entity: String,
        /// Description
        message: String,
    },

    /// Invalid correlation matrix.
    #[error("Correlation error: {0}")]
    Correlation(#[from] CorrelationError),

    /// Component index beyond the number of components of that kind.
    #[error("{what} index {index} out of range (size {size})")]
    IndexOutOfRange {
        /// Component kind
        what: &'static str,
        /// Requested index
        index: usize,
        /// Number of components
        size: usize,
    },

    /// Vector of the wrong length passed to the process.
    #[error("Dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Operation
        context: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// Calibration could not match a market quote.
    #[error("Calibration failed for {entity} at expiry {expiry}: {message}")]
    CalibrationFailed {
        /// Calibrated component
        entity: String,
        /// Expiry time of the failing instrument
        expiry: f64,
        /// Description
        message: String,
    },

    /// Numerical routine failed.
    #[error(transparent)]
    Math(#[from] MathError),

    /// Term structure lookup failed.
    #[error(transparent)]
    MarketData(#[from] MarketDataError),
}

impl ModelError {
    /// Shorthand for [`ModelError::Configuration`].
    pub fn config(entity: impl Into<String>, message: impl Into<String>) -> Self {
        ModelError::Configuration {
            entity: entity.into(),
            message: message.into(),
        }
    }
}
