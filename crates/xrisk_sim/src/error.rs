//! Simulation and cube error types.

use thiserror::Error;
use xrisk_core::market_data::MarketDataError;
use xrisk_core::types::DateError;
use xrisk_models::ModelError;

/// Cube indexing and layout errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CubeError {
    /// Id not present in the cube.
    #[error("NPV cube has no id {id} (num_ids = {num_ids})")]
    UnknownId {
        /// Requested id
        id: String,
        /// Number of ids in the cube
        num_ids: usize,
    },

    /// Index beyond one of the cube dimensions.
    #[error("{what} index {index} out of range (bound {bound})")]
    IndexOutOfRange {
        /// Dimension name (`id`, `date`, `sample`, `depth`)
        what: &'static str,
        /// Requested index
        index: usize,
        /// Exclusive upper bound
        bound: usize,
    },

    /// Duplicate id at construction.
    #[error("Duplicate id {0} in NPV cube")]
    DuplicateId(String),

    /// Arena handle that does not refer to a cube.
    #[error("Invalid cube handle {0}")]
    InvalidHandle(usize),

    /// Inconsistent shapes between cubes or buffers.
    #[error("Cube shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Aggregation scenario data key never written.
    #[error("No aggregation scenario data for {0}")]
    MissingScenarioData(String),
}

/// Errors raised by path generation, scenario handling and valuation.
#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid configuration. `entity` names the offending item.
    #[error("Configuration error for {entity}: {message}")]
    Configuration {
        /// Trade id, key, parameter or file name
        entity: String,
        /// Description
        message: String,
    },

    /// Scenario file layout does not match expectations.
    #[error("Schema error in {file}: {message}")]
    Schema {
        /// File name
        file: String,
        /// Description
        message: String,
    },

    /// A required market key is not present in the scenario.
    #[error("Missing market data for key {key}")]
    MissingMarketData {
        /// Risk factor key or curve name
        key: String,
    },

    /// No fixing available at or before the requested date.
    #[error("No fixing for {index} at or before {date}")]
    MissingFixing {
        /// Index name
        index: String,
        /// Requested fixing date
        date: String,
    },

    /// Trade pricing failed.
    #[error("Pricing failed for trade {trade_id}: {message}")]
    Pricing {
        /// Trade id
        trade_id: String,
        /// Description
        message: String,
    },

    /// No builder registered for a (model, engine, product) combination.
    #[error("No pricing builder for model {model}, engine {engine}, product {product}")]
    UnknownBuilder {
        /// Model kind
        model: String,
        /// Engine kind
        engine: String,
        /// Product kind
        product: String,
    },

    /// Cube error.
    #[error(transparent)]
    Cube(#[from] CubeError),

    /// Model error.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Market data error.
    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    /// Date arithmetic error.
    #[error(transparent)]
    Date(#[from] DateError),

    /// File I/O or CSV error.
    #[error("I/O error on {file}: {message}")]
    Io {
        /// File name
        file: String,
        /// Underlying error message
        message: String,
    },
}

impl SimError {
    /// Shorthand for [`SimError::Configuration`].
    pub fn config(entity: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::Configuration {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`SimError::Schema`].
    pub fn schema(file: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::Schema {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`SimError::Io`].
    pub fn io(file: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SimError::Io {
            file: file.into(),
            message: err.to_string(),
        }
    }

    /// Shorthand for [`SimError::Pricing`].
    pub fn pricing(trade_id: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::Pricing {
            trade_id: trade_id.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_id_names_cube_size() {
        let err = CubeError::UnknownId {
            id: "T9".to_string(),
            num_ids: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("T9"));
        assert!(msg.contains("num_ids = 3"));
    }

    #[test]
    fn test_cube_error_converts() {
        let err: SimError = CubeError::DuplicateId("A".into()).into();
        assert!(matches!(err, SimError::Cube(CubeError::DuplicateId(_))));
    }

    #[test]
    fn test_schema_names_file() {
        let err = SimError::schema("scenarios.csv", "bad header");
        assert_eq!(err.to_string(), "Schema error in scenarios.csv: bad header");
    }
}
