//! Sensitivity records and streams.
//!
//! - [`SensitivityRecord`]: trade delta/gamma and cross-gamma
//! - [`CvaSensitivityRecord`]: netting set CVA delta
//! - [`SensitivityStream`] with in-memory and CSV implementations

mod record;
mod stream;

pub use record::{CvaSensitivityRecord, SensitivityRecord};
pub use stream::{SensitivityCsvStream, SensitivityInMemoryStream, SensitivityStream};

use thiserror::Error;

/// Errors raised while reading sensitivities.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensitivityError {
    /// File could not be opened or read.
    #[error("I/O error on {file}: {message}")]
    Io {
        /// File name
        file: String,
        /// Underlying error message
        message: String,
    },

    /// Malformed record.
    #[error("Invalid sensitivity record in {file} line {line}: {message}")]
    Parse {
        /// File name
        file: String,
        /// One-based line number
        line: usize,
        /// Description
        message: String,
    },
}

impl SensitivityError {
    pub(crate) fn io(file: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SensitivityError::Io {
            file: file.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        SensitivityError::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}
