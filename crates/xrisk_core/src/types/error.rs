//! Date and period errors.

use thiserror::Error;

/// Date-related errors.
///
/// # Examples
/// ```
/// use xrisk_core::types::DateError;
///
/// let err = DateError::InvalidDate { year: 2024, month: 2, day: 30 };
/// assert_eq!(format!("{}", err), "Invalid date: 2024-2-30");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    /// Invalid date components (e.g. February 30th).
    #[error("Invalid date: {year}-{month}-{day}")]
    InvalidDate {
        /// Year component
        year: i32,
        /// Month component
        month: u32,
        /// Day component
        day: u32,
    },

    /// Failed to parse a date string.
    #[error("Failed to parse date: {0}")]
    ParseError(String),

    /// Failed to parse a period string such as `6M`.
    #[error("Failed to parse period: {0}")]
    InvalidPeriod(String),

    /// Date arithmetic left the representable range.
    #[error("Date overflow adding {period} to {date}")]
    Overflow {
        /// Start date
        date: String,
        /// Period that was added
        period: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = DateError::ParseError("bad".to_string());
        assert_eq!(format!("{}", err), "Failed to parse date: bad");
    }

    #[test]
    fn test_invalid_period_display() {
        let err = DateError::InvalidPeriod("7X".to_string());
        assert!(err.to_string().contains("7X"));
    }
}
