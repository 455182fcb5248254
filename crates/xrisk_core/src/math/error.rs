//! Numerical error types.

use thiserror::Error;

/// Errors raised by numerical routines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// Root not bracketed by the initial interval.
    #[error("Root not bracketed in [{a}, {b}]")]
    NoBracket {
        /// Lower bound
        a: f64,
        /// Upper bound
        b: f64,
    },

    /// Iteration limit reached.
    #[error("Maximum iterations ({iterations}) exceeded")]
    MaxIterationsExceeded {
        /// Iterations performed
        iterations: usize,
    },

    /// Matrix is not square or has the wrong size.
    #[error("Dimension mismatch: {context} (expected {expected}, got {got})")]
    DimensionMismatch {
        /// What was being checked
        context: String,
        /// Expected size
        expected: usize,
        /// Actual size
        got: usize,
    },

    /// Matrix is not symmetric.
    #[error("Matrix not symmetric at ({i}, {j}): {a} vs {b}")]
    NotSymmetric {
        /// Row
        i: usize,
        /// Column
        j: usize,
        /// Value at (i, j)
        a: f64,
        /// Value at (j, i)
        b: f64,
    },

    /// Negative eigenvalue beyond the salvage tolerance.
    #[error("Matrix not positive semi-definite: eigenvalue {eigenvalue} below tolerance {tolerance}")]
    NotPositiveSemiDefinite {
        /// Smallest eigenvalue
        eigenvalue: f64,
        /// Allowed tolerance
        tolerance: f64,
    },

    /// Integration did not converge.
    #[error("Integration did not converge on [{a}, {b}]")]
    IntegrationFailed {
        /// Lower limit
        a: f64,
        /// Upper limit
        b: f64,
    },

    /// Probability outside [0, 1].
    #[error("Probability {0} outside [0, 1]")]
    InvalidProbability(f64),
}
