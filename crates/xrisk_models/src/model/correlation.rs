//! Instantaneous correlation between the model's Brownian drivers.
//!
//! Given independent normals `Z`, correlated normals are `W = S·Z` where
//! `S Sᵀ = C`. `S` is the Cholesky factor when `C` is positive definite and
//! the spectral square root when it is only semi-definite (e.g. two
//! perfectly correlated drivers).

use nalgebra::DMatrix;
use xrisk_core::math::{pseudo_sqrt, SalvageMethod};

use crate::error::ModelError;

/// Error types for correlation operations.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationError {
    /// Matrix is not positive semi-definite within tolerance
    NotPositiveSemiDefinite,
    /// Matrix dimensions are invalid
    InvalidDimensions {
        /// Required size
        expected: usize,
        /// Supplied size
        got: usize,
    },
    /// Diagonal elements are not 1.0
    InvalidDiagonal {
        /// Diagonal position
        index: usize,
        /// Entry found there
        value: f64,
    },
    /// Matrix is not symmetric
    NotSymmetric {
        /// Row
        i: usize,
        /// Column
        j: usize,
    },
    /// Correlation value out of range [-1, 1]
    OutOfRange {
        /// Row
        i: usize,
        /// Column
        j: usize,
        /// Offending correlation
        value: f64,
    },
}

impl std::fmt::Display for CorrelationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrelationError::NotPositiveSemiDefinite => {
                write!(f, "Correlation matrix is not positive semi-definite")
            }
            CorrelationError::InvalidDimensions { expected, got } => {
                write!(f, "Invalid matrix dimensions: expected {} elements, got {}", expected, got)
            }
            CorrelationError::InvalidDiagonal { index, value } => {
                write!(f, "Diagonal element at index {} is {}, expected 1.0", index, value)
            }
            CorrelationError::NotSymmetric { i, j } => {
                write!(f, "Matrix is not symmetric at ({}, {})", i, j)
            }
            CorrelationError::OutOfRange { i, j, value } => {
                write!(f, "Correlation at ({}, {}) is {}, must be in [-1, 1]", i, j, value)
            }
        }
    }
}

impl std::error::Error for CorrelationError {}

/// Validated correlation matrix.
///
/// - square and symmetric
/// - unit diagonal
/// - off-diagonal elements in [-1, 1]
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMatrix {
    matrix: DMatrix<f64>,
}

impl CorrelationMatrix {
    /// Creates a correlation matrix from a row-major slice.
    pub fn new(data: &[f64], dim: usize) -> Result<Self, CorrelationError> {
        let expected = dim * dim;
        if data.len() != expected {
            return Err(CorrelationError::InvalidDimensions {
                expected,
                got: data.len(),
            });
        }
        let epsilon = 1e-10;

        for i in 0..dim {
            let diag = data[i * dim + i];
            if (diag - 1.0).abs() > epsilon {
                return Err(CorrelationError::InvalidDiagonal { index: i, value: diag });
            }
        }

        for i in 0..dim {
            for j in (i + 1)..dim {
                let val_ij = data[i * dim + j];
                if (val_ij - data[j * dim + i]).abs() > epsilon {
                    return Err(CorrelationError::NotSymmetric { i, j });
                }
                if !(-1.0..=1.0).contains(&val_ij) {
                    return Err(CorrelationError::OutOfRange { i, j, value: val_ij });
                }
            }
        }

        Ok(Self {
            matrix: DMatrix::from_row_slice(dim, dim, data),
        })
    }

    /// Identity matrix (independent drivers).
    pub fn identity(dim: usize) -> Self {
        Self {
            matrix: DMatrix::identity(dim, dim),
        }
    }

    /// Identity matrix with the given off-diagonal pairs set symmetrically.
    ///
    /// ```
    /// use xrisk_models::model::CorrelationMatrix;
    ///
    /// let c = CorrelationMatrix::from_pairs(3, &[(0, 2, -0.3)]).unwrap();
    /// assert_eq!(c.get(2, 0), -0.3);
    /// ```
    pub fn from_pairs(dim: usize, pairs: &[(usize, usize, f64)]) -> Result<Self, CorrelationError> {
        let mut data = vec![0.0; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = 1.0;
        }
        for &(i, j, rho) in pairs {
            if i >= dim || j >= dim {
                return Err(CorrelationError::InvalidDimensions {
                    expected: dim,
                    got: i.max(j) + 1,
                });
            }
            if i != j {
                data[i * dim + j] = rho;
                data[j * dim + i] = rho;
            }
        }
        Self::new(&data, dim)
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    /// Element at (i, j).
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[(i, j)]
    }

    /// Underlying matrix.
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Square root factor of the matrix.
    pub fn factor(&self, salvage: SalvageMethod) -> Result<CorrelationFactor, ModelError> {
        let root = pseudo_sqrt(&self.matrix, salvage)
            .map_err(|_| ModelError::Correlation(CorrelationError::NotPositiveSemiDefinite))?;
        Ok(CorrelationFactor { root })
    }
}

/// Square root `S` of a correlation matrix.
#[derive(Clone, Debug)]
pub struct CorrelationFactor {
    root: DMatrix<f64>,
}

impl CorrelationFactor {
    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.root.nrows()
    }

    /// Writes `S·z` into `out`.
    pub fn transform_into(&self, z: &[f64], out: &mut [f64]) {
        let n = self.dim();
        for (i, o) in out.iter_mut().enumerate().take(n) {
            let mut sum = 0.0;
            for (j, zj) in z.iter().enumerate().take(n) {
                sum += self.root[(i, j)] * zj;
            }
            *o = sum;
        }
    }

    /// Returns `S·z`.
    pub fn transform(&self, z: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.dim()];
        self.transform_into(z, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_valid_correlation() {
        let c = CorrelationMatrix::new(&[1.0, 0.5, 0.5, 1.0], 2).unwrap();
        assert_eq!(c.dim(), 2);
        assert_eq!(c.get(0, 1), 0.5);
    }

    #[test]
    fn test_invalid_diagonal() {
        let r = CorrelationMatrix::new(&[1.0, 0.5, 0.5, 0.9], 2);
        assert!(matches!(r, Err(CorrelationError::InvalidDiagonal { index: 1, .. })));
    }

    #[test]
    fn test_out_of_range() {
        let r = CorrelationMatrix::new(&[1.0, 1.5, 1.5, 1.0], 2);
        assert!(matches!(r, Err(CorrelationError::OutOfRange { .. })));
    }

    #[test]
    fn test_not_symmetric() {
        let r = CorrelationMatrix::new(&[1.0, 0.5, 0.4, 1.0], 2);
        assert!(matches!(r, Err(CorrelationError::NotSymmetric { i: 0, j: 1 })));
    }

    #[test]
    fn test_factor_reproduces_correlation() {
        let c = CorrelationMatrix::from_pairs(2, &[(0, 1, 0.6)]).unwrap();
        let f = c.factor(SalvageMethod::default()).unwrap();
        // second column of S·Sᵀ from unit vectors
        let w0 = f.transform(&[1.0, 0.0]);
        let w1 = f.transform(&[0.0, 1.0]);
        let c01 = w0[0] * w0[1] + w1[0] * w1[1];
        assert_relative_eq!(c01, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_perfect_correlation_is_accepted() {
        let c = CorrelationMatrix::from_pairs(2, &[(0, 1, 1.0)]).unwrap();
        assert!(c.factor(SalvageMethod::default()).is_ok());
    }

    #[test]
    fn test_indefinite_is_rejected() {
        let c = CorrelationMatrix::from_pairs(3, &[(0, 1, 0.9), (0, 2, 0.9), (1, 2, -0.9)]).unwrap();
        assert!(c.factor(SalvageMethod::default()).is_err());
    }
}
