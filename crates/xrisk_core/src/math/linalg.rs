//! Covariance matrix factorisation and repair.
//!
//! Covariance matrices assembled from model integrals or from market data
//! are symmetric by construction but can come out slightly indefinite from
//! floating-point error or from inconsistent inputs. Two policies apply:
//!
//! - [`SalvageMethod::Strict`]: negative eigenvalues within `tolerance` of
//!   zero are clamped, anything below is an error
//! - [`SalvageMethod::Spectral`]: every negative eigenvalue is floored at
//!   zero (logged), and the matrix is rebuilt from the spectral decomposition

use nalgebra::{DMatrix, SymmetricEigen};
use tracing::warn;

use super::error::MathError;

/// Policy for handling non positive semi-definite matrices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SalvageMethod {
    /// Clamp eigenvalues in `[-tolerance, 0)`; fail below.
    Strict {
        /// Clamp tolerance
        tolerance: f64,
    },
    /// Floor all negative eigenvalues at zero.
    Spectral,
}

impl Default for SalvageMethod {
    fn default() -> Self {
        SalvageMethod::Strict { tolerance: 1.0e-10 }
    }
}

/// Checks that `m` is square and symmetric within `tolerance`.
pub fn check_symmetric(m: &DMatrix<f64>, tolerance: f64) -> Result<(), MathError> {
    if m.nrows() != m.ncols() {
        return Err(MathError::DimensionMismatch {
            context: "square matrix".to_string(),
            expected: m.nrows(),
            got: m.ncols(),
        });
    }
    for i in 0..m.nrows() {
        for j in (i + 1)..m.ncols() {
            let (a, b) = (m[(i, j)], m[(j, i)]);
            if (a - b).abs() > tolerance * (1.0 + a.abs().max(b.abs())) {
                return Err(MathError::NotSymmetric { i, j, a, b });
            }
        }
    }
    Ok(())
}

/// Repairs a symmetric matrix according to `method`.
///
/// Returns the (possibly rebuilt) matrix and a flag telling whether any
/// eigenvalue was modified.
pub fn salvage_covariance(
    m: &DMatrix<f64>,
    method: SalvageMethod,
) -> Result<(DMatrix<f64>, bool), MathError> {
    check_symmetric(m, 1.0e-12)?;
    if m.nrows() == 0 {
        return Ok((m.clone(), false));
    }
    let eigen = SymmetricEigen::new(m.clone());
    let min_eigen = eigen.eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
    if min_eigen >= 0.0 {
        return Ok((m.clone(), false));
    }
    match method {
        SalvageMethod::Strict { tolerance } if min_eigen < -tolerance => {
            return Err(MathError::NotPositiveSemiDefinite {
                eigenvalue: min_eigen,
                tolerance,
            });
        }
        SalvageMethod::Spectral => {
            warn!(min_eigenvalue = min_eigen, "salvaging covariance matrix by spectral truncation");
        }
        SalvageMethod::Strict { .. } => {}
    }
    let floored = eigen.eigenvalues.map(|l| l.max(0.0));
    let rebuilt = &eigen.eigenvectors
        * DMatrix::from_diagonal(&floored)
        * eigen.eigenvectors.transpose();
    Ok((rebuilt, true))
}

/// Returns `S` with `S Sᵀ = m` after salvage.
///
/// Uses a Cholesky factor when the matrix is positive definite and falls
/// back to the spectral root `V √Λ Vᵀ` otherwise (e.g. for deterministic
/// components with zero variance).
///
/// # Examples
///
/// ```
/// use nalgebra::DMatrix;
/// use xrisk_core::math::{pseudo_sqrt, SalvageMethod};
///
/// let m = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 2.0]);
/// let s = pseudo_sqrt(&m, SalvageMethod::default()).unwrap();
/// let back = &s * s.transpose();
/// assert!((back - m).abs().max() < 1e-12);
/// ```
pub fn pseudo_sqrt(m: &DMatrix<f64>, method: SalvageMethod) -> Result<DMatrix<f64>, MathError> {
    let (salvaged, modified) = salvage_covariance(m, method)?;
    if !modified {
        if let Some(chol) = salvaged.clone().cholesky() {
            return Ok(chol.l());
        }
    }
    let eigen = SymmetricEigen::new(salvaged);
    let roots = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
    Ok(&eigen.eigenvectors * DMatrix::from_diagonal(&roots) * eigen.eigenvectors.transpose())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singular_matrix_pseudo_sqrt() {
        // perfectly correlated factors plus a deterministic one
        let m = DMatrix::from_row_slice(3, 3, &[1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let s = pseudo_sqrt(&m, SalvageMethod::default()).unwrap();
        assert!((&s * s.transpose() - &m).abs().max() < 1e-12);
    }

    #[test]
    fn test_strict_rejects_indefinite() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(matches!(
            salvage_covariance(&m, SalvageMethod::default()),
            Err(MathError::NotPositiveSemiDefinite { .. })
        ));
    }

    #[test]
    fn test_spectral_salvage_is_psd() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let (fixed, modified) = salvage_covariance(&m, SalvageMethod::Spectral).unwrap();
        assert!(modified);
        let eig = SymmetricEigen::new(fixed);
        assert!(eig.eigenvalues.iter().all(|&l| l > -1e-12));
    }

    #[test]
    fn test_not_symmetric() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.4, 1.0]);
        assert!(matches!(
            check_symmetric(&m, 1e-12),
            Err(MathError::NotSymmetric { i: 0, j: 1, .. })
        ));
    }
}
