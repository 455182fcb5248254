//! Covariance repair ahead of VaR.

use std::fmt;

use nalgebra::DMatrix;
use xrisk_core::math::linalg::check_symmetric;
use xrisk_core::math::{pseudo_sqrt, salvage_covariance, SalvageMethod};

use crate::error::VarError;

/// Turns an input covariance into one usable for VaR.
pub trait CovarianceSalvage: Send + Sync + fmt::Debug {
    /// Repaired matrix and, when the salvage computes one, its pseudo
    /// square root.
    fn salvage(&self, omega: &DMatrix<f64>) -> Result<(DMatrix<f64>, Option<DMatrix<f64>>), VarError>;
}

/// Uses the matrix as given; only symmetry is checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSalvage;

impl CovarianceSalvage for NoSalvage {
    fn salvage(&self, omega: &DMatrix<f64>) -> Result<(DMatrix<f64>, Option<DMatrix<f64>>), VarError> {
        check_symmetric(omega, 1e-12)?;
        Ok((omega.clone(), None))
    }
}

/// Floors negative eigenvalues at zero and rebuilds the matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralSalvage;

impl CovarianceSalvage for SpectralSalvage {
    fn salvage(&self, omega: &DMatrix<f64>) -> Result<(DMatrix<f64>, Option<DMatrix<f64>>), VarError> {
        let (m, _) = salvage_covariance(omega, SalvageMethod::Spectral)?;
        let root = pseudo_sqrt(&m, SalvageMethod::Spectral)?;
        Ok((m, Some(root)))
    }
}

/// Fails unless `omega` is positive semi-definite within `1e-10`.
pub fn check_positive_semidefinite(omega: &DMatrix<f64>) -> Result<(), VarError> {
    salvage_covariance(omega, SalvageMethod::default())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::SymmetricEigen;

    #[test]
    fn test_spectral_salvage_makes_psd() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let (s, root) = SpectralSalvage.salvage(&m).unwrap();
        let min = SymmetricEigen::new(s.clone()).eigenvalues.min();
        assert!(min > -1e-12);
        let root = root.unwrap();
        assert!((&root * root.transpose() - &s).abs().max() < 1e-10);
    }

    #[test]
    fn test_no_salvage_keeps_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 2.0]);
        let (s, root) = NoSalvage.salvage(&m).unwrap();
        assert_eq!(s, m);
        assert!(root.is_none());
    }

    #[test]
    fn test_psd_check() {
        assert!(check_positive_semidefinite(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0])).is_err());
        assert!(check_positive_semidefinite(&DMatrix::identity(3, 3)).is_ok());
    }
}
