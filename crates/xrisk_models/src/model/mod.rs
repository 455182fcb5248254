//! Cross-asset model: LGM rates, Black-Scholes FX and equity, CIR++ credit
//! coupled through one instantaneous correlation matrix.
//!
//! ## Indexing
//!
//! Brownian drivers (and correlation rows) are ordered
//! `IR(0..n_ir) | FX(0..n_fx) | EQ(0..n_eq) | CR(0..n_cr)`, one driver per
//! component. The state vector uses the same order, except that a CIR++
//! component carries two state variables: the intensity `y` and the
//! pathwise survival `S`.
//!
//! FX component `i` quotes currency `irs[i + 1]` against the domestic
//! currency `irs[0]`.

mod analytics;
mod cirpp;
mod correlation;
mod lgm;

use std::sync::Arc;

use xrisk_core::math::{GaussLegendre, Integrator, SalvageMethod};

use crate::error::ModelError;
use crate::parametrization::{
    CirppParametrization, EqBsParametrization, FxBsParametrization, IrLgmParametrization,
};

pub use correlation::{CorrelationError, CorrelationFactor, CorrelationMatrix};

/// Horizon up to which the sign of `H'` is checked.
const H_PRIME_CHECK_HORIZON: f64 = 100.0;

/// Asset class of a model component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssetType {
    /// LGM interest rate
    Ir,
    /// Black-Scholes FX
    Fx,
    /// Black-Scholes equity
    Eq,
    /// CIR++ credit
    Cr,
}

impl AssetType {
    /// Short label.
    pub fn name(&self) -> &'static str {
        match self {
            AssetType::Ir => "IR",
            AssetType::Fx => "FX",
            AssetType::Eq => "EQ",
            AssetType::Cr => "CR",
        }
    }
}

/// Cross-asset model.
///
/// Parametrizations are shared read-only; a model value is an immutable
/// snapshot once built, and re-parametrizing (e.g. calibration) produces
/// a new snapshot through [`CrossAssetModel::with_fx_parametrization`].
#[derive(Clone, Debug)]
pub struct CrossAssetModel {
    irs: Vec<Arc<dyn IrLgmParametrization>>,
    fxs: Vec<Arc<dyn FxBsParametrization>>,
    eqs: Vec<Arc<dyn EqBsParametrization>>,
    crs: Vec<Arc<CirppParametrization>>,
    correlation: CorrelationMatrix,
    correlation_factor: CorrelationFactor,
    eq_currency: Vec<usize>,
    cr_currency: Vec<usize>,
    breakpoints: Vec<f64>,
    integrator: Arc<dyn Integrator>,
    salvage: SalvageMethod,
}

impl CrossAssetModel {
    /// Builds and validates the model.
    ///
    /// # Errors
    /// - no IR component, or duplicate currencies
    /// - FX count not `irs.len() - 1`, or FX foreign currency not matching
    ///   the IR component it refers to
    /// - equity or credit currency not among the IR currencies
    /// - correlation dimension not equal to the number of components, or a
    ///   correlation matrix that is not positive semi-definite
    /// - an `H'` changing sign
    pub fn new(
        irs: Vec<Arc<dyn IrLgmParametrization>>,
        fxs: Vec<Arc<dyn FxBsParametrization>>,
        eqs: Vec<Arc<dyn EqBsParametrization>>,
        crs: Vec<Arc<CirppParametrization>>,
        correlation: CorrelationMatrix,
    ) -> Result<Self, ModelError> {
        Self::with_settings(
            irs,
            fxs,
            eqs,
            crs,
            correlation,
            Arc::new(GaussLegendre::default()),
            SalvageMethod::default(),
        )
    }

    /// Builds the model with an explicit integrator and salvage policy.
    ///
    /// The default is a 16-point Gauss-Legendre rule per smooth piece;
    /// rules that evaluate interval endpoints (Simpson) see the next
    /// piece's value at a right-hand breakpoint and converge slowly there.
    pub fn with_settings(
        irs: Vec<Arc<dyn IrLgmParametrization>>,
        fxs: Vec<Arc<dyn FxBsParametrization>>,
        eqs: Vec<Arc<dyn EqBsParametrization>>,
        crs: Vec<Arc<CirppParametrization>>,
        correlation: CorrelationMatrix,
        integrator: Arc<dyn Integrator>,
        salvage: SalvageMethod,
    ) -> Result<Self, ModelError> {
        if irs.is_empty() {
            return Err(ModelError::config("CrossAssetModel", "at least one IR component required"));
        }
        for (i, ir) in irs.iter().enumerate() {
            if irs[..i].iter().any(|other| other.currency() == ir.currency()) {
                return Err(ModelError::config(
                    ir.currency(),
                    "duplicate IR currency in cross-asset model",
                ));
            }
        }
        if fxs.len() + 1 != irs.len() {
            return Err(ModelError::config(
                "CrossAssetModel",
                format!("{} FX components for {} currencies, expected {}", fxs.len(), irs.len(), irs.len() - 1),
            ));
        }
        for (i, fx) in fxs.iter().enumerate() {
            if fx.foreign_currency() != irs[i + 1].currency() {
                return Err(ModelError::config(
                    fx.foreign_currency(),
                    format!("FX component {i} must quote {}", irs[i + 1].currency()),
                ));
            }
        }
        let currency_of = |ccy: &str, entity: &str| {
            irs.iter().position(|ir| ir.currency() == ccy).ok_or_else(|| {
                ModelError::config(entity, format!("currency {ccy} is not modelled"))
            })
        };
        let eq_currency = eqs
            .iter()
            .map(|eq| currency_of(eq.currency(), eq.name()))
            .collect::<Result<Vec<_>, _>>()?;
        let cr_currency = crs
            .iter()
            .map(|cr| currency_of(cr.currency(), cr.name()))
            .collect::<Result<Vec<_>, _>>()?;

        let components = irs.len() + fxs.len() + eqs.len() + crs.len();
        if correlation.dim() != components {
            return Err(ModelError::Correlation(CorrelationError::InvalidDimensions {
                expected: components,
                got: correlation.dim(),
            }));
        }
        let correlation_factor = correlation.factor(salvage)?;

        let mut model = Self {
            irs,
            fxs,
            eqs,
            crs,
            correlation,
            correlation_factor,
            eq_currency,
            cr_currency,
            breakpoints: Vec::new(),
            integrator,
            salvage,
        };
        model.update()?;
        Ok(model)
    }

    /// Recomputes the derived state: the correlation factor, the merged
    /// parameter breakpoints and the `H'` sign check.
    pub fn update(&mut self) -> Result<(), ModelError> {
        self.correlation_factor = self.correlation.factor(self.salvage)?;
        let mut times: Vec<f64> = self
            .irs
            .iter()
            .flat_map(|p| p.breakpoints().iter().copied())
            .chain(self.fxs.iter().flat_map(|p| p.breakpoints().iter().copied()))
            .chain(self.eqs.iter().flat_map(|p| p.breakpoints().iter().copied()))
            .collect();
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        self.breakpoints = times;
        for ir in &self.irs {
            self.check_h_prime_sign(ir.as_ref())?;
        }
        Ok(())
    }

    fn check_h_prime_sign(&self, ir: &dyn IrLgmParametrization) -> Result<(), ModelError> {
        let sign = ir.h_prime(0.0).signum();
        let check_times = ir
            .breakpoints()
            .iter()
            .copied()
            .chain([H_PRIME_CHECK_HORIZON]);
        for t in check_times {
            let hp = ir.h_prime(t);
            if hp == 0.0 || hp.signum() != sign {
                return Err(ModelError::config(
                    ir.currency(),
                    format!("H' changes sign or vanishes at t = {t}"),
                ));
            }
        }
        Ok(())
    }

    /// Returns a new snapshot with FX component `i` replaced.
    pub fn with_fx_parametrization(
        &self,
        i: usize,
        fx: Arc<dyn FxBsParametrization>,
    ) -> Result<Self, ModelError> {
        self.check_index(AssetType::Fx, i)?;
        if fx.foreign_currency() != self.fxs[i].foreign_currency() {
            return Err(ModelError::config(
                fx.foreign_currency(),
                format!("replacement for FX component {i} must quote {}", self.fxs[i].foreign_currency()),
            ));
        }
        let mut model = self.clone();
        model.fxs[i] = fx;
        model.update()?;
        Ok(model)
    }

    /// Number of IR components.
    pub fn n_ir(&self) -> usize {
        self.irs.len()
    }

    /// Number of FX components.
    pub fn n_fx(&self) -> usize {
        self.fxs.len()
    }

    /// Number of equity components.
    pub fn n_eq(&self) -> usize {
        self.eqs.len()
    }

    /// Number of credit components.
    pub fn n_cr(&self) -> usize {
        self.crs.len()
    }

    /// Number of components of the given kind.
    pub fn components(&self, asset: AssetType) -> usize {
        match asset {
            AssetType::Ir => self.n_ir(),
            AssetType::Fx => self.n_fx(),
            AssetType::Eq => self.n_eq(),
            AssetType::Cr => self.n_cr(),
        }
    }

    /// Errors unless `i` is a valid index for `asset`.
    pub fn check_index(&self, asset: AssetType, i: usize) -> Result<(), ModelError> {
        let size = self.components(asset);
        if i >= size {
            return Err(ModelError::IndexOutOfRange {
                what: asset.name(),
                index: i,
                size,
            });
        }
        Ok(())
    }

    /// Index of the Brownian driver (and correlation row) of a component.
    #[inline]
    pub fn component_index(&self, asset: AssetType, i: usize) -> usize {
        match asset {
            AssetType::Ir => i,
            AssetType::Fx => self.n_ir() + i,
            AssetType::Eq => self.n_ir() + self.n_fx() + i,
            AssetType::Cr => self.n_ir() + self.n_fx() + self.n_eq() + i,
        }
    }

    /// Index of the first state variable of a component.
    #[inline]
    pub fn state_index(&self, asset: AssetType, i: usize) -> usize {
        match asset {
            AssetType::Cr => self.n_ir() + self.n_fx() + self.n_eq() + 2 * i,
            _ => self.component_index(asset, i),
        }
    }

    /// State index of IR component `i`.
    pub fn ir_index(&self, i: usize) -> usize {
        self.state_index(AssetType::Ir, i)
    }

    /// State index of FX component `i`.
    pub fn fx_index(&self, i: usize) -> usize {
        self.state_index(AssetType::Fx, i)
    }

    /// State index of equity component `i`.
    pub fn eq_index(&self, i: usize) -> usize {
        self.state_index(AssetType::Eq, i)
    }

    /// State index of the intensity of credit component `i`; the pathwise
    /// survival follows at `cr_index(i) + 1`.
    pub fn cr_index(&self, i: usize) -> usize {
        self.state_index(AssetType::Cr, i)
    }

    /// Dimension of the state vector.
    pub fn state_size(&self) -> usize {
        self.n_ir() + self.n_fx() + self.n_eq() + 2 * self.n_cr()
    }

    /// Number of Brownian drivers.
    pub fn brownians(&self) -> usize {
        self.correlation.dim()
    }

    /// Correlation between two components.
    #[inline]
    pub fn correlation(&self, a: AssetType, i: usize, b: AssetType, j: usize) -> f64 {
        self.correlation
            .get(self.component_index(a, i), self.component_index(b, j))
    }

    /// Full correlation matrix.
    pub fn correlation_matrix(&self) -> &CorrelationMatrix {
        &self.correlation
    }

    /// Square root factor of the correlation matrix.
    pub fn correlation_factor(&self) -> &CorrelationFactor {
        &self.correlation_factor
    }

    /// IR parametrization `i`.
    pub fn ir(&self, i: usize) -> &Arc<dyn IrLgmParametrization> {
        &self.irs[i]
    }

    /// FX parametrization `i`.
    pub fn fx(&self, i: usize) -> &Arc<dyn FxBsParametrization> {
        &self.fxs[i]
    }

    /// Equity parametrization `i`.
    pub fn eq(&self, i: usize) -> &Arc<dyn EqBsParametrization> {
        &self.eqs[i]
    }

    /// Credit parametrization `i`.
    pub fn cr(&self, i: usize) -> &Arc<CirppParametrization> {
        &self.crs[i]
    }

    /// Domestic (base) currency.
    pub fn domestic_currency(&self) -> &str {
        self.irs[0].currency()
    }

    /// IR component index of a currency.
    pub fn currency_index(&self, ccy: &str) -> Option<usize> {
        self.irs.iter().position(|ir| ir.currency() == ccy)
    }

    /// Equity component index by name.
    pub fn eq_index_by_name(&self, name: &str) -> Option<usize> {
        self.eqs.iter().position(|eq| eq.name() == name)
    }

    /// Credit component index by name.
    pub fn cr_index_by_name(&self, name: &str) -> Option<usize> {
        self.crs.iter().position(|cr| cr.name() == name)
    }

    /// IR component index of the currency of equity `k`.
    pub fn eq_currency_index(&self, k: usize) -> usize {
        self.eq_currency[k]
    }

    /// IR component index of the currency of credit name `c`.
    pub fn cr_currency_index(&self, c: usize) -> usize {
        self.cr_currency[c]
    }

    /// Merged parameter breakpoints, sorted and unique.
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    /// Integrator used for the analytic moments.
    pub fn integrator(&self) -> &Arc<dyn Integrator> {
        &self.integrator
    }

    /// Covariance salvage policy.
    pub fn salvage(&self) -> SalvageMethod {
        self.salvage
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::parametrization::{FxBsConstant, LgmConstant};
    use xrisk_core::market_data::curves::FlatCurve;

    #[test]
    fn test_indexing() {
        let m = three_factor_model();
        assert_eq!(m.state_size(), 4);
        assert_eq!(m.brownians(), 4);
        assert_eq!(m.fx_index(0), 2);
        assert_eq!(m.eq_index(0), 3);
        assert_eq!(m.eq_currency_index(0), 1);
        assert_eq!(m.correlation(AssetType::Ir, 1, AssetType::Fx, 0), 0.3);

        let c = with_credit();
        assert_eq!(c.state_size(), 3);
        assert_eq!(c.brownians(), 2);
        assert_eq!(c.cr_index(0), 1);
    }

    #[test]
    fn test_rejects_fx_currency_mismatch() {
        let eur = LgmConstant::new("EUR", Arc::new(FlatCurve::new(0.02)), 0.01, 0.0).unwrap();
        let usd = LgmConstant::new("USD", Arc::new(FlatCurve::new(0.03)), 0.01, 0.0).unwrap();
        let fx = FxBsConstant::new("GBP", 0.9, 0.1).unwrap();
        let r = CrossAssetModel::new(
            vec![Arc::new(eur), Arc::new(usd)],
            vec![Arc::new(fx)],
            vec![],
            vec![],
            CorrelationMatrix::identity(3),
        );
        assert!(matches!(r, Err(ModelError::Configuration { ref entity, .. }) if entity == "GBP"));
    }

    #[test]
    fn test_rejects_correlation_dimension() {
        let eur = LgmConstant::new("EUR", Arc::new(FlatCurve::new(0.02)), 0.01, 0.0).unwrap();
        let r = CrossAssetModel::new(vec![Arc::new(eur)], vec![], vec![], vec![], CorrelationMatrix::identity(2));
        assert!(matches!(r, Err(ModelError::Correlation(_))));
    }

    #[test]
    fn test_with_fx_parametrization_checks_currency() {
        let m = three_factor_model();
        let other = FxBsConstant::new("JPY", 140.0, 0.1).unwrap();
        assert!(m.with_fx_parametrization(0, Arc::new(other)).is_err());
        let same = FxBsConstant::new("USD", 0.9, 0.15).unwrap();
        let m2 = m.with_fx_parametrization(0, Arc::new(same)).unwrap();
        assert_eq!(m2.fx(0).sigma(1.0), 0.15);
        assert_eq!(m.fx(0).sigma(1.0), 0.12);
    }

    #[test]
    fn test_index_checks() {
        let m = three_factor_model();
        assert!(m.check_index(AssetType::Eq, 0).is_ok());
        assert!(matches!(
            m.check_index(AssetType::Cr, 0),
            Err(ModelError::IndexOutOfRange { what: "CR", index: 0, size: 0 })
        ));
    }
}
