//! LGM closed-form numeraire and zero bonds.

use super::{AssetType, CrossAssetModel};
use crate::error::ModelError;

impl CrossAssetModel {
    /// LGM numeraire `N(t, z) = exp(H(t) z + ½ H(t)² ζ(t)) / P(0, t)` of the
    /// domestic currency.
    ///
    /// `N(0, 0) = 1`, and `P(0,T) = E[1 / N(T, z_T)]`.
    pub fn numeraire(&self, t: f64, z0: f64) -> Result<f64, ModelError> {
        let p = self.ir(0);
        let h = p.h(t);
        let df = p.term_structure().discount_factor(t)?;
        Ok((h * z0 + 0.5 * h * h * p.zeta(t)).exp() / df)
    }

    /// Zero bond `P_i(t, T)` of currency `i` given the LGM state `z_i(t)`.
    ///
    /// # Errors
    /// `ModelError::Configuration` for `T < t`.
    pub fn discount_bond(&self, i: usize, t: f64, big_t: f64, zi: f64) -> Result<f64, ModelError> {
        self.check_index(AssetType::Ir, i)?;
        if big_t < t {
            return Err(ModelError::config(
                self.ir(i).currency(),
                format!("discount bond maturity {big_t} before observation time {t}"),
            ));
        }
        let p = self.ir(i);
        let ts = p.term_structure();
        let (ht, hbig) = (p.h(t), p.h(big_t));
        Ok(ts.discount_factor(big_t)? / ts.discount_factor(t)?
            * (-(hbig - ht) * zi - 0.5 * (hbig * hbig - ht * ht) * p.zeta(t)).exp())
    }

    /// Domestic zero bond divided by the numeraire,
    /// `P(0,T) exp(-H(T) z - ½ H(T)² ζ(t))`.
    pub fn reduced_discount_bond(&self, t: f64, big_t: f64, z0: f64) -> Result<f64, ModelError> {
        if big_t < t {
            return Err(ModelError::config(
                self.domestic_currency(),
                format!("discount bond maturity {big_t} before observation time {t}"),
            ));
        }
        let p = self.ir(0);
        let h = p.h(big_t);
        Ok(p.term_structure().discount_factor(big_t)? * (-h * z0 - 0.5 * h * h * p.zeta(t)).exp())
    }
}
