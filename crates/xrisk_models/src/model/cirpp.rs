//! CIR++ conditional survival probabilities.

use super::{AssetType, CrossAssetModel};
use crate::error::ModelError;

impl CrossAssetModel {
    /// Survival probability `S_i(t, T)` of credit name `i` given the CIR
    /// intensity state `y(t)`.
    pub fn survival_probability(&self, i: usize, t: f64, big_t: f64, y: f64) -> Result<f64, ModelError> {
        self.check_index(AssetType::Cr, i)?;
        if big_t < t {
            return Err(ModelError::config(
                self.cr(i).name(),
                format!("survival horizon {big_t} before observation time {t}"),
            ));
        }
        self.cr(i).survival_probability(t, big_t, y.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::with_credit;
    use approx::assert_relative_eq;

    #[test]
    fn test_survival_today_matches_market() {
        let m = with_credit();
        let y0 = m.cr(0).y0();
        let s = m.survival_probability(0, 0.0, 4.0, y0).unwrap();
        assert_relative_eq!(s, (-0.08_f64).exp(), max_relative = 1e-12);
    }

    #[test]
    fn test_survival_decreases_in_intensity() {
        let m = with_credit();
        let low = m.survival_probability(0, 1.0, 3.0, 0.01).unwrap();
        let high = m.survival_probability(0, 1.0, 3.0, 0.05).unwrap();
        assert!(high < low);
        assert!(m.survival_probability(1, 1.0, 3.0, 0.01).is_err());
    }
}
