//! Counterparties and their credit parameters.

use super::error::PortfolioError;
use super::ids::CounterpartyId;

/// Credit parameters of a counterparty (or of ourselves, for DVA).
///
/// # Examples
///
/// ```
/// use xrisk_analytics::portfolio::CreditParams;
///
/// let params = CreditParams::new(0.02, 0.6).unwrap();
/// assert!((params.recovery_rate() - 0.4).abs() < 1e-15);
/// assert!(params.survival_prob(2.0) < params.survival_prob(1.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CreditParams {
    hazard_rate: f64,
    lgd: f64,
}

impl CreditParams {
    /// Creates credit parameters.
    ///
    /// # Errors
    ///
    /// `PortfolioError::InvalidCreditParams` for a negative or non-finite
    /// hazard rate, or an LGD outside `[0, 1]`.
    pub fn new(hazard_rate: f64, lgd: f64) -> Result<Self, PortfolioError> {
        if !hazard_rate.is_finite() || hazard_rate < 0.0 {
            return Err(PortfolioError::InvalidCreditParams(format!(
                "hazard rate must be non-negative, got {hazard_rate}"
            )));
        }
        if !(0.0..=1.0).contains(&lgd) {
            return Err(PortfolioError::InvalidCreditParams(format!(
                "LGD must be in [0, 1], got {lgd}"
            )));
        }
        Ok(Self { hazard_rate, lgd })
    }

    /// Annualised hazard rate.
    #[inline]
    pub fn hazard_rate(&self) -> f64 {
        self.hazard_rate
    }

    /// Loss given default.
    #[inline]
    pub fn lgd(&self) -> f64 {
        self.lgd
    }

    /// Recovery rate `1 - LGD`.
    #[inline]
    pub fn recovery_rate(&self) -> f64 {
        1.0 - self.lgd
    }

    /// Survival probability `exp(-λ t)`.
    #[inline]
    pub fn survival_prob(&self, t: f64) -> f64 {
        (-self.hazard_rate * t.max(0.0)).exp()
    }

    /// Default probability by `t`.
    #[inline]
    pub fn default_prob(&self, t: f64) -> f64 {
        1.0 - self.survival_prob(t)
    }

    /// Default probability in `(t1, t2]`.
    #[inline]
    pub fn marginal_default_prob(&self, t1: f64, t2: f64) -> f64 {
        (self.survival_prob(t1) - self.survival_prob(t2)).max(0.0)
    }
}

/// A counterparty with credit parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Counterparty {
    id: CounterpartyId,
    credit: CreditParams,
    name: Option<String>,
}

impl Counterparty {
    /// Creates a counterparty.
    pub fn new(id: CounterpartyId, credit: CreditParams) -> Self {
        Self { id, credit, name: None }
    }

    /// Sets a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Counterparty id.
    #[inline]
    pub fn id(&self) -> &CounterpartyId {
        &self.id
    }

    /// Credit parameters.
    #[inline]
    pub fn credit(&self) -> &CreditParams {
        &self.credit
    }

    /// Display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_bad_lgd() {
        assert!(CreditParams::new(0.01, 1.5).is_err());
        assert!(CreditParams::new(0.01, -0.1).is_err());
    }

    #[test]
    fn test_rejects_negative_hazard() {
        assert!(matches!(
            CreditParams::new(-0.01, 0.6),
            Err(PortfolioError::InvalidCreditParams(_))
        ));
    }

    #[test]
    fn test_marginal_default_prob_sums() {
        let c = CreditParams::new(0.03, 0.6).unwrap();
        let total = c.marginal_default_prob(0.0, 1.0) + c.marginal_default_prob(1.0, 3.0);
        assert_relative_eq!(total, c.default_prob(3.0), epsilon = 1e-15);
    }

    #[test]
    fn test_counterparty_name() {
        let cp = Counterparty::new("CP".into(), CreditParams::new(0.01, 0.6).unwrap()).with_name("Acme");
        assert_eq!(cp.name(), Some("Acme"));
        assert_eq!(cp.id().as_str(), "CP");
    }
}
