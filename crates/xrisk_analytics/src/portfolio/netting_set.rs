//! Netting sets, CSA terms and collateral balances.

use std::fmt;
use std::str::FromStr;

use super::error::PortfolioError;
use super::ids::{CounterpartyId, NettingSetId};

/// How margin call settlement is lagged relative to the call date.
///
/// With `Symmetric` both directions settle after the margin period of
/// risk. `AsymmetricCva` settles our returns of collateral immediately,
/// `AsymmetricDva` settles calls on the counterparty immediately, and
/// `NoLag` settles everything on the call date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CalculationType {
    /// Both directions lagged by the MPoR.
    #[default]
    Symmetric,
    /// Margin we post settles immediately.
    AsymmetricCva,
    /// Margin we receive settles immediately.
    AsymmetricDva,
    /// No settlement lag.
    NoLag,
}

impl CalculationType {
    /// Standard name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationType::Symmetric => "Symmetric",
            CalculationType::AsymmetricCva => "AsymmetricCVA",
            CalculationType::AsymmetricDva => "AsymmetricDVA",
            CalculationType::NoLag => "NoLag",
        }
    }

    /// Settlement lag in days for a margin of the given sign.
    pub fn settlement_lag(&self, margin: f64, mpor_days: u32) -> i64 {
        let immediate = match self {
            CalculationType::NoLag => true,
            CalculationType::AsymmetricDva => margin > 0.0,
            CalculationType::AsymmetricCva => margin < 0.0,
            CalculationType::Symmetric => false,
        };
        if immediate {
            0
        } else {
            i64::from(mpor_days)
        }
    }
}

impl fmt::Display for CalculationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalculationType {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Symmetric" => Ok(CalculationType::Symmetric),
            "AsymmetricCVA" => Ok(CalculationType::AsymmetricCva),
            "AsymmetricDVA" => Ok(CalculationType::AsymmetricDva),
            "NoLag" => Ok(CalculationType::NoLag),
            other => Err(PortfolioError::UnknownCalculationType(other.to_string())),
        }
    }
}

/// Credit support annex terms of a netting set.
///
/// Amounts are in the CSA currency. Built with [`CsaDetails::new`] and the
/// `with_*` setters; [`CsaDetails::validate`] runs when the CSA is attached
/// to a [`NettingSetDefinition`].
///
/// # Examples
///
/// ```
/// use xrisk_analytics::portfolio::{CalculationType, CsaDetails};
///
/// let csa = CsaDetails::new("EUR")
///     .with_thresholds(1.0e6, 0.5e6)
///     .with_mta(1.0e5, 1.0e5)
///     .with_mpor_days(10)
///     .with_calculation_type(CalculationType::NoLag);
/// assert!(csa.validate("NS1").is_ok());
/// assert_eq!(csa.threshold_rcv(), 0.5e6);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CsaDetails {
    currency: String,
    threshold_pay: f64,
    threshold_rcv: f64,
    mta_pay: f64,
    mta_rcv: f64,
    independent_amount_held: f64,
    mpor_days: u32,
    margin_call_frequency_days: u32,
    calculation_type: CalculationType,
    collat_spread_pay: f64,
    collat_spread_rcv: f64,
    index: Option<String>,
}

impl CsaDetails {
    /// Default margin period of risk in calendar days.
    pub const DEFAULT_MPOR_DAYS: u32 = 14;

    /// Zero-threshold, zero-MTA, daily-call CSA in `currency`.
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            threshold_pay: 0.0,
            threshold_rcv: 0.0,
            mta_pay: 0.0,
            mta_rcv: 0.0,
            independent_amount_held: 0.0,
            mpor_days: Self::DEFAULT_MPOR_DAYS,
            margin_call_frequency_days: 1,
            calculation_type: CalculationType::Symmetric,
            collat_spread_pay: 0.0,
            collat_spread_rcv: 0.0,
            index: None,
        }
    }

    /// Sets the thresholds we and the counterparty grant.
    pub fn with_thresholds(mut self, pay: f64, rcv: f64) -> Self {
        self.threshold_pay = pay;
        self.threshold_rcv = rcv;
        self
    }

    /// Sets the minimum transfer amounts.
    pub fn with_mta(mut self, pay: f64, rcv: f64) -> Self {
        self.mta_pay = pay;
        self.mta_rcv = rcv;
        self
    }

    /// Sets the independent amount held (negative if posted).
    pub fn with_independent_amount(mut self, held: f64) -> Self {
        self.independent_amount_held = held;
        self
    }

    /// Sets the margin period of risk.
    pub fn with_mpor_days(mut self, days: u32) -> Self {
        self.mpor_days = days;
        self
    }

    /// Sets the margin call frequency.
    pub fn with_margin_call_frequency_days(mut self, days: u32) -> Self {
        self.margin_call_frequency_days = days;
        self
    }

    /// Sets the settlement lag treatment.
    pub fn with_calculation_type(mut self, calculation_type: CalculationType) -> Self {
        self.calculation_type = calculation_type;
        self
    }

    /// Sets the spreads paid on collateral we post and we hold.
    pub fn with_collateral_spreads(mut self, pay: f64, rcv: f64) -> Self {
        self.collat_spread_pay = pay;
        self.collat_spread_rcv = rcv;
        self
    }

    /// Sets the collateral compounding index.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Checks that amounts are non-negative and frequencies positive.
    ///
    /// # Errors
    /// `PortfolioError::InvalidCsa` naming `netting_set` and the field.
    pub fn validate(&self, netting_set: &str) -> Result<(), PortfolioError> {
        let fail = |message: String| PortfolioError::InvalidCsa {
            netting_set: netting_set.to_string(),
            message,
        };
        let amounts = [
            ("threshold_pay", self.threshold_pay),
            ("threshold_rcv", self.threshold_rcv),
            ("mta_pay", self.mta_pay),
            ("mta_rcv", self.mta_rcv),
            ("collat_spread_pay", self.collat_spread_pay),
            ("collat_spread_rcv", self.collat_spread_rcv),
        ];
        for (name, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(fail(format!("{name} must be non-negative, got {value}")));
            }
        }
        if !self.independent_amount_held.is_finite() {
            return Err(fail("independent amount must be finite".into()));
        }
        if self.margin_call_frequency_days == 0 {
            return Err(fail("margin call frequency must be at least one day".into()));
        }
        if self.currency.is_empty() {
            return Err(fail("CSA currency is empty".into()));
        }
        Ok(())
    }

    /// CSA currency.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Threshold granted to us.
    #[inline]
    pub fn threshold_pay(&self) -> f64 {
        self.threshold_pay
    }

    /// Threshold granted to the counterparty.
    #[inline]
    pub fn threshold_rcv(&self) -> f64 {
        self.threshold_rcv
    }

    /// Minimum transfer amount for margin we post.
    #[inline]
    pub fn mta_pay(&self) -> f64 {
        self.mta_pay
    }

    /// Minimum transfer amount for margin we receive.
    #[inline]
    pub fn mta_rcv(&self) -> f64 {
        self.mta_rcv
    }

    /// Independent amount held.
    #[inline]
    pub fn independent_amount_held(&self) -> f64 {
        self.independent_amount_held
    }

    /// Margin period of risk in days.
    #[inline]
    pub fn mpor_days(&self) -> u32 {
        self.mpor_days
    }

    /// Margin call frequency in days.
    #[inline]
    pub fn margin_call_frequency_days(&self) -> u32 {
        self.margin_call_frequency_days
    }

    /// Settlement lag treatment.
    #[inline]
    pub fn calculation_type(&self) -> CalculationType {
        self.calculation_type
    }

    /// Spread on collateral we post.
    #[inline]
    pub fn collat_spread_pay(&self) -> f64 {
        self.collat_spread_pay
    }

    /// Spread on collateral we hold.
    #[inline]
    pub fn collat_spread_rcv(&self) -> f64 {
        self.collat_spread_rcv
    }

    /// Collateral compounding index.
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }
}

/// A netting set: counterparty plus optional CSA.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NettingSetDefinition {
    id: NettingSetId,
    counterparty: CounterpartyId,
    csa: Option<CsaDetails>,
}

impl NettingSetDefinition {
    /// Uncollateralised netting set.
    pub fn new(id: NettingSetId, counterparty: CounterpartyId) -> Self {
        Self {
            id,
            counterparty,
            csa: None,
        }
    }

    /// Attaches a validated CSA.
    pub fn with_csa(mut self, csa: CsaDetails) -> Result<Self, PortfolioError> {
        csa.validate(self.id.as_str())?;
        self.csa = Some(csa);
        Ok(self)
    }

    /// Netting set id.
    #[inline]
    pub fn id(&self) -> &NettingSetId {
        &self.id
    }

    /// Counterparty id.
    #[inline]
    pub fn counterparty(&self) -> &CounterpartyId {
        &self.counterparty
    }

    /// CSA, if collateralised.
    #[inline]
    pub fn csa(&self) -> Option<&CsaDetails> {
        self.csa.as_ref()
    }
}

/// Collateral held at the as-of date for one netting set.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollateralBalance {
    /// Netting set id
    pub netting_set_id: NettingSetId,
    /// Variation margin held (negative if posted), CSA currency
    pub variation_margin: f64,
    /// Initial margin held, CSA currency
    pub initial_margin: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculation_type_round_trip_names() {
        for t in [
            CalculationType::Symmetric,
            CalculationType::AsymmetricCva,
            CalculationType::AsymmetricDva,
            CalculationType::NoLag,
        ] {
            assert_eq!(t.as_str().parse::<CalculationType>().unwrap(), t);
        }
        assert!("Lagged".parse::<CalculationType>().is_err());
    }

    #[test]
    fn test_settlement_lag() {
        assert_eq!(CalculationType::Symmetric.settlement_lag(1.0, 10), 10);
        assert_eq!(CalculationType::NoLag.settlement_lag(-1.0, 10), 0);
        assert_eq!(CalculationType::AsymmetricDva.settlement_lag(1.0, 10), 0);
        assert_eq!(CalculationType::AsymmetricDva.settlement_lag(-1.0, 10), 10);
        assert_eq!(CalculationType::AsymmetricCva.settlement_lag(-1.0, 10), 0);
        assert_eq!(CalculationType::AsymmetricCva.settlement_lag(1.0, 10), 10);
    }

    #[test]
    fn test_negative_mta_rejected() {
        let csa = CsaDetails::new("EUR").with_mta(-1.0, 0.0);
        let err = NettingSetDefinition::new("NS".into(), "CP".into()).with_csa(csa).unwrap_err();
        assert!(err.to_string().contains("mta_pay"));
    }

    #[test]
    fn test_zero_call_frequency_rejected() {
        let csa = CsaDetails::new("EUR").with_margin_call_frequency_days(0);
        assert!(csa.validate("NS").is_err());
    }
}
