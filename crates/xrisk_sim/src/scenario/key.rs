//! Risk factor keys.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Kind of simulated market quantity.
///
/// Ordering follows declaration order, so scenario columns group by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum KeyType {
    /// Discount factor node of a currency's discount curve.
    DiscountCurve,
    /// Discount factor node of an index projection curve.
    IndexCurve,
    /// FX spot, base currency per unit of the named currency.
    FxSpot,
    /// Equity spot.
    EquitySpot,
    /// Survival probability node of a credit name.
    SurvivalProbability,
    /// Systemic credit factor.
    CreditState,
    /// Swaption volatility node.
    SwaptionVolatility,
    /// FX volatility node.
    FxVolatility,
}

impl KeyType {
    /// All key types in order.
    pub const ALL: [KeyType; 8] = [
        KeyType::DiscountCurve,
        KeyType::IndexCurve,
        KeyType::FxSpot,
        KeyType::EquitySpot,
        KeyType::SurvivalProbability,
        KeyType::CreditState,
        KeyType::SwaptionVolatility,
        KeyType::FxVolatility,
    ];

    /// Name used in scenario files.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::DiscountCurve => "DiscountCurve",
            KeyType::IndexCurve => "IndexCurve",
            KeyType::FxSpot => "FxSpot",
            KeyType::EquitySpot => "EquitySpot",
            KeyType::SurvivalProbability => "SurvivalProbability",
            KeyType::CreditState => "CreditState",
            KeyType::SwaptionVolatility => "SwaptionVolatility",
            KeyType::FxVolatility => "FxVolatility",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyType::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| SimError::config("KeyType", format!("unknown key type {s}")))
    }
}

/// Identifies one simulated market quantity, e.g. `DiscountCurve/USD/3`.
///
/// # Examples
///
/// ```
/// use xrisk_sim::scenario::{KeyType, RiskFactorKey};
///
/// let key = RiskFactorKey::new(KeyType::DiscountCurve, "USD", 3);
/// assert_eq!(key.to_string(), "DiscountCurve/USD/3");
/// assert_eq!("DiscountCurve/USD/3".parse::<RiskFactorKey>().unwrap(), key);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiskFactorKey {
    keytype: KeyType,
    name: String,
    index: usize,
}

impl RiskFactorKey {
    /// Creates a key.
    pub fn new(keytype: KeyType, name: impl Into<String>, index: usize) -> Self {
        Self {
            keytype,
            name: name.into(),
            index,
        }
    }

    /// Key type.
    #[inline]
    pub fn keytype(&self) -> KeyType {
        self.keytype
    }

    /// Curve, currency or asset name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node index.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for RiskFactorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.keytype, self.name, self.index)
    }
}

impl FromStr for RiskFactorKey {
    type Err = SimError;

    /// Parses `Type/Name/Index`; the name may itself contain `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || SimError::config("RiskFactorKey", format!("cannot parse key {s}"));
        let (keytype, rest) = s.split_once('/').ok_or_else(bad)?;
        let (name, index) = rest.rsplit_once('/').ok_or_else(bad)?;
        if name.is_empty() {
            return Err(bad());
        }
        Ok(Self {
            keytype: keytype.parse()?,
            name: name.to_string(),
            index: index.parse().map_err(|_| bad())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_name_with_separator() {
        let key: RiskFactorKey = "IndexCurve/EUR/ESTR/2".parse().unwrap();
        assert_eq!(key.name(), "EUR/ESTR");
        assert_eq!(key.index(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert!("DiscountCurve/USD".parse::<RiskFactorKey>().is_err());
        assert!("Discount/USD/1".parse::<RiskFactorKey>().is_err());
        assert!("FxSpot/USD/x".parse::<RiskFactorKey>().is_err());
        assert!("FxSpot//0".parse::<RiskFactorKey>().is_err());
    }

    #[test]
    fn test_orders_by_type_then_name_then_index() {
        let a = RiskFactorKey::new(KeyType::DiscountCurve, "USD", 10);
        let b = RiskFactorKey::new(KeyType::FxSpot, "AUD", 0);
        let c = RiskFactorKey::new(KeyType::DiscountCurve, "USD", 2);
        let mut keys = vec![b.clone(), a.clone(), c.clone()];
        keys.sort();
        assert_eq!(keys, vec![c, a, b]);
    }

    fn key_strategy() -> impl Strategy<Value = RiskFactorKey> {
        (0..KeyType::ALL.len(), "[A-Z]{3}(-[A-Z0-9]{1,4})?", 0usize..40)
            .prop_map(|(t, n, i)| RiskFactorKey::new(KeyType::ALL[t], n, i))
    }

    proptest! {
        #[test]
        fn prop_text_form_preserves_key_and_order(a in key_strategy(), b in key_strategy()) {
            let pa: RiskFactorKey = a.to_string().parse().unwrap();
            let pb: RiskFactorKey = b.to_string().parse().unwrap();
            prop_assert_eq!(&pa, &a);
            prop_assert_eq!(a.cmp(&b), pa.cmp(&pb));
        }
    }
}
