//! Sensitivity records.

use std::cmp::Ordering;
use std::fmt;

use xrisk_sim::scenario::RiskFactorKey;

/// One delta/gamma or cross-gamma sensitivity of a trade.
///
/// Delta/gamma records have no second key. Cross-gamma records carry the
/// second factor in `key_2` and the cross gamma in `gamma`; their `delta`
/// is ignored.
///
/// Records order by `(trade_id, key_1, key_2)`, with delta/gamma records
/// (no `key_2`) before the cross gammas of the same factor. The remaining
/// fields break ties, floats compared with `total_cmp`, so the ordering is
/// consistent with equality.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensitivityRecord {
    /// Trade id
    pub trade_id: String,
    /// Whether the sensitivity is w.r.t. par quotes
    pub is_par: bool,
    /// First risk factor
    pub key_1: RiskFactorKey,
    /// Free-text description of the first shift
    pub desc_1: String,
    /// First shift size
    pub shift_1: f64,
    /// Second risk factor, cross gammas only
    pub key_2: Option<RiskFactorKey>,
    /// Free-text description of the second shift
    pub desc_2: String,
    /// Second shift size
    pub shift_2: f64,
    /// Currency of the amounts
    pub currency: String,
    /// Unshifted NPV
    pub base_npv: f64,
    /// Delta
    pub delta: f64,
    /// Gamma, or cross gamma when `key_2` is set
    pub gamma: f64,
}

impl SensitivityRecord {
    /// Delta/gamma record.
    pub fn delta_gamma(trade_id: impl Into<String>, key: RiskFactorKey, delta: f64, gamma: f64) -> Self {
        Self {
            trade_id: trade_id.into(),
            is_par: false,
            key_1: key,
            desc_1: String::new(),
            shift_1: 0.0,
            key_2: None,
            desc_2: String::new(),
            shift_2: 0.0,
            currency: String::new(),
            base_npv: 0.0,
            delta,
            gamma,
        }
    }

    /// Cross-gamma record.
    pub fn cross_gamma(trade_id: impl Into<String>, key_1: RiskFactorKey, key_2: RiskFactorKey, gamma: f64) -> Self {
        Self {
            key_2: Some(key_2),
            ..Self::delta_gamma(trade_id, key_1, 0.0, gamma)
        }
    }

    /// Whether this is a cross-gamma record.
    #[inline]
    pub fn is_cross_gamma(&self) -> bool {
        self.key_2.is_some()
    }

    fn float_fields(&self) -> [f64; 5] {
        [self.shift_1, self.shift_2, self.base_npv, self.delta, self.gamma]
    }
}

impl PartialEq for SensitivityRecord {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SensitivityRecord {}

impl PartialOrd for SensitivityRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SensitivityRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.trade_id
            .cmp(&other.trade_id)
            .then_with(|| self.key_1.cmp(&other.key_1))
            .then_with(|| self.key_2.cmp(&other.key_2))
            .then_with(|| self.is_par.cmp(&other.is_par))
            .then_with(|| self.desc_1.cmp(&other.desc_1))
            .then_with(|| self.desc_2.cmp(&other.desc_2))
            .then_with(|| self.currency.cmp(&other.currency))
            .then_with(|| {
                self.float_fields()
                    .iter()
                    .zip(other.float_fields().iter())
                    .map(|(a, b)| a.total_cmp(b))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    }
}

impl fmt::Display for SensitivityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key_2 {
            Some(k2) => write!(f, "[{}: {} x {}, gamma {}]", self.trade_id, self.key_1, k2, self.gamma),
            None => write!(
                f,
                "[{}: {}, delta {}, gamma {}]",
                self.trade_id, self.key_1, self.delta, self.gamma
            ),
        }
    }
}

/// CVA sensitivity of a netting set to one risk factor.
///
/// Ordered by `(netting_set_id, key)` then the other fields, floats via
/// `total_cmp`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CvaSensitivityRecord {
    /// Netting set id
    pub netting_set_id: String,
    /// Risk factor
    pub key: RiskFactorKey,
    /// Shift type, e.g. `Absolute` or `Relative`
    pub shift_type: String,
    /// Shift size
    pub shift_size: f64,
    /// Currency of the amounts
    pub currency: String,
    /// Unshifted CVA
    pub base_cva: f64,
    /// CVA delta
    pub delta: f64,
}

impl PartialEq for CvaSensitivityRecord {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CvaSensitivityRecord {}

impl PartialOrd for CvaSensitivityRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CvaSensitivityRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.netting_set_id
            .cmp(&other.netting_set_id)
            .then_with(|| self.key.cmp(&other.key))
            .then_with(|| self.shift_type.cmp(&other.shift_type))
            .then_with(|| self.currency.cmp(&other.currency))
            .then_with(|| self.shift_size.total_cmp(&other.shift_size))
            .then_with(|| self.base_cva.total_cmp(&other.base_cva))
            .then_with(|| self.delta.total_cmp(&other.delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrisk_sim::scenario::KeyType;

    fn key(i: usize) -> RiskFactorKey {
        RiskFactorKey::new(KeyType::DiscountCurve, "EUR", i)
    }

    #[test]
    fn test_delta_record_sorts_before_cross_gamma() {
        let mut records = vec![
            SensitivityRecord::cross_gamma("T1", key(0), key(1), 0.5),
            SensitivityRecord::delta_gamma("T1", key(1), 1.0, 0.1),
            SensitivityRecord::delta_gamma("T1", key(0), 2.0, 0.2),
        ];
        records.sort();
        assert_eq!(records[0].key_1, key(0));
        assert!(!records[0].is_cross_gamma());
        assert!(records[1].is_cross_gamma());
        assert_eq!(records[2].key_1, key(1));
    }

    #[test]
    fn test_nan_fields_compare_equal_to_themselves() {
        let a = SensitivityRecord::delta_gamma("T1", key(0), f64::NAN, 0.0);
        assert_eq!(a, a.clone());
        let b = SensitivityRecord::delta_gamma("T1", key(0), 1.0, 0.0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_cva_record_order() {
        let r = |ns: &str, delta: f64| CvaSensitivityRecord {
            netting_set_id: ns.into(),
            key: key(0),
            shift_type: "Absolute".into(),
            shift_size: 1e-4,
            currency: "EUR".into(),
            base_cva: 10.0,
            delta,
        };
        assert!(r("A", 5.0) < r("B", 1.0));
        assert!(r("A", 1.0) < r("A", 2.0));
        assert_eq!(r("A", 1.0), r("A", 1.0));
    }
}
