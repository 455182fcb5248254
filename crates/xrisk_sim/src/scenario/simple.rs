//! Scenarios: a numeraire plus values keyed by [`RiskFactorKey`].

use std::collections::BTreeMap;
use std::fmt;

use xrisk_core::types::Date;

use super::key::RiskFactorKey;
use crate::error::SimError;

/// Snapshot of the simulated market at one date on one path.
pub trait Scenario: Send + Sync + fmt::Debug {
    /// Scenario date.
    fn asof(&self) -> Date;

    /// Free-form label (sample number, historical window, ...).
    fn label(&self) -> &str;

    /// Numeraire value, strictly positive.
    fn numeraire(&self) -> f64;

    /// Adds or overwrites a value.
    fn add(&mut self, key: RiskFactorKey, value: f64);

    /// Whether the key is present.
    fn has(&self, key: &RiskFactorKey) -> bool;

    /// Value for a key.
    ///
    /// # Errors
    /// `SimError::MissingMarketData` naming the key.
    fn get(&self, key: &RiskFactorKey) -> Result<f64, SimError>;

    /// Keys in ascending order.
    fn keys(&self) -> Vec<RiskFactorKey>;

    /// Boxed copy.
    fn clone_box(&self) -> Box<dyn Scenario>;
}

impl Clone for Box<dyn Scenario> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// [`Scenario`] over an ordered map.
///
/// # Examples
///
/// ```
/// use xrisk_core::types::Date;
/// use xrisk_sim::scenario::{KeyType, RiskFactorKey, Scenario, SimpleScenario};
///
/// let asof = Date::from_ymd(2025, 1, 31).unwrap();
/// let mut s = SimpleScenario::new(asof, "1", 1.02).unwrap();
/// s.add(RiskFactorKey::new(KeyType::FxSpot, "USD", 0), 0.91);
/// assert_eq!(s.get(&RiskFactorKey::new(KeyType::FxSpot, "USD", 0)).unwrap(), 0.91);
/// assert!(SimpleScenario::new(asof, "bad", 0.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleScenario {
    asof: Date,
    label: String,
    numeraire: f64,
    data: BTreeMap<RiskFactorKey, f64>,
}

impl SimpleScenario {
    /// Creates an empty scenario.
    ///
    /// # Errors
    /// `SimError::Configuration` if the numeraire is not strictly positive.
    pub fn new(asof: Date, label: impl Into<String>, numeraire: f64) -> Result<Self, SimError> {
        let label = label.into();
        if !(numeraire > 0.0) || !numeraire.is_finite() {
            return Err(SimError::config(
                format!("scenario {label} at {asof}"),
                format!("numeraire must be positive, got {numeraire}"),
            ));
        }
        Ok(Self {
            asof,
            label,
            numeraire,
            data: BTreeMap::new(),
        })
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Scenario for SimpleScenario {
    fn asof(&self) -> Date {
        self.asof
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn numeraire(&self) -> f64 {
        self.numeraire
    }

    fn add(&mut self, key: RiskFactorKey, value: f64) {
        self.data.insert(key, value);
    }

    fn has(&self, key: &RiskFactorKey) -> bool {
        self.data.contains_key(key)
    }

    fn get(&self, key: &RiskFactorKey) -> Result<f64, SimError> {
        self.data
            .get(key)
            .copied()
            .ok_or_else(|| SimError::MissingMarketData {
                key: key.to_string(),
            })
    }

    fn keys(&self) -> Vec<RiskFactorKey> {
        self.data.keys().cloned().collect()
    }

    fn clone_box(&self) -> Box<dyn Scenario> {
        Box::new(self.clone())
    }
}

/// Creates empty scenarios for generators and readers.
pub trait ScenarioFactory: Send + Sync + fmt::Debug {
    /// Builds an empty scenario.
    fn build_scenario(&self, asof: Date, label: &str, numeraire: f64)
        -> Result<Box<dyn Scenario>, SimError>;
}

/// Factory for [`SimpleScenario`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleScenarioFactory;

impl ScenarioFactory for SimpleScenarioFactory {
    fn build_scenario(
        &self,
        asof: Date,
        label: &str,
        numeraire: f64,
    ) -> Result<Box<dyn Scenario>, SimError> {
        Ok(Box::new(SimpleScenario::new(asof, label, numeraire)?))
    }
}
