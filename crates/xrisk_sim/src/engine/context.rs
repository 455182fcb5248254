//! Run context shared by every component of a simulation run.

use std::sync::Arc;

use xrisk_core::types::{Date, DayCountConvention};

use super::registry::PricingRegistry;

/// As-of date, reporting currency, day counter and pricing registry of one
/// run.
///
/// Passed explicitly to the market, engine and calculators; there is no
/// process-wide evaluation date.
#[derive(Debug, Clone)]
pub struct RunContext {
    asof: Date,
    base_currency: String,
    day_counter: DayCountConvention,
    registry: Arc<PricingRegistry>,
}

impl RunContext {
    /// Creates a context.
    pub fn new(
        asof: Date,
        base_currency: &str,
        day_counter: DayCountConvention,
        registry: Arc<PricingRegistry>,
    ) -> Self {
        Self {
            asof,
            base_currency: base_currency.to_string(),
            day_counter,
            registry,
        }
    }

    /// As-of date.
    #[inline]
    pub fn asof(&self) -> Date {
        self.asof
    }

    /// Reporting currency.
    #[inline]
    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Day counter for date to time conversion.
    #[inline]
    pub fn day_counter(&self) -> DayCountConvention {
        self.day_counter
    }

    /// Pricing registry.
    pub fn registry(&self) -> &PricingRegistry {
        &self.registry
    }
}
