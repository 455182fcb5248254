//! Valuation engine.
//!
//! - [`RunContext`]: as-of date, base currency, day counter and registry
//! - [`Priceable`] and the built-in [`products`]
//! - [`PricingRegistry`]: builders keyed by (model, engine, product)
//! - [`Portfolio`]: trades in cube id order
//! - [`ValuationCalculator`]s writing NPVs, cashflows and close-out values
//! - [`ValuationEngine`]: sequential and sliced parallel cube builds

mod calculators;
mod context;
mod parallel;
mod portfolio;
mod priceable;
pub mod products;
mod registry;
mod valuation;

#[cfg(test)]
pub(crate) mod fixtures;

pub use calculators::{
    CalculationContext, CashflowCalculator, NpvCalculator, NpvCloseOutCalculator, ValuationCalculator,
};
pub use context::RunContext;
pub use parallel::{ParallelConfig, DEFAULT_BATCH_SIZE};
pub use portfolio::{Portfolio, PortfolioEntry};
pub use priceable::{Cashflow, Priceable, PricingResult};
pub use registry::{
    EngineKind, ModelKind, PriceableBuilder, PricingRegistry, ProductData, ProductKind, TradeSpec,
};
pub use valuation::{BuildReport, CloseOutMode, ValuationEngine};
