//! Market data term structures.
//!
//! Today's market is consumed as black-box curves: the cross-asset model
//! reads its initial term structures from here, and the simulated market
//! rebuilds curve objects of the same shape from scenario node values.
//!
//! - [`curves::YieldCurve`]: discount factors, zero and forward rates
//! - [`curves::CreditCurve`]: survival and default probabilities
//! - [`MarketDataError`]: structured lookup errors

pub mod curves;
pub mod error;

pub use error::MarketDataError;
