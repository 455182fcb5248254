//! Simulated market seen by the priceables.
//!
//! A [`SimMarket`] is rebuilt from each scenario: discount and index curves
//! from their node discount factors, FX and equity spots, survival curves
//! and systemic credit factors. Fixings come from a pre-computed historical
//! table plus the values recorded along the current path.

mod config;
mod fixings;
mod sim_market;

pub use config::{IndexConfig, SimMarketConfig};
pub use fixings::Fixings;
pub use sim_market::{equity_fixing_name, fx_fixing_name, SimMarket};
