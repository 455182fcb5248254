//! # xrisk_core: Foundation Layer for Cross-Asset Simulation
//!
//! ## Layer 1 (Foundation) Role
//!
//! xrisk_core is the bottom layer of the xrisk workspace, providing:
//! - Time types: [`types::Date`], [`types::DayCountConvention`], [`types::Period`]
//! - Yield and credit curves (`market_data::curves`)
//! - Numerical building blocks (`math`): normal distribution, quadrature,
//!   Brent root finding, covariance factorisation and salvage
//! - Error types: [`types::DateError`], [`math::MathError`],
//!   [`market_data::MarketDataError`]
//!
//! Layer 1 has no dependencies on other xrisk crates.
//!
//! ## Usage Examples
//!
//! ```rust
//! use xrisk_core::market_data::curves::{FlatCurve, YieldCurve};
//! use xrisk_core::types::{Date, DayCountConvention};
//!
//! let asof = Date::from_ymd(2024, 1, 2).unwrap();
//! let maturity = Date::from_ymd(2025, 1, 2).unwrap();
//! let t = DayCountConvention::Actual365Fixed.year_fraction(asof, maturity);
//!
//! let curve = FlatCurve::new(0.03_f64);
//! let df = curve.discount_factor(t).unwrap();
//! assert!(df < 1.0);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialisation for `Date`, `DayCountConvention` and `Period`

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod market_data;
pub mod math;
pub mod types;

/// Scalar type used throughout the simulation stack.
pub type Real = f64;
