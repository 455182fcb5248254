//! # xrisk_models: cross-asset model layer
//!
//! Parametrizations of the individual risk factors, the [`CrossAssetModel`]
//! that couples them through a single correlation matrix, and the
//! [`CrossAssetStateProcess`] that evolves the joint state over a time grid.
//!
//! ## Components
//!
//! - interest rates: one-factor LGM per currency, `irs[0]` is the domestic
//!   currency and defines the numeraire
//! - FX: Black-Scholes log-spot per foreign currency, quoted as units of
//!   domestic per unit of foreign
//! - equity: Black-Scholes log-spot in one of the model currencies
//! - credit: CIR++ intensity with a deterministic shift fitted to the
//!   market survival curve
//!
//! All simulation happens in the LGM measure of the domestic currency.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use xrisk_core::market_data::curves::FlatCurve;
//! use xrisk_models::model::{CorrelationMatrix, CrossAssetModel};
//! use xrisk_models::parametrization::LgmConstant;
//!
//! let lgm = LgmConstant::new("EUR", Arc::new(FlatCurve::new(0.02)), 0.01, 0.0).unwrap();
//! let model = CrossAssetModel::new(
//!     vec![Arc::new(lgm)],
//!     vec![],
//!     vec![],
//!     vec![],
//!     CorrelationMatrix::identity(1),
//! )
//! .unwrap();
//! let var = model.ir_ir_covariance(0, 0, 0.0, 1.0).unwrap();
//! assert!((var - 1.0e-4).abs() < 1e-12);
//! ```

#![warn(missing_docs)]

pub mod calibration;
pub mod error;
pub mod model;
pub mod parametrization;
pub mod process;

pub use error::ModelError;
pub use model::CrossAssetModel;
pub use process::{CrossAssetStateProcess, Discretization};
