//! # xrisk_analytics: risk analytics layer
//!
//! Consumes the NPV cubes and scenario data of `xrisk_sim` and sensitivity
//! or CRIF files:
//!
//! - [`portfolio`]: trade, netting set and counterparty reference data
//! - [`aggregation`]: netted exposure with CSA collateral, trade
//!   allocation, CVA/DVA/FVA/COLVA/KVA and credit migration
//! - [`sensitivity`]: delta/gamma records and streams
//! - [`var`]: parametric and historical sensitivity VaR
//! - [`simm`]: SIMM initial margin from CRIF records
//!
//! ## Example
//!
//! ```
//! use std::collections::{BTreeMap, BTreeSet};
//! use xrisk_analytics::sensitivity::{SensitivityInMemoryStream, SensitivityRecord};
//! use xrisk_analytics::var::{CovarianceMap, ParametricVarCalculator, ParametricVarParams};
//! use xrisk_sim::scenario::{KeyType, RiskFactorKey};
//!
//! let key = RiskFactorKey::new(KeyType::FxSpot, "USDEUR", 0);
//! let mut stream = SensitivityInMemoryStream::new(vec![SensitivityRecord::delta_gamma("T1", key.clone(), 100.0, 0.0)]);
//!
//! let mut covariance = CovarianceMap::new();
//! covariance.insert((key.clone(), key), 1.0);
//! let portfolios = BTreeMap::from([("P".to_string(), BTreeSet::from(["T1".to_string()]))]);
//!
//! let calc = ParametricVarCalculator::new(portfolios, covariance, vec![0.99], ParametricVarParams::default())
//!     .unwrap();
//! let report = calc.calculate(&mut stream).unwrap();
//! assert!((report.get("P", 0.99).unwrap() - 232.6348).abs() < 1e-3);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: serialisation of reference data, SIMM configuration and
//!   results

#![warn(missing_docs)]

pub mod aggregation;
pub mod error;
pub mod portfolio;
pub mod sensitivity;
pub mod simm;
pub mod var;

pub use error::{AggregationError, SimmError, VarError};
pub use portfolio::PortfolioError;
pub use sensitivity::SensitivityError;
