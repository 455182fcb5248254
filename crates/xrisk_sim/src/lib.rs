//! # xrisk_sim: simulation layer
//!
//! Turns a [`CrossAssetModel`](xrisk_models::CrossAssetModel) into NPV
//! cubes:
//!
//! 1. [`rng`] and [`path`] draw Gaussian variates and evolve the model
//!    state over a time grid.
//! 2. [`scenario`] maps model states to risk-factor scenarios on a
//!    [`DateGrid`](scenario::DateGrid), or reads them from CSV files and
//!    historical time series.
//! 3. [`market`] rebuilds a [`SimMarket`](market::SimMarket) from each
//!    scenario.
//! 4. [`engine`] prices a portfolio on every (date, sample) and writes
//!    numeraire-deflated base-currency values into an [`NpvCube`](cube::NpvCube).
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use xrisk_core::market_data::curves::FlatCurve;
//! use xrisk_core::types::{Date, DayCountConvention};
//! use xrisk_models::model::{CorrelationMatrix, CrossAssetModel};
//! use xrisk_models::parametrization::LgmConstant;
//! use xrisk_models::{CrossAssetStateProcess, Discretization};
//! use xrisk_sim::cube::{InMemoryCube, NpvCube};
//! use xrisk_sim::engine::{
//!     NpvCalculator, Portfolio, PricingRegistry, ProductData, RunContext, TradeSpec,
//!     ValuationCalculator, ValuationEngine,
//! };
//! use xrisk_sim::engine::products::ZeroCouponBondData;
//! use xrisk_sim::market::SimMarketConfig;
//! use xrisk_sim::scenario::{CrossAssetModelScenarioGenerator, DateGrid, GeneratorSettings};
//!
//! let asof = Date::from_ymd(2025, 1, 2).unwrap();
//! let dc = DayCountConvention::Actual365Fixed;
//! let lgm = LgmConstant::new("EUR", Arc::new(FlatCurve::new(0.02)), 0.01, 0.03).unwrap();
//! let model = CrossAssetModel::new(vec![Arc::new(lgm)], vec![], vec![], vec![], CorrelationMatrix::identity(1))
//!     .unwrap();
//! let process = Arc::new(CrossAssetStateProcess::new(Arc::new(model), Discretization::Exact).unwrap());
//! let tenors = ["1Y".parse().unwrap(), "2Y".parse().unwrap()];
//! let config = Arc::new(SimMarketConfig::single_currency("EUR", tenors.to_vec()));
//! let grid = DateGrid::from_tenors(asof, &tenors, dc).unwrap();
//!
//! let registry = Arc::new(PricingRegistry::with_defaults());
//! let context = Arc::new(RunContext::new(asof, "EUR", dc, Arc::clone(&registry)));
//! let builder = CrossAssetModelScenarioGenerator::builder(
//!     process,
//!     Arc::clone(&config),
//!     asof,
//!     dc,
//!     GeneratorSettings::default(),
//! );
//! let engine = ValuationEngine::new(context, grid, builder, config).unwrap();
//!
//! let spec = TradeSpec {
//!     id: "ZCB".into(),
//!     netting_set_id: "NS".into(),
//!     model: Default::default(),
//!     engine: Default::default(),
//!     data: ProductData::ZeroCouponBond(ZeroCouponBondData {
//!         currency: "EUR".into(),
//!         notional: 100.0,
//!         maturity: Date::from_ymd(2028, 1, 3).unwrap(),
//!     }),
//! };
//! let mut portfolio = Portfolio::from_specs(&[spec], &registry).unwrap();
//! let mut cube = InMemoryCube::new(asof, portfolio.ids(), engine.valuation_dates().to_vec(), 8, 1).unwrap();
//! let calculators: Vec<Box<dyn ValuationCalculator>> = vec![Box::new(NpvCalculator::new(0))];
//! let report = engine.build_cube(&mut portfolio, &mut cube, &calculators).unwrap();
//! assert!(report.failed_trades.is_empty());
//! assert!(cube.get_t0(0, 0).unwrap() > 0.0);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: serialisation of trade descriptions, market layout and
//!   generator settings

#![warn(missing_docs)]

pub mod cube;
pub mod engine;
pub mod error;
pub mod market;
pub mod path;
pub mod rng;
pub mod scenario;

pub use error::{CubeError, SimError};
