//! Exposure aggregation over an NPV cube.
//!
//! - [`collateral`]: CSA margin calls and collateral balance paths
//! - [`NettedExposureCalculator`]: netting set EPE/ENE/PFE, bank account
//!   profiles, COLVA and the collateral floor
//! - [`TradeExposureCalculator`] and [`allocate`]: stand-alone trade
//!   profiles and their share of the netting set
//! - [`ValueAdjustmentCalculator`]: CVA, DVA, FCA, FBA and KVA
//! - [`PostProcess`]: all of the above in one validated run
//! - [`CreditMigrationCalculator`]: migration loss distribution from the
//!   netted cube

pub mod collateral;
mod credit_migration;
mod netted;
mod postprocess;
mod profile;
mod trade;
mod xva;

pub use collateral::{collateral_balance_path, credit_support_amount, margin_requirement, CollateralPath};
pub use credit_migration::{
    conditional_prob, generator, Bucketing, CreditMigrationCalculator, CreditMigrationParameters,
    CreditMigrationResult, MigrationEntity,
};
pub use netted::{ExposureConfig, NettedExposure, NettedExposureCalculator, NettingSetExposure};
pub use postprocess::{NettingSetResult, PostProcess, PostProcessConfig, PostProcessResult, TradeResult};
pub use trade::{allocate, AllocationMethod, TradeExposure, TradeExposureCalculator};
pub use xva::{FundingCurves, KvaParams, TradeXva, ValueAdjustmentCalculator, XvaResult};
