//! Value at risk from sensitivities.
//!
//! - [`delta_var`], [`delta_gamma_var_normal`],
//!   [`delta_gamma_var_cornish_fisher`], [`delta_gamma_var_mc`]: quantiles
//!   of `PL = δᵀx + ½ xᵀΓx` with `x ~ N(0, Ω)`
//! - [`CovarianceSalvage`]: [`NoSalvage`] or [`SpectralSalvage`]
//! - [`ParametricVarCalculator`]: per-portfolio VaR from a
//!   [`SensitivityStream`](crate::sensitivity::SensitivityStream) and a
//!   covariance map
//! - [`HistoricalVarCalculator`]: sensitivity P&L over historical shifts

mod aggregator;
mod delta_gamma;
mod historical;
mod parametric;
mod salvage;

pub use aggregator::{aggregate_sensitivities, PortfolioSensitivities, TradePortfolios};
pub use delta_gamma::{delta_gamma_var_cornish_fisher, delta_gamma_var_mc, delta_gamma_var_normal, delta_var};
pub use historical::{sensitivity_pnl, HistoricalShifts, HistoricalVarCalculator};
pub use parametric::{
    read_covariance_csv, CovarianceMap, ParametricVarCalculator, ParametricVarParams, VarMethod, VarReport, VarRow,
    ALL_PORTFOLIOS,
};
pub use salvage::{check_positive_semidefinite, CovarianceSalvage, NoSalvage, SpectralSalvage};
