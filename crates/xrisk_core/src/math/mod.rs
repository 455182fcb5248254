//! Numerical building blocks.
//!
//! - `distributions`: standard normal density, CDF and inverse CDF
//! - `quadrature`: Simpson and Gauss-Legendre integration
//! - `solvers`: Brent root finding
//! - `linalg`: pseudo square roots, covariance salvage, PSD checks
//! - `error`: [`MathError`]

pub mod distributions;
pub mod error;
pub mod linalg;
pub mod quadrature;
pub mod solvers;

pub use distributions::{cumulative_normal, inverse_cumulative_normal, normal_density};
pub use error::MathError;
pub use linalg::{pseudo_sqrt, salvage_covariance, SalvageMethod};
pub use quadrature::{GaussLegendre, Integrator, SimpsonIntegral};
pub use solvers::{BrentSolver, SolverConfig};
