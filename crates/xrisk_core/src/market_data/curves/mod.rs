//! Yield and credit curves.
//!
//! All curves are generic over `T: Float` and take times as year fractions
//! from the curve's reference date.

mod credit;
mod flat;
mod interpolated;
mod traits;

pub use credit::{CreditCurve, FlatHazardCurve, HazardRateCurve};
pub use flat::FlatCurve;
pub use interpolated::{CurveInterpolation, InterpolatedCurve};
pub use traits::YieldCurve;
