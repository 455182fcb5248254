//! Time types and shared error types.
//!
//! This module provides:
//! - `time`: `Date`, `DayCountConvention` and `Period` for date arithmetic
//! - `error`: `DateError`

pub mod error;
pub mod time;

pub use error::DateError;
pub use time::{Date, DayCountConvention, Period, TimeUnit};
