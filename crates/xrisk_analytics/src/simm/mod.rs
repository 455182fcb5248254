//! ISDA SIMM style initial margin from CRIF sensitivities.
//!
//! Weights, correlations and concentration thresholds come from a
//! caller-supplied [`SimmConfiguration`]. The margin of a bucket is the
//! nested sum of squares of [`generic_margin`]; buckets combine through
//! the bucket correlation, risk types add up within their risk class and
//! risk classes combine through ψ.

mod calculator;
mod configuration;
mod crif;
mod margin;

pub use calculator::{NettingSetSimm, SimmCalculator, SimmResults};
pub use configuration::{NamedCorrelation, RiskTypeConfig, SimmConfiguration};
pub use crif::{load_crif, read_crif, CrifRecord};
pub use margin::{bucket_aggregate, generic_margin, risk_type_margin, BucketAggregate, RiskTypeMargin};
