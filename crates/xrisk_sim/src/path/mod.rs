//! Multi-dimensional Monte Carlo paths of the cross-asset state process.
//!
//! Generators produce one [`MultiPath`] per call on a fixed time grid
//! (t = 0 first). All of them are deterministic given their seed and
//! restart the same sequence on [`MultiPathGeneratorBase::reset`].

mod generator;
mod multipath;

pub use generator::{
    MultiPathGenerator, MultiPathGeneratorBase, MultiPathGeneratorLowDiscrepancy,
    MultiPathGeneratorPseudoRandom, ProjectedVariateMultiPathGenerator,
};
pub use multipath::{MultiPath, Sample};
