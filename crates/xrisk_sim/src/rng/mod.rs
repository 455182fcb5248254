//! Random and low-discrepancy variate sources for path generation.
//!
//! - [`SimRng`]: seeded `StdRng` wrapper drawing standard normals
//! - [`SobolSequence`]: scrambled Sobol points
//! - [`BrownianBridge`]: bridge ordering of Gaussian increments
//! - [`VariateGenerator`]: the per-path variate source consumed by the
//!   multi-path generators, laid out `[step][factor]`

mod brownian_bridge;
mod sobol;

pub use brownian_bridge::BrownianBridge;
pub use sobol::{SobolSequence, SOBOL_MAX_DIMENSIONS};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use xrisk_core::math::inverse_cumulative_normal;

use crate::error::SimError;

/// Seeded pseudo-random generator.
///
/// The same seed reproduces the same stream on every platform.
///
/// # Examples
///
/// ```
/// use xrisk_sim::rng::SimRng;
///
/// let mut a = SimRng::from_seed(42);
/// let mut b = SimRng::from_seed(42);
/// assert_eq!(a.gen_normal(), b.gen_normal());
/// ```
#[derive(Debug, Clone)]
pub struct SimRng {
    inner: StdRng,
    seed: u64,
}

impl SimRng {
    /// Creates a generator from a seed.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed the generator was created with.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restarts the stream from the seed.
    pub fn reset(&mut self) {
        self.inner = StdRng::seed_from_u64(self.seed);
    }

    /// Uniform draw in `[0, 1)`.
    #[inline]
    pub fn gen_uniform(&mut self) -> f64 {
        self.inner.gen()
    }

    /// Standard normal draw.
    #[inline]
    pub fn gen_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.inner)
    }

    /// Fills `buffer` with standard normals.
    #[inline]
    pub fn fill_normal(&mut self, buffer: &mut [f64]) {
        for value in buffer.iter_mut() {
            *value = StandardNormal.sample(&mut self.inner);
        }
    }
}

/// Source of independent standard normal variates for one path.
///
/// `next_sequence` fills `steps * factors` values laid out `[step][factor]`.
pub trait VariateGenerator: Send {
    /// Number of factors per step.
    fn factors(&self) -> usize;

    /// Number of time steps.
    fn steps(&self) -> usize;

    /// Total variates per path.
    fn dimension(&self) -> usize {
        self.factors() * self.steps()
    }

    /// Fills `out` with the next path's variates.
    fn next_sequence(&mut self, out: &mut [f64]);

    /// Restarts the deterministic sequence.
    fn reset(&mut self);
}

/// Pseudo-random normals from [`SimRng`].
#[derive(Debug, Clone)]
pub struct PseudoRandomVariates {
    rng: SimRng,
    factors: usize,
    steps: usize,
}

impl PseudoRandomVariates {
    /// Creates the source.
    pub fn new(factors: usize, steps: usize, seed: u64) -> Self {
        Self {
            rng: SimRng::from_seed(seed),
            factors,
            steps,
        }
    }
}

impl VariateGenerator for PseudoRandomVariates {
    fn factors(&self) -> usize {
        self.factors
    }

    fn steps(&self) -> usize {
        self.steps
    }

    fn next_sequence(&mut self, out: &mut [f64]) {
        self.rng.fill_normal(out);
    }

    fn reset(&mut self) {
        self.rng.reset();
    }
}

/// Sobol variates mapped through the inverse normal, optionally ordered by
/// a Brownian bridge per factor.
///
/// Without a bridge, Sobol coordinate `step * factors + factor` drives the
/// increment at `(step, factor)`. With a bridge, coordinate
/// `b * factors + factor` drives the `b`-th bridge point of `factor`, so the
/// leading coordinates fix the terminal values of all factors first.
#[derive(Debug, Clone)]
pub struct SobolBrownianVariates {
    sobol: SobolSequence,
    bridge: Option<BrownianBridge>,
    factors: usize,
    steps: usize,
    uniforms: Vec<f64>,
    column_in: Vec<f64>,
    column_out: Vec<f64>,
}

impl SobolBrownianVariates {
    /// Creates the source for `factors` drivers on the step times
    /// `times` (t = 0 excluded). `bridge` enables the bridge ordering.
    pub fn new(factors: usize, times: &[f64], seed: u64, bridge: bool) -> Result<Self, SimError> {
        let steps = times.len();
        let sobol = SobolSequence::new(factors * steps, seed)?;
        let bridge = if bridge {
            Some(BrownianBridge::new(times)?)
        } else {
            None
        };
        Ok(Self {
            sobol,
            bridge,
            factors,
            steps,
            uniforms: vec![0.0; factors * steps],
            column_in: vec![0.0; steps],
            column_out: vec![0.0; steps],
        })
    }
}

impl VariateGenerator for SobolBrownianVariates {
    fn factors(&self) -> usize {
        self.factors
    }

    fn steps(&self) -> usize {
        self.steps
    }

    fn next_sequence(&mut self, out: &mut [f64]) {
        if !self.sobol.next_into(&mut self.uniforms) {
            // exhausted after 2^64 - 1 points; restart rather than repeat
            self.sobol.reset();
            self.sobol.next_into(&mut self.uniforms);
        }
        match &self.bridge {
            None => {
                for (o, u) in out.iter_mut().zip(&self.uniforms) {
                    *o = inverse_cumulative_normal(*u);
                }
            }
            Some(bridge) => {
                for f in 0..self.factors {
                    for b in 0..self.steps {
                        self.column_in[b] =
                            inverse_cumulative_normal(self.uniforms[b * self.factors + f]);
                    }
                    // lengths are fixed at construction
                    let _ = bridge.transform(&self.column_in, &mut self.column_out);
                    for s in 0..self.steps {
                        out[s * self.factors + f] = self.column_out[s];
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        self.sobol.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_reset_reproduces_stream() {
        let mut rng = SimRng::from_seed(5);
        let first: Vec<f64> = (0..4).map(|_| rng.gen_normal()).collect();
        rng.reset();
        let again: Vec<f64> = (0..4).map(|_| rng.gen_normal()).collect();
        assert_eq!(first, again);
        assert_eq!(rng.seed(), 5);
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = SimRng::from_seed(1);
        for _ in 0..1000 {
            let u = rng.gen_uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_sobol_variates_mean_near_zero() {
        let times = [0.5, 1.0, 1.5, 2.0];
        let mut gen = SobolBrownianVariates::new(2, &times, 3, true).unwrap();
        assert_eq!(gen.dimension(), 8);
        let mut out = vec![0.0; 8];
        let mut mean = vec![0.0; 8];
        let n = 4096;
        for _ in 0..n {
            gen.next_sequence(&mut out);
            for (m, o) in mean.iter_mut().zip(&out) {
                *m += o / n as f64;
            }
        }
        assert!(mean.iter().all(|m| m.abs() < 0.02), "{mean:?}");
    }

    #[test]
    fn test_sobol_variates_reset() {
        let mut gen = SobolBrownianVariates::new(1, &[1.0, 2.0], 9, false).unwrap();
        let mut a = vec![0.0; 2];
        let mut b = vec![0.0; 2];
        gen.next_sequence(&mut a);
        gen.next_sequence(&mut b);
        gen.reset();
        gen.next_sequence(&mut b);
        assert_eq!(a, b);
    }
}
