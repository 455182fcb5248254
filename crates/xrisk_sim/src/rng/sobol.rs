//! Scrambled Sobol low-discrepancy sequence.
//!
//! Gray-code ordering with 64-bit direction numbers. The first dimension
//! uses the canonical van der Corput directions; higher dimensions use
//! odd direction integers derived from a splitmix64 hash of the seed, and
//! every dimension is digitally shifted by a seeded scrambler so the first
//! point is not the origin.

use crate::error::SimError;

const INV_U64_RANGE: f64 = 1.0 / 18_446_744_073_709_551_616.0;
const HALF_INV_U64: f64 = 0.5 * INV_U64_RANGE;

/// Largest supported dimension.
pub const SOBOL_MAX_DIMENSIONS: usize = 21_201;

/// Scrambled Sobol sequence on `(0, 1)^d`.
#[derive(Debug, Clone)]
pub struct SobolSequence {
    dimension: usize,
    seed: u64,
    index: u64,
    x: Vec<u64>,
    directions: Vec<[u64; 64]>,
    scramblers: Vec<u64>,
}

impl SobolSequence {
    /// Creates the sequence.
    ///
    /// # Errors
    /// `SimError::Configuration` unless `1 <= dimension <= SOBOL_MAX_DIMENSIONS`.
    pub fn new(dimension: usize, seed: u64) -> Result<Self, SimError> {
        if !(1..=SOBOL_MAX_DIMENSIONS).contains(&dimension) {
            return Err(SimError::config(
                "SobolSequence",
                format!("dimension {dimension} outside [1, {SOBOL_MAX_DIMENSIONS}]"),
            ));
        }
        let directions = (0..dimension)
            .map(|d| direction_numbers(d as u64, seed))
            .collect();
        let scramblers = (0..dimension)
            .map(|d| splitmix64(seed ^ ((d as u64 + 1) << 32)))
            .collect();
        Ok(Self {
            dimension,
            seed,
            index: 0,
            x: vec![0; dimension],
            directions,
            scramblers,
        })
    }

    /// Number of coordinates per point.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Seed used for the direction numbers and scramblers.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restarts the sequence at its first point.
    pub fn reset(&mut self) {
        self.index = 0;
        self.x.iter_mut().for_each(|v| *v = 0);
    }

    /// Writes the next point into `out` (length `dimension`).
    ///
    /// Returns `false` once the 2^64 - 1 points are exhausted.
    #[inline]
    pub fn next_into(&mut self, out: &mut [f64]) -> bool {
        let next = self.index.wrapping_add(1);
        if next == 0 {
            return false;
        }
        let c = next.trailing_zeros() as usize;
        self.index = next;
        for (d, o) in out.iter_mut().enumerate().take(self.dimension) {
            self.x[d] ^= self.directions[d][c];
            let scrambled = self.x[d] ^ self.scramblers[d];
            *o = (scrambled as f64).mul_add(INV_U64_RANGE, HALF_INV_U64);
        }
        true
    }
}

fn direction_numbers(dim: u64, seed: u64) -> [u64; 64] {
    let mut v = [0_u64; 64];
    if dim == 0 {
        for (j, item) in v.iter_mut().enumerate() {
            *item = 1_u64 << (63 - j);
        }
        return v;
    }
    for (j, item) in v.iter_mut().enumerate() {
        let hash = splitmix64(seed ^ ((dim + 1) << 40) ^ j as u64);
        let mask = if j == 63 { u64::MAX } else { (1_u64 << (j + 1)) - 1 };
        *item = ((hash | 1) & mask) << (63 - j);
    }
    v
}

/// splitmix64 finaliser.
#[inline]
pub(crate) fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
