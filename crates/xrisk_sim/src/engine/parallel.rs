//! Sample slicing for parallel cube builds.
//!
//! Samples are split into contiguous slices of `batch_size`; each slice is
//! valued by one rayon task with its own scenario generator, seeded with
//! the slice number as sub-stream offset. Results therefore depend on the
//! batch size but not on the number of threads.

use std::ops::Range;

/// Samples per slice.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Configuration for parallel execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Samples per slice
    pub batch_size: usize,
    /// Minimum number of samples before slicing
    pub parallel_threshold: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallel_threshold: 2 * DEFAULT_BATCH_SIZE,
        }
    }
}

impl ParallelConfig {
    /// Creates a new parallel configuration.
    pub fn new(batch_size: usize, parallel_threshold: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            parallel_threshold,
        }
    }

    /// Returns whether to use parallel processing for the given sample count.
    #[inline]
    pub fn should_parallelize(&self, samples: usize) -> bool {
        samples >= self.parallel_threshold && samples > self.batch_size
    }

    /// Contiguous sample ranges of at most `batch_size` samples.
    pub fn sample_slices(&self, samples: usize) -> Vec<Range<usize>> {
        let batch = self.batch_size.max(1);
        (0..samples)
            .step_by(batch)
            .map(|first| first..(first + batch).min(samples))
            .collect()
    }
}
