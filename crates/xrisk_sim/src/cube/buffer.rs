//! Sample-major staging buffer for cube builds.
//!
//! Valuation runs sample by sample, so the engine writes into a buffer
//! laid out `[sample][id][date][depth]`. Disjoint sample ranges are handed
//! out as [`SampleSliceMut`]s for parallel writers and the buffer is
//! scattered into the target cube once the build is done.

use super::in_memory::InMemoryCube;
use super::npv_cube::{check_index, NpvCube};
use crate::error::CubeError;

/// Write access used by valuation calculators.
pub trait CubeWriter {
    /// Sets a T0 value.
    fn set_t0(&mut self, value: f64, id: usize, depth: usize) -> Result<(), CubeError>;

    /// Sets the value at (id, date, sample, depth); `sample` is global.
    fn set(&mut self, value: f64, id: usize, date: usize, sample: usize, depth: usize) -> Result<(), CubeError>;
}

impl CubeWriter for InMemoryCube {
    fn set_t0(&mut self, value: f64, id: usize, depth: usize) -> Result<(), CubeError> {
        NpvCube::set_t0(self, value, id, depth)
    }

    fn set(&mut self, value: f64, id: usize, date: usize, sample: usize, depth: usize) -> Result<(), CubeError> {
        NpvCube::set(self, value, id, date, sample, depth)
    }
}

/// Cube-shaped buffer stored sample-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    num_ids: usize,
    num_dates: usize,
    samples: usize,
    depth: usize,
    t0: Vec<f64>,
    data: Vec<f64>,
}

impl SampleBuffer {
    /// Zero-filled buffer.
    pub fn new(num_ids: usize, num_dates: usize, samples: usize, depth: usize) -> Self {
        Self {
            num_ids,
            num_dates,
            samples,
            depth,
            t0: vec![0.0; num_ids * depth],
            data: vec![0.0; samples * num_ids * num_dates * depth],
        }
    }

    /// Buffer shaped like `cube`.
    pub fn shaped_like(cube: &dyn NpvCube) -> Self {
        Self::new(cube.num_ids(), cube.num_dates(), cube.samples(), cube.depth())
    }

    #[inline]
    fn sample_stride(&self) -> usize {
        self.num_ids * self.num_dates * self.depth
    }

    /// Number of samples.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Value at (id, date, sample, depth).
    pub fn get(&self, id: usize, date: usize, sample: usize, depth: usize) -> Result<f64, CubeError> {
        check_index("sample", sample, self.samples)?;
        let k = local_offset(self.num_ids, self.num_dates, self.depth, id, date, depth)?;
        Ok(self.data[sample * self.sample_stride() + k])
    }

    /// T0 value.
    pub fn get_t0(&self, id: usize, depth: usize) -> Result<f64, CubeError> {
        check_index("id", id, self.num_ids)?;
        check_index("depth", depth, self.depth)?;
        Ok(self.t0[id * self.depth + depth])
    }

    /// The whole sample range as one slice.
    pub fn as_slice_mut(&mut self) -> SampleSliceMut<'_> {
        SampleSliceMut {
            first_sample: 0,
            samples: self.samples,
            num_ids: self.num_ids,
            num_dates: self.num_dates,
            depth: self.depth,
            data: &mut self.data,
        }
    }

    /// Splits at `sample` into `[0, sample)` and `[sample, samples)`.
    pub fn split_at_sample(&mut self, sample: usize) -> Result<(SampleSliceMut<'_>, SampleSliceMut<'_>), CubeError> {
        if sample > self.samples {
            return Err(CubeError::IndexOutOfRange {
                what: "sample",
                index: sample,
                bound: self.samples + 1,
            });
        }
        let stride = self.sample_stride();
        let (num_ids, num_dates, depth, samples) = (self.num_ids, self.num_dates, self.depth, self.samples);
        let (left, right) = self.data.split_at_mut(sample * stride);
        Ok((
            SampleSliceMut {
                first_sample: 0,
                samples: sample,
                num_ids,
                num_dates,
                depth,
                data: left,
            },
            SampleSliceMut {
                first_sample: sample,
                samples: samples - sample,
                num_ids,
                num_dates,
                depth,
                data: right,
            },
        ))
    }

    /// Disjoint slices of at most `chunk` samples each, in sample order.
    pub fn chunks_mut(&mut self, chunk: usize) -> Vec<SampleSliceMut<'_>> {
        let chunk = chunk.max(1);
        let stride = self.sample_stride();
        let (num_ids, num_dates, depth, samples) = (self.num_ids, self.num_dates, self.depth, self.samples);
        if stride == 0 {
            return (0..samples)
                .step_by(chunk)
                .map(|first| SampleSliceMut {
                    first_sample: first,
                    samples: chunk.min(samples - first),
                    num_ids,
                    num_dates,
                    depth,
                    data: &mut [],
                })
                .collect();
        }
        self.data
            .chunks_mut(chunk * stride)
            .enumerate()
            .map(|(k, data)| SampleSliceMut {
                first_sample: k * chunk,
                samples: data.len() / stride,
                num_ids,
                num_dates,
                depth,
                data,
            })
            .collect()
    }

    /// Zeroes every value of `id`, T0 included.
    pub fn zero_id(&mut self, id: usize) -> Result<(), CubeError> {
        check_index("id", id, self.num_ids)?;
        let block = self.num_dates * self.depth;
        let stride = self.sample_stride();
        for s in 0..self.samples {
            let start = s * stride + id * block;
            self.data[start..start + block].fill(0.0);
        }
        self.t0[id * self.depth..(id + 1) * self.depth].fill(0.0);
        Ok(())
    }

    /// Copies every value into `cube`.
    ///
    /// # Errors
    /// `CubeError::ShapeMismatch` if the shapes differ.
    pub fn scatter_into(&self, cube: &mut dyn NpvCube) -> Result<(), CubeError> {
        let shape = (cube.num_ids(), cube.num_dates(), cube.samples(), cube.depth());
        if shape != (self.num_ids, self.num_dates, self.samples, self.depth) {
            return Err(CubeError::ShapeMismatch(format!(
                "buffer ({}, {}, {}, {}) vs cube {shape:?}",
                self.num_ids, self.num_dates, self.samples, self.depth
            )));
        }
        for id in 0..self.num_ids {
            for k in 0..self.depth {
                cube.set_t0(self.t0[id * self.depth + k], id, k)?;
            }
        }
        let mut values = self.data.iter();
        for sample in 0..self.samples {
            for id in 0..self.num_ids {
                for date in 0..self.num_dates {
                    for k in 0..self.depth {
                        if let Some(v) = values.next() {
                            cube.set(*v, id, date, sample, k)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl CubeWriter for SampleBuffer {
    fn set_t0(&mut self, value: f64, id: usize, depth: usize) -> Result<(), CubeError> {
        check_index("id", id, self.num_ids)?;
        check_index("depth", depth, self.depth)?;
        self.t0[id * self.depth + depth] = value;
        Ok(())
    }

    fn set(&mut self, value: f64, id: usize, date: usize, sample: usize, depth: usize) -> Result<(), CubeError> {
        check_index("sample", sample, self.samples)?;
        let k = local_offset(self.num_ids, self.num_dates, self.depth, id, date, depth)?;
        let stride = self.sample_stride();
        self.data[sample * stride + k] = value;
        Ok(())
    }
}

#[inline]
fn local_offset(
    num_ids: usize,
    num_dates: usize,
    depth_bound: usize,
    id: usize,
    date: usize,
    depth: usize,
) -> Result<usize, CubeError> {
    check_index("id", id, num_ids)?;
    check_index("date", date, num_dates)?;
    check_index("depth", depth, depth_bound)?;
    Ok((id * num_dates + date) * depth_bound + depth)
}

/// Mutable view of a contiguous sample range of a [`SampleBuffer`].
///
/// Samples are addressed by their global index.
#[derive(Debug)]
pub struct SampleSliceMut<'a> {
    first_sample: usize,
    samples: usize,
    num_ids: usize,
    num_dates: usize,
    depth: usize,
    data: &'a mut [f64],
}

impl SampleSliceMut<'_> {
    /// First global sample of the slice.
    pub fn first_sample(&self) -> usize {
        self.first_sample
    }

    /// Number of samples in the slice.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Global sample range.
    pub fn sample_range(&self) -> std::ops::Range<usize> {
        self.first_sample..self.first_sample + self.samples
    }

    fn offset(&self, id: usize, date: usize, sample: usize, depth: usize) -> Result<usize, CubeError> {
        if !self.sample_range().contains(&sample) {
            return Err(CubeError::IndexOutOfRange {
                what: "sample",
                index: sample,
                bound: self.first_sample + self.samples,
            });
        }
        let k = local_offset(self.num_ids, self.num_dates, self.depth, id, date, depth)?;
        Ok((sample - self.first_sample) * self.num_ids * self.num_dates * self.depth + k)
    }

    /// Value at (id, date, sample, depth).
    pub fn get(&self, id: usize, date: usize, sample: usize, depth: usize) -> Result<f64, CubeError> {
        Ok(self.data[self.offset(id, date, sample, depth)?])
    }
}

impl CubeWriter for SampleSliceMut<'_> {
    fn set_t0(&mut self, _value: f64, _id: usize, _depth: usize) -> Result<(), CubeError> {
        Err(CubeError::ShapeMismatch("sample slices hold no T0 values".into()))
    }

    fn set(&mut self, value: f64, id: usize, date: usize, sample: usize, depth: usize) -> Result<(), CubeError> {
        let k = self.offset(id, date, sample, depth)?;
        self.data[k] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use xrisk_core::types::Date;

    fn value(id: usize, date: usize, sample: usize, depth: usize) -> f64 {
        (id * 1000 + date * 100 + sample * 10 + depth) as f64
    }

    #[test]
    fn test_parallel_chunks_scatter_into_cube() {
        let mut buf = SampleBuffer::new(2, 3, 7, 2);
        buf.set_t0(9.0, 1, 1).unwrap();
        buf.chunks_mut(3).into_par_iter().for_each(|mut slice| {
            for s in slice.sample_range() {
                for id in 0..2 {
                    for d in 0..3 {
                        for k in 0..2 {
                            slice.set(value(id, d, s, k), id, d, s, k).unwrap();
                        }
                    }
                }
            }
        });
        let asof = Date::from_ymd(2025, 1, 2).unwrap();
        let dates = (1..=3).map(|m| Date::from_ymd(2025, m + 1, 2).unwrap()).collect();
        let mut cube = InMemoryCube::new(asof, vec!["A".into(), "B".into()], dates, 7, 2).unwrap();
        buf.scatter_into(&mut cube).unwrap();
        assert_eq!(cube.get(1, 2, 6, 1).unwrap(), value(1, 2, 6, 1));
        assert_eq!(cube.get(0, 1, 3, 0).unwrap(), value(0, 1, 3, 0));
        assert_eq!(cube.get_t0(1, 1).unwrap(), 9.0);
    }

    #[test]
    fn test_slices_are_disjoint() {
        let mut buf = SampleBuffer::new(1, 1, 5, 1);
        let slices = buf.chunks_mut(2);
        assert_eq!(
            slices.iter().map(SampleSliceMut::sample_range).collect::<Vec<_>>(),
            vec![0..2, 2..4, 4..5]
        );
        let (mut a, mut b) = buf.split_at_sample(3).unwrap();
        assert!(a.set(1.0, 0, 0, 3, 0).is_err());
        b.set(2.0, 0, 0, 3, 0).unwrap();
        a.set(1.0, 0, 0, 2, 0).unwrap();
        assert!(a.set_t0(1.0, 0, 0).is_err());
        assert_eq!(buf.get(0, 0, 3, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_zero_id() {
        let mut buf = SampleBuffer::new(2, 2, 2, 1);
        for s in 0..2 {
            buf.set(1.0, 0, 1, s, 0).unwrap();
            buf.set(2.0, 1, 1, s, 0).unwrap();
        }
        buf.set_t0(3.0, 0, 0).unwrap();
        buf.zero_id(0).unwrap();
        assert_eq!(buf.get(0, 1, 1, 0).unwrap(), 0.0);
        assert_eq!(buf.get_t0(0, 0).unwrap(), 0.0);
        assert_eq!(buf.get(1, 1, 1, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let buf = SampleBuffer::new(1, 1, 2, 1);
        let asof = Date::from_ymd(2025, 1, 2).unwrap();
        let mut cube = InMemoryCube::new(asof, vec!["A".into()], vec![Date::from_ymd(2026, 1, 2).unwrap()], 3, 1).unwrap();
        assert!(matches!(buf.scatter_into(&mut cube), Err(CubeError::ShapeMismatch(_))));
    }
}
