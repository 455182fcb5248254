//! Piecewise-constant functions of time.
//!
//! A function with breakpoints `t_1 < ... < t_n` and values `v_0, ..., v_n`
//! takes `v_k` on `[t_k, t_{k+1})`, with `t_0 = 0` and `t_{n+1} = ∞`.

use crate::error::ModelError;

/// Piecewise-constant function on `[0, ∞)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PiecewiseConstant {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl PiecewiseConstant {
    /// Creates a piecewise function.
    ///
    /// # Errors
    /// `ModelError::Configuration` naming `name` if `values.len() !=
    /// times.len() + 1`, if the times are not strictly increasing and
    /// positive, or if a value is not finite.
    pub fn new(name: &str, times: Vec<f64>, values: Vec<f64>) -> Result<Self, ModelError> {
        if values.len() != times.len() + 1 {
            return Err(ModelError::config(
                name,
                format!(
                    "{} values given for {} breakpoints, expected {}",
                    values.len(),
                    times.len(),
                    times.len() + 1
                ),
            ));
        }
        let mut previous = 0.0;
        for (k, &t) in times.iter().enumerate() {
            if !(t > previous) || !t.is_finite() {
                return Err(ModelError::config(
                    name,
                    format!("time grid not strictly increasing at index {k} ({t})"),
                ));
            }
            previous = t;
        }
        if let Some(k) = values.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::config(name, format!("non-finite value at index {k}")));
        }
        Ok(Self { times, values })
    }

    /// Constant function.
    pub fn constant(value: f64) -> Self {
        Self {
            times: Vec::new(),
            values: vec![value],
        }
    }

    /// Breakpoints.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Values, one more than the breakpoints.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Index of the piece containing `t`.
    #[inline]
    pub fn index(&self, t: f64) -> usize {
        self.times.partition_point(|&x| x <= t)
    }

    /// Function value at `t`.
    #[inline]
    pub fn value(&self, t: f64) -> f64 {
        self.values[self.index(t)]
    }

    /// Returns a copy with the value of piece `k` replaced.
    pub fn with_value(&self, k: usize, value: f64) -> Result<Self, ModelError> {
        if k >= self.values.len() {
            return Err(ModelError::IndexOutOfRange {
                what: "piecewise value",
                index: k,
                size: self.values.len(),
            });
        }
        let mut values = self.values.clone();
        values[k] = value;
        Ok(Self {
            times: self.times.clone(),
            values,
        })
    }

    /// ∫₀ᵗ v(s)² ds, zero for `t <= 0`.
    pub fn integral_of_square(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        let mut sum = 0.0;
        let mut start = 0.0;
        for (k, &end) in self.times.iter().enumerate() {
            if t <= end {
                return sum + self.values[k] * self.values[k] * (t - start);
            }
            sum += self.values[k] * self.values[k] * (end - start);
            start = end;
        }
        let last = self.values[self.times.len()];
        sum + last * last * (t - start)
    }
}
