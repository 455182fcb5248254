//! Brownian bridge construction of Gaussian increments.
//!
//! The first variate fixes the terminal value, the following ones fill
//! midpoints by bisection. With low-discrepancy input this puts the best
//! coordinates on the coarse structure of the path.

use crate::error::SimError;

/// Brownian bridge over a fixed set of positive, increasing times.
#[derive(Debug, Clone)]
pub struct BrownianBridge {
    times: Vec<f64>,
    sqrt_dt: Vec<f64>,
    bridge_index: Vec<usize>,
    left_index: Vec<usize>,
    right_index: Vec<usize>,
    left_weight: Vec<f64>,
    right_weight: Vec<f64>,
    std_dev: Vec<f64>,
}

impl BrownianBridge {
    /// Builds the bridge for times `t_1 < … < t_n` (t = 0 excluded).
    ///
    /// # Errors
    /// `SimError::Configuration` if the times are empty, not strictly
    /// increasing or not positive.
    pub fn new(times: &[f64]) -> Result<Self, SimError> {
        let size = times.len();
        if size == 0 {
            return Err(SimError::config("BrownianBridge", "no time steps"));
        }
        if times[0] <= 0.0 || times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::config(
                "BrownianBridge",
                "times must be positive and strictly increasing",
            ));
        }
        let t = times.to_vec();
        let mut sqrt_dt = Vec::with_capacity(size);
        sqrt_dt.push(t[0].sqrt());
        for w in t.windows(2) {
            sqrt_dt.push((w[1] - w[0]).sqrt());
        }

        let mut map = vec![0usize; size];
        let mut bridge_index = vec![0usize; size];
        let mut left_index = vec![0usize; size];
        let mut right_index = vec![0usize; size];
        let mut left_weight = vec![0.0; size];
        let mut right_weight = vec![0.0; size];
        let mut std_dev = vec![0.0; size];

        // map[i] != 0 marks a point already placed by the construction
        map[size - 1] = 1;
        bridge_index[0] = size - 1;
        std_dev[0] = t[size - 1].sqrt();

        let mut j = 0usize;
        for i in 1..size {
            while map[j] != 0 {
                j += 1;
            }
            let mut k = j;
            while map[k] == 0 {
                k += 1;
            }
            let l = j + ((k - 1 - j) >> 1);
            map[l] = i;
            bridge_index[i] = l;
            left_index[i] = j;
            right_index[i] = k;
            if j != 0 {
                let span = t[k] - t[j - 1];
                left_weight[i] = (t[k] - t[l]) / span;
                right_weight[i] = (t[l] - t[j - 1]) / span;
                std_dev[i] = ((t[l] - t[j - 1]) * (t[k] - t[l]) / span).sqrt();
            } else {
                left_weight[i] = (t[k] - t[l]) / t[k];
                right_weight[i] = t[l] / t[k];
                std_dev[i] = (t[l] * (t[k] - t[l]) / t[k]).sqrt();
            }
            j = k + 1;
            if j >= size {
                j = 0;
            }
        }

        Ok(Self {
            times: t,
            sqrt_dt,
            bridge_index,
            left_index,
            right_index,
            left_weight,
            right_weight,
            std_dev,
        })
    }

    /// Number of time steps.
    pub fn size(&self) -> usize {
        self.times.len()
    }

    /// Maps independent normals `input` (most important first) to
    /// normalised increments `ΔW_i / √Δt_i` in time order.
    pub fn transform(&self, input: &[f64], output: &mut [f64]) -> Result<(), SimError> {
        let size = self.size();
        if input.len() != size || output.len() != size {
            return Err(SimError::config(
                "BrownianBridge",
                format!(
                    "expected {size} variates, got input {} and output {}",
                    input.len(),
                    output.len()
                ),
            ));
        }
        output[size - 1] = self.std_dev[0] * input[0];
        for i in 1..size {
            let (j, k, l) = (self.left_index[i], self.right_index[i], self.bridge_index[i]);
            output[l] = if j != 0 {
                self.left_weight[i] * output[j - 1]
                    + self.right_weight[i] * output[k]
                    + self.std_dev[i] * input[i]
            } else {
                self.right_weight[i] * output[k] + self.std_dev[i] * input[i]
            };
        }
        for i in (1..size).rev() {
            output[i] -= output[i - 1];
        }
        for (o, s) in output.iter_mut().zip(&self.sqrt_dt) {
            *o /= s;
        }
        Ok(())
    }
}
