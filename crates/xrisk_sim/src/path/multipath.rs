//! Multi-dimensional path container.

/// Weighted Monte Carlo sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    /// Sampled value
    pub value: T,
    /// Sample weight
    pub weight: f64,
}

/// Values of every state variable on a time grid, `(state size) × (steps + 1)`.
///
/// Column 0 holds the initial state.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPath {
    size: usize,
    points: usize,
    values: Vec<f64>,
}

impl MultiPath {
    /// Zero path with `size` states on `points` grid points.
    pub fn new(size: usize, points: usize) -> Self {
        Self {
            size,
            points,
            values: vec![0.0; size * points],
        }
    }

    /// Number of state variables.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of grid points, including t = 0.
    #[inline]
    pub fn points(&self) -> usize {
        self.points
    }

    /// Value of `state` at grid point `t`.
    #[inline]
    pub fn get(&self, state: usize, t: usize) -> f64 {
        self.values[state * self.points + t]
    }

    /// Sets the value of `state` at grid point `t`.
    #[inline]
    pub fn set(&mut self, state: usize, t: usize, value: f64) {
        self.values[state * self.points + t] = value;
    }

    /// Time series of one state variable.
    pub fn state_path(&self, state: usize) -> &[f64] {
        &self.values[state * self.points..(state + 1) * self.points]
    }

    /// Copies the full state vector at grid point `t` into `out`.
    pub fn state_at_into(&self, t: usize, out: &mut [f64]) {
        for (s, o) in out.iter_mut().enumerate().take(self.size) {
            *o = self.get(s, t);
        }
    }

    /// Full state vector at grid point `t`.
    pub fn state_at(&self, t: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.size];
        self.state_at_into(t, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut p = MultiPath::new(2, 3);
        p.set(1, 2, 4.0);
        p.set(0, 1, 1.5);
        assert_eq!(p.get(1, 2), 4.0);
        assert_eq!(p.state_path(1), &[0.0, 0.0, 4.0]);
        assert_eq!(p.state_at(1), vec![1.5, 0.0]);
    }
}
