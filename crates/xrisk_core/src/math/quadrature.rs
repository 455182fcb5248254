//! One-dimensional numerical integration.
//!
//! The cross-asset model evaluates all of its expectation and covariance
//! integrals through the [`Integrator`] trait, so the scheme can be swapped
//! without touching the model code.

use super::error::MathError;

/// Integrates a scalar function over `[a, b]`.
pub trait Integrator: Send + Sync + std::fmt::Debug {
    /// Returns ∫ₐᵇ f(x) dx.
    fn integrate(&self, f: &dyn Fn(f64) -> f64, a: f64, b: f64) -> Result<f64, MathError>;
}

/// Adaptive Simpson rule by successive interval halving.
///
/// Stops once two successive estimates differ by less than `accuracy`
/// (absolute), after at least `min_iterations` halvings.
#[derive(Debug, Clone, Copy)]
pub struct SimpsonIntegral {
    accuracy: f64,
    max_iterations: usize,
    min_iterations: usize,
}

impl SimpsonIntegral {
    /// Creates a Simpson integrator.
    pub fn new(accuracy: f64, max_iterations: usize) -> Self {
        Self {
            accuracy,
            max_iterations,
            min_iterations: 4,
        }
    }
}

impl Default for SimpsonIntegral {
    fn default() -> Self {
        Self::new(1.0e-10, 20)
    }
}

impl Integrator for SimpsonIntegral {
    fn integrate(&self, f: &dyn Fn(f64) -> f64, a: f64, b: f64) -> Result<f64, MathError> {
        if a == b {
            return Ok(0.0);
        }
        let mut n = 1usize;
        let mut h = b - a;
        let mut trapezoid = 0.5 * h * (f(a) + f(b));
        let mut simpson_prev = trapezoid;
        for iteration in 1..=self.max_iterations {
            // refine trapezoid with midpoints
            let mut sum = 0.0;
            let mut x = a + 0.5 * h;
            for _ in 0..n {
                sum += f(x);
                x += h;
            }
            let new_trapezoid = 0.5 * (trapezoid + h * sum);
            let simpson = (4.0 * new_trapezoid - trapezoid) / 3.0;
            if iteration >= self.min_iterations && (simpson - simpson_prev).abs() <= self.accuracy {
                return Ok(simpson);
            }
            simpson_prev = simpson;
            trapezoid = new_trapezoid;
            n *= 2;
            h *= 0.5;
        }
        Err(MathError::IntegrationFailed { a, b })
    }
}

/// Fixed-order Gauss-Legendre quadrature.
///
/// Exact for polynomials up to degree `2n - 1`; the natural choice for the
/// smooth exponential integrands of the LGM and Black-Scholes components
/// once the range is split at parameter breakpoints.
///
/// ```
/// use xrisk_core::math::{GaussLegendre, Integrator};
///
/// let gl = GaussLegendre::new(8);
/// let v = gl.integrate(&|x: f64| x.powi(5), 0.0, 2.0).unwrap();
/// assert!((v - 64.0 / 6.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Computes the `order`-point rule on [-1, 1] by Newton iteration on
    /// the Legendre polynomial roots.
    pub fn new(order: usize) -> Self {
        let n = order.max(1);
        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];
        let m = n.div_ceil(2);
        for i in 0..m {
            let mut z = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            let mut pp = 0.0;
            for _ in 0..100 {
                let mut p1 = 1.0;
                let mut p2 = 0.0;
                for j in 0..n {
                    let p3 = p2;
                    p2 = p1;
                    p1 = ((2.0 * j as f64 + 1.0) * z * p2 - j as f64 * p3) / (j as f64 + 1.0);
                }
                pp = n as f64 * (z * p1 - p2) / (z * z - 1.0);
                let z1 = z;
                z = z1 - p1 / pp;
                if (z - z1).abs() < 1e-15 {
                    break;
                }
            }
            nodes[i] = -z;
            nodes[n - 1 - i] = z;
            let w = 2.0 / ((1.0 - z * z) * pp * pp);
            weights[i] = w;
            weights[n - 1 - i] = w;
        }
        Self { nodes, weights }
    }

    /// Number of nodes.
    pub fn order(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for GaussLegendre {
    fn default() -> Self {
        Self::new(16)
    }
}

impl Integrator for GaussLegendre {
    fn integrate(&self, f: &dyn Fn(f64) -> f64, a: f64, b: f64) -> Result<f64, MathError> {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (b + a);
        Ok(self
            .nodes
            .iter()
            .zip(self.weights.iter())
            .map(|(x, w)| w * f(mid + half * x))
            .sum::<f64>()
            * half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_simpson_exponential() {
        let v = SimpsonIntegral::default()
            .integrate(&|x: f64| (-0.3 * x).exp(), 0.0, 5.0)
            .unwrap();
        assert_relative_eq!(v, (1.0 - (-1.5_f64).exp()) / 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_simpson_reports_non_convergence() {
        let s = SimpsonIntegral::new(1e-16, 5);
        let r = s.integrate(&|x: f64| (50.0 * x).sin(), 0.0, 10.0);
        assert!(matches!(r, Err(MathError::IntegrationFailed { .. })));
    }

    #[test]
    fn test_gauss_legendre_weights_sum_to_two() {
        for n in [1, 2, 5, 16, 32] {
            let gl = GaussLegendre::new(n);
            assert_relative_eq!(gl.weights.iter().sum::<f64>(), 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_empty_interval() {
        let v = GaussLegendre::default().integrate(&|x| x, 1.0, 1.0).unwrap();
        assert_eq!(v, 0.0);
    }
}
