//! Brent's method root-finding solver.
//!
//! Used by the FX calibration bootstrap and the delta-gamma quantile search.

use super::error::MathError;

/// Solver configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Absolute tolerance on x and f(x).
    pub tolerance: f64,
    /// Maximum iterations.
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 200,
        }
    }
}

/// Brent root finder combining bisection, secant and inverse quadratic
/// interpolation.
///
/// # Examples
///
/// ```
/// use xrisk_core::math::BrentSolver;
///
/// let solver = BrentSolver::with_defaults();
/// let root = solver.find_root(|x| x * x - 2.0, 0.0, 2.0).unwrap();
/// assert!((root - 2.0_f64.sqrt()).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BrentSolver {
    config: SolverConfig,
}

impl BrentSolver {
    /// Creates a solver with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Creates a solver with default tolerance and iteration limit.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Finds a root of `f` in `[a, b]`.
    ///
    /// # Errors
    /// - `MathError::NoBracket` if `f(a)` and `f(b)` have the same sign
    /// - `MathError::MaxIterationsExceeded` if the iteration limit is hit
    pub fn find_root<F>(&self, f: F, a: f64, b: f64) -> Result<f64, MathError>
    where
        F: Fn(f64) -> f64,
    {
        let mut a = a;
        let mut b = b;
        let mut fa = f(a);
        let mut fb = f(b);

        if fa == 0.0 {
            return Ok(a);
        }
        if fb == 0.0 {
            return Ok(b);
        }
        if fa * fb > 0.0 {
            return Err(MathError::NoBracket { a, b });
        }

        let mut c = a;
        let mut fc = fa;
        let mut d = b - a;
        let mut e = d;

        for _ in 0..self.config.max_iterations {
            if fb * fc > 0.0 {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol = 2.0 * f64::EPSILON * b.abs() + 0.5 * self.config.tolerance;
            let m = 0.5 * (c - b);
            if m.abs() <= tol || fb.abs() < self.config.tolerance {
                return Ok(b);
            }

            if e.abs() >= tol && fa.abs() > fb.abs() {
                let s = fb / fa;
                let (mut p, mut q) = if a == c {
                    (2.0 * m * s, 1.0 - s)
                } else {
                    let q0 = fa / fc;
                    let r = fb / fc;
                    (
                        s * (2.0 * m * q0 * (q0 - r) - (b - a) * (r - 1.0)),
                        (q0 - 1.0) * (r - 1.0) * (s - 1.0),
                    )
                };
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let min1 = 3.0 * m * q - (tol * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = m;
                    e = d;
                }
            } else {
                d = m;
                e = d;
            }

            a = b;
            fa = fb;
            b += if d.abs() > tol { d } else { tol.copysign(m) };
            fb = f(b);
        }

        Err(MathError::MaxIterationsExceeded {
            iterations: self.config.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_cubic_root() {
        let root = BrentSolver::with_defaults()
            .find_root(|x| x * x * x - x - 2.0, 1.0, 2.0)
            .unwrap();
        assert_abs_diff_eq!(root * root * root - root - 2.0, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_no_bracket() {
        let r = BrentSolver::with_defaults().find_root(|x| x * x + 1.0, -1.0, 1.0);
        assert!(matches!(r, Err(MathError::NoBracket { .. })));
    }

    #[test]
    fn test_root_at_endpoint() {
        let r = BrentSolver::with_defaults().find_root(|x| x - 1.0, 1.0, 3.0).unwrap();
        assert_eq!(r, 1.0);
    }
}
