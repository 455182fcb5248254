//! Multi-path generators driving the cross-asset state process.

use std::sync::Arc;

use xrisk_models::CrossAssetStateProcess;

use super::multipath::{MultiPath, Sample};
use crate::error::SimError;
use crate::rng::{PseudoRandomVariates, SobolBrownianVariates, VariateGenerator};

/// Generates full multi-dimensional paths on a fixed time grid.
pub trait MultiPathGeneratorBase: Send {
    /// Next path with its weight.
    fn next(&mut self) -> Result<Sample<MultiPath>, SimError>;

    /// Restarts the deterministic sequence of paths.
    fn reset(&mut self);
}

fn validate_time_grid(time_grid: &[f64]) -> Result<(), SimError> {
    if time_grid.len() < 2 {
        return Err(SimError::config("time grid", "needs t = 0 and at least one step"));
    }
    if time_grid[0] != 0.0 {
        return Err(SimError::config("time grid", format!("must start at 0, got {}", time_grid[0])));
    }
    if time_grid.windows(2).any(|w| w[1] <= w[0]) {
        return Err(SimError::config("time grid", "times must be strictly increasing"));
    }
    Ok(())
}

/// Scratch buffers for evolving one path.
#[derive(Debug, Clone)]
struct PathWorkspace {
    dw: Vec<f64>,
    x: Vec<f64>,
    x_next: Vec<f64>,
}

impl PathWorkspace {
    fn new(process: &CrossAssetStateProcess) -> Self {
        Self {
            dw: vec![0.0; process.factors()],
            x: vec![0.0; process.size()],
            x_next: vec![0.0; process.size()],
        }
    }

    /// Evolves the process along `time_grid` with variates laid out
    /// `[step][width]`, taking `dw[k] = variates[step * width + column(k)]`.
    fn build(
        &mut self,
        process: &CrossAssetStateProcess,
        time_grid: &[f64],
        variates: &[f64],
        width: usize,
        column: impl Fn(usize) -> usize,
    ) -> Result<MultiPath, SimError> {
        let mut path = MultiPath::new(process.size(), time_grid.len());
        self.x.clear();
        self.x.extend(process.initial_values());
        for (s, v) in self.x.iter().enumerate() {
            path.set(s, 0, *v);
        }
        for (step, w) in time_grid.windows(2).enumerate() {
            let row = &variates[step * width..(step + 1) * width];
            for (k, d) in self.dw.iter_mut().enumerate() {
                *d = row[column(k)];
            }
            process.evolve_into(w[0], &self.x, w[1] - w[0], &self.dw, &mut self.x_next)?;
            std::mem::swap(&mut self.x, &mut self.x_next);
            for (s, v) in self.x.iter().enumerate() {
                path.set(s, step + 1, *v);
            }
        }
        Ok(path)
    }
}

/// Path generator over a [`VariateGenerator`], with optional antithetic
/// pairing.
///
/// In antithetic mode every second call reuses the previous variates with
/// flipped sign instead of drawing new ones.
pub struct MultiPathGenerator<V: VariateGenerator> {
    process: Arc<CrossAssetStateProcess>,
    time_grid: Vec<f64>,
    variates: V,
    antithetic: bool,
    next_is_antithetic: bool,
    buffer: Vec<f64>,
    workspace: PathWorkspace,
}

/// Pseudo-random multi-path generator.
pub type MultiPathGeneratorPseudoRandom = MultiPathGenerator<PseudoRandomVariates>;

/// Sobol multi-path generator with optional Brownian bridge.
pub type MultiPathGeneratorLowDiscrepancy = MultiPathGenerator<SobolBrownianVariates>;

impl<V: VariateGenerator> MultiPathGenerator<V> {
    fn with_variates(
        process: Arc<CrossAssetStateProcess>,
        time_grid: &[f64],
        variates: V,
        antithetic: bool,
    ) -> Result<Self, SimError> {
        validate_time_grid(time_grid)?;
        if variates.factors() != process.factors() || variates.steps() + 1 != time_grid.len() {
            return Err(SimError::config(
                "MultiPathGenerator",
                format!(
                    "variate shape {}x{} does not match process factors {} and {} steps",
                    variates.steps(),
                    variates.factors(),
                    process.factors(),
                    time_grid.len() - 1
                ),
            ));
        }
        Ok(Self {
            buffer: vec![0.0; variates.dimension()],
            workspace: PathWorkspace::new(&process),
            process,
            time_grid: time_grid.to_vec(),
            variates,
            antithetic,
            next_is_antithetic: false,
        })
    }

    /// Time grid with t = 0 first.
    pub fn time_grid(&self) -> &[f64] {
        &self.time_grid
    }
}

impl MultiPathGenerator<PseudoRandomVariates> {
    /// Creates a pseudo-random generator seeded from `seed`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use xrisk_core::market_data::curves::FlatCurve;
    /// use xrisk_models::model::CorrelationMatrix;
    /// use xrisk_models::parametrization::LgmConstant;
    /// use xrisk_models::{CrossAssetModel, CrossAssetStateProcess, Discretization};
    /// use xrisk_sim::path::{MultiPathGeneratorBase, MultiPathGeneratorPseudoRandom};
    ///
    /// let lgm = LgmConstant::new("EUR", Arc::new(FlatCurve::new(0.02)), 0.01, 0.03).unwrap();
    /// let model = CrossAssetModel::new(
    ///     vec![Arc::new(lgm)], vec![], vec![], vec![], CorrelationMatrix::identity(1),
    /// ).unwrap();
    /// let process = Arc::new(CrossAssetStateProcess::new(Arc::new(model), Discretization::Exact).unwrap());
    /// let mut gen = MultiPathGeneratorPseudoRandom::new(process, &[0.0, 1.0, 2.0], 42, true).unwrap();
    /// let a = gen.next().unwrap();
    /// let b = gen.next().unwrap();
    /// assert_eq!(a.value.get(0, 2), -b.value.get(0, 2));
    /// ```
    pub fn new(
        process: Arc<CrossAssetStateProcess>,
        time_grid: &[f64],
        seed: u64,
        antithetic: bool,
    ) -> Result<Self, SimError> {
        let steps = time_grid.len().saturating_sub(1);
        let variates = PseudoRandomVariates::new(process.factors(), steps, seed);
        Self::with_variates(process, time_grid, variates, antithetic)
    }
}

impl MultiPathGenerator<SobolBrownianVariates> {
    /// Creates a Sobol generator; `brownian_bridge` orders the variates of
    /// each factor along the time steps.
    pub fn new(
        process: Arc<CrossAssetStateProcess>,
        time_grid: &[f64],
        seed: u64,
        brownian_bridge: bool,
    ) -> Result<Self, SimError> {
        validate_time_grid(time_grid)?;
        let variates =
            SobolBrownianVariates::new(process.factors(), &time_grid[1..], seed, brownian_bridge)?;
        Self::with_variates(process, time_grid, variates, false)
    }
}

impl<V: VariateGenerator> MultiPathGeneratorBase for MultiPathGenerator<V> {
    fn next(&mut self) -> Result<Sample<MultiPath>, SimError> {
        if self.antithetic && self.next_is_antithetic {
            self.buffer.iter_mut().for_each(|v| *v = -*v);
        } else {
            self.variates.next_sequence(&mut self.buffer);
        }
        if self.antithetic {
            self.next_is_antithetic = !self.next_is_antithetic;
        }
        let width = self.process.factors();
        let path = self
            .workspace
            .build(&self.process, &self.time_grid, &self.buffer, width, |k| k)?;
        Ok(Sample {
            value: path,
            weight: 1.0,
        })
    }

    fn reset(&mut self) {
        self.variates.reset();
        self.next_is_antithetic = false;
    }
}

/// Draws wider variate vectors than the process needs and projects the
/// selected components onto the process drivers.
///
/// Used when several models share one variate stream: each model picks the
/// columns of the common `W`-wide draw that drive its own factors.
pub struct ProjectedVariateMultiPathGenerator {
    process: Arc<CrossAssetStateProcess>,
    time_grid: Vec<f64>,
    projection: Vec<usize>,
    variates: Box<dyn VariateGenerator>,
    buffer: Vec<f64>,
    workspace: PathWorkspace,
}

impl ProjectedVariateMultiPathGenerator {
    /// Creates the generator.
    ///
    /// # Errors
    /// `SimError::Configuration` unless `projection.len() == process.factors()`,
    /// every entry is below the inner width, and the inner generator has
    /// one step per time grid interval.
    pub fn new(
        process: Arc<CrossAssetStateProcess>,
        time_grid: &[f64],
        projection: Vec<usize>,
        variates: Box<dyn VariateGenerator>,
    ) -> Result<Self, SimError> {
        validate_time_grid(time_grid)?;
        if projection.len() != process.factors() {
            return Err(SimError::config(
                "ProjectedVariateMultiPathGenerator",
                format!(
                    "projection has {} entries, process needs {} factors",
                    projection.len(),
                    process.factors()
                ),
            ));
        }
        let width = variates.factors();
        if let Some(&bad) = projection.iter().find(|&&p| p >= width) {
            return Err(SimError::config(
                "ProjectedVariateMultiPathGenerator",
                format!("projection index {bad} not below variate width {width}"),
            ));
        }
        if variates.steps() + 1 != time_grid.len() {
            return Err(SimError::config(
                "ProjectedVariateMultiPathGenerator",
                format!(
                    "variate generator has {} steps, time grid has {}",
                    variates.steps(),
                    time_grid.len() - 1
                ),
            ));
        }
        Ok(Self {
            buffer: vec![0.0; variates.dimension()],
            workspace: PathWorkspace::new(&process),
            process,
            time_grid: time_grid.to_vec(),
            projection,
            variates,
        })
    }
}

impl MultiPathGeneratorBase for ProjectedVariateMultiPathGenerator {
    fn next(&mut self) -> Result<Sample<MultiPath>, SimError> {
        self.variates.next_sequence(&mut self.buffer);
        let projection = &self.projection;
        let path = self.workspace.build(
            &self.process,
            &self.time_grid,
            &self.buffer,
            self.variates.factors(),
            |k| projection[k],
        )?;
        Ok(Sample {
            value: path,
            weight: 1.0,
        })
    }

    fn reset(&mut self) {
        self.variates.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use xrisk_core::market_data::curves::FlatCurve;
    use xrisk_models::model::CorrelationMatrix;
    use xrisk_models::parametrization::{FxBsConstant, LgmConstant};
    use xrisk_models::{CrossAssetModel, Discretization};

    fn process() -> Arc<CrossAssetStateProcess> {
        let eur = LgmConstant::new("EUR", Arc::new(FlatCurve::new(0.02)), 0.01, 0.03).unwrap();
        let usd = LgmConstant::new("USD", Arc::new(FlatCurve::new(0.03)), 0.012, 0.02).unwrap();
        let fx = FxBsConstant::new("USD", 0.9, 0.1).unwrap();
        let corr = CorrelationMatrix::from_pairs(3, &[(0, 1, 0.4), (0, 2, 0.1)]).unwrap();
        let model = CrossAssetModel::new(
            vec![Arc::new(eur), Arc::new(usd)],
            vec![Arc::new(fx)],
            vec![],
            vec![],
            corr,
        )
        .unwrap();
        Arc::new(CrossAssetStateProcess::new(Arc::new(model), Discretization::Exact).unwrap())
    }

    const GRID: [f64; 4] = [0.0, 0.5, 1.0, 2.0];

    #[test]
    fn test_path_shape_and_initial_values() {
        let p = process();
        let mut gen = MultiPathGeneratorPseudoRandom::new(p.clone(), &GRID, 1, false).unwrap();
        let sample = gen.next().unwrap();
        assert_eq!(sample.weight, 1.0);
        assert_eq!(sample.value.size(), 3);
        assert_eq!(sample.value.points(), 4);
        assert_eq!(sample.value.state_at(0), p.initial_values());
    }

    #[test]
    fn test_reset_reproduces_paths() {
        let mut gen = MultiPathGeneratorPseudoRandom::new(process(), &GRID, 7, true).unwrap();
        let first = gen.next().unwrap();
        gen.next().unwrap();
        gen.next().unwrap();
        gen.reset();
        assert_eq!(gen.next().unwrap(), first);
    }

    #[test]
    fn test_antithetic_pairs_mirror_ir_states() {
        let mut gen = MultiPathGeneratorPseudoRandom::new(process(), &GRID, 3, true).unwrap();
        let a = gen.next().unwrap().value;
        let b = gen.next().unwrap().value;
        // the IR states have zero drift in the LGM measure
        for t in 0..GRID.len() {
            assert_relative_eq!(a.get(0, t), -b.get(0, t), epsilon = 1e-14);
        }
        let c = gen.next().unwrap().value;
        assert!((c.get(0, 3) + b.get(0, 3)).abs() > 1e-12);
    }

    #[test]
    fn test_low_discrepancy_mean_of_ir_state() {
        let mut gen = MultiPathGeneratorLowDiscrepancy::new(process(), &GRID, 11, true).unwrap();
        let n = 2048;
        let mut mean = 0.0;
        for _ in 0..n {
            mean += gen.next().unwrap().value.get(0, 3) / n as f64;
        }
        // sd of z(2) is 0.01 * sqrt(2)
        assert!(mean.abs() < 1e-3, "mean {mean}");
    }

    #[test]
    fn test_projection_validation() {
        let p = process();
        let inner = Box::new(PseudoRandomVariates::new(5, 3, 1));
        assert!(ProjectedVariateMultiPathGenerator::new(p.clone(), &GRID, vec![0, 1], inner).is_err());
        let inner = Box::new(PseudoRandomVariates::new(5, 3, 1));
        assert!(ProjectedVariateMultiPathGenerator::new(p.clone(), &GRID, vec![0, 1, 5], inner).is_err());
        let inner = Box::new(PseudoRandomVariates::new(5, 3, 1));
        assert!(ProjectedVariateMultiPathGenerator::new(p, &GRID, vec![4, 0, 2], inner).is_ok());
    }

    #[test]
    fn test_identity_projection_matches_plain_generator() {
        let p = process();
        let inner = Box::new(PseudoRandomVariates::new(3, 3, 21));
        let mut projected =
            ProjectedVariateMultiPathGenerator::new(p.clone(), &GRID, vec![0, 1, 2], inner).unwrap();
        let mut plain = MultiPathGeneratorPseudoRandom::new(p, &GRID, 21, false).unwrap();
        assert_eq!(projected.next().unwrap(), plain.next().unwrap());
    }

    #[test]
    fn test_rejects_grid_not_starting_at_zero() {
        assert!(MultiPathGeneratorPseudoRandom::new(process(), &[0.5, 1.0], 1, false).is_err());
    }
}
