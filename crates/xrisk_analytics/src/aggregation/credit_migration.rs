//! Credit migration loss distribution.
//!
//! Each entity migrates between rating states according to a one-year
//! transition matrix rescaled to the horizon through its generator. A
//! one-factor Gaussian copula conditions migration on the simulated
//! systemic credit factors (`CreditState` scenario data named `"0"`,
//! `"1"`, ...). The last state is default; an entity in default loses its
//! netting set's positive netted exposure. P&L distributions of all
//! entities are convolved on a bucket grid per sample and averaged.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use xrisk_core::math::{cumulative_normal, inverse_cumulative_normal};
use xrisk_core::types::DayCountConvention;
use xrisk_sim::cube::{AggregationScenarioData, AggregationScenarioDataType, NpvCube};

use crate::error::AggregationError;
use crate::portfolio::NettingSetId;

const TOLERANCE: f64 = 1e-8;

/// An entity subject to migration.
#[derive(Clone, Debug, PartialEq)]
pub struct MigrationEntity {
    /// Entity name
    pub name: String,
    /// Netting set whose exposure is lost on default
    pub netting_set_id: NettingSetId,
    /// One-year transition matrix, rows summing to 1, last state default
    pub transition_matrix: DMatrix<f64>,
    /// Current state
    pub initial_state: usize,
    /// Loadings on the systemic factors
    pub loadings: Vec<f64>,
}

/// Inputs of the credit migration calculator.
#[derive(Clone, Debug, PartialEq)]
pub struct CreditMigrationParameters {
    /// Entities
    pub entities: Vec<MigrationEntity>,
    /// Correlation of the systemic factors
    pub factor_correlation: DMatrix<f64>,
    /// Lower bound of the P&L grid
    pub lower_bound: f64,
    /// Upper bound of the P&L grid
    pub upper_bound: f64,
    /// Number of buckets
    pub buckets: usize,
}

impl CreditMigrationParameters {
    /// Checks matrices, states, loadings and the bucket grid.
    pub fn validate(&self) -> Result<(), AggregationError> {
        let factors = self.factor_correlation.nrows();
        if self.factor_correlation.ncols() != factors {
            return Err(AggregationError::config("factor_correlation", "matrix is not square"));
        }
        xrisk_core::math::linalg::check_symmetric(&self.factor_correlation, TOLERANCE)?;
        if !(self.lower_bound < self.upper_bound) {
            return Err(AggregationError::config(
                "distribution bounds",
                format!("lower {} must be below upper {}", self.lower_bound, self.upper_bound),
            ));
        }
        if self.buckets == 0 {
            return Err(AggregationError::config("buckets", "at least one bucket required"));
        }
        for e in &self.entities {
            check_transition_matrix(&e.transition_matrix).map_err(|m| AggregationError::config(&e.name, m))?;
            if e.initial_state >= e.transition_matrix.nrows() {
                return Err(AggregationError::config(
                    &e.name,
                    format!("initial state {} out of range ({} states)", e.initial_state, e.transition_matrix.nrows()),
                ));
            }
            if e.loadings.len() != factors {
                return Err(AggregationError::config(
                    &e.name,
                    format!("{} loadings for {} factors", e.loadings.len(), factors),
                ));
            }
            if systemic_variance(&e.loadings, &self.factor_correlation) > 1.0 + TOLERANCE {
                return Err(AggregationError::config(&e.name, "systemic variance exceeds 1"));
            }
        }
        Ok(())
    }
}

fn check_transition_matrix(m: &DMatrix<f64>) -> Result<(), String> {
    if m.nrows() != m.ncols() || m.nrows() < 2 {
        return Err(format!("transition matrix is {}x{}", m.nrows(), m.ncols()));
    }
    for (i, row) in m.row_iter().enumerate() {
        if row.iter().any(|p| !(-TOLERANCE..=1.0 + TOLERANCE).contains(p)) {
            return Err(format!("row {i} has entries outside [0, 1]"));
        }
        let sum: f64 = row.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(format!("row {i} sums to {sum}"));
        }
    }
    Ok(())
}

fn systemic_variance(loadings: &[f64], correlation: &DMatrix<f64>) -> f64 {
    let n = loadings.len();
    let mut v = 0.0;
    for i in 0..n {
        for j in 0..n {
            v += loadings[i] * correlation[(i, j)] * loadings[j];
        }
    }
    v
}

/// Generator of a transition matrix: `log(M)` by series, with negative
/// off-diagonal rates removed and rows summing to zero.
///
/// # Errors
/// `Configuration` when the series does not converge.
pub fn generator(m: &DMatrix<f64>) -> Result<DMatrix<f64>, AggregationError> {
    let n = m.nrows();
    let a = m - DMatrix::<f64>::identity(n, n);
    let mut power = a.clone();
    let mut log = a.clone();
    let mut converged = false;
    for k in 2..=200 {
        power = &power * &a;
        let term = &power / k as f64;
        if k % 2 == 0 {
            log -= &term;
        } else {
            log += &term;
        }
        let norm = term.amax();
        if !norm.is_finite() {
            break;
        }
        if norm < 1e-15 {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(AggregationError::config("transition matrix", "matrix logarithm series does not converge"));
    }
    for i in 0..n {
        let mut off = 0.0;
        for j in 0..n {
            if i != j {
                if log[(i, j)] < 0.0 {
                    log[(i, j)] = 0.0;
                }
                off += log[(i, j)];
            }
        }
        log[(i, i)] = -off;
    }
    Ok(log)
}

/// Clamps negative entries to zero and renormalises rows.
fn sanitise_rows(m: &mut DMatrix<f64>) {
    for mut row in m.row_iter_mut() {
        row.iter_mut().for_each(|p| *p = p.max(0.0));
        let sum: f64 = row.iter().sum();
        if sum > 0.0 {
            row.iter_mut().for_each(|p| *p /= sum);
        }
    }
}

/// Probability `p` conditional on the systemic factor mean `m` and
/// systemic variance `v`.
pub fn conditional_prob(p: f64, m: f64, v: f64) -> f64 {
    if p.abs() < 1e-12 {
        return 0.0;
    }
    if (p - 1.0).abs() < 1e-12 {
        return 1.0;
    }
    let threshold = inverse_cumulative_normal(p);
    if (v - 1.0).abs() < 1e-12 {
        return if threshold >= m { 1.0 } else { 0.0 };
    }
    cumulative_normal((threshold - m) / (1.0 - v).sqrt())
}

/// Equal-width buckets on `[lower, upper]`; values outside land in the
/// first or last bucket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bucketing {
    lower: f64,
    upper: f64,
    buckets: usize,
}

impl Bucketing {
    /// Grid of `buckets` buckets.
    pub fn new(lower: f64, upper: f64, buckets: usize) -> Result<Self, AggregationError> {
        if !(lower < upper) || buckets == 0 {
            return Err(AggregationError::config(
                "bucketing",
                format!("invalid grid [{lower}, {upper}] with {buckets} buckets"),
            ));
        }
        Ok(Self { lower, upper, buckets })
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets
    }

    /// Always false; a grid has at least one bucket.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn width(&self) -> f64 {
        (self.upper - self.lower) / self.buckets as f64
    }

    /// Bucket holding `x`; buckets include their upper bound.
    pub fn index(&self, x: f64) -> usize {
        let i = ((x - self.lower) / self.width()).ceil() - 1.0;
        if i <= 0.0 || i.is_nan() {
            0
        } else {
            (i as usize).min(self.buckets - 1)
        }
    }

    /// Upper bound of every bucket.
    pub fn upper_bucket_bounds(&self) -> Vec<f64> {
        let h = self.width();
        (0..self.buckets).map(|i| self.lower + (i + 1) as f64 * h).collect()
    }
}

/// P&L distribution per time step.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CreditMigrationResult {
    /// Upper bound of each bucket
    pub upper_bucket_bounds: Vec<f64>,
    /// Cube date indices of the time steps
    pub time_steps: Vec<usize>,
    /// Bucket probabilities per time step
    pub pdf: Vec<Vec<f64>>,
    /// Cumulative probabilities per time step
    pub cdf: Vec<Vec<f64>>,
}

/// Migration P&L distribution from a netted exposure cube.
pub struct CreditMigrationCalculator<'a> {
    params: &'a CreditMigrationParameters,
    netted_cube: &'a (dyn NpvCube + Sync),
    scenario_data: &'a AggregationScenarioData,
    day_counter: DayCountConvention,
    bucketing: Bucketing,
    generators: Vec<DMatrix<f64>>,
    systemic_variance: Vec<f64>,
    exposure_index: Vec<usize>,
    cache: BTreeMap<usize, Vec<DMatrix<f64>>>,
}

impl<'a> CreditMigrationCalculator<'a> {
    /// Validates the parameters and computes the generators.
    ///
    /// # Errors
    /// `Configuration` for invalid parameters or an entity whose netting
    /// set is not in the netted cube.
    pub fn new(
        params: &'a CreditMigrationParameters,
        netted_cube: &'a (dyn NpvCube + Sync),
        scenario_data: &'a AggregationScenarioData,
        day_counter: DayCountConvention,
    ) -> Result<Self, AggregationError> {
        params.validate()?;
        let bucketing = Bucketing::new(params.lower_bound, params.upper_bound, params.buckets)?;
        let generators = params
            .entities
            .iter()
            .map(|e| generator(&e.transition_matrix).map_err(|err| AggregationError::config(&e.name, err.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        let systemic = params
            .entities
            .iter()
            .map(|e| systemic_variance(&e.loadings, &params.factor_correlation))
            .collect();
        let exposure_index = params
            .entities
            .iter()
            .map(|e| {
                netted_cube
                    .index_of(e.netting_set_id.as_str())
                    .map_err(|_| AggregationError::config(&e.name, format!("netting set {} not in netted cube", e.netting_set_id)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            params,
            netted_cube,
            scenario_data,
            day_counter,
            bucketing,
            generators,
            systemic_variance: systemic,
            exposure_index,
            cache: BTreeMap::new(),
        })
    }

    fn time(&self, date: usize) -> Result<f64, AggregationError> {
        let dates = self.netted_cube.dates();
        let d = dates.get(date).ok_or_else(|| {
            AggregationError::InputMismatch(format!("time step {date} out of range ({} dates)", dates.len()))
        })?;
        let t = self.day_counter.year_fraction(self.netted_cube.asof(), *d);
        if t <= 0.0 {
            return Err(AggregationError::config("time step", format!("date index {date} is not after the as-of date")));
        }
        Ok(t)
    }

    /// Transition matrices of all entities rescaled to cube date `date`,
    /// `exp(t G)`. Cached per date.
    pub fn rescaled_transition_matrices(&mut self, date: usize) -> Result<&[DMatrix<f64>], AggregationError> {
        if !self.cache.contains_key(&date) {
            let t = self.time(date)?;
            let matrices = self
                .generators
                .iter()
                .map(|g| {
                    let mut m = (g * t).exp();
                    sanitise_rows(&mut m);
                    m
                })
                .collect();
            debug!(date, t, "rescaled transition matrices");
            self.cache.insert(date, matrices);
        }
        Ok(self.cache.get(&date).map(Vec::as_slice).unwrap_or_default())
    }

    /// Average P&L distribution at each of `time_steps`.
    pub fn compute(&mut self, time_steps: &[usize]) -> Result<CreditMigrationResult, AggregationError> {
        let mut pdfs = Vec::with_capacity(time_steps.len());
        let mut cdfs = Vec::with_capacity(time_steps.len());
        for &date in time_steps {
            self.rescaled_transition_matrices(date)?;
            let pdf = self.distribution(date)?;
            let cdf = pdf
                .iter()
                .scan(0.0, |acc, p| {
                    *acc += p;
                    Some(*acc)
                })
                .collect();
            pdfs.push(pdf);
            cdfs.push(cdf);
        }
        info!(entities = self.params.entities.len(), steps = time_steps.len(), "credit migration done");
        Ok(CreditMigrationResult {
            upper_bucket_bounds: self.bucketing.upper_bucket_bounds(),
            time_steps: time_steps.to_vec(),
            pdf: pdfs,
            cdf: cdfs,
        })
    }

    fn distribution(&self, date: usize) -> Result<Vec<f64>, AggregationError> {
        let matrices = self
            .cache
            .get(&date)
            .ok_or_else(|| AggregationError::InputMismatch(format!("no transition matrices for date {date}")))?;
        let t = self.time(date)?;
        let samples = self.netted_cube.samples();
        let n = self.bucketing.len();
        let (sum, sanitised) = (0..samples)
            .into_par_iter()
            .map(|s| self.sample_distribution(matrices, date, s, t))
            .try_reduce(
                || (vec![0.0; n], 0usize),
                |(mut a, ca), (b, cb)| {
                    a.iter_mut().zip(&b).for_each(|(x, y)| *x += y);
                    Ok((a, ca + cb))
                },
            )?;
        if sanitised > 0 {
            warn!(date, rows = sanitised, "sanitised invalid conditional migration probabilities");
        }
        let inv = if samples > 0 { 1.0 / samples as f64 } else { 0.0 };
        Ok(sum.into_iter().map(|p| p * inv).collect())
    }

    fn sample_distribution(
        &self,
        matrices: &[DMatrix<f64>],
        date: usize,
        sample: usize,
        t: f64,
    ) -> Result<(Vec<f64>, usize), AggregationError> {
        let factors = self.params.factor_correlation.nrows();
        let state = (0..factors)
            .map(|j| {
                self.scenario_data
                    .get(date, sample, AggregationScenarioDataType::CreditState, &j.to_string())
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let n = self.bucketing.len();
        let mut prob = vec![0.0; n];
        let mut mean = vec![0.0; n];
        prob[self.bucketing.index(0.0)] = 1.0;
        let mut sanitised = 0;

        for (i, entity) in self.params.entities.iter().enumerate() {
            let m = entity.loadings.iter().zip(&state).map(|(l, f)| l * f).sum::<f64>() / t.sqrt();
            let row = matrices[i].row(entity.initial_state);
            let (mut cumulative, mut previous) = (0.0, 0.0);
            let mut cond: Vec<f64> = row
                .iter()
                .map(|p| {
                    cumulative += p;
                    let c = conditional_prob(cumulative.min(1.0), m, self.systemic_variance[i]);
                    let q = c - previous;
                    previous = c;
                    q
                })
                .collect();
            let sum: f64 = cond.iter().sum();
            if cond.iter().any(|q| *q < -TOLERANCE) || (sum - 1.0).abs() > 1e-6 {
                sanitised += 1;
                cond.iter_mut().for_each(|q| *q = q.max(0.0));
                let s: f64 = cond.iter().sum();
                if s > 0.0 {
                    cond.iter_mut().for_each(|q| *q /= s);
                }
            }

            let exposure = self.netted_cube.get(self.exposure_index[i], date, sample, 0)?;
            let default_pnl = -exposure.max(0.0);
            let last = cond.len() - 1;

            let mut next_prob = vec![0.0; n];
            let mut next_mean = vec![0.0; n];
            for b in 0..n {
                if prob[b] <= 0.0 {
                    continue;
                }
                for (j, q) in cond.iter().enumerate() {
                    if *q <= 0.0 {
                        continue;
                    }
                    let value = mean[b] + if j == last { default_pnl } else { 0.0 };
                    let k = self.bucketing.index(value);
                    let w = prob[b] * q;
                    next_prob[k] += w;
                    next_mean[k] += w * value;
                }
            }
            for k in 0..n {
                if next_prob[k] > 0.0 {
                    next_mean[k] /= next_prob[k];
                }
            }
            prob = next_prob;
            mean = next_mean;
        }
        Ok((prob, sanitised))
    }
}
