//! Scenario generators driven by the cross-asset model.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;
use xrisk_core::types::{Date, DayCountConvention};
use xrisk_models::{CrossAssetModel, CrossAssetStateProcess};

use super::key::{KeyType, RiskFactorKey};
use super::simple::{Scenario, ScenarioFactory, SimpleScenarioFactory};
use crate::error::SimError;
use crate::market::SimMarketConfig;
use crate::path::{
    MultiPath, MultiPathGeneratorBase, MultiPathGeneratorLowDiscrepancy,
    MultiPathGeneratorPseudoRandom,
};
use crate::rng::SimRng;

/// Produces one scenario per simulation date, path after path.
///
/// Callers request the dates of a path in order; after the last date the
/// next request starts a new path.
pub trait ScenarioGenerator: Send {
    /// Scenario at `date` on the current path.
    fn next(&mut self, date: Date) -> Result<Box<dyn Scenario>, SimError>;

    /// Restarts the deterministic sequence of paths.
    fn reset(&mut self);

    /// Scenario of today's market for the T0 valuation.
    fn t0_scenario(&self) -> Result<Box<dyn Scenario>, SimError> {
        Err(SimError::config("scenario generator", "no t0 scenario available"))
    }
}

/// Builds a scenario generator for the given simulation dates and seed
/// offset. Parallel valuation creates one generator per sample slice.
pub type ScenarioGeneratorBuilder =
    Arc<dyn Fn(&[Date], u64) -> Result<Box<dyn ScenarioGenerator>, SimError> + Send + Sync>;

/// Variate sequence driving the model paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SequenceType {
    /// `StdRng` normals
    #[default]
    PseudoRandom,
    /// `StdRng` normals in antithetic pairs
    PseudoRandomAntithetic,
    /// Scrambled Sobol points
    Sobol,
    /// Scrambled Sobol points with Brownian bridge ordering
    SobolBrownianBridge,
}

/// Path generation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeneratorSettings {
    /// Variate sequence
    pub sequence: SequenceType,
    /// Seed of the sequence
    pub seed: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            sequence: SequenceType::PseudoRandom,
            seed: 42,
        }
    }
}

/// Model indices behind each market quantity of the layout.
#[derive(Debug, Clone)]
struct ModelLayout {
    currencies: Vec<(String, usize)>,
    indices: Vec<(String, usize)>,
    fx: Vec<(String, usize)>,
    equities: Vec<(String, usize)>,
    credits: Vec<(String, usize)>,
}

impl ModelLayout {
    fn resolve(model: &CrossAssetModel, config: &SimMarketConfig) -> Result<Self, SimError> {
        if config.base_currency != model.domestic_currency() {
            return Err(SimError::config(
                &config.base_currency,
                format!(
                    "base currency must be the model's domestic currency {}",
                    model.domestic_currency()
                ),
            ));
        }
        let ccy = |c: &str| {
            model
                .currency_index(c)
                .ok_or_else(|| SimError::config(c, "currency not in the cross-asset model"))
        };
        let currencies = config
            .currencies
            .iter()
            .map(|c| Ok((c.clone(), ccy(c)?)))
            .collect::<Result<Vec<_>, SimError>>()?;
        let indices = config
            .indices
            .iter()
            .map(|i| Ok((i.name.clone(), ccy(&i.currency)?)))
            .collect::<Result<Vec<_>, SimError>>()?;
        let fx = config
            .fx_currencies()
            .map(|c| Ok((c.to_string(), ccy(c)? - 1)))
            .collect::<Result<Vec<_>, SimError>>()?;
        let equities = config
            .equities
            .iter()
            .map(|e| {
                model
                    .eq_index_by_name(e)
                    .map(|k| (e.clone(), k))
                    .ok_or_else(|| SimError::config(e, "equity not in the cross-asset model"))
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        let credits = config
            .credit_names
            .iter()
            .map(|n| {
                model
                    .cr_index_by_name(n)
                    .map(|c| (n.clone(), c))
                    .ok_or_else(|| SimError::config(n, "credit name not in the cross-asset model"))
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        Ok(Self {
            currencies,
            indices,
            fx,
            equities,
            credits,
        })
    }
}

/// Scenario generator sampling the cross-asset model.
///
/// Per date it writes the numeraire, discount and index curve nodes
/// `P(t, t + τ_k)`, FX spots `exp(x)`, equity spots, CIR++ survival
/// probability nodes and, if configured, Brownian systemic credit factors
/// correlated by `credit_state_correlation`.
pub struct CrossAssetModelScenarioGenerator {
    model: Arc<CrossAssetModel>,
    paths: Box<dyn MultiPathGeneratorBase>,
    factory: Arc<dyn ScenarioFactory>,
    config: Arc<SimMarketConfig>,
    layout: ModelLayout,
    discount_times: Vec<f64>,
    survival_times: Vec<f64>,
    asof: Date,
    dates: Vec<Date>,
    times: Vec<f64>,
    credit_rng: SimRng,
    credit_root: Option<DMatrix<f64>>,
    credit_draws: Vec<f64>,
    credit_state: Vec<f64>,
    initial_state: Vec<f64>,
    path: Option<MultiPath>,
    cursor: usize,
    state: Vec<f64>,
}

impl CrossAssetModelScenarioGenerator {
    /// Creates the generator for `dates` (strictly after `asof`).
    ///
    /// The process cache is warmed on the simulation time grid.
    pub fn new(
        process: Arc<CrossAssetStateProcess>,
        config: Arc<SimMarketConfig>,
        asof: Date,
        dates: &[Date],
        day_counter: DayCountConvention,
        settings: GeneratorSettings,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let credit_root = config.credit_state_root()?;
        let model = Arc::clone(process.model());
        let layout = ModelLayout::resolve(&model, &config)?;
        let times: Vec<f64> = dates.iter().map(|d| day_counter.year_fraction(asof, *d)).collect();
        let time_grid: Vec<f64> = std::iter::once(0.0).chain(times.iter().copied()).collect();
        process.warm_up(&time_grid)?;
        let paths: Box<dyn MultiPathGeneratorBase> = match settings.sequence {
            SequenceType::PseudoRandom => Box::new(MultiPathGeneratorPseudoRandom::new(
                Arc::clone(&process),
                &time_grid,
                settings.seed,
                false,
            )?),
            SequenceType::PseudoRandomAntithetic => Box::new(MultiPathGeneratorPseudoRandom::new(
                Arc::clone(&process),
                &time_grid,
                settings.seed,
                true,
            )?),
            SequenceType::Sobol => Box::new(MultiPathGeneratorLowDiscrepancy::new(
                Arc::clone(&process),
                &time_grid,
                settings.seed,
                false,
            )?),
            SequenceType::SobolBrownianBridge => Box::new(MultiPathGeneratorLowDiscrepancy::new(
                Arc::clone(&process),
                &time_grid,
                settings.seed,
                true,
            )?),
        };
        debug!(
            dates = dates.len(),
            sequence = ?settings.sequence,
            seed = settings.seed,
            "cross-asset scenario generator created"
        );
        Ok(Self {
            discount_times: config.discount_times(),
            survival_times: config.survival_times(),
            credit_rng: SimRng::from_seed(settings.seed ^ 0x5DEE_CE66_D1CE_5EED),
            credit_root,
            credit_draws: vec![0.0; config.credit_state_factors],
            credit_state: vec![0.0; config.credit_state_factors],
            state: vec![0.0; model.state_size()],
            initial_state: process.initial_values(),
            model,
            paths,
            factory: Arc::new(SimpleScenarioFactory),
            config,
            layout,
            asof,
            dates: dates.to_vec(),
            times,
            path: None,
            cursor: 0,
        })
    }

    /// Replaces the scenario factory.
    pub fn with_factory(mut self, factory: Arc<dyn ScenarioFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Builder for parallel valuation: each call creates a generator on the
    /// requested dates seeded with `settings.seed + offset`.
    pub fn builder(
        process: Arc<CrossAssetStateProcess>,
        config: Arc<SimMarketConfig>,
        asof: Date,
        day_counter: DayCountConvention,
        settings: GeneratorSettings,
    ) -> ScenarioGeneratorBuilder {
        Arc::new(move |dates: &[Date], offset: u64| {
            let settings = GeneratorSettings {
                seed: settings.seed.wrapping_add(offset),
                ..settings
            };
            let generator = CrossAssetModelScenarioGenerator::new(
                Arc::clone(&process),
                Arc::clone(&config),
                asof,
                dates,
                day_counter,
                settings,
            )?;
            Ok(Box::new(generator) as Box<dyn ScenarioGenerator>)
        })
    }

    fn build(
        &self,
        date: Date,
        label: &str,
        t: f64,
        x: &[f64],
        credit: &[f64],
    ) -> Result<Box<dyn Scenario>, SimError> {
        let m = &self.model;
        let numeraire = m.numeraire(t, x[m.ir_index(0)])?;
        let mut s = self.factory.build_scenario(date, label, numeraire)?;
        for (ccy, i) in &self.layout.currencies {
            let z = x[m.ir_index(*i)];
            for (k, tau) in self.discount_times.iter().enumerate() {
                let df = m.discount_bond(*i, t, t + tau, z)?;
                s.add(RiskFactorKey::new(KeyType::DiscountCurve, ccy.as_str(), k), df);
            }
        }
        for (name, i) in &self.layout.indices {
            let z = x[m.ir_index(*i)];
            for (k, tau) in self.discount_times.iter().enumerate() {
                let df = m.discount_bond(*i, t, t + tau, z)?;
                s.add(RiskFactorKey::new(KeyType::IndexCurve, name.as_str(), k), df);
            }
        }
        for (ccy, i) in &self.layout.fx {
            s.add(RiskFactorKey::new(KeyType::FxSpot, ccy.as_str(), 0), x[m.fx_index(*i)].exp());
        }
        for (name, k) in &self.layout.equities {
            s.add(RiskFactorKey::new(KeyType::EquitySpot, name.as_str(), 0), x[m.eq_index(*k)].exp());
        }
        for (name, c) in &self.layout.credits {
            let y = x[m.cr_index(*c)];
            for (k, tau) in self.survival_times.iter().enumerate() {
                let sp = m.survival_probability(*c, t, t + tau, y)?;
                s.add(RiskFactorKey::new(KeyType::SurvivalProbability, name.as_str(), k), sp);
            }
        }
        for (j, v) in credit.iter().enumerate() {
            s.add(RiskFactorKey::new(KeyType::CreditState, j.to_string(), 0), *v);
        }
        Ok(s)
    }

    /// Simulation dates.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Market layout the scenarios follow.
    pub fn config(&self) -> &SimMarketConfig {
        &self.config
    }
}

impl ScenarioGenerator for CrossAssetModelScenarioGenerator {
    fn next(&mut self, date: Date) -> Result<Box<dyn Scenario>, SimError> {
        let expected = *self
            .dates
            .get(self.cursor)
            .ok_or_else(|| SimError::config("scenario generator", "no simulation dates"))?;
        if date != expected {
            return Err(SimError::config(
                "scenario generator",
                format!("requested {date}, next simulation date is {expected}"),
            ));
        }
        if self.cursor == 0 {
            self.path = Some(self.paths.next()?.value);
            self.credit_state.iter_mut().for_each(|v| *v = 0.0);
        }
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| SimError::config("scenario generator", "no current path"))?;
        path.state_at_into(self.cursor + 1, &mut self.state);

        let t = self.times[self.cursor];
        let dt = t - if self.cursor == 0 { 0.0 } else { self.times[self.cursor - 1] };
        self.credit_rng.fill_normal(&mut self.credit_draws);
        let sqrt_dt = dt.sqrt();
        match &self.credit_root {
            Some(root) => {
                let dw = root * DVector::from_column_slice(&self.credit_draws);
                for (v, d) in self.credit_state.iter_mut().zip(dw.iter()) {
                    *v += sqrt_dt * d;
                }
            }
            None => {
                for (v, z) in self.credit_state.iter_mut().zip(&self.credit_draws) {
                    *v += sqrt_dt * z;
                }
            }
        }

        let label = self.cursor.to_string();
        let scenario = self.build(date, &label, t, &self.state, &self.credit_state)?;
        self.cursor += 1;
        if self.cursor == self.dates.len() {
            self.cursor = 0;
        }
        Ok(scenario)
    }

    fn reset(&mut self) {
        self.paths.reset();
        self.credit_rng.reset();
        self.cursor = 0;
        self.path = None;
    }

    /// Built from the initial state with zero credit factors.
    fn t0_scenario(&self) -> Result<Box<dyn Scenario>, SimError> {
        let credit = vec![0.0; self.credit_state.len()];
        self.build(self.asof, "t0", 0.0, &self.initial_state, &credit)
    }
}
