//! Valuation engine: fills an NPV cube from simulated scenarios.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use xrisk_core::types::Date;

use super::calculators::{CalculationContext, ValuationCalculator};
use super::context::RunContext;
use super::parallel::ParallelConfig;
use super::portfolio::Portfolio;
use super::priceable::Priceable;
use crate::cube::{AggregationScenarioData, AggregationScenarioDataType, CubeWriter, NpvCube, SampleBuffer};
use crate::error::{CubeError, SimError};
use crate::market::{fx_fixing_name, Fixings, SimMarket, SimMarketConfig};
use crate::scenario::{DateGrid, Scenario, ScenarioGenerator, ScenarioGeneratorBuilder};

/// Close-out date handling of one build.
///
/// Without sticky dates every grid date is simulated and close-out values
/// come from the close-out date scenarios. With sticky dates only the
/// valuation dates are simulated; a build then either values the
/// valuation dates or, with `process_close_out_dates`, revalues each
/// valuation date scenario at its close-out date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CloseOutMode {
    /// Keep the market of the valuation date for close-out valuation
    pub sticky_date: bool,
    /// In sticky mode, value close-out instead of valuation dates
    pub process_close_out_dates: bool,
}

/// Outcome of a cube build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Numeraire, FX spots, index fixings and credit factors per
    /// (valuation date, sample)
    pub scenario_data: AggregationScenarioData,
    /// Trades whose pricing failed; their cube values are zero
    pub failed_trades: Vec<String>,
}

/// One calculator pass over the trades on a market.
#[derive(Debug, Clone, Copy)]
struct Pass {
    cube_date: usize,
    eval_date: Date,
    previous_date: Date,
    is_close_out: bool,
    record_data: bool,
}

/// Scenario date and the passes run on its scenario.
#[derive(Debug, Clone)]
struct Step {
    scenario_date: Date,
    passes: Vec<Pass>,
}

struct SliceOutcome {
    first_sample: usize,
    scenario_data: AggregationScenarioData,
    failed: BTreeSet<usize>,
}

/// Builds NPV cubes for a portfolio on a date grid.
pub struct ValuationEngine {
    context: Arc<RunContext>,
    grid: DateGrid,
    valuation_dates: Vec<Date>,
    builder: ScenarioGeneratorBuilder,
    market_config: Arc<SimMarketConfig>,
    fixings: Fixings,
    close_out: CloseOutMode,
    t0_scenario: Option<Box<dyn Scenario>>,
}

impl std::fmt::Debug for ValuationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValuationEngine")
            .field("asof", &self.context.asof())
            .field("dates", &self.grid.size())
            .field("close_out", &self.close_out)
            .field("fixings", &self.fixings.len())
            .finish()
    }
}

impl ValuationEngine {
    /// Creates an engine.
    ///
    /// # Errors
    /// `SimError::Configuration` if the grid, context and market layout
    /// disagree on the as-of date or base currency.
    pub fn new(
        context: Arc<RunContext>,
        grid: DateGrid,
        builder: ScenarioGeneratorBuilder,
        market_config: Arc<SimMarketConfig>,
    ) -> Result<Self, SimError> {
        if grid.asof() != context.asof() {
            return Err(SimError::config(
                "ValuationEngine",
                format!("grid asof {} differs from run asof {}", grid.asof(), context.asof()),
            ));
        }
        if market_config.base_currency != context.base_currency() {
            return Err(SimError::config(
                "ValuationEngine",
                format!(
                    "market base currency {} differs from run base currency {}",
                    market_config.base_currency,
                    context.base_currency()
                ),
            ));
        }
        market_config.validate()?;
        Ok(Self {
            valuation_dates: grid.valuation_dates(),
            context,
            grid,
            builder,
            market_config,
            fixings: Fixings::new(),
            close_out: CloseOutMode::default(),
            t0_scenario: None,
        })
    }

    /// Sets the historical fixings.
    pub fn with_fixings(mut self, fixings: Fixings) -> Self {
        self.fixings = fixings;
        self
    }

    /// Sets the close-out mode.
    pub fn with_close_out_mode(mut self, mode: CloseOutMode) -> Self {
        self.close_out = mode;
        self
    }

    /// Uses `scenario` for the T0 pass instead of the generator's.
    pub fn with_t0_scenario(mut self, scenario: Box<dyn Scenario>) -> Self {
        self.t0_scenario = Some(scenario);
        self
    }

    /// Date grid.
    pub fn grid(&self) -> &DateGrid {
        &self.grid
    }

    /// Valuation dates, the cube's date axis.
    pub fn valuation_dates(&self) -> &[Date] {
        &self.valuation_dates
    }

    /// Fills `cube` sequentially.
    ///
    /// Runs the T0 pass, then for each sample resets every trade and walks
    /// the simulation dates in order, applying the scenario and running
    /// every calculator on every trade.
    ///
    /// # Errors
    /// Configuration, scenario and cube errors. Pricing errors do not fail
    /// the build: the trade is zeroed and reported.
    pub fn build_cube(
        &self,
        portfolio: &mut Portfolio,
        cube: &mut dyn NpvCube,
        calculators: &[Box<dyn ValuationCalculator>],
    ) -> Result<BuildReport, SimError> {
        let start = Instant::now();
        let steps = self.prepare(portfolio, cube, calculators)?;
        let sim_dates: Vec<Date> = steps.iter().map(|s| s.scenario_date).collect();
        let fixings = self.fixings_table(portfolio);

        let mut buffer = SampleBuffer::shaped_like(cube);
        let generator = (self.builder)(sim_dates.as_slice(), 0)?;
        let mut trades: Vec<&mut dyn Priceable> = portfolio
            .entries_mut()
            .iter_mut()
            .map(|e| e.priceable.as_mut() as &mut dyn Priceable)
            .collect();
        let failed = self.run_t0(generator.as_ref(), &fixings, &mut trades, calculators, &mut buffer)?;

        let mut slice = buffer.as_slice_mut();
        let samples = slice.sample_range();
        let outcome = self.run_samples(
            &steps,
            generator,
            &fixings,
            &mut trades,
            calculators,
            samples,
            &mut slice,
            failed,
        )?;
        self.finish(portfolio, cube, buffer, vec![outcome], start)
    }

    /// Fills `cube` with sample slices valued in parallel.
    ///
    /// Each slice gets its own scenario generator (seed offset = slice
    /// number), market and trade copies, and writes a disjoint sample
    /// range. Falls back to [`build_cube`](Self::build_cube) below the
    /// configured threshold.
    pub fn build_cube_parallel(
        &self,
        portfolio: &mut Portfolio,
        cube: &mut dyn NpvCube,
        calculators: &[Box<dyn ValuationCalculator>],
        parallel: &ParallelConfig,
    ) -> Result<BuildReport, SimError> {
        if !parallel.should_parallelize(cube.samples()) {
            return self.build_cube(portfolio, cube, calculators);
        }
        let start = Instant::now();
        let steps = self.prepare(portfolio, cube, calculators)?;
        let sim_dates: Vec<Date> = steps.iter().map(|s| s.scenario_date).collect();
        let fixings = self.fixings_table(portfolio);

        let mut buffer = SampleBuffer::shaped_like(cube);
        let failed = {
            let generator = (self.builder)(sim_dates.as_slice(), 0)?;
            let mut trades: Vec<&mut dyn Priceable> = portfolio
                .entries_mut()
                .iter_mut()
                .map(|e| e.priceable.as_mut() as &mut dyn Priceable)
                .collect();
            self.run_t0(generator.as_ref(), &fixings, &mut trades, calculators, &mut buffer)?
        };

        let portfolio_ref: &Portfolio = portfolio;
        let registry = self.context.registry();
        let outcomes = buffer
            .chunks_mut(parallel.batch_size)
            .into_par_iter()
            .enumerate()
            .map(|(k, mut slice)| {
                let samples = slice.sample_range();
                debug!(slice = k, first = samples.start, end = samples.end, "valuing sample slice");
                let generator = (self.builder)(sim_dates.as_slice(), k as u64)?;
                let mut fresh = portfolio_ref.fresh_priceables(registry)?;
                let mut trades: Vec<&mut dyn Priceable> =
                    fresh.iter_mut().map(|p| p.as_mut() as &mut dyn Priceable).collect();
                self.run_samples(
                    &steps,
                    generator,
                    &fixings,
                    &mut trades,
                    calculators,
                    samples,
                    &mut slice,
                    failed.clone(),
                )
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        self.finish(portfolio, cube, buffer, outcomes, start)
    }

    /// Validates the cube against the portfolio and grid, and plans the
    /// simulation dates.
    fn prepare(
        &self,
        portfolio: &Portfolio,
        cube: &dyn NpvCube,
        calculators: &[Box<dyn ValuationCalculator>],
    ) -> Result<Vec<Step>, SimError> {
        if cube.asof() != self.context.asof() {
            return Err(SimError::config(
                "NPV cube",
                format!("cube asof {} differs from run asof {}", cube.asof(), self.context.asof()),
            ));
        }
        if cube.ids() != portfolio.ids().as_slice() {
            return Err(CubeError::ShapeMismatch(format!(
                "cube ids ({}) do not match portfolio trade ids ({})",
                cube.num_ids(),
                portfolio.len()
            ))
            .into());
        }
        if cube.dates() != self.valuation_dates.as_slice() {
            return Err(CubeError::ShapeMismatch(format!(
                "cube has {} dates, grid has {} valuation dates",
                cube.num_dates(),
                self.valuation_dates.len()
            ))
            .into());
        }
        let steps = self.plan()?;
        info!(
            trades = portfolio.len(),
            samples = cube.samples(),
            dates = self.valuation_dates.len(),
            simulation_dates = steps.len(),
            calculators = calculators.len(),
            sticky = self.close_out.sticky_date,
            close_out = self.close_out.process_close_out_dates,
            "building NPV cube"
        );
        Ok(steps)
    }

    fn plan(&self) -> Result<Vec<Step>, SimError> {
        let grid = &self.grid;
        let asof = grid.asof();
        let previous = |v: usize| if v == 0 { asof } else { self.valuation_dates[v - 1] };
        let mut steps = Vec::new();

        if !self.close_out.sticky_date {
            for (j, date) in grid.dates().iter().enumerate() {
                let mut passes = Vec::new();
                if let Some(v) = grid.valuation_index(j) {
                    passes.push(Pass {
                        cube_date: v,
                        eval_date: *date,
                        previous_date: previous(v),
                        is_close_out: false,
                        record_data: true,
                    });
                }
                if let Some(v) = grid.close_out_of(j) {
                    passes.push(Pass {
                        cube_date: v,
                        eval_date: *date,
                        previous_date: self.valuation_dates[v],
                        is_close_out: true,
                        record_data: false,
                    });
                }
                steps.push(Step {
                    scenario_date: *date,
                    passes,
                });
            }
            return Ok(steps);
        }

        let process = self.close_out.process_close_out_dates;
        if process && !grid.has_close_out_dates() {
            return Err(SimError::config(
                "ValuationEngine",
                "close-out processing requested on a grid without close-out dates",
            ));
        }
        let mut close_out_date = vec![None; self.valuation_dates.len()];
        for (j, date) in grid.dates().iter().enumerate() {
            if let Some(v) = grid.close_out_of(j) {
                close_out_date[v] = Some(*date);
            }
        }
        for (v, date) in self.valuation_dates.iter().enumerate() {
            let eval_date = if process {
                close_out_date[v].ok_or_else(|| {
                    SimError::config("DateGrid", format!("valuation date {date} has no close-out date"))
                })?
            } else {
                *date
            };
            steps.push(Step {
                scenario_date: *date,
                passes: vec![Pass {
                    cube_date: v,
                    eval_date,
                    previous_date: previous(v),
                    is_close_out: process,
                    record_data: true,
                }],
            });
        }
        Ok(steps)
    }

    /// Historical fixings the trades need before the first simulation
    /// date. Missing ones fall back to the latest earlier fixing.
    fn fixings_table(&self, portfolio: &Portfolio) -> Arc<Fixings> {
        let base_fx = fx_fixing_name(self.context.base_currency());
        let required: Vec<(String, Date)> = portfolio
            .entries()
            .iter()
            .flat_map(|e| e.priceable.required_fixings(&self.grid))
            .filter(|(index, _)| *index != base_fx)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let (mut table, missing) = self.fixings.subset(&required);
        for (index, date) in missing {
            match self.fixings.latest_on_or_before(&index, date) {
                Some((used, v)) => {
                    warn!(index = %index, requested = %date, used = %used, "fixing not found, using most recent");
                    table.add(&index, date, v);
                }
                None => warn!(index = %index, date = %date, "required fixing not available"),
            }
        }
        debug!(required = required.len(), loaded = table.len(), "fixings loaded");
        Arc::new(table)
    }

    fn market(&self, fixings: &Arc<Fixings>) -> Result<SimMarket, SimError> {
        SimMarket::new(
            Arc::clone(&self.context),
            Arc::clone(&self.market_config),
            Arc::clone(fixings),
        )
    }

    fn run_t0(
        &self,
        generator: &dyn ScenarioGenerator,
        fixings: &Arc<Fixings>,
        trades: &mut [&mut dyn Priceable],
        calculators: &[Box<dyn ValuationCalculator>],
        buffer: &mut SampleBuffer,
    ) -> Result<BTreeSet<usize>, SimError> {
        let scenario = match &self.t0_scenario {
            Some(s) => s.clone_box(),
            None => generator.t0_scenario()?,
        };
        let mut market = self.market(fixings)?;
        market.apply_scenario_at(scenario.as_ref(), self.context.asof())?;

        let mut failed = BTreeSet::new();
        for (i, trade) in trades.iter_mut().enumerate() {
            trade.reset();
            if let Err(e) = trade.advance(&market) {
                record_failure(&mut failed, i, trade.id(), e)?;
                continue;
            }
            for calc in calculators {
                if let Err(e) = calc.calculate_t0(&**trade, i, &market, buffer) {
                    record_failure(&mut failed, i, trade.id(), e)?;
                    break;
                }
            }
        }
        Ok(failed)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_samples(
        &self,
        steps: &[Step],
        mut generator: Box<dyn ScenarioGenerator>,
        fixings: &Arc<Fixings>,
        trades: &mut [&mut dyn Priceable],
        calculators: &[Box<dyn ValuationCalculator>],
        samples: Range<usize>,
        writer: &mut dyn CubeWriter,
        mut failed: BTreeSet<usize>,
    ) -> Result<SliceOutcome, SimError> {
        let mut market = self.market(fixings)?;
        let mut data = AggregationScenarioData::new(self.valuation_dates.len(), samples.len());
        let first_sample = samples.start;

        for sample in samples {
            market.reset_path();
            trades.iter_mut().for_each(|t| t.reset());
            for step in steps {
                let scenario = generator.next(step.scenario_date)?;
                let mut applied = None;
                for (n, pass) in step.passes.iter().enumerate() {
                    if applied != Some(pass.eval_date) {
                        market.apply_scenario_at(scenario.as_ref(), pass.eval_date)?;
                        applied = Some(pass.eval_date);
                    }
                    if n == 0 {
                        for (i, trade) in trades.iter_mut().enumerate() {
                            if failed.contains(&i) {
                                continue;
                            }
                            if let Err(e) = trade.advance(&market) {
                                record_failure(&mut failed, i, trade.id(), e)?;
                            }
                        }
                    }
                    if pass.record_data {
                        record_scenario_data(&market, &mut data, pass.cube_date, sample - first_sample)?;
                    }
                    for (i, trade) in trades.iter().enumerate() {
                        if failed.contains(&i) {
                            continue;
                        }
                        let ctx = CalculationContext {
                            trade_index: i,
                            date_index: pass.cube_date,
                            sample,
                            date: pass.eval_date,
                            previous_date: pass.previous_date,
                            is_close_out: pass.is_close_out,
                        };
                        for calc in calculators {
                            if let Err(e) = calc.calculate(&**trade, &ctx, &market, writer) {
                                record_failure(&mut failed, i, trade.id(), e)?;
                                break;
                            }
                        }
                    }
                }
            }
        }
        Ok(SliceOutcome {
            first_sample,
            scenario_data: data,
            failed,
        })
    }

    fn finish(
        &self,
        portfolio: &Portfolio,
        cube: &mut dyn NpvCube,
        mut buffer: SampleBuffer,
        outcomes: Vec<SliceOutcome>,
        start: Instant,
    ) -> Result<BuildReport, SimError> {
        let mut scenario_data = AggregationScenarioData::new(self.valuation_dates.len(), cube.samples());
        let mut failed = BTreeSet::new();
        for outcome in &outcomes {
            scenario_data.absorb(outcome.first_sample, &outcome.scenario_data)?;
            failed.extend(outcome.failed.iter().copied());
        }
        for i in &failed {
            buffer.zero_id(*i)?;
        }
        buffer.scatter_into(cube)?;

        let ids = portfolio.ids();
        let failed_trades: Vec<String> = failed.iter().filter_map(|i| ids.get(*i).cloned()).collect();
        info!(
            slices = outcomes.len(),
            failed = failed_trades.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "NPV cube built"
        );
        Ok(BuildReport {
            scenario_data,
            failed_trades,
        })
    }
}

/// Marks trade `i` as failed. Cube errors are layout bugs and abort the
/// build.
fn record_failure(failed: &mut BTreeSet<usize>, i: usize, id: &str, err: SimError) -> Result<(), SimError> {
    if let SimError::Cube(e) = err {
        return Err(SimError::Cube(e));
    }
    if failed.insert(i) {
        warn!(trade = id, error = %err, "pricing failed, trade values set to zero");
    }
    Ok(())
}

fn record_scenario_data(
    market: &SimMarket,
    data: &mut AggregationScenarioData,
    date: usize,
    sample: usize,
) -> Result<(), SimError> {
    use AggregationScenarioDataType as T;
    data.set(date, sample, market.numeraire(), T::Numeraire, "")?;
    let config = market.config();
    for ccy in config.fx_currencies() {
        data.set(date, sample, market.fx_spot(ccy)?, T::FxSpot, ccy)?;
    }
    for index in &config.indices {
        data.set(date, sample, market.fixing(&index.name, market.asof())?, T::IndexFixing, &index.name)?;
    }
    for (j, v) in market.credit_state().iter().enumerate() {
        data.set(date, sample, *v, T::CreditState, &j.to_string())?;
    }
    Ok(())
}
