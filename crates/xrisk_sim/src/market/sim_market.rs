//! Market view built from one scenario at a time.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{trace, warn};
use xrisk_core::types::Date;

use super::config::SimMarketConfig;
use super::fixings::Fixings;
use crate::engine::RunContext;
use crate::error::SimError;
use crate::scenario::{KeyType, RiskFactorKey, Scenario};

/// Fixing name under which the simulated market records FX spots.
pub fn fx_fixing_name(currency: &str) -> String {
    format!("FX-{currency}")
}

/// Fixing name under which the simulated market records equity spots.
pub fn equity_fixing_name(name: &str) -> String {
    format!("EQ-{name}")
}

/// Node curve in time, log-linear in the values with flat continuous-rate
/// extrapolation beyond the last node. The value at t = 0 is 1.
#[derive(Debug, Clone, Default)]
struct LogLinearNodes {
    values: Vec<f64>,
}

impl LogLinearNodes {
    fn value(&self, times: &[f64], t: f64) -> f64 {
        if t <= 0.0 || self.values.is_empty() {
            return 1.0;
        }
        let k = times.partition_point(|&x| x < t);
        if k >= times.len() {
            let last = times.len() - 1;
            return self.values[last].powf(t / times[last]);
        }
        let (t0, l0) = if k == 0 {
            (0.0, 0.0)
        } else {
            (times[k - 1], self.values[k - 1].ln())
        };
        let (t1, l1) = (times[k], self.values[k].ln());
        (l0 + (l1 - l0) * (t - t0) / (t1 - t0)).exp()
    }
}

/// Simulated market: curves, spots, survival curves and fixings seen by
/// the priceables at one scenario date.
///
/// Node times are measured from the market's evaluation date; in
/// sticky-date close-out runs the scenario of a valuation date is applied
/// with a later evaluation date and the curves move with it.
#[derive(Debug, Clone)]
pub struct SimMarket {
    context: Arc<RunContext>,
    config: Arc<SimMarketConfig>,
    discount_times: Vec<f64>,
    survival_times: Vec<f64>,
    asof: Date,
    numeraire: f64,
    discount: HashMap<String, LogLinearNodes>,
    index_curves: HashMap<String, LogLinearNodes>,
    fx: HashMap<String, f64>,
    equity: HashMap<String, f64>,
    survival: HashMap<String, LogLinearNodes>,
    credit_state: Vec<f64>,
    historical: Arc<Fixings>,
    simulated: Fixings,
}

impl SimMarket {
    /// Creates an empty market for the given layout.
    ///
    /// # Errors
    /// `SimError::Configuration` if the layout is inconsistent.
    pub fn new(
        context: Arc<RunContext>,
        config: Arc<SimMarketConfig>,
        historical: Arc<Fixings>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            discount_times: config.discount_times(),
            survival_times: config.survival_times(),
            asof: context.asof(),
            numeraire: 1.0,
            discount: HashMap::new(),
            index_curves: HashMap::new(),
            fx: HashMap::new(),
            equity: HashMap::new(),
            survival: HashMap::new(),
            credit_state: vec![0.0; config.credit_state_factors],
            historical,
            simulated: Fixings::new(),
            context,
            config,
        })
    }

    /// Market at the as-of date from a scenario of today's curves.
    pub fn t0_market(
        context: Arc<RunContext>,
        config: Arc<SimMarketConfig>,
        historical: Arc<Fixings>,
        t0_scenario: &dyn Scenario,
    ) -> Result<Self, SimError> {
        let mut market = Self::new(context, config, historical)?;
        market.apply_scenario(t0_scenario)?;
        Ok(market)
    }

    /// Installs a scenario with the evaluation date set to its date.
    pub fn apply_scenario(&mut self, scenario: &dyn Scenario) -> Result<(), SimError> {
        self.apply_scenario_at(scenario, scenario.asof())
    }

    /// Installs a scenario with an explicit evaluation date.
    ///
    /// # Errors
    /// `SimError::MissingMarketData` naming the first required key the
    /// scenario lacks.
    pub fn apply_scenario_at(&mut self, scenario: &dyn Scenario, evaluation_date: Date) -> Result<(), SimError> {
        let config = Arc::clone(&self.config);
        let nd = config.discount_tenors.len();
        let nodes = |kt: KeyType, name: &str, n: usize| -> Result<LogLinearNodes, SimError> {
            let values = (0..n)
                .map(|k| scenario.get(&RiskFactorKey::new(kt, name, k)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LogLinearNodes { values })
        };

        for ccy in &config.currencies {
            self.discount.insert(ccy.clone(), nodes(KeyType::DiscountCurve, ccy, nd)?);
        }
        for index in &config.indices {
            self.index_curves
                .insert(index.name.clone(), nodes(KeyType::IndexCurve, &index.name, nd)?);
        }
        for ccy in config.fx_currencies() {
            let v = scenario.get(&RiskFactorKey::new(KeyType::FxSpot, ccy, 0))?;
            self.fx.insert(ccy.to_string(), v);
        }
        for name in &config.equities {
            let v = scenario.get(&RiskFactorKey::new(KeyType::EquitySpot, name.as_str(), 0))?;
            self.equity.insert(name.clone(), v);
        }
        let ns = config.survival_tenors.len();
        for name in &config.credit_names {
            self.survival
                .insert(name.clone(), nodes(KeyType::SurvivalProbability, name, ns)?);
        }
        for (j, s) in self.credit_state.iter_mut().enumerate() {
            *s = scenario.get(&RiskFactorKey::new(KeyType::CreditState, j.to_string(), 0))?;
        }
        self.numeraire = scenario.numeraire();
        self.asof = evaluation_date;
        self.record_simulated_fixings()?;
        trace!(date = %self.asof, label = scenario.label(), "scenario applied");
        Ok(())
    }

    fn record_simulated_fixings(&mut self) -> Result<(), SimError> {
        let date = self.asof;
        let config = Arc::clone(&self.config);
        for index in &config.indices {
            let end = date.add_period(index.tenor)?;
            let tau = self.context.day_counter().year_fraction(date, end);
            let df = self.index_discount(&index.name, self.time_to(end))?;
            self.simulated.add(&index.name, date, (1.0 / df - 1.0) / tau);
        }
        for ccy in config.fx_currencies() {
            let spot = self.fx_spot(ccy)?;
            self.simulated.add(&fx_fixing_name(ccy), date, spot);
        }
        for name in &config.equities {
            let spot = self.equity_spot(name)?;
            self.simulated.add(&equity_fixing_name(name), date, spot);
        }
        Ok(())
    }

    /// Forgets the fixings recorded along the current path.
    pub fn reset_path(&mut self) {
        self.simulated.clear();
    }

    /// Run context.
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Market layout.
    pub fn config(&self) -> &SimMarketConfig {
        &self.config
    }

    /// Evaluation date.
    pub fn asof(&self) -> Date {
        self.asof
    }

    /// Base currency.
    pub fn base_currency(&self) -> &str {
        self.context.base_currency()
    }

    /// Numeraire of the applied scenario.
    pub fn numeraire(&self) -> f64 {
        self.numeraire
    }

    /// Year fraction from the evaluation date to `date`.
    pub fn time_to(&self, date: Date) -> f64 {
        self.context.day_counter().year_fraction(self.asof, date)
    }

    /// Discount factor of `ccy` for time `t` from the evaluation date.
    pub fn discount(&self, ccy: &str, t: f64) -> Result<f64, SimError> {
        self.discount
            .get(ccy)
            .map(|c| c.value(&self.discount_times, t))
            .ok_or_else(|| SimError::MissingMarketData {
                key: format!("{}/{ccy}", KeyType::DiscountCurve),
            })
    }

    /// Discount factor on the projection curve of `index`.
    pub fn index_discount(&self, index: &str, t: f64) -> Result<f64, SimError> {
        self.index_curves
            .get(index)
            .map(|c| c.value(&self.discount_times, t))
            .ok_or_else(|| SimError::MissingMarketData {
                key: format!("{}/{index}", KeyType::IndexCurve),
            })
    }

    /// Simply compounded forward of `index` between two times.
    pub fn forward_rate(&self, index: &str, t1: f64, t2: f64) -> Result<f64, SimError> {
        if t2 <= t1 {
            return Err(SimError::config(index, format!("forward period [{t1}, {t2}] is empty")));
        }
        let p1 = self.index_discount(index, t1)?;
        let p2 = self.index_discount(index, t2)?;
        Ok((p1 / p2 - 1.0) / (t2 - t1))
    }

    /// Units of base currency per unit of `ccy`.
    pub fn fx_spot(&self, ccy: &str) -> Result<f64, SimError> {
        if ccy == self.context.base_currency() {
            return Ok(1.0);
        }
        self.fx
            .get(ccy)
            .copied()
            .ok_or_else(|| SimError::MissingMarketData {
                key: RiskFactorKey::new(KeyType::FxSpot, ccy, 0).to_string(),
            })
    }

    /// Units of `to` per unit of `from`.
    pub fn fx_rate(&self, from: &str, to: &str) -> Result<f64, SimError> {
        Ok(self.fx_spot(from)? / self.fx_spot(to)?)
    }

    /// Equity spot.
    pub fn equity_spot(&self, name: &str) -> Result<f64, SimError> {
        self.equity
            .get(name)
            .copied()
            .ok_or_else(|| SimError::MissingMarketData {
                key: RiskFactorKey::new(KeyType::EquitySpot, name, 0).to_string(),
            })
    }

    /// Survival probability of `name` to time `t` from the evaluation date.
    pub fn survival_probability(&self, name: &str, t: f64) -> Result<f64, SimError> {
        self.survival
            .get(name)
            .map(|c| c.value(&self.survival_times, t))
            .ok_or_else(|| SimError::MissingMarketData {
                key: format!("{}/{name}", KeyType::SurvivalProbability),
            })
    }

    /// Systemic credit factor values.
    pub fn credit_state(&self) -> &[f64] {
        &self.credit_state
    }

    /// Fixing of `index` on `date`.
    ///
    /// Looks up the fixings recorded along the path, then the historical
    /// table. Without an exact match the most recent earlier fixing is used
    /// and a warning is logged.
    ///
    /// # Errors
    /// `SimError::MissingFixing` if no fixing exists on or before `date`.
    pub fn fixing(&self, index: &str, date: Date) -> Result<f64, SimError> {
        if let Some(v) = self.simulated.get(index, date) {
            return Ok(v);
        }
        if let Some(v) = self.historical.get(index, date) {
            return Ok(v);
        }
        let candidates = [
            self.simulated.latest_on_or_before(index, date),
            self.historical.latest_on_or_before(index, date),
        ];
        match candidates.into_iter().flatten().max_by_key(|(d, _)| *d) {
            Some((used, v)) => {
                warn!(index, requested = %date, used = %used, "fixing not found, using most recent");
                Ok(v)
            }
            None => Err(SimError::MissingFixing {
                index: index.to_string(),
                date: date.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PricingRegistry;
    use crate::scenario::SimpleScenario;
    use approx::assert_relative_eq;
    use xrisk_core::types::{DayCountConvention, Period};

    pub(crate) fn context() -> Arc<RunContext> {
        Arc::new(RunContext::new(
            Date::from_ymd(2025, 1, 2).unwrap(),
            "EUR",
            DayCountConvention::Actual365Fixed,
            Arc::new(PricingRegistry::with_defaults()),
        ))
    }

    fn config() -> Arc<SimMarketConfig> {
        let tenors: Vec<Period> = ["1Y", "2Y", "5Y"].iter().map(|t| t.parse().unwrap()).collect();
        let mut cfg = SimMarketConfig::single_currency("EUR", tenors);
        cfg.currencies.push("USD".into());
        Arc::new(cfg)
    }

    fn scenario(date: Date) -> SimpleScenario {
        let mut s = SimpleScenario::new(date, "0", 1.1).unwrap();
        for (k, t) in [1.0_f64, 2.0, 5.0].iter().enumerate() {
            s.add(RiskFactorKey::new(KeyType::DiscountCurve, "EUR", k), (-0.02 * t).exp());
            s.add(RiskFactorKey::new(KeyType::DiscountCurve, "USD", k), (-0.04 * t).exp());
        }
        s.add(RiskFactorKey::new(KeyType::FxSpot, "USD", 0), 0.9);
        s
    }

    #[test]
    fn test_log_linear_discount_reproduces_flat_curve() {
        let ctx = context();
        let mut m = SimMarket::new(ctx.clone(), config(), Arc::new(Fixings::new())).unwrap();
        m.apply_scenario(&scenario(ctx.asof())).unwrap();
        for t in [0.25, 1.0, 3.3, 5.0, 12.0] {
            assert_relative_eq!(m.discount("EUR", t).unwrap(), (-0.02 * t).exp(), epsilon = 1e-12);
        }
        assert_eq!(m.discount("EUR", 0.0).unwrap(), 1.0);
        assert_eq!(m.fx_spot("EUR").unwrap(), 1.0);
        assert_relative_eq!(m.fx_rate("EUR", "USD").unwrap(), 1.0 / 0.9, epsilon = 1e-15);
        assert_eq!(m.numeraire(), 1.1);
    }

    #[test]
    fn test_missing_key_names_key() {
        let ctx = context();
        let mut m = SimMarket::new(ctx.clone(), config(), Arc::new(Fixings::new())).unwrap();
        let mut s = SimpleScenario::new(ctx.asof(), "0", 1.0).unwrap();
        s.add(RiskFactorKey::new(KeyType::DiscountCurve, "EUR", 0), 0.99);
        match m.apply_scenario(&s) {
            Err(SimError::MissingMarketData { key }) => assert_eq!(key, "DiscountCurve/EUR/1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_fixing_fallback_and_error() {
        let ctx = context();
        let d0 = ctx.asof();
        let mut hist = Fixings::new();
        hist.add("EUR-6M", d0.add_days(-10).unwrap(), 0.025);
        let m = SimMarket::new(ctx, config(), Arc::new(hist)).unwrap();
        assert_eq!(m.fixing("EUR-6M", d0).unwrap(), 0.025);
        assert!(matches!(
            m.fixing("EUR-6M", d0.add_days(-20).unwrap()),
            Err(SimError::MissingFixing { .. })
        ));
    }

    #[test]
    fn test_simulated_fixings_recorded_and_reset() {
        let ctx = context();
        let mut m = SimMarket::new(ctx.clone(), config(), Arc::new(Fixings::new())).unwrap();
        let d = ctx.asof().add_days(30).unwrap();
        m.apply_scenario(&scenario(d)).unwrap();
        assert_eq!(m.fixing(&fx_fixing_name("USD"), d).unwrap(), 0.9);
        m.reset_path();
        assert!(m.fixing(&fx_fixing_name("USD"), d).is_err());
    }
}
