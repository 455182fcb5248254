//! Flat two-currency market used by the engine tests.

use std::sync::Arc;

use xrisk_core::types::{Date, DayCountConvention, Period};

use super::{PricingRegistry, RunContext};
use crate::market::{Fixings, IndexConfig, SimMarket, SimMarketConfig};
use crate::scenario::{KeyType, RiskFactorKey, Scenario, SimpleScenario};

pub(crate) const EUR_RATE: f64 = 0.02;
pub(crate) const USD_RATE: f64 = 0.04;
pub(crate) const INDEX: &str = "EUR-6M";

pub(crate) fn asof() -> Date {
    Date::from_ymd(2025, 1, 2).unwrap()
}

pub(crate) fn context() -> Arc<RunContext> {
    Arc::new(RunContext::new(
        asof(),
        "EUR",
        DayCountConvention::Actual365Fixed,
        Arc::new(PricingRegistry::with_defaults()),
    ))
}

pub(crate) fn tenors() -> Vec<Period> {
    ["6M", "1Y", "2Y", "5Y", "10Y"].iter().map(|t| t.parse().unwrap()).collect()
}

pub(crate) fn config() -> Arc<SimMarketConfig> {
    let mut cfg = SimMarketConfig::single_currency("EUR", tenors());
    cfg.currencies.push("USD".into());
    cfg.indices.push(IndexConfig {
        name: INDEX.into(),
        currency: "EUR".into(),
        tenor: "6M".parse().unwrap(),
    });
    Arc::new(cfg)
}

/// Flat curves at the given rates, USD spot `fx` and numeraire `numeraire`.
pub(crate) fn scenario(date: Date, eur: f64, usd: f64, fx: f64, numeraire: f64) -> SimpleScenario {
    let mut s = SimpleScenario::new(date, "fixture", numeraire).unwrap();
    for (k, p) in tenors().iter().enumerate() {
        let t = p.years();
        s.add(RiskFactorKey::new(KeyType::DiscountCurve, "EUR", k), (-eur * t).exp());
        s.add(RiskFactorKey::new(KeyType::DiscountCurve, "USD", k), (-usd * t).exp());
        s.add(RiskFactorKey::new(KeyType::IndexCurve, INDEX, k), (-eur * t).exp());
    }
    s.add(RiskFactorKey::new(KeyType::FxSpot, "USD", 0), fx);
    s
}

pub(crate) fn market_at(date: Date, fixings: Fixings) -> SimMarket {
    let mut m = SimMarket::new(context(), config(), Arc::new(fixings)).unwrap();
    m.apply_scenario(&scenario(date, EUR_RATE, USD_RATE, 0.9, 1.0) as &dyn Scenario)
        .unwrap();
    m
}
