//! Simulation portfolio: priceables in cube id order.

use std::collections::HashSet;

use super::priceable::Priceable;
use super::registry::{PricingRegistry, TradeSpec};
use crate::error::SimError;

/// One trade of the portfolio.
#[derive(Debug, Clone)]
pub struct PortfolioEntry {
    /// Netting set the trade belongs to
    pub netting_set_id: String,
    /// Priceable carrying the trade's path memory
    pub priceable: Box<dyn Priceable>,
    spec: Option<TradeSpec>,
}

impl PortfolioEntry {
    /// Trade id.
    pub fn id(&self) -> &str {
        self.priceable.id()
    }

    /// Description the priceable was built from, if any.
    pub fn spec(&self) -> Option<&TradeSpec> {
        self.spec.as_ref()
    }
}

/// Ordered trades; position `i` is cube id `i`.
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    entries: Vec<PortfolioEntry>,
    ids: HashSet<String>,
}

impl Portfolio {
    /// Empty portfolio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every trade through the registry, keeping the input order.
    ///
    /// # Errors
    /// The first builder error, or `SimError::Configuration` on a duplicate
    /// trade id.
    pub fn from_specs(specs: &[TradeSpec], registry: &PricingRegistry) -> Result<Self, SimError> {
        let mut portfolio = Self::new();
        for spec in specs {
            portfolio.add(spec.clone(), registry)?;
        }
        Ok(portfolio)
    }

    /// Builds and appends one trade.
    pub fn add(&mut self, spec: TradeSpec, registry: &PricingRegistry) -> Result<(), SimError> {
        let priceable = registry.build(&spec)?;
        self.push(PortfolioEntry {
            netting_set_id: spec.netting_set_id.clone(),
            priceable,
            spec: Some(spec),
        })
    }

    /// Appends a priceable built outside the registry.
    pub fn add_priceable(&mut self, netting_set_id: &str, priceable: Box<dyn Priceable>) -> Result<(), SimError> {
        self.push(PortfolioEntry {
            netting_set_id: netting_set_id.to_string(),
            priceable,
            spec: None,
        })
    }

    fn push(&mut self, entry: PortfolioEntry) -> Result<(), SimError> {
        if !self.ids.insert(entry.id().to_string()) {
            return Err(SimError::config(entry.id(), "duplicate trade id in portfolio"));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Trade ids in cube order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id().to_string()).collect()
    }

    /// Number of trades.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the portfolio is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trades in cube order.
    pub fn entries(&self) -> &[PortfolioEntry] {
        &self.entries
    }

    /// Mutable trades in cube order.
    pub fn entries_mut(&mut self) -> &mut [PortfolioEntry] {
        &mut self.entries
    }

    /// Independent copies of all priceables with cleared path memory.
    ///
    /// Trades with a description are rebuilt through `registry`; the others
    /// are cloned and reset.
    pub fn fresh_priceables(&self, registry: &PricingRegistry) -> Result<Vec<Box<dyn Priceable>>, SimError> {
        self.entries
            .iter()
            .map(|e| match &e.spec {
                Some(spec) => registry.build(spec),
                None => {
                    let mut p = e.priceable.clone_box();
                    p.reset();
                    Ok(p)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::products::{ZeroCouponBond, ZeroCouponBondData};
    use crate::engine::registry::ProductData;
    use xrisk_core::types::Date;

    fn spec(id: &str) -> TradeSpec {
        TradeSpec {
            id: id.into(),
            netting_set_id: "NS".into(),
            model: Default::default(),
            engine: Default::default(),
            data: ProductData::ZeroCouponBond(ZeroCouponBondData {
                currency: "EUR".into(),
                notional: 1.0,
                maturity: Date::from_ymd(2027, 1, 4).unwrap(),
            }),
        }
    }

    #[test]
    fn test_order_and_duplicates() {
        let registry = PricingRegistry::with_defaults();
        let mut p = Portfolio::from_specs(&[spec("B"), spec("A")], &registry).unwrap();
        assert_eq!(p.ids(), vec!["B".to_string(), "A".to_string()]);
        assert!(p.add(spec("A"), &registry).is_err());
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_fresh_priceables_without_spec() {
        let registry = PricingRegistry::with_defaults();
        let mut p = Portfolio::from_specs(&[spec("A")], &registry).unwrap();
        let data = ZeroCouponBondData {
            currency: "EUR".into(),
            notional: 2.0,
            maturity: Date::from_ymd(2028, 1, 4).unwrap(),
        };
        p.add_priceable("NS2", Box::new(ZeroCouponBond::new("C", data).unwrap()))
            .unwrap();
        let fresh = p.fresh_priceables(&registry).unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[1].id(), "C");
        assert!(p.entries()[1].spec().is_none());
        assert_eq!(p.entries()[1].netting_set_id, "NS2");
    }
}
