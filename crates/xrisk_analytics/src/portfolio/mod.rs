//! Portfolio reference data for aggregation.
//!
//! - [`TradeId`], [`CounterpartyId`], [`NettingSetId`]: typed ids
//! - [`Counterparty`] with validated [`CreditParams`]
//! - [`NettingSetDefinition`] with an optional [`CsaDetails`]
//! - [`CollateralBalance`]: as-of collateral per netting set
//! - [`PortfolioRef`]: trade → netting set → counterparty mapping
//!
//! # Examples
//!
//! ```
//! use xrisk_analytics::portfolio::{
//!     Counterparty, CreditParams, NettingSetDefinition, PortfolioRef,
//! };
//!
//! let mut portfolio = PortfolioRef::new();
//! portfolio
//!     .add_counterparty(Counterparty::new("CP".into(), CreditParams::new(0.01, 0.6).unwrap()))
//!     .unwrap();
//! portfolio
//!     .add_netting_set(NettingSetDefinition::new("NS".into(), "CP".into()))
//!     .unwrap();
//! portfolio.add_trade("SWAP_1".into(), "NS".into()).unwrap();
//!
//! assert_eq!(portfolio.counterparty_of(&"NS".into()).unwrap().as_str(), "CP");
//! ```

mod counterparty;
mod error;
mod ids;
mod netting_set;

pub use counterparty::{Counterparty, CreditParams};
pub use error::PortfolioError;
pub use ids::{CounterpartyId, NettingSetId, TradeId};
pub use netting_set::{CalculationType, CollateralBalance, CsaDetails, NettingSetDefinition};

use std::collections::BTreeMap;

use xrisk_sim::engine::Portfolio;

/// Trade, netting set and counterparty reference data.
///
/// Trades keep their insertion order, which callers align with the NPV
/// cube's id order.
#[derive(Clone, Debug, Default)]
pub struct PortfolioRef {
    trades: Vec<(TradeId, NettingSetId)>,
    trade_index: BTreeMap<TradeId, usize>,
    netting_sets: BTreeMap<NettingSetId, NettingSetDefinition>,
    counterparties: BTreeMap<CounterpartyId, Counterparty>,
    balances: BTreeMap<NettingSetId, CollateralBalance>,
}

impl PortfolioRef {
    /// Empty reference data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a counterparty.
    pub fn add_counterparty(&mut self, counterparty: Counterparty) -> Result<&mut Self, PortfolioError> {
        if self.counterparties.contains_key(counterparty.id()) {
            return Err(PortfolioError::DuplicateCounterparty(counterparty.id().to_string()));
        }
        self.counterparties.insert(counterparty.id().clone(), counterparty);
        Ok(self)
    }

    /// Registers a netting set; its counterparty must exist.
    pub fn add_netting_set(&mut self, netting_set: NettingSetDefinition) -> Result<&mut Self, PortfolioError> {
        if self.netting_sets.contains_key(netting_set.id()) {
            return Err(PortfolioError::DuplicateNettingSet(netting_set.id().to_string()));
        }
        if !self.counterparties.contains_key(netting_set.counterparty()) {
            return Err(PortfolioError::CounterpartyNotFound(netting_set.counterparty().to_string()));
        }
        self.netting_sets.insert(netting_set.id().clone(), netting_set);
        Ok(self)
    }

    /// Registers a trade; its netting set must exist.
    pub fn add_trade(&mut self, trade: TradeId, netting_set: NettingSetId) -> Result<&mut Self, PortfolioError> {
        if self.trade_index.contains_key(&trade) {
            return Err(PortfolioError::DuplicateTrade(trade.to_string()));
        }
        if !self.netting_sets.contains_key(&netting_set) {
            return Err(PortfolioError::NettingSetNotFound(netting_set.to_string()));
        }
        self.trade_index.insert(trade.clone(), self.trades.len());
        self.trades.push((trade, netting_set));
        Ok(self)
    }

    /// Registers every trade of a simulation portfolio in its cube order.
    pub fn add_trades_from(&mut self, portfolio: &Portfolio) -> Result<&mut Self, PortfolioError> {
        for entry in portfolio.entries() {
            self.add_trade(entry.id().into(), entry.netting_set_id.as_str().into())?;
        }
        Ok(self)
    }

    /// Registers an as-of collateral balance.
    pub fn add_balance(&mut self, balance: CollateralBalance) -> Result<&mut Self, PortfolioError> {
        if !self.netting_sets.contains_key(&balance.netting_set_id) {
            return Err(PortfolioError::NettingSetNotFound(balance.netting_set_id.to_string()));
        }
        self.balances.insert(balance.netting_set_id.clone(), balance);
        Ok(self)
    }

    /// Trades in insertion order.
    pub fn trades(&self) -> &[(TradeId, NettingSetId)] {
        &self.trades
    }

    /// Number of trades.
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Whether a trade is registered.
    pub fn has_trade(&self, trade: &str) -> bool {
        self.trade_index.contains_key(&TradeId::new(trade))
    }

    /// Netting set of a trade.
    pub fn netting_set_of(&self, trade: &TradeId) -> Result<&NettingSetId, PortfolioError> {
        self.trade_index
            .get(trade)
            .map(|&i| &self.trades[i].1)
            .ok_or_else(|| PortfolioError::TradeNotFound(trade.to_string()))
    }

    /// Counterparty of a netting set.
    pub fn counterparty_of(&self, netting_set: &NettingSetId) -> Result<&CounterpartyId, PortfolioError> {
        Ok(self.netting_set(netting_set)?.counterparty())
    }

    /// Netting set definition.
    pub fn netting_set(&self, id: &NettingSetId) -> Result<&NettingSetDefinition, PortfolioError> {
        self.netting_sets
            .get(id)
            .ok_or_else(|| PortfolioError::NettingSetNotFound(id.to_string()))
    }

    /// Counterparty.
    pub fn counterparty(&self, id: &CounterpartyId) -> Result<&Counterparty, PortfolioError> {
        self.counterparties
            .get(id)
            .ok_or_else(|| PortfolioError::CounterpartyNotFound(id.to_string()))
    }

    /// As-of collateral balance, if supplied.
    pub fn balance(&self, netting_set: &NettingSetId) -> Option<&CollateralBalance> {
        self.balances.get(netting_set)
    }

    /// Netting sets that hold at least one trade, in id order.
    pub fn active_netting_sets(&self) -> Vec<NettingSetId> {
        let mut ids: Vec<NettingSetId> = self.trades.iter().map(|(_, ns)| ns.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Trades of one netting set in insertion order.
    pub fn trades_in(&self, netting_set: &NettingSetId) -> Vec<&TradeId> {
        self.trades
            .iter()
            .filter(|(_, ns)| ns == netting_set)
            .map(|(t, _)| t)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> PortfolioRef {
        let mut p = PortfolioRef::new();
        p.add_counterparty(Counterparty::new("CP".into(), CreditParams::new(0.01, 0.6).unwrap()))
            .unwrap();
        p.add_netting_set(NettingSetDefinition::new("NS2".into(), "CP".into()))
            .unwrap();
        p.add_netting_set(NettingSetDefinition::new("NS1".into(), "CP".into()))
            .unwrap();
        p.add_trade("B".into(), "NS2".into()).unwrap();
        p.add_trade("A".into(), "NS1".into()).unwrap();
        p.add_trade("C".into(), "NS2".into()).unwrap();
        p
    }

    #[test]
    fn test_trade_order_is_insertion_order() {
        let p = reference();
        let ids: Vec<&str> = p.trades().iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
        assert_eq!(p.trades_in(&"NS2".into()).len(), 2);
    }

    #[test]
    fn test_active_netting_sets_sorted() {
        let p = reference();
        assert_eq!(p.active_netting_sets(), vec![NettingSetId::new("NS1"), NettingSetId::new("NS2")]);
    }

    #[test]
    fn test_unknown_references_rejected() {
        let mut p = reference();
        assert!(matches!(
            p.add_trade("D".into(), "NS9".into()),
            Err(PortfolioError::NettingSetNotFound(_))
        ));
        assert!(matches!(
            p.add_netting_set(NettingSetDefinition::new("NS3".into(), "CP9".into())),
            Err(PortfolioError::CounterpartyNotFound(_))
        ));
        assert!(matches!(p.add_trade("A".into(), "NS1".into()), Err(PortfolioError::DuplicateTrade(_))));
    }

    #[test]
    fn test_lookup_chain() {
        let p = reference();
        let ns = p.netting_set_of(&"C".into()).unwrap();
        assert_eq!(ns.as_str(), "NS2");
        assert_eq!(p.counterparty_of(ns).unwrap().as_str(), "CP");
        assert!(p.netting_set_of(&"Z".into()).is_err());
    }
}
