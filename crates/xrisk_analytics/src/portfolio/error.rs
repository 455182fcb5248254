//! Portfolio reference data errors.

use thiserror::Error;

/// Errors raised while building or querying portfolio reference data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
    /// Trade not registered.
    #[error("Trade not found: {0}")]
    TradeNotFound(String),

    /// Counterparty not registered.
    #[error("Counterparty not found: {0}")]
    CounterpartyNotFound(String),

    /// Netting set not registered.
    #[error("Netting set not found: {0}")]
    NettingSetNotFound(String),

    /// Duplicate trade id.
    #[error("Duplicate trade ID: {0}")]
    DuplicateTrade(String),

    /// Duplicate counterparty id.
    #[error("Duplicate counterparty ID: {0}")]
    DuplicateCounterparty(String),

    /// Duplicate netting set id.
    #[error("Duplicate netting set ID: {0}")]
    DuplicateNettingSet(String),

    /// Invalid hazard rate or LGD.
    #[error("Invalid credit parameters: {0}")]
    InvalidCreditParams(String),

    /// Invalid CSA terms.
    #[error("Invalid CSA for netting set {netting_set}: {message}")]
    InvalidCsa {
        /// Netting set id
        netting_set: String,
        /// Description
        message: String,
    },

    /// Unparsable collateral calculation type.
    #[error("Collateral calculation type {0:?} not recognised")]
    UnknownCalculationType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_trade_not_found() {
        let err = PortfolioError::TradeNotFound("SWAP_1".to_string());
        assert_eq!(format!("{}", err), "Trade not found: SWAP_1");
    }

    #[test]
    fn test_invalid_csa_names_netting_set() {
        let err = PortfolioError::InvalidCsa {
            netting_set: "NS1".into(),
            message: "negative MTA".into(),
        };
        assert_eq!(err.to_string(), "Invalid CSA for netting set NS1: negative MTA");
    }
}
