//! Identifier types for portfolio entities.
//!
//! Newtypes keep trade, counterparty and netting set ids apart at compile
//! time while still converting cheaply from the plain strings used as cube
//! ids.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Creates a new id.
            #[inline]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a trade; equals the trade's cube id.
    ///
    /// ```
    /// use xrisk_analytics::portfolio::TradeId;
    ///
    /// let id = TradeId::new("SWAP_1");
    /// assert_eq!(id.as_str(), "SWAP_1");
    /// ```
    TradeId
);

define_id!(
    /// Unique identifier for a counterparty.
    CounterpartyId
);

define_id!(
    /// Unique identifier for a netting set.
    NettingSetId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_conversion() {
        let id: NettingSetId = "NS1".into();
        assert_eq!(id.to_string(), "NS1");
        assert_eq!(NettingSetId::from(String::from("NS1")), id);
    }

    #[test]
    fn test_ordering_follows_string() {
        assert!(CounterpartyId::new("A") < CounterpartyId::new("B"));
    }
}
