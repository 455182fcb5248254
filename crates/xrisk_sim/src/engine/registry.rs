//! Pricing registry: builds priceables from trade descriptions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::priceable::Priceable;
use super::products::{
    AveragingNote, AveragingNoteData, FxForward, FxForwardData, VanillaSwap, VanillaSwapData,
    ZeroCouponBond, ZeroCouponBondData,
};
use crate::error::SimError;

/// Pricing model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ModelKind {
    /// Discounting on the simulated curves
    #[default]
    DiscountedCashflows,
    /// Lognormal FX or equity dynamics
    BlackScholes,
}

/// Pricing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EngineKind {
    /// Cashflow discounting
    #[default]
    Discounting,
    /// Closed-form formula
    Analytic,
}

/// Product type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProductKind {
    /// [`ZeroCouponBond`]
    ZeroCouponBond,
    /// [`FxForward`]
    FxForward,
    /// [`VanillaSwap`]
    VanillaSwap,
    /// [`AveragingNote`]
    AveragingNote,
}

/// Product terms.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "product"))]
pub enum ProductData {
    /// Zero coupon bond terms
    ZeroCouponBond(ZeroCouponBondData),
    /// FX forward terms
    FxForward(FxForwardData),
    /// Swap terms
    VanillaSwap(VanillaSwapData),
    /// Average-rate forward terms
    AveragingNote(AveragingNoteData),
}

impl ProductData {
    /// Product type of the terms.
    pub fn kind(&self) -> ProductKind {
        match self {
            ProductData::ZeroCouponBond(_) => ProductKind::ZeroCouponBond,
            ProductData::FxForward(_) => ProductKind::FxForward,
            ProductData::VanillaSwap(_) => ProductKind::VanillaSwap,
            ProductData::AveragingNote(_) => ProductKind::AveragingNote,
        }
    }
}

/// A trade as loaded from a portfolio file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TradeSpec {
    /// Trade id
    pub id: String,
    /// Netting set the trade belongs to
    pub netting_set_id: String,
    /// Pricing model
    #[cfg_attr(feature = "serde", serde(default))]
    pub model: ModelKind,
    /// Pricing engine
    #[cfg_attr(feature = "serde", serde(default))]
    pub engine: EngineKind,
    /// Product terms
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub data: ProductData,
}

/// Builds a priceable from a trade description.
pub type PriceableBuilder = Arc<dyn Fn(&TradeSpec) -> Result<Box<dyn Priceable>, SimError> + Send + Sync>;

/// Builders keyed by (model, engine, product).
#[derive(Clone, Default)]
pub struct PricingRegistry {
    builders: HashMap<(ModelKind, EngineKind, ProductKind), PriceableBuilder>,
}

impl fmt::Debug for PricingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.builders.keys().collect();
        keys.sort_by_key(|k| format!("{k:?}"));
        f.debug_struct("PricingRegistry").field("builders", &keys).finish()
    }
}

/// Extracts the terms of one product type.
macro_rules! builder {
    ($variant:ident, $product:ident) => {
        Arc::new(|spec: &TradeSpec| -> Result<Box<dyn Priceable>, SimError> {
            match &spec.data {
                ProductData::$variant(data) => {
                    Ok(Box::new($product::new(&spec.id, data.clone())?) as Box<dyn Priceable>)
                }
                other => Err(SimError::config(
                    &spec.id,
                    format!("expected {:?} terms, found {:?}", ProductKind::$variant, other.kind()),
                )),
            }
        })
    };
}

impl PricingRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in discounting builders.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        let (m, e) = (ModelKind::DiscountedCashflows, EngineKind::Discounting);
        r.register(m, e, ProductKind::ZeroCouponBond, builder!(ZeroCouponBond, ZeroCouponBond));
        r.register(m, e, ProductKind::FxForward, builder!(FxForward, FxForward));
        r.register(m, e, ProductKind::VanillaSwap, builder!(VanillaSwap, VanillaSwap));
        r.register(m, e, ProductKind::AveragingNote, builder!(AveragingNote, AveragingNote));
        r
    }

    /// Adds or replaces a builder.
    pub fn register(&mut self, model: ModelKind, engine: EngineKind, product: ProductKind, builder: PriceableBuilder) {
        self.builders.insert((model, engine, product), builder);
    }

    /// Whether a builder exists for the combination.
    pub fn has(&self, model: ModelKind, engine: EngineKind, product: ProductKind) -> bool {
        self.builders.contains_key(&(model, engine, product))
    }

    /// Builds the priceable of `spec`.
    ///
    /// # Errors
    /// `SimError::UnknownBuilder` for an unregistered combination, or the
    /// builder's own error.
    pub fn build(&self, spec: &TradeSpec) -> Result<Box<dyn Priceable>, SimError> {
        let product = spec.data.kind();
        let builder = self
            .builders
            .get(&(spec.model, spec.engine, product))
            .ok_or_else(|| SimError::UnknownBuilder {
                model: format!("{:?}", spec.model),
                engine: format!("{:?}", spec.engine),
                product: format!("{product:?}"),
            })?;
        builder(spec)
    }
}
