//! Self-contained calculation requests
//!
//! Everything one offer calculation needs, in a single serde document:
//!
//! ```json
//! {
//!   "offer": { "properties": { "width": { "value": 1200 } } },
//!   "structure": { "details": [], "bindings": [] },
//!   "catalog": { "calculators": [], "operationVariants": {}, "materialVariants": {} },
//!   "priceTypes": [],
//!   "quantity": 100
//! }
//! ```

use crate::calculation::{CalculationOptions, Calculator, OfferResult};
use costflow_core::{Catalog, PriceType, ProductStructure, Result, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRequest {
    /// Host data tree rooted at the trade offer
    #[serde(default)]
    pub offer: Value,
    #[serde(default)]
    pub structure: ProductStructure,
    #[serde(default)]
    pub catalog: Catalog,
    #[serde(default)]
    pub price_types: Vec<PriceType>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub allow_fallback: Option<bool>,
}

impl CalculationRequest {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn options(&self) -> CalculationOptions {
        let defaults = CalculationOptions::default();
        CalculationOptions {
            quantity: self.quantity.unwrap_or(defaults.quantity),
            allow_fallback: self.allow_fallback.unwrap_or(defaults.allow_fallback),
            cancel: None,
        }
    }

    pub fn calculator(&self) -> Calculator<'_> {
        Calculator::new(&self.offer, &self.structure, &self.catalog)
            .with_price_types(&self.price_types)
    }

    pub fn calculate(&self) -> Result<OfferResult> {
        self.calculator().calculate(&self.options())
    }
}
