//! Read-only catalog lookups
//!
//! Calculator settings and operation/material variants live in catalog
//! stores owned by the host. The engine only ever reads them by id through
//! [`CatalogLookup`].

use crate::logic::CalculatorSettings;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lookup-by-id capability passed into the context builder and orchestrator
pub trait CatalogLookup {
    /// Calculator settings (params + logic) by id
    fn calculator(&self, id: &str) -> Option<&CalculatorSettings>;

    /// Operation variant record by id
    fn operation_variant(&self, id: &str) -> Option<&Value>;

    /// Material variant record by id
    fn material_variant(&self, id: &str) -> Option<&Value>;
}

/// In-memory catalog, deserializable from a calculation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub calculators: Vec<CalculatorSettings>,
    #[serde(default)]
    pub operation_variants: BTreeMap<String, Value>,
    #[serde(default)]
    pub material_variants: BTreeMap<String, Value>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calculator(mut self, settings: CalculatorSettings) -> Self {
        self.calculators.push(settings);
        self
    }

    pub fn with_operation_variant(mut self, id: impl Into<String>, record: Value) -> Self {
        self.operation_variants.insert(id.into(), record);
        self
    }

    pub fn with_material_variant(mut self, id: impl Into<String>, record: Value) -> Self {
        self.material_variants.insert(id.into(), record);
        self
    }
}

impl CatalogLookup for Catalog {
    fn calculator(&self, id: &str) -> Option<&CalculatorSettings> {
        self.calculators.iter().find(|c| c.id == id)
    }

    fn operation_variant(&self, id: &str) -> Option<&Value> {
        self.operation_variants.get(id)
    }

    fn material_variant(&self, id: &str) -> Option<&Value> {
        self.material_variants.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let catalog = Catalog::new()
            .with_calculator(CalculatorSettings {
                id: "c1".into(),
                ..Default::default()
            })
            .with_operation_variant("op1", Value::record([("price", Value::from(4.0))]));

        assert!(catalog.calculator("c1").is_some());
        assert!(catalog.calculator("c2").is_none());
        assert_eq!(
            catalog
                .operation_variant("op1")
                .and_then(|v| v.as_record())
                .and_then(|m| m.get("price")),
            Some(&Value::Number(4.0))
        );
        assert!(catalog.material_variant("op1").is_none());
    }
}
