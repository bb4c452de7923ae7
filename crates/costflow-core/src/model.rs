//! Product structure: stages, details and bindings
//!
//! Details and bindings own ordered stage lists; bindings additionally list
//! child detail ids and child binding ids. Well-formed data is a DAG, but
//! nothing here enforces that; the calculation walk guards against cycles.

use crate::logic::{InputWiring, OutputMapping};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Offer-property-driven choice of operation/material variant for a stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsMapping {
    /// Key of the offer property whose value selects an entry
    pub property: String,
    #[serde(default)]
    pub entries: Vec<OptionEntry>,
}

/// One row of an [`OptionsMapping`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionEntry {
    /// Property value or enumerated-value id this row applies to
    pub when: String,
    #[serde(default)]
    pub operation_variant_id: Option<String>,
    #[serde(default)]
    pub material_variant_id: Option<String>,
}

/// One costed step (operation + optional material + optional equipment)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageInstance {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Calculator settings providing params and logic
    #[serde(default)]
    pub calculator_id: Option<String>,
    #[serde(default)]
    pub operation_variant_id: Option<String>,
    #[serde(default)]
    pub material_variant_id: Option<String>,
    #[serde(default)]
    pub equipment_id: Option<String>,
    /// Quantity used by the flat fallback; defaults to the requested quantity
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub inputs: Vec<InputWiring>,
    #[serde(default)]
    pub outputs: Vec<OutputMapping>,
    #[serde(default)]
    pub options_mapping: Option<OptionsMapping>,
    /// Flat operation unit price used by the fallback path
    #[serde(default)]
    pub operation_price: Option<f64>,
    /// Flat material unit price used by the fallback path
    #[serde(default)]
    pub material_price: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl StageInstance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// A leaf physical component
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detail {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stages: Vec<StageInstance>,
}

/// A composite grouping of details and nested bindings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stages: Vec<StageInstance>,
    #[serde(default)]
    pub detail_ids: Vec<String>,
    #[serde(default)]
    pub binding_ids: Vec<String>,
}

/// Reference to a top-level item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ItemRef {
    Detail(String),
    Binding(String),
}

/// All details and bindings of one offer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStructure {
    #[serde(default)]
    pub details: Vec<Detail>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    /// Explicit top-level order. When empty, every item not referenced as a
    /// child of some binding is top-level, details first.
    #[serde(default)]
    pub roots: Vec<ItemRef>,
}

impl ProductStructure {
    pub fn detail(&self, id: &str) -> Option<&Detail> {
        self.details.iter().find(|d| d.id == id)
    }

    pub fn binding(&self, id: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.id == id)
    }

    /// Find a stage instance anywhere in the structure
    pub fn stage(&self, id: &str) -> Option<&StageInstance> {
        self.details
            .iter()
            .flat_map(|d| d.stages.iter())
            .chain(self.bindings.iter().flat_map(|b| b.stages.iter()))
            .find(|s| s.id == id)
    }

    /// Top-level items in document order
    pub fn top_level(&self) -> Vec<ItemRef> {
        if !self.roots.is_empty() {
            return self.roots.clone();
        }

        let child_details: HashSet<&str> = self
            .bindings
            .iter()
            .flat_map(|b| b.detail_ids.iter().map(String::as_str))
            .collect();
        let child_bindings: HashSet<&str> = self
            .bindings
            .iter()
            .flat_map(|b| b.binding_ids.iter().map(String::as_str))
            .collect();

        self.details
            .iter()
            .filter(|d| !child_details.contains(d.id.as_str()))
            .map(|d| ItemRef::Detail(d.id.clone()))
            .chain(
                self.bindings
                    .iter()
                    .filter(|b| !child_bindings.contains(b.id.as_str()))
                    .map(|b| ItemRef::Binding(b.id.clone())),
            )
            .collect()
    }
}
