//! # costflow-core
//!
//! Core data structures for the costflow calculation engine.
//!
//! This crate provides the fundamental types used throughout costflow:
//! - [`Value`] - Runtime values (numbers, strings, booleans, null, arrays, opaque records)
//! - [`path`] - Dotted/indexed paths into the host data tree
//! - [`pricing`] - Price tiers, tiered price lookup and markup
//! - [`logic`] - Calculator settings: params, input wiring, LOGIC_JSON, output mapping
//! - [`model`] - The stage / detail / binding structure of an offer
//! - [`CatalogLookup`] - Read-only lookup-by-id of catalog data
//!
//! ## Example
//!
//! ```rust
//! use costflow_core::{Value, path::parse_path};
//!
//! let offer: Value = serde_json::from_str(r#"{"properties":{"width":{"value":120}}}"#).unwrap();
//! let path = parse_path("properties.width.value").unwrap();
//! assert_eq!(offer.get_path(&path), Some(&Value::Number(120.0)));
//! ```

pub mod error;
pub mod logic;
pub mod lookup;
pub mod model;
pub mod path;
pub mod pricing;
pub mod value;

// Re-exports for convenience
pub use error::{Error, Result};
pub use logic::{
    CalculatorSettings, InputWiring, LogicDefinition, OutputMapping, ParamDeclaration,
    RequiredResult, ResultKey, VariableBody, VariableDef,
};
pub use lookup::{Catalog, CatalogLookup};
pub use model::{Binding, Detail, ItemRef, OptionEntry, OptionsMapping, ProductStructure, StageInstance};
pub use path::{parse_path, PathSegment};
pub use pricing::{get_price, LookupMode, MarkupUnit, PriceQuote, PriceTier, PriceType};
pub use value::Value;

/// Top-level context name that must never be read by formulas: the raw
/// collection of all trade-offer variants (as opposed to the resolved offer).
pub const FORBIDDEN_ROOTS: &[&str] = &["selectedOffers"];
