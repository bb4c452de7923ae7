//! # costflow
//!
//! Cost calculation for hierarchical product offers.
//!
//! An offer is built from details (physical components) and bindings
//! (groupings of details and other bindings). Each owns an ordered list of
//! stages, and each stage runs a reusable calculator: a list of formula
//! variables evaluated against inputs wired from the offer's data tree.
//! Stage costs roll up into detail, binding and offer totals, and a markup
//! pass produces one sale price per price type.
//!
//! ## Features
//!
//! - Sandboxed formula language with a fixed function whitelist
//! - Static validation and type inference of calculator logic
//! - Tiered price lookup (`getPrice`) and quantity-tiered markups
//! - Cycle-safe, memoised walk over shared details and bindings
//! - Progress reporting and cancellation
//!
//! ## Example
//!
//! ```rust
//! use costflow::prelude::*;
//!
//! let ctx = Context::new().with("qty", 250.0);
//! let price = evaluate_formula("qty * 0.4 + 12", &ctx).unwrap();
//! assert_eq!(price, Value::Number(112.0));
//! ```

pub mod calculation;
pub mod context;
pub mod markup;
pub mod prelude;
pub mod request;

// Re-export calculation types
pub use calculation::{
    CalculationOptions, CalculationStats, Calculator, CostRecord, CostSource, ItemKind,
    ItemResult, OfferResult, Progress, StageResult,
};
pub use context::{ContextBuilder, VariantKind};
pub use markup::{apply_markups, SalePrice};
pub use request::CalculationRequest;

// Re-export core types
pub use costflow_core::{
    Binding, CalculatorSettings, Catalog, CatalogLookup, Detail, Error, InputWiring, ItemRef,
    LogicDefinition, OutputMapping, ParamDeclaration, PriceTier, PriceType, ProductStructure,
    Result, StageInstance, Value, VariableDef,
};

// Re-export formula types
pub use costflow_formula::{
    evaluate, evaluate_formula, infer_type, parse_formula, validate_logic, Context, Expr,
    FormulaError, FormulaResult, Severity, SymbolTable, ValidationIssue, ValidationReport,
    ValidationRequest, ValueType,
};
