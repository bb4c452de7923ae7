//! Prelude module - common imports for costflow users
//!
//! ```rust
//! use costflow::prelude::*;
//! ```

pub use crate::{
    // Structure types
    Binding,
    // Calculation types
    CalculationOptions,
    CalculationRequest,
    CalculationStats,
    Calculator,
    CalculatorSettings,
    Catalog,
    CatalogLookup,
    // Formula types
    Context,
    CostRecord,
    CostSource,
    Detail,

    // Error types
    Error,
    InputWiring,
    ItemRef,
    LogicDefinition,
    OfferResult,
    OutputMapping,
    ParamDeclaration,
    PriceTier,
    PriceType,
    ProductStructure,
    Result,
    StageInstance,
    Value,
    VariableDef,

    evaluate_formula,
    validate_logic,
};
