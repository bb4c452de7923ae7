//! # costflow-formula
//!
//! The sandboxed formula language used by costflow calculators.
//!
//! This crate provides:
//! - Tokenizing and parsing (text → AST)
//! - Evaluation against a flat name → value context
//! - A fixed whitelist of built-in functions, including tiered price lookup
//! - Static type inference
//! - Validation of whole calculator logic definitions
//!
//! Formulas can read the context they are given and call whitelisted
//! functions; they can do nothing else.
//!
//! ## Example
//!
//! ```rust
//! use costflow_formula::{evaluate_formula, Context};
//! use costflow_core::Value;
//!
//! let ctx = Context::new().with("width", 120.0).with("height", 80.0);
//! let area = evaluate_formula("round(width * height / 1000, 1)", &ctx).unwrap();
//! assert_eq!(area, Value::Number(9.6));
//! ```

pub mod ast;
pub mod cache;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod token;
pub mod typecheck;
pub mod validate;

pub use ast::{BinaryOperator, Expr, UnaryOperator};
pub use cache::ExprCache;
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, evaluate_formula, try_evaluate, Context};
pub use functions::{registry, FunctionRegistry};
pub use parser::{parse, parse_formula};
pub use token::{tokenize, Token, TokenKind};
pub use typecheck::{infer_type, type_from_path, SymbolTable, TypeReport, ValueType};
pub use validate::{
    validate_formula, validate_logic, IssueCode, Scope, Severity, ValidationIssue,
    ValidationReport, ValidationRequest,
};
