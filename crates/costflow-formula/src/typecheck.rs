//! Static type checking
//!
//! Infers a best-effort [`ValueType`] for an expression against a
//! [`SymbolTable`]. Unresolved leaf types are expected: `unknown` and `any`
//! flow through operators without producing errors, and a missing symbol
//! is only a warning.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::functions::{registry, ReturnType};
use crate::validate::{IssueCode, Severity};
use ahash::AHashMap;
use costflow_core::path::{parse_path, PathSegment};
use costflow_core::{RequiredResult, Value};
use std::fmt;

/// Symbolic type of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Number,
    String,
    Bool,
    Array,
    /// Statically unknowable (e.g. the result of `get`)
    Any,
    /// Not resolved (missing symbol, undeclared param type)
    Unknown,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Bool => "bool",
            ValueType::Array => "array",
            ValueType::Any => "any",
            ValueType::Unknown => "unknown",
        }
    }

    /// Parse a declared param type; unrecognised names are `Unknown`
    pub fn from_declared(name: &str) -> ValueType {
        match name.trim().to_ascii_lowercase().as_str() {
            "number" | "numeric" | "int" | "integer" | "float" | "decimal" => ValueType::Number,
            "string" | "text" => ValueType::String,
            "bool" | "boolean" => ValueType::Bool,
            "array" | "list" => ValueType::Array,
            "any" | "object" => ValueType::Any,
            _ => ValueType::Unknown,
        }
    }

    /// Type of a runtime value
    pub fn of_value(value: &Value) -> ValueType {
        match value {
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Bool(_) => ValueType::Bool,
            Value::Array(_) => ValueType::Array,
            Value::Null | Value::Record(_) => ValueType::Any,
        }
    }

    /// Number, string, bool or array
    pub fn is_concrete(&self) -> bool {
        !matches!(self, ValueType::Any | ValueType::Unknown)
    }

    /// Accepted where a number is required
    pub fn is_numeric_compatible(&self) -> bool {
        matches!(self, ValueType::Number | ValueType::Any | ValueType::Unknown)
    }

    /// Common type of two branches
    pub fn unify(self, other: ValueType) -> ValueType {
        match (self, other) {
            (a, b) if a == b => a,
            (ValueType::Unknown, _) | (_, ValueType::Unknown) => ValueType::Unknown,
            _ => ValueType::Any,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort type of a param from the last key of its source path
pub fn type_from_path(path: &str) -> ValueType {
    let Ok(segments) = parse_path(path) else {
        return ValueType::Unknown;
    };
    let Some(last) = segments.iter().rev().find_map(PathSegment::as_key) else {
        return ValueType::Unknown;
    };

    if RequiredResult::from_name(last).is_some() {
        return ValueType::Number;
    }

    let key = last.to_ascii_lowercase();
    const NUMERIC: [&str; 10] = [
        "price", "cost", "quantity", "qty", "amount", "count", "area", "volume", "thickness",
        "density",
    ];
    const TEXTUAL: [&str; 6] = ["name", "title", "code", "label", "sku", "description"];

    if NUMERIC.iter().any(|n| key.contains(n)) {
        ValueType::Number
    } else if TEXTUAL.iter().any(|n| key == *n || key.ends_with(n)) {
        ValueType::String
    } else {
        ValueType::Unknown
    }
}

/// Where a symbol came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Input,
    Var,
}

/// One symbol table entry
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub declared_type: Option<ValueType>,
    pub inferred_type: Option<ValueType>,
}

impl Symbol {
    /// Declared type, else inferred type, else unknown
    pub fn value_type(&self) -> ValueType {
        self.declared_type
            .or(self.inferred_type)
            .unwrap_or(ValueType::Unknown)
    }
}

/// Symbols visible to a formula, in insertion order. Inputs go in first,
/// then each variable after it has been checked, so a variable can never
/// see one declared after it.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    index: AHashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, symbol: Symbol) {
        self.index.insert(symbol.name.clone(), self.symbols.len());
        self.symbols.push(symbol);
    }

    pub fn add_input(
        &mut self,
        name: impl Into<String>,
        declared_type: Option<ValueType>,
        inferred_type: Option<ValueType>,
    ) {
        self.push(Symbol {
            kind: SymbolKind::Input,
            name: name.into(),
            declared_type,
            inferred_type,
        });
    }

    /// Add a variable. A later entry with the same name shadows the earlier one.
    pub fn add_var(&mut self, name: impl Into<String>, inferred_type: ValueType) {
        self.push(Symbol {
            kind: SymbolKind::Var,
            name: name.into(),
            declared_type: None,
            inferred_type: Some(inferred_type),
        });
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&i| &self.symbols[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

/// A problem found while type checking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
}

/// Result of [`infer_type`]
#[derive(Debug, Clone, PartialEq)]
pub struct TypeReport {
    pub value_type: ValueType,
    pub issues: Vec<TypeIssue>,
}

impl TypeReport {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

/// Infer the type of `expr` against `symbols`
pub fn infer_type(expr: &Expr, symbols: &SymbolTable) -> TypeReport {
    let mut checker = TypeChecker {
        symbols,
        issues: Vec::new(),
    };
    let value_type = checker.check(expr);
    TypeReport {
        value_type,
        issues: checker.issues,
    }
}

struct TypeChecker<'a> {
    symbols: &'a SymbolTable,
    issues: Vec<TypeIssue>,
}

impl<'a> TypeChecker<'a> {
    fn error(&mut self, code: IssueCode, message: String) {
        self.issues.push(TypeIssue {
            severity: Severity::Error,
            code,
            message,
        });
    }

    fn warning(&mut self, code: IssueCode, message: String) {
        self.issues.push(TypeIssue {
            severity: Severity::Warning,
            code,
            message,
        });
    }

    fn check(&mut self, expr: &Expr) -> ValueType {
        match expr {
            Expr::Literal(value) => ValueType::of_value(value),

            Expr::Identifier(name) => match self.symbols.get(name) {
                Some(symbol) => symbol.value_type(),
                None => {
                    self.warning(
                        IssueCode::UnknownIdentifier,
                        format!("Unknown identifier '{}'", name),
                    );
                    ValueType::Unknown
                }
            },

            Expr::UnaryOp { op, operand } => {
                let operand_type = self.check(operand);
                match op {
                    UnaryOperator::Not => ValueType::Bool,
                    UnaryOperator::Negate => {
                        if !operand_type.is_numeric_compatible() {
                            self.error(
                                IssueCode::TypeMismatch,
                                format!("Cannot negate a {}", operand_type),
                            );
                        }
                        ValueType::Number
                    }
                }
            }

            Expr::BinaryOp { op, left, right } => {
                let l = self.check(left);
                let r = self.check(right);
                self.check_binary(*op, l, r)
            }

            Expr::Call { name, args } => {
                let arg_types: Vec<ValueType> = args.iter().map(|a| self.check(a)).collect();
                self.check_call(name, &arg_types)
            }
        }
    }

    fn check_binary(&mut self, op: BinaryOperator, l: ValueType, r: ValueType) -> ValueType {
        match op {
            BinaryOperator::Add => {
                if l == ValueType::String || r == ValueType::String {
                    return ValueType::String;
                }
                self.require_numeric(op, l, r);
                ValueType::Number
            }
            op if op.is_numeric() => {
                self.require_numeric(op, l, r);
                ValueType::Number
            }
            op if op.is_ordering() => {
                if l.is_concrete() && r.is_concrete() && l != r {
                    self.warning(
                        IssueCode::TypeMismatch,
                        format!("Comparing {} with {} using '{}'", l, r, op.symbol()),
                    );
                }
                ValueType::Bool
            }
            _ => ValueType::Bool,
        }
    }

    fn require_numeric(&mut self, op: BinaryOperator, l: ValueType, r: ValueType) {
        for (side, t) in [("left", l), ("right", r)] {
            if !t.is_numeric_compatible() {
                self.error(
                    IssueCode::TypeMismatch,
                    format!(
                        "Operator '{}' expects numbers, got {} on the {}",
                        op.symbol(),
                        t,
                        side
                    ),
                );
            }
        }
    }

    fn check_call(&mut self, name: &str, arg_types: &[ValueType]) -> ValueType {
        let Some(func) = registry().get(name) else {
            self.error(
                IssueCode::UnknownFunction,
                format!("Unknown function '{}'", name),
            );
            return ValueType::Unknown;
        };

        if !func.accepts(arg_types.len()) {
            self.error(
                IssueCode::ArgumentCount,
                format!(
                    "{}() takes {} argument(s), got {}",
                    func.name,
                    func.arity(),
                    arg_types.len()
                ),
            );
        }

        match func.returns {
            ReturnType::Fixed(t) => t,
            ReturnType::Branches => {
                let then_type = arg_types.get(1).copied().unwrap_or(ValueType::Unknown);
                let else_type = arg_types.get(2).copied().unwrap_or(ValueType::Any);
                then_type.unify(else_type)
            }
        }
    }
}
