//! Built-in functions
//!
//! The registry is the complete callable surface of the language. Call
//! expressions resolve their callee here (case-insensitively) and never in
//! the evaluation context.

pub mod collection;
pub mod convert;
pub mod logical;
pub mod math;
pub mod pattern;
pub mod price;
pub mod text;

use crate::error::FormulaResult;
use crate::typecheck::ValueType;
use ahash::AHashMap;
use costflow_core::Value;
use std::sync::OnceLock;

/// Function implementation signature. Built-ins are pure: they see only
/// their already-evaluated arguments.
pub type FunctionImpl = fn(&[Value]) -> FormulaResult<Value>;

static NULL: Value = Value::Null;

/// Argument `index`, or null when omitted
pub(crate) fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

/// Static return-type rule used by the type checker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    /// Always this type
    Fixed(ValueType),
    /// Unification of the second and third argument types (`if`)
    Branches,
}

/// Function definition
pub struct FunctionDef {
    /// Canonical name
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Return type rule
    pub returns: ReturnType,
}

impl FunctionDef {
    /// Human-readable arity, e.g. `1`, `1 to 3`, `at least 1`
    pub fn arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// Global registry of built-in functions (lazily initialized)
pub fn registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_logical_functions();
        registry.register_math_functions();
        registry.register_text_functions();
        registry.register_conversion_functions();
        registry.register_collection_functions();
        registry.register_pattern_functions();
        registry.register_price_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_ascii_lowercase(), def);
    }

    /// Canonical names of all registered functions, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.values().map(|f| f.name).collect();
        names.sort_unstable();
        names
    }

    fn add(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
        returns: ValueType,
    ) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation,
            returns: ReturnType::Fixed(returns),
        });
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef {
            name: "if",
            min_args: 2,
            max_args: Some(3),
            implementation: logical::fn_if,
            returns: ReturnType::Branches,
        });
    }

    fn register_math_functions(&mut self) {
        self.add("round", 1, Some(2), math::fn_round, ValueType::Number);
        self.add("ceil", 1, Some(1), math::fn_ceil, ValueType::Number);
        self.add("floor", 1, Some(1), math::fn_floor, ValueType::Number);
        self.add("abs", 1, Some(1), math::fn_abs, ValueType::Number);
        self.add("min", 1, None, math::fn_min, ValueType::Number);
        self.add("max", 1, None, math::fn_max, ValueType::Number);
    }

    fn register_text_functions(&mut self) {
        self.add("trim", 1, Some(1), text::fn_trim, ValueType::String);
        self.add("lower", 1, Some(1), text::fn_lower, ValueType::String);
        self.add("upper", 1, Some(1), text::fn_upper, ValueType::String);
        self.add("replace", 3, Some(4), text::fn_replace, ValueType::String);
    }

    fn register_conversion_functions(&mut self) {
        self.add("toNumber", 1, Some(1), convert::fn_to_number, ValueType::Number);
        self.add("toString", 1, Some(1), convert::fn_to_string, ValueType::String);
    }

    fn register_collection_functions(&mut self) {
        self.add("len", 1, Some(1), collection::fn_len, ValueType::Number);
        self.add("contains", 2, Some(2), collection::fn_contains, ValueType::Bool);
        self.add("split", 1, Some(2), collection::fn_split, ValueType::Array);
        self.add("join", 1, Some(2), collection::fn_join, ValueType::String);
        self.add("get", 2, Some(2), collection::fn_get, ValueType::Any);
    }

    fn register_pattern_functions(&mut self) {
        self.add("regexMatch", 2, Some(3), pattern::fn_regex_match, ValueType::Bool);
        self.add("regexExtract", 2, Some(3), pattern::fn_regex_extract, ValueType::String);
    }

    fn register_price_functions(&mut self) {
        self.add("getPrice", 2, Some(3), price::fn_get_price, ValueType::Number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let reg = registry();
        assert_eq!(reg.get("ROUND").map(|f| f.name), Some("round"));
        assert_eq!(reg.get("tonumber").map(|f| f.name), Some("toNumber"));
        assert!(reg.get("eval").is_none());
    }

    #[test]
    fn test_whitelist_is_fixed() {
        assert_eq!(
            registry().names(),
            vec![
                "abs",
                "ceil",
                "contains",
                "floor",
                "get",
                "getPrice",
                "if",
                "join",
                "len",
                "lower",
                "max",
                "min",
                "regexExtract",
                "regexMatch",
                "replace",
                "round",
                "split",
                "toNumber",
                "toString",
                "trim",
                "upper",
            ]
        );
    }

    #[test]
    fn test_arity() {
        let reg = registry();
        assert_eq!(reg.get("if").map(|f| f.arity()), Some("2 to 3".to_string()));
        assert_eq!(reg.get("abs").map(|f| f.arity()), Some("1".to_string()));
        assert_eq!(reg.get("max").map(|f| f.arity()), Some("at least 1".to_string()));
        assert!(reg.get("max").map_or(false, |f| f.accepts(7)));
        assert!(!reg.get("abs").map_or(true, |f| f.accepts(2)));
    }
}
