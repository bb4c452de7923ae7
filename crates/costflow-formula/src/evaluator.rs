//! Formula evaluator
//!
//! Walks an expression tree bottom-up against a flat name → value
//! [`Context`]. Evaluation has no side effects and touches nothing but the
//! context it is given.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::registry;
use crate::parser::parse_formula;
use ahash::AHashMap;
use costflow_core::Value;
use std::cmp::Ordering;

/// Flat name → value map a formula is evaluated against
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: AHashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<K: Into<String>> Extend<(K, Value)> for Context {
    fn extend<I: IntoIterator<Item = (K, Value)>>(&mut self, iter: I) {
        self.values
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v)));
    }
}

/// Evaluate a formula expression.
///
/// A missing identifier evaluates to null; callers decide whether absence
/// is fatal. Unknown functions and failing built-ins are errors.
pub fn evaluate(expr: &Expr, ctx: &Context) -> FormulaResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),

        Expr::Identifier(name) => Ok(ctx.get(name).cloned().unwrap_or_default()),

        Expr::UnaryOp { op, operand } => {
            let value = evaluate(operand, ctx)?;
            Ok(evaluate_unary_op(*op, &value))
        }

        Expr::BinaryOp { op, left, right } => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            Ok(evaluate_binary_op(*op, &left, &right))
        }

        Expr::Call { name, args } => evaluate_function(name, args, ctx),
    }
}

/// Tokenize, parse and evaluate formula text
pub fn evaluate_formula(formula: &str, ctx: &Context) -> FormulaResult<Value> {
    let expr = parse_formula(formula)?;
    evaluate(&expr, ctx)
}

/// Evaluate, reporting "no value" as `Ok(None)`.
///
/// Null and non-finite numeric results are not values (see
/// [`Value::is_present`]); a returned `Some` is always present. Errors are
/// passed through for the caller to log or count.
pub fn try_evaluate(expr: &Expr, ctx: &Context) -> FormulaResult<Option<Value>> {
    let value = evaluate(expr, ctx)?;
    Ok(Some(value).filter(Value::is_present))
}

fn evaluate_unary_op(op: UnaryOperator, value: &Value) -> Value {
    match op {
        UnaryOperator::Not => Value::Bool(!value.truthy()),
        UnaryOperator::Negate => Value::Number(-value.to_number()),
    }
}

/// Apply a binary operator to two evaluated operands
pub fn evaluate_binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOperator::Add => add(left, right),

        BinaryOperator::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Modulo => Value::Number(left.to_number() % right.to_number()),

        BinaryOperator::Equal => Value::Bool(left == right),
        BinaryOperator::NotEqual => Value::Bool(left != right),

        BinaryOperator::LessThan => {
            Value::Bool(matches!(compare_values(left, right), Some(Ordering::Less)))
        }
        BinaryOperator::LessEqual => Value::Bool(matches!(
            compare_values(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOperator::GreaterThan => {
            Value::Bool(matches!(compare_values(left, right), Some(Ordering::Greater)))
        }
        BinaryOperator::GreaterEqual => Value::Bool(matches!(
            compare_values(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),

        BinaryOperator::And => Value::Bool(left.truthy() && right.truthy()),
        BinaryOperator::Or => Value::Bool(left.truthy() || right.truthy()),
    }
}

/// `+`: numeric when both sides are numeric-like, else concatenation when
/// either side is a string, else numeric coercion
fn add(left: &Value, right: &Value) -> Value {
    if let (Some(a), Some(b)) = (left.numeric(), right.numeric()) {
        return Value::Number(a + b);
    }
    match (left, right) {
        (Value::String(_), _) | (_, Value::String(_)) => {
            let mut s = left.as_string();
            s.push_str(&right.as_string());
            Value::String(s)
        }
        _ => Value::Number(left.to_number() + right.to_number()),
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`. Numeric when both sides are
/// numeric-like; otherwise only string/string and bool/bool are ordered.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (left.numeric(), right.numeric()) {
        return a.partial_cmp(&b);
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn evaluate_function(name: &str, args: &[Expr], ctx: &Context) -> FormulaResult<Value> {
    let func = registry()
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    // Check argument count
    if !func.accepts(args.len()) {
        return Err(FormulaError::ArgumentCount {
            function: func.name.to_string(),
            expected: func.arity(),
            actual: args.len(),
        });
    }

    // Evaluate arguments
    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        evaluated_args.push(evaluate(arg, ctx)?);
    }

    // Call the function
    (func.implementation)(&evaluated_args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eval(formula: &str) -> FormulaResult<Value> {
        evaluate_formula(formula, &Context::new())
    }

    fn eval_with(formula: &str, ctx: &Context) -> Value {
        evaluate_formula(formula, ctx).unwrap()
    }

    #[test]
    fn test_evaluate_literals() {
        assert_eq!(eval("42").unwrap(), Value::Number(42.0));
        assert_eq!(eval("'Hello'").unwrap(), Value::from("Hello"));
        assert_eq!(eval("true").unwrap(), Value::Bool(true));
        assert_eq!(eval("null").unwrap(), Value::Null);
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("1+2").unwrap(), Value::Number(3.0));
        assert_eq!(eval("10-3").unwrap(), Value::Number(7.0));
        assert_eq!(eval("4*5").unwrap(), Value::Number(20.0));
        assert_eq!(eval("20/4").unwrap(), Value::Number(5.0));
        assert_eq!(eval("7 % 3").unwrap(), Value::Number(1.0));
        assert_eq!(eval("2+3*4-5").unwrap(), Value::Number(9.0));
        assert_eq!(eval("--5").unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_nested_parentheses_condition() {
        assert_eq!(
            eval("if(2150 > (1000 + 150), 0, (2150 - 1000 - 150))").unwrap(),
            Value::Number(0.0)
        );
        assert_eq!(
            eval("if(900 > (1000 + 150), 0, (2150 - 1000 - 150))").unwrap(),
            Value::Number(1000.0)
        );
    }

    #[test]
    fn test_plus_overload() {
        let ctx = Context::new()
            .with("n", "12")
            .with("label", "Sheet ")
            .with("flag", true);
        // both numeric-like: numeric addition, even for numeric strings
        assert_eq!(eval_with("n + 3", &ctx), Value::Number(15.0));
        assert_eq!(eval_with("'2' + '2'", &ctx), Value::Number(4.0));
        // otherwise a string side concatenates
        assert_eq!(eval_with("label + n", &ctx), Value::from("Sheet 12"));
        assert_eq!(eval_with("label + 1.5", &ctx), Value::from("Sheet 1.5"));
        assert_eq!(eval_with("'x' + flag", &ctx), Value::from("xtrue"));
        // no string side: numeric coercion
        assert_eq!(eval_with("flag + 1", &ctx), Value::Number(2.0));
        // other operators always coerce
        assert_eq!(eval_with("n * 2", &ctx), Value::Number(24.0));
        assert!(eval_with("label * 2", &ctx).as_finite().is_none());
    }

    #[test]
    fn test_missing_identifier_is_null() {
        let ctx = Context::new();
        assert_eq!(eval_with("missing", &ctx), Value::Null);
        // and poisons arithmetic instead of acting as zero
        assert!(eval_with("missing * 2", &ctx).as_finite().is_none());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("1 < 2").unwrap(), Value::Bool(true));
        assert_eq!(eval("'10' > 9").unwrap(), Value::Bool(true));
        assert_eq!(eval("'10' > '9'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'abc' < 'abd'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'abc' >= 1").unwrap(), Value::Bool(false));
        assert_eq!(eval("'abc' < 1").unwrap(), Value::Bool(false));
        assert_eq!(eval("true > false").unwrap(), Value::Bool(true));
        assert_eq!(eval("null < 1").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_strict_equality() {
        assert_eq!(eval("1 == 1").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 == '1'").unwrap(), Value::Bool(false));
        assert_eq!(eval("1 != '1'").unwrap(), Value::Bool(true));
        assert_eq!(eval("null == null").unwrap(), Value::Bool(true));
        assert_eq!(eval("split('a b') == split('a  b')").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_logical() {
        assert_eq!(eval("1 and 'x'").unwrap(), Value::Bool(true));
        assert_eq!(eval("0 or ''").unwrap(), Value::Bool(false));
        assert_eq!(eval("not 0").unwrap(), Value::Bool(true));
        assert_eq!(eval("!missing").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("ROUND(2.346, 2)").unwrap(), Value::Number(2.35));
        assert_eq!(eval("max(1, 5, 3)").unwrap(), Value::Number(5.0));
        assert_eq!(eval("upper(trim('  ab '))").unwrap(), Value::from("AB"));
        assert_eq!(eval("len(split('a b c'))").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_call_errors() {
        assert_eq!(
            eval("frobnicate(1)"),
            Err(FormulaError::UnknownFunction("frobnicate".into()))
        );
        assert_eq!(
            eval("abs(1, 2)"),
            Err(FormulaError::ArgumentCount {
                function: "abs".into(),
                expected: "1".into(),
                actual: 2
            })
        );
        // callees are never looked up in the context
        let ctx = Context::new().with("f", 1.0);
        assert!(evaluate_formula("f(1)", &ctx).is_err());
    }

    #[test]
    fn test_try_evaluate_separates_absent_from_failed() {
        let ctx = Context::new().with("w", 2.0);
        let ok = parse_formula("w * 3").unwrap();
        assert_eq!(try_evaluate(&ok, &ctx), Ok(Some(Value::Number(6.0))));

        for formula in ["w / 0", "h * 3", "toNumber('x')", "missing"] {
            let expr = parse_formula(formula).unwrap();
            assert_eq!(try_evaluate(&expr, &ctx), Ok(None), "{}", formula);
        }
        let unknown = parse_formula("nope(w)").unwrap();
        assert!(try_evaluate(&unknown, &ctx).is_err());

        // zero is a value
        let zero = parse_formula("w - 2").unwrap();
        assert_eq!(try_evaluate(&zero, &ctx), Ok(Some(Value::Number(0.0))));
    }

    #[test]
    fn test_deeply_nested_formula_is_an_error() {
        let err = eval(&format!("{}1", "-".repeat(5000))).unwrap_err();
        assert!(err.is_syntax());
        let err = eval(&format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000))).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(eval(&format!("{}1", "-".repeat(201))).unwrap(), Value::Number(-1.0));
    }

    proptest! {
        #[test]
        fn prop_keyword_and_symbol_forms_agree(a: bool, b: bool) {
            let ctx = Context::new().with("a", a).with("b", b);
            let keyword = eval_with("if(a and b, 1, 0)", &ctx);
            let symbol = eval_with("if(a && b, 1, 0)", &ctx);
            prop_assert_eq!(&keyword, &symbol);
            prop_assert_eq!(keyword, Value::Number(if a && b { 1.0 } else { 0.0 }));

            let keyword = eval_with("not a or b", &ctx);
            let symbol = eval_with("!a || b", &ctx);
            prop_assert_eq!(keyword, symbol);
        }

        #[test]
        fn prop_evaluation_is_deterministic(x in -1e6f64..1e6, y in -1e6f64..1e6, s in "[a-z]{0,8}") {
            let ctx = Context::new().with("x", x).with("y", y).with("s", s.as_str());
            for formula in [
                "x + y * 2 - x % 7",
                "if(x > y, s + x, round(y, 2))",
                "len(s) + max(x, y)",
                "contains(upper(s), 'A') or x <= y",
            ] {
                let expr = parse_formula(formula).unwrap();
                let first = evaluate(&expr, &ctx);
                let second = evaluate(&expr, &ctx);
                prop_assert_eq!(first, second);
            }
        }
    }
}
