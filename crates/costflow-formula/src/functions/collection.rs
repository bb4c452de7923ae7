//! Array, record and lookup functions

use super::arg;
use crate::error::{FormulaError, FormulaResult};
use costflow_core::path::{parse_path, PathSegment};
use costflow_core::Value;
use lazy_regex::regex;

/// LEN function: string length in characters, array length or record key count
pub fn fn_len(args: &[Value]) -> FormulaResult<Value> {
    let len = match arg(args, 0) {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Record(map) => map.len(),
        other => other.as_string().chars().count(),
    };
    Ok(Value::Number(len as f64))
}

/// CONTAINS function: array membership (strict equality), record key
/// presence, or substring test on the stringified value
pub fn fn_contains(args: &[Value]) -> FormulaResult<Value> {
    let needle = arg(args, 1);
    let found = match arg(args, 0) {
        Value::Null => false,
        Value::Array(items) => items.iter().any(|item| item == needle),
        Value::Record(map) => map.contains_key(&needle.as_string()),
        haystack => haystack.as_string().contains(&needle.as_string()),
    };
    Ok(Value::Bool(found))
}

/// SPLIT function: `split(value, delimiter?)`; the default delimiter is a
/// run of whitespace
pub fn fn_split(args: &[Value]) -> FormulaResult<Value> {
    let text = match arg(args, 0) {
        Value::Null => return Ok(Value::Array(Vec::new())),
        v => v.as_string(),
    };

    let parts: Vec<Value> = match args.get(1) {
        None | Some(Value::Null) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                regex!(r"\s+").split(trimmed).map(Value::from).collect()
            }
        }
        Some(delimiter) => {
            let delimiter = delimiter.as_string();
            if delimiter.is_empty() {
                text.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                text.split(delimiter.as_str()).map(Value::from).collect()
            }
        }
    };

    Ok(Value::Array(parts))
}

/// JOIN function: `join(array, delimiter?)`, default delimiter `,`
pub fn fn_join(args: &[Value]) -> FormulaResult<Value> {
    let delimiter = match args.get(1) {
        None | Some(Value::Null) => ",".to_string(),
        Some(v) => v.as_string(),
    };
    let joined = match arg(args, 0) {
        Value::Array(items) => items
            .iter()
            .map(Value::as_string)
            .collect::<Vec<_>>()
            .join(&delimiter),
        other => other.as_string(),
    };
    Ok(Value::String(joined))
}

/// GET function: `get(value, path)` where `path` is a dotted/indexed path
/// (`a.b[0].c`) or a numeric index. Missing data yields null.
pub fn fn_get(args: &[Value]) -> FormulaResult<Value> {
    let source = arg(args, 0);
    let segments = match arg(args, 1) {
        Value::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => {
            vec![PathSegment::Index(*n as usize)]
        }
        Value::String(path) => {
            parse_path(path).map_err(|e| FormulaError::Argument(format!("get: {}", e)))?
        }
        other => {
            return Err(FormulaError::Argument(format!(
                "get: path must be a string or a non-negative integer, got {}",
                other.type_name()
            )))
        }
    };

    Ok(source.get_path(&segments).cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn variant() -> Value {
        serde_json::from_str(
            r#"{"name":"Steel","dims":{"w":1200,"h":800},"tiers":[{"from":1,"price":10},{"from":100,"price":8}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_len() {
        assert_eq!(fn_len(&[Value::from("héllo")]).unwrap(), Value::Number(5.0));
        assert_eq!(fn_len(&[variant()]).unwrap(), Value::Number(3.0));
        assert_eq!(
            fn_len(&[Value::Array(vec![Value::Null, Value::Null])]).unwrap(),
            Value::Number(2.0)
        );
        assert_eq!(fn_len(&[Value::Null]).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_contains() {
        let list = Value::Array(vec![Value::from("a"), Value::from(2.0)]);
        assert_eq!(fn_contains(&[list.clone(), Value::from(2.0)]).unwrap(), Value::Bool(true));
        assert_eq!(fn_contains(&[list, Value::from("2")]).unwrap(), Value::Bool(false));
        assert_eq!(
            fn_contains(&[Value::from("galvanized"), Value::from("van")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(fn_contains(&[variant(), Value::from("dims")]).unwrap(), Value::Bool(true));
        assert_eq!(fn_contains(&[Value::Null, Value::from("")]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_split_and_join() {
        let parts = fn_split(&[Value::from("  a  b\tc ")]).unwrap();
        assert_eq!(
            parts,
            Value::Array(vec![Value::from("a"), Value::from("b"), Value::from("c")])
        );
        assert_eq!(fn_join(&[parts.clone()]).unwrap(), Value::from("a,b,c"));
        assert_eq!(
            fn_join(&[parts, Value::from(" / ")]).unwrap(),
            Value::from("a / b / c")
        );

        let parts = fn_split(&[Value::from("1200x800"), Value::from("x")]).unwrap();
        assert_eq!(parts, Value::Array(vec![Value::from("1200"), Value::from("800")]));
        assert_eq!(fn_split(&[Value::from("   ")]).unwrap(), Value::Array(vec![]));
    }

    #[test]
    fn test_get() {
        let v = variant();
        assert_eq!(fn_get(&[v.clone(), Value::from("dims.w")]).unwrap(), Value::Number(1200.0));
        assert_eq!(
            fn_get(&[v.clone(), Value::from("tiers[1].price")]).unwrap(),
            Value::Number(8.0)
        );
        assert_eq!(fn_get(&[v.clone(), Value::from("missing.x")]).unwrap(), Value::Null);
        assert_eq!(
            fn_get(&[Value::Array(vec![Value::from("a"), Value::from("b")]), Value::from(1.0)])
                .unwrap(),
            Value::from("b")
        );
        assert!(fn_get(&[v.clone(), Value::from(-1.0)]).is_err());
        assert!(fn_get(&[v, Value::from("a..b")]).is_err());
    }
}
