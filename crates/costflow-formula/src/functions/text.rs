//! Text functions

use super::arg;
use super::pattern::build_pattern;
use crate::error::FormulaResult;
use costflow_core::Value;

/// TRIM function
pub fn fn_trim(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::String(arg(args, 0).as_string().trim().to_string()))
}

/// LOWER function
pub fn fn_lower(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::String(arg(args, 0).as_string().to_lowercase()))
}

/// UPPER function
pub fn fn_upper(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::String(arg(args, 0).as_string().to_uppercase()))
}

/// REPLACE function: `replace(value, search, replacement, flags?)`.
///
/// Without flags `search` is literal text and every occurrence is replaced.
/// With flags (even empty) `search` is a pattern; `g` replaces all matches,
/// otherwise only the first, and `$1` style group references are expanded.
pub fn fn_replace(args: &[Value]) -> FormulaResult<Value> {
    let text = arg(args, 0).as_string();
    let search = arg(args, 1).as_string();
    let replacement = arg(args, 2).as_string();

    let result = match args.get(3) {
        None | Some(Value::Null) => {
            if search.is_empty() {
                text
            } else {
                text.replace(&search, &replacement)
            }
        }
        Some(flags) => {
            let pattern = build_pattern(&search, &flags.as_string())?;
            if pattern.global {
                pattern.regex.replace_all(&text, replacement.as_str()).into_owned()
            } else {
                pattern.regex.replace(&text, replacement.as_str()).into_owned()
            }
        }
    };

    Ok(Value::String(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_trim() {
        assert_eq!(fn_trim(&[Value::from("  a b  ")]).unwrap(), Value::from("a b"));
        assert_eq!(fn_lower(&[Value::from("MiXeD")]).unwrap(), Value::from("mixed"));
        assert_eq!(fn_upper(&[Value::from("MiXeD")]).unwrap(), Value::from("MIXED"));
        assert_eq!(fn_upper(&[Value::from(1.5)]).unwrap(), Value::from("1.5"));
    }

    #[test]
    fn test_replace_literal() {
        let args = [Value::from("a.b.c"), Value::from("."), Value::from("-")];
        assert_eq!(fn_replace(&args).unwrap(), Value::from("a-b-c"));
    }

    #[test]
    fn test_replace_pattern() {
        let args = [
            Value::from("a1b22c333"),
            Value::from(r"\d+"),
            Value::from("#"),
            Value::from("g"),
        ];
        assert_eq!(fn_replace(&args).unwrap(), Value::from("a#b#c#"));

        let args = [
            Value::from("a1b22c333"),
            Value::from(r"\d+"),
            Value::from("#"),
            Value::from(""),
        ];
        assert_eq!(fn_replace(&args).unwrap(), Value::from("a#b22c333"));

        let args = [
            Value::from("width=120"),
            Value::from(r"(\w+)=(\d+)"),
            Value::from("$2 $1"),
            Value::from("g"),
        ];
        assert_eq!(fn_replace(&args).unwrap(), Value::from("120 width"));
    }
}
