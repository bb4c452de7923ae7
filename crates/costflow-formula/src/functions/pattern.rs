//! Regular-expression functions

use super::arg;
use crate::error::{FormulaError, FormulaResult};
use costflow_core::Value;
use regex::{Regex, RegexBuilder};

/// A compiled pattern plus whether the `g` flag was given
pub(crate) struct Pattern {
    pub regex: Regex,
    pub global: bool,
}

/// Compile `pattern` with JavaScript-style flags (`g`, `i`, `m`, `s`, `u`).
/// Unknown or repeated flags are rejected.
pub(crate) fn build_pattern(pattern: &str, flags: &str) -> FormulaResult<Pattern> {
    let mut builder = RegexBuilder::new(pattern);
    let mut global = false;
    let mut seen = String::new();

    for ch in flags.chars() {
        if seen.contains(ch) {
            return Err(FormulaError::InvalidPattern(format!(
                "repeated flag '{}' in '{}'",
                ch, flags
            )));
        }
        seen.push(ch);
        match ch {
            'g' => global = true,
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'u' => {}
            _ => {
                return Err(FormulaError::InvalidPattern(format!(
                    "unsupported flag '{}' in '{}'",
                    ch, flags
                )))
            }
        }
    }

    let regex = builder
        .build()
        .map_err(|e| FormulaError::InvalidPattern(e.to_string()))?;
    Ok(Pattern { regex, global })
}

fn pattern_args(args: &[Value]) -> FormulaResult<(String, Pattern)> {
    let text = arg(args, 0).as_string();
    let flags = match args.get(2) {
        None | Some(Value::Null) => String::new(),
        Some(v) => v.as_string(),
    };
    let pattern = build_pattern(&arg(args, 1).as_string(), &flags)?;
    Ok((text, pattern))
}

/// REGEXMATCH function: `regexMatch(value, pattern, flags?)`
pub fn fn_regex_match(args: &[Value]) -> FormulaResult<Value> {
    let (text, pattern) = pattern_args(args)?;
    Ok(Value::Bool(pattern.regex.is_match(&text)))
}

/// REGEXEXTRACT function: first capture group when the pattern has one
/// and it participated, otherwise the whole match; null when nothing matches.
pub fn fn_regex_extract(args: &[Value]) -> FormulaResult<Value> {
    let (text, pattern) = pattern_args(args)?;
    let Some(caps) = pattern.regex.captures(&text) else {
        return Ok(Value::Null);
    };
    let m = caps.get(1).or_else(|| caps.get(0));
    Ok(m.map_or(Value::Null, |m| Value::String(m.as_str().to_string())))
}
