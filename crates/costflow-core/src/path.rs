//! Dotted/indexed paths into the host data tree
//!
//! Grammar: `segment ('.' segment)*` where a segment is a name optionally
//! followed by any number of `[n]` / `[name]` / `["name"]` subscripts.
//! An all-digit segment (`items.0.price`) addresses an index.

use crate::error::{Error, Result};
use std::fmt;

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    fn from_name(name: &str) -> Self {
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(idx) = name.parse() {
                return PathSegment::Index(idx);
            }
        }
        PathSegment::Key(name.to_string())
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSegment::Key(k) => Some(k),
            PathSegment::Index(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// Parse a path string into segments
///
/// # Example
/// ```rust
/// use costflow_core::path::{parse_path, PathSegment};
///
/// let p = parse_path("stages[0].outputs.width").unwrap();
/// assert_eq!(p[1], PathSegment::Index(0));
/// ```
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_path(path, "empty path"));
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let mut segments = Vec::new();
    let mut name = String::new();
    // Whether the previous thing we closed was a subscript (so `a[0].b` is fine
    // but `a..b` or a trailing `.` is not).
    let mut after_subscript = false;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                if name.is_empty() && !after_subscript {
                    return Err(Error::invalid_path(path, "empty segment"));
                }
                if !name.is_empty() {
                    segments.push(PathSegment::from_name(&name));
                    name.clear();
                }
                after_subscript = false;
                if i + 1 == chars.len() {
                    return Err(Error::invalid_path(path, "trailing '.'"));
                }
            }
            '[' => {
                if !name.is_empty() {
                    segments.push(PathSegment::from_name(&name));
                    name.clear();
                } else if segments.is_empty() {
                    return Err(Error::invalid_path(path, "subscript without a name"));
                }
                let close = chars[i + 1..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|p| p + i + 1)
                    .ok_or_else(|| Error::invalid_path(path, "unclosed '['"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                let inner = inner.trim();
                let inner = inner
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
                    .unwrap_or(inner);
                if inner.is_empty() {
                    return Err(Error::invalid_path(path, "empty subscript"));
                }
                segments.push(PathSegment::from_name(inner));
                after_subscript = true;
                i = close;
            }
            ']' => return Err(Error::invalid_path(path, "unexpected ']'")),
            c => {
                if after_subscript && name.is_empty() {
                    return Err(Error::invalid_path(path, "expected '.' after subscript"));
                }
                name.push(c);
            }
        }
        i += 1;
    }

    if !name.is_empty() {
        segments.push(PathSegment::from_name(&name));
    }

    Ok(segments)
}

/// Render segments back into canonical path text
pub fn format_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for seg in segments {
        match seg {
            PathSegment::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
            PathSegment::Index(i) => out.push_str(&format!("[{}]", i)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(k: &str) -> PathSegment {
        PathSegment::Key(k.to_string())
    }

    #[test]
    fn test_parse_dotted() {
        assert_eq!(
            parse_path("properties.color.value").unwrap(),
            vec![key("properties"), key("color"), key("value")]
        );
    }

    #[test]
    fn test_parse_indexed() {
        assert_eq!(
            parse_path("stages[2].outputs.width").unwrap(),
            vec![key("stages"), PathSegment::Index(2), key("outputs"), key("width")]
        );
        assert_eq!(
            parse_path("a[0][1]").unwrap(),
            vec![key("a"), PathSegment::Index(0), PathSegment::Index(1)]
        );
        assert_eq!(
            parse_path("items.3").unwrap(),
            vec![key("items"), PathSegment::Index(3)]
        );
    }

    #[test]
    fn test_parse_named_subscript() {
        assert_eq!(
            parse_path("stage_12.operationVariant[price]").unwrap(),
            vec![key("stage_12"), key("operationVariant"), key("price")]
        );
        assert_eq!(
            parse_path("a[\"b c\"]").unwrap(),
            vec![key("a"), key("b c")]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_path("").is_err());
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("a.").is_err());
        assert!(parse_path("a[0").is_err());
        assert!(parse_path("a[]").is_err());
        assert!(parse_path("[0]").is_err());
        assert!(parse_path("a]").is_err());
        assert!(parse_path("a[0]b").is_err());
    }

    #[test]
    fn test_format_path() {
        let p = parse_path("stages[1].outputs.width").unwrap();
        assert_eq!(format_path(&p), "stages[1].outputs.width");
    }
}
