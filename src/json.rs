//! JSON collaborator: extraction specs and value extraction.
//!
//! An extraction spec is a sequence of `.member` and `[index]` tokens, the
//! first member written without its leading dot: `x`, `x.y`, `[0]`,
//! `x[3].y`. A syntactically invalid spec is `Malformed`; a valid spec that
//! does not match the document is `NotFound`.

use crate::error::{HubError, Result};
use crate::types::JsonKind;
use serde_json::Value;

/// One step of an extraction spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Member(String),
    Index(usize),
}

/// Parse an extraction spec into tokens.
pub fn parse_spec(spec: &str) -> Result<Vec<PathToken>> {
    if spec.is_empty() {
        return Err(HubError::Malformed("empty extraction spec".to_string()));
    }

    let bytes = spec.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'[' => {
                let close = spec[pos..]
                    .find(']')
                    .map(|i| pos + i)
                    .ok_or_else(|| malformed(spec, "unterminated '['"))?;
                let digits = &spec[pos + 1..close];
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed(spec, "array index must be a decimal number"));
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| malformed(spec, "array index out of range"))?;
                tokens.push(PathToken::Index(index));
                pos = close + 1;
            }
            b'.' if pos == 0 => return Err(malformed(spec, "leading '.'")),
            b']' => return Err(malformed(spec, "unexpected ']'")),
            _ => {
                if bytes[pos] == b'.' {
                    pos += 1;
                } else if pos != 0 {
                    return Err(malformed(spec, "member name must follow '.'"));
                }
                let end = spec[pos..]
                    .find(['.', '[', ']'])
                    .map(|i| pos + i)
                    .unwrap_or(bytes.len());
                if end == pos {
                    return Err(malformed(spec, "empty member name"));
                }
                tokens.push(PathToken::Member(spec[pos..end].to_string()));
                pos = end;
            }
        }
    }

    Ok(tokens)
}

/// Check an extraction spec's syntax without a document.
pub fn validate_spec(spec: &str) -> Result<()> {
    parse_spec(spec).map(|_| ())
}

/// True if `doc` is a well-formed JSON document.
pub fn is_valid(doc: &str) -> bool {
    serde_json::from_str::<Value>(doc).is_ok()
}

/// Extract the value addressed by `spec` from `doc`.
///
/// Strings come back unquoted; every other kind comes back as JSON text.
pub fn extract(doc: &str, spec: &str) -> Result<(String, JsonKind)> {
    let tokens = parse_spec(spec)?;
    let root: Value = serde_json::from_str(doc)?;

    let mut current = &root;
    for token in &tokens {
        let next = match token {
            PathToken::Member(name) => current.as_object().and_then(|o| o.get(name)),
            PathToken::Index(i) => current.as_array().and_then(|a| a.get(*i)),
        };
        current = next.ok_or_else(|| {
            HubError::NotFound(format!("'{}' does not match the document", spec))
        })?;
    }

    let kind = kind_of(current);
    let text = match current {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Ok((text, kind))
}

/// The kind of a parsed JSON value.
pub fn kind_of(value: &Value) -> JsonKind {
    match value {
        Value::Null => JsonKind::Null,
        Value::Bool(_) => JsonKind::Boolean,
        Value::Number(_) => JsonKind::Number,
        Value::String(_) => JsonKind::String,
        Value::Array(_) => JsonKind::Array,
        Value::Object(_) => JsonKind::Object,
    }
}

fn malformed(spec: &str, why: &str) -> HubError {
    HubError::Malformed(format!("extraction spec '{}': {}", spec, why))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spec() {
        assert_eq!(parse_spec("x").unwrap(), vec![PathToken::Member("x".into())]);
        assert_eq!(
            parse_spec("x[3].y").unwrap(),
            vec![
                PathToken::Member("x".into()),
                PathToken::Index(3),
                PathToken::Member("y".into())
            ]
        );
        assert_eq!(parse_spec("[0]").unwrap(), vec![PathToken::Index(0)]);
        assert_eq!(
            parse_spec("[0].a").unwrap(),
            vec![PathToken::Index(0), PathToken::Member("a".into())]
        );
    }

    #[test]
    fn test_parse_spec_malformed() {
        for bad in ["", ".x", "x.", "x..y", "x[", "x[]", "x[a]", "x]", "[0]y", "x[-1]"] {
            let err = parse_spec(bad).unwrap_err();
            assert!(matches!(err, HubError::Malformed(_)), "{} should be malformed", bad);
        }
    }

    #[test]
    fn test_extract() {
        let doc = r#"{"x": [1, 2, {"y": "hello"}], "b": true, "n": null, "o": {"k": 1}}"#;
        assert_eq!(
            extract(doc, "x[2].y").unwrap(),
            ("hello".to_string(), JsonKind::String)
        );
        assert_eq!(extract(doc, "x[1]").unwrap(), ("2".to_string(), JsonKind::Number));
        assert_eq!(extract(doc, "b").unwrap(), ("true".to_string(), JsonKind::Boolean));
        assert_eq!(extract(doc, "n").unwrap(), ("null".to_string(), JsonKind::Null));
        assert_eq!(
            extract(doc, "o").unwrap(),
            ("{\"k\":1}".to_string(), JsonKind::Object)
        );
    }

    #[test]
    fn test_extract_numbers_exactly() {
        for expected in [-259344.67490192762_f64, 0.1, 2.5e-8, 123456789.98765433] {
            let doc = format!("{{\"a\":{}}}", expected);
            let (text, kind) = extract(&doc, "a").unwrap();
            assert_eq!(kind, JsonKind::Number);
            assert_eq!(text.parse::<f64>().unwrap(), expected, "from {}", doc);
        }
        let (text, _) = extract(r#"{"a":-259344.67490192762}"#, "a").unwrap();
        assert_eq!(text.parse::<f64>().unwrap(), -259344.67490192762);
    }

    #[test]
    fn test_extract_not_found_vs_malformed() {
        let doc = r#"{"x": [1]}"#;
        assert!(extract(doc, "x[5]").unwrap_err().is_not_found());
        assert!(extract(doc, "y").unwrap_err().is_not_found());
        assert!(matches!(extract(doc, "x[").unwrap_err(), HubError::Malformed(_)));
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid("{\"a\": 1}"));
        assert!(is_valid("12"));
        assert!(!is_valid("{a: 1}"));
    }
}
