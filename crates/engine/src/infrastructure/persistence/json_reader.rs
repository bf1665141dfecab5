//! Tolerant JSON reading.
//!
//! Location files may carry a byte-order mark or trailing garbage left by a
//! crashed partial write or a hand edit. Only the first complete top-level
//! object or array is parsed.

use std::path::Path;

use serde_json::Value;

use super::error::PersistenceError;

const BOM: char = '\u{feff}';

/// Slice of `text` holding the first complete JSON value.
///
/// For objects and arrays this stops at the matching close bracket, ignoring
/// brackets inside strings. Other inputs are returned trimmed.
pub fn first_value(text: &str) -> &str {
    let text = text.trim_start_matches(BOM).trim_start();
    if !text.starts_with(['{', '[']) {
        return text.trim_end();
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[..=idx];
                }
            }
            _ => {}
        }
    }
    text
}

pub fn parse_tolerant(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(first_value(text))
}

pub async fn read_json(path: &Path) -> Result<Value, PersistenceError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(parse_tolerant(&text)?)
}

pub fn read_json_sync(path: &Path) -> Result<Value, PersistenceError> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_tolerant(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_bom_and_trailing_garbage() {
        let text = "\u{feff}{\"a\": 1}\n}}garbage";
        assert_eq!(parse_tolerant(text).expect("parses"), json!({"a": 1}));
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let text = r#"{"name": "odd } name", "esc": "quote \" ] here"} trailing"#;
        let value = parse_tolerant(text).expect("parses");
        assert_eq!(value["name"], "odd } name");
        assert_eq!(value["esc"], "quote \" ] here");
    }

    #[test]
    fn arrays_are_supported() {
        assert_eq!(parse_tolerant("[1, [2]] ]").expect("parses"), json!([1, [2]]));
    }

    #[test]
    fn truncated_documents_still_fail() {
        assert!(parse_tolerant(r#"{"a": [1, 2"#).is_err());
    }
}
