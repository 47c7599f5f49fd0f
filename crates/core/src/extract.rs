//! Layered extraction of structured data from model output.
//!
//! Language models promise no structure, so every structured call site goes
//! through one shared recovery pipeline instead of hand-rolling its own
//! fallbacks:
//!
//! 1. strict JSON parse of the whole response;
//! 2. parse a delimited block: a ``` fence (json-tagged or bare), or the
//!    outermost `{...}` slice: after stripping trailing commas;
//! 3. scan the raw text for the caller's known top-level keys and overlay
//!    whatever scalar fields are recoverable onto the placeholder;
//! 4. fall back to the caller-supplied placeholder object.
//!
//! The result is tagged with the route that produced it so callers can log
//! degraded parses. Only a malformed placeholder is an error.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ExtractError;

/// Which recovery layer produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractRoute {
    /// The whole response was valid JSON.
    Strict,
    /// A fenced or brace-delimited block parsed after cleanup.
    Fenced,
    /// Individual fields were scavenged from the raw text.
    FieldScan,
    /// Nothing was recoverable; the caller's placeholder was used.
    Placeholder,
}

impl ExtractRoute {
    /// True for any route below a clean parse.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, ExtractRoute::Strict | ExtractRoute::Fenced)
    }
}

/// An extracted value tagged with its recovery route.
#[derive(Debug, Clone)]
pub struct Extracted<T> {
    pub value: T,
    pub route: ExtractRoute,
}

/// Run the full recovery pipeline over `text`.
///
/// `known_keys` are the top-level keys the field scanner looks for;
/// `placeholder` is a complete JSON object that deserializes into `T` and
/// seeds the scan overlay. Returns `ExtractError::Irrecoverable` only when
/// the placeholder itself fails to deserialize.
pub fn extract_object<T: DeserializeOwned>(
    text: &str,
    known_keys: &[&str],
    placeholder: Value,
) -> std::result::Result<Extracted<T>, ExtractError> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(Extracted { value, route: ExtractRoute::Strict });
    }

    if let Some(block) = delimited_block(trimmed) {
        let cleaned = strip_trailing_commas(&block);
        if let Ok(value) = serde_json::from_str::<T>(&cleaned) {
            return Ok(Extracted { value, route: ExtractRoute::Fenced });
        }
    }

    if let Value::Object(base) = placeholder.clone() {
        let mut map = base;
        let mut recovered = false;
        for key in known_keys {
            if let Some(value) = scan_key(trimmed, key) {
                map.insert((*key).to_string(), value);
                recovered = true;
            }
        }
        if recovered {
            if let Ok(value) = serde_json::from_value::<T>(Value::Object(map)) {
                return Ok(Extracted { value, route: ExtractRoute::FieldScan });
            }
        }
    }

    let value = serde_json::from_value::<T>(placeholder).map_err(|e| {
        ExtractError::Irrecoverable(format!("placeholder failed to deserialize: {e}"))
    })?;
    Ok(Extracted { value, route: ExtractRoute::Placeholder })
}

/// The best candidate JSON block inside the text: a ``` fence if present,
/// otherwise the outermost `{...}` slice.
fn delimited_block(text: &str) -> Option<String> {
    if let Some(fenced) = fenced_block(text) {
        return Some(fenced);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| text[start..=end].to_string())
}

fn fenced_block(text: &str) -> Option<String> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    let end = after.find("```").unwrap_or(after.len());
    let mut block = after[..end].trim();
    // Drop a leading language tag.
    if let Some(rest) = block.strip_prefix("json") {
        if rest.starts_with(|c: char| c.is_whitespace() || c == '{' || c == '[') {
            block = rest.trim_start();
        }
    }
    (!block.is_empty()).then(|| block.to_string())
}

/// Remove commas that directly precede a closing brace or bracket, outside
/// string literals.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Find `"key": <scalar>` anywhere in the text and return the scalar.
fn scan_key(text: &str, key: &str) -> Option<Value> {
    let needle = format!("\"{key}\"");
    let mut search = 0;
    while let Some(pos) = text[search..].find(&needle) {
        let abs = search + pos;
        let rest = text[abs + needle.len()..].trim_start();
        if let Some(rest) = rest.strip_prefix(':') {
            if let Some(value) = scan_scalar(rest.trim_start()) {
                return Some(value);
            }
        }
        search = abs + needle.len();
    }
    None
}

/// Parse one leading scalar: a quoted string (escapes honored), a number,
/// a boolean, or null. Arrays and objects are not scavenged.
fn scan_scalar(text: &str) -> Option<Value> {
    let mut chars = text.char_indices();
    let (_, first) = chars.next()?;
    if first == '"' {
        let mut escaped = false;
        for (i, c) in chars {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                return serde_json::from_str::<String>(&text[..=i]).ok().map(Value::String);
            }
        }
        return None;
    }
    if first.is_ascii_digit() || first == '-' {
        let end = text
            .find(|c: char| !(c.is_ascii_digit() || "+-.eE".contains(c)))
            .unwrap_or(text.len());
        return serde_json::from_str::<serde_json::Number>(&text[..end])
            .ok()
            .map(Value::Number);
    }
    if let Some(rest) = text.strip_prefix("true") {
        if rest.starts_with(|c: char| !c.is_ascii_alphanumeric()) || rest.is_empty() {
            return Some(Value::Bool(true));
        }
    }
    if let Some(rest) = text.strip_prefix("false") {
        if rest.starts_with(|c: char| !c.is_ascii_alphanumeric()) || rest.is_empty() {
            return Some(Value::Bool(false));
        }
    }
    if let Some(rest) = text.strip_prefix("null") {
        if rest.starts_with(|c: char| !c.is_ascii_alphanumeric()) || rest.is_empty() {
            return Some(Value::Null);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Stage1 {
        title: String,
        content: String,
    }

    fn placeholder() -> Value {
        json!({ "title": "Untitled", "content": "" })
    }

    #[test]
    fn strict_json_takes_the_fast_path() {
        let out = extract_object::<Stage1>(
            r#"{"title": "The Door", "content": "It opened."}"#,
            &["title", "content"],
            placeholder(),
        )
        .unwrap();
        assert_eq!(out.route, ExtractRoute::Strict);
        assert_eq!(out.value.title, "The Door");
    }

    #[test]
    fn fenced_block_with_language_tag() {
        let text = "Here you go:\n```json\n{\"title\": \"A\", \"content\": \"B\"}\n```\nHope that helps!";
        let out = extract_object::<Stage1>(text, &["title", "content"], placeholder()).unwrap();
        assert_eq!(out.route, ExtractRoute::Fenced);
        assert_eq!(out.value.content, "B");
    }

    #[test]
    fn bare_fence_and_trailing_comma() {
        let text = "```\n{\"title\": \"A\", \"content\": \"B\",}\n```";
        let out = extract_object::<Stage1>(text, &["title", "content"], placeholder()).unwrap();
        assert_eq!(out.route, ExtractRoute::Fenced);
        assert_eq!(out.value.title, "A");
    }

    #[test]
    fn prose_wrapped_braces_parse_as_delimited() {
        let text = "Sure! {\"title\": \"A\", \"content\": \"B\"} and enjoy.";
        let out = extract_object::<Stage1>(text, &["title", "content"], placeholder()).unwrap();
        assert_eq!(out.route, ExtractRoute::Fenced);
    }

    #[test]
    fn field_scan_recovers_scalars_with_escapes() {
        let text = r#"The title is "title": "She said \"run\"" and "content": "Down the hall." but the braces never closed"#;
        let out = extract_object::<Stage1>(text, &["title", "content"], placeholder()).unwrap();
        assert_eq!(out.route, ExtractRoute::FieldScan);
        assert_eq!(out.value.title, r#"She said "run""#);
        assert_eq!(out.value.content, "Down the hall.");
    }

    #[test]
    fn field_scan_fills_missing_fields_from_placeholder() {
        let text = r#"no json here, only "content": "fragment""#;
        let out = extract_object::<Stage1>(text, &["title", "content"], placeholder()).unwrap();
        assert_eq!(out.route, ExtractRoute::FieldScan);
        assert_eq!(out.value.title, "Untitled");
        assert_eq!(out.value.content, "fragment");
    }

    #[test]
    fn placeholder_route_when_nothing_recoverable() {
        let out =
            extract_object::<Stage1>("total nonsense", &["title", "content"], placeholder())
                .unwrap();
        assert_eq!(out.route, ExtractRoute::Placeholder);
        assert_eq!(out.value.title, "Untitled");
    }

    #[test]
    fn bad_placeholder_is_irrecoverable() {
        let err = extract_object::<Stage1>("nonsense", &[], json!({ "wrong": true }))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Irrecoverable(_)));
    }

    #[test]
    fn numbers_and_booleans_scan() {
        #[derive(Debug, Deserialize)]
        struct Flags {
            valid: bool,
            score: f64,
        }
        let text = r#"result: "valid": true, "score": -3.5e1 end"#;
        let out = extract_object::<Flags>(
            text,
            &["valid", "score"],
            json!({ "valid": false, "score": 0.0 }),
        )
        .unwrap();
        assert_eq!(out.route, ExtractRoute::FieldScan);
        assert!(out.value.valid);
        assert!((out.value.score + 35.0).abs() < 1e-9);
    }

    #[test]
    fn trailing_comma_inside_string_survives() {
        let cleaned = strip_trailing_commas(r#"{"a": "x,}", "b": 1,}"#);
        assert_eq!(cleaned, r#"{"a": "x,}", "b": 1}"#);
    }
}
