//! Parsing of backend text into an [`AnalysisResult`].
//!
//! Models usually wrap the payload in a ```` ```json ```` fence, sometimes
//! surround it with prose, and occasionally answer with a bare object. All
//! three are accepted; anything that does not yield an object with `issues`,
//! `suggestions` and `metrics` is a [`crate::Error::MalformedResponse`].

use crate::types::AnalysisResult;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n(.*?)```").expect("Invalid fence regex")
});

const REQUIRED_FIELDS: [&str; 3] = ["issues", "suggestions", "metrics"];

pub fn parse_analysis(text: &str) -> Result<AnalysisResult> {
    let payload = extract_payload(text)
        .ok_or_else(|| Error::malformed("response contains no JSON object"))?;
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::malformed(format!("response JSON is invalid: {}", e)))?;
    let Value::Object(mut obj) = value else {
        return Err(Error::malformed("response JSON is not an object"));
    };

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !obj.contains_key(**f)) {
        return Err(Error::malformed(format!("response is missing `{}`", missing)));
    }

    let issues = take_array(&mut obj, "issues")?;
    let suggestions = take_array(&mut obj, "suggestions")?;
    let metrics = match obj.remove("metrics") {
        Some(Value::Object(m)) => m,
        Some(Value::Null) => Map::new(),
        _ => return Err(Error::malformed("`metrics` must be an object")),
    };

    Ok(AnalysisResult {
        issues,
        suggestions,
        metrics,
    })
}

fn take_array(obj: &mut Map<String, Value>, field: &str) -> Result<Vec<Value>> {
    match obj.remove(field) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) => Ok(Vec::new()),
        _ => Err(Error::malformed(format!("`{}` must be an array", field))),
    }
}

/// Fenced block whose body is an object, else the first balanced object.
fn extract_payload(text: &str) -> Option<&str> {
    for cap in FENCED_BLOCK.captures_iter(text) {
        if let Some(body) = cap.get(1) {
            let body = body.as_str().trim();
            if body.starts_with('{') {
                return Some(body);
            }
        }
    }
    first_balanced_object(text)
}

fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::StandardErrorCode;
    use serde_json::json;

    #[test]
    fn test_parses_fenced_payload_with_prose() {
        let text = "Here is the review:\n```json\n{\"issues\": [{\"line\": 3}], \"suggestions\": [], \"metrics\": {\"complexity\": 2}}\n```\nHope this helps.";
        let result = parse_analysis(text).unwrap();
        assert_eq!(result.issues, vec![json!({"line": 3})]);
        assert!(result.suggestions.is_empty());
        assert_eq!(result.metrics.get("complexity"), Some(&json!(2)));
    }

    #[test]
    fn test_parses_bare_object() {
        let text = r#"{"issues": [], "suggestions": ["use const"], "metrics": {}}"#;
        let result = parse_analysis(text).unwrap();
        assert_eq!(result.suggestions, vec![json!("use const")]);
    }

    #[test]
    fn test_braces_inside_strings_do_not_end_object() {
        let text = r#"Result: {"issues": [{"msg": "unbalanced } in \"str\""}], "suggestions": [], "metrics": {}} trailing"#;
        let result = parse_analysis(text).unwrap();
        assert_eq!(result.issues.len(), 1);
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let err = parse_analysis(r#"{"issues": [], "metrics": {}}"#).unwrap_err();
        assert_eq!(err.standard_code(), StandardErrorCode::MalformedResponse);
        assert!(err.to_string().contains("suggestions"));
    }

    #[test]
    fn test_wrong_field_types_are_malformed() {
        assert!(parse_analysis(r#"{"issues": {}, "suggestions": [], "metrics": {}}"#).is_err());
        assert!(parse_analysis(r#"{"issues": [], "suggestions": [], "metrics": []}"#).is_err());
    }

    #[test]
    fn test_no_json_is_malformed() {
        let err = parse_analysis("I could not analyze this code.").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
        assert!(!err.is_retryable());
    }
}
