//! `${VAR}` and `${VAR:default}` placeholders in string values.

use crate::error::ReportError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::([^}]*))?\}").expect("env pattern is valid")
    })
}

/// Substitute placeholders in every string of `value`, recursively.
///
/// `lookup` resolves variable names, normally `std::env::var`. A string that
/// is exactly one placeholder is re-typed when the substituted text is a
/// number or boolean, so `timeout = "${TIMEOUT:5}"` stays numeric.
pub fn substitute_env<F>(value: &mut Value, lookup: &F) -> Result<(), ReportError>
where
    F: Fn(&str) -> Option<String>,
{
    substitute_at(value, lookup, "")
}

fn substitute_at<F>(value: &mut Value, lookup: &F, path: &str) -> Result<(), ReportError>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(text) => {
            if let Some(replacement) = substitute_str(text, lookup, path)? {
                *value = replacement;
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                substitute_at(item, lookup, &format!("{}[{}]", path, index))?;
            }
        }
        Value::Object(map) => {
            for (key, item) in map.iter_mut() {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                substitute_at(item, lookup, &child)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn substitute_str<F>(text: &str, lookup: &F, path: &str) -> Result<Option<Value>, ReportError>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = placeholder_pattern();
    if !pattern.is_match(text) {
        return Ok(None);
    }

    let mut output = String::with_capacity(text.len());
    let mut last = 0;
    let mut placeholders = 0;
    for captures in pattern.captures_iter(text) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let resolved = match (lookup(name.as_str()), captures.get(2)) {
            (Some(v), _) => v,
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => {
                return Err(ReportError::Config(format!(
                    "Environment variable '{}' is not set (referenced at '{}')",
                    name.as_str(),
                    path
                )))
            }
        };
        output.push_str(&text[last..whole.start()]);
        output.push_str(&resolved);
        last = whole.end();
        placeholders += 1;
    }
    output.push_str(&text[last..]);

    let whole_value = placeholders == 1 && pattern.find(text).map(|m| m.as_str()) == Some(text);
    if whole_value {
        if let Ok(typed @ (Value::Number(_) | Value::Bool(_))) = serde_json::from_str::<Value>(&output) {
            return Ok(Some(typed));
        }
    }
    Ok(Some(Value::String(output)))
}
