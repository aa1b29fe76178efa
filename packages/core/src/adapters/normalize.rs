//! Value helpers shared by the provider adapters.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Number, Value};

/// Convert numeric strings to JSON numbers; everything else passes through.
pub fn coerce_number(value: &Value) -> Value {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

/// `"1. open"` → `"open"`, `"5. adjusted close"` → `"adjusted_close"`.
pub fn clean_key(key: &str) -> String {
    static ORDINAL: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();

    let ordinal = ORDINAL.get_or_init(|| {
        Regex::new(r"^\d+\.\s*").expect("ordinal pattern should be valid")
    });
    let whitespace = WHITESPACE
        .get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern should be valid"));

    let stripped = ordinal.replace(key, "");
    whitespace.replace_all(&stripped, "_").into_owned()
}
