//! Tolerant extraction from raw provider payloads. Missing or oddly-typed
//! fields degrade to defaults; normalization never raises on shape.

use chrono::NaiveDateTime;
use serde_json::Value;

/// Render any scalar as text. Objects/arrays and null collapse to "".
pub fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

pub fn string_at(value: &Value, path: &[&str]) -> String {
    at(value, path).map(text).unwrap_or_default()
}

pub fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    at(value, path).and_then(Value::as_str)
}

/// Numbers may arrive as JSON numbers or numeric strings.
pub fn f64_at(value: &Value, path: &[&str]) -> Option<f64> {
    let field = at(value, path)?;
    field
        .as_f64()
        .or_else(|| field.as_str().and_then(|s| s.trim().parse().ok()))
}

pub fn i64_at(value: &Value, path: &[&str]) -> Option<i64> {
    let field = at(value, path)?;
    field
        .as_i64()
        .or_else(|| field.as_str().and_then(|s| s.trim().parse().ok()))
}

pub fn bool_at(value: &Value, path: &[&str]) -> bool {
    at(value, path).and_then(Value::as_bool).unwrap_or(false)
}

pub fn array_at<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    at(value, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Minor-currency-unit amount to a major-unit decimal, rounded to cents.
pub fn minor_to_major(amount: f64, denominator: f64) -> f64 {
    let denominator = if denominator > 0.0 { denominator } else { 100.0 };
    (amount / denominator * 100.0).round() / 100.0
}

/// Parse a provider timestamp and strip the offset, keeping wall-clock time.
/// Anything unparsable is dropped rather than failing the row.
pub fn parse_naive_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_local());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

pub fn timestamp_at(value: &Value, path: &[&str]) -> Option<NaiveDateTime> {
    str_at(value, path).and_then(parse_naive_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minor_units_normalize_to_decimal() {
        assert_eq!(minor_to_major(1050.0, 100.0), 10.50);
        assert_eq!(minor_to_major(999.0, 100.0), 9.99);
        assert_eq!(minor_to_major(1050.0, 0.0), 10.50);
        assert_eq!(minor_to_major(12345.0, 1000.0), 12.35);
    }

    #[test]
    fn nested_extraction_defaults_on_missing_fields() {
        let payload = json!({"a": {"b": {"amount": "12.5", "count": 3, "flag": true}}});
        assert_eq!(f64_at(&payload, &["a", "b", "amount"]), Some(12.5));
        assert_eq!(i64_at(&payload, &["a", "b", "count"]), Some(3));
        assert!(bool_at(&payload, &["a", "b", "flag"]));
        assert_eq!(f64_at(&payload, &["a", "missing"]), None);
        assert_eq!(string_at(&payload, &["a", "missing"]), "");
    }

    #[test]
    fn scalars_render_as_text() {
        assert_eq!(text(&json!("abc")), "abc");
        assert_eq!(text(&json!(42)), "42");
        assert_eq!(text(&json!(null)), "");
        assert_eq!(text(&json!([1, 2])), "");
    }

    #[test]
    fn timestamps_strip_offset_keeping_wall_time() {
        let parsed = parse_naive_timestamp("2025-03-04T10:20:30.000-03:00").unwrap();
        assert_eq!(parsed.to_string(), "2025-03-04 10:20:30");
        let zulu = parse_naive_timestamp("2025-03-04T10:20:30Z").unwrap();
        assert_eq!(zulu.to_string(), "2025-03-04 10:20:30");
        assert!(parse_naive_timestamp("ontem").is_none());
        assert!(parse_naive_timestamp("").is_none());
    }
}
