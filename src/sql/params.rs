//! Convert serde_json::Value to bind parameters.
//!
//! Every value travels as text and is cast to the column type in the statement
//! (`$n::<type>`), so PostgreSQL does the type conversion on its side.

use serde_json::{Map, Value};

/// Column name to equality value. Empty means "no constraint".
pub type Filter = Map<String, Value>;

/// Column name to scalar value for create/update payloads.
pub type RowData = Map<String, Value>;

/// Text form of a JSON value for binding; `None` binds SQL NULL.
pub fn bind_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(v.to_string()),
    }
}

/// Build a filter or row from `(column, value)` pairs.
pub fn columns<I, K>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_bind_as_text() {
        assert_eq!(bind_text(&json!(42)), Some("42".into()));
        assert_eq!(bind_text(&json!(1.5)), Some("1.5".into()));
        assert_eq!(bind_text(&json!(true)), Some("true".into()));
        assert_eq!(bind_text(&json!("o'neil")), Some("o'neil".into()));
        assert_eq!(bind_text(&Value::Null), None);
        assert_eq!(bind_text(&json!({"a": 1})), Some("{\"a\":1}".into()));
    }
}
