//! Identifier checks and quoting. Table and column names never come from values.

use crate::error::StoreError;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("static regex"))
}

pub fn is_identifier(s: &str) -> bool {
    identifier_re().is_match(s)
}

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// A table reference, optionally schema-qualified (`schema.table`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let raw = raw.trim();
        let (schema, name) = match raw.split_once('.') {
            Some((s, n)) => (Some(s), n),
            None => (None, raw),
        };
        if !is_identifier(name) || schema.is_some_and(|s| !is_identifier(s)) {
            return Err(StoreError::InvalidIdentifier(raw.to_string()));
        }
        Ok(TableName {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        })
    }

    /// Qualify an unqualified name with `schema`. Explicit schemas are kept.
    pub fn or_schema(mut self, schema: &str) -> Self {
        if self.schema.is_none() {
            self.schema = Some(schema.to_string());
        }
        self
    }

    /// Quoted, possibly qualified name for use in statements.
    pub fn sql(&self) -> String {
        match &self.schema {
            Some(s) => format!("{}.{}", quoted(s), quoted(&self.name)),
            None => quoted(&self.name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(s) => write!(f, "{}.{}", s, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_qualified_names() {
        let t = TableName::parse("users").unwrap();
        assert_eq!(t.sql(), "\"users\"");
        let t = TableName::parse("app.users").unwrap();
        assert_eq!(t.schema.as_deref(), Some("app"));
        assert_eq!(t.sql(), "\"app\".\"users\"");
        assert_eq!(t.to_string(), "app.users");
    }

    #[test]
    fn default_schema_only_fills_unqualified_names() {
        let t = TableName::parse("users").unwrap().or_schema("app");
        assert_eq!(t.sql(), "\"app\".\"users\"");
        let t = TableName::parse("audit.users").unwrap().or_schema("app");
        assert_eq!(t.to_string(), "audit.users");
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "1users", "users; DROP TABLE x", "a.b.c", "us\"ers", "users--", ".users"] {
            assert!(TableName::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
