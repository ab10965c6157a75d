//! Table metadata read from the catalog, used to validate columns and cast parameters.

use crate::error::StoreError;
use crate::sql::TableName;

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// `format_type` output, e.g. "integer", "timestamp with time zone", "character varying(255)".
    pub pg_type: String,
}

#[derive(Clone, Debug)]
pub struct TableInfo {
    pub table: TableName,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn new(table: TableName, columns: Vec<ColumnInfo>) -> Self {
        TableInfo { table, columns }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub(crate) fn require(&self, name: &str) -> Result<&ColumnInfo, StoreError> {
        self.column(name).ok_or_else(|| StoreError::UnknownColumn {
            table: self.table.to_string(),
            column: name.to_string(),
        })
    }
}

/// Catalog lookup for the columns of one table. `$1` is the schema (NULL for the search path), `$2` the table.
pub const DESCRIBE_TABLE_SQL: &str = r#"
SELECT a.attname::text AS name, format_type(a.atttypid, a.atttypmod) AS pg_type
FROM pg_attribute a
JOIN pg_class c ON c.oid = a.attrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = COALESCE($1, current_schema())
  AND c.relname = $2
  AND c.relkind IN ('r', 'p', 'v', 'm', 'f')
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;
