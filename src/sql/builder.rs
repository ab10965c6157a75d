//! Builds parameterized COUNT, SELECT, INSERT, UPDATE, DELETE from table metadata.

use crate::error::AppError;
use crate::sql::{bind_text, quoted, Filter, RowData, TableInfo};
use serde_json::Value;

/// Alias used when rows are returned as JSON via `row_to_json`.
const ROW_ALIAS: &str = "_r";

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: &Value) -> u32 {
        self.params.push(bind_text(v));
        self.params.len() as u32
    }

    /// Placeholder with cast to the column type.
    fn placeholder(&mut self, v: &Value, pg_type: &str) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, pg_type)
    }
}

/// Which rows a mutating statement may touch.
#[derive(Clone, Copy, Debug)]
pub enum Scope<'a> {
    /// Rows matching a non-empty filter.
    Where(&'a Filter),
    /// Every row. Must be asked for explicitly.
    AllRows,
}

impl Scope<'_> {
    /// An empty filter never widens into "all rows".
    pub fn check(&self, op: &str, table: &str) -> Result<(), AppError> {
        match self {
            Scope::Where(f) if f.is_empty() => Err(AppError::InvalidFilter(format!(
                "{} on {} needs a non-empty filter; use the all-rows variant to affect every row",
                op, table
            ))),
            _ => Ok(()),
        }
    }
}

fn where_clause(q: &mut QueryBuf, table: &TableInfo, filter: &Filter) -> Result<String, AppError> {
    if filter.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(filter.len());
    for (col, val) in filter {
        let c = table.require(col)?;
        if val.is_null() {
            parts.push(format!("{} IS NULL", quoted(col)));
        } else {
            let ph = q.placeholder(val, &c.pg_type);
            parts.push(format!("{} = {}", quoted(col), ph));
        }
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

/// SELECT COUNT(*) with optional equality filter.
pub fn count(table: &TableInfo, filter: &Filter) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let wc = where_clause(&mut q, table, filter)?;
    q.sql = format!("SELECT COUNT(*) AS \"count\" FROM {}{}", table.table.sql(), wc);
    Ok(q)
}

/// SELECT rows as JSON objects. No ORDER BY: order is whatever the backend returns.
pub fn select(table: &TableInfo, filter: &Filter, limit: Option<u32>) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let wc = where_clause(&mut q, table, filter)?;
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT row_to_json({alias}) AS \"row\" FROM {} AS {alias}{}{}",
        table.table.sql(),
        wc,
        limit_clause,
        alias = quoted(ROW_ALIAS)
    );
    Ok(q)
}

/// INSERT one row, returning it as JSON. An empty payload inserts defaults only.
pub fn insert(table: &TableInfo, data: &RowData) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());
    for (col, val) in data {
        let c = table.require(col)?;
        let ph = q.placeholder(val, &c.pg_type);
        cols.push(quoted(col));
        placeholders.push(ph);
    }
    let values = if cols.is_empty() {
        "DEFAULT VALUES".to_string()
    } else {
        format!("({}) VALUES ({})", cols.join(", "), placeholders.join(", "))
    };
    q.sql = format!(
        "INSERT INTO {} AS {alias} {} RETURNING row_to_json({alias}) AS \"row\"",
        table.table.sql(),
        values,
        alias = quoted(ROW_ALIAS)
    );
    Ok(q)
}

/// UPDATE matching rows: SET only the given columns, plus `updated_at = NOW()` when the table tracks it.
pub fn update(table: &TableInfo, data: &RowData, scope: Scope<'_>) -> Result<QueryBuf, AppError> {
    let table_name = table.table.to_string();
    scope.check("update", &table_name)?;
    if data.is_empty() {
        return Err(crate::error::StoreError::EmptyRowData(table_name).into());
    }
    let mut q = QueryBuf::new();
    let mut sets = Vec::with_capacity(data.len() + 1);
    for (col, val) in data {
        let c = table.require(col)?;
        let ph = q.placeholder(val, &c.pg_type);
        sets.push(format!("{} = {}", quoted(col), ph));
    }
    if table.has_column("updated_at") && !data.contains_key("updated_at") {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let wc = match scope {
        Scope::Where(filter) => where_clause(&mut q, table, filter)?,
        Scope::AllRows => String::new(),
    };
    q.sql = format!("UPDATE {} SET {}{}", table.table.sql(), sets.join(", "), wc);
    Ok(q)
}

/// DELETE matching rows.
pub fn delete(table: &TableInfo, scope: Scope<'_>) -> Result<QueryBuf, AppError> {
    scope.check("delete", &table.table.to_string())?;
    let mut q = QueryBuf::new();
    let wc = match scope {
        Scope::Where(filter) => where_clause(&mut q, table, filter)?,
        Scope::AllRows => String::new(),
    };
    q.sql = format!("DELETE FROM {}{}", table.table.sql(), wc);
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::sql::{columns, ColumnInfo, TableName};
    use serde_json::json;

    fn users() -> TableInfo {
        TableInfo::new(
            TableName::parse("users").unwrap(),
            vec![
                ColumnInfo { name: "id".into(), pg_type: "bigint".into() },
                ColumnInfo { name: "email".into(), pg_type: "text".into() },
                ColumnInfo { name: "active".into(), pg_type: "boolean".into() },
                ColumnInfo { name: "updated_at".into(), pg_type: "timestamp with time zone".into() },
            ],
        )
    }

    #[test]
    fn count_without_filter_counts_everything() {
        let q = count(&users(), &Filter::new()).unwrap();
        assert_eq!(q.sql, "SELECT COUNT(*) AS \"count\" FROM \"users\"");
        assert!(q.params.is_empty());
    }

    #[test]
    fn schema_qualified_tables_are_quoted_per_part() {
        let mut info = users();
        info.table = TableName::parse("users").unwrap().or_schema("app");
        let q = count(&info, &Filter::new()).unwrap();
        assert_eq!(q.sql, "SELECT COUNT(*) AS \"count\" FROM \"app\".\"users\"");
    }

    #[test]
    fn filter_values_are_bound_not_inlined() {
        let filter = columns([("email", json!("x' OR '1'='1"))]);
        let q = select(&users(), &filter, None).unwrap();
        assert_eq!(
            q.sql,
            "SELECT row_to_json(\"_r\") AS \"row\" FROM \"users\" AS \"_r\" WHERE \"email\" = $1::text"
        );
        assert_eq!(q.params, vec![Some("x' OR '1'='1".to_string())]);
    }

    #[test]
    fn read_limit_and_null_filter() {
        let filter = columns([("active", json!(true)), ("email", Value::Null)]);
        let q = select(&users(), &filter, Some(1)).unwrap();
        assert!(q.sql.ends_with("WHERE \"active\" = $1::boolean AND \"email\" IS NULL LIMIT 1"));
        assert_eq!(q.params, vec![Some("true".to_string())]);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let filter = columns([("nope", json!(1))]);
        let err = select(&users(), &filter, None).unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::UnknownColumn { .. })));
    }

    #[test]
    fn insert_casts_each_value() {
        let data = columns([("email", json!("a@b.c")), ("id", json!(7))]);
        let q = insert(&users(), &data).unwrap();
        assert_eq!(
            q.sql,
            "INSERT INTO \"users\" AS \"_r\" (\"email\", \"id\") VALUES ($1::text, $2::bigint) RETURNING row_to_json(\"_r\") AS \"row\""
        );
        assert_eq!(q.params, vec![Some("a@b.c".to_string()), Some("7".to_string())]);
    }

    #[test]
    fn insert_without_data_uses_defaults() {
        let q = insert(&users(), &RowData::new()).unwrap();
        assert!(q.sql.contains("DEFAULT VALUES"));
    }

    #[test]
    fn update_touches_updated_at_and_numbers_params_in_order() {
        let data = columns([("email", json!("new@b.c"))]);
        let filter = columns([("id", json!(3))]);
        let q = update(&users(), &data, Scope::Where(&filter)).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"users\" SET \"email\" = $1::text, \"updated_at\" = NOW() WHERE \"id\" = $2::bigint"
        );
        assert_eq!(q.params, vec![Some("new@b.c".to_string()), Some("3".to_string())]);
    }

    #[test]
    fn empty_filter_never_means_all_rows() {
        let err = delete(&users(), Scope::Where(&Filter::new())).unwrap_err();
        assert!(matches!(err, AppError::InvalidFilter(_)));
        let data = columns([("active", json!(false))]);
        let err = update(&users(), &data, Scope::Where(&Filter::new())).unwrap_err();
        assert!(matches!(err, AppError::InvalidFilter(_)));
    }

    #[test]
    fn all_rows_must_be_explicit() {
        let q = delete(&users(), Scope::AllRows).unwrap();
        assert_eq!(q.sql, "DELETE FROM \"users\"");
    }

    #[test]
    fn update_requires_data() {
        let filter = columns([("id", json!(1))]);
        let err = update(&users(), &RowData::new(), Scope::Where(&filter)).unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::EmptyRowData(_))));
    }
}
