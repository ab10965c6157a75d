//! CrudStore: generic create/read/update/delete/count over named tables, plus database bootstrap.

use crate::error::{AppError, ConfigError, StoreError};
use crate::sql::{self, ColumnInfo, Filter, QueryBuf, RowData, Scope, TableInfo, TableName, DESCRIBE_TABLE_SQL};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Column that `create` reports as the new row's identifier.
pub const ID_COLUMN: &str = "id";

/// Request-scoped store. Connections are taken from the pool per statement and
/// returned when the statement finishes, on error paths too.
pub struct CrudStore {
    pool: PgPool,
    /// Schema for table names given without one.
    schema: String,
    /// Table metadata, read once per table for the lifetime of this store.
    tables: Mutex<HashMap<TableName, Arc<TableInfo>>>,
}

impl CrudStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        CrudStore {
            pool,
            schema: schema.into(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// `table` parsed and qualified with this store's schema when it names none.
    pub fn table_name(&self, table: &str) -> Result<TableName, StoreError> {
        Ok(TableName::parse(table)?.or_schema(&self.schema))
    }

    /// Column metadata for a table. Fails on malformed names and on tables that do not exist.
    pub async fn describe(&self, table: &str) -> Result<Arc<TableInfo>, AppError> {
        let name = self.table_name(table)?;
        if let Some(info) = self.cached(&name) {
            return Ok(info);
        }
        tracing::debug!(table = %name, "describe");
        let rows: Vec<(String, String)> = sqlx::query_as(DESCRIBE_TABLE_SQL)
            .bind(name.schema.as_deref())
            .bind(&name.name)
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Err(StoreError::UnknownTable(name.to_string()).into());
        }
        let columns = rows
            .into_iter()
            .map(|(name, pg_type)| ColumnInfo { name, pg_type })
            .collect();
        let info = Arc::new(TableInfo::new(name.clone(), columns));
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, Arc::clone(&info));
        Ok(info)
    }

    fn cached(&self, name: &TableName) -> Option<Arc<TableInfo>> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Number of rows matching the filter; empty filter counts the whole table.
    pub async fn count(&self, table: &str, filter: &Filter) -> Result<i64, AppError> {
        let info = self.describe(table).await?;
        let q = sql::count(&info, filter)?;
        let row = Self::bound(&q).fetch_one(&self.pool).await?;
        use sqlx::Row;
        Ok(row.try_get::<i64, _>("count")?)
    }

    /// Insert one row. Returns the new row's `id`, or the whole row when the table has no `id` column.
    pub async fn create(&self, table: &str, data: &RowData) -> Result<Value, AppError> {
        let info = self.describe(table).await?;
        let q = sql::insert(&info, data)?;
        let row = Self::bound(&q).fetch_one(&self.pool).await?;
        let created = json_row(&row)?;
        Ok(match created.get(ID_COLUMN) {
            Some(id) => id.clone(),
            None => created,
        })
    }

    /// First row matching the filter, if any. Never more than one row.
    pub async fn read(&self, table: &str, filter: &Filter) -> Result<Option<Value>, AppError> {
        let info = self.describe(table).await?;
        let q = sql::select(&info, filter, Some(1))?;
        let row = Self::bound(&q).fetch_optional(&self.pool).await?;
        row.as_ref().map(json_row).transpose()
    }

    /// All rows matching the filter. No match is `Ok(vec![])`; backend failures are `Err`.
    pub async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, AppError> {
        let info = self.describe(table).await?;
        let q = sql::select(&info, filter, None)?;
        let rows = Self::bound(&q).fetch_all(&self.pool).await?;
        rows.iter().map(json_row).collect()
    }

    /// Update rows matching a non-empty filter. `Ok(true)` when at least one row changed.
    pub async fn update(&self, table: &str, data: &RowData, filter: &Filter) -> Result<bool, AppError> {
        self.update_scoped(table, data, Scope::Where(filter)).await
    }

    /// Update every row of the table.
    pub async fn update_all(&self, table: &str, data: &RowData) -> Result<bool, AppError> {
        self.update_scoped(table, data, Scope::AllRows).await
    }

    /// Delete rows matching a non-empty filter. `Ok(true)` when at least one row was removed.
    pub async fn delete(&self, table: &str, filter: &Filter) -> Result<bool, AppError> {
        self.delete_scoped(table, Scope::Where(filter)).await
    }

    /// Delete every row of the table.
    pub async fn delete_all(&self, table: &str) -> Result<bool, AppError> {
        self.delete_scoped(table, Scope::AllRows).await
    }

    async fn update_scoped(&self, table: &str, data: &RowData, scope: Scope<'_>) -> Result<bool, AppError> {
        scope.check("update", table)?;
        let info = self.describe(table).await?;
        let q = sql::update(&info, data, scope)?;
        let done = Self::bound(&q).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_scoped(&self, table: &str, scope: Scope<'_>) -> Result<bool, AppError> {
        scope.check("delete", table)?;
        let info = self.describe(table).await?;
        let q = sql::delete(&info, scope)?;
        let done = Self::bound(&q).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    /// Run one raw statement and return its rows. Nothing is escaped or checked:
    /// callers own injection safety on this path.
    pub async fn query(&self, raw: &str) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %raw, "raw query");
        let rows = sqlx::query(raw).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    fn bound(q: &QueryBuf) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        query
    }
}

/// Builder statements return a single `row` column holding `row_to_json` output.
fn json_row(row: &PgRow) -> Result<Value, AppError> {
    use sqlx::Row;
    Ok(row.try_get::<Value, _>("row")?)
}

/// Decode an arbitrary row (raw queries) by column type name.
fn row_to_json(row: &PgRow) -> Value {
    use sqlx::{Column, Row, TypeInfo};
    let mut map = serde_json::Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i, col.type_info().name()));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, i: usize, type_name: &str) -> Value {
    use sqlx::Row;
    fn get<'r, T>(row: &'r PgRow, i: usize) -> Option<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        row.try_get::<Option<T>, _>(i).ok().flatten()
    }
    let number = |f: Option<f64>| {
        f.and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    };
    match type_name {
        "BOOL" => get::<bool>(row, i).map(Value::Bool).unwrap_or(Value::Null),
        "INT2" => get::<i16>(row, i).map(|n| Value::Number(n.into())).unwrap_or(Value::Null),
        "INT4" => get::<i32>(row, i).map(|n| Value::Number(n.into())).unwrap_or(Value::Null),
        "INT8" => get::<i64>(row, i).map(|n| Value::Number(n.into())).unwrap_or(Value::Null),
        "FLOAT4" => number(get::<f32>(row, i).map(f64::from)),
        "FLOAT8" => number(get::<f64>(row, i)),
        "UUID" => get::<uuid::Uuid>(row, i)
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => get::<chrono::DateTime<chrono::Utc>>(row, i)
            .map(|d| Value::String(d.to_rfc3339()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => get::<chrono::NaiveDateTime>(row, i)
            .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        "DATE" => get::<chrono::NaiveDate>(row, i)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => get::<Value>(row, i).unwrap_or(Value::Null),
        _ => get::<String>(row, i).map(Value::String).unwrap_or(Value::Null),
    }
}

/// Cheap liveness probe for readiness checks.
pub async fn ping(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::Load(format!("invalid database url: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| ConfigError::Load("database url has no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_store() -> CrudStore {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost:1/never_connected")
            .unwrap();
        CrudStore::new(pool, "app")
    }

    #[test]
    fn database_name_is_split_from_url() {
        let (admin, name) = parse_db_name_from_url("postgres://u:p@host:5432/app?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@host:5432/postgres");
        assert_eq!(name, "app");
    }

    #[tokio::test]
    async fn empty_filter_delete_fails_before_touching_the_backend() {
        let store = lazy_store();
        let err = store.delete("users", &Filter::new()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidFilter(_)));
        let err = store
            .update("users", &sql::columns([("name", Value::from("x"))]), &Filter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn unqualified_tables_resolve_in_the_configured_schema() {
        let store = lazy_store();
        assert_eq!(store.schema(), "app");
        assert_eq!(store.table_name("users").unwrap().sql(), "\"app\".\"users\"");
        assert_eq!(store.table_name("public.users").unwrap().sql(), "\"public\".\"users\"");
    }

    #[tokio::test]
    async fn malformed_table_name_is_a_store_error() {
        let store = lazy_store();
        let err = store.count("users; drop table users", &Filter::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::InvalidIdentifier(_))));
    }
}
