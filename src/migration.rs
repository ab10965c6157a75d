//! Table lifecycle from JSON table specs: create, drop and truncate every table of the schema.
//!
//! Each `*.json` file under the tables directory holds one [`TableSpec`]. Files are applied
//! in file-name order, so prefix them (`01_users.json`) when foreign keys need an order.

use crate::error::{AppError, ConfigError, StoreError};
use crate::sql::{is_identifier, quoted};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Clone, Debug, Deserialize)]
pub struct TableSpec {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// SQL expression, inserted as written.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub unique: bool,
    /// Table whose `id` this column points at. Rows go with their parent.
    #[serde(default)]
    pub references: Option<String>,
}

fn default_nullable() -> bool {
    true
}

#[derive(Clone, Debug, Serialize)]
pub struct MigrationReport {
    pub action: &'static str,
    pub tables: Vec<String>,
}

fn type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_ ]*(\([0-9, ]+\))?(\[\])?$").expect("static regex"))
}

fn ident(s: &str) -> Result<String, AppError> {
    if is_identifier(s) {
        Ok(quoted(s))
    } else {
        Err(StoreError::InvalidIdentifier(s.to_string()).into())
    }
}

/// `CREATE TABLE IF NOT EXISTS` for one spec. `id`, `created_at` and `updated_at` are added
/// unless the table declares them.
pub fn create_table_sql(schema: &str, spec: &TableSpec) -> Result<String, AppError> {
    let schema = ident(schema)?;
    let declared: HashSet<&str> = spec.columns.iter().map(|c| c.name.as_str()).collect();
    let mut defs = Vec::new();

    if !declared.contains("id") {
        defs.push(format!("{} BIGSERIAL PRIMARY KEY", quoted("id")));
    }
    for c in &spec.columns {
        if !type_re().is_match(c.type_.trim()) {
            return Err(ConfigError::Validation(format!("{}.{}: invalid type {:?}", spec.name, c.name, c.type_)).into());
        }
        let mut def = format!("{} {}", ident(&c.name)?, c.type_.trim());
        if c.name == "id" {
            def.push_str(" PRIMARY KEY");
        } else if !c.nullable {
            def.push_str(" NOT NULL");
        }
        if c.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(d) = &c.default {
            def.push_str(" DEFAULT ");
            def.push_str(d);
        }
        if let Some(parent) = &c.references {
            def.push_str(&format!(
                " REFERENCES {}.{} ({}) ON DELETE CASCADE",
                schema,
                ident(parent)?,
                quoted("id")
            ));
        }
        defs.push(def);
    }
    for name in ["created_at", "updated_at"] {
        if !declared.contains(name) {
            defs.push(format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quoted(name)));
        }
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (\n  {}\n)",
        schema,
        ident(&spec.name)?,
        defs.join(",\n  ")
    ))
}

/// Read every `*.json` spec in `dir`, ordered by file name.
pub async fn load_specs(dir: &Path) -> Result<Vec<TableSpec>, AppError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", dir.display(), e)))?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
            files.push(path);
        }
    }
    files.sort();

    let mut specs = Vec::with_capacity(files.len());
    for path in files {
        let raw = tokio::fs::read(&path).await?;
        let spec: TableSpec = serde_json::from_slice(&raw)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        specs.push(spec);
    }
    Ok(specs)
}

const BASE_TABLES_SQL: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name";

pub struct Migration {
    pool: PgPool,
    schema: String,
    tables_dir: PathBuf,
}

impl Migration {
    pub fn new(pool: PgPool, schema: impl Into<String>, tables_dir: PathBuf) -> Self {
        Migration {
            pool,
            schema: schema.into(),
            tables_dir,
        }
    }

    /// Create the schema and every spec'd table that does not exist yet. One transaction.
    pub async fn migrate_all(&self) -> Result<MigrationReport, AppError> {
        let specs = load_specs(&self.tables_dir).await?;
        let statements = specs
            .iter()
            .map(|s| create_table_sql(&self.schema, s))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", ident(&self.schema)?))
            .execute(&mut *tx)
            .await?;
        for sql in &statements {
            tracing::debug!(sql = %sql, "migrate");
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        let tables: Vec<String> = specs.into_iter().map(|s| s.name).collect();
        tracing::info!(schema = %self.schema, ?tables, "migrated");
        Ok(MigrationReport {
            action: "migrate",
            tables,
        })
    }

    pub async fn drop_all(&self) -> Result<MigrationReport, AppError> {
        self.on_all_tables("drop", |list| format!("DROP TABLE IF EXISTS {} CASCADE", list))
            .await
    }

    /// Empty every table and reset identity sequences.
    pub async fn truncate_all(&self) -> Result<MigrationReport, AppError> {
        self.on_all_tables("truncate", |list| format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", list))
            .await
    }

    async fn base_tables(&self) -> Result<Vec<String>, AppError> {
        let tables: Vec<String> = sqlx::query_scalar(BASE_TABLES_SQL)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;
        Ok(tables)
    }

    async fn on_all_tables<F>(&self, action: &'static str, statement: F) -> Result<MigrationReport, AppError>
    where
        F: Fn(&str) -> String,
    {
        let schema = ident(&self.schema)?;
        let tables = self.base_tables().await?;
        if !tables.is_empty() {
            let list = tables
                .iter()
                .map(|t| format!("{}.{}", schema, quoted(t)))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = statement(&list);
            tracing::debug!(sql = %sql, action);
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        tracing::info!(schema = %self.schema, action, count = tables.len(), "tables processed");
        Ok(MigrationReport { action, tables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(raw: &str) -> TableSpec {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn adds_id_and_timestamps() {
        let sql = create_table_sql(
            "public",
            &spec(r#"{"name": "users", "columns": [
                {"name": "email", "type": "TEXT", "nullable": false, "unique": true},
                {"name": "age", "type": "INTEGER", "default": "0"}
            ]}"#),
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"public\".\"users\" (\n  \
             \"id\" BIGSERIAL PRIMARY KEY,\n  \
             \"email\" TEXT NOT NULL UNIQUE,\n  \
             \"age\" INTEGER DEFAULT 0,\n  \
             \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW(),\n  \
             \"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()\n)"
        );
    }

    #[test]
    fn declared_id_and_references() {
        let sql = create_table_sql(
            "app",
            &spec(r#"{"name": "sessions", "columns": [
                {"name": "id", "type": "UUID"},
                {"name": "user_id", "type": "BIGINT", "nullable": false, "references": "users"},
                {"name": "created_at", "type": "TIMESTAMPTZ"}
            ]}"#),
        )
        .unwrap();
        assert!(sql.contains("\"id\" UUID PRIMARY KEY"));
        assert!(!sql.contains("BIGSERIAL"));
        assert!(sql.contains("\"user_id\" BIGINT NOT NULL REFERENCES \"app\".\"users\" (\"id\") ON DELETE CASCADE"));
        assert_eq!(sql.matches("created_at").count(), 1);
    }

    #[test]
    fn rejects_bad_names_and_types() {
        let bad_type = spec(r#"{"name": "t", "columns": [{"name": "c", "type": "TEXT); DROP TABLE x; --"}]}"#);
        assert!(matches!(create_table_sql("public", &bad_type), Err(AppError::Config(_))));
        let bad_name = spec(r#"{"name": "t-1"}"#);
        assert!(matches!(create_table_sql("public", &bad_name), Err(AppError::Store(_))));
        let ok_types = spec(r#"{"name": "t", "columns": [
            {"name": "p", "type": "NUMERIC(10, 2)"}, {"name": "tags", "type": "TEXT[]"},
            {"name": "at", "type": "timestamp with time zone"}
        ]}"#);
        assert!(create_table_sql("public", &ok_types).is_ok());
    }

    #[tokio::test]
    async fn loads_specs_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("02_sessions.json"), r#"{"name": "sessions"}"#).unwrap();
        std::fs::write(dir.path().join("01_users.json"), r#"{"name": "users"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let names: Vec<String> = load_specs(dir.path()).await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["users", "sessions"]);
        assert!(load_specs(&dir.path().join("missing")).await.is_err());
    }
}
