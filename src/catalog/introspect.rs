//! Reads table metadata from PostgreSQL's catalog. Nothing is cached: each call hits the database.

use crate::catalog::types::*;
use crate::config::AccessConfig;
use crate::error::AppError;
use crate::sql::quoted;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashSet};

const COLUMNS_SQL: &str = r#"
    SELECT c.column_name::text,
           c.udt_schema::text,
           c.udt_name::text,
           COALESCE(c.character_maximum_length, c.numeric_precision, c.datetime_precision, 0)::int4,
           (c.is_nullable = 'YES'),
           (c.is_identity = 'YES' OR COALESCE(c.column_default, '') LIKE 'nextval(%')
    FROM information_schema.columns c
    WHERE c.table_schema = $1 AND c.table_name = $2
    ORDER BY c.ordinal_position
"#;

const COLUMN_NAMES_SQL: &str = r#"
    SELECT column_name::text
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position
"#;

const PRIMARY_KEYS_SQL: &str = r#"
    SELECT kcu.column_name::text
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON kcu.constraint_name = tc.constraint_name
     AND kcu.table_schema = tc.table_schema
     AND kcu.table_name = tc.table_name
    WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = $1 AND tc.table_name = $2
    ORDER BY kcu.ordinal_position
"#;

const FOREIGN_KEYS_SQL: &str = r#"
    SELECT a.attname::text, rn.nspname::text, rc.relname::text, ra.attname::text
    FROM pg_constraint con
    JOIN pg_class c ON c.oid = con.conrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_class rc ON rc.oid = con.confrelid
    JOIN pg_namespace rn ON rn.oid = rc.relnamespace
    CROSS JOIN LATERAL unnest(con.conkey, con.confkey) AS k(attnum, ref_attnum)
    JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
    JOIN pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.ref_attnum
    WHERE con.contype = 'f' AND n.nspname = $1 AND c.relname = $2
    ORDER BY con.conname, k.attnum
"#;

const TABLES_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
    ORDER BY table_name
"#;

const CHECK_CONSTRAINTS_SQL: &str = r#"
    SELECT con.conname::text, pg_get_constraintdef(con.oid)
    FROM pg_constraint con
    JOIN pg_class t ON con.conrelid = t.oid
    JOIN pg_namespace n ON n.oid = t.relnamespace
    WHERE n.nspname = $1 AND t.relname = $2 AND con.contype = 'c'
    ORDER BY con.conname
"#;

pub struct Catalog<'a> {
    pool: &'a PgPool,
}

impl<'a> Catalog<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Catalog { pool }
    }

    pub async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnMetadata>, AppError> {
        if is_blank(schema, table) {
            tracing::warn!(schema, table, "blank schema or table, skipping column lookup");
            return Ok(Vec::new());
        }
        let pks: HashSet<String> = self.get_primary_keys(schema, table).await?.into_iter().collect();
        let fks: HashSet<String> = self.fk_rows(schema, table).await?.into_iter().map(|r| r.0).collect();
        self.columns_with_keys(schema, table, &pks, &fks).await
    }

    async fn columns_with_keys(
        &self,
        schema: &str,
        table: &str,
        pks: &HashSet<String>,
        fks: &HashSet<String>,
    ) -> Result<Vec<ColumnMetadata>, AppError> {
        tracing::debug!(sql = %COLUMNS_SQL, schema, table, "query");
        let rows = sqlx::query_as::<_, (String, String, String, i32, bool, bool)>(COLUMNS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(AppError::metadata)?;
        let columns: Vec<ColumnMetadata> = rows
            .into_iter()
            .map(|(name, udt_schema, udt_name, size, nullable, auto_increment)| ColumnMetadata {
                normalized_type: normalize_type(&udt_name),
                native_type: format!("{}.{}", quoted(&udt_schema), quoted(&udt_name)),
                size,
                nullable,
                auto_increment,
                is_primary_key: pks.contains(&name),
                is_foreign_key: fks.contains(&name),
                name,
            })
            .collect();
        tracing::info!(schema, table, count = columns.len(), "fetched column metadata");
        Ok(columns)
    }

    pub async fn get_primary_keys(&self, schema: &str, table: &str) -> Result<Vec<String>, AppError> {
        if is_blank(schema, table) {
            return Ok(Vec::new());
        }
        tracing::debug!(sql = %PRIMARY_KEYS_SQL, schema, table, "query");
        sqlx::query_scalar::<_, String>(PRIMARY_KEYS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(AppError::metadata)
    }

    async fn fk_rows(&self, schema: &str, table: &str) -> Result<Vec<(String, String, String, String)>, AppError> {
        tracing::debug!(sql = %FOREIGN_KEYS_SQL, schema, table, "query");
        sqlx::query_as::<_, (String, String, String, String)>(FOREIGN_KEYS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(AppError::metadata)
    }

    /// Foreign keys with their inferred display column.
    pub async fn get_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyMetadata>, AppError> {
        if is_blank(schema, table) {
            return Ok(Vec::new());
        }
        let rows = self.fk_rows(schema, table).await?;
        let mut out = Vec::with_capacity(rows.len());
        for (fk_column, referenced_schema, referenced_table, referenced_column) in rows {
            let referenced_columns = self.column_names(&referenced_schema, &referenced_table).await?;
            let display_column = infer_display_column(referenced_columns.iter().map(String::as_str));
            out.push(ForeignKeyMetadata {
                fk_column,
                referenced_schema,
                referenced_table,
                referenced_column,
                display_column,
            });
        }
        Ok(out)
    }

    async fn column_names(&self, schema: &str, table: &str) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar::<_, String>(COLUMN_NAMES_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(AppError::metadata)
    }

    /// Columns, keys and foreign keys in one pass, sharing the key lookups.
    pub async fn describe(&self, ident: &TableIdentifier) -> Result<TableMeta, AppError> {
        let primary_keys = self.get_primary_keys(&ident.schema, &ident.table).await?;
        let foreign_keys = self.get_foreign_keys(&ident.schema, &ident.table).await?;
        let pks: HashSet<String> = primary_keys.iter().cloned().collect();
        let fks: HashSet<String> = foreign_keys.iter().map(|f| f.fk_column.clone()).collect();
        let columns = self.columns_with_keys(&ident.schema, &ident.table, &pks, &fks).await?;
        Ok(TableMeta {
            ident: ident.clone(),
            columns,
            primary_keys,
            foreign_keys,
        })
    }

    /// Configured valid schemas; the catalog is not consulted.
    pub fn get_all_schemas(&self, access: &AccessConfig) -> Vec<String> {
        access.valid_schemas.clone()
    }

    /// Tables of `schema` after the allow/deny lists are applied.
    pub async fn get_tables_by_schema(&self, schema: &str, access: &AccessConfig) -> Result<Vec<String>, AppError> {
        if schema.trim().is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(sql = %TABLES_SQL, schema, "query");
        let all = sqlx::query_scalar::<_, String>(TABLES_SQL)
            .bind(schema)
            .fetch_all(self.pool)
            .await
            .map_err(AppError::metadata)?;
        Ok(access.filter_tables(schema, all))
    }

    /// Exposed tables of every valid schema.
    pub async fn get_all_tables(&self, access: &AccessConfig) -> Result<BTreeMap<String, Vec<String>>, AppError> {
        let mut out = BTreeMap::new();
        for schema in &access.valid_schemas {
            let tables = self.get_tables_by_schema(schema, access).await?;
            out.insert(schema.clone(), tables);
        }
        Ok(out)
    }

    pub async fn get_check_constraints(&self, schema: &str, table: &str) -> Result<Vec<CheckConstraint>, AppError> {
        if is_blank(schema, table) {
            return Ok(Vec::new());
        }
        tracing::debug!(sql = %CHECK_CONSTRAINTS_SQL, schema, table, "query");
        let rows = sqlx::query_as::<_, (String, String)>(CHECK_CONSTRAINTS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(AppError::metadata)?;
        Ok(rows
            .into_iter()
            .map(|(name, definition)| CheckConstraint { name, definition })
            .collect())
    }

    /// Values enumerated by check constraints on `column`, for populating a selection control.
    pub async fn get_check_values(&self, schema: &str, table: &str, column: &str) -> Result<Vec<String>, AppError> {
        let defs = self.get_check_constraints(schema, table).await?;
        Ok(extract_check_values(defs.iter().map(|c| c.definition.as_str()), column))
    }
}

fn is_blank(schema: &str, table: &str) -> bool {
    TableIdentifier::new(schema, table).is_blank()
}
