//! Live-database schema introspection.
//!
//! Reads `information_schema` and `pg_class` into the schema model so
//! workload grammars can target real tables. This is a read-only
//! collaborator of generation: on any connection or query failure it
//! returns an empty catalogue and logs a warning, never an error.

use crate::schema::{Column, Table};
use indexmap::IndexMap;
use postgres::{Client, NoTls};
use std::env;

/// Environment variable holding the default DSN.
pub const DSN_ENV: &str = "RQG_DSN";

/// Environment variable overriding the inspected schema.
pub const SCHEMA_ENV: &str = "RQG_SCHEMA";

/// Reads table metadata from a live PostgreSQL database.
#[derive(Debug, Clone)]
pub struct SchemaProvider {
    dsn: String,
    schema: String,
}

impl SchemaProvider {
    /// Creates a provider for an explicit DSN, inspecting the `public`
    /// schema.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self { dsn: dsn.into(), schema: "public".to_owned() }
    }

    /// Restricts introspection to another schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Builds a provider from `RQG_DSN` / `RQG_SCHEMA`. Returns `None`
    /// when no DSN is configured; there is no built-in default DSN.
    pub fn from_env() -> Option<Self> {
        let dsn = env::var(DSN_ENV).ok()?;
        let mut provider = SchemaProvider::new(dsn);
        if let Ok(schema) = env::var(SCHEMA_ENV) {
            provider.schema = schema;
        }
        Some(provider)
    }

    /// Reads the catalogue. On any failure an empty mapping is returned;
    /// callers decide how to fall back.
    pub fn introspect(&self) -> IndexMap<String, Table> {
        match self.try_introspect() {
            Ok(tables) => tables,
            Err(err) => {
                tracing::warn!("schema introspection failed: {err}");
                IndexMap::new()
            }
        }
    }

    fn try_introspect(&self) -> Result<IndexMap<String, Table>, postgres::Error> {
        let mut client = Client::connect(&self.dsn, NoTls)?;
        let mut tables = IndexMap::new();

        let table_rows = client.query(
            "SELECT t.table_name, c.reltuples::bigint \
             FROM information_schema.tables t \
             JOIN pg_class c ON c.relname = t.table_name \
             JOIN pg_namespace n ON n.oid = c.relnamespace AND n.nspname = t.table_schema \
             WHERE t.table_schema = $1 AND t.table_type = 'BASE TABLE' \
             ORDER BY t.table_name",
            &[&self.schema],
        )?;

        for table_row in table_rows {
            let table_name: String = table_row.get(0);
            let row_count: i64 = table_row.get(1);
            let column_rows = client.query(
                "SELECT c.column_name, c.data_type, c.is_nullable, \
                        c.column_default IS NOT NULL, \
                        pk.column_name IS NOT NULL, uc.column_name IS NOT NULL \
                 FROM information_schema.columns c \
                 LEFT JOIN ( \
                     SELECT kcu.column_name FROM information_schema.table_constraints tc \
                     JOIN information_schema.key_column_usage kcu \
                       ON tc.constraint_name = kcu.constraint_name \
                     WHERE tc.table_schema = $1 AND tc.table_name = $2 \
                       AND tc.constraint_type = 'PRIMARY KEY' \
                 ) pk ON c.column_name = pk.column_name \
                 LEFT JOIN ( \
                     SELECT kcu.column_name FROM information_schema.table_constraints tc \
                     JOIN information_schema.key_column_usage kcu \
                       ON tc.constraint_name = kcu.constraint_name \
                     WHERE tc.table_schema = $1 AND tc.table_name = $2 \
                       AND tc.constraint_type = 'UNIQUE' \
                 ) uc ON c.column_name = uc.column_name \
                 WHERE c.table_schema = $1 AND c.table_name = $2 \
                 ORDER BY c.ordinal_position",
                &[&self.schema, &table_name],
            )?;

            let mut table = Table::new(table_name.clone());
            for row in column_rows {
                let name: String = row.get(0);
                let data_type: String = row.get(1);
                let is_nullable: String = row.get(2);
                let has_default: bool = row.get(3);
                let is_primary_key: bool = row.get(4);
                let is_unique: bool = row.get(5);

                let mut column = Column::new(name.clone(), data_type);
                column.is_nullable = is_nullable == "YES";
                column.has_default = has_default;
                column.is_primary_key = is_primary_key;
                column.is_unique = is_unique;

                if is_primary_key && table.primary_key.is_none() {
                    table.primary_key = Some(name.clone());
                }
                if is_unique {
                    table.unique_columns.push(name.clone());
                }
                table.columns.insert(name, column);
            }
            table.row_count = row_count.max(0) as u64;
            tables.insert(table_name, table);
        }
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_database_yields_empty_catalogue() {
        let provider =
            SchemaProvider::new("host=127.0.0.1 port=1 dbname=nowhere connect_timeout=1");
        assert!(provider.introspect().is_empty());
    }

    #[test]
    fn test_from_env_requires_dsn() {
        // no RQG_DSN in the test environment
        if env::var(DSN_ENV).is_err() {
            assert!(SchemaProvider::from_env().is_none());
        }
    }
}
