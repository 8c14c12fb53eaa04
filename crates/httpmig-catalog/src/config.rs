//! Typed binding for the external collaborator's `store:` config block:
//! which driver to use, its connection parameters, and the
//! table-naming overrides that feed [`crate::tables::TableNames`].
//!
//! [`StoreConfig::build`] is the one place that turns this document into
//! a live [`Store`] trait object; callers still owe it a [`Store::ensure`]
//! call before the catalog is usable.

use crate::postgres::PostgresStore;
use crate::sqlite::SqliteStore;
use crate::store_trait::{Store, StoreError};
use crate::tables::TableNames;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which driver a `store:` block selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Embedded, file-backed catalog.
    Sqlite,
    /// Networked catalog reached through a connection pool.
    Postgres,
}

/// `store.sqlite` sub-block.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SqliteConfig {
    /// Filesystem path to the database file.
    pub path: String,
}

/// `store.postgres` sub-block. Either `dsn` or the individual
/// `host`/`port`/`user`/`password`/`dbname`/`sslmode` fields may be given;
/// `dsn` wins if both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PostgresConfig {
    /// A complete `postgres://` connection string. Overrides the
    /// individual fields below when set.
    #[serde(default)]
    pub dsn: Option<String>,
    /// Server host, used when `dsn` is unset.
    #[serde(default)]
    pub host: Option<String>,
    /// Server port. Defaults to 5432.
    #[serde(default)]
    pub port: Option<u16>,
    /// Login role.
    #[serde(default)]
    pub user: Option<String>,
    /// Login password.
    #[serde(default)]
    pub password: Option<String>,
    /// Database name.
    #[serde(default)]
    pub dbname: Option<String>,
    /// TLS negotiation mode. Defaults to `disable`.
    #[serde(default)]
    pub sslmode: Option<String>,
}

impl PostgresConfig {
    /// Default port for the networked driver.
    pub const DEFAULT_PORT: u16 = 5432;
    /// Default `sslmode`.
    pub const DEFAULT_SSLMODE: &'static str = "disable";

    /// Resolve this block into a `postgres://` connection string, honoring
    /// the `dsn`-wins-over-fields rule and the documented defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StoreConfigError::MissingField`] if neither `dsn` nor at
    /// least `host` and `dbname` are present.
    pub fn to_conn_string(&self) -> Result<String, StoreConfigError> {
        if let Some(dsn) = &self.dsn {
            return Ok(dsn.clone());
        }
        let host = self
            .host
            .as_deref()
            .ok_or(StoreConfigError::MissingField("store.postgres.host"))?;
        let dbname = self
            .dbname
            .as_deref()
            .ok_or(StoreConfigError::MissingField("store.postgres.dbname"))?;
        let port = self.port.unwrap_or(Self::DEFAULT_PORT);
        let sslmode = self.sslmode.as_deref().unwrap_or(Self::DEFAULT_SSLMODE);
        let mut conn = format!("host={host} port={port} dbname={dbname} sslmode={sslmode}");
        if let Some(user) = &self.user {
            conn.push_str(&format!(" user={user}"));
        }
        if let Some(password) = &self.password {
            conn.push_str(&format!(" password={password}"));
        }
        Ok(conn)
    }
}

/// The `store:` config block: driver selection, connection
/// parameters, and table-naming overrides.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreConfig {
    /// Which driver to build.
    #[serde(rename = "type")]
    pub kind: StoreKind,
    /// Parameters for the `sqlite` driver. Required when `type = sqlite`.
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
    /// Parameters for the `postgres` driver. Required when `type = postgres`.
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
    /// Whether the task executor persists response bodies into the run
    /// log. Defaults to `false`.
    #[serde(default)]
    pub save_response_body: bool,
    /// Common prefix for all three catalog tables, used to derive any
    /// name not explicitly overridden below.
    #[serde(default)]
    pub table_prefix: Option<String>,
    /// Explicit override for the applied-versions table name.
    #[serde(default)]
    pub table_schema_migrations: Option<String>,
    /// Explicit override for the run-log table name.
    #[serde(default)]
    pub table_migration_runs: Option<String>,
    /// Explicit override for the stored-env table name.
    #[serde(default)]
    pub table_stored_env: Option<String>,
}

/// Errors resolving a [`StoreConfig`] into a live [`Store`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreConfigError {
    /// `type` named a driver whose matching sub-block was absent.
    #[error("store config selects '{0:?}' but its matching sub-block is missing")]
    MissingBlock(StoreKind),
    /// A required field within a sub-block was absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// The driver failed to open (bad path, unreachable host, bad DSN).
    #[error("failed to open store: {0}")]
    OpenFailed(String),
}

impl From<StoreConfigError> for httpmig_error::MigrationError {
    fn from(err: StoreConfigError) -> Self {
        use httpmig_error::{ErrorCategory, ErrorCode, MigrationError};
        MigrationError::new(ErrorCategory::Config, ErrorCode::ConfigInvalidYaml, err.to_string())
    }
}

impl StoreConfig {
    /// Resolve the configured table names, applying `table_prefix` and the
    /// per-table overrides per [`TableNames::resolve`].
    #[must_use]
    pub fn table_names(&self) -> TableNames {
        TableNames::resolve(
            self.table_prefix.as_deref(),
            self.table_schema_migrations.as_deref(),
            self.table_migration_runs.as_deref(),
            self.table_stored_env.as_deref(),
        )
    }

    /// Build the driver this block selects. Does not call [`Store::ensure`];
    /// callers still owe the catalog that call before first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreConfigError::MissingBlock`] if `type` names a driver
    /// whose sub-block is absent, [`StoreConfigError::MissingField`] if a
    /// required postgres field is absent, or [`StoreConfigError::OpenFailed`]
    /// if the driver itself fails to open.
    pub fn build(&self) -> Result<Arc<dyn Store>, StoreConfigError> {
        let tables = self.table_names();
        match self.kind {
            StoreKind::Sqlite => {
                let sqlite = self
                    .sqlite
                    .as_ref()
                    .ok_or(StoreConfigError::MissingBlock(StoreKind::Sqlite))?;
                let store = SqliteStore::open(&sqlite.path, tables)
                    .map_err(|e| StoreConfigError::OpenFailed(format_store_error(&e)))?;
                Ok(Arc::new(store))
            }
            StoreKind::Postgres => {
                let postgres = self
                    .postgres
                    .as_ref()
                    .ok_or(StoreConfigError::MissingBlock(StoreKind::Postgres))?;
                let conn_str = postgres.to_conn_string()?;
                let store = PostgresStore::connect(&conn_str, tables)
                    .map_err(|e| StoreConfigError::OpenFailed(format_store_error(&e)))?;
                Ok(Arc::new(store))
            }
        }
    }
}

fn format_store_error(err: &StoreError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_builds_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let cfg = StoreConfig {
            kind: StoreKind::Sqlite,
            sqlite: Some(SqliteConfig {
                path: path.to_string_lossy().to_string(),
            }),
            postgres: None,
            save_response_body: false,
            table_prefix: None,
            table_schema_migrations: None,
            table_migration_runs: None,
            table_stored_env: None,
        };
        let store = cfg.build();
        assert!(store.is_ok());
    }

    #[test]
    fn sqlite_missing_block_errors() {
        let cfg = StoreConfig {
            kind: StoreKind::Sqlite,
            sqlite: None,
            postgres: None,
            save_response_body: false,
            table_prefix: None,
            table_schema_migrations: None,
            table_migration_runs: None,
            table_stored_env: None,
        };
        let err = cfg.build().unwrap_err();
        assert_eq!(err, StoreConfigError::MissingBlock(StoreKind::Sqlite));
    }

    #[test]
    fn postgres_conn_string_uses_defaults() {
        let pg = PostgresConfig {
            dsn: None,
            host: Some("db.internal".to_string()),
            port: None,
            user: Some("svc".to_string()),
            password: None,
            dbname: Some("catalog".to_string()),
            sslmode: None,
        };
        let conn = pg.to_conn_string().unwrap();
        assert!(conn.contains("port=5432"));
        assert!(conn.contains("sslmode=disable"));
        assert!(conn.contains("user=svc"));
    }

    #[test]
    fn postgres_dsn_wins_over_fields() {
        let pg = PostgresConfig {
            dsn: Some("postgres://literal".to_string()),
            host: Some("ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(pg.to_conn_string().unwrap(), "postgres://literal");
    }

    #[test]
    fn postgres_missing_host_errors() {
        let pg = PostgresConfig {
            dbname: Some("catalog".to_string()),
            ..Default::default()
        };
        let err = pg.to_conn_string().unwrap_err();
        assert_eq!(err, StoreConfigError::MissingField("store.postgres.host"));
    }

    #[test]
    fn table_prefix_flows_through_to_table_names() {
        let cfg = StoreConfig {
            kind: StoreKind::Sqlite,
            sqlite: Some(SqliteConfig {
                path: ":memory:".to_string(),
            }),
            postgres: None,
            save_response_body: true,
            table_prefix: Some("acme".to_string()),
            table_schema_migrations: None,
            table_migration_runs: None,
            table_stored_env: None,
        };
        let names = cfg.table_names();
        assert_eq!(names.schema_migrations, "acme_schema_migrations");
        assert_eq!(names.migration_runs, "acme_migration_log");
    }
}
