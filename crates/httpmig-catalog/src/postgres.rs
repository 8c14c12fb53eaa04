//! Networked PostgreSQL catalog backend.

use crate::dialect::Dialect;
use crate::internal_migrations;
use crate::model::{Direction, Run};
use crate::sqlite::STORED_ENV_KEY_CAP;
use crate::store_trait::{Store, StoreError};
use crate::tables::TableNames;
use async_trait::async_trait;
use deadpool_postgres::Pool;
use httpmig_task::Version;
use std::collections::BTreeMap;
use tokio_postgres::NoTls;

fn pg_err(e: tokio_postgres::Error) -> StoreError {
    let msg = e.to_string();
    if crate::retry::is_retryable_message(&msg) {
        StoreError::Transient(msg)
    } else {
        StoreError::Fatal(msg)
    }
}

fn pool_err(e: deadpool_postgres::PoolError) -> StoreError {
    let msg = e.to_string();
    if crate::retry::is_retryable_message(&msg) {
        StoreError::Transient(msg)
    } else {
        StoreError::Fatal(msg)
    }
}

fn encode_env(env: &BTreeMap<String, String>) -> String {
    serde_json::to_string(env).unwrap_or_else(|_| "{}".to_string())
}

fn decode_env(text: &str) -> Result<BTreeMap<String, String>, StoreError> {
    serde_json::from_str(text)
        .map_err(|e| StoreError::Fatal(format!("unparsable env_json '{text}': {e}")))
}

/// PostgreSQL-backed [`Store`] implementation, pooled via `deadpool-postgres`.
pub struct PostgresStore {
    pool: Pool,
    tables: TableNames,
}

impl PostgresStore {
    /// Build a store from an already-constructed connection pool.
    #[must_use]
    pub fn new(pool: Pool, tables: TableNames) -> Self {
        Self { pool, tables }
    }

    /// Build a pool (and store) from a `postgres://` connection string,
    /// using no TLS negotiation — callers needing TLS should construct
    /// their own `Pool` and call [`PostgresStore::new`] instead.
    pub fn connect(conn_str: &str, tables: TableNames) -> Result<Self, StoreError> {
        let pg_config: tokio_postgres::Config = conn_str
            .parse()
            .map_err(|e| StoreError::Fatal(format!("invalid postgres connection string: {e}")))?;
        let mgr_config = deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        };
        let mgr = deadpool_postgres::Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .build()
            .map_err(|e| StoreError::Fatal(format!("failed to build postgres pool: {e}")))?;
        Ok(Self::new(pool, tables))
    }

    async fn client(&self) -> Result<deadpool_postgres::Client, StoreError> {
        self.pool.get().await.map_err(pool_err)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn ensure(&self) -> Result<(), StoreError> {
        let client = self.client().await?;
        let d = Dialect::Postgres;
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {schema_migrations} (
                    version BIGINT PRIMARY KEY
                );
                CREATE TABLE IF NOT EXISTS {migration_runs} (
                    id BIGSERIAL PRIMARY KEY,
                    version BIGINT NOT NULL,
                    direction TEXT NOT NULL,
                    status_code INTEGER,
                    body TEXT,
                    env_json TEXT NOT NULL,
                    failed {bool_type} NOT NULL,
                    ran_at {ts_type} NOT NULL
                );
                CREATE TABLE IF NOT EXISTS {stored_env} (
                    version BIGINT NOT NULL,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL,
                    PRIMARY KEY (version, key)
                );",
                schema_migrations = self.tables.schema_migrations,
                migration_runs = self.tables.migration_runs,
                stored_env = self.tables.stored_env,
                bool_type = d.bool_column_type(),
                ts_type = d.timestamp_column_type(),
            ))
            .await
            .map_err(pg_err)?;
        internal_migrations::ensure_postgres(&client)
            .await
            .map_err(pg_err)
    }

    async fn apply(&self, version: Version) -> Result<(), StoreError> {
        let client = self.client().await?;
        let table = &self.tables.schema_migrations;
        let d = Dialect::Postgres;
        client
            .execute(
                &format!(
                    "{verb} {table} (version) VALUES ({p1}) {suffix}",
                    verb = d.insert_ignore_verb(),
                    p1 = d.placeholder(1),
                    suffix = d.insert_or_ignore_suffix("version"),
                ),
                &[&(version as i64)],
            )
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn remove(&self, version: Version) -> Result<(), StoreError> {
        let client = self.client().await?;
        let table = &self.tables.schema_migrations;
        client
            .execute(&format!("DELETE FROM {table} WHERE version = $1"), &[&(version as i64)])
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn is_applied(&self, version: Version) -> Result<bool, StoreError> {
        let client = self.client().await?;
        let table = &self.tables.schema_migrations;
        let row = client
            .query_opt(&format!("SELECT 1 FROM {table} WHERE version = $1"), &[&(version as i64)])
            .await
            .map_err(pg_err)?;
        Ok(row.is_some())
    }

    async fn current_version(&self) -> Result<Option<Version>, StoreError> {
        let client = self.client().await?;
        let table = &self.tables.schema_migrations;
        let row = client
            .query_one(&format!("SELECT MAX(version) FROM {table}"), &[])
            .await
            .map_err(pg_err)?;
        let v: Option<i64> = row.get(0);
        Ok(v.map(|v| v as Version))
    }

    async fn list_applied(&self) -> Result<Vec<Version>, StoreError> {
        let client = self.client().await?;
        let table = &self.tables.schema_migrations;
        let rows = client
            .query(&format!("SELECT version FROM {table} ORDER BY version ASC"), &[])
            .await
            .map_err(pg_err)?;
        Ok(rows.iter().map(|row| row.get::<_, i64>(0) as Version).collect())
    }

    async fn set_version(&self, version: Version) -> Result<(), StoreError> {
        let client = self.client().await?;
        let table = &self.tables.schema_migrations;
        let current: Option<i64> = client
            .query_one(&format!("SELECT MAX(version) FROM {table}"), &[])
            .await
            .map_err(pg_err)?
            .get(0);
        if let Some(current) = current {
            if version > current as Version {
                return Err(StoreError::Fatal(format!(
                    "set_version target {version} exceeds current version {current}"
                )));
            }
        }
        client
            .execute(&format!("DELETE FROM {table} WHERE version > $1"), &[&(version as i64)])
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn record_run(&self, run: Run) -> Result<(), StoreError> {
        let client = self.client().await?;
        let table = &self.tables.migration_runs;
        let status_code = run.status_code.map(i32::from);
        let env_json = encode_env(&run.extracted_env);
        client
            .execute(
                &format!(
                    "INSERT INTO {table} (version, direction, status_code, body, env_json, failed, ran_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)"
                ),
                &[
                    &(run.version as i64),
                    &run.direction.as_str(),
                    &status_code,
                    &run.body,
                    &env_json,
                    &run.failed,
                    &run.ran_at,
                ],
            )
            .await
            .map_err(pg_err)?;
        Ok(())
    }

    async fn list_runs(&self) -> Result<Vec<Run>, StoreError> {
        let client = self.client().await?;
        let table = &self.tables.migration_runs;
        let rows = client
            .query(
                &format!(
                    "SELECT version, direction, status_code, body, env_json, failed, ran_at
                     FROM {table} ORDER BY id ASC"
                ),
                &[],
            )
            .await
            .map_err(pg_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let direction: String = row.get(1);
            let direction = Direction::parse(&direction).ok_or_else(|| {
                StoreError::Fatal(format!("unrecognized run direction '{direction}'"))
            })?;
            let status_code: Option<i32> = row.get(2);
            let env_json: String = row.get(4);
            out.push(Run {
                version: row.get::<_, i64>(0) as Version,
                direction,
                status_code: status_code.map(|c| c as u16),
                body: row.get(3),
                extracted_env: decode_env(&env_json)?,
                failed: row.get(5),
                ran_at: row.get(6),
            });
        }
        Ok(out)
    }

    async fn load_env(
        &self,
        version: Version,
        direction: Direction,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let client = self.client().await?;
        let table = &self.tables.migration_runs;
        let row = client
            .query_opt(
                &format!(
                    "SELECT env_json FROM {table}
                     WHERE version = $1 AND direction = $2
                     ORDER BY id DESC LIMIT 1"
                ),
                &[&(version as i64), &direction.as_str()],
            )
            .await
            .map_err(pg_err)?;
        row.map(|r| decode_env(&r.get::<_, String>(0))).transpose()
    }

    async fn insert_stored_env(
        &self,
        version: Version,
        entries: BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let client = self.client().await?;
        let table = &self.tables.stored_env;
        let existing = client
            .query_one(&format!("SELECT COUNT(*) FROM {table} WHERE version = $1"), &[&(version as i64)])
            .await
            .map_err(pg_err)?
            .get::<_, i64>(0) as usize;
        let mut new_keys = 0usize;
        for key in entries.keys() {
            let found = client
                .query_opt(
                    &format!("SELECT 1 FROM {table} WHERE version = $1 AND key = $2"),
                    &[&(version as i64), key],
                )
                .await
                .map_err(pg_err)?;
            if found.is_none() {
                new_keys += 1;
            }
        }
        let total = existing + new_keys;
        if total > STORED_ENV_KEY_CAP {
            return Err(StoreError::CapExceeded {
                version,
                attempted: total,
                cap: STORED_ENV_KEY_CAP,
            });
        }
        let d = Dialect::Postgres;
        for (key, value) in entries {
            client
                .execute(
                    &format!(
                        "{verb} {table} (version, key, value) VALUES ({p1}, {p2}, {p3}) {suffix}",
                        verb = d.insert_replace_verb(),
                        p1 = d.placeholder(1),
                        p2 = d.placeholder(2),
                        p3 = d.placeholder(3),
                        suffix = d.upsert_update_suffix("version, key", &["value"]),
                    ),
                    &[&(version as i64), &key, &value],
                )
                .await
                .map_err(pg_err)?;
        }
        Ok(())
    }

    async fn load_stored_env(&self, version: Version) -> Result<BTreeMap<String, String>, StoreError> {
        let client = self.client().await?;
        let table = &self.tables.stored_env;
        let rows = client
            .query(&format!("SELECT key, value FROM {table} WHERE version = $1"), &[&(version as i64)])
            .await
            .map_err(pg_err)?;
        let mut out = BTreeMap::new();
        for row in rows {
            out.insert(row.get::<_, String>(0), row.get::<_, String>(1));
        }
        Ok(out)
    }

    async fn delete_stored_env(&self, version: Version) -> Result<(), StoreError> {
        let client = self.client().await?;
        let table = &self.tables.stored_env;
        client
            .execute(&format!("DELETE FROM {table} WHERE version = $1"), &[&(version as i64)])
            .await
            .map_err(pg_err)?;
        Ok(())
    }
}

/// This store's dialect, for callers that need to branch on backend kind.
#[must_use]
pub fn dialect() -> Dialect {
    Dialect::Postgres
}

#[cfg(test)]
mod tests {
    // Exercising `PostgresStore` against a live server belongs in an
    // integration test gated on a reachable `DATABASE_URL`, not a unit
    // test; the SQL text itself is covered indirectly by the `sqlite`
    // module's behavioral tests since both drivers implement the same
    // `Store` contract against the same table layout.
}
