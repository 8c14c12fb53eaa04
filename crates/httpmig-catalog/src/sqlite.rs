//! Embedded SQLite catalog backend.
//!
//! `rusqlite::Connection` is not `Send` across an `.await`, so every
//! operation dispatches its blocking SQL work onto
//! [`tokio::task::spawn_blocking`] over a connection guarded by a
//! `std::sync::Mutex`, following this workspace's convention of keeping
//! blocking I/O off the async executor's worker threads.

use crate::dialect::Dialect;
use crate::internal_migrations;
use crate::model::{Direction, Run};
use crate::store_trait::{Store, StoreError};
use crate::tables::TableNames;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use httpmig_task::Version;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Maximum number of stored-env keys a single version may accumulate.
pub const STORED_ENV_KEY_CAP: usize = 10_000;

/// SQLite-backed [`Store`] implementation.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    tables: TableNames,
}

impl SqliteStore {
    /// Open (creating if absent) the SQLite database at `path`. Does not
    /// create the catalog's tables; call [`Store::ensure`] first.
    pub fn open(path: impl AsRef<Path>, tables: TableNames) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| StoreError::Fatal(format!("failed to open sqlite database: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::Fatal(format!("failed to set journal_mode: {e}")))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| StoreError::Fatal(format!("failed to enable foreign_keys: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            tables,
        })
    }

    /// Open an in-memory database, primarily for tests.
    pub fn open_in_memory(tables: TableNames) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Fatal(format!("failed to open sqlite database: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            tables,
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Fatal("sqlite connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Fatal(format!("sqlite worker task panicked: {e}")))?
    }
}

fn sql_err(e: rusqlite::Error) -> StoreError {
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

#[async_trait]
impl Store for SqliteStore {
    async fn ensure(&self) -> Result<(), StoreError> {
        debug!(table = %self.tables.schema_migrations, "ensuring sqlite catalog schema");
        let tables = self.tables.clone();
        self.with_conn(move |conn| {
            let d = Dialect::Sqlite;
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {schema_migrations} (
                    version INTEGER PRIMARY KEY
                );
                CREATE TABLE IF NOT EXISTS {migration_runs} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    version INTEGER NOT NULL,
                    direction TEXT NOT NULL,
                    status_code INTEGER,
                    body TEXT,
                    env_json TEXT NOT NULL,
                    failed {bool_type} NOT NULL,
                    ran_at {ts_type} NOT NULL
                );
                CREATE TABLE IF NOT EXISTS {stored_env} (
                    version INTEGER NOT NULL,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL,
                    PRIMARY KEY (version, key)
                );",
                schema_migrations = tables.schema_migrations,
                migration_runs = tables.migration_runs,
                stored_env = tables.stored_env,
                bool_type = d.bool_column_type(),
                ts_type = d.timestamp_column_type(),
            ))
            .map_err(sql_err)?;
            internal_migrations::ensure_sqlite(conn).map_err(sql_err)
        })
        .await
    }

    async fn apply(&self, version: Version) -> Result<(), StoreError> {
        let table = self.tables.schema_migrations.clone();
        self.with_conn(move |conn| {
            let d = Dialect::Sqlite;
            conn.execute(
                &format!(
                    "{verb} {table} (version) VALUES ({p1})",
                    verb = d.insert_ignore_verb(),
                    p1 = d.placeholder(1),
                ),
                params![version as i64],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, version: Version) -> Result<(), StoreError> {
        let table = self.tables.schema_migrations.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!("DELETE FROM {table} WHERE version = ?1"),
                params![version as i64],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn is_applied(&self, version: Version) -> Result<bool, StoreError> {
        let table = self.tables.schema_migrations.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT 1 FROM {table} WHERE version = ?1"),
                params![version as i64],
                |_| Ok(()),
            )
            .optional()
            .map(|row| row.is_some())
            .map_err(sql_err)
        })
        .await
    }

    async fn current_version(&self) -> Result<Option<Version>, StoreError> {
        let table = self.tables.schema_migrations.clone();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT MAX(version) FROM {table}"),
                [],
                |row| row.get::<_, Option<i64>>(0),
            )
            .map(|v| v.map(|v| v as Version))
            .map_err(sql_err)
        })
        .await
    }

    async fn list_applied(&self) -> Result<Vec<Version>, StoreError> {
        let table = self.tables.schema_migrations.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT version FROM {table} ORDER BY version ASC"))
                .map_err(sql_err)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, i64>(0))
                .map_err(sql_err)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(sql_err)? as Version);
            }
            Ok(out)
        })
        .await
    }

    async fn set_version(&self, version: Version) -> Result<(), StoreError> {
        let table = self.tables.schema_migrations.clone();
        self.with_conn(move |conn| {
            let current: Option<i64> = conn
                .query_row(&format!("SELECT MAX(version) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .map_err(sql_err)?;
            if let Some(current) = current {
                if version > current as Version {
                    return Err(StoreError::Fatal(format!(
                        "set_version target {version} exceeds current version {current}"
                    )));
                }
            }
            conn.execute(
                &format!("DELETE FROM {table} WHERE version > ?1"),
                params![version as i64],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn record_run(&self, run: Run) -> Result<(), StoreError> {
        let table = self.tables.migration_runs.clone();
        let env_json = encode_env(&run.extracted_env);
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (version, direction, status_code, body, env_json, failed, ran_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    run.version as i64,
                    run.direction.as_str(),
                    run.status_code.map(i64::from),
                    run.body,
                    env_json,
                    run.failed as i64,
                    run.ran_at.to_rfc3339(),
                ],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn list_runs(&self) -> Result<Vec<Run>, StoreError> {
        let table = self.tables.migration_runs.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT version, direction, status_code, body, env_json, failed, ran_at
                     FROM {table} ORDER BY id ASC"
                ))
                .map_err(sql_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })
                .map_err(sql_err)?;
            let mut out = Vec::new();
            for row in rows {
                let (version, direction, status_code, body, env_json, failed, ran_at) =
                    row.map_err(sql_err)?;
                out.push(decode_run_row(
                    version, direction, status_code, body, env_json, failed, ran_at,
                )?);
            }
            Ok(out)
        })
        .await
    }

    async fn load_env(
        &self,
        version: Version,
        direction: Direction,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let table = self.tables.migration_runs.clone();
        self.with_conn(move |conn| {
            let env_json: Option<String> = conn
                .query_row(
                    &format!(
                        "SELECT env_json FROM {table}
                         WHERE version = ?1 AND direction = ?2
                         ORDER BY id DESC LIMIT 1"
                    ),
                    params![version as i64, direction.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err)?;
            env_json.map(|j| decode_env(&j)).transpose()
        })
        .await
    }

    async fn insert_stored_env(
        &self,
        version: Version,
        entries: BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let table = self.tables.stored_env.clone();
        self.with_conn(move |conn| {
            let existing: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM {table} WHERE version = ?1"),
                    params![version as i64],
                    |row| row.get(0),
                )
                .map_err(sql_err)?;
            let new_keys = entries
                .keys()
                .filter(|k| {
                    conn.query_row(
                        &format!("SELECT 1 FROM {table} WHERE version = ?1 AND key = ?2"),
                        params![version as i64, k.as_str()],
                        |_| Ok(()),
                    )
                    .optional()
                    .unwrap_or(None)
                    .is_none()
                })
                .count();
            let total = existing as usize + new_keys;
            if total > STORED_ENV_KEY_CAP {
                return Err(StoreError::CapExceeded {
                    version,
                    attempted: total,
                    cap: STORED_ENV_KEY_CAP,
                });
            }
            let d = Dialect::Sqlite;
            for (key, value) in entries {
                conn.execute(
                    &format!(
                        "{verb} {table} (version, key, value) VALUES ({p1}, {p2}, {p3})",
                        verb = d.insert_replace_verb(),
                        p1 = d.placeholder(1),
                        p2 = d.placeholder(2),
                        p3 = d.placeholder(3),
                    ),
                    params![version as i64, key, value],
                )
                .map_err(sql_err)?;
            }
            Ok(())
        })
        .await
    }

    async fn load_stored_env(&self, version: Version) -> Result<BTreeMap<String, String>, StoreError> {
        let table = self.tables.stored_env.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT key, value FROM {table} WHERE version = ?1"
                ))
                .map_err(sql_err)?;
            let rows = stmt
                .query_map(params![version as i64], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(sql_err)?;
            let mut out = BTreeMap::new();
            for row in rows {
                let (k, v) = row.map_err(sql_err)?;
                out.insert(k, v);
            }
            Ok(out)
        })
        .await
    }

    async fn delete_stored_env(&self, version: Version) -> Result<(), StoreError> {
        let table = self.tables.stored_env.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!("DELETE FROM {table} WHERE version = ?1"),
                params![version as i64],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_run_row(
    version: i64,
    direction: String,
    status_code: Option<i64>,
    body: Option<String>,
    env_json: String,
    failed: i64,
    ran_at: String,
) -> Result<Run, StoreError> {
    let direction = Direction::parse(&direction)
        .ok_or_else(|| StoreError::Fatal(format!("unrecognized run direction '{direction}'")))?;
    let ran_at: DateTime<Utc> = ran_at
        .parse()
        .map_err(|e| StoreError::Fatal(format!("unparsable run timestamp '{ran_at}': {e}")))?;
    Ok(Run {
        version: version as Version,
        direction,
        status_code: status_code.map(|c| c as u16),
        body,
        extracted_env: decode_env(&env_json)?,
        failed: failed != 0,
        ran_at,
    })
}

/// This store's dialect, for callers that need to branch on backend kind.
#[must_use]
pub fn dialect() -> Dialect {
    Dialect::Sqlite
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TableNames;

    async fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory(TableNames::default()).unwrap();
        store.ensure().await.unwrap();
        store
    }

    fn run(version: Version, direction: Direction, failed: bool) -> Run {
        Run {
            version,
            direction,
            status_code: Some(200),
            body: None,
            extracted_env: BTreeMap::new(),
            failed,
            ran_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn apply_and_current_version_round_trip() {
        let store = store().await;
        assert_eq!(store.current_version().await.unwrap(), None);
        store.apply(1).await.unwrap();
        store.apply(3).await.unwrap();
        assert_eq!(store.current_version().await.unwrap(), Some(3));
        assert_eq!(store.list_applied().await.unwrap(), vec![1, 3]);
        assert!(store.is_applied(1).await.unwrap());
        assert!(!store.is_applied(2).await.unwrap());
    }

    #[tokio::test]
    async fn remove_clears_applied_flag() {
        let store = store().await;
        store.apply(1).await.unwrap();
        store.remove(1).await.unwrap();
        assert!(!store.is_applied(1).await.unwrap());
    }

    #[tokio::test]
    async fn stored_env_round_trips_per_version() {
        let store = store().await;
        let mut entries = BTreeMap::new();
        entries.insert("id".to_string(), "abc123".to_string());
        store.insert_stored_env(1, entries.clone()).await.unwrap();
        assert_eq!(store.load_stored_env(1).await.unwrap(), entries);
        store.delete_stored_env(1).await.unwrap();
        assert!(store.load_stored_env(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_env_returns_latest_matching_run() {
        let store = store().await;
        let mut first = run(1, Direction::Up, false);
        first.extracted_env.insert("id".to_string(), "first".to_string());
        store.record_run(first).await.unwrap();
        let mut second = run(1, Direction::Up, false);
        second.extracted_env.insert("id".to_string(), "second".to_string());
        store.record_run(second).await.unwrap();

        let loaded = store.load_env(1, Direction::Up).await.unwrap().unwrap();
        assert_eq!(loaded.get("id").unwrap(), "second");
        assert!(store.load_env(1, Direction::Down).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_and_list_runs_preserves_order() {
        let store = store().await;
        store.record_run(run(1, Direction::Up, false)).await.unwrap();
        store.record_run(run(1, Direction::Down, true)).await.unwrap();
        let runs = store.list_runs().await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].direction, Direction::Up);
        assert!(runs[1].failed);
    }

    #[tokio::test]
    async fn stored_env_cap_is_enforced() {
        let store = store().await;
        let mut entries = BTreeMap::new();
        for i in 0..(STORED_ENV_KEY_CAP + 1) {
            entries.insert(format!("k{i}"), "v".to_string());
        }
        let err = store.insert_stored_env(1, entries).await.unwrap_err();
        assert!(matches!(err, StoreError::CapExceeded { .. }));
    }

    #[tokio::test]
    async fn set_version_deletes_above_target() {
        let store = store().await;
        store.apply(1).await.unwrap();
        store.apply(2).await.unwrap();
        store.apply(3).await.unwrap();
        store.set_version(1).await.unwrap();
        assert_eq!(store.list_applied().await.unwrap(), vec![1]);
        assert_eq!(store.current_version().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn set_version_rejects_target_above_current() {
        let store = store().await;
        store.apply(1).await.unwrap();
        let err = store.set_version(5).await.unwrap_err();
        assert!(matches!(err, StoreError::Fatal(_)));
        assert_eq!(store.list_applied().await.unwrap(), vec![1]);
    }
}
