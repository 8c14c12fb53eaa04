//! The catalog's own internal schema version, distinct from the
//! user-facing migration versions the catalog tracks. Bumped whenever this
//! crate changes the shape of its own tables; `ensure()` applies whatever
//! `ALTER`/backfill steps are needed to bring an older on-disk catalog up
//! to the current internal version.

/// Current internal schema version this build of the crate expects.
pub const CURRENT_INTERNAL_VERSION: i64 = 1;

/// Bring a SQLite catalog's internal bookkeeping table up to
/// [`CURRENT_INTERNAL_VERSION`], running any needed migration steps.
pub(crate) fn ensure_sqlite(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS httpmig_internal_version (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            version INTEGER NOT NULL
        );",
    )?;
    let current: Option<i64> = conn
        .query_row(
            "SELECT version FROM httpmig_internal_version WHERE id = 0",
            [],
            |row| row.get(0),
        )
        .ok();
    match current {
        None => {
            conn.execute(
                "INSERT INTO httpmig_internal_version (id, version) VALUES (0, ?1)",
                [CURRENT_INTERNAL_VERSION],
            )?;
        }
        Some(v) if v < CURRENT_INTERNAL_VERSION => {
            // No steps exist yet between version 1 and itself; future
            // internal schema changes add match arms here.
            conn.execute(
                "UPDATE httpmig_internal_version SET version = ?1 WHERE id = 0",
                [CURRENT_INTERNAL_VERSION],
            )?;
        }
        Some(_) => {}
    }
    Ok(())
}

/// Bring a PostgreSQL catalog's internal bookkeeping table up to
/// [`CURRENT_INTERNAL_VERSION`].
pub(crate) async fn ensure_postgres(
    client: &deadpool_postgres::Client,
) -> Result<(), tokio_postgres::Error> {
    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS httpmig_internal_version (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                version INTEGER NOT NULL
            );",
        )
        .await?;
    let row = client
        .query_opt(
            "SELECT version FROM httpmig_internal_version WHERE id = 0",
            &[],
        )
        .await?;
    match row {
        None => {
            client
                .execute(
                    "INSERT INTO httpmig_internal_version (id, version) VALUES (0, $1)",
                    &[&CURRENT_INTERNAL_VERSION],
                )
                .await?;
        }
        Some(row) => {
            let v: i64 = row.get(0);
            if v < CURRENT_INTERNAL_VERSION {
                client
                    .execute(
                        "UPDATE httpmig_internal_version SET version = $1 WHERE id = 0",
                        &[&CURRENT_INTERNAL_VERSION],
                    )
                    .await?;
            }
        }
    }
    Ok(())
}
