//! Per-driver SQL dialect: placeholder style, bool/time encoding, upsert
//! syntax ("dialect is a value object; the driver is a stateful
//! object"). Stateless — safe to construct freely and share.

/// Which concrete catalog backend a [`Dialect`] targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Embedded single-writer SQLite file.
    Sqlite,
    /// Networked PostgreSQL.
    Postgres,
}

impl Dialect {
    /// Render the Nth positional placeholder (1-indexed) in this
    /// dialect's native style: `?` for SQLite, `$N` for PostgreSQL.
    #[must_use]
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${n}"),
        }
    }

    /// `INSERT ... ON CONFLICT DO NOTHING` equivalent, appended after the
    /// `VALUES (...)` clause, for the given single-column conflict target.
    #[must_use]
    pub fn insert_or_ignore_suffix(self, conflict_cols: &str) -> String {
        match self {
            Dialect::Sqlite => String::new(), // caller uses `INSERT OR IGNORE INTO`.
            Dialect::Postgres => format!("ON CONFLICT ({conflict_cols}) DO NOTHING"),
        }
    }

    /// The `INSERT` verb prefix to use for an ignore-on-conflict insert.
    #[must_use]
    pub fn insert_ignore_verb(self) -> &'static str {
        match self {
            Dialect::Sqlite => "INSERT OR IGNORE INTO",
            Dialect::Postgres => "INSERT INTO",
        }
    }

    /// The `INSERT` verb prefix to use for a replace-on-conflict upsert.
    #[must_use]
    pub fn insert_replace_verb(self) -> &'static str {
        match self {
            Dialect::Sqlite => "INSERT OR REPLACE INTO",
            Dialect::Postgres => "INSERT INTO",
        }
    }

    /// `ON CONFLICT (...) DO UPDATE SET col = excluded.col` suffix for an
    /// upsert; empty for SQLite, where `INSERT OR REPLACE` already covers
    /// the same semantics.
    #[must_use]
    pub fn upsert_update_suffix(self, conflict_cols: &str, update_cols: &[&str]) -> String {
        match self {
            Dialect::Sqlite => String::new(),
            Dialect::Postgres => {
                let assignments = update_cols
                    .iter()
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("ON CONFLICT ({conflict_cols}) DO UPDATE SET {assignments}")
            }
        }
    }

    /// The column type used to store the `failed` flag.
    #[must_use]
    pub fn bool_column_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER",
            Dialect::Postgres => "BOOLEAN",
        }
    }

    /// The column type used to store `ran_at`.
    #[must_use]
    pub fn timestamp_column_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "TEXT",
            Dialect::Postgres => "TIMESTAMPTZ",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_differ_by_dialect() {
        assert_eq!(Dialect::Sqlite.placeholder(3), "?");
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
    }

    #[test]
    fn upsert_suffix_only_meaningful_for_postgres() {
        assert_eq!(Dialect::Sqlite.upsert_update_suffix("version, name", &["value"]), "");
        assert_eq!(
            Dialect::Postgres.upsert_update_suffix("version, name", &["value"]),
            "ON CONFLICT (version, name) DO UPDATE SET value = excluded.value"
        );
    }
}
