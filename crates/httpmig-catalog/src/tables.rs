//! Table-name configuration and validation for the `store:` config block.

use regex::Regex;
use std::sync::OnceLock;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

/// `true` if `name` is a safe SQL identifier: `^[A-Za-z_][A-Za-z0-9_]*$`.
#[must_use]
pub fn validate_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// The three logical table names the catalog reads and writes, with
/// their defaults and prefix-derivation rule: an identifier is accepted
/// only if it passes [`validate_identifier`]; otherwise the driver
/// substitutes the default. When a prefix is supplied, any name left
/// unset is derived as `<prefix>_<suffix>` (the run-log suffix is
/// `migration_log`, not `migration_runs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// Applied-versions table.
    pub schema_migrations: String,
    /// Append-only run-history table.
    pub migration_runs: String,
    /// Per-version stored-env table.
    pub stored_env: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            schema_migrations: "schema_migrations".to_string(),
            migration_runs: "migration_runs".to_string(),
            stored_env: "stored_env".to_string(),
        }
    }
}

impl TableNames {
    /// Build table names from the `store:` config block's optional
    /// explicit overrides and/or `table_prefix`. Any override that fails
    /// [`validate_identifier`] falls back to the default for that table;
    /// an unset override is derived from `prefix` when one is given.
    #[must_use]
    pub fn resolve(
        prefix: Option<&str>,
        schema_migrations: Option<&str>,
        migration_runs: Option<&str>,
        stored_env: Option<&str>,
    ) -> Self {
        let defaults = Self::default();
        let pick = |explicit: Option<&str>, suffix: &str, default: &str| -> String {
            if let Some(name) = explicit {
                if validate_identifier(name) {
                    return name.to_string();
                }
            }
            if let Some(p) = prefix {
                let derived = format!("{p}_{suffix}");
                if validate_identifier(&derived) {
                    return derived;
                }
            }
            default.to_string()
        };
        Self {
            schema_migrations: pick(
                schema_migrations,
                "schema_migrations",
                &defaults.schema_migrations,
            ),
            migration_runs: pick(migration_runs, "migration_log", &defaults.migration_runs),
            stored_env: pick(stored_env, "stored_env", &defaults.stored_env),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_identifiers_accepted() {
        assert!(validate_identifier("schema_migrations"));
        assert!(validate_identifier("_private"));
        assert!(validate_identifier("a1"));
    }

    #[test]
    fn invalid_identifiers_rejected() {
        assert!(!validate_identifier("1abc"));
        assert!(!validate_identifier("bad-name"));
        assert!(!validate_identifier("bad;drop table"));
        assert!(!validate_identifier(""));
    }

    #[test]
    fn falls_back_to_defaults_on_invalid_override() {
        let names = TableNames::resolve(None, Some("bad;name"), None, None);
        assert_eq!(names.schema_migrations, "schema_migrations");
    }

    #[test]
    fn derives_from_prefix_when_unset() {
        let names = TableNames::resolve(Some("acme"), None, None, None);
        assert_eq!(names.schema_migrations, "acme_schema_migrations");
        assert_eq!(names.migration_runs, "acme_migration_log");
        assert_eq!(names.stored_env, "acme_stored_env");
    }

    #[test]
    fn explicit_override_wins_over_prefix() {
        let names = TableNames::resolve(Some("acme"), Some("my_versions"), None, None);
        assert_eq!(names.schema_migrations, "my_versions");
    }
}
