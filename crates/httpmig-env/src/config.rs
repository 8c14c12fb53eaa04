//! Typed binding for the external collaborator's `env:` config block: a
//! list of `{name, value | valueFromEnv}` entries that seed
//! [`crate::Env`]'s `global` layer before a run starts.
//!
//! Loading the top-level configuration *document* stays outside this
//! workspace; this module only defines the shape the loader must produce
//! and the pure resolution step (reading `valueFromEnv` against the
//! process environment) that turns it into a `global` map.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `env:` entry: a literal `value`, or `valueFromEnv` naming a
/// process environment variable to read at resolution time. Exactly one
/// of the two should be set; if both are, `value` wins.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnvEntry {
    /// The key this entry binds in `Env::global`.
    pub name: String,
    /// A literal value.
    #[serde(default)]
    pub value: Option<String>,
    /// The name of a process environment variable to read at resolution
    /// time.
    #[serde(default)]
    pub value_from_env: Option<String>,
}

/// The `env:` config block: an ordered list of entries resolved once,
/// before the first task executes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EnvSpec {
    /// Configured entries, in file order.
    #[serde(default)]
    pub entries: Vec<EnvEntry>,
}

/// An `env:` entry named `valueFromEnv` a variable that was not set in
/// the process environment at resolution time.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("env entry '{name}' references unset environment variable '{var}'")]
pub struct EnvConfigError {
    /// The entry's `name`.
    pub name: String,
    /// The `valueFromEnv` variable name that was unset.
    pub var: String,
}

impl From<EnvConfigError> for httpmig_error::MigrationError {
    fn from(err: EnvConfigError) -> Self {
        use httpmig_error::{ErrorCategory, ErrorCode, MigrationError};
        MigrationError::new(ErrorCategory::Config, ErrorCode::ConfigDirUnreadable, err.to_string())
            .with_context("name", err.name.clone())
            .with_context("var", err.var.clone())
    }
}

impl EnvSpec {
    /// Resolve every entry into `name -> value`, reading `valueFromEnv`
    /// variables from the current process environment. A `value` literal
    /// takes precedence over `valueFromEnv` when both are set.
    ///
    /// # Errors
    ///
    /// Returns [`EnvConfigError`] if an entry names a `valueFromEnv`
    /// variable that is not set and carries no literal `value` fallback.
    pub fn resolve(&self) -> Result<BTreeMap<String, String>, EnvConfigError> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Like [`Self::resolve`] but with an injectable lookup function, for
    /// testing without mutating the real process environment.
    pub fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<BTreeMap<String, String>, EnvConfigError> {
        let mut out = BTreeMap::new();
        for entry in &self.entries {
            let resolved = match (&entry.value, &entry.value_from_env) {
                (Some(v), _) => v.clone(),
                (None, Some(var)) => lookup(var).ok_or_else(|| EnvConfigError {
                    name: entry.name.clone(),
                    var: var.clone(),
                })?,
                (None, None) => String::new(),
            };
            out.insert(entry.name.clone(), resolved);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_value_wins_over_value_from_env() {
        let spec = EnvSpec {
            entries: vec![EnvEntry {
                name: "base_url".to_string(),
                value: Some("https://literal".to_string()),
                value_from_env: Some("UNUSED_VAR".to_string()),
            }],
        };
        let resolved = spec.resolve_with(|_| None).unwrap();
        assert_eq!(resolved.get("base_url").unwrap(), "https://literal");
    }

    #[test]
    fn value_from_env_reads_lookup_function() {
        let spec = EnvSpec {
            entries: vec![EnvEntry {
                name: "token".to_string(),
                value: None,
                value_from_env: Some("MY_TOKEN".to_string()),
            }],
        };
        let resolved = spec
            .resolve_with(|var| (var == "MY_TOKEN").then(|| "secret".to_string()))
            .unwrap();
        assert_eq!(resolved.get("token").unwrap(), "secret");
    }

    #[test]
    fn unset_value_from_env_errors() {
        let spec = EnvSpec {
            entries: vec![EnvEntry {
                name: "token".to_string(),
                value: None,
                value_from_env: Some("MISSING".to_string()),
            }],
        };
        let err = spec.resolve_with(|_| None).unwrap_err();
        assert_eq!(err.name, "token");
        assert_eq!(err.var, "MISSING");
    }

    #[test]
    fn entry_with_neither_field_resolves_to_empty_string() {
        let spec = EnvSpec {
            entries: vec![EnvEntry {
                name: "blank".to_string(),
                value: None,
                value_from_env: None,
            }],
        };
        let resolved = spec.resolve_with(|_| None).unwrap();
        assert_eq!(resolved.get("blank").unwrap(), "");
    }
}
