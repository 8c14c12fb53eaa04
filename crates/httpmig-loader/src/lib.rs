// SPDX-License-Identifier: MIT OR Apache-2.0
//! Migration-directory loader.
//!
//! Pure I/O: reads a directory of `NNN_*.yaml`/`NNN_*.yml` files into an
//! ascending-version-ordered sequence of [`Task`]s. Never executes
//! anything; `env_from`/`store_env` are parsed but not evaluated.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use httpmig_task::{Task, Version};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)_.*\.(yaml|yml)$").expect("valid regex"))
}

/// Errors produced while loading a migration directory.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The directory could not be read.
    #[error("cannot read migration directory '{path}': {source}")]
    DirUnreadable {
        /// Directory path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A matched file could not be read.
    #[error("cannot read migration file '{path}': {source}")]
    FileUnreadable {
        /// File path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A matched file failed to parse as YAML.
    #[error("cannot parse migration file '{path}': {source}")]
    InvalidYaml {
        /// File path that failed to parse.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
    /// Two files declared the same version.
    #[error("duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        /// The version both files declared.
        version: Version,
        /// The first file encountered with this version.
        first: PathBuf,
        /// The second file encountered with this version.
        second: PathBuf,
    },
}

impl From<LoaderError> for httpmig_error::MigrationError {
    fn from(err: LoaderError) -> Self {
        use httpmig_error::{ErrorCode, MigrationError};
        let code = match &err {
            LoaderError::DirUnreadable { .. } | LoaderError::FileUnreadable { .. } => {
                ErrorCode::ConfigDirUnreadable
            }
            LoaderError::InvalidYaml { .. } => ErrorCode::ConfigInvalidYaml,
            LoaderError::DuplicateVersion { .. } => ErrorCode::ConfigDuplicateVersion,
        };
        let mut out = MigrationError::new(httpmig_error::ErrorCategory::Config, code, err.to_string());
        if let LoaderError::DuplicateVersion { version, .. } = &err {
            out = out.with_context("version", *version);
        }
        out
    }
}

/// Load every migration file in `dir`, returning `Task`s ordered by
/// ascending version. Files whose name does not match
/// `^(\d+)_.*\.(yaml|yml)$` are silently ignored.
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<Task>, LoaderError> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|source| LoaderError::DirUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<(Version, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoaderError::DirUnreadable {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(caps) = filename_pattern().captures(file_name) else {
            debug!(file = file_name, "ignoring non-matching file name");
            continue;
        };
        // The filename regex's first group is all-digits, so this only
        // fails on an implausibly large version number.
        let version: Version = caps[1].parse().unwrap_or(0);
        candidates.push((version, path));
    }

    candidates.sort_by_key(|(v, _)| *v);

    let mut tasks = Vec::with_capacity(candidates.len());
    let mut seen: Vec<(Version, PathBuf)> = Vec::new();
    for (version, path) in candidates {
        if let Some((_, first)) = seen.iter().find(|(v, _)| *v == version) {
            return Err(LoaderError::DuplicateVersion {
                version,
                first: first.clone(),
                second: path,
            });
        }
        let task = load_file(&path, version)?;
        seen.push((version, path));
        tasks.push(task);
    }

    Ok(tasks)
}

fn load_file(path: &Path, version: Version) -> Result<Task, LoaderError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoaderError::FileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut task: Task =
        serde_yaml::from_str(&contents).map_err(|source| LoaderError::InvalidYaml {
            path: path.to_path_buf(),
            source,
        })?;
    task.version = version;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const UP_ONLY: &str = r#"
up:
  name: create
  request:
    method: POST
    url: "https://example.com/create"
  response:
    result_code: ["200"]
"#;

    #[test]
    fn loads_and_orders_by_version() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("002_second.yaml"), UP_ONLY).unwrap();
        fs::write(dir.path().join("001_first.yaml"), UP_ONLY).unwrap();
        let tasks = load_dir(dir.path()).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].version, 1);
        assert_eq!(tasks[1].version, 2);
    }

    #[test]
    fn ignores_non_matching_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "hello").unwrap();
        fs::write(dir.path().join("not_numbered.yaml"), UP_ONLY).unwrap();
        fs::write(dir.path().join("001_first.yaml"), UP_ONLY).unwrap();
        let tasks = load_dir(dir.path()).unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn rejects_duplicate_versions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("001_a.yaml"), UP_ONLY).unwrap();
        fs::write(dir.path().join("001_b.yaml"), UP_ONLY).unwrap();
        let err = load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, LoaderError::DuplicateVersion { version: 1, .. }));
    }

    #[test]
    fn allows_gaps_in_version_sequence() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("001_a.yaml"), UP_ONLY).unwrap();
        fs::write(dir.path().join("010_b.yaml"), UP_ONLY).unwrap();
        let tasks = load_dir(dir.path()).unwrap();
        assert_eq!(tasks.iter().map(|t| t.version).collect::<Vec<_>>(), vec![1, 10]);
    }

    #[test]
    fn duplicate_version_converts_to_migration_error_with_context() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("001_a.yaml"), UP_ONLY).unwrap();
        fs::write(dir.path().join("001_b.yaml"), UP_ONLY).unwrap();
        let err = load_dir(dir.path()).unwrap_err();
        let migration_err: httpmig_error::MigrationError = err.into();
        assert_eq!(migration_err.category, httpmig_error::ErrorCategory::Config);
        assert_eq!(migration_err.context.get("version").unwrap(), &serde_json::json!(1));
    }

    #[test]
    fn rejects_invalid_yaml() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("001_bad.yaml"), "not: [valid").unwrap();
        let err = load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidYaml { .. }));
    }
}
