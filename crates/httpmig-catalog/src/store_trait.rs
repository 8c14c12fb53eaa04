//! The backend-agnostic catalog trait.

use crate::model::{Direction, Run};
use async_trait::async_trait;
use httpmig_task::Version;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors a [`Store`] implementation may return. Transport-layer failures
/// that are expected to clear on retry are distinguished from fatal ones so
/// callers can decide whether to retry the catalog operation itself.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying connection or query failed, but the same operation
    /// is expected to succeed if retried (connection reset, pool exhausted).
    #[error("transient catalog failure: {0}")]
    Transient(String),
    /// The underlying connection or query failed in a way retrying will not
    /// fix (schema mismatch, constraint violation, malformed SQL).
    #[error("catalog failure: {0}")]
    Fatal(String),
    /// A stored-env insertion would exceed the per-version key cap.
    #[error("stored-env key cap exceeded for version {version}: {attempted} keys, cap is {cap}")]
    CapExceeded {
        /// Version the insertion targeted.
        version: Version,
        /// Number of keys the insertion attempted to write.
        attempted: usize,
        /// The configured cap.
        cap: usize,
    },
}

impl StoreError {
    /// `true` if retrying the same operation is expected to succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<StoreError> for httpmig_error::MigrationError {
    fn from(err: StoreError) -> Self {
        use httpmig_error::{ErrorCategory, ErrorCode, MigrationError};
        match &err {
            StoreError::Transient(_) => {
                MigrationError::new(ErrorCategory::StoreTransient, ErrorCode::StoreTransientFailure, err.to_string())
            }
            StoreError::Fatal(_) => {
                MigrationError::new(ErrorCategory::Store, ErrorCode::StoreOperationFailed, err.to_string())
            }
            StoreError::CapExceeded { version, .. } => {
                MigrationError::new(ErrorCategory::Store, ErrorCode::StoreCapExceeded, err.to_string())
                    .with_context("version", *version)
            }
        }
    }
}

/// The persistent catalog of applied versions, run history, and stored env,
/// shared by the SQLite and PostgreSQL backends. All operations are
/// keyed by the caller-resolved [`crate::tables::TableNames`] baked into
/// the concrete implementation at construction time.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create the catalog's tables if they do not already exist, and bring
    /// an existing catalog's internal schema up to date via its own
    /// internal schema-versioning.
    async fn ensure(&self) -> Result<(), StoreError>;

    /// Record `version` as applied.
    async fn apply(&self, version: Version) -> Result<(), StoreError>;

    /// Remove `version` from the applied set.
    async fn remove(&self, version: Version) -> Result<(), StoreError>;

    /// `true` if `version` is currently recorded as applied.
    async fn is_applied(&self, version: Version) -> Result<bool, StoreError>;

    /// The highest applied version, or `None` if no version is applied.
    async fn current_version(&self) -> Result<Option<Version>, StoreError>;

    /// Every applied version, ascending.
    async fn list_applied(&self) -> Result<Vec<Version>, StoreError>;

    /// Forcibly set the applied set to exactly `{v : v <= version}` — used
    /// only by out-of-band administrative repair, not by normal plan/run.
    async fn set_version(&self, version: Version) -> Result<(), StoreError>;

    /// Append a run-log row.
    async fn record_run(&self, run: Run) -> Result<(), StoreError>;

    /// Every run-log row, in insertion order.
    async fn list_runs(&self) -> Result<Vec<Run>, StoreError>;

    /// The `extracted_env` recorded on the most recent run matching
    /// `(version, direction)`, or `None` if no such run has been recorded.
    async fn load_env(
        &self,
        version: Version,
        direction: Direction,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError>;

    /// Persist `entries` for `version`. Rejected with
    /// [`StoreError::CapExceeded`] if `entries` would push this version's
    /// total stored-env key count past the configured cap.
    async fn insert_stored_env(
        &self,
        version: Version,
        entries: BTreeMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Load the stored-env entries for a single version.
    async fn load_stored_env(&self, version: Version) -> Result<BTreeMap<String, String>, StoreError>;

    /// Delete every stored-env entry for `version` (called on revert).
    async fn delete_stored_env(&self, version: Version) -> Result<(), StoreError>;
}
