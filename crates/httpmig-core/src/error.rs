//! Migrator-level error type.

use httpmig_task::Version;

/// An error returned by a `Migrator` operation. Every variant is fatal to
/// the run that produced it; the catalog remains a reliable record of
/// whatever completed before the failure.
#[derive(Debug, thiserror::Error)]
pub enum MigratorError {
    /// The migration directory could not be loaded.
    #[error("failed to load migrations: {0}")]
    Loader(#[from] httpmig_loader::LoaderError),
    /// The HTTP client could not be built from its configuration.
    #[error("failed to build http client: {0}")]
    Http(#[from] httpmig_http::HttpError),
    /// A catalog operation failed.
    #[error("catalog error: {0}")]
    Store(#[from] httpmig_catalog::StoreError),
    /// A task's up or down action failed.
    #[error("migration {version} failed: {source}")]
    Task {
        /// Version whose action failed.
        version: Version,
        /// The underlying task error.
        #[source]
        source: httpmig_task::TaskError,
    },
}

impl From<MigratorError> for httpmig_error::MigrationError {
    /// Compose the per-crate conversions already defined at each boundary
    /// into the one taxonomy a CLI front end ultimately sees, attaching
    /// the failing version as context when one is known — every error
    /// bubbles to the Migrator and is returned verbatim.
    fn from(err: MigratorError) -> Self {
        match err {
            MigratorError::Loader(e) => e.into(),
            MigratorError::Http(e) => e.into(),
            MigratorError::Store(e) => e.into(),
            MigratorError::Task { version, source } => {
                let base: httpmig_error::MigrationError = source.into();
                base.with_context("version", version)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmig_task::{TaskError, TaskErrorKind};

    #[test]
    fn task_error_carries_version_context_through_conversion() {
        let err = MigratorError::Task {
            version: 3,
            source: TaskError {
                kind: TaskErrorKind::UnexpectedStatus,
                code: Some(500),
                body: None,
                message: "status 500 not in accepted set".to_string(),
            },
        };
        let migration_err: httpmig_error::MigrationError = err.into();
        assert_eq!(migration_err.category, httpmig_error::ErrorCategory::Task);
        assert_eq!(migration_err.context.get("version").unwrap(), &serde_json::json!(3));
    }
}
