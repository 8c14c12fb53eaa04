// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy for the HTTP migration engine.
//!
//! Every error the engine returns to its caller carries an [`ErrorCategory`],
//! a stable machine-readable [`ErrorCode`], a human-readable message, and
//! arbitrary key-value context. Individual crates define their own narrow
//! `thiserror` enums and convert into [`MigrationError`] at their boundary;
//! this type is the one the `Migrator` ultimately returns.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Broad family an [`ErrorCode`] belongs to: `ConfigError`, `TemplateError`
/// / `SecurityError`, `NetworkError`, `UnexpectedStatus`, `StoreTransient`,
/// `StoreError`, `AuthError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Migration-directory loading or file-format errors.
    Config,
    /// Template rendering errors (undefined-but-tolerated cases excluded).
    Template,
    /// Template security-validation rejections.
    Security,
    /// Transient or persistent network/transport errors.
    Network,
    /// Task-level execution errors (unexpected status code, etc).
    Task,
    /// Catalog errors expected to clear on retry.
    StoreTransient,
    /// Catalog errors that are fatal to the run.
    Store,
    /// Auth-method construction or token-acquisition errors.
    Auth,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Template => "template",
            Self::Security => "security",
            Self::Network => "network",
            Self::Task => "task",
            Self::StoreTransient => "store_transient",
            Self::Store => "store",
            Self::Auth => "auth",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Machine-readable, stable error code.
///
/// Each variant serializes to a `SCREAMING_SNAKE_CASE` string that will not
/// change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Config --
    /// Migration directory could not be read.
    ConfigDirUnreadable,
    /// Two migration files declared the same version.
    ConfigDuplicateVersion,
    /// A migration file failed to parse as YAML.
    ConfigInvalidYaml,

    // -- Template / Security --
    /// Template referenced an undefined function or malformed syntax.
    TemplateParseFailed,
    /// Template text failed a security-validation check.
    SecurityRejected,

    // -- Network --
    /// The underlying transport failed (connection refused, DNS, etc).
    NetworkTransportFailed,
    /// The request exceeded its configured timeout.
    NetworkTimeout,

    // -- Task --
    /// Response status code was not in the task's accepted set.
    TaskUnexpectedStatus,
    /// `env_from` path extraction failed in a way the task marked required.
    TaskExtractionFailed,

    // -- Store --
    /// Catalog operation failed but is expected to succeed on retry.
    StoreTransientFailure,
    /// Catalog operation failed fatally.
    StoreOperationFailed,
    /// Stored-env insertion exceeded the per-version key cap.
    StoreCapExceeded,

    // -- Auth --
    /// No registered constructor for the requested auth type.
    AuthUnknownType,
    /// Auth method failed to acquire a token.
    AuthAcquisitionFailed,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The engine-wide error type returned across crate boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationError {
    /// Broad category.
    pub category: ErrorCategory,
    /// Stable machine-readable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Arbitrary structured context (file paths, versions, status codes...).
    pub context: BTreeMap<String, serde_json::Value>,
}

impl MigrationError {
    /// Start building a new error of the given category/code.
    #[must_use]
    pub fn new(category: ErrorCategory, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Attach a context key-value pair, returning `self` for chaining.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// `true` if this error's category is expected to clear on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.category, ErrorCategory::StoreTransient)
            || (self.category == ErrorCategory::Network
                && self.code == ErrorCode::NetworkTransportFailed)
    }
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.category, self.code, self.message)
    }
}

impl std::error::Error for MigrationError {}
