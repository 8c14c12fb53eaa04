// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP migration engine: applies and reverts versioned HTTP migrations
//! against a persistent catalog, with values extracted from responses
//! propagated into later migrations and their down counterparts.
//!
//! This crate re-exports the public surface of the workspace's small,
//! single-purpose crates so a consumer (the CLI front end, configuration
//! loader, and auth-provider registry all stay external per the scope
//! note below) depends on one crate instead of eight. It adds no logic of
//! its own.
//!
//! The core is three tightly coupled subsystems: the [`Migrator`]
//! orchestrator (planning, up/down execution, rollback, dry-run), the
//! persistent [`Store`] catalog (two interchangeable backends), and the
//! [`TaskExecutor`] (HTTP request assembly, rendering, response
//! classification, extraction). The CLI front end, configuration-file
//! loading, multi-stage orchestration across directories, and the
//! auth-provider plugin registry are external collaborators this crate
//! depends on only through the [`AuthMethod`] contract.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use httpmig_auth::{AuthConstructor, AuthEntry, AuthError, AuthMethod, AuthRegistry};
pub use httpmig_error::{ErrorCategory, ErrorCode, MigrationError};
pub use httpmig_catalog::{
    validate_identifier, CatalogRetryConfig, Dialect, Direction, PostgresConfig, PostgresStore, Run,
    SqliteConfig, SqliteStore, Store, StoreConfig, StoreConfigError, StoreError, StoreKind,
    TableNames, STORED_ENV_KEY_CAP,
};
pub use httpmig_core::{
    plan_down, plan_up, AppliedSet, DryRunPreview, DryRunReport, Migrator, MigratorConfig,
    MigratorError, RunOutcome, Status,
};
pub use httpmig_env::{
    render, render_any, security, Env, EnvConfigError, EnvEntry, EnvSpec, SecurityError,
    TemplateError,
};
pub use httpmig_http::{
    build_client, compute_delay, execute_with_retry, is_retryable_status, ClientConfig, HttpError,
    RetryConfig, TlsVersion,
};
pub use httpmig_loader::{load_dir, LoaderError};
pub use httpmig_task::{
    extract_json_path, Body, DownAction, HeaderEntry, Method, RequestSpec, ResponseSpec, Task,
    TaskError, TaskErrorKind, TaskExecutor, TaskResult, UpAction, Version,
};
