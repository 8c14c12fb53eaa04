// SPDX-License-Identifier: MIT OR Apache-2.0
//! The top-level `Migrator` orchestrator: planning, the up/down execution
//! loops, env propagation, catalog updates, dry-run previews, and
//! read-only status.
//!
//! Everything below it — the catalog, the task executor, the environment
//! and template renderer, the HTTP client, the migration loader — is a
//! leaf dependency this crate composes; `Migrator` itself holds no I/O
//! logic beyond calling into those crates in a fixed order.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod migrator;
mod outcome;
mod plan;

pub use error::MigratorError;
pub use migrator::{Migrator, MigratorConfig};
pub use outcome::{DryRunPreview, DryRunReport, RunOutcome, Status};
pub use plan::{plan_down, plan_up, AppliedSet};
