//! Result types returned from a run.

use httpmig_catalog::Direction;
use httpmig_task::Version;

/// The result of executing a single planned task's action.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Version the outcome belongs to.
    pub version: Version,
    /// Direction executed.
    pub direction: Direction,
    /// Response status code, if the action reached the network.
    pub status_code: Option<u16>,
    /// Values extracted from the response (empty for down).
    pub extracted_env: std::collections::BTreeMap<String, String>,
}

/// One planned-but-not-executed action, produced by [`crate::Migrator::dry_run_up`]
/// / [`crate::Migrator::dry_run_down`].
#[derive(Debug, Clone)]
pub struct DryRunPreview {
    /// Version this preview covers.
    pub version: Version,
    /// Direction that would execute.
    pub direction: Direction,
    /// Diagnostic action name.
    pub action_name: String,
    /// Rendered request method and URL, for display only.
    pub method: String,
    /// Rendered URL.
    pub url: String,
}

/// The full result of a dry run: every action that would have executed,
/// in execution order, with no catalog or network side effects.
#[derive(Debug, Clone, Default)]
pub struct DryRunReport {
    /// Previews in the order they would run.
    pub previews: Vec<DryRunPreview>,
}

/// A snapshot of catalog state, for read-only status reporting (not
/// itself a `Store` operation).
#[derive(Debug, Clone)]
pub struct Status {
    /// Highest applied version, or `None` if none applied.
    pub current_version: Option<Version>,
    /// Every applied version, ascending.
    pub applied: Vec<Version>,
    /// Number of loaded tasks not yet applied.
    pub pending_up: usize,
    /// Number of applied tasks (all of which are candidates for a down).
    pub pending_down: usize,
}
