//! Run-log and direction types for the `migration_runs` table.

use chrono::{DateTime, Utc};
use httpmig_task::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which direction a recorded run executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// An `up` action.
    Up,
    /// A `down` action.
    Down,
}

impl Direction {
    /// The string stored in the run-log table's `direction` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Parse the run-log table's `direction` column back into a [`Direction`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            _ => None,
        }
    }
}

/// One row of the append-only run-log table: a record that a version's
/// action ran, whether it failed, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Migration version this run belongs to.
    pub version: Version,
    /// Direction executed.
    pub direction: Direction,
    /// Response status code, if the action reached the network (absent for
    /// a no-op down with no `down:` section).
    pub status_code: Option<u16>,
    /// Response body, present only when the caller requested it be saved.
    pub body: Option<String>,
    /// Values extracted per `env_from` (empty for down runs).
    pub extracted_env: BTreeMap<String, String>,
    /// `true` if the action did not complete successfully.
    pub failed: bool,
    /// Wall-clock time the run was recorded.
    pub ran_at: DateTime<Utc>,
}
