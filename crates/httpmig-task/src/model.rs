//! Task/version data model.

use crate::spec::{RequestSpec, ResponseSpec};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A migration version: the positive integer parsed from a migration
/// filename's leading numeric prefix. Versions are unique within a
/// directory; gaps are allowed.
pub type Version = u64;

/// The `up:` section of a migration file: a request plus its response
/// classification/extraction rules.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpAction {
    /// Diagnostic name for this action.
    pub name: String,
    /// The HTTP request to issue.
    pub request: RequestSpec,
    /// How to classify and extract from the response.
    #[serde(default)]
    pub response: ResponseSpec,
}

/// The `down:` section of a migration file: request only, no response
/// classification or extraction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownAction {
    /// Diagnostic name for this action.
    pub name: String,
    /// The HTTP request to issue.
    #[serde(flatten)]
    pub request: RequestSpec,
}

/// One migration file: an up action and an optional down action.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    /// Version parsed from the filename.
    #[serde(skip)]
    pub version: Version,
    /// The `up:` action. Always present.
    pub up: UpAction,
    /// The `down:` action, if the file defines one. A down task with no
    /// `down:` section is a no-op at execution time, not an error.
    #[serde(default)]
    pub down: Option<DownAction>,
    /// Whether to template-render the request body for this task's
    /// actions. `None` defers to the Migrator-level default.
    #[serde(default)]
    pub render_body: Option<bool>,
}

impl Task {
    /// Diagnostic name for the up action (`upName`).
    #[must_use]
    pub fn up_name(&self) -> &str {
        &self.up.name
    }

    /// Diagnostic name for the down action (`downName`), if any.
    #[must_use]
    pub fn down_name(&self) -> Option<&str> {
        self.down.as_ref().map(|d| d.name.as_str())
    }

    /// Resolve the effective `render_body` flag for a given request's own
    /// override, falling back to this task's default, then `migrator_default`.
    #[must_use]
    pub fn effective_render_body(
        &self,
        request_override: Option<bool>,
        migrator_default: bool,
    ) -> bool {
        request_override
            .or(self.render_body)
            .unwrap_or(migrator_default)
    }
}
