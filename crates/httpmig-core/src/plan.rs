//! Up/down planning: pure set difference over the loaded tasks and the
//! catalog's applied set. 0 means "no target cap" (all pending for up;
//! down to nothing for down).

use httpmig_task::{Task, Version};

/// Versions currently applied, as plain integers — planning only needs
/// set membership, not the catalog handle itself.
pub type AppliedSet<'a> = &'a [Version];

/// Plan an up run: every task not yet applied, capped at `to` (0 = no
/// cap), ascending.
pub fn plan_up<'a>(tasks: &'a [Task], applied: AppliedSet<'_>, to: Version) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| !applied.contains(&t.version) && (to == 0 || t.version <= to))
        .collect()
}

/// Plan a down run: every applied task with version greater than `to`,
/// descending.
pub fn plan_down<'a>(tasks: &'a [Task], applied: AppliedSet<'_>, to: Version) -> Vec<&'a Task> {
    let mut plan: Vec<&Task> = tasks
        .iter()
        .filter(|t| applied.contains(&t.version) && t.version > to)
        .collect();
    plan.sort_by(|a, b| b.version.cmp(&a.version));
    plan
}
