//! Three-layer env context: `global`, `local`, `auth`.

use std::collections::BTreeMap;

/// Request-scoped, mutable context threaded through a migration run.
///
/// `global` is seeded once from configuration and never mutated by task
/// execution. `local` starts empty at the beginning of every task and
/// accumulates values extracted from responses (plus stored-env rows
/// loaded from the catalog) as the run progresses. `auth` is populated
/// once at configuration decode time and is read-only for the lifetime of
/// a run.
#[derive(Debug, Clone, Default)]
pub struct Env {
    /// Seeded from configuration; constant for the run.
    pub global: BTreeMap<String, String>,
    /// Extracted/stored values; reset per task, merged forward.
    pub local: BTreeMap<String, String>,
    /// Opaque auth tokens keyed by logical name.
    pub auth: BTreeMap<String, String>,
}

impl Env {
    /// Build an `Env` seeded with the given global map; `local` and `auth`
    /// start empty.
    #[must_use]
    pub fn with_global(global: BTreeMap<String, String>) -> Self {
        Self {
            global,
            local: BTreeMap::new(),
            auth: BTreeMap::new(),
        }
    }

    /// Resolve `.env.K`: local takes precedence over global.
    #[must_use]
    pub fn lookup_env(&self, key: &str) -> Option<&str> {
        self.local
            .get(key)
            .or_else(|| self.global.get(key))
            .map(String::as_str)
    }

    /// Resolve `.auth.N`.
    #[must_use]
    pub fn lookup_auth(&self, name: &str) -> Option<&str> {
        self.auth.get(name).map(String::as_str)
    }

    /// Clear `local` at the start of a new task.
    pub fn reset_local(&mut self) {
        self.local.clear();
    }

    /// Merge `kv` into `local`; later values win on key collision.
    pub fn merge_local(&mut self, kv: impl IntoIterator<Item = (String, String)>) {
        self.local.extend(kv);
    }
}
