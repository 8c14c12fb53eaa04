//! The top-level orchestrator: planning, the up/down execution loops, env
//! propagation, catalog updates, dry-run, and status.

use crate::error::MigratorError;
use crate::outcome::{DryRunPreview, DryRunReport, RunOutcome, Status};
use crate::plan::{plan_down, plan_up};
use chrono::Utc;
use httpmig_catalog::{CatalogRetryConfig, Direction, Run, Store, StoreError};
use httpmig_env::{render, Env};
use httpmig_http::{build_client, ClientConfig, RetryConfig};
use httpmig_task::{Task, TaskExecutor, Version};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Immutable configuration a [`Migrator`] is built from.
pub struct MigratorConfig {
    /// Directory `httpmig_loader::load_dir` reads migration files from.
    pub dir: PathBuf,
    /// Seed environment: `global` and `auth` layers, populated once by the
    /// external collaborator before the run starts. Auth is never mutated
    /// by task execution.
    pub env0: Env,
    /// Whether response bodies are retained on recorded runs.
    pub save_body: bool,
    /// Default `render_body` used when neither the request nor the task
    /// overrides it.
    pub render_body_default: bool,
    /// HTTP client configuration, bound from the `client:` config block.
    pub client: ClientConfig,
    /// Default per-request retry policy, overridable per request.
    pub retry: RetryConfig,
    /// Retry policy wrapped around every catalog call, for the subset of
    /// driver failures classified transient.
    pub catalog_retry: CatalogRetryConfig,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            env0: Env::default(),
            save_body: false,
            render_body_default: false,
            client: ClientConfig::default(),
            retry: RetryConfig::default(),
            catalog_retry: CatalogRetryConfig::default(),
        }
    }
}

/// Applies and reverts versioned HTTP migrations against a persistent
/// catalog. Tasks are immutable once loaded at construction time, and the
/// catalog is brought up to date at the start of every operation that
/// touches it.
pub struct Migrator {
    tasks: Vec<Task>,
    store: Arc<dyn Store>,
    executor: TaskExecutor,
    env0: Env,
    save_body: bool,
    render_body_default: bool,
    catalog_retry: CatalogRetryConfig,
}

impl Migrator {
    /// Load migrations from `config.dir` and build the HTTP client. Does
    /// not touch the catalog; [`Store::ensure`] runs lazily at the start
    /// of the first operation that needs it.
    ///
    /// # Errors
    ///
    /// Returns [`MigratorError::Loader`] if the migration directory fails
    /// to load, or [`MigratorError::Http`] if the client cannot be built
    /// from `config.client`.
    pub fn open(config: MigratorConfig, store: Arc<dyn Store>) -> Result<Self, MigratorError> {
        let tasks = httpmig_loader::load_dir(&config.dir)?;
        let client = build_client(&config.client)?;
        let executor = TaskExecutor::new(client, config.retry);
        Ok(Self {
            tasks,
            store,
            executor,
            env0: config.env0,
            save_body: config.save_body,
            render_body_default: config.render_body_default,
            catalog_retry: config.catalog_retry,
        })
    }

    /// Build a `Migrator` around an already-constructed executor, for
    /// callers (tests, or an embedding CLI reusing one client across
    /// migrators) that want to bypass [`Self::open`]'s client build.
    pub fn with_executor(
        dir: impl AsRef<Path>,
        env0: Env,
        store: Arc<dyn Store>,
        executor: TaskExecutor,
        save_body: bool,
        render_body_default: bool,
    ) -> Result<Self, MigratorError> {
        let tasks = httpmig_loader::load_dir(dir)?;
        Ok(Self {
            tasks,
            store,
            executor,
            env0,
            save_body,
            render_body_default,
            catalog_retry: CatalogRetryConfig::default(),
        })
    }

    /// Run a single catalog call with the §5 retry policy, retrying only
    /// on [`StoreError::Transient`]; a fatal or cap-exceeded failure
    /// propagates immediately.
    async fn store_retry<T, F, Fut>(&self, op: F) -> Result<T, MigratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        httpmig_catalog::retry_store(&self.catalog_retry, op)
            .await
            .map_err(MigratorError::from)
    }

    /// The loaded tasks, in ascending version order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Run every pending up migration at or below `to` (0 = no cap),
    /// recording a run row and mutating the applied set after each
    /// success. Aborts on the first failure without marking that
    /// version applied; everything recorded before the failure stays.
    ///
    /// # Errors
    ///
    /// Returns [`MigratorError::Store`] on a catalog failure, or
    /// [`MigratorError::Task`] when a planned task's up action fails.
    #[instrument(skip(self))]
    pub async fn run_up(&self, to: Version) -> Result<Vec<RunOutcome>, MigratorError> {
        self.store_retry(|| self.store.ensure()).await?;
        let applied = self.store_retry(|| self.store.list_applied()).await?;
        let plan = plan_up(&self.tasks, &applied, to);
        info!(planned = plan.len(), "planning up run");

        let mut outcomes = Vec::with_capacity(plan.len());
        let mut carry = self.env0.clone();

        for task in plan {
            let mut env = carry.clone();
            let stored = self.cumulative_stored_env(task.version, false).await?;
            env.merge_local(stored);

            match self
                .executor
                .execute_up(task, &env, self.save_body, self.render_body_default)
                .await
            {
                Err(source) => {
                    error!(version = task.version, "up migration failed");
                    let run = Run {
                        version: task.version,
                        direction: Direction::Up,
                        status_code: source.code,
                        body: source.body.clone(),
                        extracted_env: BTreeMap::new(),
                        failed: true,
                        ran_at: Utc::now(),
                    };
                    self.store_retry(|| self.store.record_run(run.clone())).await?;
                    return Err(MigratorError::Task {
                        version: task.version,
                        source,
                    });
                }
                Ok(result) => {
                    let run = Run {
                        version: task.version,
                        direction: Direction::Up,
                        status_code: Some(result.status_code),
                        body: result.body.clone(),
                        extracted_env: result.extracted_env.clone(),
                        failed: false,
                        ran_at: Utc::now(),
                    };
                    self.store_retry(|| self.store.record_run(run.clone())).await?;

                    let store_keys = task.up.response.effective_store_keys();
                    let to_store: BTreeMap<String, String> = result
                        .extracted_env
                        .iter()
                        .filter(|(k, _)| store_keys.contains(k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    if !to_store.is_empty() {
                        self.store_retry(|| self.store.insert_stored_env(task.version, to_store.clone()))
                            .await?;
                    }
                    self.store_retry(|| self.store.apply(task.version)).await?;

                    carry.merge_local(result.extracted_env.clone());
                    outcomes.push(RunOutcome {
                        version: task.version,
                        direction: Direction::Up,
                        status_code: Some(result.status_code),
                        extracted_env: result.extracted_env,
                    });
                }
            }
        }

        Ok(outcomes)
    }

    /// Revert every applied down migration above `to` (0 = revert
    /// everything), in descending version order. A task with no
    /// `down:` section is a no-op request but still deletes stored env and
    /// un-applies the version.
    ///
    /// # Errors
    ///
    /// Returns [`MigratorError::Store`] on a catalog failure, or
    /// [`MigratorError::Task`] when a planned task's down action fails.
    #[instrument(skip(self))]
    pub async fn run_down(&self, to: Version) -> Result<Vec<RunOutcome>, MigratorError> {
        self.store_retry(|| self.store.ensure()).await?;
        let applied = self.store_retry(|| self.store.list_applied()).await?;
        let plan = plan_down(&self.tasks, &applied, to);
        info!(planned = plan.len(), "planning down run");

        let mut outcomes = Vec::with_capacity(plan.len());

        for task in plan {
            let mut env = self.env0.clone();
            env.reset_local();
            let stored = self.cumulative_stored_env(task.version, true).await?;
            env.merge_local(stored);

            match self.executor.execute_down(task, &env, self.save_body).await {
                Err(source) => {
                    error!(version = task.version, "down migration failed");
                    let run = Run {
                        version: task.version,
                        direction: Direction::Down,
                        status_code: source.code,
                        body: source.body.clone(),
                        extracted_env: BTreeMap::new(),
                        failed: true,
                        ran_at: Utc::now(),
                    };
                    self.store_retry(|| self.store.record_run(run.clone())).await?;
                    return Err(MigratorError::Task {
                        version: task.version,
                        source,
                    });
                }
                Ok(result) => {
                    let run = Run {
                        version: task.version,
                        direction: Direction::Down,
                        status_code: (result.status_code != 0).then_some(result.status_code),
                        body: result.body.clone(),
                        extracted_env: BTreeMap::new(),
                        failed: false,
                        ran_at: Utc::now(),
                    };
                    self.store_retry(|| self.store.record_run(run.clone())).await?;
                    self.store_retry(|| self.store.delete_stored_env(task.version)).await?;
                    self.store_retry(|| self.store.remove(task.version)).await?;

                    outcomes.push(RunOutcome {
                        version: task.version,
                        direction: Direction::Down,
                        status_code: (result.status_code != 0).then_some(result.status_code),
                        extracted_env: BTreeMap::new(),
                    });
                }
            }
        }

        Ok(outcomes)
    }

    /// Preview an up run without issuing requests or touching the catalog.
    /// `from` lets a caller simulate planning as though the
    /// current version were `from` instead of the catalog's real current
    /// version — the `dryRunFrom` hook.
    ///
    /// # Errors
    ///
    /// Returns [`MigratorError::Store`] if the applied set cannot be read,
    /// or surfaces a rendering failure by omitting that preview's URL
    /// (rendering errors during a dry run are not fatal to the rest of the
    /// preview).
    pub async fn dry_run_up(
        &self,
        to: Version,
        from: Option<Version>,
    ) -> Result<DryRunReport, MigratorError> {
        let applied: Vec<Version> = match from {
            Some(v) => self.tasks.iter().map(|t| t.version).filter(|x| *x <= v).collect(),
            None => {
                self.store_retry(|| self.store.ensure()).await?;
                self.store_retry(|| self.store.list_applied()).await?
            }
        };
        let plan = plan_up(&self.tasks, &applied, to);

        let mut previews = Vec::with_capacity(plan.len());
        let mut carry = self.env0.clone();
        for task in plan {
            let mut env = carry.clone();
            let stored = self.cumulative_stored_env(task.version, false).await?;
            env.merge_local(stored);

            let url = render(&task.up.request.url, &env).unwrap_or_else(|_| task.up.request.url.clone());
            previews.push(DryRunPreview {
                version: task.version,
                direction: Direction::Up,
                action_name: task.up_name().to_string(),
                method: format!("{:?}", task.up.request.method).to_uppercase(),
                url,
            });
        }

        Ok(DryRunReport { previews })
    }

    /// Preview a down run without issuing requests or touching the
    /// catalog, symmetric with [`Self::dry_run_up`].
    ///
    /// # Errors
    ///
    /// Returns [`MigratorError::Store`] if the applied set cannot be read.
    pub async fn dry_run_down(&self, to: Version) -> Result<DryRunReport, MigratorError> {
        self.store_retry(|| self.store.ensure()).await?;
        let applied = self.store_retry(|| self.store.list_applied()).await?;
        let plan = plan_down(&self.tasks, &applied, to);

        let mut previews = Vec::with_capacity(plan.len());
        for task in plan {
            let mut env = self.env0.clone();
            env.reset_local();
            let stored = self.cumulative_stored_env(task.version, true).await?;
            env.merge_local(stored);

            let Some(down) = &task.down else {
                previews.push(DryRunPreview {
                    version: task.version,
                    direction: Direction::Down,
                    action_name: "(no-op: no down section)".to_string(),
                    method: String::new(),
                    url: String::new(),
                });
                continue;
            };
            let url = render(&down.request.url, &env).unwrap_or_else(|_| down.request.url.clone());
            previews.push(DryRunPreview {
                version: task.version,
                direction: Direction::Down,
                action_name: down.name.clone(),
                method: format!("{:?}", down.request.method).to_uppercase(),
                url,
            });
        }

        Ok(DryRunReport { previews })
    }

    /// Current catalog state composed with the loaded task list: a
    /// read-only convenience for a `status` subcommand, not itself a
    /// `Store` operation.
    ///
    /// # Errors
    ///
    /// Returns [`MigratorError::Store`] if the catalog cannot be read.
    pub async fn status(&self) -> Result<Status, MigratorError> {
        self.store_retry(|| self.store.ensure()).await?;
        let applied = self.store_retry(|| self.store.list_applied()).await?;
        let current_version = self.store_retry(|| self.store.current_version()).await?;
        let pending_up = self
            .tasks
            .iter()
            .filter(|t| !applied.contains(&t.version))
            .count();
        Ok(Status {
            current_version,
            pending_up,
            pending_down: applied.len(),
            applied,
        })
    }

    /// Union of stored-env rows across tasks relative to `version`, later
    /// (higher) versions overwriting earlier ones. `inclusive` selects
    /// `<= version` (down) vs. `< version` (up).
    async fn cumulative_stored_env(
        &self,
        version: Version,
        inclusive: bool,
    ) -> Result<BTreeMap<String, String>, MigratorError> {
        let mut merged = BTreeMap::new();
        for task in &self.tasks {
            let in_range = if inclusive {
                task.version <= version
            } else {
                task.version < version
            };
            if !in_range {
                continue;
            }
            let entries = self.store_retry(|| self.store.load_stored_env(task.version)).await?;
            merged.extend(entries);
        }
        Ok(merged)
    }
}
