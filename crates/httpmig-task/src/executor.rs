//! The task executor: assembles, renders, sends, and classifies one
//! up or down action.

use crate::json_path;
use crate::model::Task;
use crate::spec::{Body, RequestSpec};
use httpmig_env::{render, render_any, Env};
use httpmig_http::{execute_with_retry, RetryConfig};
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// What kind of response-classification failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskErrorKind {
    /// The response status code was not in the accepted set.
    UnexpectedStatus,
    /// The underlying transport failed.
    NetworkError,
}

/// A task execution failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("task execution failed ({kind:?}, code={code:?}): {message}")]
pub struct TaskError {
    /// Classification of the failure.
    pub kind: TaskErrorKind,
    /// Response status code, if one was received.
    pub code: Option<u16>,
    /// Response body, if one was received and capture was requested.
    pub body: Option<String>,
    /// Human-readable detail.
    pub message: String,
}

impl From<httpmig_env::TemplateError> for TaskError {
    fn from(e: httpmig_env::TemplateError) -> Self {
        TaskError {
            kind: TaskErrorKind::NetworkError,
            code: None,
            body: None,
            message: format!("template rendering failed: {e}"),
        }
    }
}

impl From<TaskError> for httpmig_error::MigrationError {
    fn from(err: TaskError) -> Self {
        use httpmig_error::{ErrorCategory, ErrorCode, MigrationError};
        let code = match err.kind {
            TaskErrorKind::UnexpectedStatus => ErrorCode::TaskUnexpectedStatus,
            TaskErrorKind::NetworkError => ErrorCode::NetworkTransportFailed,
        };
        let mut out = MigrationError::new(ErrorCategory::Task, code, err.message.clone());
        if let Some(status) = err.code {
            out = out.with_context("status_code", status);
        }
        out
    }
}

/// The outcome of a successful up or down execution.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Response status code.
    pub status_code: u16,
    /// Response body, if `save_body` was requested.
    pub body: Option<String>,
    /// Values extracted per `env_from` (up only; empty for down).
    pub extracted_env: BTreeMap<String, String>,
}

/// Executes the up and down actions of a [`Task`] against a live HTTP
/// client.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    client: Client,
    default_retry: RetryConfig,
}

impl TaskExecutor {
    /// Build an executor around an already-configured client.
    #[must_use]
    pub fn new(client: Client, default_retry: RetryConfig) -> Self {
        Self {
            client,
            default_retry,
        }
    }

    /// Execute `task`'s up action.
    ///
    /// `save_body` controls whether the response body is retained on the
    /// returned [`TaskResult`]; `render_body_default` is the
    /// Migrator-level default used when neither the request nor the task
    /// overrides it.
    #[instrument(skip(self, env), fields(version = task.version, up_name = task.up_name()))]
    pub async fn execute_up(
        &self,
        task: &Task,
        env: &Env,
        save_body: bool,
        render_body_default: bool,
    ) -> Result<TaskResult, TaskError> {
        let request = &task.up.request;
        let render_body =
            task.effective_render_body(request.render_body, render_body_default);

        let (url, headers, queries, body) =
            render_request(request, env, render_body)?;

        let token = request
            .auth_name
            .as_deref()
            .and_then(|name| env.lookup_auth(name));

        let response = self
            .send(request, &url, &headers, &queries, body.as_deref(), token)
            .await?;

        let code = response.status().as_u16();
        let response_body = response.text().await.map_err(|e| TaskError {
            kind: TaskErrorKind::NetworkError,
            code: Some(code),
            body: None,
            message: format!("failed to read response body: {e}"),
        })?;

        if !task.up.response.accepts(code) {
            warn!(code, "unexpected status code");
            return Err(TaskError {
                kind: TaskErrorKind::UnexpectedStatus,
                code: Some(code),
                body: Some(response_body),
                message: format!("status {code} not in accepted set"),
            });
        }

        let extracted_env = extract_env_from(&response_body, &task.up.response.env_from);

        debug!(code, extracted = extracted_env.len(), "up task succeeded");

        Ok(TaskResult {
            status_code: code,
            body: save_body.then(|| response_body),
            extracted_env,
        })
    }

    /// Execute `task`'s down action. A missing
    /// `down:` section is a no-op, not an error: callers check
    /// `task.down.is_some()` before invoking this and otherwise treat the
    /// version as trivially rolled back.
    #[instrument(skip(self, env), fields(version = task.version))]
    pub async fn execute_down(
        &self,
        task: &Task,
        env: &Env,
        save_body: bool,
    ) -> Result<TaskResult, TaskError> {
        let Some(down) = &task.down else {
            return Ok(TaskResult {
                status_code: 0,
                body: None,
                extracted_env: BTreeMap::new(),
            });
        };

        let render_body = task.effective_render_body(down.request.render_body, false);
        let (url, headers, queries, body) = render_request(&down.request, env, render_body)?;

        let token = down
            .request
            .auth_name
            .as_deref()
            .and_then(|name| env.lookup_auth(name));

        let response = self
            .send(&down.request, &url, &headers, &queries, body.as_deref(), token)
            .await?;

        let code = response.status().as_u16();
        let response_body = response.text().await.unwrap_or_default();

        debug!(code, "down task completed");

        Ok(TaskResult {
            status_code: code,
            body: save_body.then_some(response_body),
            extracted_env: BTreeMap::new(),
        })
    }

    async fn send(
        &self,
        request: &RequestSpec,
        url: &str,
        headers: &[(String, String)],
        queries: &BTreeMap<String, String>,
        body: Option<&str>,
        auth_token: Option<&str>,
    ) -> Result<reqwest::Response, TaskError> {
        let retry = request.retry.clone().unwrap_or_else(|| self.default_retry.clone());
        let method = request.method.to_reqwest();

        execute_with_retry(&retry, || {
            let mut builder = self.client.request(method.clone(), url).query(queries);
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            if let Some(token) = auth_token {
                builder = builder.header("Authorization", token);
            }
            if let Some(b) = body {
                builder = builder.body(b.to_string());
            }
            builder.send()
        })
        .await
        .map_err(|e| TaskError {
            kind: TaskErrorKind::NetworkError,
            code: None,
            body: None,
            message: format!("request failed: {e}"),
        })
    }
}

type RenderedRequest = (String, Vec<(String, String)>, BTreeMap<String, String>, Option<String>);

fn render_request(
    request: &RequestSpec,
    env: &Env,
    render_body: bool,
) -> Result<RenderedRequest, TaskError> {
    let url = render(&request.url, env)?;

    let mut headers = Vec::with_capacity(request.headers.len());
    for h in &request.headers {
        headers.push((h.name.clone(), render(&h.value, env)?));
    }

    let mut queries = BTreeMap::new();
    for (k, v) in &request.queries {
        queries.insert(k.clone(), render(v, env)?);
    }

    let body = match &request.body {
        Body::None => None,
        Body::Text(text) => Some(if render_body {
            render(text, env)?
        } else {
            text.clone()
        }),
        Body::Structured(value) => {
            let rendered = if render_body {
                render_any(value, env)?
            } else {
                value.clone()
            };
            Some(serde_json::to_string(&rendered).map_err(|e| TaskError {
                kind: TaskErrorKind::NetworkError,
                code: None,
                body: None,
                message: format!("failed to serialize body: {e}"),
            })?)
        }
    };

    Ok((url, headers, queries, body))
}

fn extract_env_from(
    body: &str,
    env_from: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if env_from.is_empty() {
        return out;
    }
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or(serde_json::Value::Null);
    for (key, path) in env_from {
        let value = json_path::extract(&parsed, path).unwrap_or_default();
        out.insert(key.clone(), value);
    }
    out
}
