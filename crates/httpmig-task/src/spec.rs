//! Request/response spec types matching the migration-file YAML shape.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// HTTP method a request spec may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
    /// PATCH.
    Patch,
    /// HEAD.
    Head,
}

impl Method {
    /// Convert to the `reqwest` method type.
    #[must_use]
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Patch => reqwest::Method::PATCH,
            Self::Head => reqwest::Method::HEAD,
        }
    }
}

/// A single `name`/`value` header pair; `value` is rendered.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeaderEntry {
    /// Header name.
    pub name: String,
    /// Header value, templated against `env`.
    pub value: String,
}

/// A request body: a bare string or a structured (JSON-like) value.
/// Either form is templated when `render_body` is true — a string body is
/// rendered directly; a structured body is rendered leaf-by-leaf via
/// `render_any`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Body {
    /// No body.
    None,
    /// A bare string body.
    Text(String),
    /// A structured (JSON object/array/scalar) body.
    Structured(serde_json::Value),
}

impl Default for Body {
    fn default() -> Self {
        Body::None
    }
}

/// One request spec: method, URL, headers, query params, body, and the
/// logical auth token reference.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestSpec {
    /// HTTP method.
    pub method: Method,
    /// Request URL, templated.
    pub url: String,
    /// Logical auth-token reference into `env.auth`. Accepts either the
    /// `auth_name` key (up requests) or the `auth` key (down actions) —
    /// migration files use both spellings for the same concept.
    #[serde(default, alias = "auth")]
    pub auth_name: Option<String>,
    /// Headers, each rendered before sending.
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,
    /// Query parameters, each value rendered before sending.
    #[serde(default)]
    pub queries: BTreeMap<String, String>,
    /// Request body.
    #[serde(default)]
    pub body: Body,
    /// Whether to template-render the body. `None` defers to the
    /// Migrator-level default (`Task::render_body`).
    #[serde(default)]
    pub render_body: Option<bool>,
    /// Per-request retry override; `None` defers to the client-level
    /// default retry policy.
    #[serde(default)]
    pub retry: Option<httpmig_http::RetryConfig>,
}

/// Response spec (up requests only): acceptable status codes and the
/// `env_from` / `store_env` extraction rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSpec {
    /// Acceptable status codes. Entries may be exact (`"200"`) or a
    /// wildcard family (`"2xx"`). Empty means "any 2xx".
    #[serde(default)]
    pub result_code: Vec<String>,
    /// `new-env-key -> json-path` extraction map.
    #[serde(default)]
    pub env_from: BTreeMap<String, String>,
    /// Subset of `env_from` keys to persist to the catalog. `None` means
    /// all keys in `env_from` — the explicit default this crate fixes,
    /// not left to guesswork.
    #[serde(default)]
    pub store_env: Option<Vec<String>>,
}

impl ResponseSpec {
    /// The effective set of `env_from` keys that must be persisted:
    /// `store_env` if present, otherwise every `env_from` key.
    #[must_use]
    pub fn effective_store_keys(&self) -> Vec<String> {
        match &self.store_env {
            Some(keys) => keys.clone(),
            None => self.env_from.keys().cloned().collect(),
        }
    }

    /// `true` if `code` is acceptable per `result_code` (or "any 2xx" when
    /// `result_code` is empty).
    #[must_use]
    pub fn accepts(&self, code: u16) -> bool {
        if self.result_code.is_empty() {
            return (200..300).contains(&code);
        }
        self.result_code.iter().any(|pattern| matches_code(pattern, code))
    }
}

fn matches_code(pattern: &str, code: u16) -> bool {
    if let Ok(exact) = pattern.parse::<u16>() {
        return exact == code;
    }
    // Wildcard family, e.g. "2xx" matches any code in [200, 300).
    let bytes = pattern.as_bytes();
    if bytes.len() == 3 && bytes[1..].iter().all(|b| b.to_ascii_lowercase() == b'x') {
        if let Some(digit) = (bytes[0] as char).to_digit(10) {
            let lo = digit as u16 * 100;
            return (lo..lo + 100).contains(&code);
        }
    }
    false
}
