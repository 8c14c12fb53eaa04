// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layered environment context and the `{{ }}` template renderer.
//!
//! [`Env`] holds the three-layer (`global`/`local`/`auth`) string context a
//! migration run threads through every task. [`render`] applies
//! `{{.env.x}}`-style templating to a single string after running it
//! through [`security`]'s validation pass; [`render_any`] does the same
//! recursively over a [`serde_json::Value`] tree (request bodies, query
//! maps), leaving non-string leaves untouched.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod ast;
pub mod config;
mod env;
mod eval;
mod parser;
pub mod security;

pub use ast::{Cond, FieldPath, Node, Operand, PrintExpr};
pub use config::{EnvConfigError, EnvEntry, EnvSpec};
pub use env::Env;
pub use parser::ParseError;
pub use security::SecurityError;

use serde_json::Value;

/// Errors produced by [`render`] / [`render_any`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template failed a security-validation check.
    #[error(transparent)]
    Security(#[from] SecurityError),
    /// The template could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<TemplateError> for httpmig_error::MigrationError {
    fn from(err: TemplateError) -> Self {
        use httpmig_error::{ErrorCategory, ErrorCode, MigrationError};
        match err {
            TemplateError::Security(e) => {
                MigrationError::new(ErrorCategory::Security, ErrorCode::SecurityRejected, e.to_string())
            }
            TemplateError::Parse(e) => {
                MigrationError::new(ErrorCategory::Template, ErrorCode::TemplateParseFailed, e.to_string())
            }
        }
    }
}

/// Render `text` against `env`.
///
/// `text` is first validated per the security contract (banned
/// identifiers, shell-expansion / backtick / path-traversal literals),
/// then parsed, then depth-checked, then evaluated. Undefined variables
/// render as an empty string rather than erroring.
pub fn render(text: &str, env: &Env) -> Result<String, TemplateError> {
    if !text.contains("{{") {
        // No template syntax present; still run the source-level security
        // scan since shell-expansion / traversal checks apply to any
        // templated string field, not only ones containing `{{ }}`.
        security::validate_source(text)?;
        return Ok(text.to_string());
    }
    security::validate_source(text)?;
    let nodes = parser::parse(text)?;
    security::validate_depth(&nodes)?;
    Ok(eval::eval_nodes(&nodes, env, None))
}

/// Recursively render every string leaf of `value` against `env`.
/// Non-string leaves (numbers, bools, null) pass through unchanged.
pub fn render_any(value: &Value, env: &Env) -> Result<Value, TemplateError> {
    Ok(match value {
        Value::String(s) => Value::String(render(s, env)?),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(render_any(item, env)?);
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), render_any(v, env)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env() -> Env {
        let mut global = BTreeMap::new();
        global.insert("base_url".to_string(), "https://api.example.com".to_string());
        let mut e = Env::with_global(global);
        e.local.insert("rid".to_string(), "xyz".to_string());
        e.auth.insert("a1".to_string(), "Bearer abc".to_string());
        e
    }

    #[test]
    fn renders_plain_field() {
        let out = render("{{.env.base_url}}/resource/{{.env.rid}}", &env()).unwrap();
        assert_eq!(out, "https://api.example.com/resource/xyz");
    }

    #[test]
    fn undefined_renders_empty() {
        let out = render("[{{.env.missing}}]", &env()).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn auth_field_renders() {
        let out = render("{{.auth.a1}}", &env()).unwrap();
        assert_eq!(out, "Bearer abc");
    }

    #[test]
    fn conditional_renders_branch() {
        let out = render("{{if .env.rid}}has:{{.env.rid}}{{else}}none{{end}}", &env()).unwrap();
        assert_eq!(out, "has:xyz");
        let out2 = render("{{if .env.missing}}has{{else}}none{{end}}", &env()).unwrap();
        assert_eq!(out2, "none");
    }

    #[test]
    fn eq_condition_compares_literal() {
        let out = render(r#"{{if eq .env.rid "xyz"}}match{{end}}"#, &env()).unwrap();
        assert_eq!(out, "match");
    }

    #[test]
    fn range_iterates_comma_list() {
        let mut e = env();
        e.local.insert("items".to_string(), "a,b,c".to_string());
        let out = render("{{range .env.items}}({{.}}){{end}}", &e).unwrap();
        assert_eq!(out, "(a)(b)(c)");
    }

    #[test]
    fn rejects_insecure_template() {
        let err = render("{{.env.execCmd}}", &env()).unwrap_err();
        assert!(matches!(err, TemplateError::Security(_)));
    }

    #[test]
    fn security_error_converts_to_migration_error() {
        let err = render("{{.env.execCmd}}", &env()).unwrap_err();
        let migration_err: httpmig_error::MigrationError = err.into();
        assert_eq!(migration_err.category, httpmig_error::ErrorCategory::Security);
    }

    #[test]
    fn render_any_walks_structures() {
        let body = serde_json::json!({
            "id": "{{.env.rid}}",
            "count": 3,
            "tags": ["{{.env.rid}}", "static"],
        });
        let out = render_any(&body, &env()).unwrap();
        assert_eq!(out["id"], serde_json::json!("xyz"));
        assert_eq!(out["count"], serde_json::json!(3));
        assert_eq!(out["tags"][0], serde_json::json!("xyz"));
    }

    #[test]
    fn render_any_idempotent_on_non_template_output() {
        let body = serde_json::json!({"id": "{{.env.rid}}", "n": 1});
        let once = render_any(&body, &env()).unwrap();
        let twice = render_any(&once, &env()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn depth_limit_enforced() {
        let mut text = String::new();
        for _ in 0..12 {
            text.push_str("{{if .env.rid}}");
        }
        text.push_str("x");
        for _ in 0..12 {
            text.push_str("{{end}}");
        }
        let err = render(&text, &env()).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::Security(SecurityError::TooDeep(_))
        ));
    }
}
