// SPDX-License-Identifier: MIT OR Apache-2.0
//! The auth facade contract.
//!
//! Concrete auth providers (basic / OAuth2 / PocketBase, …) are an
//! external collaborator's responsibility; this crate
//! owns only the contract the core depends on: [`AuthMethod`] produces an
//! opaque token string, and [`AuthRegistry`] lets the external collaborator
//! register `type -> factory(spec) -> method` constructors that the core
//! never has to know the concrete types of.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Errors produced while constructing or invoking an auth method.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No constructor was registered for the requested `type`.
    #[error("no auth constructor registered for type '{0}'")]
    UnknownType(String),
    /// The constructor rejected its `spec` (malformed config).
    #[error("invalid auth spec for '{name}': {reason}")]
    InvalidSpec {
        /// Logical auth name the spec was registered under.
        name: String,
        /// Human-readable rejection reason.
        reason: String,
    },
    /// Token acquisition failed once the method was constructed.
    #[error("failed to acquire token for '{name}': {reason}")]
    AcquisitionFailed {
        /// Logical auth name.
        name: String,
        /// Human-readable failure reason.
        reason: String,
    },
}

impl From<AuthError> for httpmig_error::MigrationError {
    fn from(err: AuthError) -> Self {
        use httpmig_error::{ErrorCategory, ErrorCode, MigrationError};
        let code = match &err {
            AuthError::UnknownType(_) => ErrorCode::AuthUnknownType,
            AuthError::InvalidSpec { .. } | AuthError::AcquisitionFailed { .. } => {
                ErrorCode::AuthAcquisitionFailed
            }
        };
        MigrationError::new(ErrorCategory::Auth, code, err.to_string())
    }
}

/// An auth method: given its own captured configuration, produces an
/// opaque token string. The task executor stores the result under
/// `env.auth[name]` and never reshapes it — no implicit `Bearer `/`Basic `
/// prefixing.
#[async_trait]
pub trait AuthMethod: Send + Sync {
    /// Acquire (or refresh) the token this method produces.
    async fn acquire(&self) -> Result<String, AuthError>;
}

/// A boxed constructor: given the auth entry's `config` document, produces
/// a concrete [`AuthMethod`].
pub type AuthConstructor =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn AuthMethod>, AuthError> + Send + Sync>;

/// Process-local registry of `type -> constructor`, populated by the
/// external collaborator before a Migrator run and consulted once per
/// configured `auth:` entry at configuration-decode time. There is no
/// process-wide token cache: every acquired token is written into
/// `env.auth` for the duration of the run and nowhere else.
#[derive(Clone, Default)]
pub struct AuthRegistry {
    constructors: BTreeMap<String, AuthConstructor>,
}

impl AuthRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under a lower-cased `type` key.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        constructor: AuthConstructor,
    ) {
        self.constructors
            .insert(type_name.into().to_ascii_lowercase(), constructor);
    }

    /// Construct an [`AuthMethod`] for `type_name` from `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownType`] if no constructor is registered.
    pub fn build(
        &self,
        type_name: &str,
        spec: &serde_json::Value,
    ) -> Result<Arc<dyn AuthMethod>, AuthError> {
        let key = type_name.to_ascii_lowercase();
        let ctor = self
            .constructors
            .get(&key)
            .ok_or_else(|| AuthError::UnknownType(type_name.to_string()))?;
        ctor(spec)
    }

    /// Resolve every configured auth entry into `name -> token`, acquiring
    /// each method's token once. Intended to run at configuration-decode
    /// time, before any task executes. Auth is populated once and never
    /// mutated by task execution.
    pub async fn resolve_all(
        &self,
        entries: &[AuthEntry],
    ) -> Result<BTreeMap<String, String>, AuthError> {
        let mut tokens = BTreeMap::new();
        for entry in entries {
            let method = self.build(&entry.auth_type, &entry.config)?;
            let token = method.acquire().await.map_err(|e| match e {
                AuthError::AcquisitionFailed { .. } => e,
                other => AuthError::AcquisitionFailed {
                    name: entry.name.clone(),
                    reason: other.to_string(),
                },
            })?;
            tokens.insert(entry.name.clone(), token);
        }
        Ok(tokens)
    }
}

/// One `auth:` configuration entry: `type` is opaque to the core,
/// `name` is the key the resulting token is stored under in `env.auth`.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct AuthEntry {
    /// Provider type string (e.g. `"basic"`, `"oauth2"`, `"pocketbase"`).
    #[serde(rename = "type")]
    pub auth_type: String,
    /// Logical name this token is stored under.
    pub name: String,
    /// Provider-specific configuration, opaque to the core.
    pub config: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticToken(String);

    #[async_trait]
    impl AuthMethod for StaticToken {
        async fn acquire(&self) -> Result<String, AuthError> {
            Ok(self.0.clone())
        }
    }

    fn test_registry() -> AuthRegistry {
        let mut reg = AuthRegistry::new();
        reg.register(
            "static",
            Arc::new(|spec: &serde_json::Value| {
                let token = spec
                    .get("token")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| AuthError::InvalidSpec {
                        name: "static".into(),
                        reason: "missing 'token'".into(),
                    })?;
                Ok(Arc::new(StaticToken(token.to_string())) as Arc<dyn AuthMethod>)
            }),
        );
        reg
    }

    #[tokio::test]
    async fn builds_and_acquires_registered_type() {
        let reg = test_registry();
        let method = reg
            .build("STATIC", &serde_json::json!({"token": "Basic dXNlcjpwYXNz"}))
            .unwrap();
        assert_eq!(method.acquire().await.unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[tokio::test]
    async fn unknown_type_errors() {
        let reg = test_registry();
        let err = reg.build("oauth2", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, AuthError::UnknownType(_)));
    }

    #[tokio::test]
    async fn resolve_all_distinguishes_multiple_names() {
        let reg = test_registry();
        let entries = vec![
            AuthEntry {
                auth_type: "static".into(),
                name: "a1".into(),
                config: serde_json::json!({"token": "t1"}),
            },
            AuthEntry {
                auth_type: "static".into(),
                name: "a2".into(),
                config: serde_json::json!({"token": "t2"}),
            },
        ];
        let tokens = reg.resolve_all(&entries).await.unwrap();
        assert_eq!(tokens.get("a1").unwrap(), "t1");
        assert_eq!(tokens.get("a2").unwrap(), "t2");
    }
}
