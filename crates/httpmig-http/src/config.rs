//! Client and retry configuration for the `client:` config block.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum/maximum TLS protocol version accepted by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TlsVersion {
    /// TLS 1.0.
    Tls1_0,
    /// TLS 1.1.
    Tls1_1,
    /// TLS 1.2.
    Tls1_2,
    /// TLS 1.3.
    Tls1_3,
}

impl TlsVersion {
    pub(crate) fn to_reqwest(self) -> reqwest::tls::Version {
        match self {
            Self::Tls1_0 => reqwest::tls::Version::TLS_1_0,
            Self::Tls1_1 => reqwest::tls::Version::TLS_1_1,
            Self::Tls1_2 => reqwest::tls::Version::TLS_1_2,
            Self::Tls1_3 => reqwest::tls::Version::TLS_1_3,
        }
    }
}

/// Configuration for [`crate::build_client`], bound from the external
/// collaborator's `client:` config block.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientConfig {
    /// Skip TLS certificate verification. Defaults to `false`.
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// Minimum accepted TLS version.
    #[serde(default)]
    pub min_tls_version: Option<TlsVersion>,
    /// Maximum accepted TLS version.
    #[serde(default)]
    pub max_tls_version: Option<TlsVersion>,
    /// Overall per-request timeout, in seconds.
    #[serde(with = "duration_secs", default = "default_timeout")]
    #[schemars(with = "u64")]
    pub timeout: Duration,
    /// Idle-connection keepalive duration for the pool, in seconds.
    #[serde(with = "duration_secs", default = "default_pool_idle_timeout")]
    #[schemars(with = "u64")]
    pub pool_idle_timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_pool_idle_timeout() -> Duration {
    Duration::from_secs(90)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            insecure_skip_verify: false,
            min_tls_version: None,
            max_tls_version: None,
            timeout: default_timeout(),
            pool_idle_timeout: default_pool_idle_timeout(),
        }
    }
}

/// Retry behaviour applied around a single task's HTTP call.
///
/// Shape mirrors the exponential-backoff-with-retry-cap policy used
/// elsewhere in this codebase's transport layer: capped attempts, capped
/// delay, never retrying a cancelled request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first. Capped at 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff delay, in milliseconds.
    #[serde(with = "duration_millis", default = "default_initial_backoff")]
    #[schemars(with = "u64")]
    pub initial_backoff: Duration,
    /// Maximum backoff delay cap, in milliseconds.
    #[serde(with = "duration_millis", default = "default_max_backoff")]
    #[schemars(with = "u64")]
    pub max_backoff: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(5)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        val.as_secs().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(de)?))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        val.as_millis().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let ms: u64 = u64::deserialize(de)?;
        Ok(Duration::from_millis(ms))
    }
}
