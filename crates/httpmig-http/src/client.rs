//! HTTP client factory.

use crate::config::ClientConfig;
use crate::HttpError;

/// Build a [`reqwest::Client`] honoring `config`'s TLS and pooling settings.
///
/// Connection pooling and per-host keepalive are `reqwest`'s defaults,
/// tuned by `pool_idle_timeout`; the overall per-request timeout and TLS
/// version pinning come straight from `config`.
pub fn build_client(config: &ClientConfig) -> Result<reqwest::Client, HttpError> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .danger_accept_invalid_certs(config.insecure_skip_verify);

    if let Some(min) = config.min_tls_version {
        builder = builder.min_tls_version(min.to_reqwest());
    }
    if let Some(max) = config.max_tls_version {
        builder = builder.max_tls_version(max.to_reqwest());
    }

    builder.build().map_err(HttpError::ClientBuild)
}
