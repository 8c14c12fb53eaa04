// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP client factory, TLS context, and retry policy.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod retry;

pub use client::build_client;
pub use config::{ClientConfig, RetryConfig, TlsVersion};
pub use retry::{compute_delay, execute_with_retry, is_retryable_status};

/// Errors produced while building or using the HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The `reqwest::Client` could not be constructed from `ClientConfig`.
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// The request itself failed (after retries, if any).
    #[error("http request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<HttpError> for httpmig_error::MigrationError {
    fn from(err: HttpError) -> Self {
        use httpmig_error::{ErrorCategory, ErrorCode, MigrationError};
        MigrationError::new(ErrorCategory::Network, ErrorCode::NetworkTransportFailed, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn default_config_builds_a_client() {
        let client = build_client(&ClientConfig::default()).unwrap();
        drop(client);
    }

    #[tokio::test]
    async fn retries_on_server_error_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/flaky", server.uri());
        let cfg = RetryConfig {
            initial_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(5),
            ..RetryConfig::default()
        };
        let resp = execute_with_retry(&cfg, || client.get(&url).send())
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/bad", server.uri());
        let cfg = RetryConfig::default();
        let resp = execute_with_retry(&cfg, || client.get(&url).send())
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[test]
    fn retryable_status_classification() {
        assert!(is_retryable_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(reqwest::StatusCode::REQUEST_TIMEOUT));
        assert!(!is_retryable_status(reqwest::StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(reqwest::StatusCode::OK));
    }

    #[test]
    fn delay_is_capped() {
        let cfg = RetryConfig {
            initial_backoff: std::time::Duration::from_secs(1),
            max_backoff: std::time::Duration::from_secs(5),
            max_attempts: 10,
        };
        assert_eq!(compute_delay(&cfg, 0), std::time::Duration::from_secs(1));
        assert_eq!(compute_delay(&cfg, 1), std::time::Duration::from_secs(2));
        assert_eq!(compute_delay(&cfg, 10), std::time::Duration::from_secs(5));
    }
}
