//! Generic oracle HTTP client with retry, backoff, and optional HTTPS enforcement.
//!
//! Shared infrastructure for the HTTP embedding and verification oracles.

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::OracleHealthStatus;
use crate::error::{LikenessError, Result};

/// Configuration for an oracle HTTP client.
#[derive(Clone)]
pub struct HttpOracleConfig {
    /// API base URL; endpoints are appended as paths.
    pub api_url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
    /// Refuse plain-HTTP endpoints.
    pub https_only: bool,
}

impl std::fmt::Debug for HttpOracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOracleConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("https_only", &self.https_only)
            .finish()
    }
}

impl HttpOracleConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(4),
            https_only: true,
        }
    }

    /// Read oracle settings from the environment.
    ///
    /// Required: `LIKENESS_ORACLE_URL`
    /// Optional: `LIKENESS_ORACLE_API_KEY`, `LIKENESS_ORACLE_TIMEOUT_SECS`,
    /// `LIKENESS_ORACLE_ALLOW_HTTP` (set to `true` for local endpoints)
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("LIKENESS_ORACLE_URL").map_err(|_| {
            LikenessError::ConfigError("LIKENESS_ORACLE_URL environment variable not set".into())
        })?;

        let mut config = Self::new(api_url);
        config.api_key = std::env::var("LIKENESS_ORACLE_API_KEY").ok();
        if let Some(secs) = std::env::var("LIKENESS_ORACLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        config.https_only = std::env::var("LIKENESS_ORACLE_ALLOW_HTTP")
            .map(|v| v.to_lowercase() != "true")
            .unwrap_or(true);

        Ok(config)
    }

    /// Full URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Generic oracle HTTP client with retry and backoff.
pub struct OracleHttpClient {
    client: Client,
    config: HttpOracleConfig,
}

impl OracleHttpClient {
    /// Build the client; fails only if the TLS backend cannot initialise.
    pub fn new(config: HttpOracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .https_only(config.https_only)
            .build()
            .map_err(|e| {
                LikenessError::OracleError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpOracleConfig {
        &self.config
    }

    /// POST `body` as JSON to `path` with retry, parsing the JSON response.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = self.config.endpoint(path);
        let backoff = self.build_backoff();

        retry_notify(
            backoff,
            || {
                let url = url.as_str();
                async move { self.post_once(url, body).await }
            },
            |err: LikenessError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn post_once<B, R>(
        &self,
        url: &str,
        body: &B,
    ) -> std::result::Result<R, backoff::Error<LikenessError>>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let sent_at = Instant::now();

        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_send_error(e, sent_at))?;

        let status = response.status();
        if !status.is_success() {
            let elapsed_ms = sent_at.elapsed().as_millis() as u64;
            let err = LikenessError::OracleError(format!("Oracle returned status: {status}"));
            if is_transient_status(status) {
                warn!(%url, %status, elapsed_ms, "Oracle busy, retrying");
                return Err(backoff::Error::transient(err));
            }
            warn!(%url, %status, elapsed_ms, "Oracle rejected request");
            return Err(backoff::Error::permanent(err));
        }

        let parsed = response.json::<R>().await.map_err(|e| {
            warn!(%url, error = %e, "Oracle response is not the expected JSON");
            backoff::Error::permanent(LikenessError::OracleError(format!(
                "Failed to parse oracle response: {e}"
            )))
        })?;

        debug!(
            %url,
            elapsed_ms = sent_at.elapsed().as_millis() as u64,
            "Oracle call succeeded"
        );
        Ok(parsed)
    }

    /// Check the oracle's `/health` endpoint (single attempt, no retry).
    pub async fn health(&self) -> OracleHealthStatus {
        let url = self.config.endpoint("health");
        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => match response.status() {
                StatusCode::OK => OracleHealthStatus::Healthy,
                status if is_transient_status(status) => OracleHealthStatus::Degraded {
                    reason: format!("Transient status: {status}"),
                },
                status => OracleHealthStatus::Unavailable {
                    reason: format!("Unexpected status: {status}"),
                },
            },
            Err(e) => OracleHealthStatus::Unavailable {
                reason: format!("Health check request failed: {e}"),
            },
        }
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        }
    }
}

fn classify_send_error(e: reqwest::Error, sent_at: Instant) -> backoff::Error<LikenessError> {
    let elapsed_ms = sent_at.elapsed().as_millis() as u64;
    if is_transient_error(&e) {
        warn!(error = %e, elapsed_ms, "Oracle unreachable, retrying");
        backoff::Error::transient(LikenessError::OracleError(format!(
            "Oracle unreachable (will retry): {e}"
        )))
    } else {
        warn!(error = %e, elapsed_ms, "Oracle request failed permanently");
        backoff::Error::permanent(LikenessError::OracleError(format!(
            "Oracle request failed: {e}"
        )))
    }
}

/// Connection-level failures worth another attempt.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Statuses signalling an overloaded or restarting oracle.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let config = HttpOracleConfig::new("https://oracle.test/v1/");
        assert_eq!(config.endpoint("/embed"), "https://oracle.test/v1/embed");
        assert_eq!(config.endpoint("assess"), "https://oracle.test/v1/assess");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = HttpOracleConfig::new("https://oracle.test");
        config.api_key = Some("super-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_overload_statuses_are_retried() {
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ] {
            assert!(is_transient_status(status), "{status} should retry");
        }
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            assert!(!is_transient_status(status), "{status} should not retry");
        }
    }

    #[test]
    fn test_client_builds_for_plain_http_when_allowed() {
        let mut config = HttpOracleConfig::new("http://localhost:8080");
        config.https_only = false;
        assert!(OracleHttpClient::new(config).is_ok());
    }
}
