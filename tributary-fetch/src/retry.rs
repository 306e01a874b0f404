//! Bounded retry with exponential backoff.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use tributary_core::constants::{
    CONNECT_TIMEOUT, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_RETRIES, MAX_BACKOFF, REQUEST_TIMEOUT,
};
use tributary_core::error::{Result, TransientError, TributaryError};

/// Retry budget and backoff curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff before retry `n` (1-based) is `backoff_factor * 2^n` seconds
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// Delay before the given retry (1-based), capped at [`MAX_BACKOFF`].
    ///
    /// A zero, negative or NaN factor means no delay.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.backoff_factor * 2f64.powi(exponent);
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

/// Outcome of a single attempt that did not succeed.
enum AttemptError {
    /// Worth retrying.
    Transient(TransientError),
    /// Returned to the caller as is.
    Fatal(TributaryError),
}

/// Performs GET requests against JSON services, retrying transient failures.
///
/// Network errors and upstream 429s are retried with exponential backoff;
/// any other non-2xx status fails at once. Each attempt gets its own timeout
/// budget from the underlying client. Holds no mutable state, so one fetcher
/// can serve any number of concurrent calls.
#[derive(Clone, Debug)]
pub struct RetryingFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    /// Creates a fetcher with the default per-attempt timeouts.
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        Self::with_timeouts(policy, CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    /// Creates a fetcher with custom per-attempt timeouts.
    pub fn with_timeouts(
        policy: RetryPolicy,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| TributaryError::Http(e.to_string()))?;

        Ok(Self::with_client(client, policy))
    }

    /// Wraps an existing client.
    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// The default policy used by [`fetch`](Self::fetch).
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `endpoint` with the fetcher's default policy.
    pub async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        self.fetch_with_policy(endpoint, params, &self.policy).await
    }

    /// Fetches `endpoint` with an explicit policy.
    ///
    /// # Errors
    ///
    /// - [`TributaryError::UpstreamHttp`] for a non-2xx, non-429 status
    /// - [`TributaryError::ExhaustedRetries`] once `max_retries` retries failed transiently
    /// - [`TributaryError::InvalidResponse`] if a 2xx body is not JSON
    #[instrument(skip(self, params, policy), fields(max_retries = policy.max_retries))]
    pub async fn fetch_with_policy(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        policy: &RetryPolicy,
    ) -> Result<Value> {
        let mut retries = 0u32;

        loop {
            match self.attempt(endpoint, params).await {
                Ok(body) => {
                    debug!(attempts = retries + 1, "Upstream request succeeded");
                    return Ok(body);
                }
                Err(AttemptError::Fatal(err)) => {
                    error!(error = %err, "Upstream request failed");
                    return Err(err);
                }
                Err(AttemptError::Transient(err)) => {
                    if retries >= policy.max_retries {
                        error!(attempts = retries + 1, error = %err, "Max retries reached");
                        return Err(TributaryError::ExhaustedRetries {
                            attempts: retries + 1,
                            last_error: err,
                        });
                    }

                    retries += 1;
                    let delay = policy.backoff(retries);
                    warn!(
                        retry = retries,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "Transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<Value, AttemptError> {
        let response = self
            .client
            .get(endpoint)
            .query(params)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(TransientError::Network(e.to_string())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Transient(TransientError::Network(e.to_string())))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::Transient(TransientError::UpstreamRateLimited {
                body,
            }));
        }

        if !status.is_success() {
            return Err(AttemptError::Fatal(TributaryError::UpstreamHttp {
                status: status.as_u16(),
                body,
            }));
        }

        serde_json::from_str(&body).map_err(|e| {
            AttemptError::Fatal(TributaryError::InvalidResponse(format!(
                "body is not JSON: {}",
                e
            )))
        })
    }
}
