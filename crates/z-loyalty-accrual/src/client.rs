//! Accrual service HTTP client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::AccrualError;
use crate::retry::RetryPolicy;
use crate::types::{AccrualReply, Verdict};
use crate::AccrualSource;

/// Request timeout for a single lookup attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Client for the external accrual service.
///
/// Performs `GET <base>/api/orders/<number>` with a short per-attempt timeout
/// and a bounded retry policy for transient failures. Definitive responses
/// (unknown order, rate limit) are classified into [`Verdict`] and never
/// retried here.
#[derive(Debug, Clone)]
pub struct AccrualClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl AccrualClient {
    /// Create a client with the default retry policy and request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_policy(base_url, RetryPolicy::default(), DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom retry policy and request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    #[must_use]
    pub fn with_policy(
        base_url: impl Into<String>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        }
    }

    /// One lookup attempt, classified but not retried.
    async fn fetch(&self, order_number: &str) -> Result<Verdict, AccrualError> {
        let url = format!("{}/api/orders/{order_number}", self.base_url);
        debug!(order_number, "querying accrual service");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        match status {
            StatusCode::OK => {
                let body = response.text().await?;
                let reply: AccrualReply =
                    serde_json::from_str(&body).map_err(AccrualError::Decode)?;
                Ok(reply.into_verdict())
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(Verdict::Unknown),
            StatusCode::TOO_MANY_REQUESTS => Ok(Verdict::RateLimited {
                retry_after: parse_retry_after(&response),
            }),
            other => Err(AccrualError::UnexpectedStatus {
                status: other.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl AccrualSource for AccrualClient {
    async fn lookup(&self, order_number: &str) -> Result<Verdict, AccrualError> {
        self.policy
            .run(
                "accrual lookup",
                || self.fetch(order_number),
                AccrualError::is_retryable,
            )
            .await
    }
}

/// Parse a `Retry-After` header given in seconds.
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = AccrualClient::new("http://localhost:8080");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = AccrualClient::new("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
