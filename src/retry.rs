use std::time::Duration;

use log::{debug, info, warn};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// HTTP statuses treated as transient: rate limiting and server-side faults.
pub const RETRYABLE_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Retry configuration for transport calls.
///
/// Applied by [`get_with_retry`] around every outbound GET; both the IP
/// lookup and the weather fetch share the same policy type.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based).
    pub fn backoff_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("retries exhausted after {attempts} attempts for {url}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<TransportError>,
    },
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Issues a GET with bounded retry and exponential backoff.
///
/// Retries only on connect/timeout errors and on the statuses in
/// [`RETRYABLE_STATUSES`]; any other failure surfaces immediately without
/// consuming the remaining attempts.
pub async fn get_with_retry<Q>(
    client: &Client,
    url: &str,
    query: &Q,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<Response, TransportError>
where
    Q: Serialize + ?Sized,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let outcome = client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await;

        let last = match outcome {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    if attempt > 1 {
                        info!("request to {url} succeeded on attempt {attempt}");
                    }
                    return Ok(response);
                }
                if !is_retryable_status(status) {
                    return Err(TransportError::Status {
                        url: url.to_string(),
                        status,
                    });
                }
                warn!("transient HTTP {status} from {url} on attempt {attempt}/{attempts}");
                TransportError::Status {
                    url: url.to_string(),
                    status,
                }
            }
            Err(source) => {
                if !is_retryable_error(&source) {
                    return Err(TransportError::Network {
                        url: url.to_string(),
                        source,
                    });
                }
                warn!("transient network error from {url} on attempt {attempt}/{attempts}: {source}");
                TransportError::Network {
                    url: url.to_string(),
                    source,
                }
            }
        };

        if attempt >= attempts {
            return Err(TransportError::RetriesExhausted {
                url: url.to_string(),
                attempts,
                last: Box::new(last),
            });
        }

        let delay = policy.backoff_for_retry(attempt);
        debug!("backing off {delay:?} before retrying {url}");
        tokio::time::sleep(delay).await;
    }
}
