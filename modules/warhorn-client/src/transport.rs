//! Retrying HTTP transport.
//!
//! Every request is replayed with exponential backoff until it returns 200,
//! hits a status that cannot succeed on retry, or runs out of retries. Any
//! terminal failure dumps the response headers and body to the log before
//! surfacing as an error, so a broken run can be diagnosed from its log alone.

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Request, Response, StatusCode};
use tracing::{debug, error, info, warn};

use crate::error::{Result, WarhornError};

/// Per-request timeout. The retry ceiling bounds waits between attempts only.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Backoff configuration for the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubles on each subsequent one.
    pub min_wait: Duration,
    /// Ceiling for any single wait, including server-provided `Retry-After`.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 12,
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(60 * 60),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (0-based): `min_wait * 2^retry`, capped at `max_wait`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.min_wait
            .checked_mul(factor)
            .map_or(self.max_wait, |wait| wait.min(self.max_wait))
    }

    fn wait_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(wait) => wait.min(self.max_wait),
            None => self.backoff(retry),
        }
    }
}

/// Rate limits and server errors may clear up on their own. 501 never will.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
}

/// Connection failures and timeouts may clear up. A request that could not be
/// built, a redirect loop or a rejected TLS certificate will fail the same way
/// on every attempt.
pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    if err.is_builder() || err.is_redirect() {
        return false;
    }
    !mentions_certificate(err)
}

/// reqwest exposes no certificate error kind, so the source chain is searched
/// for the TLS backend's message.
fn mentions_certificate(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.to_string().to_ascii_lowercase().contains("certificate") {
            return true;
        }
        current = e.source();
    }
    false
}

/// Only integer-second `Retry-After` values are honored.
fn retry_after(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

pub struct Transport {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl Transport {
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, policy })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send `request` until it succeeds with 200 or the retry policy gives up.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let mut retry = 0;
        loop {
            let attempt = request.try_clone().ok_or_else(|| {
                WarhornError::Network("request body cannot be replayed".to_string())
            })?;

            let wait = match self.http.execute(attempt).await {
                Ok(resp) if resp.status() == StatusCode::OK => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        info!(status = %status, retry, "Received rate limit response");
                    }
                    if !is_retryable_status(status) || retry >= self.policy.max_retries {
                        return Err(terminal_failure(resp).await);
                    }
                    if status != StatusCode::TOO_MANY_REQUESTS {
                        warn!(status = %status, retry, "Retryable response status");
                    }
                    self.policy
                        .wait_for(retry, retry_after(status, resp.headers()))
                }
                Err(err) => {
                    if !is_retryable_error(&err) {
                        error!(error = %err, attempts = retry + 1, "Request cannot succeed on retry");
                        return Err(WarhornError::Network(err.to_string()));
                    }
                    if retry >= self.policy.max_retries {
                        error!(error = %err, attempts = retry + 1, "Giving up on request");
                        return Err(WarhornError::RetriesExhausted {
                            attempts: retry + 1,
                            message: err.to_string(),
                        });
                    }
                    warn!(error = %err, retry, "Request failed, retrying");
                    self.policy.backoff(retry)
                }
            };

            debug!(
                retry,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Backing off before retry"
            );
            tokio::time::sleep(wait).await;
            retry += 1;
        }
    }
}

async fn terminal_failure(resp: Response) -> WarhornError {
    let status = resp.status();
    for (name, value) in resp.headers() {
        error!(
            header = %name,
            value = %String::from_utf8_lossy(value.as_bytes()),
            "Response header"
        );
    }
    let body = resp.text().await.unwrap_or_default();
    error!(status = status.as_u16(), body = %body, "Request failed");
    WarhornError::Status {
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn backoff_doubles_from_min_wait() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(5), Duration::from_secs(32));
    }

    #[test]
    fn backoff_is_capped_at_max_wait() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(12), Duration::from_secs(3600));
        assert_eq!(policy.backoff(40), Duration::from_secs(3600));
    }

    #[test]
    fn retry_after_is_capped_at_max_wait() {
        let policy = RetryPolicy {
            max_retries: 3,
            min_wait: Duration::from_millis(10),
            max_wait: Duration::from_secs(5),
        };
        assert_eq!(
            policy.wait_for(0, Some(Duration::from_secs(120))),
            Duration::from_secs(5)
        );
        assert_eq!(policy.wait_for(2, None), Duration::from_millis(40));
    }

    #[test]
    fn rate_limits_and_server_errors_are_retryable() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::NOT_IMPLEMENTED));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn retry_after_only_read_for_throttling_statuses() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(
            retry_after(StatusCode::TOO_MANY_REQUESTS, &headers),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            retry_after(StatusCode::SERVICE_UNAVAILABLE, &headers),
            Some(Duration::from_secs(7))
        );
        assert_eq!(retry_after(StatusCode::INTERNAL_SERVER_ERROR, &headers), None);
    }

    #[derive(Debug)]
    struct Wrapped(std::io::Error);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("error trying to connect")
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn certificate_failure_is_found_in_source_chain() {
        let tls = Wrapped(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "invalid peer certificate: UnknownIssuer",
        ));
        assert!(mentions_certificate(&tls));

        let refused = Wrapped(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(!mentions_certificate(&refused));
    }

    #[test]
    fn http_date_retry_after_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(StatusCode::TOO_MANY_REQUESTS, &headers), None);
    }
}
