//! HTTP retry helpers for transient errors.
//!
//! Every remote call (POI queries, facts lookups, tile downloads) goes
//! through [`send_json`] or [`send_bytes`] rather than calling
//! `reqwest::RequestBuilder::send()` directly, so each request gets
//! exponential backoff on transient failures (timeouts, connection
//! resets, HTTP 429, HTTP 5xx).
//!
//! ```ignore
//! use crate::retry::{self, RetryPolicy};
//!
//! let body = retry::send_json(&RetryPolicy::default(), || client.get(&url)).await?;
//! let png = retry::send_bytes(&RetryPolicy::default(), || client.get(&tile_url)).await?;
//! ```

use std::time::Duration;

use crate::SourceError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// How many times, and how patiently, to retry a request.
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// Two retries (1s, 2s). A location-driven refresh would rather skip
    /// a cycle than stall on a dead network.
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << retry.saturating_sub(1).min(16))
    }
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// Does **not** retry HTTP 4xx (except 429) or a body that is not JSON;
/// those are permanent for a given request.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries, the
/// server returns a non-retryable status, or the body is not valid JSON.
pub async fn send_json<F>(policy: &RetryPolicy, build_request: F) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(policy, &build_request).await?;
    let url = response.url().to_string();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::error!(
            "JSON parse failed\n  \
             url: {url}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {preview}",
            text.len(),
        );
        SourceError::Json(e)
    })
}

/// Sends an HTTP request and returns the raw response body.
///
/// Retries exactly like [`send_json`].
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries or the
/// server returns a non-retryable status.
pub async fn send_bytes<F>(policy: &RetryPolicy, build_request: F) -> Result<Vec<u8>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(policy, &build_request).await?;
    Ok(response.bytes().await?.to_vec())
}

/// Core retry loop shared by [`send_json`] and [`send_bytes`].
///
/// Returns the successful [`reqwest::Response`] (status 2xx or 3xx).
async fn send_inner<F>(policy: &RetryPolicy, build_request: &F) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_retries = policy.max_retries;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                let retryable = status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    || status.is_server_error();

                if retryable {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status} from {}", response.url());
                        attempt += 1;
                        continue;
                    }
                    return Err(SourceError::Status {
                        status: status.as_u16(),
                        message: format!("HTTP {status} after {max_retries} retries"),
                    });
                }

                if status.is_client_error() {
                    return Err(SourceError::Status {
                        status: status.as_u16(),
                        message: format!("HTTP {status}"),
                    });
                }

                return Ok(response);
            }
        }
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn none_policy_has_no_retries() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[tokio::test]
    async fn unreachable_host_fails_without_retrying() {
        let client = reqwest::Client::new();
        let result = send_bytes(&RetryPolicy::none(), || {
            client.get("http://127.0.0.1:9/unreachable")
        })
        .await;
        assert!(matches!(result, Err(SourceError::Http(_))));
    }
}
